use rand::Rng;
use subtle::ConstantTimeEq;

const TEMP_PASSWORD_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";
const TEMP_PASSWORD_LENGTH: usize = 12;

/// Numeric one-time code of the given length. Leading zeros are kept.
pub fn generate_otp(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Temporary password handed to admin-provisioned instructors
pub fn generate_temporary_password() -> String {
    let mut rng = rand::thread_rng();
    (0..TEMP_PASSWORD_LENGTH)
        .map(|_| TEMP_PASSWORD_CHARSET[rng.gen_range(0..TEMP_PASSWORD_CHARSET.len())] as char)
        .collect()
}

/// Constant-time comparison for submitted codes
pub fn codes_match(expected: &str, candidate: &str) -> bool {
    expected.as_bytes().ct_eq(candidate.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otp_is_fixed_length_digits() {
        for _ in 0..50 {
            let code = generate_otp(6);
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn temporary_password_uses_charset() {
        let pw = generate_temporary_password();
        assert_eq!(pw.len(), 12);
        assert!(pw.bytes().all(|b| TEMP_PASSWORD_CHARSET.contains(&b)));
    }

    #[test]
    fn code_comparison() {
        assert!(codes_match("123456", "123456"));
        assert!(!codes_match("123456", "123457"));
        assert!(!codes_match("123456", "12345"));
    }
}
