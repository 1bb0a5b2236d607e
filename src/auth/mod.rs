pub mod capability;
pub mod codes;
pub mod jwt;
pub mod password;

pub use capability::Capability;
pub use codes::{codes_match, generate_otp, generate_temporary_password};
pub use jwt::{fingerprint, Claims, JwtError, TokenKeys, TokenKind};
pub use password::{hash_password, verify_password};
