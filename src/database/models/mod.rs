pub mod enrollment;
pub mod otp;
pub mod token;
pub mod user;

pub use enrollment::{Enrollment, EnrollmentStatus, NewEnrollment, ProgressItem};
pub use otp::{MaskedOtp, NewOtpRecord, OtpRecord};
pub use token::{NewTokenRecord, TokenRecord};
pub use user::{
    Address, Education, Gender, NewUser, ProfileUpdate, Role, StoredCredentials, User, UserFilter, UserPatch,
    UserStatus,
};
