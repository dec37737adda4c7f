pub mod affiliation;
pub mod claim;
pub mod user;

pub use affiliation::{Affiliation, Permission};
pub use claim::Claim;
pub use user::{EncryptedPhone, PendingCode, SanitizedUser, TfaMethod, User};
