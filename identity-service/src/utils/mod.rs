pub mod crypto;
pub mod password;

pub use crypto::{CryptoError, KeyedHasher, PhoneCipher};
pub use password::{Argon2Hasher, CredentialHasher, HashError, Password, PasswordHashString};
