//! Invitation tokens and credential hashing.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password, PasswordError};
pub use token::{InvitationToken, TokenDigest, TOKEN_BYTES};
