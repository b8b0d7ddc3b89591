//! Authentication and authorization primitives
//!
//! Pure functions only; the HTTP extractor that applies them lives in the
//! server crate.
//!
//! - [`password`]: salted, iterated SHA-256 password hashes
//! - [`token`]: signed access tokens over canonical JSON claims
//! - [`roles`]: role ranking and the permission table

pub mod password;
pub mod roles;
pub mod token;

pub use password::{hash_password, validate_password_strength, verify_password, PasswordHash};
pub use roles::{Permission, Role};
pub use token::{issue_token, to_canonical_json, verify_token, Claims, TokenError};
