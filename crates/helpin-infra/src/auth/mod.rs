//! Bearer credential verification.

pub mod jwt;

pub use jwt::{AuthError, JwtVerifier, MIN_SECRET_LEN};
