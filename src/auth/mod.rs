//! JWT verification and channel-access policy

pub mod jwt;

pub use jwt::{JwtVerifier, TokenPayload};
