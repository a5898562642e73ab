//! JWT verification and channel-access policy (C2)

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelKind;
use crate::error::Error;

/// Claims a token must carry (§4.2).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    pub user_id: String,
    pub wallet_address: String,
    pub iat: i64,
    pub exp: i64,
}

/// Verifies token signatures and evaluates channel-access policy.
///
/// Constructed with its own secret/algorithm so independent instances can
/// be built in tests rather than relying on a process-wide singleton.
#[derive(Clone)]
pub struct JwtVerifier {
    secret: String,
    algorithm: jsonwebtoken::Algorithm,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self::with_algorithm(secret, jsonwebtoken::Algorithm::HS256)
    }

    pub fn with_algorithm(secret: impl Into<String>, algorithm: jsonwebtoken::Algorithm) -> Self {
        Self {
            secret: secret.into(),
            algorithm,
        }
    }

    /// Decode and verify `token`. Fails with `TokenExpired` if `exp` has
    /// passed, or `TokenInvalid` for any other decode/signature/claim
    /// failure (§4.2).
    pub fn verify_token(&self, token: &str) -> Result<TokenPayload, Error> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is checked ourselves below so we can return the
        // TokenExpired variant distinctly from other invalid-token failures.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<TokenPayload>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| Error::TokenInvalid(e.to_string()))?;

        let now = chrono::Utc::now().timestamp();
        if data.claims.exp <= now {
            return Err(Error::TokenExpired);
        }

        Ok(data.claims)
    }

    /// Channel-access policy (§4.2):
    /// - `global` always allowed
    /// - `user.<id>` only for the matching user
    /// - `strategy.*`, ephemeral channels: any authenticated user
    /// - public topics: anyone
    /// - otherwise denied
    pub fn verify_channel_access(&self, user_id: &str, channel_name: &str) -> bool {
        let Ok(name) = crate::channel::ChannelName::parse(channel_name) else {
            return false;
        };
        match name.kind() {
            ChannelKind::Global => true,
            ChannelKind::User => name
                .extract_user_id()
                .map(|id| id == user_id)
                .unwrap_or(false),
            ChannelKind::Strategy
            | ChannelKind::EphemeralForgeJob
            | ChannelKind::EphemeralBacktest => true,
            ChannelKind::Public => true,
            ChannelKind::Other => false,
        }
    }
}
