//! JWT issuing and validation shared by the auth and API services
//!
//! Tokens are HS256-signed with a shared secret. The auth service issues them
//! at login; the API service only validates them.

use anyhow::Result;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::models::{User, UserRole};

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared signing secret
    pub secret: String,
    /// Token lifetime in seconds (default: 1 day)
    pub expiry: u64,
    /// Token lifetime when the user asked to be remembered (default: 30 days)
    pub remember_me_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: Signing secret (required)
    /// - `JWT_EXPIRY_SECONDS`: Token expiry in seconds (default: 86400)
    /// - `JWT_REMEMBER_ME_EXPIRY_SECONDS`: Remember-me expiry in seconds (default: 2592000)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

        if secret.trim().is_empty() {
            return Err(anyhow::anyhow!("JWT_SECRET must not be empty"));
        }

        let expiry = std::env::var("JWT_EXPIRY_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(86_400);

        let remember_me_expiry = std::env::var("JWT_REMEMBER_ME_EXPIRY_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2_592_000);

        Ok(JwtConfig {
            secret,
            expiry,
            remember_me_expiry,
        })
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User ID
    pub sub: Uuid,
    /// Email at issue time, used as a fallback lookup key
    pub email: String,
    pub role: UserRole,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        }
    }

    /// Generate a token for a user
    pub fn generate_token(&self, user: &User, remember_me: bool) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| anyhow::anyhow!("Failed to get current time: {}", e))?
            .as_secs();

        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp: now + self.token_expiry(remember_me),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Lifetime of a freshly issued token in seconds
    pub fn token_expiry(&self, remember_me: bool) -> u64 {
        if remember_me {
            self.config.remember_me_expiry
        } else {
            self.config.expiry
        }
    }
}
