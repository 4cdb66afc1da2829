use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config;
use crate::database::transaction::Actor;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    pub user_name: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: String, user_name: String) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self { user_id, user_name, exp, iat: now.timestamp() }
    }

    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id.clone(), self.user_name.clone())
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),
    #[error("Invalid JWT secret")]
    InvalidSecret,
    #[error("Invalid JWT token: {0}")]
    Invalid(String),
}

fn secret() -> Result<&'static str, JwtError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }
    Ok(secret.as_str())
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    generate_jwt_with(claims, secret()?)
}

pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    validate_jwt_with(token, secret()?)
}

pub fn generate_jwt_with(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn validate_jwt_with(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| JwtError::Invalid(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp_offset: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims { user_id: "u-1".into(), user_name: "Ana".into(), exp: now + exp_offset, iat: now }
    }

    #[test]
    fn token_round_trips_to_an_actor() {
        let token = generate_jwt_with(&claims(3600), "s3cret").unwrap();
        let decoded = validate_jwt_with(&token, "s3cret").unwrap();
        assert_eq!(decoded.actor(), Actor::new("u-1", "Ana"));
    }

    #[test]
    fn wrong_secret_or_expired_token_is_rejected() {
        let token = generate_jwt_with(&claims(3600), "s3cret").unwrap();
        assert!(matches!(validate_jwt_with(&token, "other"), Err(JwtError::Invalid(_))));

        let expired = generate_jwt_with(&claims(-3600), "s3cret").unwrap();
        assert!(validate_jwt_with(&expired, "s3cret").is_err());
    }
}
