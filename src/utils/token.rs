use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::get_config;
use crate::error::{Error, Result};
use crate::models::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
    pub token_type: TokenType,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse()
            .map_err(|_| Error::Unauthorized("Invalid token subject".to_string()))
    }
}

pub fn issue_token(user: &User, token_type: TokenType, secret: &str, ttl: Duration) -> Result<String> {
    let claims = Claims {
        sub: user.id.to_string(),
        exp: (Utc::now() + ttl).timestamp().max(0) as usize,
        role: Some(user.role().as_str().to_string()),
        token_type,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Decodes and checks expiry and token type.
pub fn decode_token(token: &str, secret: &str, expected: TokenType) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    if data.claims.token_type != expected {
        return Err(Error::Unauthorized("Wrong token type".to_string()));
    }
    Ok(data.claims)
}

pub fn access_token(user: &User) -> Result<String> {
    let config = get_config();
    issue_token(
        user,
        TokenType::Access,
        &config.jwt_secret,
        Duration::minutes(config.access_token_ttl_minutes),
    )
}

pub fn refresh_token(user: &User) -> Result<String> {
    let config = get_config();
    issue_token(
        user,
        TokenType::Refresh,
        &config.jwt_secret,
        Duration::days(config.refresh_token_ttl_days),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 12,
            username: "tinglovchi".into(),
            password_hash: None,
            full_name: "Tinglovchi".into(),
            workplace: String::new(),
            role: "TINGLOVCHI".into(),
            group_id: Some(1),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn access_token_decodes_back_to_the_user() {
        let token = issue_token(&user(), TokenType::Access, "secret", Duration::minutes(5)).unwrap();
        let claims = decode_token(&token, "secret", TokenType::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), 12);
        assert_eq!(claims.role.as_deref(), Some("TINGLOVCHI"));
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let token = issue_token(&user(), TokenType::Refresh, "secret", Duration::days(1)).unwrap();
        assert!(matches!(
            decode_token(&token, "secret", TokenType::Access),
            Err(Error::Unauthorized(_))
        ));
        assert!(decode_token(&token, "other", TokenType::Refresh).is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = issue_token(&user(), TokenType::Access, "secret", Duration::minutes(-10)).unwrap();
        assert!(matches!(
            decode_token(&token, "secret", TokenType::Access),
            Err(Error::Token(_))
        ));
    }
}
