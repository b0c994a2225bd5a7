use axum::Json;
use bcrypt::{DEFAULT_COST, hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::Config;

pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_USER: &str = "USER";

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    hash(password.as_bytes(), DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password.as_bytes(), hash)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,     // 用户ID
    pub role: String, // 用户角色
    pub exp: i64,     // 过期时间
    pub iat: i64,     // 签发时间
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

pub fn generate_token(
    user_id: i32,
    role: &str,
    config: &Config,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::seconds(config.jwt_expiration().as_secs() as i64))
        .unwrap_or(now)
        .timestamp();

    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        exp: expiration,
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// 统一的JSON响应包装，成功时带data，失败时带error
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn success_to_api_response<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data: Some(data),
        error: None,
    })
}

pub fn error_to_api_response<T>(msg: impl Into<String>) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: false,
        data: None,
        error: Some(msg.into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/test".into(),
            jwt_secret: "test-secret".into(),
            jwt_expiration_secs: 3600,
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
            upload_dir: "public/uploads".into(),
        }
    }

    #[test]
    fn password_hash_roundtrip() {
        let hashed = hash_password("admin123456").unwrap();
        assert!(verify_password("admin123456", &hashed).unwrap());
        assert!(!verify_password("wrong-password", &hashed).unwrap());
    }

    #[test]
    fn token_roundtrip_preserves_claims() {
        let config = test_config();
        let token = generate_token(42, ROLE_ADMIN, &config).unwrap();
        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, ROLE_ADMIN);
        assert!(claims.is_admin());
    }

    #[test]
    fn token_with_wrong_secret_is_rejected() {
        let config = test_config();
        let token = generate_token(1, ROLE_USER, &config).unwrap();
        let mut other = test_config();
        other.jwt_secret = "another-secret".into();
        assert!(verify_token(&token, &other).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = test_config();
        let claims = Claims {
            sub: 1,
            role: ROLE_USER.into(),
            exp: Utc::now().timestamp() - 3600,
            iat: Utc::now().timestamp() - 7200,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .unwrap();
        assert!(verify_token(&token, &config).is_err());
    }

    #[test]
    fn non_admin_claims() {
        let claims = Claims {
            sub: 7,
            role: ROLE_USER.into(),
            exp: 0,
            iat: 0,
        };
        assert!(!claims.is_admin());
    }
}
