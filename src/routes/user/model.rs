use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::utils::hash_password;

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 对外返回的用户信息，不含密码哈希
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        UserInfo {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub email: String,
    pub name: String,
    pub role: Option<String>,
    pub password: Option<String>,
}

impl User {
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, name, password_hash, role, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<UserInfo>, sqlx::Error> {
        sqlx::query_as::<_, UserInfo>(
            r#"
            SELECT id, email, name, role, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<UserInfo>, sqlx::Error> {
        sqlx::query_as::<_, UserInfo>(
            r#"
            SELECT id, email, name, role, created_at
            FROM users
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &PgPool, req: &CreateUserRequest) -> Result<UserInfo, sqlx::Error> {
        let password_hash = hash_password(&req.password)
            .map_err(|e| sqlx::Error::Protocol(format!("Failed to hash password: {}", e)))?;
        let role = req.role.as_deref().unwrap_or(crate::utils::ROLE_USER);

        sqlx::query_as::<_, UserInfo>(
            r#"
            INSERT INTO users (email, name, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, name, role, created_at
            "#,
        )
        .bind(&req.email)
        .bind(&req.name)
        .bind(&password_hash)
        .bind(role)
        .fetch_one(pool)
        .await
    }

    /// 全量更新用户信息；password非空时重新加密存储，role缺省时保留原角色
    pub async fn update(
        pool: &PgPool,
        id: i32,
        req: &UpdateUserRequest,
    ) -> Result<Option<UserInfo>, sqlx::Error> {
        match req.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => {
                let password_hash = hash_password(password).map_err(|e| {
                    sqlx::Error::Protocol(format!("Failed to hash password: {}", e))
                })?;
                sqlx::query_as::<_, UserInfo>(
                    r#"
                    UPDATE users
                    SET email = $1, name = $2, role = COALESCE($3, role),
                        password_hash = $4, updated_at = NOW()
                    WHERE id = $5
                    RETURNING id, email, name, role, created_at
                    "#,
                )
                .bind(&req.email)
                .bind(&req.name)
                .bind(req.role.as_deref())
                .bind(&password_hash)
                .bind(id)
                .fetch_optional(pool)
                .await
            }
            None => {
                sqlx::query_as::<_, UserInfo>(
                    r#"
                    UPDATE users
                    SET email = $1, name = $2, role = COALESCE($3, role), updated_at = NOW()
                    WHERE id = $4
                    RETURNING id, email, name, role, created_at
                    "#,
                )
                .bind(&req.email)
                .bind(&req.name)
                .bind(req.role.as_deref())
                .bind(id)
                .fetch_optional(pool)
                .await
            }
        }
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_without_role_keeps_role_unset() {
        // role缺省时反序列化为None，SQL侧COALESCE保留原角色
        let req: UpdateUserRequest =
            serde_json::from_str(r#"{"email":"a@example.com","name":"甲"}"#).unwrap();
        assert!(req.role.is_none());
        assert!(req.password.is_none());

        let req: UpdateUserRequest =
            serde_json::from_str(r#"{"email":"a@example.com","name":"甲","role":"ADMIN"}"#)
                .unwrap();
        assert_eq!(req.role.as_deref(), Some("ADMIN"));
    }
}
