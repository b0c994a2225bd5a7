use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: i32,
    pub expert_id: i32,
    pub name: String,
    pub issuer: Option<String>,
    pub issue_date: Option<String>,
    pub expiry_date: Option<String>,
    pub file_url: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 创建证书请求体，expertId指向已存在的专家
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateCertificateRequest {
    pub expert_id: i32,
    pub name: String,
    pub issuer: Option<String>,
    pub issue_date: Option<String>,
    pub expiry_date: Option<String>,
    pub file_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateCertificateRequest {
    pub name: String,
    pub issuer: Option<String>,
    pub issue_date: Option<String>,
    pub expiry_date: Option<String>,
    pub file_url: Option<String>,
    pub description: Option<String>,
}

impl CreateCertificateRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("证书名称不能为空".to_string());
        }
        Ok(())
    }
}

impl UpdateCertificateRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("证书名称不能为空".to_string());
        }
        Ok(())
    }
}

const CERTIFICATE_COLUMNS: &str =
    "id, expert_id, name, issuer, issue_date, expiry_date, file_url, description, \
     created_at, updated_at";

impl Certificate {
    pub async fn create(
        pool: &PgPool,
        req: &CreateCertificateRequest,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Certificate>(&format!(
            r#"
            INSERT INTO certificates (expert_id, name, issuer, issue_date, expiry_date, file_url, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CERTIFICATE_COLUMNS}
            "#,
        ))
        .bind(req.expert_id)
        .bind(&req.name)
        .bind(&req.issuer)
        .bind(&req.issue_date)
        .bind(&req.expiry_date)
        .bind(&req.file_url)
        .bind(&req.description)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Certificate>(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_expert(pool: &PgPool, expert_id: i32) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Certificate>(&format!(
            r#"
            SELECT {CERTIFICATE_COLUMNS}
            FROM certificates
            WHERE expert_id = $1
            ORDER BY created_at DESC
            "#,
        ))
        .bind(expert_id)
        .fetch_all(pool)
        .await
    }

    /// 批量查询一组专家的证书，用于专家列表的证书内嵌
    pub async fn find_by_expert_ids(
        pool: &PgPool,
        expert_ids: &[i32],
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Certificate>(&format!(
            r#"
            SELECT {CERTIFICATE_COLUMNS}
            FROM certificates
            WHERE expert_id = ANY($1)
            ORDER BY created_at DESC
            "#,
        ))
        .bind(expert_ids.to_vec())
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: i32,
        req: &UpdateCertificateRequest,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Certificate>(&format!(
            r#"
            UPDATE certificates
            SET name = $1, issuer = $2, issue_date = $3, expiry_date = $4,
                file_url = $5, description = $6, updated_at = NOW()
            WHERE id = $7
            RETURNING {CERTIFICATE_COLUMNS}
            "#,
        ))
        .bind(&req.name)
        .bind(&req.issuer)
        .bind(&req.issue_date)
        .bind(&req.expiry_date)
        .bind(&req.file_url)
        .bind(&req.description)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM certificates WHERE id = $1")
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
    fn create_request_requires_name() {
        let req = CreateCertificateRequest {
            expert_id: 1,
            name: "  ".into(),
            ..Default::default()
        };
        assert_eq!(req.validate(), Err("证书名称不能为空".to_string()));

        let req = CreateCertificateRequest {
            expert_id: 1,
            name: "高级工程师证书".into(),
            ..Default::default()
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn update_request_requires_name() {
        let req = UpdateCertificateRequest::default();
        assert_eq!(req.validate(), Err("证书名称不能为空".to_string()));
    }
}
