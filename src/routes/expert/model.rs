use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::routes::certificate::model::Certificate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Expert {
    pub id: i32,
    pub name: String,
    /// 专业领域，逗号分隔
    pub field: String,
    /// 专家特长，逗号分隔
    pub specialty: String,
    pub organization: Option<String>,
    pub contact: Option<String>,
    pub education: Option<String>,
    pub title: Option<String>,
    pub research_direction: Option<String>,
    pub awards: Option<String>,
    pub achievements: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 创建/更新专家的请求体，校验规则与CSV导入共用
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExpertPayload {
    pub name: String,
    pub field: String,
    pub specialty: String,
    pub organization: Option<String>,
    pub contact: Option<String>,
    pub education: Option<String>,
    pub title: Option<String>,
    pub research_direction: Option<String>,
    pub awards: Option<String>,
    pub achievements: Option<String>,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
}

impl ExpertPayload {
    /// 返回第一个不满足约束的字段的提示
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("姓名不能为空".to_string());
        }
        if self.field.trim().is_empty() {
            return Err("专业领域不能为空".to_string());
        }
        if self.specialty.trim().is_empty() {
            return Err("专家特长不能为空".to_string());
        }
        if let Some(bio) = &self.bio {
            if bio.chars().count() > 500 {
                return Err("个人简介不能超过500字".to_string());
            }
        }
        Ok(())
    }
}

/// 专家详情，内嵌其证书列表
#[derive(Debug, Serialize)]
pub struct ExpertWithCertificates {
    #[serde(flatten)]
    pub expert: Expert,
    pub certificates: Vec<Certificate>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_count: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total_count: i64) -> Self {
        let total_pages = if limit > 0 {
            (total_count + limit - 1) / limit
        } else {
            0
        };
        Pagination {
            current_page: page,
            total_pages,
            total_count,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

const EXPERT_COLUMNS: &str =
    "id, name, field, specialty, organization, contact, education, title, \
     research_direction, awards, achievements, bio, photo_url, created_at, updated_at";

const SEARCH_CONDITION: &str =
    "name ILIKE $1 OR field ILIKE $1 OR specialty ILIKE $1 OR organization ILIKE $1";

impl Expert {
    pub async fn count(pool: &PgPool, query: &str) -> Result<i64, sqlx::Error> {
        if query.is_empty() {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM experts")
                .fetch_one(pool)
                .await
        } else {
            sqlx::query_scalar::<_, i64>(&format!(
                "SELECT COUNT(*) FROM experts WHERE {SEARCH_CONDITION}",
            ))
            .bind(format!("%{}%", query))
            .fetch_one(pool)
            .await
        }
    }

    /// 按创建时间倒序分页查询；query非空时对姓名/领域/特长/单位做模糊匹配
    pub async fn search(
        pool: &PgPool,
        query: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        if query.is_empty() {
            sqlx::query_as::<_, Expert>(&format!(
                r#"
                SELECT {EXPERT_COLUMNS}
                FROM experts
                ORDER BY created_at DESC
                LIMIT $1 OFFSET $2
                "#,
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        } else {
            sqlx::query_as::<_, Expert>(&format!(
                r#"
                SELECT {EXPERT_COLUMNS}
                FROM experts
                WHERE {SEARCH_CONDITION}
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#,
            ))
            .bind(format!("%{}%", query))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Expert>(&format!(
            "SELECT {EXPERT_COLUMNS} FROM experts WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(pool: &PgPool, payload: &ExpertPayload) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Expert>(&format!(
            r#"
            INSERT INTO experts (name, field, specialty, organization, contact, education,
                                 title, research_direction, awards, achievements, bio, photo_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {EXPERT_COLUMNS}
            "#,
        ))
        .bind(&payload.name)
        .bind(&payload.field)
        .bind(&payload.specialty)
        .bind(&payload.organization)
        .bind(&payload.contact)
        .bind(&payload.education)
        .bind(&payload.title)
        .bind(&payload.research_direction)
        .bind(&payload.awards)
        .bind(&payload.achievements)
        .bind(&payload.bio)
        .bind(&payload.photo_url)
        .fetch_one(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: i32,
        payload: &ExpertPayload,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Expert>(&format!(
            r#"
            UPDATE experts
            SET name = $1, field = $2, specialty = $3, organization = $4, contact = $5,
                education = $6, title = $7, research_direction = $8, awards = $9,
                achievements = $10, bio = $11, photo_url = $12, updated_at = NOW()
            WHERE id = $13
            RETURNING {EXPERT_COLUMNS}
            "#,
        ))
        .bind(&payload.name)
        .bind(&payload.field)
        .bind(&payload.specialty)
        .bind(&payload.organization)
        .bind(&payload.contact)
        .bind(&payload.education)
        .bind(&payload.title)
        .bind(&payload.research_direction)
        .bind(&payload.awards)
        .bind(&payload.achievements)
        .bind(&payload.bio)
        .bind(&payload.photo_url)
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM experts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_payload() -> ExpertPayload {
        ExpertPayload {
            name: "张三".into(),
            field: "人工智能,机器学习".into(),
            specialty: "深度学习,自然语言处理".into(),
            ..Default::default()
        }
    }

    #[test]
    fn payload_validation_reports_first_error() {
        let mut payload = valid_payload();
        payload.name = "".into();
        payload.field = "".into();
        assert_eq!(payload.validate(), Err("姓名不能为空".to_string()));

        let mut payload = valid_payload();
        payload.field = "  ".into();
        assert_eq!(payload.validate(), Err("专业领域不能为空".to_string()));

        let mut payload = valid_payload();
        payload.specialty = "".into();
        assert_eq!(payload.validate(), Err("专家特长不能为空".to_string()));
    }

    #[test]
    fn bio_limit_counts_characters_not_bytes() {
        let mut payload = valid_payload();
        payload.bio = Some("简".repeat(500));
        assert!(payload.validate().is_ok());

        payload.bio = Some("简".repeat(501));
        assert_eq!(payload.validate(), Err("个人简介不能超过500字".to_string()));
    }

    #[test]
    fn pagination_uses_ceiling_division() {
        let p = Pagination::new(1, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);

        let p = Pagination::new(3, 10, 25);
        assert!(!p.has_next);
        assert!(p.has_prev);

        let p = Pagination::new(2, 10, 30);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(p.has_prev);
    }

    #[test]
    fn pagination_of_empty_set() {
        let p = Pagination::new(1, 10, 0);
        assert_eq!(
            p,
            Pagination {
                current_page: 1,
                total_pages: 0,
                total_count: 0,
                has_next: false,
                has_prev: false,
            }
        );
    }
}
