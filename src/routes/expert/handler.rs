use std::collections::HashMap;

use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    routes::certificate::model::Certificate,
    utils::{Claims, error_to_api_response, success_to_api_response},
};

use super::model::{Expert, ExpertPayload, ExpertWithCertificates, Pagination};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub query: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// 专家列表响应，data之外附带分页信息
#[derive(Debug, Serialize)]
pub struct ExpertListResponse {
    pub success: bool,
    pub data: Vec<ExpertWithCertificates>,
    pub pagination: Pagination,
}

/// 页码与每页数量下限为1；偏移量饱和运算，超大页码不会回绕为负数
fn page_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(10).max(1);
    (page, limit, page.saturating_sub(1).saturating_mul(limit))
}

/// 将一批专家与各自的证书配对
async fn attach_certificates(
    state: &AppState,
    experts: Vec<Expert>,
) -> Result<Vec<ExpertWithCertificates>, sqlx::Error> {
    let ids: Vec<i32> = experts.iter().map(|e| e.id).collect();
    let mut by_expert: HashMap<i32, Vec<Certificate>> = HashMap::new();
    if !ids.is_empty() {
        for cert in Certificate::find_by_expert_ids(&state.pool, &ids).await? {
            by_expert.entry(cert.expert_id).or_default().push(cert);
        }
    }

    Ok(experts
        .into_iter()
        .map(|expert| {
            let certificates = by_expert.remove(&expert.id).unwrap_or_default();
            ExpertWithCertificates {
                expert,
                certificates,
            }
        })
        .collect())
}

#[axum::debug_handler]
pub async fn list_experts(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Response {
    let (page, limit, offset) = page_window(params.page, params.limit);
    let query = params.query.unwrap_or_default();

    let total_count = match Expert::count(&state.pool, &query).await {
        Ok(count) => count,
        Err(e) => {
            tracing::error!("Failed to count experts: {:?}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response::<()>("获取专家列表失败"),
            )
                .into_response();
        }
    };

    let experts = match Expert::search(&state.pool, &query, limit, offset).await {
        Ok(experts) => experts,
        Err(e) => {
            tracing::error!("Failed to search experts: {:?}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response::<()>("获取专家列表失败"),
            )
                .into_response();
        }
    };

    match attach_certificates(&state, experts).await {
        Ok(data) => (
            StatusCode::OK,
            Json(ExpertListResponse {
                success: true,
                data,
                pagination: Pagination::new(page, limit, total_count),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to load certificates: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response::<()>("获取专家列表失败"),
            )
                .into_response()
        }
    }
}

#[axum::debug_handler]
pub async fn get_expert(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<i32>() else {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response::<()>("无效的专家ID"),
        )
            .into_response();
    };

    let expert = match Expert::find_by_id(&state.pool, id).await {
        Ok(Some(expert)) => expert,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                error_to_api_response::<()>("专家不存在"),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!("Failed to get expert {}: {:?}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response::<()>("获取专家详情失败"),
            )
                .into_response();
        }
    };

    match Certificate::find_by_expert(&state.pool, id).await {
        Ok(certificates) => (
            StatusCode::OK,
            success_to_api_response(ExpertWithCertificates {
                expert,
                certificates,
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to load certificates for expert {}: {:?}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response::<()>("获取专家详情失败"),
            )
                .into_response()
        }
    }
}

#[axum::debug_handler]
pub async fn create_expert(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(payload): Json<ExpertPayload>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (StatusCode::FORBIDDEN, error_to_api_response("权限不足"));
    }

    if let Err(msg) = payload.validate() {
        return (StatusCode::BAD_REQUEST, error_to_api_response(msg));
    }

    match Expert::create(&state.pool, &payload).await {
        Ok(expert) => (StatusCode::OK, success_to_api_response(expert)),
        Err(e) => {
            tracing::error!("Failed to create expert: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("创建专家失败"),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn update_expert(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ExpertPayload>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (StatusCode::FORBIDDEN, error_to_api_response("权限不足"));
    }

    let Ok(id) = id.parse::<i32>() else {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("无效的专家ID"),
        );
    };

    if let Err(msg) = payload.validate() {
        return (StatusCode::BAD_REQUEST, error_to_api_response(msg));
    }

    match Expert::update(&state.pool, id, &payload).await {
        Ok(Some(expert)) => (StatusCode::OK, success_to_api_response(expert)),
        Ok(None) => (StatusCode::NOT_FOUND, error_to_api_response("专家不存在")),
        Err(e) => {
            tracing::error!("Failed to update expert {}: {:?}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("更新专家信息失败"),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn delete_expert(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (StatusCode::FORBIDDEN, error_to_api_response("权限不足"));
    }

    let Ok(id) = id.parse::<i32>() else {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("无效的专家ID"),
        );
    };

    // 证书随专家一起级联删除
    match Expert::delete(&state.pool, id).await {
        Ok(0) => (StatusCode::NOT_FOUND, error_to_api_response("专家不存在")),
        Ok(_) => (StatusCode::OK, success_to_api_response("专家删除成功")),
        Err(e) => {
            tracing::error!("Failed to delete expert {}: {:?}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("删除专家失败"),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_defaults_and_lower_bounds() {
        assert_eq!(page_window(None, None), (1, 10, 0));
        assert_eq!(page_window(Some(3), Some(10)), (3, 10, 20));
        // 非法页码和数量回退到下限
        assert_eq!(page_window(Some(0), Some(-5)), (1, 1, 0));
    }

    #[test]
    fn page_window_saturates_on_huge_page() {
        let (page, _, offset) = page_window(Some(i64::MAX), Some(10));
        assert_eq!(page, i64::MAX);
        assert_eq!(offset, i64::MAX);

        let (_, _, offset) = page_window(Some(i64::MAX), Some(i64::MAX));
        assert!(offset >= 0);
    }
}
