use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState,
    routes::expert::model::Expert,
    utils::{Claims, error_to_api_response, success_to_api_response},
};

use super::model::{Certificate, CreateCertificateRequest, UpdateCertificateRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub expert_id: Option<String>,
}

#[axum::debug_handler]
pub async fn create_certificate(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateCertificateRequest>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (StatusCode::FORBIDDEN, error_to_api_response("权限不足"));
    }

    if let Err(msg) = req.validate() {
        return (StatusCode::BAD_REQUEST, error_to_api_response(msg));
    }

    // 先确认专家存在
    match Expert::find_by_id(&state.pool, req.expert_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return (StatusCode::NOT_FOUND, error_to_api_response("专家不存在"));
        }
        Err(e) => {
            tracing::error!("Failed to look up expert {}: {:?}", req.expert_id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("创建证书失败"),
            );
        }
    }

    match Certificate::create(&state.pool, &req).await {
        Ok(certificate) => (StatusCode::OK, success_to_api_response(certificate)),
        Err(e) => {
            tracing::error!("Failed to create certificate: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("创建证书失败"),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn list_certificates(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> impl IntoResponse {
    let Some(expert_id) = query.expert_id else {
        return (StatusCode::BAD_REQUEST, error_to_api_response("缺少专家ID"));
    };
    let Ok(expert_id) = expert_id.parse::<i32>() else {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("无效的专家ID"),
        );
    };

    match Certificate::find_by_expert(&state.pool, expert_id).await {
        Ok(certificates) => (StatusCode::OK, success_to_api_response(certificates)),
        Err(e) => {
            tracing::error!(
                "Failed to list certificates for expert {}: {:?}",
                expert_id,
                e
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("获取证书列表失败"),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn get_certificate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Ok(id) = id.parse::<i32>() else {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("无效的证书ID"),
        );
    };

    match Certificate::find_by_id(&state.pool, id).await {
        Ok(Some(certificate)) => (StatusCode::OK, success_to_api_response(certificate)),
        Ok(None) => (StatusCode::NOT_FOUND, error_to_api_response("证书不存在")),
        Err(e) => {
            tracing::error!("Failed to get certificate {}: {:?}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("获取证书详情失败"),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn update_certificate(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCertificateRequest>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (StatusCode::FORBIDDEN, error_to_api_response("权限不足"));
    }

    let Ok(id) = id.parse::<i32>() else {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("无效的证书ID"),
        );
    };

    if let Err(msg) = req.validate() {
        return (StatusCode::BAD_REQUEST, error_to_api_response(msg));
    }

    match Certificate::update(&state.pool, id, &req).await {
        Ok(Some(certificate)) => (StatusCode::OK, success_to_api_response(certificate)),
        Ok(None) => (StatusCode::NOT_FOUND, error_to_api_response("证书不存在")),
        Err(e) => {
            tracing::error!("Failed to update certificate {}: {:?}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("更新证书信息失败"),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn delete_certificate(
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
            error_to_api_response("无效的证书ID"),
        );
    };

    match Certificate::delete(&state.pool, id).await {
        Ok(0) => (StatusCode::NOT_FOUND, error_to_api_response("证书不存在")),
        Ok(_) => (StatusCode::OK, success_to_api_response("证书删除成功")),
        Err(e) => {
            tracing::error!("Failed to delete certificate {}: {:?}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("删除证书失败"),
            )
        }
    }
}
