use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    utils::{Claims, error_to_api_response, success_to_api_response},
};

use super::model::{CreateUserRequest, UpdateUserRequest, User};

#[axum::debug_handler]
pub async fn list_users(
    Extension(_claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match User::list(&state.pool).await {
        Ok(users) => (StatusCode::OK, success_to_api_response(users)),
        Err(e) => {
            tracing::error!("Failed to list users: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("获取用户列表失败"),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn create_user(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (StatusCode::FORBIDDEN, error_to_api_response("权限不足"));
    }

    if req.email.is_empty() || req.name.is_empty() || req.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("邮箱、姓名和密码都是必填项"),
        );
    }

    // 检查邮箱是否已存在
    match User::find_by_email(&state.pool, &req.email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                error_to_api_response("该邮箱已被注册"),
            );
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!("Failed to look up email: {:?}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("创建用户失败"),
            );
        }
    }

    match User::create(&state.pool, &req).await {
        Ok(user) => (StatusCode::CREATED, success_to_api_response(user)),
        Err(e) => {
            // 并发下的唯一约束兜底
            if e.to_string().contains("unique constraint") {
                (
                    StatusCode::BAD_REQUEST,
                    error_to_api_response("该邮箱已被注册"),
                )
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response("创建用户失败"),
                )
            }
        }
    }
}

#[axum::debug_handler]
pub async fn get_user(
    Extension(_claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Ok(id) = id.parse::<i32>() else {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("无效的用户ID"),
        );
    };

    match User::find_by_id(&state.pool, id).await {
        Ok(Some(user)) => (StatusCode::OK, success_to_api_response(user)),
        Ok(None) => (StatusCode::NOT_FOUND, error_to_api_response("用户不存在")),
        Err(e) => {
            tracing::error!("Failed to get user {}: {:?}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("获取用户信息失败"),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn update_user(
    Extension(_claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateUserRequest>,
) -> impl IntoResponse {
    let Ok(id) = id.parse::<i32>() else {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("无效的用户ID"),
        );
    };

    if req.email.is_empty() || req.name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("邮箱和姓名都是必填项"),
        );
    }

    match User::update(&state.pool, id, &req).await {
        Ok(Some(user)) => (StatusCode::OK, success_to_api_response(user)),
        Ok(None) => (StatusCode::NOT_FOUND, error_to_api_response("用户不存在")),
        Err(e) => {
            tracing::error!("Failed to update user {}: {:?}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("更新用户信息失败"),
            )
        }
    }
}

#[axum::debug_handler]
pub async fn delete_user(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let Ok(id) = id.parse::<i32>() else {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("无效的用户ID"),
        );
    };

    // 防止删除自己
    if id == claims.sub {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("不能删除自己的账户"),
        );
    }

    match User::delete(&state.pool, id).await {
        Ok(0) => (StatusCode::NOT_FOUND, error_to_api_response("用户不存在")),
        Ok(_) => (StatusCode::OK, success_to_api_response("用户删除成功")),
        Err(e) => {
            tracing::error!("Failed to delete user {}: {:?}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("删除用户失败"),
            )
        }
    }
}
