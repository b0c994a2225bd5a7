use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    AppState,
    routes::user::model::{User, UserInfo},
    utils::{error_to_api_response, generate_token, success_to_api_response, verify_password},
};

use super::model::{LoginRequest, LoginResponse};

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    if req.email.is_empty() || req.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("邮箱和密码都是必填项"),
        );
    }

    let user = match User::find_by_email(&state.pool, &req.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return (
                StatusCode::UNAUTHORIZED,
                error_to_api_response("邮箱或密码错误"),
            );
        }
        Err(e) => {
            tracing::error!("Failed to look up user for login: {:?}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("登录失败"),
            );
        }
    };

    match verify_password(&req.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::UNAUTHORIZED,
                error_to_api_response("邮箱或密码错误"),
            );
        }
        Err(e) => {
            tracing::error!("Password verification failed: {:?}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("登录失败"),
            );
        }
    }

    match generate_token(user.id, &user.role, &state.config) {
        Ok(token) => (
            StatusCode::OK,
            success_to_api_response(LoginResponse {
                token,
                user: UserInfo::from(user),
            }),
        ),
        Err(e) => {
            tracing::error!("Failed to generate token: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response("生成令牌失败"),
            )
        }
    }
}
