use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use crate::{
    AppState,
    utils::{error_to_api_response, verify_token},
};

/// 验证Bearer令牌，并将Claims写入请求扩展供handler使用
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return (
            StatusCode::UNAUTHORIZED,
            error_to_api_response::<()>("未授权"),
        )
            .into_response();
    };

    match verify_token(bearer.token(), &state.config) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!("Token verification failed: {}", e);
            (
                StatusCode::UNAUTHORIZED,
                error_to_api_response::<()>("未授权"),
            )
                .into_response()
        }
    }
}
