use axum::{
    extract::{Extension, Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};

use crate::{
    AppState,
    utils::{Claims, error_to_api_response, success_to_api_response},
};

use super::model::UploadResponse;

const MAX_FILE_SIZE: usize = 5 * 1024 * 1024;

const ALLOWED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp"];
const ALLOWED_DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/jpeg",
    "image/jpg",
    "image/png",
];

/// type参数对应的MIME白名单和存储子目录
fn upload_kind(kind: &str) -> Option<(&'static [&'static str], &'static str)> {
    match kind {
        "photo" => Some((ALLOWED_IMAGE_TYPES, "photos")),
        "certificate" => Some((ALLOWED_DOCUMENT_TYPES, "certificates")),
        _ => None,
    }
}

/// 时间戳加随机后缀；扩展名仅保留纯字母数字的，杜绝路径字符混入文件名
fn generate_file_name(original_name: &str, timestamp_millis: i64, suffix: &str) -> String {
    match original_name.rsplit_once('.') {
        Some((_, extension))
            if !extension.is_empty() && extension.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            format!("{}_{}.{}", timestamp_millis, suffix, extension)
        }
        _ => format!("{}_{}", timestamp_millis, suffix),
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(13)
        .map(char::from)
        .collect()
}

#[axum::debug_handler]
pub async fn upload_file(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if !claims.is_admin() {
        return (StatusCode::FORBIDDEN, error_to_api_response("权限不足"));
    }

    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut kind: Option<String> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name() {
                Some("file") => {
                    let original_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    match field.bytes().await {
                        Ok(bytes) => file = Some((original_name, content_type, bytes.to_vec())),
                        Err(e) => {
                            tracing::error!("Failed to read uploaded file: {}", e);
                            return (
                                StatusCode::BAD_REQUEST,
                                error_to_api_response("读取上传文件失败"),
                            );
                        }
                    }
                }
                Some("type") => {
                    kind = field.text().await.ok();
                }
                _ => {}
            },
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Malformed multipart request: {}", e);
                return (
                    StatusCode::BAD_REQUEST,
                    error_to_api_response("读取上传文件失败"),
                );
            }
        }
    }

    let Some((original_name, content_type, bytes)) = file else {
        return (StatusCode::BAD_REQUEST, error_to_api_response("请选择文件"));
    };

    if bytes.len() > MAX_FILE_SIZE {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("文件大小不能超过5MB"),
        );
    }

    let Some((allowed_types, subdir)) = kind.as_deref().and_then(upload_kind) else {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response("无效的文件类型"),
        );
    };

    if !allowed_types.contains(&content_type.as_str()) {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(format!("不支持的文件格式: {}", content_type)),
        );
    }

    let file_name = generate_file_name(
        &original_name,
        Utc::now().timestamp_millis(),
        &random_suffix(),
    );

    let upload_path = state.config.upload_dir.join(subdir);
    if let Err(e) = tokio::fs::create_dir_all(&upload_path).await {
        tracing::error!("Failed to create upload directory: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response("文件上传失败"),
        );
    }

    if let Err(e) = tokio::fs::write(upload_path.join(&file_name), &bytes).await {
        tracing::error!("Failed to write uploaded file: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response("文件上传失败"),
        );
    }

    let file_url = format!("/uploads/{}/{}", subdir, file_name);

    (
        StatusCode::OK,
        success_to_api_response(UploadResponse {
            file_name,
            file_url,
            original_name,
            size: bytes.len(),
            content_type,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn photo_kind_allows_images_only() {
        let (types, subdir) = upload_kind("photo").unwrap();
        assert_eq!(subdir, "photos");
        assert!(types.contains(&"image/webp"));
        assert!(!types.contains(&"application/pdf"));
    }

    #[test]
    fn certificate_kind_allows_documents_and_images() {
        let (types, subdir) = upload_kind("certificate").unwrap();
        assert_eq!(subdir, "certificates");
        assert!(types.contains(&"application/pdf"));
        assert!(types.contains(&"image/png"));
        assert!(!types.contains(&"image/webp"));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(upload_kind("archive").is_none());
        assert!(upload_kind("").is_none());
    }

    #[test]
    fn generated_name_keeps_extension() {
        let name = generate_file_name("头像.PNG", 1700000000000, "abc123def4567");
        assert_eq!(name, "1700000000000_abc123def4567.PNG");
    }

    #[test]
    fn generated_name_without_extension() {
        let name = generate_file_name("photo", 1700000000000, "abc123def4567");
        assert_eq!(name, "1700000000000_abc123def4567");
    }

    #[test]
    fn generated_name_drops_non_alphanumeric_extension() {
        let name = generate_file_name("x./foo", 1700000000000, "abc123def4567");
        assert_eq!(name, "1700000000000_abc123def4567");

        let name = generate_file_name("档案.p df", 1700000000000, "abc123def4567");
        assert_eq!(name, "1700000000000_abc123def4567");

        let name = generate_file_name("档案.pdf", 1700000000000, "abc123def4567");
        assert_eq!(name, "1700000000000_abc123def4567.pdf");
    }

    #[test]
    fn random_suffix_is_alphanumeric() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 13);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
