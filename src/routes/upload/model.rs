use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_name: String,
    pub file_url: String,
    pub original_name: String,
    pub size: usize,
    #[serde(rename = "type")]
    pub content_type: String,
}
