use std::future::Future;

use axum::{
    extract::{Extension, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    routes::certificate::model::{Certificate, CreateCertificateRequest},
    utils::{Claims, error_to_api_response},
};

use super::model::{Expert, ExpertPayload};

const MAX_IMPORT_SIZE: usize = 5 * 1024 * 1024;
const BATCH_SIZE: usize = 50;
const MAX_REPORTED_ERRORS: usize = 10;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImportError {
    pub row: usize,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub imported: usize,
    pub errors: Vec<ImportError>,
}

/// 解析后的一行导入数据；row_number为CSV行号（数据行从2开始，表头占第1行）
#[derive(Debug, Clone)]
struct ImportRow {
    row_number: usize,
    payload: ExpertPayload,
    certificates: Option<String>,
}

/// CSV证书信息列中JSON数组的元素
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CertificateSeed {
    name: String,
    issuer: Option<String>,
    issue_date: Option<String>,
    expiry_date: Option<String>,
    file_url: Option<String>,
    description: Option<String>,
}

/// 中英文表头映射到规范字段名，未知表头原样保留
fn normalize_header(header: &str) -> String {
    match header.trim() {
        "姓名" | "name" => "name",
        "专业领域" | "field" => "field",
        "专家特长" | "specialty" => "specialty",
        "工作单位" | "organization" => "organization",
        "联系方式" | "contact" => "contact",
        "学历" | "education" => "education",
        "职称" | "title" => "title",
        "研究方向" | "research_direction" => "research_direction",
        "获奖经历" | "awards" => "awards",
        "代表性成果" | "achievements" => "achievements",
        "个人简介" | "bio" => "bio",
        "照片链接" | "photo_url" => "photo_url",
        "证书信息" | "certificates" => "certificates",
        other => other,
    }
    .to_string()
}

fn parse_csv(text: &str) -> Result<Vec<ImportRow>, String> {
    // 字段数与表头不一致视为格式错误
    let mut reader = csv::ReaderBuilder::new().from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(normalize_header)
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| e.to_string())?;

        let mut payload = ExpertPayload::default();
        let mut certificates = None;
        for (i, raw) in record.iter().enumerate() {
            let Some(header) = headers.get(i) else {
                continue;
            };
            let value = raw.trim();
            let optional = (!value.is_empty()).then(|| value.to_string());
            match header.as_str() {
                "name" => payload.name = value.to_string(),
                "field" => payload.field = value.to_string(),
                "specialty" => payload.specialty = value.to_string(),
                "organization" => payload.organization = optional,
                "contact" => payload.contact = optional,
                "education" => payload.education = optional,
                "title" => payload.title = optional,
                "research_direction" => payload.research_direction = optional,
                "awards" => payload.awards = optional,
                "achievements" => payload.achievements = optional,
                "bio" => payload.bio = optional,
                "photo_url" => payload.photo_url = optional,
                "certificates" => certificates = optional,
                _ => {}
            }
        }

        rows.push(ImportRow {
            row_number: index + 2,
            payload,
            certificates,
        });
    }

    Ok(rows)
}

/// 逐行校验，收集每一行的全部校验错误
fn validate_rows(rows: &[ImportRow]) -> Vec<ImportError> {
    let mut errors = Vec::new();
    for row in rows {
        if row.payload.name.is_empty() {
            errors.push(ImportError {
                row: row.row_number,
                field: "name".into(),
                message: "姓名不能为空".into(),
            });
        }
        if row.payload.field.is_empty() {
            errors.push(ImportError {
                row: row.row_number,
                field: "field".into(),
                message: "专业领域不能为空".into(),
            });
        }
        if row.payload.specialty.is_empty() {
            errors.push(ImportError {
                row: row.row_number,
                field: "specialty".into(),
                message: "专家特长不能为空".into(),
            });
        }
        if let Some(bio) = &row.payload.bio {
            if bio.chars().count() > 500 {
                errors.push(ImportError {
                    row: row.row_number,
                    field: "bio".into(),
                    message: "个人简介不能超过500字".into(),
                });
            }
        }
    }
    errors
}

/// 导入专家附带的证书；JSON解析失败只记录日志，不影响该专家的导入
async fn insert_row_certificates(state: &AppState, expert: &Expert, row: &ImportRow) {
    let Some(raw) = &row.certificates else {
        return;
    };

    let seeds: Vec<CertificateSeed> = match serde_json::from_str(raw) {
        Ok(seeds) => seeds,
        Err(e) => {
            tracing::error!(
                "Certificate parsing error for row {}: {}",
                row.row_number,
                e
            );
            return;
        }
    };

    for seed in seeds {
        let req = CreateCertificateRequest {
            expert_id: expert.id,
            name: seed.name,
            issuer: seed.issuer,
            issue_date: seed.issue_date,
            expiry_date: seed.expiry_date,
            file_url: seed.file_url,
            description: seed.description,
        };
        if let Err(e) = Certificate::create(&state.pool, &req).await {
            tracing::error!(
                "Failed to insert certificate for expert {}: {:?}",
                expert.id,
                e
            );
        }
    }
}

/// 分批并发插入专家；整批失败时退回逐条插入，单条失败只记录错误不中断
async fn insert_in_batches<'a, F, Fut>(
    rows: &'a [ImportRow],
    mut insert: F,
) -> (Vec<(&'a ImportRow, Expert)>, Vec<ImportError>)
where
    F: FnMut(&'a ImportRow) -> Fut,
    Fut: Future<Output = Result<Expert, sqlx::Error>>,
{
    let mut created = Vec::new();
    let mut errors = Vec::new();

    for batch in rows.chunks(BATCH_SIZE) {
        let results = join_all(batch.iter().map(&mut insert)).await;

        if results.iter().all(|r| r.is_ok()) {
            for (row, result) in batch.iter().zip(results) {
                if let Ok(expert) = result {
                    created.push((row, expert));
                }
            }
        } else {
            tracing::error!("Batch insert failed, falling back to row-by-row inserts");
            for row in batch {
                match insert(row).await {
                    Ok(expert) => created.push((row, expert)),
                    Err(e) => {
                        tracing::error!("Insert failed for row {}: {:?}", row.row_number, e);
                        errors.push(ImportError {
                            row: row.row_number,
                            field: "database".into(),
                            message: "数据库插入失败".into(),
                        });
                    }
                }
            }
        }
    }

    (created, errors)
}

#[axum::debug_handler]
pub async fn import_experts(
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Response {
    if !claims.is_admin() {
        return (
            StatusCode::FORBIDDEN,
            error_to_api_response::<()>("权限不足"),
        )
            .into_response();
    }

    let mut file: Option<(String, Vec<u8>)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() == Some("file") {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    match field.bytes().await {
                        Ok(bytes) => file = Some((file_name, bytes.to_vec())),
                        Err(e) => {
                            tracing::error!("Failed to read uploaded file: {}", e);
                            return (
                                StatusCode::BAD_REQUEST,
                                error_to_api_response::<()>("读取上传文件失败"),
                            )
                                .into_response();
                        }
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Malformed multipart request: {}", e);
                return (
                    StatusCode::BAD_REQUEST,
                    error_to_api_response::<()>("读取上传文件失败"),
                )
                    .into_response();
            }
        }
    }

    let Some((file_name, bytes)) = file else {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response::<()>("请选择CSV文件"),
        )
            .into_response();
    };

    if bytes.len() > MAX_IMPORT_SIZE {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response::<()>("文件大小不能超过5MB"),
        )
            .into_response();
    }

    if !file_name.to_lowercase().ends_with(".csv") {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response::<()>("请上传CSV格式文件"),
        )
            .into_response();
    }

    let text = String::from_utf8_lossy(&bytes);
    let rows = match parse_csv(&text) {
        Ok(rows) => rows,
        Err(msg) => {
            return (
                StatusCode::BAD_REQUEST,
                error_to_api_response::<()>(format!("CSV文件格式错误：{}", msg)),
            )
                .into_response();
        }
    };

    // 任何一行校验失败则整体不导入
    let mut errors = validate_rows(&rows);
    if !errors.is_empty() {
        errors.truncate(MAX_REPORTED_ERRORS);
        return (
            StatusCode::OK,
            axum::Json(ImportResponse {
                success: false,
                imported: 0,
                errors,
            }),
        )
            .into_response();
    }

    let (created, mut errors) =
        insert_in_batches(&rows, |row| Expert::create(&state.pool, &row.payload)).await;
    let imported = created.len();

    for (row, expert) in &created {
        insert_row_certificates(&state, expert, row).await;
    }

    tracing::info!("CSV import finished: {} experts imported", imported);

    errors.truncate(MAX_REPORTED_ERRORS);
    (
        StatusCode::OK,
        axum::Json(ImportResponse {
            success: true,
            imported,
            errors,
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_aliases_map_to_canonical_names() {
        assert_eq!(normalize_header("姓名"), "name");
        assert_eq!(normalize_header(" 专业领域 "), "field");
        assert_eq!(normalize_header("证书信息"), "certificates");
        // 规范名映射到自身
        assert_eq!(normalize_header("name"), "name");
        assert_eq!(normalize_header("research_direction"), "research_direction");
        // 未知表头原样保留
        assert_eq!(normalize_header("备注"), "备注");
    }

    #[test]
    fn parse_csv_maps_bilingual_headers() {
        let csv = "姓名,专业领域,专家特长,工作单位,个人简介\n\
                   张三,人工智能,深度学习,XX大学, 知名专家 \n";
        let rows = parse_csv(csv).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.row_number, 2);
        assert_eq!(row.payload.name, "张三");
        assert_eq!(row.payload.field, "人工智能");
        assert_eq!(row.payload.specialty, "深度学习");
        assert_eq!(row.payload.organization.as_deref(), Some("XX大学"));
        // 值两端的空白被去除
        assert_eq!(row.payload.bio.as_deref(), Some("知名专家"));
        assert!(row.certificates.is_none());
    }

    #[test]
    fn parse_csv_captures_certificates_column() {
        let csv = "name,field,specialty,certificates\n\
                   李四,数据科学,数据挖掘,\"[{\"\"name\"\":\"\"奖状\"\"}]\"\n";
        let rows = parse_csv(csv).unwrap();
        assert_eq!(
            rows[0].certificates.as_deref(),
            Some(r#"[{"name":"奖状"}]"#)
        );
    }

    #[test]
    fn parse_csv_empty_values_become_none() {
        let csv = "name,field,specialty,organization,contact\n王五,网络安全,密码学,,\n";
        let rows = parse_csv(csv).unwrap();
        assert!(rows[0].payload.organization.is_none());
        assert!(rows[0].payload.contact.is_none());
    }

    #[test]
    fn parse_csv_rejects_inconsistent_field_counts() {
        let csv = "name,field,specialty\n张三,人工智能\n";
        assert!(parse_csv(csv).is_err());
    }

    #[test]
    fn row_numbers_account_for_header_line() {
        let csv = "name,field,specialty\n\
                   张三,人工智能,深度学习\n\
                   ,数据科学,数据挖掘\n";
        let rows = parse_csv(csv).unwrap();
        let errors = validate_rows(&rows);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].row, 3);
        assert_eq!(errors[0].field, "name");
        assert_eq!(errors[0].message, "姓名不能为空");
    }

    #[test]
    fn validation_collects_all_errors_per_row() {
        let csv = "name,field,specialty\n,,\n";
        let rows = parse_csv(csv).unwrap();
        let errors = validate_rows(&rows);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "field", "specialty"]);
        assert!(errors.iter().all(|e| e.row == 2));
    }

    #[test]
    fn validation_enforces_bio_length() {
        let mut payload = ExpertPayload {
            name: "张三".into(),
            field: "人工智能".into(),
            specialty: "深度学习".into(),
            ..Default::default()
        };
        payload.bio = Some("简".repeat(501));
        let rows = vec![ImportRow {
            row_number: 2,
            payload,
            certificates: None,
        }];
        let errors = validate_rows(&rows);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "bio");
    }

    #[test]
    fn valid_rows_produce_no_errors() {
        let csv = "姓名,专业领域,专家特长\n张三,人工智能,深度学习\n李四,数据科学,数据挖掘\n";
        let rows = parse_csv(csv).unwrap();
        assert!(validate_rows(&rows).is_empty());
    }

    #[test]
    fn certificate_seed_parses_camel_case_json() {
        let raw = r#"[{"name":"证书A","issueDate":"2023-01-01","fileUrl":"/uploads/certificates/a.pdf"}]"#;
        let seeds: Vec<CertificateSeed> = serde_json::from_str(raw).unwrap();
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].name, "证书A");
        assert_eq!(seeds[0].issue_date.as_deref(), Some("2023-01-01"));
        assert_eq!(
            seeds[0].file_url.as_deref(),
            Some("/uploads/certificates/a.pdf")
        );
        assert!(seeds[0].issuer.is_none());
    }

    #[test]
    fn non_array_certificate_json_is_an_error() {
        let raw = r#"{"name":"证书A"}"#;
        assert!(serde_json::from_str::<Vec<CertificateSeed>>(raw).is_err());
    }

    #[test]
    fn batches_of_fifty() {
        let rows: Vec<u32> = (0..60).collect();
        let batches: Vec<_> = rows.chunks(BATCH_SIZE).collect();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 50);
        assert_eq!(batches[1].len(), 10);
    }

    fn import_rows(n: usize) -> Vec<ImportRow> {
        (0..n)
            .map(|i| ImportRow {
                row_number: i + 2,
                payload: ExpertPayload {
                    name: format!("专家{}", i),
                    field: "人工智能".into(),
                    specialty: "深度学习".into(),
                    ..Default::default()
                },
                certificates: None,
            })
            .collect()
    }

    fn fake_expert(id: i32, payload: &ExpertPayload) -> Expert {
        let now = chrono::Utc::now();
        Expert {
            id,
            name: payload.name.clone(),
            field: payload.field.clone(),
            specialty: payload.specialty.clone(),
            organization: None,
            contact: None,
            education: None,
            title: None,
            research_direction: None,
            awards: None,
            achievements: None,
            bio: None,
            photo_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn fallback_rescues_a_failed_batch() {
        let rows = import_rows(60);

        // 第二批并发插入的第一条失败一次，逐条重试全部成功
        let mut calls = 0usize;
        let (created, errors) = insert_in_batches(&rows, |row| {
            let call = calls;
            calls += 1;
            let expert = fake_expert(call as i32, &row.payload);
            async move {
                if call == 50 {
                    Err(sqlx::Error::RowNotFound)
                } else {
                    Ok(expert)
                }
            }
        })
        .await;

        assert_eq!(created.len(), 60);
        assert!(errors.is_empty());
        // 两批并发 + 第二批逐条重试
        assert_eq!(calls, 70);
    }

    #[tokio::test]
    async fn fallback_records_per_row_failures() {
        let mut rows = import_rows(60);
        rows[59].payload.name = "坏数据".into();

        let (created, errors) = insert_in_batches(&rows, |row| {
            let fail = row.payload.name == "坏数据";
            let expert = fake_expert(row.row_number as i32, &row.payload);
            async move {
                if fail {
                    Err(sqlx::Error::RowNotFound)
                } else {
                    Ok(expert)
                }
            }
        })
        .await;

        assert_eq!(created.len(), 59);
        assert_eq!(
            errors,
            vec![ImportError {
                row: 61,
                field: "database".into(),
                message: "数据库插入失败".into(),
            }]
        );
    }
}
