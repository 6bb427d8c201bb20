//! Vacancy file and resume transfers
//!
//! Downloads are named after the server's `Content-Disposition` header when
//! it carries a usable filename, otherwise after the resource id plus an
//! extension guessed from the content type.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, CONTENT_DISPOSITION, CONTENT_TYPE};
use serde_json::Value;

use super::client::{ApiClient, ApiError, ApiRequest, FormPart, RequestKind};

/// Which kind of stored file to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    Vacancy,
    Resume,
}

impl DownloadKind {
    fn endpoint(self, id: u64) -> String {
        match self {
            DownloadKind::Vacancy => format!("/download/vacancy/{}", id),
            DownloadKind::Resume => format!("/download/candidate/{}", id),
        }
    }

    fn fallback_stem(self, id: u64) -> String {
        match self {
            DownloadKind::Vacancy => format!("vacancy_{}", id),
            DownloadKind::Resume => format!("resume_{}", id),
        }
    }
}

#[derive(Debug)]
pub struct DownloadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Extract a filename from a `Content-Disposition` header value.
///
/// `filename*=UTF-8''...` (RFC 5987) wins over a plain `filename=`. A
/// `filename*` that does not percent-decode falls through to `filename=`.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    static ENCODED: OnceLock<Regex> = OnceLock::new();
    static PLAIN: OnceLock<Regex> = OnceLock::new();

    let encoded = ENCODED.get_or_init(|| {
        Regex::new(r#"(?i)filename\*\s*=\s*UTF-8''([^;]+)"#).expect("valid regex")
    });
    if let Some(caps) = encoded.captures(header) {
        match urlencoding::decode(caps[1].trim()) {
            Ok(name) if !name.is_empty() => return Some(name.into_owned()),
            Ok(_) => {}
            Err(e) => tracing::warn!("Undecodable filename* in Content-Disposition: {}", e),
        }
    }

    let plain = PLAIN.get_or_init(|| {
        Regex::new(r#"(?i)filename\s*=\s*(?:"([^"]+)"|([^;]+))"#).expect("valid regex")
    });
    let caps = plain.captures(header)?;
    let name = caps
        .get(1)
        .or_else(|| caps.get(2))?
        .as_str()
        .trim()
        .trim_matches('"');
    (!name.is_empty()).then(|| name.to_string())
}

/// File extension (with dot) for a response content type.
pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let Some(content_type) = content_type else {
        return ".bin";
    };
    let ct = content_type.to_ascii_lowercase();

    if ct.contains("openxmlformats-officedocument.wordprocessingml.document") {
        ".docx"
    } else if ct.contains("word") {
        ".doc"
    } else if ct.contains("pdf") {
        ".pdf"
    } else if ct.contains("font/ttf") || ct.contains("font-truetype") {
        ".ttf"
    } else if ct.contains("font/woff2") {
        ".woff2"
    } else if ct.contains("font/woff") {
        ".woff"
    } else if ct.contains("font/otf") {
        ".otf"
    } else if ct.contains("font/") {
        ".font"
    } else {
        ".bin"
    }
}

/// Final filename for a download.
pub fn resolve_filename(
    kind: DownloadKind,
    id: u64,
    content_disposition: Option<&str>,
    content_type: Option<&str>,
) -> String {
    content_disposition
        .and_then(filename_from_content_disposition)
        .and_then(|name| sanitize_filename(&name))
        .unwrap_or_else(|| {
            format!(
                "{}{}",
                kind.fallback_stem(id),
                extension_for_content_type(content_type)
            )
        })
}

/// Keep only the last path component of a server-supplied name.
fn sanitize_filename(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next()?.trim();
    match last {
        "" | "." | ".." => None,
        other => Some(other.to_string()),
    }
}

/// Header value as text. Servers send raw UTF-8 filenames, which
/// `HeaderValue::to_str` rejects.
fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

/// `dir/filename`, or `dir/stem (N).ext` for the first N not already taken.
fn available_path(dir: &Path, filename: &str) -> PathBuf {
    let target = dir.join(filename);
    if !target.exists() {
        return target;
    }

    let name = Path::new(filename);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    let ext = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1u32..)
        .map(|n| dir.join(format!("{} ({}){}", stem, n, ext)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(target)
}

pub async fn download(
    client: &ApiClient,
    kind: DownloadKind,
    id: u64,
) -> Result<DownloadedFile, ApiError> {
    let request = ApiRequest::get(kind.endpoint(id)).kind(RequestKind::Transfer);
    let resp = client.send(&request).await?;

    let filename = resolve_filename(
        kind,
        id,
        header_text(resp.headers(), CONTENT_DISPOSITION).as_deref(),
        header_text(resp.headers(), CONTENT_TYPE).as_deref(),
    );

    let url = resp.url().to_string();
    let bytes = resp.bytes().await.map_err(|e| ApiError::Decode {
        url,
        message: e.to_string(),
    })?;

    Ok(DownloadedFile {
        filename,
        bytes: bytes.to_vec(),
    })
}

/// Download into `dir` and return the written path.
pub async fn download_to(
    client: &ApiClient,
    kind: DownloadKind,
    id: u64,
    dir: &Path,
) -> Result<PathBuf> {
    let file = download(client, kind, id).await?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let target = available_path(dir, &file.filename);
    if target.file_name() != Some(std::ffi::OsStr::new(&file.filename)) {
        tracing::warn!(
            "{} already exists in {}, saving as {}",
            file.filename,
            dir.display(),
            target.display()
        );
    }
    tokio::fs::write(&target, &file.bytes)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;

    tracing::info!("Saved {} bytes to {}", file.bytes.len(), target.display());
    Ok(target)
}

async fn file_part(field: &str, path: &Path) -> Result<FormPart> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Not a file path: {}", path.display()))?
        .to_string();
    let mime = mime_guess::from_path(path).first_or_octet_stream().to_string();

    Ok(FormPart::File {
        name: field.to_string(),
        file_name,
        mime,
        bytes,
    })
}

/// Parse a response body as JSON, keeping it as a string when it is not.
fn json_or_text(text: String) -> Value {
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

/// Upload a vacancy description file (`info_cv`).
pub async fn upload_vacancy_file(client: &ApiClient, path: &Path) -> Result<Value> {
    let part = file_part("info_cv", path).await?;
    let request = ApiRequest::post("/vacancy")
        .multipart(vec![part])
        .kind(RequestKind::Transfer);

    let resp = client
        .send(&request)
        .await
        .context("Vacancy upload failed")?;
    let text = resp.text().await.context("Failed to read upload response")?;
    Ok(json_or_text(text))
}

/// Add a candidate to a vacancy with one or more resumes.
pub async fn add_candidate(client: &ApiClient, vacancy_id: u64, resumes: &[PathBuf]) -> Result<Value> {
    anyhow::ensure!(!resumes.is_empty(), "At least one resume is required");

    let mut parts = vec![FormPart::Text {
        name: "vacancy_id".to_string(),
        value: vacancy_id.to_string(),
    }];
    for path in resumes {
        parts.push(file_part("resumes", path).await?);
    }

    let request = ApiRequest::post("/candidate")
        .multipart(parts)
        .kind(RequestKind::Transfer);
    let resp = client
        .send(&request)
        .await
        .context("Adding candidate failed")?;
    let text = resp.text().await.context("Failed to read response")?;
    Ok(json_or_text(text))
}
