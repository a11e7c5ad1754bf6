use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs;

use crate::error::{Error, Result};

const GENERIC_MEDIA_TYPE: &str = "application/octet-stream";

/// A resume file ready to be embedded in an analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePayload {
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl ResumePayload {
    /// `data:<mime>;base64,<bytes>`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, BASE64.encode(&self.bytes))
    }

    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let (media_type, data) = parse_data_uri(uri)?;
        let bytes = BASE64
            .decode(data)
            .map_err(|e| Error::Validation(format!("Data URI payload is not base64: {}", e)))?;
        Ok(Self {
            media_type: media_type.to_string(),
            bytes,
        })
    }

    /// Hex SHA-256 of the content, used to identify a document in logs.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

/// Splits a base64 data URI into its media type and encoded payload.
pub fn parse_data_uri(uri: &str) -> Result<(&str, &str)> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Error::Validation("Data URI must start with 'data:'".into()))?;
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| Error::Validation("Data URI is missing its payload".into()))?;
    let media_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| Error::Validation("Only base64 data URIs are supported".into()))?;
    let media_type = if media_type.is_empty() {
        GENERIC_MEDIA_TYPE
    } else {
        media_type
    };
    Ok((media_type, data))
}

/// Turns an uploaded file into a payload. Empty files are rejected.
pub fn ingest(file_name: &str, declared_type: Option<&str>, bytes: Vec<u8>) -> Result<ResumePayload> {
    if bytes.is_empty() {
        return Err(Error::Validation(format!("Resume file {:?} is empty", file_name)));
    }

    let media_type = match declared_type.map(str::trim) {
        Some(declared) if !declared.is_empty() && declared != GENERIC_MEDIA_TYPE => {
            declared.to_string()
        }
        _ => media_type_for(file_name).to_string(),
    };

    Ok(ResumePayload { media_type, bytes })
}

pub async fn ingest_path(path: impl AsRef<Path>) -> Result<ResumePayload> {
    let path = path.as_ref();
    let bytes = fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    ingest(file_name, None, bytes)
}

fn media_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        "rtf" => "application/rtf",
        _ => GENERIC_MEDIA_TYPE,
    }
}
