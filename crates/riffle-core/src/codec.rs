use crate::error::ScrapeError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime: String,
    pub bytes: Vec<u8>,
}

fn data_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^data:(.+);base64,(.+)$").expect("pattern is valid"))
}

/// Splits a `data:<mime>;base64,<body>` payload into mime type and raw bytes.
/// Anything that does not match that exact shape, including a body that is
/// not valid base64, is a malformed payload.
pub fn decode(payload: &str) -> Result<DecodedImage, ScrapeError> {
    let caps = data_url_pattern()
        .captures(payload)
        .ok_or_else(|| malformed(payload))?;
    let mime = caps[1].to_string();
    let bytes = STANDARD
        .decode(&caps[2])
        .map_err(|_| malformed(payload))?;
    Ok(DecodedImage { mime, bytes })
}

fn malformed(payload: &str) -> ScrapeError {
    // Canvas payloads run to megabytes; keep the error readable.
    let head: String = payload.chars().take(64).collect();
    ScrapeError::MalformedPayload(head)
}

/// File extension for a decoded image's mime type. Unknown types fall back to
/// png, which is what the observed viewers serve.
pub fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    }
}
