//! MIME type helpers for inbound media.
//!
//! Used to label stored files and to pick storage-key extensions.

use std::path::Path;

/// Detect MIME type by file extension.
pub fn detect_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png"          => "image/png",
        "gif"          => "image/gif",
        "webp"         => "image/webp",
        "heic"         => "image/heic",
        "bmp"          => "image/bmp",
        "tiff" | "tif" => "image/tiff",
        "pdf"          => "application/pdf",
        _              => "application/octet-stream",
    }
}

/// File extension for a stored object: the MIME subtype, without parameters.
///
/// `image/jpeg` → `jpeg`, `image/svg+xml` → `svg+xml`, garbage → `bin`.
pub fn extension_for(mime: &str) -> &str {
    let essence = mime.split(';').next().unwrap_or("").trim();
    match essence.rsplit_once('/') {
        Some((_, sub)) if !sub.is_empty() => sub,
        _ => "bin",
    }
}

/// Whether a file is safe to serve inline (not just download).
pub fn is_inline_safe(mime: &str) -> bool {
    matches!(
        mime,
        "image/jpeg" | "image/png" | "image/gif" | "image/webp" | "application/pdf"
    )
}
