// CLASSIFICATION: COMMUNITY
// Filename: mime.rs v0.1
// Author: Lukas Bower
// Date Modified: 2026-06-19

//! Extension-based MIME inference for binary reads.

use std::path::Path;

/// Infer a MIME type from the file extension, lower-cased.
///
/// Unknown or missing extensions fall back to `application/octet-stream`.
pub fn mime_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("json") => "application/json",
        Some("csv") => "text/csv",
        Some("html") => "text/html",
        Some("yaml") | Some("yml") => "text/yaml",
        Some("xml") => "text/xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("pptx") => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}
