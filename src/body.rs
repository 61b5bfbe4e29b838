// CLASSIFICATION: COMMUNITY
// Filename: body.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-08-01

//! Request decoding: query strings, JSON bodies, and multipart uploads.

use std::collections::HashMap;
use std::io::Read;

use serde::de::DeserializeOwned;
use tiny_http::Request;

use crate::error::FileGateError;

/// Upper bound on an accepted `multipart/form-data` body.
pub const MAX_FORM_BYTES: usize = 32 * 1024 * 1024;

/// Parse the query string of a request URL into a name → value map.
///
/// Values are percent-decoded with `+` treated as space. The first
/// occurrence of a name wins.
pub fn parse_query(url: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let Some((_, query)) = url.split_once('?') else {
        return params;
    };
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(percent_decode(name))
            .or_insert_with(|| percent_decode(value));
    }
    params
}

fn percent_decode(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                decoded.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => match (hex_value(bytes[i + 1]), hex_value(bytes[i + 2]))
            {
                (Some(hi), Some(lo)) => {
                    decoded.push(hi << 4 | lo);
                    i += 3;
                }
                _ => {
                    decoded.push(b'%');
                    i += 1;
                }
            },
            byte => {
                decoded.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|v| v as u8)
}

/// Decode a JSON request body into `T`.
pub fn read_json<T: DeserializeOwned>(request: &mut Request) -> Result<T, FileGateError> {
    serde_json::from_reader(request.as_reader())
        .map_err(|_| FileGateError::BadRequest("invalid request body".to_string()))
}

/// The two fields filegate expects in a binary upload form.
#[derive(Debug)]
pub struct UploadForm {
    /// Workspace-relative destination path (the `path` text field).
    pub path: String,
    /// Raw payload bytes (the `file` field).
    pub file: Vec<u8>,
}

/// Decode a `multipart/form-data` body carrying a `path` field and a `file`
/// field. Bodies beyond [`MAX_FORM_BYTES`] are rejected.
pub fn read_multipart(request: &mut Request) -> Result<UploadForm, FileGateError> {
    let boundary = multipart_boundary(request)
        .ok_or_else(|| FileGateError::BadRequest("invalid multipart form".to_string()))?;

    let mut body = Vec::new();
    request
        .as_reader()
        .take(MAX_FORM_BYTES as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|err| FileGateError::Internal(err.to_string()))?;

    decode_form(&body, &boundary)
}

fn decode_form(body: &[u8], boundary: &str) -> Result<UploadForm, FileGateError> {
    if body.len() > MAX_FORM_BYTES {
        return Err(FileGateError::BadRequest(
            "multipart body too large".to_string(),
        ));
    }
    parse_multipart(body, boundary)
}

fn multipart_boundary(request: &Request) -> Option<String> {
    let content_type = request
        .headers()
        .iter()
        .find(|header| header.field.equiv("Content-Type"))
        .map(|header| header.value.as_str())?;
    if !content_type
        .to_ascii_lowercase()
        .starts_with("multipart/form-data")
    {
        return None;
    }
    for parameter in content_type.split(';') {
        let parameter = parameter.trim();
        if let Some(boundary) = parameter.strip_prefix("boundary=") {
            let boundary = boundary.trim_matches('"');
            if !boundary.is_empty() {
                return Some(boundary.to_string());
            }
        }
    }
    None
}

fn parse_multipart(body: &[u8], boundary: &str) -> Result<UploadForm, FileGateError> {
    let mut path = None;
    let mut file = None;

    for part in split_parts(body, boundary) {
        let Some((headers, content)) = split_once_bytes(part, b"\r\n\r\n") else {
            continue;
        };
        let Some(name) = disposition_name(headers) else {
            continue;
        };
        match name.as_str() {
            "path" => path = Some(String::from_utf8_lossy(content).into_owned()),
            "file" => file = Some(content.to_vec()),
            _ => {}
        }
    }

    let path = path
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or_else(|| FileGateError::BadRequest("missing path field".to_string()))?;
    let file =
        file.ok_or_else(|| FileGateError::BadRequest("missing file field".to_string()))?;
    Ok(UploadForm { path, file })
}

/// Slice the body into part payloads delimited by `--boundary` markers.
/// Each returned slice spans one part's headers and content.
fn split_parts<'b>(body: &'b [u8], boundary: &str) -> Vec<&'b [u8]> {
    let delimiter = format!("--{boundary}").into_bytes();
    let closing = [&b"\r\n"[..], &delimiter].concat();

    let mut parts = Vec::new();
    let Some(first) = find_bytes(body, &delimiter) else {
        return parts;
    };
    let mut pos = first + delimiter.len();
    loop {
        if body[pos..].starts_with(b"--") {
            break;
        }
        if body[pos..].starts_with(b"\r\n") {
            pos += 2;
        } else {
            break;
        }
        match find_bytes(&body[pos..], &closing) {
            Some(end) => {
                parts.push(&body[pos..pos + end]);
                pos += end + closing.len();
            }
            None => break,
        }
    }
    parts
}

fn disposition_name(headers: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(headers);
    for line in text.lines() {
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        if !field.trim().eq_ignore_ascii_case("content-disposition") {
            continue;
        }
        for attribute in value.split(';') {
            let attribute = attribute.trim();
            if let Some(name) = attribute.strip_prefix("name=") {
                return Some(name.trim_matches('"').to_string());
            }
        }
    }
    None
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn split_once_bytes<'b>(buf: &'b [u8], separator: &[u8]) -> Option<(&'b [u8], &'b [u8])> {
    find_bytes(buf, separator).map(|idx| (&buf[..idx], &buf[idx + separator.len()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_percent_decoded() {
        let params = parse_query("/api/v1/files/read?path=a%2Fb+c.txt&extra=1");
        assert_eq!(params.get("path").map(String::as_str), Some("a/b c.txt"));
        assert_eq!(params.get("extra").map(String::as_str), Some("1"));
    }

    #[test]
    fn query_without_separator_is_empty() {
        assert!(parse_query("/api/v1/files/stat").is_empty());
    }

    #[test]
    fn first_duplicate_query_name_wins() {
        let params = parse_query("/x?path=first&path=second");
        assert_eq!(params.get("path").map(String::as_str), Some("first"));
    }

    #[test]
    fn malformed_percent_escapes_pass_through() {
        let params = parse_query("/x?path=50%25done&bad=%zz");
        assert_eq!(params.get("path").map(String::as_str), Some("50%done"));
        assert_eq!(params.get("bad").map(String::as_str), Some("%zz"));
    }

    fn form_body(boundary: &str, path: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"path\"\r\n\r\n",
        );
        body.extend_from_slice(path.as_bytes());
        body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"file\"; filename=\"blob.bin\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    #[test]
    fn multipart_extracts_path_and_file() {
        let body = form_body("gate1234", "uploads/blob.bin", b"\x00\x01binary\xffdata");
        let form = parse_multipart(&body, "gate1234").unwrap();
        assert_eq!(form.path, "uploads/blob.bin");
        assert_eq!(form.file, b"\x00\x01binary\xffdata");
    }

    #[test]
    fn multipart_missing_file_field_is_rejected() {
        let boundary = "gate1234";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(b"Content-Disposition: form-data; name=\"path\"\r\n\r\na.txt");
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let err = parse_multipart(&body, boundary).unwrap_err();
        assert!(matches!(err, FileGateError::BadRequest(_)));
        assert_eq!(err.to_string(), "missing file field");
    }

    #[test]
    fn multipart_preserves_crlf_inside_payload() {
        let payload = b"line one\r\nline two\r\n";
        let body = form_body("gate1234", "a.txt", payload);
        let form = parse_multipart(&body, "gate1234").unwrap();
        assert_eq!(form.file, payload);
    }

    #[test]
    fn oversized_multipart_body_is_rejected() {
        let body = vec![0u8; MAX_FORM_BYTES + 1];
        let err = decode_form(&body, "gate1234").unwrap_err();
        assert!(matches!(err, FileGateError::BadRequest(_)));
        assert_eq!(err.to_string(), "multipart body too large");
    }
}
