// CLASSIFICATION: COMMUNITY
// Filename: envelope.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-07-21

//! Uniform `{ ok, data?, error? }` JSON response contract.

use std::io::Cursor;

use serde::Serialize;
use tiny_http::{Header, Response};

use crate::error::FileGateError;

/// Response body type produced by every route.
pub type WireResponse = Response<Cursor<Vec<u8>>>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct Envelope<T> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

/// Wrap a success payload in the envelope with status 200.
pub fn ok_response<T: Serialize>(data: T) -> WireResponse {
    json_response(
        200,
        &Envelope {
            ok: true,
            data: Some(data),
            error: None,
        },
    )
}

/// Wrap a terminal error in the envelope with its mapped status.
pub fn error_response(err: &FileGateError) -> WireResponse {
    json_response(
        err.status(),
        &Envelope::<()> {
            ok: false,
            data: None,
            error: Some(ErrorBody {
                code: err.code(),
                message: err.to_string(),
            }),
        },
    )
}

fn json_response<T: Serialize>(status: u16, envelope: &Envelope<T>) -> WireResponse {
    let body = serde_json::to_vec(envelope).unwrap_or_else(|_| {
        br#"{"ok":false,"error":{"code":"INTERNAL","message":"response encoding failure"}}"#
            .to_vec()
    });
    let mut response = Response::from_data(body).with_status_code(status);
    if let Some(content_type) = header("Content-Type", "application/json") {
        response = response.with_header(content_type);
    }
    response
}

/// Build a header, or `None` when the value is not representable.
pub fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}
