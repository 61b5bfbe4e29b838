// CLASSIFICATION: COMMUNITY
// Filename: auth.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-07-26

//! Service authentication and per-user workspace scoping.

use std::fs;
use std::path::PathBuf;

use tiny_http::Request;

use crate::config::Config;
use crate::error::FileGateError;

/// Minimum accepted `X-User-Id` length.
const MIN_USER_ID_LEN: usize = 8;

/// The caller identity established for one request.
#[derive(Debug)]
pub struct Identity {
    /// Name of the authenticated service.
    pub service: String,
    /// End-user identifier from `X-User-Id`.
    pub user_id: String,
    /// The user's workspace root, created on demand.
    pub root: PathBuf,
}

/// Validate the bearer token and user header, and prepare the user root.
pub fn authenticate(request: &Request, config: &Config) -> Result<Identity, FileGateError> {
    let token = header_value(request, "Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            FileGateError::Unauthorized("missing or invalid authorization header".to_string())
        })?;

    let service = config
        .service_tokens
        .get(token)
        .cloned()
        .ok_or_else(|| FileGateError::Unauthorized("invalid service token".to_string()))?;

    let user_id = header_value(request, "X-User-Id").unwrap_or("");
    if user_id.len() < MIN_USER_ID_LEN {
        return Err(FileGateError::BadRequest(
            "missing X-User-Id header".to_string(),
        ));
    }

    let root = config.workspace_base.join(user_id);
    fs::create_dir_all(&root)
        .map_err(|_| FileGateError::Internal("failed to prepare workspace".to_string()))?;

    Ok(Identity {
        service,
        user_id: user_id.to_string(),
        root,
    })
}

/// Case-insensitive header lookup on a request.
pub fn header_value<'r>(request: &'r Request, name: &str) -> Option<&'r str> {
    request
        .headers()
        .iter()
        .find(|header| header.field.as_str().as_str().eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str())
}
