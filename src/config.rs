// CLASSIFICATION: COMMUNITY
// Filename: config.rs v0.2
// Author: Lukas Bower
// Date Modified: 2026-07-08

//! Runtime configuration from environment variables and CLI overrides.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

/// Port used when neither `--port` nor `PORT` is set.
pub const DEFAULT_PORT: u16 = 8090;

/// Resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the listener binds.
    pub port: u16,
    /// Directory under which each user's workspace is rooted.
    pub workspace_base: PathBuf,
    /// Bearer token → service name.
    pub service_tokens: HashMap<String, String>,
}

impl Config {
    /// Build the configuration from CLI overrides, falling back to the
    /// environment (`PORT`, `VFS_WORKSPACE_BASE`, `VFS_SERVICE_TOKENS`).
    pub fn resolve(
        port: Option<u16>,
        workspace_base: Option<PathBuf>,
        service_tokens: Option<String>,
    ) -> Result<Self> {
        let port = match port {
            Some(port) => port,
            None => match env::var("PORT").ok().filter(|raw| !raw.is_empty()) {
                Some(raw) => raw
                    .parse()
                    .with_context(|| format!("PORT {raw:?} is not a valid port"))?,
                None => DEFAULT_PORT,
            },
        };

        let workspace_base = workspace_base
            .or_else(|| env::var_os("VFS_WORKSPACE_BASE").map(PathBuf::from))
            .filter(|base| !base.as_os_str().is_empty())
            .context("VFS_WORKSPACE_BASE is required")?;

        let raw_tokens = service_tokens
            .or_else(|| env::var("VFS_SERVICE_TOKENS").ok())
            .filter(|raw| !raw.is_empty())
            .context("VFS_SERVICE_TOKENS is required")?;
        let service_tokens = parse_service_tokens(&raw_tokens)?;

        Ok(Self {
            port,
            workspace_base,
            service_tokens,
        })
    }
}

/// Parse `"service1:tok1,service2:tok2"` into a token → service map.
///
/// Blank segments are skipped; a segment without a non-empty service and
/// token is an error, as is an empty resulting map.
pub fn parse_service_tokens(raw: &str) -> Result<HashMap<String, String>> {
    let mut tokens = HashMap::new();
    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((service, token)) = pair.split_once(':') else {
            bail!("invalid token pair: {pair:?}");
        };
        if service.is_empty() || token.is_empty() {
            bail!("invalid token pair: {pair:?}");
        }
        tokens.insert(token.to_string(), service.to_string());
    }
    if tokens.is_empty() {
        bail!("no valid service tokens configured");
    }
    Ok(tokens)
}
