// CLASSIFICATION: COMMUNITY
// Filename: server.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-08-02

//! HTTP surface: listener, worker pool, routing table, and panic guard.
//!
//! Each worker thread pulls requests off the shared listener and serves them
//! independently, so a request blocked inside the path locker stalls only
//! its own worker. The routing table is fixed; anything it does not name
//! gets a `NOT_FOUND` envelope.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use serde::Deserialize;
use tiny_http::{Method, Request, Response, Server};

use crate::auth::{self, Identity};
use crate::body;
use crate::config::Config;
use crate::envelope::{self, WireResponse};
use crate::error::FileGateError;
use crate::locker::PathLocker;
use crate::ops;

/// Worker threads spawned by default.
pub const DEFAULT_WORKER_THREADS: usize = 8;

struct GateState {
    config: Config,
    locker: PathLocker,
}

/// The filegate service: configuration plus the process-wide path locker.
pub struct FileGate {
    state: Arc<GateState>,
}

impl FileGate {
    /// Build the service and create the workspace base directory if absent.
    pub fn new(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.workspace_base).with_context(|| {
            format!(
                "creating workspace base {}",
                config.workspace_base.display()
            )
        })?;
        Ok(Self {
            state: Arc::new(GateState {
                config,
                locker: PathLocker::new(),
            }),
        })
    }

    /// Bind `addr` and spawn `workers` serving threads.
    pub fn serve(&self, addr: &str, workers: usize) -> Result<GateHandle> {
        let server =
            Arc::new(Server::http(addr).map_err(|err| anyhow!("binding {addr}: {err}"))?);
        let port = server
            .server_addr()
            .to_ip()
            .map(|sock| sock.port())
            .unwrap_or(0);

        let workers = workers.max(1);
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let server = Arc::clone(&server);
            let state = Arc::clone(&self.state);
            handles.push(thread::spawn(move || worker_loop(server, state)));
        }
        info!("filegate serving on port {port} with {workers} workers");

        Ok(GateHandle {
            server,
            workers: handles,
            port,
        })
    }
}

/// Handle to a running listener; dropping it unblocks the workers.
pub struct GateHandle {
    server: Arc<Server>,
    workers: Vec<JoinHandle<()>>,
    port: u16,
}

impl GateHandle {
    /// Port the listener is bound to (useful with an ephemeral bind).
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Block until every worker exits.
    pub fn join(mut self) {
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for GateHandle {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

fn worker_loop(server: Arc<Server>, state: Arc<GateState>) {
    loop {
        let mut request = match server.recv() {
            Ok(request) => request,
            Err(_) => return,
        };

        let response = match panic::catch_unwind(AssertUnwindSafe(|| route(&state, &mut request)))
        {
            Ok(response) => response,
            Err(_) => {
                warn!("handler panicked serving {}", request.url());
                envelope::error_response(&FileGateError::Internal(
                    "internal server error".to_string(),
                ))
            }
        };

        if let Err(err) = request.respond(response) {
            debug!("client went away before the response: {err}");
        }
    }
}

fn route(state: &GateState, request: &mut Request) -> WireResponse {
    let url = request.url().to_string();
    let route_path = url.split('?').next().unwrap_or("").to_string();
    let method = request.method().clone();

    if method == Method::Get && route_path == "/healthz" {
        return Response::from_string("ok").with_status_code(200);
    }

    let identity = match auth::authenticate(request, &state.config) {
        Ok(identity) => identity,
        Err(err) => return envelope::error_response(&err),
    };
    debug!(
        "{} {route_path} service={} user={}",
        method.as_str(),
        identity.service,
        identity.user_id
    );

    match dispatch(state, request, &method, &route_path, &identity) {
        Ok(response) => response,
        Err(err) => envelope::error_response(&err),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WriteBody {
    path: String,
    content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MkdirBody {
    path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RenameBody {
    path: String,
    new_name: Option<String>,
    new_path: Option<String>,
}

fn dispatch(
    state: &GateState,
    request: &mut Request,
    method: &Method,
    route_path: &str,
    identity: &Identity,
) -> Result<WireResponse, FileGateError> {
    let locker = &state.locker;
    let root = identity.root.as_path();

    match (method, route_path) {
        (Method::Get, "/api/v1/files/stat") => {
            let path = query_path(request);
            Ok(envelope::ok_response(ops::stat(root, &path)?))
        }
        (Method::Get, "/api/v1/files/readdir") => {
            let path = query_path(request);
            Ok(envelope::ok_response(ops::readdir(root, &path)?))
        }
        (Method::Get, "/api/v1/files/read") => {
            let path = query_path(request);
            Ok(envelope::ok_response(ops::read(root, &path)?))
        }
        (Method::Get, "/api/v1/files/read-binary") => {
            let path = query_path(request);
            Ok(binary_response(ops::read_binary(root, &path)?))
        }
        (Method::Post, "/api/v1/files/write") => {
            let req: WriteBody = body::read_json(request)?;
            Ok(envelope::ok_response(ops::write(
                locker,
                root,
                &req.path,
                &req.content,
            )?))
        }
        (Method::Post, "/api/v1/files/write-binary") => {
            let form = body::read_multipart(request)?;
            Ok(envelope::ok_response(ops::write_binary(
                locker, root, &form.path, &form.file,
            )?))
        }
        (Method::Post, "/api/v1/files/mkdir") => {
            let req: MkdirBody = body::read_json(request)?;
            Ok(envelope::ok_response(ops::mkdir(locker, root, &req.path)?))
        }
        (Method::Delete, "/api/v1/files/remove") => {
            let path = query_path(request);
            Ok(envelope::ok_response(ops::remove(locker, root, &path)?))
        }
        (Method::Patch, "/api/v1/files/rename") => {
            let req: RenameBody = body::read_json(request)?;
            Ok(envelope::ok_response(ops::rename(
                locker,
                root,
                &req.path,
                req.new_name.as_deref(),
                req.new_path.as_deref(),
            )?))
        }
        _ => Err(FileGateError::NotFound("no such route".to_string())),
    }
}

fn query_path(request: &Request) -> String {
    body::parse_query(request.url())
        .remove("path")
        .unwrap_or_default()
}

fn binary_response(file: ops::BinaryFile) -> WireResponse {
    let mut response = Response::from_data(file.data).with_status_code(200);
    if let Some(content_type) = envelope::header("Content-Type", file.mime) {
        response = response.with_header(content_type);
    }
    let disposition = format!("inline; filename=\"{}\"", file.file_name);
    if let Some(header) = envelope::header("Content-Disposition", &disposition) {
        response = response.with_header(header);
    }
    response
}
