use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use tasklock_core::{ErrorKind, Request, Response};

use crate::host::OverlayWindows;
use crate::registry::{IngressError, Registry};

const IO_TIMEOUT: Duration = Duration::from_secs(2);
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Connection closed before a reply")]
    Closed,
}

/// Answer one request line.
pub fn handle_line(registry: &Registry, overlay: &dyn OverlayWindows, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejected malformed request: {}", e);
            return Response::Error {
                kind: ErrorKind::InvalidRequest,
                message: e.to_string(),
            };
        }
    };

    match request {
        Request::UpdateRestrictions(update) => match registry.update_restrictions(update) {
            Ok(()) => Response::Updated,
            Err(e @ IngressError::NotActive) => Response::Error {
                kind: ErrorKind::NotActive,
                message: e.to_string(),
            },
            Err(e @ IngressError::Persist(_)) => Response::Error {
                kind: ErrorKind::Persist,
                message: e.to_string(),
            },
        },
        Request::CheckOverlayPermission => Response::OverlayPermission {
            granted: overlay.can_draw_overlays(),
        },
        Request::Status => Response::Status(registry.status()),
    }
}

/// Server side - runs in the agent
pub struct IpcServer {
    listener: UnixListener,
    path: PathBuf,
    running: Arc<AtomicBool>,
}

impl IpcServer {
    pub fn bind(path: &Path) -> Result<Self, IpcError> {
        // Remove a stale socket from a previous run
        let _ = std::fs::remove_file(path);

        let listener = UnixListener::bind(path)?;
        listener.set_nonblocking(true)?;

        info!("IPC server listening on {:?}", path);

        Ok(Self {
            listener,
            path: path.to_path_buf(),
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Serve requests on a background thread until [`IpcServer::stop`].
    pub fn serve(
        &self,
        registry: Arc<Registry>,
        overlay: Arc<dyn OverlayWindows>,
    ) -> Result<std::thread::JoinHandle<()>, IpcError> {
        let running = self.running.clone();
        let listener = self.listener.try_clone()?;

        Ok(std::thread::spawn(move || {
            while running.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        if let Err(e) = serve_connection(stream, &registry, overlay.as_ref()) {
                            warn!("IPC connection failed: {}", e);
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(ACCEPT_BACKOFF);
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                        std::thread::sleep(ACCEPT_BACKOFF);
                    }
                }
            }
            debug!("IPC server stopped");
        }))
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn serve_connection(
    stream: UnixStream,
    registry: &Registry,
    overlay: &dyn OverlayWindows,
) -> Result<(), IpcError> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(IO_TIMEOUT))?;
    stream.set_write_timeout(Some(IO_TIMEOUT))?;

    let mut writer = stream.try_clone()?;
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    if reader.read_line(&mut line)? == 0 {
        return Err(IpcError::Closed);
    }

    let response = handle_line(registry, overlay, line.trim());
    let mut reply = serde_json::to_string(&response)?;
    reply.push('\n');
    writer.write_all(reply.as_bytes())?;
    Ok(())
}

/// Client side - used by the CLI and the main application bridge
pub struct IpcClient {
    path: PathBuf,
}

impl IpcClient {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Send a request and wait for the reply
    pub fn request(&self, request: &Request) -> Result<Response, IpcError> {
        let stream = UnixStream::connect(&self.path)?;
        stream.set_read_timeout(Some(IO_TIMEOUT))?;
        stream.set_write_timeout(Some(IO_TIMEOUT))?;

        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        (&stream).write_all(line.as_bytes())?;

        let mut reply = String::new();
        if BufReader::new(&stream).read_line(&mut reply)? == 0 {
            return Err(IpcError::Closed);
        }
        Ok(serde_json::from_str(reply.trim())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::store::RestrictionStore;
    use crate::testing::FakeHost;
    use tasklock_core::UpdateRestrictions;

    fn update() -> Request {
        Request::UpdateRestrictions(UpdateRestrictions {
            apps: vec!["com.a.b".into()],
            active: true,
            ..Default::default()
        })
    }

    #[test]
    fn test_update_without_agent() {
        let registry = Registry::new();
        let line = serde_json::to_string(&update()).unwrap();

        let response = handle_line(&registry, &FakeHost::new(), &line);
        assert!(matches!(
            response,
            Response::Error {
                kind: ErrorKind::NotActive,
                ..
            }
        ));
    }

    #[test]
    fn test_update_with_null_task_fields() {
        let registry = Registry::new();
        let store = Arc::new(RestrictionStore::activate(Box::new(MemoryStore::default())));
        registry.activate(Arc::clone(&store));

        let line = concat!(
            r#"{"method":"updateRestrictions","apps":["com.a.b"],"active":true,"#,
            r#""pendingTasks":[{"id":"1","title":null,"description":null,"isOverdue":false}]}"#,
        );
        let response = handle_line(&registry, &FakeHost::new(), line);

        assert_eq!(response, Response::Updated);
        let state = store.current();
        assert!(state.active);
        assert!(state.restricted_apps.contains("com.a.b"));
        assert_eq!(state.pending_tasks[0].title, "Untitled Task");
        assert_eq!(state.pending_tasks[0].description, "");
    }

    #[test]
    fn test_malformed_line() {
        let response = handle_line(&Registry::new(), &FakeHost::new(), "{\"method\":\"reboot\"}");
        assert!(matches!(
            response,
            Response::Error {
                kind: ErrorKind::InvalidRequest,
                ..
            }
        ));
    }

    #[test]
    fn test_socket_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasklock.sock");

        let registry = Arc::new(Registry::new());
        let store = Arc::new(RestrictionStore::activate(Box::new(MemoryStore::default())));
        registry.activate(Arc::clone(&store));

        let server = IpcServer::bind(&path).unwrap();
        let worker = server
            .serve(Arc::clone(&registry), Arc::new(FakeHost::new()))
            .unwrap();

        let client = IpcClient::new(&path);
        assert_eq!(client.request(&update()).unwrap(), Response::Updated);
        assert!(store.current().restricted_apps.contains("com.a.b"));

        let Response::Status(status) = client.request(&Request::Status).unwrap() else {
            panic!("expected status");
        };
        assert!(status.monitoring);
        assert_eq!(status.restricted_apps, 1);

        assert_eq!(
            client.request(&Request::CheckOverlayPermission).unwrap(),
            Response::OverlayPermission { granted: true }
        );

        server.stop();
        worker.join().unwrap();
    }
}
