//! Start/stop control over one background server thread.
//!
//! The caller's thread (typically a GUI event loop) never blocks on socket I/O: binding happens
//! synchronously in [`ServerManager::start`] so errors surface immediately, then the accept loop
//! runs on a dedicated thread driving its own single-threaded tokio runtime. [`ServerManager::stop`]
//! signals that loop and joins the thread before returning.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::address::{reachable_address, Address};
use crate::config::ServerConfig;
use crate::error::{StartError, StopError};
use crate::resolver::Resolver;
use crate::server::HttpServer;

/// Upper bound on waiting for in-flight blocking file reads once the accept loop has exited.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// One running server: the listening socket and the thread serving it, acquired and released together.
#[derive(Debug)]
pub struct ServerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
    root: PathBuf,
    address: Address,
}

impl ServerHandle {
    fn launch(config: &ServerConfig) -> Result<Self, StartError> {
        let root = config.validate()?;
        let addr = config.socket_addr();
        let bind_failed = |source| StartError::BindFailed { addr, source };

        let std_listener = std::net::TcpListener::bind(addr).map_err(bind_failed)?;
        std_listener.set_nonblocking(true).map_err(bind_failed)?;
        let local_addr = std_listener.local_addr().map_err(bind_failed)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StartError::Runtime)?;
        let listener = {
            let _guard = runtime.enter();
            TcpListener::from_std(std_listener).map_err(bind_failed)?
        };
        let (server, shutdown) = HttpServer::new(listener, Resolver::new(root.clone()));

        let thread = std::thread::Builder::new()
            .name(thread_name(local_addr.port()))
            .spawn(move || {
                if let Err(e) = runtime.block_on(server.listen()) {
                    error!("server loop failed: {:#}", e);
                }
                runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
            })
            .map_err(StartError::Runtime)?;

        Ok(Self {
            shutdown: Some(shutdown),
            thread: Some(thread),
            local_addr,
            root,
            address: reachable_address(config.bind_address, local_addr.port()),
        })
    }

    /// The socket address actually bound, with any ephemeral port filled in.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    fn shutdown(mut self) -> Result<(), StopError> {
        self.teardown()
    }

    fn teardown(&mut self) -> Result<(), StopError> {
        if let Some(tx) = self.shutdown.take() {
            // Err means the loop already exited; joining below still applies.
            if tx.send(()).is_err() {
                warn!("server loop on {} had already exited", self.local_addr);
            }
        }
        match self.thread.take().map(JoinHandle::join) {
            Some(Err(panic)) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(StopError::BackgroundPanicked(reason))
            }
            _ => Ok(()),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            warn!("{}", e);
        }
    }
}

/// Name of the background thread serving `port`.
pub fn thread_name(port: u16) -> String {
    format!("kiosk-{}", port)
}

#[derive(Debug)]
struct Inner {
    state: ServerState,
    handle: Option<ServerHandle>,
}

/// Owns at most one running server. Construct one and share it by reference with whatever needs it.
#[derive(Debug)]
pub struct ServerManager {
    inner: Mutex<Inner>,
}

impl Default for ServerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { state: ServerState::Stopped, handle: None }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ServerState {
        self.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == ServerState::Running
    }

    /// The reachable address of the running server, if any.
    pub fn address(&self) -> Option<Address> {
        self.lock().handle.as_ref().map(|h| h.address().clone())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().handle.as_ref().map(ServerHandle::local_addr)
    }

    /// Validates the root, binds and spawns the serving thread.
    ///
    /// On error the manager is back in [`ServerState::Stopped`] holding nothing. Calling this while a
    /// server is starting or running is [`StartError::AlreadyRunning`].
    pub fn start(&self, config: ServerConfig) -> Result<Address, StartError> {
        {
            let mut inner = self.lock();
            if inner.state != ServerState::Stopped {
                return Err(StartError::AlreadyRunning);
            }
            inner.state = ServerState::Starting;
        }

        let launched = ServerHandle::launch(&config);

        let mut inner = self.lock();
        match launched {
            Ok(handle) => {
                let address = handle.address().clone();
                info!("Server started on port {} serving {}", handle.local_addr().port(), handle.root().display());
                info!("Access it at http://{}", address);
                inner.handle = Some(handle);
                inner.state = ServerState::Running;
                Ok(address)
            }
            Err(e) => {
                inner.state = ServerState::Stopped;
                Err(e)
            }
        }
    }

    /// Stops the server and joins its thread. A no-op when nothing is running.
    pub fn stop(&self) -> Result<(), StopError> {
        let handle = {
            let mut inner = self.lock();
            match inner.state {
                ServerState::Stopped => return Ok(()),
                ServerState::Starting | ServerState::Stopping => return Err(StopError::TransitionInProgress),
                ServerState::Running => {
                    inner.state = ServerState::Stopping;
                    inner.handle.take()
                }
            }
        };

        let result = handle.map_or(Ok(()), ServerHandle::shutdown);
        self.lock().state = ServerState::Stopped;
        match &result {
            Ok(()) => info!("Server stopped"),
            Err(e) => warn!("Server stopped uncleanly: {}", e),
        }
        result
    }
}

impl Drop for ServerManager {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("stopping server on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn local_config(root: &Path) -> ServerConfig {
        ServerConfig::new(root)
            .with_port(0)
            .with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[test]
    fn stop_without_start_is_ok() {
        let manager = ServerManager::new();
        assert!(manager.stop().is_ok());
        assert!(manager.stop().is_ok());
        assert_eq!(manager.state(), ServerState::Stopped);
    }

    #[test]
    fn invalid_root_leaves_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ServerManager::new();
        let err = manager.start(local_config(&dir.path().join("missing"))).unwrap_err();
        assert!(matches!(err, StartError::InvalidRoot { .. }));
        assert_eq!(manager.state(), ServerState::Stopped);
        assert!(manager.address().is_none());
    }

    #[test]
    fn start_twice_is_already_running() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ServerManager::new();
        let address = manager.start(local_config(dir.path())).unwrap();
        assert!(manager.is_running());
        assert_eq!(address.host, "localhost");
        assert_eq!(Some(address.port), manager.local_addr().map(|a| a.port()));

        let err = manager.start(local_config(dir.path())).unwrap_err();
        assert!(matches!(err, StartError::AlreadyRunning));
        assert!(manager.is_running());

        manager.stop().unwrap();
        manager.stop().unwrap();
        assert_eq!(manager.state(), ServerState::Stopped);
    }

    #[test]
    fn restart_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ServerManager::new();
        let first = manager.start(local_config(dir.path())).unwrap();
        manager.stop().unwrap();

        let again = local_config(dir.path()).with_port(first.port);
        let second = manager.start(again).unwrap();
        assert_eq!(first.port, second.port);
    }

    #[test]
    fn panicked_thread_is_reported_and_stopped() {
        let manager = ServerManager::new();
        let thread: JoinHandle<()> = std::thread::spawn(|| panic!("boom"));
        manager.lock().handle = Some(ServerHandle {
            shutdown: None,
            thread: Some(thread),
            local_addr: "127.0.0.1:1".parse().unwrap(),
            root: PathBuf::from("/"),
            address: Address { host: "localhost".to_string(), port: 1 },
        });
        manager.lock().state = ServerState::Running;

        let err = manager.stop().unwrap_err();
        assert!(matches!(err, StopError::BackgroundPanicked(ref reason) if reason == "boom"));
        assert_eq!(manager.state(), ServerState::Stopped);
    }
}
