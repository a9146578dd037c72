//! Local static content server for a kiosk shell.
//!
//! A [`ServerManager`] serves one directory over HTTP from a background thread, so the host's GUI
//! event loop is never blocked. `/` maps to `index.html`, `/favicon.ico` to `assets/favicon.ico`,
//! and everything else to a file under the root.
//!
//! ```no_run
//! use kiosk_http_server::{ServerConfig, ServerManager};
//!
//! let manager = ServerManager::new();
//! let address = manager.start(ServerConfig::new("ui/web")).expect("server start");
//! println!("navigate to http://{}", address);
//! manager.stop().expect("server stop");
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod handlers;
pub mod headers;
pub mod lifecycle;
pub mod request;
pub mod resolver;
pub mod response;
pub mod server;

pub use address::{reachable_address, Address};
pub use config::{ServerConfig, DEFAULT_PORT};
pub use error::{StartError, StopError};
pub use lifecycle::{ServerHandle, ServerManager, ServerState};
pub use resolver::{ResolvedTarget, Resolver, Route};
