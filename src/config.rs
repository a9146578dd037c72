use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::StartError;

pub const DEFAULT_PORT: u16 = 8000;
pub const INDEX_DOCUMENT: &str = "index.html";

/// Where the content comes from and where the server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub root_directory: PathBuf,
    pub port: u16,
    pub bind_address: IpAddr,
}

impl ServerConfig {
    /// Serves `root_directory` on all interfaces at [`DEFAULT_PORT`].
    pub fn new(root_directory: impl Into<PathBuf>) -> Self {
        Self {
            root_directory: root_directory.into(),
            port: DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_bind_address(mut self, bind_address: IpAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Checks the root and returns its canonical path. A missing index document only warns.
    pub fn validate(&self) -> Result<PathBuf, StartError> {
        let invalid = |reason: String| StartError::InvalidRoot {
            path: self.root_directory.clone(),
            reason,
        };
        let root = self.root_directory.canonicalize().map_err(|e| invalid(e.to_string()))?;
        if !root.is_dir() {
            return Err(invalid("not a directory".to_string()));
        }
        if !index_path(&root).is_file() {
            warn!("{} has no {}; requests for / will return 404", root.display(), INDEX_DOCUMENT);
        }
        Ok(root)
    }
}

pub(crate) fn index_path(dir: &Path) -> PathBuf {
    dir.join(INDEX_DOCUMENT)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::new("ui/web");
        assert_eq!(config.port, 8000);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8000");

        let config = config.with_port(9001).with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9001");
    }

    #[test]
    fn missing_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::new(dir.path().join("nope"));
        assert!(matches!(config.validate(), Err(StartError::InvalidRoot { .. })));
    }

    #[test]
    fn file_as_root_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("index.html");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(ServerConfig::new(file).validate(), Err(StartError::InvalidRoot { .. })));
    }

    #[test]
    fn missing_index_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = ServerConfig::new(dir.path()).validate().unwrap();
        assert_eq!(root, dir.path().canonicalize().unwrap());
    }
}
