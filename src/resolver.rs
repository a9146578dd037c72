//! Maps request paths onto files under the served root.

use std::io;
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::config::index_path;

pub const FAVICON_PATH: &str = "assets/favicon.ico";

/// The closed set of routes the server knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Root,
    Favicon,
    Generic(&'a str),
}

impl<'a> Route<'a> {
    pub fn from_path(path: &'a str) -> Self {
        match path {
            "/" => Route::Root,
            "/favicon.ico" => Route::Favicon,
            other => Route::Generic(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    RegularFile(PathBuf, &'static str),
    FaviconFile(PathBuf),
    /// A directory named without its trailing slash; the value is the corrected path.
    Redirect(String),
    NotFound,
    ResolutionError(String),
}

/// Stateless apart from the canonical root it reads under.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
}

impl Resolver {
    /// `root` should already be canonical, as returned by [`ServerConfig::validate`](crate::ServerConfig::validate).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a request path (query and fragment already stripped).
    pub async fn resolve(&self, path: &str) -> ResolvedTarget {
        match Route::from_path(path) {
            Route::Root => self.regular_file(index_path(&self.root)).await,
            Route::Favicon => self.favicon().await,
            Route::Generic(path) => self.generic(path).await,
        }
    }

    async fn favicon(&self) -> ResolvedTarget {
        let path = self.root.join(FAVICON_PATH);
        let canonical = match self.contained(&path).await {
            Ok(canonical) => canonical,
            Err(outcome) => return outcome,
        };
        match tokio::fs::metadata(&canonical).await {
            Ok(meta) if meta.is_file() => ResolvedTarget::FaviconFile(canonical),
            Ok(_) => ResolvedTarget::ResolutionError(format!("{} is not a regular file", path.display())),
            Err(e) => io_outcome(&canonical, e),
        }
    }

    async fn generic(&self, url_path: &str) -> ResolvedTarget {
        let Some(decoded) = percent_decode(url_path) else {
            debug!("rejecting undecodable path {:?}", url_path);
            return ResolvedTarget::NotFound;
        };
        let Some(path) = self.map_path(&decoded) else {
            debug!("rejecting path outside root {:?}", url_path);
            return ResolvedTarget::NotFound;
        };
        match tokio::fs::metadata(&path).await {
            // relative links in the index only work from a URL ending in '/'
            Ok(meta) if meta.is_dir() && !url_path.ends_with('/') => {
                ResolvedTarget::Redirect(format!("{}/", url_path))
            }
            Ok(meta) if meta.is_dir() => self.regular_file(index_path(&path)).await,
            Ok(_) => self.regular_file(path).await,
            Err(e) => io_outcome(&path, e),
        }
    }

    /// Follows symlinks in `path` and requires the result to stay under the root.
    async fn contained(&self, path: &Path) -> Result<PathBuf, ResolvedTarget> {
        let canonical = tokio::fs::canonicalize(path).await.map_err(|e| io_outcome(path, e))?;
        if !canonical.starts_with(&self.root) {
            debug!("{} escapes the root via a link", path.display());
            return Err(ResolvedTarget::NotFound);
        }
        Ok(canonical)
    }

    /// Confirms `path` is a file that stays under the root once symlinks are followed.
    async fn regular_file(&self, path: PathBuf) -> ResolvedTarget {
        let canonical = match self.contained(&path).await {
            Ok(canonical) => canonical,
            Err(outcome) => return outcome,
        };
        match tokio::fs::metadata(&canonical).await {
            Ok(meta) if meta.is_file() => {
                let content_type = content_type(&canonical);
                ResolvedTarget::RegularFile(canonical, content_type)
            }
            Ok(_) => ResolvedTarget::NotFound,
            Err(e) => io_outcome(&canonical, e),
        }
    }

    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.root.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }
}

fn io_outcome(path: &Path, err: io::Error) -> ResolvedTarget {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => ResolvedTarget::NotFound,
        _ => ResolvedTarget::ResolutionError(format!("{}: {}", path.display(), err)),
    }
}

/// Content type by file extension, falling back to `mime_guess` for anything not listed.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_lowercase();
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "ico" => "image/x-icon",
        _ => mime_guess::from_path(path).first_raw().unwrap_or("application/octet-stream"),
    }
}

/// Decodes `%XX` escapes. `None` for non-UTF-8 results or NUL bytes.
fn percent_decode(input: &str) -> Option<String> {
    let decoded = urlencoding::decode(input).ok()?;
    if decoded.contains('\0') {
        return None;
    }
    Some(decoded.into_owned())
}
