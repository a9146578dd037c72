use std::io;

use log::debug;
use tokio::io::AsyncWrite;

use crate::request::{HTTPMethod, HttpRequest};
use crate::resolver::{ResolvedTarget, Resolver};
use crate::response::{HttpResponse, HttpStatus, ResponseWriter};

// Handler error type
#[derive(Debug)]
pub struct HandlerError {
    pub status_code: HttpStatus,
    pub message: String,
}

impl HandlerError {
    pub fn new(status_code: HttpStatus, message: impl Into<String>) -> Self {
        Self { status_code, message: message.into() }
    }

    /// The client only sees the status page; `message` stays in the log.
    pub fn to_response(&self) -> HttpResponse {
        HttpResponse::error_page(self.status_code)
    }
}

impl From<io::Error> for HandlerError {
    fn from(e: io::Error) -> Self {
        HandlerError::new(HttpStatus::InternalServerError, e.to_string())
    }
}

pub async fn dispatch_handler<W: AsyncWrite + Unpin>(
    writer: &mut ResponseWriter<W>,
    req: &HttpRequest,
    resolver: &Resolver,
) -> Result<(), HandlerError> {
    let head_only = match req.method() {
        HTTPMethod::GET => false,
        HTTPMethod::HEAD => true,
        other => {
            return Err(HandlerError::new(
                HttpStatus::NotImplemented,
                format!("unsupported method {}", other),
            ));
        }
    };

    let mut response = file_response(resolver, req.path()).await?;
    if let Some(if_none_match) = req.headers.get("if-none-match") {
        if response.matches_etag(if_none_match) {
            response = HttpResponse::not_modified(&response);
        }
    }
    if head_only || response.status == HttpStatus::NotModified {
        writer.write_head(&response).await?;
    } else {
        writer.write_all(&response).await?;
    }
    Ok(())
}

/// Resolves `path` and reads the target from disk. Nothing is cached between requests.
pub async fn file_response(resolver: &Resolver, path: &str) -> Result<HttpResponse, HandlerError> {
    let (file, content_type) = match resolver.resolve(path).await {
        ResolvedTarget::RegularFile(file, content_type) => (file, content_type),
        ResolvedTarget::FaviconFile(file) => (file, "image/x-icon"),
        ResolvedTarget::Redirect(location) => return Ok(HttpResponse::redirect(&location)),
        ResolvedTarget::NotFound => {
            return Err(HandlerError::new(HttpStatus::NotFound, format!("no file for {}", path)));
        }
        ResolvedTarget::ResolutionError(reason) => {
            return Err(HandlerError::new(HttpStatus::InternalServerError, reason));
        }
    };

    debug!("serving {} as {}", file.display(), content_type);
    match tokio::fs::read(&file).await {
        Ok(body) => Ok(HttpResponse::file(body, content_type)),
        // removed between resolving and reading
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(HandlerError::new(HttpStatus::NotFound, format!("{} disappeared", file.display())))
        }
        Err(e) => Err(HandlerError::new(
            HttpStatus::InternalServerError,
            format!("reading {}: {}", file.display(), e),
        )),
    }
}
