use std::fmt;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::headers::Headers;

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum HttpStatus {
    Ok,
    MovedPermanently,
    NotModified,
    BadRequest,
    NotFound,
    InternalServerError,
    NotImplemented,
}

impl HttpStatus {
    pub fn code(&self) -> u16 {
        match self {
            HttpStatus::Ok => 200,
            HttpStatus::MovedPermanently => 301,
            HttpStatus::NotModified => 304,
            HttpStatus::BadRequest => 400,
            HttpStatus::NotFound => 404,
            HttpStatus::InternalServerError => 500,
            HttpStatus::NotImplemented => 501,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            HttpStatus::Ok => "OK",
            HttpStatus::MovedPermanently => "Moved Permanently",
            HttpStatus::NotModified => "Not Modified",
            HttpStatus::BadRequest => "Bad Request",
            HttpStatus::NotFound => "Not Found",
            HttpStatus::InternalServerError => "Internal Server Error",
            HttpStatus::NotImplemented => "Not Implemented",
        }
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP/1.1 {} {}", self.code(), self.reason())
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: HttpStatus,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpResponse {
    pub fn new() -> Self {
        HttpResponse {
            status: HttpStatus::Ok,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// A small HTML page describing `status`.
    pub fn error_page(status: HttpStatus) -> Self {
        let body = format!(
            "<html>\n  <head>\n    <title>{code} {reason}</title>\n  </head>\n  <body>\n    <h1>{code} {reason}</h1>\n  </body>\n</html>\n",
            code = status.code(),
            reason = status.reason(),
        );
        HttpResponse::new()
            .with_status(status)
            .with_body(body)
            .with_default_headers()
            .with_header("Content-Type", "text/html")
    }

    /// A 200 response carrying file bytes, tagged with a SHA-256 entity tag.
    pub fn file(body: Vec<u8>, content_type: &str) -> Self {
        let etag = format!("\"{:x}\"", Sha256::digest(&body));
        HttpResponse::new()
            .with_status(HttpStatus::Ok)
            .with_body(body)
            .with_default_headers()
            .with_header("Content-Type", content_type)
            .with_header("Cache-Control", "no-cache")
            .with_header("ETag", &etag)
    }

    /// Sends the client to `location`, e.g. a directory path with its trailing slash added.
    pub fn redirect(location: &str) -> Self {
        HttpResponse::new()
            .with_status(HttpStatus::MovedPermanently)
            .with_default_headers()
            .with_header("Location", location)
    }

    /// A bodiless 304 carrying the validators of `full`.
    pub fn not_modified(full: &HttpResponse) -> Self {
        let mut response = HttpResponse::new().with_status(HttpStatus::NotModified);
        response.headers.insert("Connection", "close");
        for name in ["ETag", "Cache-Control"] {
            if let Some(value) = full.headers.get(name) {
                response.headers.insert(name, value);
            }
        }
        response
    }

    /// Whether an `If-None-Match` header value names this response's entity tag.
    pub fn matches_etag(&self, if_none_match: &str) -> bool {
        let Some(etag) = self.headers.get("etag") else {
            return false;
        };
        if_none_match
            .split(',')
            .map(|tag| tag.trim())
            .any(|tag| tag == "*" || tag.trim_start_matches("W/") == etag)
    }

    pub fn with_status(mut self, status: HttpStatus) -> Self {
        self.status = status;
        self
    }

    /// Replaces the headers with Content-Length, Connection and a plain-text Content-Type.
    pub fn with_default_headers(mut self) -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Length", &self.body.len().to_string());
        headers.insert("Connection", "close");
        headers.insert("Content-Type", "text/plain");
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\r\n{}\r\n{}", self.status, self.headers, String::from_utf8_lossy(&self.body))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Copy)]
enum WriterState {
    Initial,
    WritingHeaders,
    WritingBody,
    Done,
}

/// Writes a response onto any async byte sink in status, headers, body order.
#[derive(Debug)]
pub struct ResponseWriter<W: AsyncWrite + Unpin> {
    writer: W,
    state: WriterState,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    pub fn from(writer: W) -> Self {
        Self { writer, state: WriterState::Initial }
    }

    /// Whether anything has been written yet. Once true, an error page can no longer be sent.
    pub fn started(&self) -> bool {
        self.state != WriterState::Initial
    }

    pub async fn write_all(&mut self, response: &HttpResponse) -> Result<(), std::io::Error> {
        self.write_status(&response.status).await?;
        self.write_headers(&response.headers).await?;
        self.write_body_full(&response.body).await?;
        Ok(())
    }

    /// Writes status and headers only, as a HEAD reply.
    pub async fn write_head(&mut self, response: &HttpResponse) -> Result<(), std::io::Error> {
        self.write_status(&response.status).await?;
        self.write_headers(&response.headers).await?;
        self.finish().await
    }

    pub async fn write_status(&mut self, status_line: &HttpStatus) -> Result<(), std::io::Error> {
        self.writer.write_all(format!("{}\r\n", status_line).as_bytes()).await?;
        self.state = WriterState::WritingHeaders;
        Ok(())
    }

    pub async fn write_headers(&mut self, headers: &Headers) -> Result<(), std::io::Error> {
        self.writer.write_all(format!("{}\r\n", headers).as_bytes()).await?;
        self.state = WriterState::WritingBody;
        Ok(())
    }

    pub async fn write_body_full(&mut self, response_body: &[u8]) -> Result<(), std::io::Error> {
        self.writer.write_all(response_body).await?;
        self.finish().await
    }

    async fn finish(&mut self) -> Result<(), std::io::Error> {
        self.writer.flush().await?;
        self.state = WriterState::Done;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
