use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinSet;

use crate::handlers::dispatch_handler;
use crate::request::{HTTPMethod, HttpRequest};
use crate::resolver::Resolver;
use crate::response::{HttpResponse, HttpStatus, ResponseWriter};

/// How long a client gets to send its request line and headers.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Pause after a failed accept so a persistent error (e.g. fd exhaustion) does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

pub struct HttpServer {
    listener: TcpListener,
    close_conn_rx: oneshot::Receiver<()>,
    resolver: Arc<Resolver>,
}

impl HttpServer {
    /// Wraps an already bound listener. Sending on (or dropping) the returned sender stops [`listen`](Self::listen).
    pub fn new(listener: TcpListener, resolver: Resolver) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel::<()>();
        (Self {
            listener,
            close_conn_rx: rx,
            resolver: Arc::new(resolver),
        }, tx)
    }

    #[cfg(test)]
    pub async fn serve(addr: SocketAddr, resolver: Resolver) -> Result<(Self, oneshot::Sender<()>)> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self::new(listener, resolver))
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the shutdown signal fires, then aborts any connection still in flight.
    pub async fn listen(mut self) -> Result<()> {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = &mut self.close_conn_rx => break,
                Some(_) = connections.join_next(), if !connections.is_empty() => {},
                result = self.listener.accept() => {
                    match result {
                        Ok((conn, addr)) => {
                            let resolver = Arc::clone(&self.resolver);
                            connections.spawn(async move {
                                if let Err(e) = Self::handle_connection(conn, addr, &resolver).await {
                                    debug!("Connection error from {}: {:#}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            warn!("accept failed: {}", e);
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                    }
                }
            };
        }
        info!("Gracefully shutting down server...");
        connections.shutdown().await;
        Ok(())
    }

    pub async fn handle_connection(mut conn: TcpStream, addr: SocketAddr, resolver: &Resolver) -> Result<()> {
        let (read_half, write_half) = conn.split();
        let mut reader = BufReader::new(read_half);
        let mut writer = ResponseWriter::from(write_half);

        let request = match tokio::time::timeout(REQUEST_TIMEOUT, HttpRequest::parse_from(&mut reader)).await {
            Ok(Ok(request)) => request,
            Ok(Err(e)) => {
                let _ = writer.write_all(&HttpResponse::error_page(HttpStatus::BadRequest)).await;
                return Err(e.context("malformed request"));
            }
            Err(_) => bail!("no complete request within {:?}", REQUEST_TIMEOUT),
        };
        debug!("{} {}", addr, request.request_line);

        if let Err(e) = dispatch_handler(&mut writer, &request, resolver).await {
            if e.status_code == HttpStatus::InternalServerError {
                warn!("{} {}: {}", addr, request.request_line, e.message);
            } else {
                debug!("{} {}: {}", addr, request.request_line, e.message);
            }
            if !writer.started() {
                let response = e.to_response();
                if *request.method() == HTTPMethod::HEAD {
                    writer.write_head(&response).await?;
                } else {
                    writer.write_all(&response).await?;
                }
            }
        }

        writer.into_inner().shutdown().await.context("closing connection")?;
        Ok(())
    }
}
