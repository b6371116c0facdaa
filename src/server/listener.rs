//! Accept loop with per-connection read and write deadlines.
//!
//! `axum::serve` has no connection timeouts, so connections are driven by
//! hyper directly. Each connection gets a header read deadline, and the whole
//! connection (reads, handler and response write) is dropped once the same
//! deadline has elapsed.

use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;

use super::REQUEST_TIMEOUT;

/// Serve `app` on `listener` forever with the fixed [`REQUEST_TIMEOUT`].
pub async fn serve(listener: TcpListener, app: Router) {
    serve_with_timeout(listener, app, REQUEST_TIMEOUT).await
}

/// Serve `app` on `listener` forever, closing any connection that is still
/// open after `timeout`.
pub async fn serve_with_timeout(listener: TcpListener, app: Router, timeout: Duration) {
    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::error!("accept failed: {}", e);
                // e.g. out of file descriptors; back off instead of spinning
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        let service = TowerToHyperService::new(app.clone());
        tokio::spawn(async move {
            let mut builder = Builder::new(TokioExecutor::new());
            builder
                .http1()
                .timer(TokioTimer::new())
                .header_read_timeout(timeout);

            let connection = builder.serve_connection(TokioIo::new(stream), service);
            match tokio::time::timeout(timeout, connection).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(%remote, "connection error: {}", e),
                Err(_) => tracing::debug!(%remote, "connection timed out"),
            }
        });
    }
}
