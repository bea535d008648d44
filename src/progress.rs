//! Out-of-band progress channel for generator subprocesses.
//!
//! Each bridge owns one [`ProgressChannel`]: a tiny embedded HTTP endpoint
//! bound to an ephemeral loopback port. The generator reports fractional
//! completion by requesting `/?progress=<decimal>`; the handler stores the
//! last well-formed value in a mutex-protected cell and acknowledges every
//! request. Progress cells are per-bridge, never process-wide.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::any;
use axum::Router;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Bound on how long `stop()` may block waiting for the listener to wind down.
const STOP_GRACE: Duration = Duration::from_secs(1);

/// Shared cell holding the latest reported progress value.
type ProgressCell = Arc<Mutex<Option<f64>>>;

/// Embedded HTTP endpoint receiving `progress=<decimal>` reports.
///
/// The listener runs on its own single-worker tokio runtime so the owning
/// bridge stays a plain-threads component. Request volume is low (one
/// reporter, occasional requests), so there is no backpressure handling.
#[derive(Debug)]
pub struct ProgressChannel {
    port: u16,
    cell: ProgressCell,
    runtime: Option<tokio::runtime::Runtime>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ProgressChannel {
    /// Bind an ephemeral loopback port and start serving progress reports.
    ///
    /// Binding to port 0 lets the OS pick the port, so concurrently running
    /// bridges on one host can never collide; the assigned port is passed to
    /// the subprocess explicitly on its command line.
    pub fn start() -> std::io::Result<Self> {
        let cell: ProgressCell = Arc::new(Mutex::new(None));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("progress-channel")
            .enable_all()
            .build()?;

        let listener = runtime.block_on(tokio::net::TcpListener::bind(("127.0.0.1", 0)))?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = Router::new()
            .route("/", any(report))
            .with_state(cell.clone());

        runtime.spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                warn!("progress channel listener failed: {e}");
            }
        });

        debug!(port, "progress channel listening");
        Ok(Self {
            port,
            cell,
            runtime: Some(runtime),
            shutdown: Some(shutdown_tx),
        })
    }

    /// Port the channel is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Host the channel is reachable on from the subprocess.
    pub fn host(&self) -> &'static str {
        "127.0.0.1"
    }

    /// Latest reported progress, or `None` if no report has arrived yet.
    pub fn latest(&self) -> Option<f64> {
        *self.cell.lock()
    }

    /// Stop the listener, waiting at most [`STOP_GRACE`] for it to wind down.
    ///
    /// Safe to call multiple times; later calls are no-ops.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(STOP_GRACE);
            debug!(port = self.port, "progress channel stopped");
        }
    }
}

impl Drop for ProgressChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Store the `progress` query parameter if it parses as a fraction in [0, 1].
///
/// Malformed or out-of-range values drop the update, never the channel;
/// every request is acknowledged either way so the reporter is not blocked
/// on anything beyond the acknowledgment.
async fn report(
    State(cell): State<ProgressCell>,
    Query(params): Query<HashMap<String, String>>,
) -> StatusCode {
    if let Some(value) = params
        .get("progress")
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|value| (0.0..=1.0).contains(value))
    {
        *cell.lock() = Some(value);
    }
    StatusCode::OK
}
