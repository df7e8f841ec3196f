//! Upload transport: one time-bounded, cancellable transfer per attempt.
//!
//! [`Transport`] is the seam to the remote endpoint; [`attempt`] wraps a
//! single `send` with the deadline and the cancellation token. When either
//! fires, the `send` future is dropped on the spot, so a transport can never
//! report anything for an attempt that has already been settled.
//!
//! No retries happen here. Retrying is a caller decision.

use crate::config::PipelineConfig;
use crate::error::{TransportError, UploadError};
use crate::file::FileHandle;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Transfer the file payload; `Ok(())` is the endpoint's acknowledgement.
    async fn send(&self, file: &FileHandle) -> Result<(), TransportError>;
}

/// How one attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Completed,
    Failed(TransportError),
    /// The session cancelled the attempt (e.g. the file was removed).
    Cancelled,
}

/// Issue one attempt: `Issued → Completed | Failed | TimedOut`.
///
/// The deadline runs from the call. Cancellation wins over a completion
/// that becomes ready in the same poll.
pub async fn attempt(
    transport: &dyn Transport,
    file: &FileHandle,
    timeout: Duration,
    cancel: &CancellationToken,
) -> AttemptOutcome {
    let issued = Instant::now();
    debug!("Attempt issued for '{}' (deadline {:?})", file.name, timeout);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Attempt for '{}' cancelled", file.name);
            AttemptOutcome::Cancelled
        }
        res = tokio::time::timeout(timeout, transport.send(file)) => match res {
            Ok(Ok(())) => AttemptOutcome::Completed,
            Ok(Err(e)) => {
                warn!("Upload of '{}' failed: {}", file.name, e);
                AttemptOutcome::Failed(e)
            }
            Err(_) => {
                let elapsed_ms = issued.elapsed().as_millis() as u64;
                warn!("Upload of '{}' timed out after {}ms", file.name, elapsed_ms);
                AttemptOutcome::Failed(TransportError::Timeout { elapsed_ms })
            }
        }
    }
}

// ── HTTP ─────────────────────────────────────────────────────────────────

/// POSTs the raw PDF bytes to an endpoint.
///
/// The request carries `Content-Type: <media type>` and the file name in
/// `X-File-Name`. Any 2xx response is an acknowledgement.
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Replace anything that cannot appear in a header value.
fn header_safe_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect()
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, file: &FileHandle) -> Result<(), TransportError> {
        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, file.media_type.as_str())
            .header("x-file-name", header_safe_name(&file.name))
            .body(file.content.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    }
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Server {
                status: Some(status.as_u16()),
                detail: format!("HTTP {status}"),
            });
        }

        info!(
            "Uploaded '{}' ({} bytes) in {}ms",
            file.name,
            file.content.len(),
            start.elapsed().as_millis()
        );
        Ok(())
    }
}

// ── Simulated ────────────────────────────────────────────────────────────

/// Stand-in endpoint: waits, then fails 10 % of the time with a network
/// error, 10 % with a server error, and succeeds otherwise.
pub struct SimulatedTransport {
    delay: Duration,
    rng: Mutex<StdRng>,
}

impl SimulatedTransport {
    const NETWORK_FAILURE_RATE: f64 = 0.1;
    const SERVER_FAILURE_RATE: f64 = 0.1;

    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(delay: Duration, seed: u64) -> Self {
        Self {
            delay,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn send(&self, file: &FileHandle) -> Result<(), TransportError> {
        let roll: f64 = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen();
        tokio::time::sleep(self.delay).await;

        if roll < Self::NETWORK_FAILURE_RATE {
            Err(TransportError::Network("simulated connection reset".into()))
        } else if roll < Self::NETWORK_FAILURE_RATE + Self::SERVER_FAILURE_RATE {
            Err(TransportError::Server {
                status: None,
                detail: "simulated rejection".into(),
            })
        } else {
            debug!("SimulatedTransport accepted '{}'", file.name);
            Ok(())
        }
    }
}

/// Build the transport selected in `config`: HTTP when an endpoint is set,
/// the simulated one otherwise.
pub fn transport_from_config(config: &PipelineConfig) -> Result<Box<dyn Transport>, UploadError> {
    match config.endpoint {
        Some(ref url) => Ok(Box::new(HttpTransport::new(url.clone(), config.upload_timeout())?)),
        None => {
            let delay = config.simulated_delay();
            Ok(match config.seed {
                Some(seed) => Box::new(SimulatedTransport::seeded(delay, seed)),
                None => Box::new(SimulatedTransport::new(delay)),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::RawFile;
    use std::sync::Arc;

    struct Never;

    #[async_trait]
    impl Transport for Never {
        async fn send(&self, _file: &FileHandle) -> Result<(), TransportError> {
            std::future::pending().await
        }
    }

    struct Immediate(Result<(), TransportError>);

    #[async_trait]
    impl Transport for Immediate {
        async fn send(&self, _file: &FileHandle) -> Result<(), TransportError> {
            self.0.clone()
        }
    }

    fn handle() -> FileHandle {
        Arc::new(RawFile::pdf("a.pdf", &b"%PDF-1.4"[..]))
    }

    #[tokio::test(start_paused = true)]
    async fn slow_transport_times_out() {
        let out = attempt(
            &Never,
            &handle(),
            Duration::from_millis(15_000),
            &CancellationToken::new(),
        )
        .await;
        match out {
            AttemptOutcome::Failed(TransportError::Timeout { elapsed_ms }) => {
                assert!(elapsed_ms >= 15_000, "elapsed {elapsed_ms}")
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_before_issue_never_sends() {
        let token = CancellationToken::new();
        token.cancel();
        let out = attempt(&Immediate(Ok(())), &handle(), Duration::from_secs(1), &token).await;
        assert_eq!(out, AttemptOutcome::Cancelled);
    }

    #[tokio::test]
    async fn failures_are_reported_verbatim() {
        let err = TransportError::Server {
            status: Some(500),
            detail: "HTTP 500".into(),
        };
        let out = attempt(
            &Immediate(Err(err.clone())),
            &handle(),
            Duration::from_secs(1),
            &CancellationToken::new(),
        )
        .await;
        assert_eq!(out, AttemptOutcome::Failed(err));
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_transport_mixes_outcomes() {
        let t = SimulatedTransport::seeded(Duration::from_millis(2_000), 1);
        let (mut ok, mut net, mut server) = (0, 0, 0);
        for _ in 0..500 {
            match t.send(&handle()).await {
                Ok(()) => ok += 1,
                Err(TransportError::Network(_)) => net += 1,
                Err(TransportError::Server { .. }) => server += 1,
                Err(e) => panic!("unexpected {e:?}"),
            }
        }
        assert!(ok > 300, "ok = {ok}");
        assert!(net > 0 && server > 0, "net = {net}, server = {server}");
    }

    #[test]
    fn header_names_are_sanitised() {
        assert_eq!(header_safe_name("report 2024.pdf"), "report 2024.pdf");
        assert_eq!(header_safe_name("résumé\n.pdf"), "r_sum__.pdf");
    }

    #[test]
    fn config_without_endpoint_is_simulated() {
        let config = PipelineConfig::default();
        assert!(transport_from_config(&config).is_ok());
    }
}
