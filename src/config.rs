//! Configuration for the staging and upload pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Callers set only what they care about and
//! rely on the documented defaults for the rest.

use crate::error::UploadError;
use crate::progress::PipelineObserver;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// The only media type accepted at intake.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Configuration for a staging session.
///
/// # Example
/// ```rust
/// use edgequake_pdf_upload::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .max_file_size(10_000_000)
///     .upload_timeout_ms(30_000)
///     .endpoint("https://uploads.example.com/documents")
///     .build()
///     .unwrap();
/// assert_eq!(config.upload_timeout().as_secs(), 30);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Largest accepted declared size in bytes. Default: 5 000 000.
    pub max_file_size: u64,

    /// Deadline of one upload attempt, measured from when it is issued.
    /// Default: 15 000 ms.
    pub upload_timeout_ms: u64,

    /// Media type a raw file must declare to be staged. Default: `application/pdf`.
    pub accepted_media_type: String,

    /// Upper bound on validation pipelines running at once. Default: 16.
    pub validation_concurrency: usize,

    /// Which security scanner [`crate::Orchestrator::from_config`] wires in.
    /// Default: [`ScannerKind::Random`].
    pub scanner: ScannerKind,

    /// Pass probability of the placeholder scanner. Default: 0.8.
    pub scan_pass_rate: f64,

    /// Seed for the placeholder scanner and simulated transport. `None` seeds
    /// from the OS.
    pub seed: Option<u64>,

    /// clamd address for [`ScannerKind::Clamd`]. Default: `127.0.0.1:3310`.
    pub clamd_addr: String,

    /// Upload endpoint. `None` uses the simulated transport.
    pub endpoint: Option<String>,

    /// Latency of the simulated transport. Default: 2 000 ms.
    pub simulated_delay_ms: u64,

    /// Buffer size of the change broadcast channel. Default: 256.
    pub event_capacity: usize,

    /// Lifecycle observer. Default: none.
    pub observer: Option<Arc<dyn PipelineObserver>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_file_size: 5_000_000,
            upload_timeout_ms: 15_000,
            accepted_media_type: PDF_MEDIA_TYPE.to_string(),
            validation_concurrency: 16,
            scanner: ScannerKind::default(),
            scan_pass_rate: 0.8,
            seed: None,
            clamd_addr: "127.0.0.1:3310".to_string(),
            endpoint: None,
            simulated_delay_ms: 2_000,
            event_capacity: 256,
            observer: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("max_file_size", &self.max_file_size)
            .field("upload_timeout_ms", &self.upload_timeout_ms)
            .field("accepted_media_type", &self.accepted_media_type)
            .field("validation_concurrency", &self.validation_concurrency)
            .field("scanner", &self.scanner)
            .field("scan_pass_rate", &self.scan_pass_rate)
            .field("seed", &self.seed)
            .field("clamd_addr", &self.clamd_addr)
            .field("endpoint", &self.endpoint)
            .field("simulated_delay_ms", &self.simulated_delay_ms)
            .field("event_capacity", &self.event_capacity)
            .field("observer", &self.observer.as_ref().map(|_| "<dyn PipelineObserver>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }

    pub fn simulated_delay(&self) -> Duration {
        Duration::from_millis(self.simulated_delay_ms)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    pub fn upload_timeout_ms(mut self, ms: u64) -> Self {
        self.config.upload_timeout_ms = ms;
        self
    }

    pub fn accepted_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.config.accepted_media_type = media_type.into();
        self
    }

    pub fn validation_concurrency(mut self, n: usize) -> Self {
        self.config.validation_concurrency = n.max(1);
        self
    }

    pub fn scanner(mut self, kind: ScannerKind) -> Self {
        self.config.scanner = kind;
        self
    }

    pub fn scan_pass_rate(mut self, rate: f64) -> Self {
        self.config.scan_pass_rate = rate;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn clamd_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.clamd_addr = addr.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = Some(url.into());
        self
    }

    pub fn simulated_delay_ms(mut self, ms: u64) -> Self {
        self.config.simulated_delay_ms = ms;
        self
    }

    pub fn event_capacity(mut self, n: usize) -> Self {
        self.config.event_capacity = n.max(1);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.config.observer = Some(observer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, UploadError> {
        let c = &self.config;
        if c.max_file_size == 0 {
            return Err(UploadError::InvalidConfig(
                "max_file_size must be greater than 0".into(),
            ));
        }
        if c.upload_timeout_ms == 0 {
            return Err(UploadError::InvalidConfig(
                "upload_timeout_ms must be greater than 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&c.scan_pass_rate) {
            return Err(UploadError::InvalidConfig(format!(
                "scan_pass_rate must be within 0.0–1.0, got {}",
                c.scan_pass_rate
            )));
        }
        if c.accepted_media_type.trim().is_empty() {
            return Err(UploadError::InvalidConfig(
                "accepted_media_type must not be empty".into(),
            ));
        }
        if let Some(ref url) = c.endpoint {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(UploadError::InvalidConfig(format!(
                    "endpoint must be an http(s) URL, got '{url}'"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Security scanner backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerKind {
    /// Placeholder: passes with probability `scan_pass_rate`. (default)
    #[default]
    Random,
    /// Always passes.
    Noop,
    /// ClamAV daemon over TCP.
    Clamd,
}

impl FromStr for ScannerKind {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" | "stub" => Ok(ScannerKind::Random),
            "noop" | "none" | "disabled" => Ok(ScannerKind::Noop),
            "clamd" | "clamav" => Ok(ScannerKind::Clamd),
            other => Err(UploadError::InvalidConfig(format!(
                "unknown scanner '{other}' (expected random, noop or clamd)"
            ))),
        }
    }
}
