//! Security scan capability.
//!
//! The validator only sees the [`SecurityScanner`] trait. The default
//! [`RandomScanner`] is a placeholder that rejects a fixed share of files at
//! random; [`ClamdScanner`] talks to a ClamAV daemon and can replace it
//! without touching the validator.

use crate::config::{PipelineConfig, ScannerKind};
use crate::file::FileHandle;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Result of a security scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    /// No threat detected.
    Clean,
    /// The scanner flagged the file.
    Infected { threat: String },
}

/// Why a scan could not produce a [`ScanResult`].
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("scanner unreachable at {addr}: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("scanner I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("scan timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected scanner response: {0}")]
    Protocol(String),
}

#[async_trait]
pub trait SecurityScanner: Send + Sync {
    async fn scan(&self, file: &FileHandle) -> Result<ScanResult, ScanError>;
}

/// Placeholder scanner: passes each file with a fixed probability.
pub struct RandomScanner {
    pass_rate: f64,
    rng: Mutex<StdRng>,
}

impl RandomScanner {
    pub fn new(pass_rate: f64) -> Self {
        Self {
            pass_rate: pass_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(pass_rate: f64, seed: u64) -> Self {
        Self {
            pass_rate: pass_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl SecurityScanner for RandomScanner {
    async fn scan(&self, file: &FileHandle) -> Result<ScanResult, ScanError> {
        let passed = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(self.pass_rate);
        debug!("RandomScanner: '{}' passed={}", file.name, passed);
        if passed {
            Ok(ScanResult::Clean)
        } else {
            Ok(ScanResult::Infected {
                threat: "Placeholder.Random".to_string(),
            })
        }
    }
}

/// Scanner that passes everything.
pub struct NoopScanner;

#[async_trait]
impl SecurityScanner for NoopScanner {
    async fn scan(&self, _file: &FileHandle) -> Result<ScanResult, ScanError> {
        Ok(ScanResult::Clean)
    }
}

/// ClamAV daemon over TCP, using the `zINSTREAM` command.
///
/// ```bash
/// docker run -d --name clamav -p 3310:3310 clamav/clamav:latest
/// ```
pub struct ClamdScanner {
    addr: String,
    timeout: Duration,
}

impl ClamdScanner {
    const CHUNK: usize = 64 * 1024;

    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn instream(&self, content: &[u8]) -> Result<String, ScanError> {
        let mut stream =
            TcpStream::connect(&self.addr)
                .await
                .map_err(|source| ScanError::Unreachable {
                    addr: self.addr.clone(),
                    source,
                })?;

        // zINSTREAM\0 <len:u32 be> <data> ... <0:u32>
        stream.write_all(b"zINSTREAM\0").await?;
        for chunk in content.chunks(Self::CHUNK) {
            stream.write_all(&(chunk.len() as u32).to_be_bytes()).await?;
            stream.write_all(chunk).await?;
        }
        stream.write_all(&0u32.to_be_bytes()).await?;
        stream.flush().await?;

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;
        Ok(String::from_utf8_lossy(&response)
            .trim_end_matches('\0')
            .trim()
            .to_string())
    }
}

/// Parse a clamd reply such as `stream: OK` or `stream: Eicar-Test-Signature FOUND`.
pub(crate) fn parse_clamd_reply(reply: &str) -> Result<ScanResult, ScanError> {
    if reply.ends_with("OK") {
        return Ok(ScanResult::Clean);
    }
    if let Some(body) = reply.strip_suffix("FOUND") {
        let threat = body
            .split_once(':')
            .map(|(_, t)| t)
            .unwrap_or(body)
            .trim();
        let threat = if threat.is_empty() { "Unknown threat" } else { threat };
        return Ok(ScanResult::Infected {
            threat: threat.to_string(),
        });
    }
    Err(ScanError::Protocol(reply.to_string()))
}

#[async_trait]
impl SecurityScanner for ClamdScanner {
    async fn scan(&self, file: &FileHandle) -> Result<ScanResult, ScanError> {
        let reply = tokio::time::timeout(self.timeout, self.instream(&file.content))
            .await
            .map_err(|_| ScanError::Timeout(self.timeout))??;
        debug!("clamd reply for '{}': {}", file.name, reply);
        parse_clamd_reply(&reply)
    }
}

/// Build the scanner selected in `config`.
pub fn scanner_from_config(config: &PipelineConfig) -> Box<dyn SecurityScanner> {
    match config.scanner {
        ScannerKind::Random => match config.seed {
            Some(seed) => Box::new(RandomScanner::seeded(config.scan_pass_rate, seed)),
            None => Box::new(RandomScanner::new(config.scan_pass_rate)),
        },
        ScannerKind::Noop => {
            warn!("NoopScanner: security scan disabled");
            Box::new(NoopScanner)
        }
        ScannerKind::Clamd => Box::new(ClamdScanner::new(config.clamd_addr.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::RawFile;
    use std::sync::Arc;

    fn handle() -> FileHandle {
        Arc::new(RawFile::pdf("a.pdf", &b"%PDF-1.4"[..]))
    }

    #[tokio::test]
    async fn noop_scanner_passes() {
        assert_eq!(NoopScanner.scan(&handle()).await.unwrap(), ScanResult::Clean);
    }

    #[tokio::test]
    async fn random_scanner_extremes_are_deterministic() {
        let always = RandomScanner::seeded(1.0, 7);
        let never = RandomScanner::seeded(0.0, 7);
        for _ in 0..20 {
            assert_eq!(always.scan(&handle()).await.unwrap(), ScanResult::Clean);
            assert!(matches!(
                never.scan(&handle()).await.unwrap(),
                ScanResult::Infected { .. }
            ));
        }
    }

    #[tokio::test]
    async fn random_scanner_rate_is_roughly_respected() {
        let s = RandomScanner::seeded(0.8, 42);
        let mut clean = 0;
        for _ in 0..1000 {
            if s.scan(&handle()).await.unwrap() == ScanResult::Clean {
                clean += 1;
            }
        }
        assert!((700..=900).contains(&clean), "clean = {clean}");
    }

    #[test]
    fn clamd_replies() {
        assert_eq!(parse_clamd_reply("stream: OK").unwrap(), ScanResult::Clean);
        assert_eq!(
            parse_clamd_reply("stream: Eicar-Test-Signature FOUND").unwrap(),
            ScanResult::Infected {
                threat: "Eicar-Test-Signature".into()
            }
        );
        assert!(parse_clamd_reply("INSTREAM size limit exceeded. ERROR").is_err());
    }

    #[tokio::test]
    async fn clamd_instream_frames_content_and_reads_reply() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut command = [0u8; 10];
            sock.read_exact(&mut command).await.unwrap();
            assert_eq!(&command, b"zINSTREAM\0");

            let mut frames = Vec::new();
            let mut payload = Vec::new();
            loop {
                let len = sock.read_u32().await.unwrap() as usize;
                frames.push(len);
                if len == 0 {
                    break;
                }
                let mut chunk = vec![0u8; len];
                sock.read_exact(&mut chunk).await.unwrap();
                payload.extend_from_slice(&chunk);
            }
            sock.write_all(b"stream: Eicar-Test-Signature FOUND\0")
                .await
                .unwrap();
            (frames, payload)
        });

        let content: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let file = Arc::new(RawFile::pdf("eicar.pdf", content.clone()));
        let result = ClamdScanner::new(addr)
            .with_timeout(Duration::from_secs(5))
            .scan(&file)
            .await
            .unwrap();

        assert_eq!(
            result,
            ScanResult::Infected {
                threat: "Eicar-Test-Signature".into()
            }
        );
        let (frames, payload) = server.await.unwrap();
        assert_eq!(frames, vec![ClamdScanner::CHUNK, 100_000 - ClamdScanner::CHUNK, 0]);
        assert_eq!(payload, content);
    }

    #[tokio::test]
    async fn clamd_unreachable_is_an_error() {
        // Port 1 on localhost is essentially never listening.
        let s = ClamdScanner::new("127.0.0.1:1").with_timeout(Duration::from_secs(2));
        assert!(s.scan(&handle()).await.is_err());
    }
}
