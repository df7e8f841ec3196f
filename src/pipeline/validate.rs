//! The validator: size check → security scan → structural probe.
//!
//! Checks run in that fixed order and stop at the first failure. Each file
//! always gets exactly one [`Verdict`]; nothing in here returns an error, so a
//! broken file (or a panicking probe) cannot take the rest of its batch down.

use crate::config::PipelineConfig;
use crate::file::{FailureKind, FileHandle, Verdict};
use crate::messages;
use crate::pipeline::probe::StructureProbe;
use crate::pipeline::scan::{ScanResult, SecurityScanner};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Validator {
    max_file_size: u64,
    concurrency: usize,
    scanner: Arc<dyn SecurityScanner>,
    probe: Arc<dyn StructureProbe>,
}

impl Validator {
    pub fn new(
        config: &PipelineConfig,
        scanner: Arc<dyn SecurityScanner>,
        probe: Arc<dyn StructureProbe>,
    ) -> Self {
        Self {
            max_file_size: config.max_file_size,
            concurrency: config.validation_concurrency.max(1),
            scanner,
            probe,
        }
    }

    /// Run the check sequence over one file.
    pub async fn validate(&self, file: FileHandle) -> Verdict {
        // 1. size
        if file.size_bytes > self.max_file_size {
            debug!(
                "'{}': {} bytes exceeds {} byte limit",
                file.name, file.size_bytes, self.max_file_size
            );
            return Verdict::rejected(
                file,
                FailureKind::SizeExceeded,
                messages::size_exceeded(self.max_file_size),
            );
        }

        // 2. security scan
        match self.scanner.scan(&file).await {
            Ok(ScanResult::Clean) => {}
            Ok(ScanResult::Infected { threat }) => {
                warn!("'{}': scanner flagged {}", file.name, threat);
                return Verdict::rejected(
                    file,
                    FailureKind::SecurityRejected,
                    messages::MALWARE_DETECTED,
                );
            }
            Err(e) => {
                warn!("'{}': security scan failed: {}", file.name, e);
                return Verdict::rejected(
                    file,
                    FailureKind::SecurityRejected,
                    messages::SCAN_UNAVAILABLE,
                );
            }
        }

        // 3. structure
        let probe = Arc::clone(&self.probe);
        let content = file.content.clone();
        let probed = tokio::task::spawn_blocking(move || probe.probe(&content)).await;
        match probed {
            Ok(Ok(())) => Verdict::ready(file),
            Ok(Err(detail)) => {
                debug!("'{}': structure probe failed: {}", file.name, detail);
                Verdict::rejected(file, FailureKind::StructurallyCorrupt, messages::CORRUPTED)
            }
            Err(join_err) => {
                warn!("'{}': structure probe panicked: {}", file.name, join_err);
                Verdict::rejected(file, FailureKind::StructurallyCorrupt, messages::CORRUPTED)
            }
        }
    }

    /// Validate a batch concurrently; verdicts come back in input order, and
    /// only once every file has one.
    pub async fn validate_batch(&self, files: Vec<FileHandle>) -> Vec<Verdict> {
        let start = Instant::now();
        let total = files.len();
        let verdicts: Vec<Verdict> = stream::iter(files.into_iter().map(|file| {
            let validator = self.clone();
            async move { validator.validate(file).await }
        }))
        .buffered(self.concurrency)
        .collect()
        .await;

        let ready = verdicts.iter().filter(|v| v.is_ready()).count();
        info!(
            "Validated {} files ({} ready, {} rejected) in {}ms",
            total,
            ready,
            total - ready,
            start.elapsed().as_millis()
        );
        verdicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FileStatus, RawFile};
    use crate::pipeline::probe::{minimal_pdf, LopdfProbe};
    use crate::pipeline::scan::{NoopScanner, ScanError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingScanner {
        calls: AtomicUsize,
        result: ScanResult,
    }

    #[async_trait]
    impl SecurityScanner for CountingScanner {
        async fn scan(&self, _file: &FileHandle) -> Result<ScanResult, ScanError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.clone())
        }
    }

    /// Passes only once every scan of the batch is waiting at the barrier.
    struct RendezvousScanner(tokio::sync::Barrier);

    #[async_trait]
    impl SecurityScanner for RendezvousScanner {
        async fn scan(&self, _file: &FileHandle) -> Result<ScanResult, ScanError> {
            self.0.wait().await;
            Ok(ScanResult::Clean)
        }
    }

    struct BrokenScanner;

    #[async_trait]
    impl SecurityScanner for BrokenScanner {
        async fn scan(&self, _file: &FileHandle) -> Result<ScanResult, ScanError> {
            Err(ScanError::Protocol("garbled".into()))
        }
    }

    fn validator(scanner: Arc<dyn SecurityScanner>, probe: Arc<dyn StructureProbe>) -> Validator {
        Validator::new(&PipelineConfig::default(), scanner, probe)
    }

    fn pdf(name: &str) -> FileHandle {
        Arc::new(RawFile::pdf(name, minimal_pdf()))
    }

    #[tokio::test]
    async fn well_formed_pdf_is_ready() {
        let v = validator(Arc::new(NoopScanner), Arc::new(LopdfProbe));
        let verdict = v.validate(pdf("ok.pdf")).await;
        assert_eq!(verdict.status, FileStatus::Ready);
        assert_eq!(verdict.message, messages::READY);
        assert_eq!(verdict.failure, None);
    }

    #[tokio::test]
    async fn oversize_never_reaches_scan_or_probe() {
        let scanner = Arc::new(CountingScanner {
            calls: AtomicUsize::new(0),
            result: ScanResult::Clean,
        });
        let probe_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&probe_calls);
        let probe = move |_: &[u8]| -> Result<(), String> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        let v = validator(scanner.clone(), Arc::new(probe));

        let big = Arc::new(RawFile::pdf("big.pdf", minimal_pdf()).with_declared_size(10_000_000));
        let verdict = v.validate(big).await;

        assert_eq!(verdict.failure, Some(FailureKind::SizeExceeded));
        assert_eq!(verdict.message, "File size exceeds the 5 MB limit.");
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 0);
        assert_eq!(probe_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exactly_at_limit_passes_size_check() {
        let v = validator(
            Arc::new(NoopScanner),
            Arc::new(|_: &[u8]| -> Result<(), String> { Ok(()) }),
        );
        let f = Arc::new(RawFile::pdf("edge.pdf", minimal_pdf()).with_declared_size(5_000_000));
        assert!(v.validate(f).await.is_ready());
    }

    #[tokio::test]
    async fn infected_skips_probe() {
        let probe_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&probe_calls);
        let probe = move |_: &[u8]| -> Result<(), String> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        let scanner = Arc::new(CountingScanner {
            calls: AtomicUsize::new(0),
            result: ScanResult::Infected {
                threat: "Test.EICAR".into(),
            },
        });
        let v = validator(scanner, Arc::new(probe));
        let verdict = v.validate(pdf("bad.pdf")).await;
        assert_eq!(verdict.failure, Some(FailureKind::SecurityRejected));
        assert_eq!(verdict.message, messages::MALWARE_DETECTED);
        assert_eq!(probe_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scanner_failure_fails_closed() {
        let v = validator(Arc::new(BrokenScanner), Arc::new(LopdfProbe));
        let verdict = v.validate(pdf("x.pdf")).await;
        assert_eq!(verdict.failure, Some(FailureKind::SecurityRejected));
        assert_eq!(verdict.message, messages::SCAN_UNAVAILABLE);
    }

    #[tokio::test]
    async fn panicking_probe_is_corruption() {
        let v = validator(
            Arc::new(NoopScanner),
            Arc::new(|_: &[u8]| -> Result<(), String> { panic!("parser blew up") }),
        );
        let verdict = v.validate(pdf("boom.pdf")).await;
        assert_eq!(verdict.failure, Some(FailureKind::StructurallyCorrupt));
        assert_eq!(verdict.message, messages::CORRUPTED);
    }

    #[tokio::test]
    async fn batch_isolation_and_order() {
        let v = validator(Arc::new(NoopScanner), Arc::new(LopdfProbe));
        let files = vec![
            Arc::new(RawFile::pdf("broken.pdf", &b"%PDF-1.4 garbage"[..])),
            pdf("fine.pdf"),
            Arc::new(RawFile::pdf("huge.pdf", minimal_pdf()).with_declared_size(6_000_000)),
        ];
        let verdicts = v.validate_batch(files).await;
        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts[0].handle.name, "broken.pdf");
        assert_eq!(verdicts[0].failure, Some(FailureKind::StructurallyCorrupt));
        assert_eq!(verdicts[1].handle.name, "fine.pdf");
        assert!(verdicts[1].is_ready());
        assert_eq!(verdicts[2].failure, Some(FailureKind::SizeExceeded));
    }

    #[tokio::test]
    async fn batch_scans_overlap() {
        let n = 4;
        let scanner = Arc::new(RendezvousScanner(tokio::sync::Barrier::new(n)));
        let v = validator(scanner, Arc::new(LopdfProbe));
        let files = (0..n).map(|i| pdf(&format!("{i}.pdf"))).collect();

        let verdicts = tokio::time::timeout(Duration::from_secs(5), v.validate_batch(files))
            .await
            .expect("scans ran one at a time");
        assert!(verdicts.iter().all(Verdict::is_ready));
    }

    #[tokio::test]
    async fn empty_batch() {
        let v = validator(Arc::new(NoopScanner), Arc::new(LopdfProbe));
        assert!(v.validate_batch(Vec::new()).await.is_empty());
    }
}
