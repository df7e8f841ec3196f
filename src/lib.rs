//! # edgequake-pdf-upload
//!
//! Stage, validate and upload PDF files.
//!
//! Each incoming file is checked for size, scanned for malware and probed
//! for structural soundness before it lands in a session registry. Files
//! that pass are `Ready`; the caller selects some and uploads them
//! concurrently, each with its own deadline.
//!
//! ## Pipeline Overview
//!
//! ```text
//! RawFile batch
//!  │
//!  ├─ 1. Intake    drop non-PDF media types
//!  ├─ 2. Validate  size → scan → structure probe (concurrent, per file)
//!  ├─ 3. Stage     one registry append for the whole batch
//!  ├─ 4. Select    toggle Ready files
//!  └─ 5. Upload    one task per selected file, timeout-bounded
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf_upload::{Orchestrator, PipelineConfig, RawFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Orchestrator::from_config(PipelineConfig::default())?;
//!     let bytes = std::fs::read("document.pdf")?;
//!     let ids = session.intake(vec![RawFile::pdf("document.pdf", bytes)]).await?;
//!     for id in ids {
//!         session.toggle_selection(id)?;
//!     }
//!     session.upload_selected().join().await;
//!     for f in session.files() {
//!         println!("{} {} {}", f.name(), f.status(), f.message());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-upload` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod file;
pub mod messages;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod selection;
pub mod state;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, ScannerKind, PDF_MEDIA_TYPE};
pub use error::{TransportError, UploadError};
pub use file::{
    FailureKind, FileHandle, FileId, FileStatus, FileSummary, RawFile, StagedFile, Verdict,
};
pub use orchestrator::{Orchestrator, UploadBatch, UploadReport};
pub use pipeline::probe::{LopdfProbe, StructureProbe};
pub use pipeline::scan::{ClamdScanner, NoopScanner, RandomScanner, ScanResult, SecurityScanner};
pub use pipeline::transport::{HttpTransport, SimulatedTransport, Transport};
pub use progress::{NoopObserver, Observer, PipelineObserver};
pub use state::{Change, Ignored};
pub use stream::ChangeStream;
