//! User-facing status messages.
//!
//! Every [`crate::file::StagedFile`] carries one of these strings at all
//! times. They are kept here so the validator, the state reducer and the CLI
//! agree on the exact wording, and so tests can compare against the constants
//! instead of string literals.

/// Verdict message for a file that passed every check.
pub const READY: &str = "File is ready for upload.";

/// The security scanner reported a threat.
pub const MALWARE_DETECTED: &str = "Malware detected. Upload aborted.";

/// The security scanner could not produce an answer.
pub const SCAN_UNAVAILABLE: &str = "Security scan could not be completed. Upload aborted.";

/// The structure probe could not parse the document.
pub const CORRUPTED: &str = "File appears to be corrupted.";

/// Shown while an attempt is in flight.
pub const UPLOADING: &str = "Uploading…";

/// The transport acknowledged the file.
pub const UPLOADED: &str = "File uploaded successfully!";

/// The attempt hit its deadline.
pub const TIMED_OUT: &str = "Upload timed out.";

/// Size-limit message, expressed in decimal megabytes of the configured cap.
///
/// `5_000_000` renders as `5 MB`; caps that are not a whole number of
/// megabytes keep one decimal (`2_500_000` → `2.5 MB`).
pub fn size_exceeded(max_bytes: u64) -> String {
    let mb = max_bytes as f64 / 1_000_000.0;
    if max_bytes % 1_000_000 == 0 {
        format!("File size exceeds the {} MB limit.", max_bytes / 1_000_000)
    } else {
        format!("File size exceeds the {mb:.1} MB limit.")
    }
}
