//! Intake: filter raw files by media type, and load files from disk.
//!
//! Filtering happens before validation. A file with the wrong media type
//! produces no staged entry and no verdict; it is only logged.

use crate::config::PDF_MEDIA_TYPE;
use crate::error::UploadError;
use crate::file::{FileHandle, RawFile};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Keep only the files whose declared media type matches `accepted`.
///
/// The comparison ignores ASCII case and any parameters after `;`.
pub fn accept(files: Vec<RawFile>, accepted: &str) -> (Vec<FileHandle>, usize) {
    let total = files.len();
    let kept: Vec<FileHandle> = files
        .into_iter()
        .filter(|f| {
            let ok = media_type_matches(&f.media_type, accepted);
            if !ok {
                debug!("Ignoring '{}': media type '{}'", f.name, f.media_type);
            }
            ok
        })
        .map(Arc::new)
        .collect();
    let ignored = total - kept.len();
    (kept, ignored)
}

/// `application/pdf; qs=0.5` matches `application/pdf`.
pub fn media_type_matches(declared: &str, accepted: &str) -> bool {
    let essence = declared.split(';').next().unwrap_or("").trim();
    essence.eq_ignore_ascii_case(accepted.trim())
}

/// Read a file from disk into a [`RawFile`].
///
/// The media type comes from the extension (`.pdf`), falling back to content
/// sniffing and finally `application/octet-stream`, the way a file picker
/// labels files.
pub async fn load_path(path: impl AsRef<Path>) -> Result<RawFile, UploadError> {
    let path = path.as_ref();
    let content = tokio::fs::read(path)
        .await
        .map_err(|source| UploadError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let media_type = guess_media_type(path, &content);
    debug!("Loaded '{}' ({} bytes, {})", name, content.len(), media_type);

    Ok(RawFile::new(name, media_type, content))
}

fn guess_media_type(path: &Path, content: &[u8]) -> String {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.eq_ignore_ascii_case("pdf"))
        .map(|_| PDF_MEDIA_TYPE.to_string());

    by_extension
        .or_else(|| infer::get(content).map(|t| t.mime_type().to_string()))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
