//! Structural-integrity probe: can the bytes be opened as a PDF at all?
//!
//! The parsed document is discarded; only success or failure matters. Parsing
//! is CPU-bound, so the validator runs the probe inside
//! `tokio::task::spawn_blocking`.

use tracing::debug;

/// Document-structure check used as a corruption probe.
pub trait StructureProbe: Send + Sync {
    /// `Ok(())` when the document parses; `Err(detail)` otherwise.
    fn probe(&self, content: &[u8]) -> Result<(), String>;
}

/// Probe backed by `lopdf`.
///
/// A document must load (header, xref and trailer resolved) and expose at
/// least one page.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfProbe;

impl StructureProbe for LopdfProbe {
    fn probe(&self, content: &[u8]) -> Result<(), String> {
        if content.len() < 5 || &content[..5] != b"%PDF-" {
            return Err("missing %PDF- header".to_string());
        }
        let doc = lopdf::Document::load_mem(content).map_err(|e| e.to_string())?;
        let pages = doc.get_pages().len();
        debug!("lopdf probe: {} pages, version {}", pages, doc.version);
        if pages == 0 {
            return Err("document has no pages".to_string());
        }
        Ok(())
    }
}

impl<F> StructureProbe for F
where
    F: Fn(&[u8]) -> Result<(), String> + Send + Sync,
{
    fn probe(&self, content: &[u8]) -> Result<(), String> {
        self(content)
    }
}

/// Build a minimal, well-formed single-page PDF.
///
/// Used by tests; the xref offsets are computed
/// so strict parsers accept it.
pub fn minimal_pdf() -> Vec<u8> {
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>",
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
    ];

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for off in offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    out
}
