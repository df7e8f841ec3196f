//! Pipeline stages between a raw file and an uploaded file.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ validate ──▶ (registry) ──▶ transport
//! (filter)   size/scan/probe            time-bounded attempt
//! ```
//!
//! 1. [`intake`]: media-type filter; loading files from disk
//! 2. [`validate`]: the ordered check sequence, batch fan-out
//! 3. [`scan`]: pluggable security scanner
//! 4. [`probe`]: structural-integrity probe (lopdf)
//! 5. [`transport`]: one upload attempt with deadline and cancellation

pub mod intake;
pub mod probe;
pub mod scan;
pub mod transport;
pub mod validate;
