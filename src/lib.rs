//! # Image Dedup
//!
//! Resumable, rotation-aware duplicate image detection.
//!
//! ## Core Philosophy
//! - **Never auto-delete** - Groups come with a recommended keeper; nothing
//!   on disk is touched
//! - **Survive interruption** - Extraction progress is checkpointed so
//!   multi-hour runs pick up where they stopped
//! - **Rotation aware** - Copies turned by 90°, 180° or 270° still match
//!
//! ## Architecture
//! The library is split into a core engine and presentation layers:
//! - `core` - The duplicate detection engine
//! - `events` - Event-driven progress reporting
//! - `error` - Error taxonomy
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{DedupError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. `RUST_LOG`
/// overrides `default_level` when set.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
