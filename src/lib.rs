//! # Face Verification
//!
//! Siamese face verification: learn whether two face images show the same
//! person, then name unseen faces by comparing them against known ones.
//!
//! ## Workflow
//! - Load one directory per person and pair every image with every other
//! - Train a similarity scorer on the same/different labels
//! - Score each probe against the gallery and report the best match
//!
//! ## Architecture
//! - `core` - The verification engine
//! - `events` - Event-driven progress reporting
//! - `error` - User-friendly error types

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{Result, VerifierError};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. Filtering follows
/// `RUST_LOG`; calling it twice leaves the first subscriber in place.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
