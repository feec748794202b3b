//! Service surface for the auscult analyzer.
//!
//! Wraps the analysis core with the pieces a deployment needs: WAV decoding
//! for blobs served by the media store, the content-hash cache collaborator,
//! env-driven settings, logger setup, and the boundary error mapping. The
//! compute phase itself never does I/O; collaborator calls happen strictly
//! before and after it, and cache failures never fail a request.

pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod logger;
pub mod media;
pub mod wav;

pub use api::{Analyzed, Api, Timings};
pub use config::Settings;
pub use errors::{ServiceError, ServiceResult};
