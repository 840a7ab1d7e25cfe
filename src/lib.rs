//! Trimline - Non-destructive Recording Editor
//!
//! Trimline edits recordings without rewriting them. Cuts, "keep only this
//! range" edits and filter overlays are kept as metadata over the untouched
//! file; bytes are only materialised when the edited recording is exported.
//!
//! # Architecture
//!
//! The streams are layered decorators:
//! - `RandomAccessStream`: seekable file view that skips excluded bytes
//! - `DynamicInputStream`: a second exclusion list plus range-bound filters
//!   over any byte source
//! - `RandomAccessAudioStream`: audio format, millisecond conversions,
//!   physical/virtual timeline mapping and WAVE export

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod interval;
pub mod stream;

pub use audio::{AudioFilter, AudioFormat, Encoding};
pub use config::ExportOptions;
pub use error::{Result, TrimlineError};
pub use interval::Interval;
pub use stream::{ByteSource, DynamicInputStream, RandomAccessAudioStream, RandomAccessStream};
