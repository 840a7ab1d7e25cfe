//! Audio-domain types: format, filter collaborator and WAVE container

pub mod filter;
pub mod format;
pub mod wave;

pub use filter::{AudioFilter, FilterBinding};
pub use format::{AudioFormat, Encoding};
pub use wave::WaveHeader;
