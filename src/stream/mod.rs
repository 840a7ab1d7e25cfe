//! Stream layers
//!
//! Leaf first: [`RandomAccessStream`] reads a file (or a byte range of it)
//! and skips its own exclusions, [`DynamicInputStream`] stacks another
//! exclusion list plus filters on any [`ByteSource`], and
//! [`RandomAccessAudioStream`] adds the audio format, time conversions,
//! timeline mapping and export.

pub mod audio_stream;
pub mod dynamic;
pub mod exclusion;
pub mod random_access;
pub mod source;

pub use audio_stream::RandomAccessAudioStream;
pub use dynamic::DynamicInputStream;
pub use exclusion::ExclusionList;
pub use random_access::RandomAccessStream;
pub use source::{ByteSource, MemorySource};
