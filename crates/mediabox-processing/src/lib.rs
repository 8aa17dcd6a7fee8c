//! Mediabox Media Processing Library
//!
//! Content identity, ffprobe/ffmpeg probing and type-dispatched metadata extraction.

pub mod extractor;
pub mod identity;
pub mod probe;

// Re-export commonly used types
pub use extractor::MetadataExtractor;
pub use identity::identify;
pub use probe::{FfmpegProbe, FormatInfo, MediaProbe, ProbeReport, StreamInfo};
