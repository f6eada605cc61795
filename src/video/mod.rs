//! Recorded video verification
//!
//! Videos reach the verifier as decoded RGB frames through a `VideoStore`;
//! annotated frames go back out through a `FrameSink`.

pub mod flash;
pub mod frames;

pub use flash::{FlashReport, flash_count};
pub use frames::FrameDirectory;

use image::RgbImage;
use std::path::Path;

use crate::error::RigError;

/// Destination for annotated frames
pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RigError>;

    /// Flush and close the output
    fn finish(self: Box<Self>) -> Result<(), RigError>;
}

/// Decodes recorded videos and encodes annotated ones
pub trait VideoStore {
    fn read_frames(&mut self, path: &Path) -> Result<Vec<RgbImage>, RigError>;

    fn create_writer(&mut self, path: &Path) -> Result<Box<dyn FrameSink>, RigError>;
}
