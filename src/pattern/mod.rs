//! Golden-image verification
//!
//! - `codec` - sparse golden pattern files
//! - `geometry` - search boxes and angle-to-pixel conversion
//! - `matcher` - masked normalized template matching

pub mod codec;
pub mod geometry;
pub mod matcher;

pub use codec::{GoldenPattern, PATTERN_EXTENSION, PatternPixel, golden_from_pattern};
pub use geometry::{AngularOffset, Horizontal, PIXELS_PER_DEGREE, SearchBox, Vertical};
pub use matcher::{MatchOutcome, PatternMatcher};

use image::RgbImage;
use std::path::Path;

use crate::error::ComparisonError;

/// Golden raster ready for matching
#[derive(Debug, Clone)]
pub struct GoldenImage {
    /// File the golden was read from, used in error messages
    pub path: String,
    pub raster: RgbImage,
    /// Only sparse patterns carry a reference point
    pub rp_offset: Option<(f64, f64)>,
}

impl GoldenImage {
    /// Load a golden from a `.pattern` file or any raster format `image` reads.
    pub fn open(path: &Path) -> Result<Self, ComparisonError> {
        if !path.exists() {
            return Err(ComparisonError::MissingFile {
                kind: "Golden image",
                path: path.display().to_string(),
            });
        }

        let is_pattern = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(PATTERN_EXTENSION));

        if is_pattern {
            let pattern = GoldenPattern::load(path)?;
            Ok(Self {
                path: path.display().to_string(),
                raster: golden_from_pattern(&pattern.decode()),
                rp_offset: Some(pattern.rp_offset),
            })
        } else {
            Ok(Self {
                path: path.display().to_string(),
                raster: open_raster(path)?,
                rp_offset: None,
            })
        }
    }

    /// Wrap an in-memory raster
    pub fn from_raster(name: impl Into<String>, raster: RgbImage) -> Self {
        Self {
            path: name.into(),
            raster,
            rp_offset: None,
        }
    }
}

/// Read a captured frame or screenshot as RGB
pub fn open_raster(path: &Path) -> Result<RgbImage, ComparisonError> {
    let image = image::open(path).map_err(|source| ComparisonError::InvalidImage {
        path: path.display().to_string(),
        source,
    })?;
    Ok(image.to_rgb8())
}
