//! Sparse golden pattern format
//!
//! A pattern stores only the pixels that differ from a background colour,
//! shifted so the bounding box's top-left corner becomes (0, 0), together
//! with the box in original coordinates, the pattern size and the offset of a
//! logical reference point (RP) from that top-left corner.
//!
//! On disk a pattern is a JSON object with the fields `Data`, `Box`, `Size`
//! and `RP_Offset`.

use image::{Rgb, RgbImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::PatternError;

/// File extension used for sparse golden patterns
pub const PATTERN_EXTENSION: &str = "pattern";

/// One non-background pixel of a pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternPixel {
    #[serde(rename = "X")]
    pub x: u32,
    #[serde(rename = "Y")]
    pub y: u32,
    #[serde(rename = "RGBA")]
    pub rgba: [u8; 4],
    /// Hue, lightness, saturation scaled to 0-240
    #[serde(rename = "HLS", default)]
    pub hls: [f64; 3],
}

/// Sparse golden pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenPattern {
    #[serde(rename = "Data")]
    pub data: Vec<PatternPixel>,
    /// (x0, y0, x1, y1) in the coordinates of the source raster
    #[serde(rename = "Box")]
    pub bounds: (u32, u32, u32, u32),
    /// (width, height)
    #[serde(rename = "Size")]
    pub size: (u32, u32),
    /// Reference point minus the box top-left corner
    #[serde(rename = "RP_Offset")]
    pub rp_offset: (f64, f64),
}

impl GoldenPattern {
    /// Build a pattern from every pixel of `raster` that differs from
    /// `background`.
    pub fn encode(
        raster: &RgbaImage,
        background: Rgba<u8>,
        reference_point: (f64, f64),
    ) -> Result<Self, PatternError> {
        let mut data = Vec::new();
        for (x, y, pixel) in raster.enumerate_pixels() {
            if *pixel != background {
                data.push(PatternPixel {
                    x,
                    y,
                    rgba: pixel.0,
                    hls: pixel_hls(pixel.0),
                });
            }
        }

        let min_x = data.iter().map(|p| p.x).min().ok_or(PatternError::Empty)?;
        let min_y = data.iter().map(|p| p.y).min().ok_or(PatternError::Empty)?;
        let max_x = data.iter().map(|p| p.x).max().ok_or(PatternError::Empty)?;
        let max_y = data.iter().map(|p| p.y).max().ok_or(PatternError::Empty)?;

        let rp_offset = (
            reference_point.0 - min_x as f64,
            reference_point.1 - min_y as f64,
        );

        for pixel in &mut data {
            pixel.x -= min_x;
            pixel.y -= min_y;
        }

        Ok(Self {
            data,
            bounds: (min_x, min_y, max_x, max_y),
            size: (max_x - min_x + 1, max_y - min_y + 1),
            rp_offset,
        })
    }

    /// Rebuild the raster: `Size` filled transparent, each stored pixel set.
    pub fn decode(&self) -> RgbaImage {
        let (width, height) = self.size;
        let mut raster = RgbaImage::new(width, height);
        for pixel in &self.data {
            if pixel.x < width && pixel.y < height {
                raster.put_pixel(pixel.x, pixel.y, Rgba(pixel.rgba));
            }
        }
        raster
    }

    /// Read a pattern file, rejecting truncated or inconsistent data.
    pub fn load(path: &Path) -> Result<Self, PatternError> {
        let invalid = |reason: String| PatternError::InvalidFile {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let pattern: GoldenPattern =
            serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

        let (width, height) = pattern.size;
        if width == 0 || height == 0 {
            return Err(invalid(format!("empty size {}x{}", width, height)));
        }
        if let Some(pixel) = pattern
            .data
            .iter()
            .find(|p| p.x >= width || p.y >= height)
        {
            return Err(invalid(format!(
                "pixel ({}, {}) outside size {}x{}",
                pixel.x, pixel.y, width, height
            )));
        }

        Ok(pattern)
    }

    /// Write the pattern as JSON
    pub fn save(&self, path: &Path) -> Result<(), PatternError> {
        let json = serde_json::to_string(self).map_err(|e| PatternError::InvalidFile {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::write(path, json).map_err(|source| PatternError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Convert a decoded pattern to the three-channel golden raster used by the
/// matcher.
///
/// The authoring tool stored alpha inverted: the channels are split, alpha is
/// bit-inverted and the result is merged as BGR (b, g, !a). Read back in RGB
/// order each pixel becomes (255 - a, g, b), so transparent pixels turn into
/// the reserved mask colour.
pub fn golden_from_pattern(raster: &RgbaImage) -> RgbImage {
    let mut golden = RgbImage::new(raster.width(), raster.height());
    for (x, y, pixel) in raster.enumerate_pixels() {
        let [_, g, b, a] = pixel.0;
        golden.put_pixel(x, y, Rgb([!a, g, b]));
    }
    golden
}

/// HLS of an RGBA pixel scaled to 0-240
pub fn pixel_hls(rgba: [u8; 4]) -> [f64; 3] {
    let r = rgba[0] as f64 / 255.0;
    let g = rgba[1] as f64 / 255.0;
    let b = rgba[2] as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let lightness = (max + min) / 2.0;

    if max == min {
        return [0.0, lightness * 240.0, 0.0];
    }

    let range = max - min;
    let saturation = if lightness <= 0.5 {
        range / (max + min)
    } else {
        range / (2.0 - max - min)
    };

    let rc = (max - r) / range;
    let gc = (max - g) / range;
    let bc = (max - b) / range;
    let hue = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    let hue = (hue / 6.0).rem_euclid(1.0);

    [hue * 240.0, lightness * 240.0, saturation * 240.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn sample_raster() -> RgbaImage {
        let mut raster = RgbaImage::from_pixel(20, 20, BLUE);
        raster.put_pixel(7, 4, Rgba([255, 255, 255, 255]));
        raster.put_pixel(9, 6, Rgba([10, 200, 30, 255]));
        raster.put_pixel(8, 10, Rgba([0, 0, 0, 255]));
        raster
    }

    #[test]
    fn test_encode_box_size_and_offset() {
        let pattern = GoldenPattern::encode(&sample_raster(), BLUE, (5.0, 5.0)).unwrap();
        assert_eq!(pattern.bounds, (7, 4, 9, 10));
        assert_eq!(pattern.size, (3, 7));
        assert_eq!(pattern.rp_offset, (-2.0, 1.0));
        assert_eq!(pattern.data.len(), 3);
    }

    #[test]
    fn test_decode_reproduces_shifted_pixels() {
        let raster = sample_raster();
        let pattern = GoldenPattern::encode(&raster, BLUE, (5.0, 5.0)).unwrap();
        let decoded = pattern.decode();

        assert_eq!(decoded.dimensions(), (3, 7));
        for (x, y, pixel) in raster.enumerate_pixels() {
            if *pixel != BLUE {
                assert_eq!(decoded.get_pixel(x - 7, y - 4), pixel);
            }
        }
        // Untouched positions stay transparent
        assert_eq!(decoded.get_pixel(0, 6).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_all_background_is_error() {
        let raster = RgbaImage::from_pixel(4, 4, BLUE);
        assert!(matches!(
            GoldenPattern::encode(&raster, BLUE, (0.0, 0.0)),
            Err(PatternError::Empty)
        ));
    }

    #[test]
    fn test_golden_from_pattern_inverts_alpha() {
        let mut raster = RgbaImage::new(2, 1);
        raster.put_pixel(1, 0, Rgba([90, 20, 30, 255]));
        let golden = golden_from_pattern(&raster);
        assert_eq!(golden.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(golden.get_pixel(1, 0).0, [0, 20, 30]);
    }

    #[test]
    fn test_hls_scaling() {
        assert_eq!(pixel_hls([255, 255, 255, 255]), [0.0, 240.0, 0.0]);
        let red = pixel_hls([255, 0, 0, 255]);
        assert!((red[0] - 0.0).abs() < 1e-9);
        assert!((red[1] - 120.0).abs() < 1e-9);
        assert!((red[2] - 240.0).abs() < 1e-9);
        let blue = pixel_hls([0, 0, 255, 255]);
        assert!((blue[0] - 160.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marker.pattern");
        let pattern = GoldenPattern::encode(&sample_raster(), BLUE, (8.0, 8.0)).unwrap();
        pattern.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"RP_Offset\""));
        assert_eq!(GoldenPattern::load(&path).unwrap(), pattern);
    }

    #[test]
    fn test_load_truncated_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pattern");
        fs::write(&path, "{\"Data\": [{\"X\": 1").unwrap();
        match GoldenPattern::load(&path) {
            Err(PatternError::InvalidFile { path: p, .. }) => assert!(p.ends_with("broken.pattern")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_load_rejects_pixel_outside_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outside.pattern");
        fs::write(
            &path,
            r#"{"Data":[{"X":5,"Y":0,"RGBA":[1,2,3,255]}],"Box":[0,0,1,1],"Size":[2,2],"RP_Offset":[0,0]}"#,
        )
        .unwrap();
        assert!(matches!(
            GoldenPattern::load(&path),
            Err(PatternError::InvalidFile { .. })
        ));
    }
}
