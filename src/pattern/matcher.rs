//! Masked normalized template matching
//!
//! The golden raster is slid over a cropped search area of the reference and
//! scored with normalized cross-correlation over the RGB channels. Golden
//! pixels painted in the reserved mask colour take no part in the score, so a
//! golden can describe an arbitrary silhouette inside its bounding box.

use image::{Rgb, RgbImage, imageops};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use super::GoldenImage;
use super::geometry::{AngularOffset, PIXELS_PER_DEGREE, SearchBox, rdp_search_box};
use crate::error::ComparisonError;

pub const DEFAULT_THRESHOLD: f64 = 0.98;

/// Slack around [0, 1] accepted for the correlation maximum
pub const THRESHOLD_EPSILON: f64 = 1e-5;

/// Golden pixels of this colour are excluded from matching
pub const MASK_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

// ============================================================================
// Annotation colours
// ============================================================================

/// Rectangle around the located golden
pub const FOUND_COLOR: Rgb<u8> = Rgb([0, 244, 244]);
/// Search area when the verification passed, or absence mode did not match
pub const SEARCH_OK_COLOR: Rgb<u8> = Rgb([0, 0, 244]);
/// Search area when a present-expected golden was not found
pub const SEARCH_MISS_COLOR: Rgb<u8> = Rgb([244, 0, 0]);

/// Result of one verification
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Final verdict after the absence policy
    pub matched: bool,
    /// Whether the golden was found at all
    pub raw_match: bool,
    pub absence: bool,
    /// Maximum correlation
    pub score: f64,
    /// Best location inside the search area
    pub location: (u32, u32),
    /// Tolerance-expanded search area in reference coordinates
    pub search: SearchBox,
    pub golden_size: (u32, u32),
}

impl MatchOutcome {
    /// Best golden placement in reference coordinates
    pub fn golden_box(&self) -> SearchBox {
        let left = self.search.left + self.location.0 as i64;
        let top = self.search.top + self.location.1 as i64;
        SearchBox::new(
            left,
            top,
            left + self.golden_size.0 as i64,
            top + self.golden_size.1 as i64,
        )
    }
}

#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pub threshold: f64,
    pub pixels_per_degree: f64,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            pixels_per_degree: PIXELS_PER_DEGREE,
        }
    }
}

impl PatternMatcher {
    pub fn new(threshold: f64, pixels_per_degree: f64) -> Self {
        Self {
            threshold,
            pixels_per_degree,
        }
    }

    /// Look for the whole golden inside `search` grown by `tolerance`.
    pub fn compare_pattern(
        &self,
        reference: &RgbImage,
        reference_path: &str,
        golden: &GoldenImage,
        search: SearchBox,
        tolerance: u32,
        absence: bool,
    ) -> Result<MatchOutcome, ComparisonError> {
        let search = search.expanded(tolerance);
        let area = crop(reference, reference_path, search)?;
        self.match_area(&area, search, &golden.raster, &golden.path, absence)
    }

    /// Like `compare_pattern`, but only the `grab` region of the golden (also
    /// grown by `tolerance`) is searched for.
    #[allow(clippy::too_many_arguments)]
    pub fn compare_sub_image(
        &self,
        reference: &RgbImage,
        reference_path: &str,
        golden: &GoldenImage,
        search: SearchBox,
        grab: SearchBox,
        tolerance: u32,
        absence: bool,
    ) -> Result<MatchOutcome, ComparisonError> {
        let search = search.expanded(tolerance);
        let area = crop(reference, reference_path, search)?;

        let grab = grab.expanded(tolerance);
        let template = crop(&golden.raster, &golden.path, grab)?;

        self.match_area(&area, search, &template, &golden.path, absence)
    }

    /// Place the golden by angular offset from the display reference point.
    /// Only sparse patterns know their reference point.
    pub fn compare_pattern_rdp(
        &self,
        reference: &RgbImage,
        reference_path: &str,
        golden: &GoldenImage,
        offset: &AngularOffset,
        tolerance: u32,
        absence: bool,
    ) -> Result<MatchOutcome, ComparisonError> {
        let rp_offset = golden
            .rp_offset
            .ok_or_else(|| ComparisonError::MissingReferencePoint {
                path: golden.path.clone(),
            })?;
        let search = rdp_search_box(
            reference.dimensions(),
            golden.raster.dimensions(),
            rp_offset,
            offset,
            self.pixels_per_degree,
        );
        tracing::debug!(
            "RDP {} {} deg, {} {} deg -> search box {}",
            offset.horizontal,
            offset.horizontal_degrees,
            offset.vertical,
            offset.vertical_degrees,
            search
        );
        self.compare_pattern(reference, reference_path, golden, search, tolerance, absence)
    }

    fn match_area(
        &self,
        area: &RgbImage,
        search: SearchBox,
        template: &RgbImage,
        golden_path: &str,
        absence: bool,
    ) -> Result<MatchOutcome, ComparisonError> {
        check_golden_fits(area, template, golden_path)?;

        let (score, location) = masked_correlation(area, template, MASK_COLOR);
        let raw_match = score >= self.threshold
            && score >= 0.0 - THRESHOLD_EPSILON
            && score <= 1.0 + THRESHOLD_EPSILON;

        Ok(MatchOutcome {
            matched: raw_match != absence,
            raw_match,
            absence,
            score,
            location,
            search,
            golden_size: template.dimensions(),
        })
    }
}

/// Reject crops that are inverted, leave the image or exceed its extent.
pub fn check_crop_bounds(
    image: &RgbImage,
    path: &str,
    area: SearchBox,
) -> Result<(), ComparisonError> {
    let bounds = |message: String| ComparisonError::Bounds {
        path: path.to_string(),
        message,
    };

    if area.top >= area.bottom {
        return Err(bounds(format!(
            "top left Y coordinate ({}) should be less than bottom right Y coordinate ({})",
            area.top, area.bottom
        )));
    }
    if area.left >= area.right {
        return Err(bounds(format!(
            "top left X coordinate ({}) should be less than bottom right X coordinate ({})",
            area.left, area.right
        )));
    }

    let w = image.width() as i64;
    let h = image.height() as i64;
    let outside = |v: i64, limit: i64| v < 0 || v > limit;
    if outside(area.left, w) || outside(area.right, w) || outside(area.top, h) || outside(area.bottom, h)
    {
        return Err(bounds(format!(
            "crop position {} is outside image boundaries",
            area
        )));
    }

    if area.width() > w {
        return Err(bounds(format!(
            "cropped width {} is greater than original width ({})",
            area.width(),
            w
        )));
    }
    if area.height() > h {
        return Err(bounds(format!(
            "cropped height {} is greater than original height ({})",
            area.height(),
            h
        )));
    }

    Ok(())
}

fn check_golden_fits(
    area: &RgbImage,
    golden: &RgbImage,
    golden_path: &str,
) -> Result<(), ComparisonError> {
    if golden.height() > area.height() {
        return Err(ComparisonError::GoldenTooLarge {
            path: golden_path.to_string(),
            axis: "height",
            golden: golden.height(),
            reference: area.height(),
        });
    }
    if golden.width() > area.width() {
        return Err(ComparisonError::GoldenTooLarge {
            path: golden_path.to_string(),
            axis: "width",
            golden: golden.width(),
            reference: area.width(),
        });
    }
    Ok(())
}

/// Copy of `area` after checking it lies inside `image`
pub fn crop(image: &RgbImage, path: &str, area: SearchBox) -> Result<RgbImage, ComparisonError> {
    check_crop_bounds(image, path, area)?;
    Ok(imageops::crop_imm(
        image,
        area.left as u32,
        area.top as u32,
        area.width() as u32,
        area.height() as u32,
    )
    .to_image())
}

/// Normalized cross-correlation of `template` at every position inside
/// `image`, ignoring template pixels equal to `mask_color`.
///
/// Returns the maximum score and its first location in row-major order.
/// Positions where the score is not finite count as 0.
pub fn masked_correlation(
    image: &RgbImage,
    template: &RgbImage,
    mask_color: Rgb<u8>,
) -> (f64, (u32, u32)) {
    let mask: Vec<(u32, u32, [f64; 3])> = template
        .enumerate_pixels()
        .filter(|(_, _, p)| **p != mask_color)
        .map(|(x, y, p)| (x, y, [p[0] as f64, p[1] as f64, p[2] as f64]))
        .collect();

    let template_energy: f64 = mask
        .iter()
        .map(|(_, _, t)| t[0] * t[0] + t[1] * t[1] + t[2] * t[2])
        .sum();

    let (w, h) = template.dimensions();
    let mut best = f64::NEG_INFINITY;
    let mut best_location = (0, 0);

    for y in 0..=(image.height() - h) {
        for x in 0..=(image.width() - w) {
            let mut cross = 0.0;
            let mut image_energy = 0.0;
            for (dx, dy, t) in &mask {
                let p = image.get_pixel(x + dx, y + dy);
                for c in 0..3 {
                    let v = p[c] as f64;
                    cross += t[c] * v;
                    image_energy += v * v;
                }
            }

            let mut score = cross / (template_energy * image_energy).sqrt();
            if !score.is_finite() {
                score = 0.0;
            }
            if score > best {
                best = score;
                best_location = (x, y);
            }
        }
    }

    (best, best_location)
}

/// Draw a rectangle with inclusive corners, growing outward for `thickness`
pub fn draw_box(image: &mut RgbImage, area: SearchBox, color: Rgb<u8>, thickness: u32) {
    for i in 0..thickness as i64 {
        let width = area.width() + 1 + 2 * i;
        let height = area.height() + 1 + 2 * i;
        if width <= 0 || height <= 0 {
            continue;
        }
        let rect = Rect::at((area.left - i) as i32, (area.top - i) as i32)
            .of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Reference image with the search area and, on success, the located golden
pub fn annotate(reference: &RgbImage, outcome: &MatchOutcome) -> RgbImage {
    let mut image = reference.clone();

    if outcome.matched {
        let found = outcome.golden_box();
        let found = SearchBox::new(found.left - 1, found.top - 1, found.right, found.bottom);
        draw_box(&mut image, found, FOUND_COLOR, 1);
    }

    let color = if outcome.matched || outcome.absence {
        SEARCH_OK_COLOR
    } else {
        SEARCH_MISS_COLOR
    };
    let s = outcome.search;
    draw_box(
        &mut image,
        SearchBox::new(s.left - 1, s.top - 1, s.right + 1, s.bottom + 1),
        color,
        1,
    );

    image
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic textured raster
    fn textured(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([
                ((x * 37 + y * 11) % 251) as u8,
                ((x * 13 + y * 29) % 241) as u8,
                ((x * 7 + y * 17 + 40) % 239) as u8,
            ])
        })
    }

    fn golden_from(reference: &RgbImage, area: SearchBox) -> GoldenImage {
        GoldenImage::from_raster("golden.png", crop(reference, "reference.png", area).unwrap())
    }

    #[test]
    fn test_exact_crop_matches() {
        let reference = textured(80, 60);
        let area = SearchBox::new(20, 10, 40, 30);
        let golden = golden_from(&reference, area);

        let outcome = PatternMatcher::default()
            .compare_pattern(&reference, "ref.png", &golden, area, 0, false)
            .unwrap();
        assert!(outcome.matched);
        assert!(outcome.raw_match);
        assert!((outcome.score - 1.0).abs() < 1e-9);
        assert_eq!(outcome.location, (0, 0));
    }

    #[test]
    fn test_match_found_inside_tolerance() {
        let reference = textured(80, 60);
        let golden = golden_from(&reference, SearchBox::new(22, 13, 32, 23));

        let outcome = PatternMatcher::default()
            .compare_pattern(&reference, "ref.png", &golden, SearchBox::new(20, 10, 35, 25), 5, false)
            .unwrap();
        assert!(outcome.matched);
        assert_eq!(outcome.golden_box(), SearchBox::new(22, 13, 32, 23));
    }

    #[test]
    fn test_absence_inverts_result() {
        let reference = textured(80, 60);
        let area = SearchBox::new(20, 10, 40, 30);
        let golden = golden_from(&reference, area);
        let matcher = PatternMatcher::default();

        let present = matcher
            .compare_pattern(&reference, "ref.png", &golden, area, 0, true)
            .unwrap();
        assert!(present.raw_match);
        assert!(!present.matched);

        let blank = RgbImage::from_pixel(80, 60, Rgb([0, 0, 0]));
        let absent = matcher
            .compare_pattern(&blank, "blank.png", &golden, area, 0, true)
            .unwrap();
        assert!(!absent.raw_match);
        assert!(absent.matched);
        let missing = matcher
            .compare_pattern(&blank, "blank.png", &golden, area, 0, false)
            .unwrap();
        assert!(!missing.matched);
    }

    #[test]
    fn test_mask_colour_is_ignored() {
        let reference = textured(40, 40);
        let area = SearchBox::new(5, 5, 15, 15);
        let mut template = crop(&reference, "reference.png", area).unwrap();
        for x in 0..10 {
            template.put_pixel(x, 0, MASK_COLOR);
        }
        let golden = GoldenImage::from_raster("masked.png", template);
        let mut altered = reference.clone();
        for x in 5..15 {
            altered.put_pixel(x, 5, Rgb([0, 0, 0]));
        }

        let outcome = PatternMatcher::default()
            .compare_pattern(&altered, "ref.png", &golden, area, 0, false)
            .unwrap();
        assert!((outcome.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_crop_bounds_checks() {
        let reference = textured(50, 50);
        let golden = golden_from(&reference, SearchBox::new(0, 0, 5, 5));
        let matcher = PatternMatcher::default();

        let inverted_y = matcher
            .compare_pattern(&reference, "ref.png", &golden, SearchBox::new(0, 20, 10, 10), 0, false)
            .unwrap_err();
        match inverted_y {
            ComparisonError::Bounds { path, message } => {
                assert_eq!(path, "ref.png");
                assert!(message.contains("Y coordinate (20)"));
            }
            other => panic!("unexpected: {:?}", other),
        }

        let inverted_x = matcher
            .compare_pattern(&reference, "ref.png", &golden, SearchBox::new(20, 0, 10, 10), 0, false)
            .unwrap_err();
        assert!(inverted_x.to_string().contains("X coordinate (20)"));

        let outside = matcher
            .compare_pattern(&reference, "ref.png", &golden, SearchBox::new(45, 45, 50, 50), 1, false)
            .unwrap_err();
        assert!(outside.to_string().contains("outside image boundaries"));
    }

    #[test]
    fn test_golden_larger_than_crop() {
        let reference = textured(50, 50);
        let golden = golden_from(&reference, SearchBox::new(0, 0, 10, 20));
        let err = PatternMatcher::default()
            .compare_pattern(&reference, "ref.png", &golden, SearchBox::new(0, 0, 10, 10), 0, false)
            .unwrap_err();
        match err {
            ComparisonError::GoldenTooLarge { axis, golden, reference, .. } => {
                assert_eq!(axis, "height");
                assert_eq!((golden, reference), (20, 10));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_sub_image_grab_box() {
        let reference = textured(60, 60);
        let golden = GoldenImage::from_raster("full.png", reference.clone());
        let outcome = PatternMatcher::default()
            .compare_sub_image(
                &reference,
                "ref.png",
                &golden,
                SearchBox::new(10, 10, 30, 30),
                SearchBox::new(15, 15, 25, 25),
                0,
                false,
            )
            .unwrap();
        assert!(outcome.matched);
        assert_eq!(outcome.golden_box(), SearchBox::new(15, 15, 25, 25));

        let err = PatternMatcher::default()
            .compare_sub_image(
                &reference,
                "ref.png",
                &golden,
                SearchBox::new(10, 10, 30, 30),
                SearchBox::new(55, 55, 65, 65),
                0,
                false,
            )
            .unwrap_err();
        assert!(matches!(err, ComparisonError::Bounds { path, .. } if path == "full.png"));
    }

    #[test]
    fn test_rdp_requires_reference_point() {
        let reference = textured(60, 60);
        let golden = golden_from(&reference, SearchBox::new(0, 0, 5, 5));
        let offset = AngularOffset::parse("left,0,above,0").unwrap();
        let err = PatternMatcher::default()
            .compare_pattern_rdp(&reference, "ref.png", &golden, &offset, 0, false)
            .unwrap_err();
        assert!(matches!(err, ComparisonError::MissingReferencePoint { .. }));
    }

    #[test]
    fn test_rdp_locates_centred_symbol() {
        let reference = textured(100, 100);
        let mut golden = golden_from(&reference, SearchBox::new(45, 45, 55, 55));
        // Reference point at the centre of the symbol
        golden.rp_offset = Some((5.0, 5.0));
        let offset = AngularOffset::parse("right,0,below,0").unwrap();
        let outcome = PatternMatcher::default()
            .compare_pattern_rdp(&reference, "ref.png", &golden, &offset, 2, false)
            .unwrap();
        assert!(outcome.matched);
        assert_eq!(outcome.golden_box(), SearchBox::new(45, 45, 55, 55));
    }

    #[test]
    fn test_annotation_colours() {
        let reference = textured(50, 50);
        let area = SearchBox::new(10, 10, 20, 20);
        let golden = golden_from(&reference, area);
        let matcher = PatternMatcher::default();

        let hit = matcher
            .compare_pattern(&reference, "ref.png", &golden, area, 0, false)
            .unwrap();
        let image = annotate(&reference, &hit);
        assert_eq!(*image.get_pixel(9, 9), SEARCH_OK_COLOR);
        assert_eq!(*image.get_pixel(21, 15), SEARCH_OK_COLOR);

        let blank = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        let miss = matcher
            .compare_pattern(&blank, "blank.png", &golden, area, 0, false)
            .unwrap();
        let image = annotate(&blank, &miss);
        assert_eq!(*image.get_pixel(9, 9), SEARCH_MISS_COLOR);
        assert_eq!(*image.get_pixel(12, 12), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_crop_rejects_area_outside_image() {
        let reference = textured(40, 30);
        let inside = crop(&reference, "ref.png", SearchBox::new(10, 5, 40, 30)).unwrap();
        assert_eq!(inside.dimensions(), (30, 25));
        assert_eq!(inside.get_pixel(0, 0), reference.get_pixel(10, 5));

        for area in [
            SearchBox::new(-1, 0, 10, 10),
            SearchBox::new(0, 0, 41, 10),
            SearchBox::new(10, 10, 5, 20),
        ] {
            let err = crop(&reference, "ref.png", area).unwrap_err();
            assert!(matches!(err, ComparisonError::Bounds { ref path, .. } if path == "ref.png"), "{:?}", area);
        }
    }
}
