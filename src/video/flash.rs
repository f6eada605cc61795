//! Counting steady -> flashing transitions in a recorded symbol

use image::{Rgb, RgbImage};

use super::FrameSink;
use crate::error::ComparisonError;
use crate::pattern::matcher::draw_box;
use crate::pattern::{GoldenImage, PatternMatcher, SearchBox};
use crate::verdict::VerdictStatus;

/// Search area of a frame showing the flashing state
pub const FLASHING_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
/// Search area of a frame showing the steady state
pub const STEADY_COLOR: Rgb<u8> = Rgb([0, 0, 150]);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashReport {
    pub status: VerdictStatus,
    /// Rising edges into the flashing state
    pub observed: u32,
    pub expected: u32,
    pub frames: usize,
}

/// Scan `frames`, re-emitting each one (annotated) to `sink`, and count how
/// often the symbol enters the flashing state.
///
/// A frame that matches neither golden leaves the state unchanged.
#[allow(clippy::too_many_arguments)]
pub fn flash_count(
    matcher: &PatternMatcher,
    frames: impl IntoIterator<Item = RgbImage>,
    steady: &GoldenImage,
    flashing: &GoldenImage,
    expected: u32,
    search: SearchBox,
    tolerance: u32,
    sink: &mut dyn FrameSink,
) -> Result<FlashReport, ComparisonError> {
    let area = search.expanded(tolerance);
    let mut is_flashing = false;
    let mut observed = 0;
    let mut count = 0;

    for (index, mut frame) in frames.into_iter().enumerate() {
        let name = format!("frame {}", index);
        let flash = matcher.compare_pattern(&frame, &name, flashing, search, tolerance, false)?;

        if flash.matched {
            draw_box(&mut frame, area, FLASHING_COLOR, 2);
            if !is_flashing {
                observed += 1;
                is_flashing = true;
            }
        } else {
            let rest = matcher.compare_pattern(&frame, &name, steady, search, tolerance, false)?;
            if rest.matched {
                draw_box(&mut frame, area, STEADY_COLOR, 1);
                is_flashing = false;
            }
        }

        sink.write_frame(&frame)
            .map_err(|e| ComparisonError::Video(e.to_string()))?;
        count += 1;
    }

    tracing::debug!("flash detection: {} rising edges in {} frames", observed, count);

    Ok(FlashReport {
        status: VerdictStatus::from_bool(observed == expected),
        observed,
        expected,
        frames: count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RigError;

    #[derive(Default)]
    struct MemorySink {
        frames: Vec<RgbImage>,
    }

    impl FrameSink for MemorySink {
        fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RigError> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<(), RigError> {
            Ok(())
        }
    }

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn stripes(horizontal: bool) -> RgbImage {
        RgbImage::from_fn(20, 20, |x, y| {
            let v = if horizontal { y } else { x };
            if v % 2 == 0 { WHITE } else { BLACK }
        })
    }

    /// 'S' steady, 'F' flashing, '.' blank
    fn sequence(states: &str) -> Vec<RgbImage> {
        states
            .chars()
            .map(|c| {
                let mut frame = RgbImage::from_pixel(60, 60, BLACK);
                let symbol = match c {
                    'S' => Some(stripes(true)),
                    'F' => Some(stripes(false)),
                    _ => None,
                };
                if let Some(symbol) = symbol {
                    image::imageops::replace(&mut frame, &symbol, 10, 10);
                }
                frame
            })
            .collect()
    }

    fn run(states: &str, expected: u32) -> (FlashReport, MemorySink) {
        let steady = GoldenImage::from_raster("steady.png", stripes(true));
        let flashing = GoldenImage::from_raster("flash.png", stripes(false));
        let mut sink = MemorySink::default();
        let report = flash_count(
            &PatternMatcher::default(),
            sequence(states),
            &steady,
            &flashing,
            expected,
            SearchBox::new(5, 5, 50, 50),
            5,
            &mut sink,
        )
        .unwrap();
        (report, sink)
    }

    #[test]
    fn test_three_rising_edges_pass() {
        let (report, sink) = run("SFFS.FSF", 3);
        assert_eq!(report.observed, 3);
        assert_eq!(report.status, VerdictStatus::Passed);
        assert_eq!(sink.frames.len(), 8);
    }

    #[test]
    fn test_two_rising_edges_fail() {
        let (report, _) = run("SFSFS", 3);
        assert_eq!(report.observed, 2);
        assert_eq!(report.status, VerdictStatus::Failed);
    }

    #[test]
    fn test_blank_frame_keeps_state() {
        // F . F is still a single flash
        let (report, _) = run("SF.FS", 1);
        assert_eq!(report.observed, 1);
        assert_eq!(report.status, VerdictStatus::Passed);
    }

    #[test]
    fn test_frames_are_annotated() {
        let (_, sink) = run("SF", 1);
        // Search area grown by the tolerance: (0, 0) to (55, 55)
        assert_eq!(*sink.frames[0].get_pixel(0, 30), STEADY_COLOR);
        assert_eq!(*sink.frames[0].get_pixel(56, 30), BLACK);
        assert_eq!(*sink.frames[1].get_pixel(55, 30), FLASHING_COLOR);
        assert_eq!(*sink.frames[1].get_pixel(56, 30), FLASHING_COLOR);
    }
}
