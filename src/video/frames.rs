//! Video stored as a directory of numbered PNG frames

use image::RgbImage;
use std::fs;
use std::path::{Path, PathBuf};

use super::{FrameSink, VideoStore};
use crate::error::RigError;

/// `VideoStore` over `frame_00000.png`, `frame_00001.png`, ... directories
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDirectory;

impl FrameDirectory {
    pub fn frame_path(dir: &Path, index: usize) -> PathBuf {
        dir.join(format!("frame_{:05}.png", index))
    }

    /// Write every frame into `dir`
    pub fn write_all(dir: &Path, frames: &[RgbImage]) -> Result<(), RigError> {
        let mut writer = DirectoryWriter::create(dir)?;
        for frame in frames {
            writer.write_frame(frame)?;
        }
        Box::new(writer).finish()
    }
}

fn io_error(path: &Path, source: std::io::Error) -> RigError {
    RigError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl VideoStore for FrameDirectory {
    fn read_frames(&mut self, path: &Path) -> Result<Vec<RgbImage>, RigError> {
        let mut files: Vec<PathBuf> = fs::read_dir(path)
            .map_err(|e| io_error(path, e))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("png")))
            .collect();
        files.sort();

        files
            .iter()
            .map(|file| {
                image::open(file)
                    .map(|img| img.to_rgb8())
                    .map_err(|e| RigError::Capture(format!("{}: {}", file.display(), e)))
            })
            .collect()
    }

    fn create_writer(&mut self, path: &Path) -> Result<Box<dyn FrameSink>, RigError> {
        Ok(Box::new(DirectoryWriter::create(path)?))
    }
}

pub struct DirectoryWriter {
    dir: PathBuf,
    next: usize,
}

impl DirectoryWriter {
    pub fn create(dir: &Path) -> Result<Self, RigError> {
        fs::create_dir_all(dir).map_err(|e| io_error(dir, e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            next: 0,
        })
    }
}

impl FrameSink for DirectoryWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<(), RigError> {
        let path = FrameDirectory::frame_path(&self.dir, self.next);
        frame
            .save(&path)
            .map_err(|e| RigError::Capture(format!("{}: {}", path.display(), e)))?;
        self.next += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), RigError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_frames_read_back_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("Scenario_1.mp4");
        let frames: Vec<RgbImage> = (0..12u8)
            .map(|i| RgbImage::from_pixel(4, 4, Rgb([i, i, i])))
            .collect();
        FrameDirectory::write_all(&video, &frames).unwrap();

        let read = FrameDirectory.read_frames(&video).unwrap();
        assert_eq!(read.len(), 12);
        assert_eq!(read[11].get_pixel(0, 0).0, [11, 11, 11]);
    }

    #[test]
    fn test_missing_video_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FrameDirectory.read_frames(&dir.path().join("none")).unwrap_err();
        assert!(matches!(err, RigError::Io { .. }));
    }
}
