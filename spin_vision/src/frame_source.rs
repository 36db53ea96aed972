// THEORY:
// The `frame_source` module is the boundary between the analysis and whatever
// decodes the recording. The pipeline only needs four things from a source:
// how many frames there are, the frame rate, the ability to jump to a frame,
// and the next frame. Everything else (containers, codecs, keyframes) stays
// behind the `FrameSource` trait.
//
// Frames are produced lazily and handed out by value; a source never keeps a
// frame after returning it. Running off the end of the source is not an error:
// `read_next` simply returns `None`, as it does after seeking past the end.
//
// Two sources ship with the library:
// - `MemoryFrameSource` for frames that are already decoded.
// - `ImageSequenceSource` for a directory of numbered still images, the usual
//   export format of high-speed lab cameras.
// Container formats (mp4, avi, mov) are decoded by the tester binary.

use crate::core_modules::frame::Frame;
use crate::error::{Result, VisionError};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::debug;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

pub trait FrameSource {
    /// Number of frames the source reports.
    fn total_frames(&self) -> usize;

    /// Frames per second. Always positive.
    fn frame_rate(&self) -> f64;

    /// Width and height of every frame.
    fn frame_size(&self) -> (u32, u32);

    /// Positions the next `read_next` at `index`. Seeking past the end is
    /// allowed and makes the next read return `None`.
    fn seek(&mut self, index: usize) -> Result<()>;

    /// The next frame, or `None` at end of stream.
    fn read_next(&mut self) -> Result<Option<Frame>>;
}

fn check_frame_rate(frame_rate: f64) -> Result<()> {
    if frame_rate > 0.0 && frame_rate.is_finite() {
        Ok(())
    } else {
        Err(VisionError::InvalidParameters(format!(
            "frame rate must be positive, got {frame_rate}"
        )))
    }
}

/// Frames held in memory, e.g. synthetic clips or frames decoded elsewhere.
#[derive(Debug, Clone)]
pub struct MemoryFrameSource {
    frames: Vec<RgbImage>,
    frame_rate: f64,
    cursor: usize,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<RgbImage>, frame_rate: f64) -> Result<Self> {
        check_frame_rate(frame_rate)?;
        Ok(Self {
            frames,
            frame_rate,
            cursor: 0,
        })
    }
}

impl FrameSource for MemoryFrameSource {
    fn total_frames(&self) -> usize {
        self.frames.len()
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_size(&self) -> (u32, u32) {
        self.frames.first().map(|f| f.dimensions()).unwrap_or((0, 0))
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        self.cursor = index;
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        let Some(image) = self.frames.get(self.cursor) else {
            return Ok(None);
        };
        let frame = Frame::new(self.cursor, image.clone());
        self.cursor += 1;
        Ok(Some(frame))
    }
}

/// A directory of still images, one per frame, ordered by file name.
///
/// File names must sort in frame order, which zero-padded numbering
/// (`frame_00001.png`) guarantees.
#[derive(Debug, Clone)]
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    frame_rate: f64,
    frame_size: (u32, u32),
    cursor: usize,
}

impl ImageSequenceSource {
    pub fn open<P: AsRef<Path>>(directory: P, frame_rate: f64) -> Result<Self> {
        check_frame_rate(frame_rate)?;
        let directory = directory.as_ref();
        let unreadable = |reason: String| VisionError::SourceUnreadable {
            path: directory.to_path_buf(),
            reason,
        };

        let entries = std::fs::read_dir(directory).map_err(|e| unreadable(e.to_string()))?;
        let mut paths = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| unreadable(e.to_string()))?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();

        let first = paths
            .first()
            .ok_or_else(|| unreadable("no image files found".to_string()))?;
        let frame_size = image::image_dimensions(first).map_err(|e| unreadable(e.to_string()))?;
        debug!(
            directory = %directory.display(),
            frames = paths.len(),
            width = frame_size.0,
            height = frame_size.1,
            "opened image sequence"
        );

        Ok(Self {
            paths,
            frame_rate,
            frame_size,
            cursor: 0,
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn total_frames(&self) -> usize {
        self.paths.len()
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    fn seek(&mut self, index: usize) -> Result<()> {
        self.cursor = index;
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let image = image::open(path)?.to_rgb8();
        let frame = Frame::new(self.cursor, image);
        self.cursor += 1;
        Ok(Some(frame))
    }
}
