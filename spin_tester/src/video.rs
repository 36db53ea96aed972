use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use spin_vision::{Frame, FrameSource, VisionError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A video container decoded by OpenCV.
pub struct OpenCvVideoSource {
    path: PathBuf,
    capture: VideoCapture,
    total_frames: usize,
    frame_rate: f64,
    frame_size: (u32, u32),
    next_index: usize,
}

impl OpenCvVideoSource {
    pub fn open(path: &Path) -> spin_vision::Result<Self> {
        let unreadable = |reason: String| VisionError::SourceUnreadable {
            path: path.to_path_buf(),
            reason,
        };
        let path_str = path
            .to_str()
            .ok_or_else(|| unreadable("path is not valid UTF-8".to_string()))?;

        let capture = VideoCapture::from_file(path_str, videoio::CAP_ANY)
            .map_err(|e| unreadable(e.to_string()))?;
        if !capture.is_opened().map_err(|e| unreadable(e.to_string()))? {
            return Err(unreadable("no decoder could open the file".to_string()));
        }

        let property = |id: i32| capture.get(id).map_err(|e| unreadable(e.to_string()));
        let total_frames = property(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as usize;
        let frame_rate = property(videoio::CAP_PROP_FPS)?;
        let frame_size = (
            property(videoio::CAP_PROP_FRAME_WIDTH)? as u32,
            property(videoio::CAP_PROP_FRAME_HEIGHT)? as u32,
        );
        if !(frame_rate > 0.0 && frame_rate.is_finite()) {
            return Err(unreadable(format!("container reports {frame_rate} fps")));
        }
        debug!(
            path = %path.display(),
            total_frames,
            frame_rate,
            width = frame_size.0,
            height = frame_size.1,
            "opened video"
        );

        Ok(Self {
            path: path.to_path_buf(),
            capture,
            total_frames,
            frame_rate,
            frame_size,
            next_index: 0,
        })
    }

    fn decode_error(&self, error: opencv::Error) -> VisionError {
        VisionError::SourceUnreadable {
            path: self.path.clone(),
            reason: error.to_string(),
        }
    }
}

impl FrameSource for OpenCvVideoSource {
    fn total_frames(&self) -> usize {
        self.total_frames
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }

    fn frame_size(&self) -> (u32, u32) {
        self.frame_size
    }

    fn seek(&mut self, index: usize) -> spin_vision::Result<()> {
        self.next_index = index;
        if index < self.total_frames {
            self.capture
                .set(videoio::CAP_PROP_POS_FRAMES, index as f64)
                .map_err(|e| self.decode_error(e))?;
        }
        Ok(())
    }

    fn read_next(&mut self) -> spin_vision::Result<Option<Frame>> {
        if self.next_index >= self.total_frames {
            return Ok(None);
        }

        let mut bgr = Mat::default();
        let grabbed = self.capture.read(&mut bgr).map_err(|e| self.decode_error(e))?;
        if !grabbed || bgr.empty() {
            return Ok(None);
        }

        // OpenCV decodes to BGR; the library works in RGB.
        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)
            .map_err(|e| self.decode_error(e))?;
        let bytes = rgb.data_bytes().map_err(|e| self.decode_error(e))?.to_vec();
        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let image = image::RgbImage::from_raw(width, height, bytes).ok_or_else(|| {
            VisionError::SourceUnreadable {
                path: self.path.clone(),
                reason: format!("frame {} has an unexpected layout", self.next_index),
            }
        })?;

        let frame = Frame::new(self.next_index, image);
        self.next_index += 1;
        Ok(Some(frame))
    }
}
