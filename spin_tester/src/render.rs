use anyhow::{Context, Result};
use opencv::{
    core::{self, Mat, Point, Scalar},
    imgcodecs, imgproc,
    prelude::*,
};
use spin_vision::pipeline::OverlayFrame;
use std::path::{Path, PathBuf};

const CIRCLE_RADIUS: i32 = 10;

fn bgr(blue: f64, green: f64, red: f64) -> Scalar {
    Scalar::new(blue, green, red, 0.0)
}

/// Copies an RGB frame into a BGR `Mat` for drawing.
fn to_mat(image: &image::RgbImage) -> Result<Mat> {
    let mut rgb = Mat::new_rows_cols_with_default(
        image.height() as i32,
        image.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    rgb.data_bytes_mut()?.copy_from_slice(image.as_raw());

    let mut bgr_frame = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr_frame, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr_frame)
}

fn point((x, y): (u32, u32)) -> Point {
    Point::new(x as i32, y as i32)
}

/// Circles each centroid, joins centre and marker, and labels the frame index.
pub fn draw_overlay(overlay: &OverlayFrame) -> Result<Mat> {
    let mut canvas = to_mat(&overlay.frame.image)?;
    let marker = point(overlay.marker);

    if let Some(center) = overlay.center.map(point) {
        imgproc::line(&mut canvas, center, marker, bgr(0.0, 255.0, 0.0), 2, imgproc::LINE_8, 0)?;
        imgproc::circle(&mut canvas, center, CIRCLE_RADIUS, bgr(255.0, 0.0, 255.0), 2, imgproc::LINE_8, 0)?;
    }
    imgproc::circle(&mut canvas, marker, CIRCLE_RADIUS, bgr(0.0, 0.0, 255.0), 2, imgproc::LINE_8, 0)?;
    imgproc::put_text(
        &mut canvas,
        &overlay.frame.index.to_string(),
        Point::new(marker.x + CIRCLE_RADIUS, marker.y),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.5,
        bgr(255.0, 0.0, 0.0),
        1,
        imgproc::LINE_8,
        false,
    )?;
    Ok(canvas)
}

/// Writes one PNG per overlay into `directory`, returning the paths written.
pub fn write_overlays(overlays: &[OverlayFrame], directory: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(directory)
        .with_context(|| format!("creating {}", directory.display()))?;

    let mut written = Vec::with_capacity(overlays.len());
    for overlay in overlays {
        let canvas = draw_overlay(overlay)?;
        let path = directory.join(format!("overlay_{:05}.png", overlay.frame.index));
        let path_str = path
            .to_str()
            .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
        let ok = imgcodecs::imwrite(path_str, &canvas, &core::Vector::new())?;
        if !ok {
            anyhow::bail!("OpenCV could not write {}", path.display());
        }
        written.push(path);
    }
    Ok(written)
}
