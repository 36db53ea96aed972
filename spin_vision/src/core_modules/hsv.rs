// THEORY:
// The `hsv` module is the lowest layer of the marker locator. Markers on the
// disk are told apart by colour, and colour is far more stable in a
// hue/saturation/value space than in raw RGB: a yellow sticker stays at the
// same hue whether it passes under the lamp or through the shadow of the
// launcher.
//
// The conversion follows the 8-bit convention every lab HSV picker uses:
// - Hue is the colour-wheel angle halved, so it fits a byte: [0, 179].
// - Saturation is chroma / value, scaled to [0, 255].
// - Value is max(R, G, B), already in [0, 255].
//
// `Hsv` is a "dumb" container: it knows how to build itself from one RGB pixel
// and nothing about its neighbours.

use crate::core_modules::frame::FrameView;
use image::Rgb;
use serde::{Deserialize, Serialize};

pub type Hue = u8;
pub type Saturation = u8;
pub type Value = u8;

/// Largest representable hue (359° halved and rounded down).
pub const MAX_HUE: Hue = 179;

/// A single pixel expressed in 8-bit hue/saturation/value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Hsv {
    /// Colour-wheel angle in degrees, halved (0-179).
    pub hue: Hue,
    /// Colour purity relative to brightness (0-255).
    pub saturation: Saturation,
    /// Brightness of the strongest channel (0-255).
    pub value: Value,
}

impl Hsv {
    pub const fn new(hue: Hue, saturation: Saturation, value: Value) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }

    /// Converts one RGB pixel.
    ///
    /// - Achromatic pixels (chroma 0) get hue 0, matching the usual convention.
    /// - Black gets saturation 0 rather than a division by zero.
    pub fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        let maximum_channel = red.max(green.max(blue));
        let minimum_channel = red.min(green.min(blue));
        let chroma = (maximum_channel - minimum_channel) as f32;

        let saturation = if maximum_channel == 0 {
            0
        } else {
            (255.0 * chroma / maximum_channel as f32).round() as u8
        };

        if chroma <= 0.0 {
            return Self::new(0, saturation, maximum_channel);
        }

        let (r, g, b) = (red as f32, green as f32, blue as f32);
        let (base_difference, sector_offset) = if maximum_channel == red {
            (g - b, 0.0)
        } else if maximum_channel == green {
            (b - r, 120.0)
        } else {
            (r - g, 240.0)
        };

        let mut hue_degrees = 60.0 * base_difference / chroma + sector_offset;
        if hue_degrees < 0.0 {
            hue_degrees += 360.0;
        }

        // 359.5°.. rounds up to 180, which is the same colour as 0.
        let hue = (hue_degrees / 2.0).round() as u16 % 180;
        Self::new(hue as Hue, saturation, maximum_channel)
    }

    pub fn as_array(&self) -> [u8; 3] {
        [self.hue, self.saturation, self.value]
    }
}

impl From<Rgb<u8>> for Hsv {
    fn from(pixel: Rgb<u8>) -> Self {
        let [red, green, blue] = pixel.0;
        Self::from_rgb(red, green, blue)
    }
}

/// A whole frame (or crop) converted to HSV, stored row-major.
#[derive(Debug, Clone)]
pub struct HsvImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Hsv>,
}

impl HsvImage {
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Hsv {
        self.pixels[(y * self.width + x) as usize]
    }
}

/// Converts a view (a full frame or an ROI crop) to HSV.
pub fn convert_rgb_to_hsv(view: &FrameView<'_>) -> HsvImage {
    let (width, height) = view.dimensions();
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push(Hsv::from(view.get_pixel(x, y)));
        }
    }
    HsvImage {
        width,
        height,
        pixels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn primaries_land_on_their_sectors() {
        assert_eq!(Hsv::from_rgb(255, 0, 0), Hsv::new(0, 255, 255));
        assert_eq!(Hsv::from_rgb(0, 255, 0), Hsv::new(60, 255, 255));
        assert_eq!(Hsv::from_rgb(0, 0, 255), Hsv::new(120, 255, 255));
    }

    #[test]
    fn yellow_sits_inside_the_default_marker_hue_band() {
        let yellow = Hsv::from_rgb(255, 255, 0);
        assert_eq!(yellow.hue, 30);
        assert_eq!(yellow.saturation, 255);
        assert_eq!(yellow.value, 255);
    }

    #[test]
    fn grays_are_achromatic() {
        assert_eq!(Hsv::from_rgb(0, 0, 0), Hsv::new(0, 0, 0));
        assert_eq!(Hsv::from_rgb(128, 128, 128), Hsv::new(0, 0, 128));
        assert_eq!(Hsv::from_rgb(255, 255, 255), Hsv::new(0, 0, 255));
    }

    #[test]
    fn hue_never_exceeds_max() {
        // Magenta-red, just below 360 degrees.
        let hsv = Hsv::from_rgb(255, 0, 1);
        assert!(hsv.hue <= MAX_HUE);
    }

    #[test]
    fn converts_an_image_row_major() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(1, 0, Rgb([0, 0, 255]));
        let hsv = convert_rgb_to_hsv(&FrameView::whole(&image));
        assert_eq!(hsv.get(0, 0).hue, 0);
        assert_eq!(hsv.get(1, 0).hue, 120);
    }
}
