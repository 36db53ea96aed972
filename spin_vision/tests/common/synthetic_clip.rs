use image::{Rgb, RgbImage};

pub const WIDTH: u32 = 160;
pub const HEIGHT: u32 = 120;
pub const AXIS: (f64, f64) = (80.0, 60.0);
pub const MARKER_ORBIT: f64 = 35.0;

pub const BACKGROUND: Rgb<u8> = Rgb([40, 40, 60]);
pub const DISK: Rgb<u8> = Rgb([200, 200, 200]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

/// A grey puck with a red sticker on the axis and a yellow one near the rim,
/// spinning at a constant rate.
#[derive(Debug, Clone, Copy)]
pub struct SpinningDisk {
    pub frame_rate: f64,
    /// rad/s; positive turns from +x towards +y (clockwise on screen).
    pub omega: f64,
    pub initial_angle: f64,
}

impl SpinningDisk {
    pub fn angle_at(&self, index: usize) -> f64 {
        self.initial_angle + self.omega * index as f64 / self.frame_rate
    }

    pub fn render(&self, index: usize) -> RgbImage {
        let angle = self.angle_at(index);
        let marker = (
            AXIS.0 + MARKER_ORBIT * angle.cos(),
            AXIS.1 + MARKER_ORBIT * angle.sin(),
        );
        let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
        fill_circle(&mut image, AXIS, 50.0, DISK);
        fill_circle(&mut image, AXIS, 4.0, RED);
        fill_circle(&mut image, marker, 5.0, YELLOW);
        image
    }

    pub fn frames(&self, count: usize) -> Vec<RgbImage> {
        (0..count).map(|index| self.render(index)).collect()
    }
}

pub fn fill_circle(image: &mut RgbImage, centre: (f64, f64), radius: f64, color: Rgb<u8>) {
    for y in 0..image.height() {
        for x in 0..image.width() {
            let dx = x as f64 - centre.0;
            let dy = y as f64 - centre.1;
            if dx * dx + dy * dy <= radius * radius {
                image.put_pixel(x, y, color);
            }
        }
    }
}

pub fn blank(count: usize) -> Vec<RgbImage> {
    (0..count)
        .map(|_| RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND))
        .collect()
}
