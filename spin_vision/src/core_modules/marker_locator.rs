// THEORY:
// The `marker_locator` answers one question per frame and per colour: "where
// is the marker?" It works in four steps:
//
// 1.  **HSV Conversion**: the frame (or its ROI crop) is converted to 8-bit HSV.
// 2.  **In-Range Mask**: every pixel inside the `ColorRange` is switched on.
// 3.  **Region Growing**: the mask is scanned row by row; each unvisited "on"
//     pixel seeds a region that grows over its 8 neighbours until no connected
//     "on" pixel is left. Scan order makes region numbering deterministic.
// 4.  **Selection & Moments**: the region with the largest pixel area wins
//     (the first one found on a tie: a real marker dominates the few stray
//     pixels a shirt or a reflection contributes). Its first-order moments give
//     the centroid.
//
// Each region's outer outline is traced pixel to pixel (Moore-neighbour
// tracing from its topmost-leftmost pixel) and the area the outline encloses
// is taken with the shoelace formula. That is the zeroth-order contour moment.
// A region whose outline encloses no area has no contour centroid: one stray
// pixel, a line along a row or a column, a one-pixel diagonal, or a zigzag of
// such strokes. It is reported as not found instead of producing a bogus
// centroid.
//
// The locator is stateless. Nothing is remembered between frames.

use crate::core_modules::color_range::{ColorRange, MASK_ON};
use crate::core_modules::frame::FrameView;
use crate::core_modules::hsv::{convert_rgb_to_hsv, HsvImage};
use image::GrayImage;
use serde::Serialize;

/// Centre of mass of a detected marker region, in crop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
    /// Number of pixels in the region.
    pub area: usize,
}

impl Centroid {
    /// Integer pixel position, truncated toward zero.
    pub fn pixel(&self) -> (u32, u32) {
        (self.x as u32, self.y as u32)
    }

    /// Euclidean distance between the truncated pixel positions.
    pub fn pixel_distance(&self, other: &Centroid) -> f64 {
        let (ax, ay) = self.pixel();
        let (bx, by) = other.pixel();
        (ax as f64 - bx as f64).hypot(ay as f64 - by as f64)
    }
}

/// A connected set of mask pixels with its raw moments and bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Zeroth-order moment: the pixel count.
    pub area: usize,
    /// First-order moments: sums of x and y over the region.
    pub sum_x: u64,
    pub sum_y: u64,
    /// Inclusive bounding box as ((min_x, min_y), (max_x, max_y)).
    pub bounding_box: ((u32, u32), (u32, u32)),
    /// Area enclosed by the traced outer outline, through the pixel centres.
    pub outline_area: f64,
}

impl Region {
    /// True when the region's outline encloses no area.
    pub fn is_degenerate(&self) -> bool {
        self.outline_area == 0.0
    }

    pub fn centroid(&self) -> Option<Centroid> {
        if self.area == 0 || self.is_degenerate() {
            return None;
        }
        Some(Centroid {
            x: self.sum_x as f64 / self.area as f64,
            y: self.sum_y as f64 / self.area as f64,
            area: self.area,
        })
    }
}

/// Neighbour offsets, clockwise on screen starting east.
const NEIGHBOURS: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const WEST: usize = 4;

/// Label grid shared by region growing and outline tracing. 0 is unlabelled.
struct Labels {
    width: u32,
    height: u32,
    cells: Vec<u32>,
}

impl Labels {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![0; (width as usize) * (height as usize)],
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    fn get(&self, x: i64, y: i64) -> u32 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 0;
        }
        self.cells[self.index(x as u32, y as u32)]
    }

    fn set(&mut self, x: u32, y: u32, label: u32) {
        let index = self.index(x, y);
        self.cells[index] = label;
    }
}

/// Finds all 8-connected regions of "on" pixels, in row-major seed order.
pub fn find_regions(mask: &GrayImage) -> Vec<Region> {
    let (width, height) = mask.dimensions();
    let mut labels = Labels::new(width, height);
    let mut regions = Vec::new();

    for y in 0..height {
        for x in 0..width {
            if labels.get(x as i64, y as i64) != 0 || mask.get_pixel(x, y).0[0] != MASK_ON {
                continue;
            }
            let label = regions.len() as u32 + 1;
            regions.push(grow_region_from_seed((x, y), label, mask, &mut labels));
        }
    }

    regions
}

/// Grows one region from `seed` with an explicit stack, labelling its pixels.
fn grow_region_from_seed(
    seed: (u32, u32),
    label: u32,
    mask: &GrayImage,
    labels: &mut Labels,
) -> Region {
    let mut stack = vec![seed];
    labels.set(seed.0, seed.1, label);

    let mut area = 0usize;
    let mut sum_x = 0u64;
    let mut sum_y = 0u64;
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);

    while let Some((x, y)) = stack.pop() {
        // --- Data Aggregation ---
        area += 1;
        sum_x += x as u64;
        sum_y += y as u64;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);

        for (dx, dy) in NEIGHBOURS {
            let (nx, ny) = (x as i64 + dx, y as i64 + dy);
            if nx < 0 || ny < 0 || nx >= labels.width as i64 || ny >= labels.height as i64 {
                continue;
            }
            let (nx, ny) = (nx as u32, ny as u32);
            if labels.get(nx as i64, ny as i64) == 0 && mask.get_pixel(nx, ny).0[0] == MASK_ON {
                labels.set(nx, ny, label);
                stack.push((nx, ny));
            }
        }
    }

    let outline = trace_outline(seed, label, labels, area);
    Region {
        area,
        sum_x,
        sum_y,
        bounding_box: ((min_x, min_y), (max_x, max_y)),
        outline_area: shoelace_area(&outline),
    }
}

/// Walks the outer boundary of the region holding `start`, clockwise.
///
/// `start` must be the region's first pixel in scan order, so its west
/// neighbour is background. Tracing stops when the walk leaves `start` in the
/// same direction a second time (Jacob's criterion), which also closes
/// outlines that pass through `start` more than once.
fn trace_outline(start: (u32, u32), label: u32, labels: &Labels, area: usize) -> Vec<(i64, i64)> {
    let start = (start.0 as i64, start.1 as i64);
    let mut outline = vec![start];
    let mut current = start;
    let mut backtrack = WEST;
    let mut first_step = None;

    for _ in 0..8 * area + 8 {
        let next = (1..=8).map(|k| (backtrack + k) % 8).find_map(|direction| {
            let (dx, dy) = NEIGHBOURS[direction];
            let candidate = (current.0 + dx, current.1 + dy);
            (labels.get(candidate.0, candidate.1) == label).then_some((direction, candidate))
        });
        let Some((direction, next)) = next else {
            // Isolated pixel.
            break;
        };

        if current == start {
            match first_step {
                None => first_step = Some(direction),
                Some(step) if step == direction => break,
                Some(_) => {}
            }
        }

        // The background pixel checked just before `next` becomes the new backtrack.
        let (bx, by) = NEIGHBOURS[(direction + 7) % 8];
        let behind = (current.0 + bx - next.0, current.1 + by - next.1);
        backtrack = NEIGHBOURS
            .iter()
            .position(|&offset| offset == behind)
            .unwrap_or(WEST);

        current = next;
        outline.push(next);
    }

    outline
}

/// Area of a closed polygon through `vertices`.
fn shoelace_area(vertices: &[(i64, i64)]) -> f64 {
    let twice: i64 = vertices
        .iter()
        .zip(vertices.iter().cycle().skip(1))
        .map(|(&(x0, y0), &(x1, y1))| x0 * y1 - x1 * y0)
        .sum();
    twice.abs() as f64 / 2.0
}

/// Picks the largest region; the earliest one in scan order wins a tie.
pub fn largest_region(regions: Vec<Region>) -> Option<Region> {
    let mut best: Option<Region> = None;
    for region in regions {
        match &best {
            Some(current) if region.area <= current.area => {}
            _ => best = Some(region),
        }
    }
    best
}

/// Locates a marker in an already converted HSV image.
///
/// Callers tracking two colours convert once and call this twice.
pub fn locate_in_hsv(hsv: &HsvImage, range: &ColorRange) -> Option<Centroid> {
    if range.is_empty() {
        return None;
    }
    let mask = range.mask(hsv);
    largest_region(find_regions(&mask))?.centroid()
}

/// Locates the centroid of the largest region of `range` inside `view`.
pub fn locate(view: &FrameView<'_>, range: &ColorRange) -> Option<Centroid> {
    locate_in_hsv(&convert_rgb_to_hsv(view), range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);
    const BACKGROUND: Rgb<u8> = Rgb([20, 20, 60]);

    fn draw_disk(image: &mut RgbImage, cx: i64, cy: i64, radius: i64, color: Rgb<u8>) {
        let (w, h) = image.dimensions();
        for y in 0..h as i64 {
            for x in 0..w as i64 {
                if (x - cx).pow(2) + (y - cy).pow(2) <= radius * radius {
                    image.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }

    fn mask_from(points: &[(u32, u32)], w: u32, h: u32) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for &(x, y) in points {
            mask.put_pixel(x, y, Luma([MASK_ON]));
        }
        mask
    }

    #[test]
    fn solid_disk_centroid_is_its_geometric_centre() {
        for &(cx, cy, r) in &[(40i64, 30i64, 6i64), (17, 52, 9), (63, 8, 4)] {
            let mut image = RgbImage::from_pixel(80, 64, BACKGROUND);
            draw_disk(&mut image, cx, cy, r, YELLOW);
            let centroid = locate(&FrameView::whole(&image), &ColorRange::default())
                .expect("disk should be found");
            assert!((centroid.x - cx as f64).abs() <= 1.0, "x {} vs {}", centroid.x, cx);
            assert!((centroid.y - cy as f64).abs() <= 1.0, "y {} vs {}", centroid.y, cy);
        }
    }

    #[test]
    fn no_matching_pixels_is_not_found() {
        let image = RgbImage::from_pixel(32, 32, BACKGROUND);
        assert!(locate(&FrameView::whole(&image), &ColorRange::default()).is_none());
    }

    #[test]
    fn empty_range_is_not_found_even_on_marker_pixels() {
        let image = RgbImage::from_pixel(8, 8, YELLOW);
        let inverted = ColorRange::new([35, 255, 255], [25, 100, 100]);
        assert!(locate(&FrameView::whole(&image), &inverted).is_none());
    }

    #[test]
    fn largest_region_wins_over_stray_blobs() {
        let mut image = RgbImage::from_pixel(100, 60, BACKGROUND);
        draw_disk(&mut image, 15, 15, 3, YELLOW);
        draw_disk(&mut image, 70, 40, 8, YELLOW);
        let centroid = locate(&FrameView::whole(&image), &ColorRange::default()).unwrap();
        assert_eq!(centroid.pixel(), (70, 40));
    }

    #[test]
    fn diagonal_pixels_are_connected() {
        let mask = mask_from(&[(0, 0), (1, 1), (2, 2)], 4, 4);
        let regions = find_regions(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 3);
    }

    #[test]
    fn ties_go_to_the_first_region_in_scan_order() {
        let mask = mask_from(&[(0, 0), (1, 0), (0, 1), (1, 1), (5, 5), (6, 5), (5, 6), (6, 6)], 8, 8);
        let best = largest_region(find_regions(&mask)).unwrap();
        assert_eq!(best.bounding_box, ((0, 0), (1, 1)));
    }

    fn only_region(points: &[(u32, u32)]) -> Region {
        let regions = find_regions(&mask_from(points, 8, 8));
        assert_eq!(regions.len(), 1);
        regions.into_iter().next().unwrap()
    }

    #[test]
    fn single_pixel_and_line_regions_are_degenerate() {
        let single = largest_region(find_regions(&mask_from(&[(3, 3)], 6, 6))).unwrap();
        assert!(single.centroid().is_none());

        let line = largest_region(find_regions(&mask_from(&[(1, 2), (2, 2), (3, 2)], 6, 6))).unwrap();
        assert!(line.centroid().is_none());
    }

    #[test]
    fn one_pixel_diagonal_encloses_no_area() {
        let diagonal = only_region(&[(0, 0), (1, 1), (2, 2), (3, 3)]);
        assert_eq!(diagonal.outline_area, 0.0);
        assert!(diagonal.centroid().is_none());

        let anti_diagonal = only_region(&[(3, 0), (2, 1), (1, 2), (0, 3)]);
        assert!(anti_diagonal.centroid().is_none());

        let image = {
            let mut image = RgbImage::from_pixel(6, 6, BACKGROUND);
            for i in 0..4 {
                image.put_pixel(i + 1, i + 1, YELLOW);
            }
            image
        };
        assert!(locate(&FrameView::whole(&image), &ColorRange::default()).is_none());
    }

    #[test]
    fn zigzag_strokes_enclose_no_area() {
        let zigzag = only_region(&[(0, 0), (1, 1), (2, 0), (3, 1), (4, 0)]);
        assert!(zigzag.is_degenerate());
        let vee = only_region(&[(0, 0), (1, 1), (2, 2), (3, 1), (4, 0)]);
        assert!(vee.is_degenerate());
        let bent = only_region(&[(0, 0), (1, 0), (2, 0), (3, 1), (4, 2)]);
        assert!(bent.is_degenerate());
    }

    #[test]
    fn thin_shapes_that_enclose_area_are_found() {
        let corner = only_region(&[(0, 0), (1, 0), (0, 1)]);
        assert_eq!(corner.outline_area, 0.5);
        assert!(corner.centroid().is_some());

        let diamond = only_region(&[(1, 0), (0, 1), (2, 1), (1, 2)]);
        assert_eq!(diamond.outline_area, 2.0);
        let centroid = diamond.centroid().unwrap();
        assert_eq!((centroid.x, centroid.y), (1.0, 1.0));

        let ring: Vec<(u32, u32)> = (0..5)
            .flat_map(|x| (0..5).map(move |y| (x, y)))
            .filter(|&(x, y)| x == 0 || x == 4 || y == 0 || y == 4)
            .collect();
        assert_eq!(only_region(&ring).outline_area, 16.0);
    }

    #[test]
    fn outline_area_of_a_square_block() {
        let block: Vec<(u32, u32)> = (2..6).flat_map(|x| (1..4).map(move |y| (x, y))).collect();
        assert_eq!(only_region(&block).outline_area, 6.0);
    }

    #[test]
    fn centroid_is_relative_to_the_crop() {
        use crate::core_modules::frame::{Frame, Roi};
        let mut image = RgbImage::from_pixel(80, 60, BACKGROUND);
        draw_disk(&mut image, 50, 40, 5, YELLOW);
        let frame = Frame::new(0, image);
        let roi = Roi::new(30, 20, 80, 60);
        let centroid = locate(&frame.crop(Some(&roi)), &ColorRange::default()).unwrap();
        assert_eq!(centroid.pixel(), (20, 20));
    }

    #[test]
    fn pixel_distance_uses_truncated_positions() {
        let a = Centroid { x: 0.9, y: 0.9, area: 4 };
        let b = Centroid { x: 3.2, y: 4.7, area: 4 };
        assert_eq!(a.pixel_distance(&b), 5.0);
    }
}
