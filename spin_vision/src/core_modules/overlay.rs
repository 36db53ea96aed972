// THEORY:
// Showing the user where the markers were found is the fastest way to debug a
// bad colour range, but keeping every accepted frame would hold the whole clip
// in memory. The `OverlayCollector` keeps an evenly spread subset instead.
//
// It runs with a stride. Only every `stride`-th accepted frame is kept; when
// the buffer holds twice the requested number of frames, every other kept
// frame is dropped and the stride doubles. Memory therefore never exceeds
// `2 × limit` frames, and whatever the run length, the survivors are spread
// over the whole run. `finish` thins the survivors down to `limit`.
//
// The collector stores positions, not pixels drawn on top of the frame:
// drawing is left to the presentation layer.

use crate::core_modules::frame::Frame;
use serde::Serialize;

/// A frame kept for display, with marker positions in full-frame pixels.
#[derive(Debug, Clone)]
pub struct OverlayFrame {
    pub frame: Frame,
    /// Centre marker position (dual-marker mode only).
    pub center: Option<(u32, u32)>,
    pub marker: (u32, u32),
    /// Radians, as recorded in the series.
    pub angle: f64,
}

/// Summary of an overlay frame without the pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OverlayMarkers {
    pub frame_index: usize,
    pub center: Option<(u32, u32)>,
    pub marker: (u32, u32),
    pub angle: f64,
}

impl OverlayFrame {
    pub fn markers(&self) -> OverlayMarkers {
        OverlayMarkers {
            frame_index: self.frame.index,
            center: self.center,
            marker: self.marker,
            angle: self.angle,
        }
    }
}

#[derive(Debug)]
pub struct OverlayCollector {
    limit: usize,
    stride: usize,
    accepted: usize,
    frames: Vec<OverlayFrame>,
}

impl OverlayCollector {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            stride: 1,
            accepted: 0,
            frames: Vec::with_capacity(limit.saturating_mul(2)),
        }
    }

    /// Whether the next accepted frame would be kept. Lets callers skip
    /// building an `OverlayFrame` that would be thrown away.
    pub fn wants_next(&self) -> bool {
        self.limit > 0 && self.accepted % self.stride == 0
    }

    /// Records one accepted frame, keeping it if it falls on the stride.
    pub fn offer(&mut self, make: impl FnOnce() -> OverlayFrame) {
        if self.wants_next() {
            self.frames.push(make());
            if self.frames.len() >= self.limit.saturating_mul(2) {
                self.decimate();
            }
        }
        self.accepted += 1;
    }

    fn decimate(&mut self) {
        let mut position = 0usize;
        self.frames.retain(|_| {
            let keep = position % 2 == 0;
            position += 1;
            keep
        });
        self.stride *= 2;
    }

    /// At most `limit` frames, evenly spread over the run.
    pub fn finish(self) -> Vec<OverlayFrame> {
        let kept = self.frames.len();
        if kept <= self.limit {
            return self.frames;
        }
        let limit = self.limit;
        self.frames
            .into_iter()
            .enumerate()
            .filter(|(position, _)| {
                // Evenly spaced positions i * kept / limit.
                (0..limit).any(|i| i * kept / limit == *position)
            })
            .map(|(_, frame)| frame)
            .collect()
    }
}
