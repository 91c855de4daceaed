use serde::{Deserialize, Serialize};

/// A rectangle in percentage coordinates (0 to 100) of the screenshot.
///
/// Percentages keep a profile usable across screenshots that share the
/// aspect ratio of the resolution it was calibrated on.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Left edge, percent of image width
    pub x: f32,
    /// Top edge, percent of image height
    pub y: f32,
    /// Width, percent of image width
    pub w: f32,
    /// Height, percent of image height
    pub h: f32,
}

impl Region {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Converts to `(x, y, width, height)` in pixels, truncating toward zero.
    ///
    /// The result is not clamped; `crop_region` clamps against the image.
    pub fn to_pixels(&self, image_width: u32, image_height: u32) -> (u32, u32, u32, u32) {
        let scale = |pct: f32, extent: u32| ((pct / 100.0) * extent as f32).max(0.0) as u32;
        (
            scale(self.x, image_width),
            scale(self.y, image_height),
            scale(self.w, image_width),
            scale(self.h, image_height),
        )
    }
}
