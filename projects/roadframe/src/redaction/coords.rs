// Box conversions between detector space (normalized, center format) and
// image space (pixels, corner format)

use opencv::core::Rect;
use serde::{Deserialize, Serialize};

/// Box as `(class, cx, cy, w, h)`, every coordinate a fraction of the image size.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct NormalizedBox {
    pub class_id: Option<usize>,
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

/// Box as `(x_min, y_min, x_max, y_max)` in pixels.
///
/// Stored unrounded; rounding happens only when a region is drawn or blurred.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

pub fn to_pixel(b: &NormalizedBox, width: u32, height: u32) -> PixelBox {
    let (img_w, img_h) = (width as f64, height as f64);
    let cx = b.cx * img_w;
    let cy = b.cy * img_h;
    let w = b.w * img_w;
    let h = b.h * img_h;

    PixelBox {
        x_min: cx - w / 2.0,
        y_min: cy - h / 2.0,
        x_max: cx + w / 2.0,
        y_max: cy + h / 2.0,
    }
}

pub fn to_normalized(
    b: &PixelBox,
    width: u32,
    height: u32,
    class_id: Option<usize>,
) -> NormalizedBox {
    let (img_w, img_h) = (width as f64, height as f64);
    NormalizedBox {
        class_id,
        cx: (b.x_min + b.x_max) / 2.0 / img_w,
        cy: (b.y_min + b.y_max) / 2.0 / img_h,
        w: (b.x_max - b.x_min) / img_w,
        h: (b.y_max - b.y_min) / img_h,
    }
}

impl PixelBox {
    /// Integer region inside a `width` x `height` image, or `None` when the
    /// box is empty after rounding and clamping.
    pub fn to_rect(&self, width: i32, height: i32) -> Option<Rect> {
        let x1 = self.x_min.min(self.x_max).round() as i64;
        let x2 = self.x_min.max(self.x_max).round() as i64;
        let y1 = self.y_min.min(self.y_max).round() as i64;
        let y2 = self.y_min.max(self.y_max).round() as i64;

        let x1 = x1.clamp(0, width as i64) as i32;
        let x2 = x2.clamp(0, width as i64) as i32;
        let y1 = y1.clamp(0, height as i64) as i32;
        let y2 = y2.clamp(0, height as i64) as i32;

        if x2 > x1 && y2 > y1 {
            Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }
}
