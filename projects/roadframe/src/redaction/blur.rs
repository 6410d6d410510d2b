use super::coords::PixelBox;
use crate::error::Result;
use opencv::core::{Mat, Size};
use opencv::imgproc;
use opencv::prelude::*;
use serde::{Deserialize, Serialize};

/// Gaussian blur strength used for redaction.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BlurConfig {
    /// Kernel size in pixels, forced odd.
    pub kernel: i32,
    /// Standard deviation; 0 lets OpenCV derive it from the kernel.
    pub sigma: f64,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self {
            kernel: 51,
            sigma: 30.0,
        }
    }
}

impl BlurConfig {
    pub fn new(kernel: i32, sigma: f64) -> Self {
        let kernel = kernel.max(1);
        Self {
            kernel: if kernel % 2 == 0 { kernel + 1 } else { kernel },
            sigma: sigma.max(0.0),
        }
    }
}

/// Blurs each box region of `image` in place. Boxes that are empty after
/// rounding and clamping are ignored. Returns the number of regions blurred.
pub fn blur_regions(image: &mut Mat, boxes: &[PixelBox], config: &BlurConfig) -> Result<usize> {
    let (width, height) = (image.cols(), image.rows());
    let ksize = Size::new(config.kernel, config.kernel);
    let mut blurred_count = 0;

    for b in boxes {
        let Some(rect) = b.to_rect(width, height) else {
            continue;
        };

        let mut patch = Mat::default();
        Mat::roi(image, rect)?.copy_to(&mut patch)?;

        let mut blurred = Mat::default();
        imgproc::gaussian_blur_def(&patch, &mut blurred, ksize, config.sigma)?;

        let mut target = Mat::roi_mut(image, rect)?;
        blurred.copy_to(&mut target)?;
        blurred_count += 1;
    }

    Ok(blurred_count)
}
