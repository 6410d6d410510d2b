use super::coords::NormalizedBox;
use crate::error::{Error, Result};
use image::{DynamicImage, ImageBuffer, Rgb};
use opencv::core::Mat;
use opencv::prelude::*;
use usls::models::RTDETR;
use usls::{Config, Image};

/// One detector hit, in normalized center format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: NormalizedBox,
    pub confidence: f32,
}

/// Object detection capability consumed by redaction and pre-annotation.
///
/// Implementations may be slow and may fail; failures are reported as
/// `Error::Detector`.
pub trait Detector {
    fn detect(&mut self, image: &Mat) -> Result<Vec<Detection>>;

    /// Runs several images at once. Results are returned in input order.
    fn detect_batch(&mut self, images: &[Mat]) -> Result<Vec<Vec<Detection>>> {
        images.iter().map(|image| self.detect(image)).collect()
    }
}

/// RT-DETR on an ONNX model via `usls`, handling BGR-to-RGB conversion and
/// correcting the aspect-ratio padding of the underlying model library.
pub struct RtdetrDetector {
    model: RTDETR,
}

impl RtdetrDetector {
    pub fn new(model_path: &str) -> Result<Self> {
        let config = Config::default()
            .with_model_file(model_path)
            .with_class_names(&usls::NAMES_COCO_80);

        #[cfg(target_os = "macos")]
        let config = config.with_model_device(usls::Device::CoreMl);

        let config = config
            .commit()
            .map_err(|e| Error::Detector(format!("Error loading model: {}", e)))?;
        let model = RTDETR::new(config)
            .map_err(|e| Error::Detector(format!("Error loading model: {}", e)))?;
        Ok(Self { model })
    }
}

impl Detector for RtdetrDetector {
    fn detect(&mut self, image: &Mat) -> Result<Vec<Detection>> {
        let results = self.detect_batch(std::slice::from_ref(image))?;
        Ok(results.into_iter().next().unwrap_or_default())
    }

    fn detect_batch(&mut self, images: &[Mat]) -> Result<Vec<Vec<Detection>>> {
        let mut usls_images = Vec::with_capacity(images.len());
        let mut geometry = Vec::with_capacity(images.len());

        for image in images {
            let size = image.size()?;
            let img_w = size.width as f32;
            let img_h = size.height as f32;

            // Boxes come back scaled as if the image were square on its short side.
            let (x_corr, y_corr) = if img_w > img_h {
                (img_w / img_h, 1.0)
            } else if img_h > img_w {
                (1.0, img_h / img_w)
            } else {
                (1.0, 1.0)
            };
            geometry.push((img_w, img_h, x_corr, y_corr));

            usls_images.push(Image::from(mat_to_dynamic_image(image)?));
        }

        let results = self
            .model
            .forward(&usls_images)
            .map_err(|e| Error::Detector(format!("Error during detection: {}", e)))?;

        let mut batch = Vec::with_capacity(results.len());
        for (y, (img_w, img_h, x_corr, y_corr)) in results.into_iter().zip(geometry) {
            let detections = y
                .hbbs
                .into_iter()
                .map(|hbb| {
                    let x = hbb.xmin() * x_corr;
                    let w = hbb.width() * x_corr;
                    let y_min = hbb.ymin() * y_corr;
                    let h = hbb.height() * y_corr;
                    Detection {
                        bbox: NormalizedBox {
                            class_id: hbb.id(),
                            cx: ((x + w / 2.0) / img_w) as f64,
                            cy: ((y_min + h / 2.0) / img_h) as f64,
                            w: (w / img_w) as f64,
                            h: (h / img_h) as f64,
                        },
                        confidence: hbb.confidence().unwrap_or(0.0),
                    }
                })
                .collect();
            batch.push(detections);
        }

        Ok(batch)
    }
}

/// Convert an OpenCV Mat (BGR) to an image::DynamicImage (RGB)
fn mat_to_dynamic_image(mat: &Mat) -> Result<DynamicImage> {
    let mut rgb_mat = Mat::default();
    opencv::imgproc::cvt_color_def(mat, &mut rgb_mat, opencv::imgproc::COLOR_BGR2RGB)?;

    let size = rgb_mat.size()?;
    let width = size.width as u32;
    let height = size.height as u32;

    if !rgb_mat.is_continuous() {
        return Err(Error::Detector("Mat is not continuous".to_string()));
    }

    let buffer = rgb_mat.data_bytes()?.to_vec();
    let img_buffer = ImageBuffer::<Rgb<u8>, _>::from_vec(width, height, buffer).ok_or_else(|| {
        Error::Detector("Failed to create ImageBuffer from Mat data".to_string())
    })?;

    Ok(DynamicImage::ImageRgb8(img_buffer))
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::VecDeque;

    /// Returns the same boxes for every image and counts calls.
    pub struct FixedDetector {
        pub detections: Vec<Detection>,
        pub single_calls: usize,
        pub batch_calls: usize,
        /// Calls (in order) that should fail, consumed front to back.
        pub failures: VecDeque<bool>,
    }

    impl FixedDetector {
        pub fn new(detections: Vec<Detection>) -> Self {
            Self {
                detections,
                single_calls: 0,
                batch_calls: 0,
                failures: VecDeque::new(),
            }
        }

        fn maybe_fail(&mut self) -> Result<()> {
            if self.failures.pop_front().unwrap_or(false) {
                return Err(Error::Detector("model crashed".to_string()));
            }
            Ok(())
        }
    }

    impl Detector for FixedDetector {
        fn detect(&mut self, _image: &Mat) -> Result<Vec<Detection>> {
            self.single_calls += 1;
            self.maybe_fail()?;
            Ok(self.detections.clone())
        }

        fn detect_batch(&mut self, images: &[Mat]) -> Result<Vec<Vec<Detection>>> {
            self.batch_calls += 1;
            self.maybe_fail()?;
            Ok(images.iter().map(|_| self.detections.clone()).collect())
        }
    }

    pub fn detection(cx: f64, cy: f64, w: f64, h: f64, confidence: f32) -> Detection {
        Detection {
            bbox: NormalizedBox {
                class_id: Some(0),
                cx,
                cy,
                w,
                h,
            },
            confidence,
        }
    }
}
