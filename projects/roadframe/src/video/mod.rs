pub mod histogram;
pub mod opencv_source;

use crate::error::Result;
use opencv::core::Mat;

/// A decoded frame and its position in the stream.
pub struct Frame {
    pub index: usize,
    pub mat: Mat,
}

/// A decodable video with random access by frame index.
///
/// `None` from either read means no frame could be produced. At or past
/// `frame_count()` that is the end of the stream; before it, a single frame
/// that failed to decode. Implementations own their decoder handle and release
/// it on drop.
pub trait VideoSource {
    /// Frame rate as reported by the container; may be zero or negative for
    /// broken metadata.
    fn fps(&self) -> f64;
    fn frame_count(&self) -> usize;
    fn seek_and_read(&mut self, index: usize) -> Result<Option<Frame>>;
    fn read_next(&mut self) -> Result<Option<Frame>>;
}

#[cfg(test)]
pub mod synthetic {
    use super::{Frame, VideoSource};
    use crate::error::Result;
    use opencv::core::{Mat, Scalar, CV_8UC3};

    /// In-memory video made of flat-colored BGR frames.
    pub struct SyntheticVideo {
        pub fps: f64,
        pub levels: Vec<u8>,
        pub width: i32,
        pub height: i32,
        cursor: usize,
        pub seeks: Vec<usize>,
        /// Indices that fail to decode.
        pub missing: Vec<usize>,
    }

    impl SyntheticVideo {
        pub fn new(fps: f64, levels: Vec<u8>) -> Self {
            Self {
                fps,
                levels,
                width: 32,
                height: 24,
                cursor: 0,
                seeks: Vec::new(),
                missing: Vec::new(),
            }
        }

        fn frame(&self, index: usize) -> Result<Option<Frame>> {
            if self.missing.contains(&index) {
                return Ok(None);
            }
            let Some(&level) = self.levels.get(index) else {
                return Ok(None);
            };
            let mat = Mat::new_rows_cols_with_default(
                self.height,
                self.width,
                CV_8UC3,
                Scalar::all(level as f64),
            )?;
            Ok(Some(Frame { index, mat }))
        }
    }

    impl VideoSource for SyntheticVideo {
        fn fps(&self) -> f64 {
            self.fps
        }

        fn frame_count(&self) -> usize {
            self.levels.len()
        }

        fn seek_and_read(&mut self, index: usize) -> Result<Option<Frame>> {
            self.seeks.push(index);
            self.cursor = index + 1;
            self.frame(index)
        }

        fn read_next(&mut self) -> Result<Option<Frame>> {
            let frame = self.frame(self.cursor)?;
            self.cursor += 1;
            Ok(frame)
        }
    }
}
