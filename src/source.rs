use ffmpeg_next::format::Pixel;
use ffmpeg_next::Rational;

use crate::error::{Result, SplitError};

pub mod decoder;

/// Picture geometry and timing of the source, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamParams {
    pub width: u32,
    pub height: u32,
    pub format: Pixel,
    pub frame_rate: Rational,
}

/// A finite, non-restartable sequence of decoded pictures in input order.
pub trait FrameSource {
    type Frame;

    fn params(&self) -> StreamParams;

    /// The next decoded frame, or `None` once the input is exhausted.
    fn next_frame(&mut self) -> Result<Option<Self::Frame>>;

    /// Decode and discard `count` frames. Running out early is an error.
    fn skip(&mut self, count: u64) -> Result<()> {
        for available in 0..count {
            if self.next_frame()?.is_none() {
                return Err(SplitError::InputExhausted {
                    requested: count,
                    available,
                });
            }
        }

        Ok(())
    }
}
