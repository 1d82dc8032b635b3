use std::path::PathBuf;

use crate::error::Result;
use crate::plan::PictureType;
use crate::source::StreamParams;

pub mod file;
pub mod template;

pub(crate) mod private {
    pub trait Sealed {}

    // Impls
    impl Sealed for crate::chunk::file::FileSegmentWriter {}
    #[cfg(test)]
    impl Sealed for crate::testing::FakeSegment {}
}

/// What a closed segment leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentReport {
    pub path: PathBuf,
    pub frames: u64,
}

/// One output segment: an encoder plus the container it muxes into.
pub trait SegmentSink: private::Sealed {
    type Frame;

    /// Submit one frame. The encoder may hold on to it for reordering, so a
    /// write does not necessarily produce output right away.
    fn write(&mut self, frame: Self::Frame, kind: PictureType, pts: i64) -> Result<()>;

    /// Drain every frame the encoder is still holding into the container.
    fn flush(&mut self) -> Result<()>;

    /// Write the trailer and release the segment.
    fn close(self) -> Result<SegmentReport>;
}

pub trait SegmentSinkFactory {
    type Target: SegmentSink;

    /// Open the segment with the given zero-based index.
    fn open(&mut self, index: u64, params: &StreamParams) -> Result<Self::Target>;
}
