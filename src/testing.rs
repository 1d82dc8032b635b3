//! In-memory stand-ins for the ffmpeg-backed source and segments.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::{frame, Rational};

use crate::chunk::file::FileSegmentWriter;
use crate::chunk::{SegmentReport, SegmentSink, SegmentSinkFactory};
use crate::error::{Result, SplitError};
use crate::plan::{EncodeOptions, PictureType};
use crate::source::decoder::FfmpegFrameSource;
use crate::source::{FrameSource, StreamParams};

/// Yields frames `0..total`, each frame being its own source index.
pub struct FakeSource {
    next: u64,
    total: u64,
    fail_at: Option<u64>,
    pulled: Rc<RefCell<u64>>,
}

impl FakeSource {
    pub fn new(total: u64) -> Self {
        Self {
            next: 0,
            total,
            fail_at: None,
            pulled: Rc::default(),
        }
    }

    /// Fail with a decode error instead of producing frame `index`.
    pub fn failing_at(mut self, index: u64) -> Self {
        self.fail_at = Some(index);

        self
    }

    /// Number of successful `next_frame` calls that returned a frame.
    pub fn pulled(&self) -> Rc<RefCell<u64>> {
        Rc::clone(&self.pulled)
    }
}

impl FrameSource for FakeSource {
    type Frame = u64;

    fn params(&self) -> StreamParams {
        StreamParams {
            width: 320,
            height: 240,
            format: Pixel::YUV420P,
            frame_rate: Rational(30, 1),
        }
    }

    fn next_frame(&mut self) -> Result<Option<u64>> {
        if self.fail_at == Some(self.next) {
            return Err(SplitError::Decode(ffmpeg_next::Error::InvalidData));
        }
        if self.next == self.total {
            return Ok(None);
        }

        let frame = self.next;
        self.next += 1;
        *self.pulled.borrow_mut() += 1;

        Ok(Some(frame))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Open(u64),
    Write(u64),
    Flush(u64),
    Close(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Refuse to open the segment with this index.
    OpenAt(u64),
    /// Fail the write of the n-th frame of the run (zero-based).
    WriteAt(u64),
}

#[derive(Debug, Clone, Default)]
pub struct RecordedSegment {
    pub index: u64,
    pub frames: Vec<(u64, PictureType, i64)>,
    pub flushed: bool,
    pub closed: bool,
}

impl RecordedSegment {
    pub fn kinds(&self) -> Vec<PictureType> {
        self.frames.iter().map(|(_, kind, _)| *kind).collect()
    }

    pub fn pts(&self) -> Vec<i64> {
        self.frames.iter().map(|(_, _, pts)| *pts).collect()
    }

    pub fn source_indices(&self) -> Vec<u64> {
        self.frames.iter().map(|(frame, _, _)| *frame).collect()
    }
}

#[derive(Debug, Default)]
struct Shared {
    segments: Vec<RecordedSegment>,
    events: Vec<Event>,
    writes: u64,
    failure: Option<Failure>,
}

/// Records everything the controller does to its segments.
#[derive(Debug, Clone, Default)]
pub struct FakeSegments {
    shared: Rc<RefCell<Shared>>,
}

impl FakeSegments {
    pub fn failing(failure: Failure) -> Self {
        let segments = Self::default();
        segments.shared.borrow_mut().failure = Some(failure);

        segments
    }

    pub fn recorded(&self) -> Vec<RecordedSegment> {
        self.shared.borrow().segments.clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.shared.borrow().events.clone()
    }
}

impl SegmentSinkFactory for FakeSegments {
    type Target = FakeSegment;

    fn open(&mut self, index: u64, _params: &StreamParams) -> Result<FakeSegment> {
        let mut shared = self.shared.borrow_mut();
        if shared.failure == Some(Failure::OpenAt(index)) {
            return Err(SplitError::OutputOpen {
                path: PathBuf::from(format!("{index:05}.mp4")),
                source: ffmpeg_next::Error::InvalidData,
            });
        }

        shared.events.push(Event::Open(index));
        shared.segments.push(RecordedSegment {
            index,
            ..RecordedSegment::default()
        });

        Ok(FakeSegment {
            index,
            slot: shared.segments.len() - 1,
            shared: Rc::clone(&self.shared),
        })
    }
}

pub struct FakeSegment {
    index: u64,
    slot: usize,
    shared: Rc<RefCell<Shared>>,
}

impl SegmentSink for FakeSegment {
    type Frame = u64;

    fn write(&mut self, frame: u64, kind: PictureType, pts: i64) -> Result<()> {
        let mut shared = self.shared.borrow_mut();
        if shared.failure == Some(Failure::WriteAt(shared.writes)) {
            return Err(SplitError::Encode(ffmpeg_next::Error::InvalidData));
        }

        shared.writes += 1;
        shared.events.push(Event::Write(self.index));
        shared.segments[self.slot].frames.push((frame, kind, pts));

        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let mut shared = self.shared.borrow_mut();
        shared.events.push(Event::Flush(self.index));
        shared.segments[self.slot].flushed = true;

        Ok(())
    }

    fn close(self) -> Result<SegmentReport> {
        let mut shared = self.shared.borrow_mut();
        shared.events.push(Event::Close(self.index));
        let segment = &mut shared.segments[self.slot];
        segment.closed = true;

        Ok(SegmentReport {
            path: PathBuf::from(format!("{:05}.mp4", segment.index)),
            frames: segment.frames.len() as u64,
        })
    }
}

/// Geometry of the small clips the ffmpeg-backed tests encode.
pub fn clip_params() -> StreamParams {
    StreamParams {
        width: 64,
        height: 48,
        format: Pixel::YUV420P,
        frame_rate: Rational(25, 1),
    }
}

/// A flat frame whose brightness drifts slowly with `index`.
pub fn synthetic_frame(params: &StreamParams, index: u64) -> frame::Video {
    let mut frame = frame::Video::new(params.format, params.width, params.height);
    frame.data_mut(0).fill(16 + (index % 200) as u8);
    frame.data_mut(1).fill(128);
    frame.data_mut(2).fill(128);

    frame
}

/// Encode `count` synthetic frames into `path`, forcing an I-frame every `gop` frames.
pub fn write_clip(path: &Path, count: u64, gop: u32) -> SegmentReport {
    ffmpeg_next::init().unwrap();

    let params = clip_params();
    let mut writer =
        FileSegmentWriter::create(path.to_path_buf(), &params, gop, &EncodeOptions::default())
            .unwrap();
    for k in 0..count {
        let kind = if k % u64::from(gop) == 0 {
            PictureType::I
        } else {
            PictureType::P
        };
        writer.write(synthetic_frame(&params, k), kind, k as i64).unwrap();
    }
    writer.flush().unwrap();

    writer.close().unwrap()
}

/// Every frame of the best video stream in `path`, in presentation order.
pub fn decode_all(path: &Path) -> Vec<frame::Video> {
    ffmpeg_next::init().unwrap();

    let mut source = FfmpegFrameSource::open(path).unwrap();
    let mut frames = Vec::new();
    while let Some(frame) = source.next_frame().unwrap() {
        frames.push(frame);
    }

    frames
}
