use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::chunk::file::FileSegmentWriterFactory;
use crate::chunk::template::OutputTemplate;
use crate::chunk::{SegmentSink, SegmentSinkFactory};
use crate::error::Result;
use crate::plan::{ChunkPlan, EncodeOptions};
use crate::source::decoder::FfmpegFrameSource;
use crate::source::{FrameSource, StreamParams};

/// Where the controller is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Skipping,
    Active,
    Rotating,
    Done,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    /// Frames delivered to any segment.
    pub frames_written: u64,
    /// Segments opened so far.
    pub segments_opened: u64,
    /// Frames delivered to the current segment.
    pub in_chunk: u64,
    pub frames_skipped: u64,
}

/// What a finished run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_read: u64,
    pub segments_written: u64,
    pub chunk_size: u64,
    pub last_segment_frames: u64,
    pub total_frames_written: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Read {} frames", self.frames_read)?;
        writeln!(
            f,
            "Wrote {} chunks of {} frames each (last chunk: {} frames)",
            self.segments_written, self.chunk_size, self.last_segment_frames
        )?;
        write!(f, "  for a total of {} frames", self.total_frames_written)
    }
}

/// Pulls frames from a [FrameSource] and spreads them over consecutive segments
/// of exactly `chunk_size` frames, each starting on a keyframe.
pub struct ChunkController<'a, S, F> {
    plan: &'a ChunkPlan,
    source: S,
    segments: F,
    counters: RunCounters,
    state: RunState,
}

impl<'a, S, F> ChunkController<'a, S, F>
where
    S: FrameSource,
    F: SegmentSinkFactory,
    F::Target: SegmentSink<Frame = S::Frame>,
{
    pub fn new(plan: &'a ChunkPlan, source: S, segments: F) -> Self {
        Self {
            plan,
            source,
            segments,
            counters: RunCounters::default(),
            state: RunState::Skipping,
        }
    }

    pub fn counters(&self) -> RunCounters {
        self.counters
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Drive the whole run. Any error aborts it; the source and whichever
    /// segment was open are released on the way out.
    pub fn run(&mut self) -> Result<RunSummary> {
        let params = self.source.params();

        let skip = self.plan.skip_frames();
        if skip > 0 {
            info!(frames = skip, "skipping frames");
            self.source.skip(skip)?;
            self.counters.frames_skipped = skip;
        }

        let mut segment = self.open_segment(&params)?;
        self.transition(RunState::Active);

        while !self.plan.length_reached(self.counters.frames_written) {
            let Some(frame) = self.source.next_frame()? else {
                debug!(
                    frames = self.counters.frames_written,
                    "reached end of input"
                );
                break;
            };

            if self.counters.in_chunk == self.plan.chunk_size() {
                self.transition(RunState::Rotating);
                Self::finish_segment(segment)?;
                segment = self.open_segment(&params)?;
                self.transition(RunState::Active);
            }

            let in_chunk = self.counters.in_chunk;
            segment.write(frame, self.plan.picture_type(in_chunk), in_chunk as i64)?;
            self.counters.in_chunk += 1;
            self.counters.frames_written += 1;
        }

        Self::finish_segment(segment)?;
        self.transition(RunState::Done);

        let RunCounters {
            frames_written,
            segments_opened,
            in_chunk,
            frames_skipped,
        } = self.counters;
        debug!(
            written = frames_written,
            skipped = frames_skipped,
            segments = segments_opened,
            "run finished"
        );

        Ok(RunSummary {
            frames_read: frames_written,
            segments_written: segments_opened,
            chunk_size: self.plan.chunk_size(),
            last_segment_frames: in_chunk,
            total_frames_written: segments_opened.saturating_sub(1) * self.plan.chunk_size()
                + in_chunk,
        })
    }

    fn open_segment(&mut self, params: &StreamParams) -> Result<F::Target> {
        let index = self.counters.segments_opened;
        info!("Writing chunk {index:05}");

        let segment = self.segments.open(index, params)?;
        self.counters.segments_opened += 1;
        self.counters.in_chunk = 0;

        Ok(segment)
    }

    fn finish_segment(mut segment: F::Target) -> Result<()> {
        segment.flush()?;
        let report = segment.close()?;
        debug!(
            path = %report.path.display(),
            frames = report.frames,
            "closed segment"
        );

        Ok(())
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }
}

/// Split `input` into segments named after `template`, encoding each with `options`.
pub fn split_video<P: AsRef<Path>>(
    input: P,
    template: &OutputTemplate,
    plan: &ChunkPlan,
    options: &EncodeOptions,
) -> Result<RunSummary> {
    let source = FfmpegFrameSource::open(input)?;
    let segments = FileSegmentWriterFactory::new(template, options, plan.gop_size());

    let mut controller = ChunkController::new(plan, source, segments);
    let summary = controller.run()?;
    debug_assert_eq!(controller.state(), RunState::Done);

    Ok(summary)
}
