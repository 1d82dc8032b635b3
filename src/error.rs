use std::path::PathBuf;

use ffmpeg_next::codec;
use thiserror::Error;

/// Every way a split run can fail. All of them are fatal for the run.
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("invalid configuration: {0}")]
    ConfigValidation(String),

    #[error("could not open input {}", path.display())]
    InputOpen {
        path: PathBuf,
        #[source]
        source: ffmpeg_next::Error,
    },

    #[error("no video stream found in {}", path.display())]
    NoVideoStream { path: PathBuf },

    #[error("no decoder available for codec {codec:?}")]
    UnsupportedCodec { codec: codec::Id },

    #[error("input exhausted while skipping: requested {requested} frames, only {available} available")]
    InputExhausted { requested: u64, available: u64 },

    #[error("unable to decode video frame")]
    Decode(#[source] ffmpeg_next::Error),

    #[error("could not allocate output for {}: {reason}", path.display())]
    OutputAlloc {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<ffmpeg_next::Error>,
    },

    #[error("could not open output {}", path.display())]
    OutputOpen {
        path: PathBuf,
        #[source]
        source: ffmpeg_next::Error,
    },

    #[error("error encoding video frame")]
    Encode(#[source] ffmpeg_next::Error),

    #[error("error while writing video frame")]
    Write(#[source] ffmpeg_next::Error),
}

impl SplitError {
    /// Short name of the pipeline stage that failed, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            SplitError::ConfigValidation(_) => "config",
            SplitError::InputOpen { .. }
            | SplitError::NoVideoStream { .. }
            | SplitError::UnsupportedCodec { .. }
            | SplitError::InputExhausted { .. } => "input",
            SplitError::Decode(_) => "decode",
            SplitError::OutputAlloc { .. } | SplitError::OutputOpen { .. } => "output",
            SplitError::Encode(_) => "encode",
            SplitError::Write(_) => "mux",
        }
    }
}

pub type Result<T, E = SplitError> = std::result::Result<T, E>;
