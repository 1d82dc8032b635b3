use ffmpeg_next::{codec, picture, Dictionary};

use crate::error::{Result, SplitError};

/// Picture type forced onto each frame before it reaches the encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureType {
    I,
    P,
}

impl From<PictureType> for picture::Type {
    fn from(value: PictureType) -> Self {
        match value {
            PictureType::I => picture::Type::I,
            PictureType::P => picture::Type::P,
        }
    }
}

/// How the input is cut up. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    gop_size: u32,
    chunk_size: u64,
    skip_frames: u64,
    max_frames: Option<u64>,
}

impl ChunkPlan {
    /// Build a plan, rejecting any chunk size that does not end on a GOP boundary.
    pub fn new(
        gop_size: u64,
        chunk_size: u64,
        skip_frames: u64,
        max_frames: Option<u64>,
    ) -> Result<Self> {
        if gop_size == 0 {
            return Err(SplitError::ConfigValidation(
                "gop size must be positive".to_string(),
            ));
        }
        if chunk_size == 0 {
            return Err(SplitError::ConfigValidation(
                "chunk size must be positive".to_string(),
            ));
        }
        let Ok(encoder_gop) = u32::try_from(gop_size) else {
            return Err(SplitError::ConfigValidation(format!(
                "gop size ({gop_size}) exceeds the encoder limit of {}",
                u32::MAX
            )));
        };
        if chunk_size % gop_size != 0 {
            return Err(SplitError::ConfigValidation(format!(
                "chunk size ({chunk_size}) must be a multiple of gop size ({gop_size})"
            )));
        }

        Ok(Self {
            gop_size: encoder_gop,
            chunk_size,
            skip_frames,
            max_frames,
        })
    }

    pub fn gop_size(&self) -> u32 {
        self.gop_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn skip_frames(&self) -> u64 {
        self.skip_frames
    }

    pub fn max_frames(&self) -> Option<u64> {
        self.max_frames
    }

    /// I on every GOP boundary of the segment, P everywhere else.
    pub fn picture_type(&self, in_chunk: u64) -> PictureType {
        if in_chunk % u64::from(self.gop_size) == 0 {
            PictureType::I
        } else {
            PictureType::P
        }
    }

    pub fn length_reached(&self, frames_written: u64) -> bool {
        self.max_frames
            .is_some_and(|max_frames| frames_written >= max_frames)
    }
}

/// Encoder and muxer settings applied identically to every segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    pub crf: u8,
    pub faststart: bool,
    pub h264_preset: String,
    pub bit_rate: usize,
    pub fallback_format: String,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            crf: 18,
            faststart: true,
            h264_preset: "slow".to_string(),
            bit_rate: 400_000,
            fallback_format: "mp4".to_string(),
        }
    }
}

impl EncodeOptions {
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;

        self
    }

    /// Options handed to the encoder when it is opened.
    pub fn codec_dictionary(&self, codec: codec::Id) -> Dictionary<'static> {
        let mut opts = Dictionary::new();
        opts.set("crf", &self.crf.to_string());
        if codec == codec::Id::H264 {
            opts.set("preset", &self.h264_preset);
        }

        opts
    }

    /// Options handed to the muxer when the header is written.
    pub fn muxer_dictionary(&self) -> Dictionary<'static> {
        let mut opts = Dictionary::new();
        if self.faststart {
            opts.set("movflags", "faststart");
        }

        opts
    }
}
