use std::path::Path;

use ffmpeg_next::codec::Context;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::media::Type;
use ffmpeg_next::util::error::EAGAIN;
use ffmpeg_next::{decoder, format, frame, Packet, Rational};
use tracing::{debug, warn};

use crate::error::{Result, SplitError};
use crate::source::{FrameSource, StreamParams};

const FALLBACK_FRAME_RATE: Rational = Rational(25, 1);

/// Demuxes and decodes the best video stream of one input.
pub struct FfmpegFrameSource {
    input_context: Input,
    video_index: usize,
    decoder: decoder::Video,
    params: StreamParams,
    draining: bool,
    frames_decoded: u64,
}

impl FfmpegFrameSource {
    /// Open an input (file, URL, anything libavformat understands) and set up
    /// a decoder for its best video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let input_context = format::input(&path).map_err(|source| SplitError::InputOpen {
            path: path.to_path_buf(),
            source,
        })?;

        if tracing::enabled!(tracing::Level::DEBUG) {
            format::context::input::dump(&input_context, 0, path.to_str());
        }

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or_else(|| SplitError::NoVideoStream {
                path: path.to_path_buf(),
            })?;
        let video_index = stream.index();
        let parameters = stream.parameters();

        let codec = parameters.id();
        if decoder::find(codec).is_none() {
            return Err(SplitError::UnsupportedCodec { codec });
        }

        let decoder = Context::from_parameters(parameters)
            .and_then(|context| context.decoder().video())
            .map_err(|source| SplitError::InputOpen {
                path: path.to_path_buf(),
                source,
            })?;

        let frame_rate = [
            decoder.frame_rate(),
            Some(stream.avg_frame_rate()),
            Some(stream.rate()),
        ]
        .into_iter()
        .flatten()
        .find(|rate| is_usable(*rate))
        .unwrap_or_else(|| {
            warn!(
                fallback = %FALLBACK_FRAME_RATE,
                "input does not report a frame rate, assuming fallback"
            );
            FALLBACK_FRAME_RATE
        });

        let params = StreamParams {
            width: decoder.width(),
            height: decoder.height(),
            format: decoder.format(),
            frame_rate,
        };
        debug!(
            path = %path.display(),
            stream = video_index,
            ?codec,
            width = params.width,
            height = params.height,
            format = ?params.format,
            frame_rate = %params.frame_rate,
            "opened input"
        );

        Ok(Self {
            input_context,
            video_index,
            decoder,
            params,
            draining: false,
            frames_decoded: 0,
        })
    }

    /// Read packets until one belongs to the video stream.
    fn next_video_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input_context) {
                Ok(()) if packet.stream() == self.video_index => return Ok(Some(packet)),
                Ok(()) => continue,
                Err(ffmpeg_next::Error::Eof) => return Ok(None),
                Err(e) => return Err(SplitError::Decode(e)),
            }
        }
    }
}

impl FrameSource for FfmpegFrameSource {
    type Frame = frame::Video;

    fn params(&self) -> StreamParams {
        self.params
    }

    fn next_frame(&mut self) -> Result<Option<frame::Video>> {
        let mut decoded = frame::Video::empty();
        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    self.frames_decoded += 1;
                    return Ok(Some(decoded));
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(None),
                Err(ffmpeg_next::Error::Other { errno: EAGAIN }) if !self.draining => {}
                Err(e) => return Err(SplitError::Decode(e)),
            }

            match self.next_video_packet()? {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .map_err(SplitError::Decode)?,
                None => {
                    debug!(
                        frames = self.frames_decoded,
                        "input exhausted, draining decoder"
                    );
                    self.decoder.send_eof().map_err(SplitError::Decode)?;
                    self.draining = true;
                }
            }
        }
    }
}

fn is_usable(rate: Rational) -> bool {
    rate.numerator() > 0 && rate.denominator() > 0
}
