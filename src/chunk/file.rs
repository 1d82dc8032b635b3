use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::ptr;

use ffmpeg_next::format::context::Output;
use ffmpeg_next::util::error::EAGAIN;
use ffmpeg_next::{codec, encoder, format, frame, media, Packet, Rational};
use tracing::{debug, warn};

use crate::chunk::template::OutputTemplate;
use crate::chunk::{SegmentReport, SegmentSink, SegmentSinkFactory};
use crate::error::{Result, SplitError};
use crate::plan::{EncodeOptions, PictureType};
use crate::source::StreamParams;

/// Opens one [FileSegmentWriter] per segment, naming files after the output template.
pub struct FileSegmentWriterFactory<'a> {
    template: &'a OutputTemplate,
    options: &'a EncodeOptions,
    gop_size: u32,
}

impl<'a> FileSegmentWriterFactory<'a> {
    pub fn new(template: &'a OutputTemplate, options: &'a EncodeOptions, gop_size: u32) -> Self {
        Self {
            template,
            options,
            gop_size,
        }
    }
}

impl SegmentSinkFactory for FileSegmentWriterFactory<'_> {
    type Target = FileSegmentWriter;

    fn open(&mut self, index: u64, params: &StreamParams) -> Result<Self::Target> {
        FileSegmentWriter::create(self.template.render(index), params, self.gop_size, self.options)
    }
}

/// Encodes frames into a single output file.
pub struct FileSegmentWriter {
    ctx: Output,
    encoder: encoder::video::Encoder,
    path: PathBuf,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    frames: u64,
    flushed: bool,
}

impl FileSegmentWriter {
    pub fn create(
        path: PathBuf,
        params: &StreamParams,
        gop_size: u32,
        options: &EncodeOptions,
    ) -> Result<Self> {
        let mut ctx = output_context(&path, &options.fallback_format)?;

        let global_header = ctx.format().flags().contains(format::Flags::GLOBAL_HEADER);
        let codec_id = ctx.format().codec(&path, media::Type::Video);
        let codec = encoder::find(codec_id).ok_or_else(|| SplitError::OutputAlloc {
            path: path.clone(),
            reason: format!("no encoder for {codec_id:?}"),
            source: None,
        })?;
        let alloc_err = |reason: &str, source: ffmpeg_next::Error| SplitError::OutputAlloc {
            path: path.clone(),
            reason: reason.to_string(),
            source: Some(source),
        };

        let time_base = params.frame_rate.invert();
        let encoder = {
            let mut ost = ctx
                .add_stream(codec)
                .map_err(|e| alloc_err("could not allocate stream", e))?;

            let mut encoder = codec::context::Context::from_parameters(ost.parameters())
                .and_then(|context| context.encoder().video())
                .map_err(|e| alloc_err("could not allocate video codec context", e))?;
            encoder.set_width(params.width);
            encoder.set_height(params.height);
            encoder.set_format(params.format);
            encoder.set_time_base(time_base);
            encoder.set_frame_rate(Some(params.frame_rate));
            encoder.set_gop(gop_size);
            encoder.set_bit_rate(options.bit_rate);
            if global_header {
                encoder.set_flags(codec::Flags::GLOBAL_HEADER);
            }

            let encoder = encoder
                .open_as_with(codec, options.codec_dictionary(codec_id))
                .map_err(|e| alloc_err("could not open video codec", e))?;
            ost.set_parameters(&encoder);
            ost.set_time_base(time_base);

            encoder
        };

        let ignored = ctx
            .write_header_with(options.muxer_dictionary())
            .map_err(|source| SplitError::OutputOpen {
                path: path.clone(),
                source,
            })?;
        for (key, value) in ignored.iter() {
            debug!(key, value, "muxer did not use option");
        }

        // The muxer may pick its own time base while writing the header.
        let stream_time_base = ctx
            .stream(0)
            .map(|stream| stream.time_base())
            .unwrap_or(time_base);

        debug!(
            path = %path.display(),
            codec = ?codec_id,
            encoder_time_base = %time_base,
            stream_time_base = %stream_time_base,
            "opened segment"
        );

        Ok(Self {
            ctx,
            encoder,
            path,
            encoder_time_base: time_base,
            stream_time_base,
            frames: 0,
            flushed: false,
        })
    }

    /// Move every packet the encoder has ready into the container.
    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = Packet::empty();
        loop {
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {
                    packet.set_stream(0);
                    packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
                    packet
                        .write_interleaved(&mut self.ctx)
                        .map_err(SplitError::Write)?;
                }
                Err(ffmpeg_next::Error::Other { errno: EAGAIN }) | Err(ffmpeg_next::Error::Eof) => {
                    return Ok(())
                }
                Err(e) => return Err(SplitError::Encode(e)),
            }
        }
    }
}

impl SegmentSink for FileSegmentWriter {
    type Frame = frame::Video;

    fn write(&mut self, mut frame: frame::Video, kind: PictureType, pts: i64) -> Result<()> {
        frame.set_kind(kind.into());
        frame.set_pts(Some(pts));

        self.encoder.send_frame(&frame).map_err(SplitError::Encode)?;
        self.frames += 1;

        self.drain_packets()
    }

    fn flush(&mut self) -> Result<()> {
        if self.flushed {
            return Ok(());
        }

        self.encoder.send_eof().map_err(SplitError::Encode)?;
        self.flushed = true;

        self.drain_packets()
    }

    fn close(mut self) -> Result<SegmentReport> {
        if !self.flushed {
            warn!(path = %self.path.display(), "closing segment that was never flushed");
            self.flush()?;
        }

        self.ctx.write_trailer().map_err(SplitError::Write)?;

        Ok(SegmentReport {
            path: self.path,
            frames: self.frames,
        })
    }
}

/// Create the output context, using the container implied by the file extension
/// or `fallback` when the extension names none.
fn output_context(path: &Path, fallback: &str) -> Result<Output> {
    let ctx = if can_deduce_format(path) {
        format::output(&path)
    } else {
        warn!(
            path = %path.display(),
            fallback,
            "could not deduce output format from file extension"
        );
        if !muxer_exists(fallback) {
            return Err(SplitError::OutputAlloc {
                path: path.to_path_buf(),
                reason: format!("no muxer named {fallback:?}"),
                source: None,
            });
        }
        format::output_as(&path, fallback)
    };

    ctx.map_err(|source| SplitError::OutputOpen {
        path: path.to_path_buf(),
        source,
    })
}

fn can_deduce_format(path: &Path) -> bool {
    let Ok(filename) = CString::new(path.to_string_lossy().as_bytes()) else {
        return false;
    };

    unsafe { !ffmpeg_next::ffi::av_guess_format(ptr::null(), filename.as_ptr(), ptr::null()).is_null() }
}

fn muxer_exists(name: &str) -> bool {
    let Ok(short_name) = CString::new(name) else {
        return false;
    };

    unsafe { !ffmpeg_next::ffi::av_guess_format(short_name.as_ptr(), ptr::null(), ptr::null()).is_null() }
}
