extern crate ffmpeg_next as ffmpeg;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gopsplit::chunk::template::OutputTemplate;
use gopsplit::error::SplitError;
use gopsplit::execution::{split_video, RunSummary};
use gopsplit::plan::{ChunkPlan, EncodeOptions};

/// Split a video into even sized chunks, each starting on an I-frame.
///
/// Audio is not preserved.
#[derive(Parser)]
#[command(
    version,
    after_help = "Example:\n\n    gopsplit --gop-size 25 --chunk-size 100 myfile.mp4 chunks/%05d.mp4\n\nwill split a video into chunks of size 100, with I-frames every 25 frames."
)]
pub struct Cli {
    /// Size of a group of pictures
    #[arg(long, env = "GOPSPLIT_GOP_SIZE", default_value_t = 30)]
    pub gop_size: u64,

    /// Size of a chunk in frames; must be a multiple of the GOP size
    #[arg(long, env = "GOPSPLIT_CHUNK_SIZE", default_value_t = 120)]
    pub chunk_size: u64,

    /// Number of frames to skip at the beginning of the input
    #[arg(long, env = "GOPSPLIT_SKIP", default_value_t = 0)]
    pub skip: u64,

    /// Number of frames to encode; negative means the whole input
    #[arg(long, env = "GOPSPLIT_LENGTH", allow_negative_numbers = true)]
    pub length: Option<i64>,

    /// Constant rate factor handed to the encoder of every chunk
    #[arg(long, env = "GOPSPLIT_CRF", default_value_t = 18, value_parser = clap::value_parser!(u8).range(0..=63))]
    pub crf: u8,

    #[arg(long, env = "GOPSPLIT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    pub input_file: PathBuf,

    /// Output path with one integer placeholder, e.g. chunks/%05d.mp4
    pub output_template: String,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

pub fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_tracing(cli.log_format);

    match run(&cli) {
        Ok(summary) => {
            for line in summary.to_string().lines() {
                info!("{line}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(stage = e.stage(), "{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<RunSummary, SplitError> {
    // Everything configurable is checked before any file is touched.
    let max_frames = cli
        .length
        .and_then(|length| u64::try_from(length).ok());
    let plan = ChunkPlan::new(cli.gop_size, cli.chunk_size, cli.skip, max_frames)?;
    let template = OutputTemplate::parse(&cli.output_template)?;
    let options = EncodeOptions::default().with_crf(cli.crf);

    info!("GOP size: {}", plan.gop_size());
    info!("Chunk size: {}", plan.chunk_size());
    info!(
        skip = plan.skip_frames(),
        length = ?plan.max_frames(),
        output = %template,
        "run configured"
    );

    ffmpeg::init().map_err(|e| SplitError::InputOpen {
        path: cli.input_file.clone(),
        source: e,
    })?;
    ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Warning);

    split_video(&cli.input_file, &template, &plan, &options)
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
