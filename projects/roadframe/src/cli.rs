use clap::{Args, Parser, Subcommand};
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Road survey frame sampling and privacy redaction", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract one frame every `--interval` meters along a GPS track.
    ExtractGps(ExtractGpsArgs),

    /// Extract frames where the picture changes, assuming a constant speed.
    ExtractHistogram(ExtractHistogramArgs),

    /// Blur detected regions in a folder of frames.
    Redact(RedactArgs),

    /// Write normalized detection boxes for a folder of frames.
    Annotate(AnnotateArgs),

    /// Re-render one redacted frame from an edited box list.
    Reblur(ReblurArgs),

    /// Run the HTTP job server.
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct VideoInput {
    /// Video file, or a folder of videos (mp4, avi, mov, mkv)
    #[arg(long, env = "ROADFRAME_VIDEO_ROOT")]
    pub video: PathBuf,

    /// Output folder; each video writes into `<output>/<video stem>/`
    #[arg(long, env = "ROADFRAME_OUTPUT_ROOT")]
    pub output: PathBuf,

    /// Image extension of the written frames
    #[arg(long, default_value = "jpg")]
    pub extension: String,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractGpsArgs {
    #[command(flatten)]
    pub input: VideoInput,

    /// GPX file, or a folder holding `<video stem>.gpx` per video
    #[arg(long)]
    pub gpx: PathBuf,

    /// Spacing between frames along the track, in meters
    #[arg(long, default_value_t = 10.0)]
    pub interval: f64,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractHistogramArgs {
    #[command(flatten)]
    pub input: VideoInput,

    /// Travelled distance that must separate two frames, in meters
    #[arg(long, default_value_t = 10.0)]
    pub target_distance: f64,

    /// Assumed vehicle speed, in km/h
    #[arg(long, default_value_t = 30.0)]
    pub speed_kph: f64,

    /// Minimum Bhattacharyya distance to the last kept frame (0..1)
    #[arg(long, default_value_t = 0.3)]
    pub threshold: f64,
}

#[derive(Args, Debug, Clone)]
pub struct DetectorArgs {
    /// RT-DETR ONNX model file
    #[arg(long, env = "ROADFRAME_MODEL")]
    pub model: String,

    /// Minimum detection confidence
    #[arg(long, default_value_t = 0.05)]
    pub confidence: f32,
}

#[derive(Args, Debug, Clone)]
pub struct RedactArgs {
    /// Folder of frames (jpg, jpeg, png)
    #[arg(long)]
    pub input: PathBuf,

    /// Folder for the redacted frames; must differ from `--input`
    #[arg(long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub detector: DetectorArgs,

    /// Images per detector window in batched mode
    #[arg(long, default_value_t = 50)]
    pub batch_size: usize,

    /// Folders larger than this are processed in windows
    #[arg(long, default_value_t = 500)]
    pub batch_threshold: usize,

    #[command(flatten)]
    pub blur: BlurArgs,

    /// Fail the whole run when the detector fails instead of skipping the image
    #[arg(long)]
    pub abort_on_detector_error: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BlurArgs {
    /// Gaussian kernel size in pixels (made odd)
    #[arg(long, default_value_t = 51)]
    pub blur_kernel: i32,

    /// Gaussian sigma
    #[arg(long, default_value_t = 30.0)]
    pub blur_sigma: f64,
}

#[derive(Args, Debug, Clone)]
pub struct AnnotateArgs {
    /// Folder of frames (jpg, jpeg, png)
    #[arg(long)]
    pub input: PathBuf,

    /// Folder for the `<stem>.txt` box files
    #[arg(long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub detector: DetectorArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ReblurArgs {
    /// Unredacted source frame
    #[arg(long)]
    pub source: PathBuf,

    /// Pixel box file (`x_min y_min x_max y_max` per line)
    #[arg(long)]
    pub boxes: PathBuf,

    /// Redacted frame to overwrite
    #[arg(long)]
    pub output: PathBuf,

    /// Sidecar to rewrite; defaults to `annot_txt/<stem>.txt` next to `--output`
    #[arg(long)]
    pub sidecar: Option<PathBuf>,

    /// Also write the boxes as `class cx cy w h` fractions of the image size
    #[arg(long)]
    pub normalized_sidecar: Option<PathBuf>,

    #[command(flatten)]
    pub blur: BlurArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// Port to bind to
    #[arg(long, default_value_t = 12206)]
    pub port: u16,

    /// Root directory for video and GPX files
    #[arg(long, env = "ROADFRAME_VIDEO_ROOT")]
    pub video_root: PathBuf,

    /// Root directory for output artifacts
    #[arg(long, env = "ROADFRAME_OUTPUT_ROOT")]
    pub output_root: PathBuf,

    /// RT-DETR ONNX model used by redaction jobs
    #[arg(long, env = "ROADFRAME_MODEL")]
    pub model: String,
}
