use argh::FromArgs;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use pixelflow::image::PixelBuffer;
use pixelflow::imgproc::flip;
use pixelflow::io::{
    capture::{CaptureBackend, ReplayBackend, ReplayConfig},
    functional as F,
};
use pixelflow::pipeline::{
    diagnostics::Histograms, Catalog, Coordinator, PipelineConfig, Presenter, PumpOutcome,
    Refresh, TransformError,
};

#[derive(FromArgs)]
/// Transform frames from a camera, or from a replayed image, in real time
struct Args {
    /// the camera id to use
    #[argh(option, short = 'c', default = "0")]
    camera_id: u32,

    /// the frames per second to request
    #[argh(option, short = 'f', default = "30")]
    fps: u32,

    /// the duration in seconds to run the app
    #[argh(option, short = 'd')]
    duration: Option<u64>,

    /// replay this image instead of opening a camera
    #[argh(option, short = 'r')]
    replay: Option<PathBuf>,

    /// the operation to apply
    #[argh(option, short = 'p', default = "String::from(\"grayscale\")")]
    operation: String,

    /// a parameter as name=value, may be repeated
    #[argh(option, short = 's')]
    set: Vec<String>,

    /// seconds between histogram refreshes
    #[argh(option, default = "5")]
    histogram_interval: u64,

    /// save the last result to this path
    #[argh(option, short = 'o')]
    output_path: Option<PathBuf>,
}

/// Logs histogram summaries whenever the pipeline asks for them.
#[derive(Default)]
struct StatsPresenter {
    results: u64,
}

impl Presenter for StatsPresenter {
    fn original_changed(&mut self, _buffer: Option<&PixelBuffer>, _refresh: Refresh) {}

    fn result_changed(&mut self, buffer: Option<&PixelBuffer>, refresh: Refresh) {
        self.results += 1;
        let Some(buffer) = buffer else {
            return;
        };
        if !refresh.histogram() {
            return;
        }
        match Histograms::compute(buffer) {
            Ok(hist) => {
                let means: Vec<String> = (0..hist.num_channels())
                    .filter_map(|c| hist.mean(c))
                    .map(|m| format!("{m:.1}"))
                    .collect();
                log::info!("result histogram means [{}]", means.join(", "));
            }
            Err(err) => log::warn!("histogram failed: {err}"),
        }
    }

    fn transform_failed(&mut self, error: &TransformError) {
        log::warn!("transform failed: {error}");
    }

    fn capture_ended(&mut self) {
        log::info!("camera stream ended after {} results", self.results);
    }
}

/// Replay frames alternating between `image` and its upside-down copy.
fn replay_frames(image: PixelBuffer) -> Result<Vec<PixelBuffer>, Box<dyn std::error::Error>> {
    let flipped: PixelBuffer = match &image {
        PixelBuffer::Mono8(img) => flip::vertical_flip(img)?.into(),
        PixelBuffer::Rgb8(img) => flip::vertical_flip(img)?.into(),
    };
    Ok(vec![image, flipped])
}

fn open_backend(args: &Args) -> Result<Arc<dyn CaptureBackend>, Box<dyn std::error::Error>> {
    if let Some(path) = &args.replay {
        let image = F::read_image_any(path)?;
        let interval = Duration::from_secs_f64(1.0 / f64::from(args.fps.max(1)));
        let config = ReplayConfig::new(replay_frames(image)?)
            .with_looping(true)
            .with_frame_interval(interval)
            .with_device_index(args.camera_id);
        return Ok(Arc::new(ReplayBackend::new(config)));
    }

    camera_backend(args)
}

#[cfg(all(feature = "v4l", target_os = "linux"))]
fn camera_backend(args: &Args) -> Result<Arc<dyn CaptureBackend>, Box<dyn std::error::Error>> {
    use pixelflow::io::capture::{V4lBackend, V4lCameraConfig};
    let config = V4lCameraConfig::default().with_fps(args.fps);
    Ok(Arc::new(V4lBackend::new(config)))
}

#[cfg(not(all(feature = "v4l", target_os = "linux")))]
fn camera_backend(_args: &Args) -> Result<Arc<dyn CaptureBackend>, Box<dyn std::error::Error>> {
    Err("built without camera support, enable the `v4l` feature or pass --replay".into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let catalog = Arc::new(Catalog::builtin());
    let values = catalog
        .describe(&args.operation)?
        .parse_assignments(args.set.iter().map(String::as_str))?;

    let config = PipelineConfig::default()
        .with_device_index(args.camera_id)
        .with_histogram_interval(Duration::from_secs(args.histogram_interval));

    let coordinator = Coordinator::new(
        catalog,
        open_backend(&args)?,
        StatsPresenter::default(),
        config,
    );
    coordinator.change_operation(&args.operation)?;
    coordinator.change_parameters(&values)?;

    // create a cancel token to stop the capture
    let cancel_token = Arc::new(AtomicBool::new(false));

    ctrlc::set_handler({
        let cancel_token = cancel_token.clone();
        move || {
            log::info!("received Ctrl-C, stopping");
            cancel_token.store(true, Ordering::SeqCst);
        }
    })?;

    let deadline = args
        .duration
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    coordinator.start_capture()?;

    let mut last_report = Instant::now();
    while !cancel_token.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            log::info!("duration elapsed, stopping");
            break;
        }

        if coordinator.process_next_frame(coordinator.config().poll_timeout)
            == PumpOutcome::StreamEnded
        {
            break;
        }

        if last_report.elapsed() >= Duration::from_secs(1) {
            let stats = coordinator.stats();
            log::info!(
                "fps: {:.1} processed: {} dropped: {}",
                stats.fps,
                stats.processed,
                stats.dropped
            );
            last_report = Instant::now();
        }
    }

    // NOTE: stopping joins the capture thread and releases the device
    coordinator.stop_capture();

    if let (Some(output_path), Some(result)) = (args.output_path, coordinator.result()) {
        F::write_image(&output_path, &result)?;
        log::info!("wrote {}", output_path.display());
    }

    Ok(())
}
