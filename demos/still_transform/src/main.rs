use argh::FromArgs;
use std::path::PathBuf;
use std::sync::Arc;

use pixelflow::image::PixelBuffer;
use pixelflow::io::{
    capture::{ReplayBackend, ReplayConfig},
    functional as F,
};
use pixelflow::pipeline::{
    diagnostics::Histograms, ApplyOutcome, Catalog, Coordinator, ParameterKind, PipelineConfig,
    Presenter, Refresh, TransformError,
};

#[derive(FromArgs)]
/// Apply an image transform to a file and save the result
struct Args {
    /// path to an input image
    #[argh(option, short = 'i')]
    image_path: Option<PathBuf>,

    /// path to write the result to, the extension selects the format
    #[argh(option, short = 'o')]
    output_path: Option<PathBuf>,

    /// the operation to apply
    #[argh(option, short = 'p', default = "String::from(\"grayscale\")")]
    operation: String,

    /// a parameter as name=value, may be repeated
    #[argh(option, short = 's')]
    set: Vec<String>,

    /// list the available operations and exit
    #[argh(switch, short = 'l')]
    list: bool,
}

/// Logs what a preview would redraw.
struct LogPresenter;

impl LogPresenter {
    fn report(name: &str, buffer: Option<&PixelBuffer>, refresh: Refresh) {
        let Some(buffer) = buffer else {
            log::info!("{name}: empty");
            return;
        };
        log::info!("{name}: {} x{}", buffer.size(), buffer.num_channels());

        if refresh.histogram() {
            if let Ok(hist) = Histograms::compute(buffer) {
                let means: Vec<String> = (0..hist.num_channels())
                    .filter_map(|c| hist.mean(c))
                    .map(|m| format!("{m:.1}"))
                    .collect();
                log::info!("{name}: channel means [{}]", means.join(", "));
            }
        }
    }
}

impl Presenter for LogPresenter {
    fn original_changed(&mut self, buffer: Option<&PixelBuffer>, refresh: Refresh) {
        Self::report("original", buffer, refresh);
    }

    fn result_changed(&mut self, buffer: Option<&PixelBuffer>, refresh: Refresh) {
        Self::report("result", buffer, refresh);
    }

    fn transform_failed(&mut self, error: &TransformError) {
        log::error!("transform failed: {error}");
    }
}

fn print_catalog(catalog: &Catalog) {
    for spec in catalog.operations() {
        println!("{:<20} {}", spec.id, spec.description);
        for param in spec.parameters.iter() {
            let range = match &param.kind {
                ParameterKind::Integer {
                    min,
                    max,
                    default,
                    odd,
                    ..
                } => format!(
                    "{min}..={max}{} (default {default})",
                    if *odd { " odd" } else { "" }
                ),
                ParameterKind::Real {
                    min, max, default, ..
                } => format!("{min}..={max} (default {default})"),
                ParameterKind::Choice { options, default } => {
                    format!("{} (default {default})", options.join("|"))
                }
            };
            println!("    {:<16} {range}  {}", param.name, param.description);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let catalog = Arc::new(Catalog::builtin());
    if args.list {
        print_catalog(&catalog);
        return Ok(());
    }

    let Some(image_path) = args.image_path else {
        return Err("an input image is required, see --help".into());
    };

    // parse the parameters against the selected operation
    let spec = catalog.describe(&args.operation)?;
    let values = spec.parse_assignments(args.set.iter().map(String::as_str))?;

    let coordinator = Coordinator::new(
        catalog.clone(),
        Arc::new(ReplayBackend::new(ReplayConfig::default())),
        LogPresenter,
        PipelineConfig::default(),
    );
    coordinator.change_operation(&args.operation)?;
    coordinator.change_parameters(&values)?;
    log::info!(
        "{}({})",
        args.operation,
        coordinator.selection().parameters
    );

    // read the image and run the operation on it
    let image = F::read_image_any(&image_path)?;
    coordinator.load_still(image);

    if coordinator.apply_current_operation() == ApplyOutcome::FellBack {
        log::warn!("keeping the original image");
    }

    if let (Some(output_path), Some(result)) = (args.output_path, coordinator.result()) {
        F::write_image(&output_path, &result)?;
        log::info!("wrote {}", output_path.display());
    }

    Ok(())
}
