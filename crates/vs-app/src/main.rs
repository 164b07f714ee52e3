use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use vs_core::error::ConvertError;
use vs_core::media::MediaKind;
use vs_core::progress::PipelineProgress;

pub mod cli;
pub mod media;
pub mod monitor;
pub mod pipeline;

fn main() -> ExitCode {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Erreur : {e:#}");
            let code = e
                .downcast_ref::<ConvertError>()
                .map_or(1, ConvertError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(cli: &cli::Cli) -> Result<()> {
    // 3. Charger la config puis appliquer les overrides CLI
    let config = cli.resolve_config()?;

    // Aperçu texte d'une image, sans rasterisation
    if cli.text {
        return print_text(cli, &config);
    }

    let output = cli
        .output
        .clone()
        .context("--output est requis hors mode --text")?;

    // 4. Progression partagée + Ctrl-C → annulation entre deux frames
    let progress = Arc::new(PipelineProgress::new());
    let handler_progress = Arc::clone(&progress);
    ctrlc::set_handler(move || handler_progress.cancel())
        .context("Impossible d'installer le handler Ctrl-C")?;

    // 5. Thread de progression
    let monitor = monitor::ProgressMonitor::spawn(Arc::clone(&progress), monitor::MONITOR_PERIOD)
        .context("Impossible de lancer le thread de progression")?;

    // 6. Conversion
    let result = pipeline::Pipeline::new(Arc::clone(&progress)).run(pipeline::RunRequest {
        config,
        io: media::FileIo::new(cli.input.clone(), output.clone()),
    });
    monitor.stop();

    let report = result?;
    let (width, height) = report.properties.output_dimensions();
    println!(
        "{} frames {}x{} écrites dans {} ({:.1}s)",
        report.frames_written,
        width,
        height,
        output.display(),
        report.elapsed.as_secs_f64()
    );
    Ok(())
}

fn print_text(cli: &cli::Cli, config: &vs_core::config::ConvertConfig) -> Result<()> {
    if MediaKind::from_path(&cli.input)? != MediaKind::Image {
        return Err(ConvertError::Config(format!(
            "le mode texte n'accepte qu'une image : {}",
            cli.input.display()
        ))
        .into());
    }
    let set = config.validate()?;
    let frame = vs_source::image::load_image(&cli.input)?;
    let text = vs_ascii::text::render_text(
        &frame,
        &set,
        cli.text_width,
        vs_ascii::text::DEFAULT_ASPECT_BIAS,
    )?;
    print!("{text}");
    Ok(())
}
