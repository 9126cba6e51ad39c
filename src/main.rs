mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::Cli;
use logocraft::config::is_writable_dir;
use logocraft::{process_catalog, AppConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    if let Some(path) = &cli.write_config {
        config.save(path)?;
        println!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    if cli.list {
        for entry in config.formats.entries() {
            let spec = entry.spec.normalized();
            println!(
                "{:<16} {}x{} {} {}{}",
                entry.name,
                spec.dimensions.0,
                spec.dimensions.1,
                spec.color_mode.name(),
                spec.container.name(),
                if spec.thermal_layout { " (thermal)" } else { "" }
            );
        }
        return Ok(());
    }

    let Some(input) = cli.input else {
        bail!("no input image given");
    };
    let out_dir = cli.output.unwrap_or_else(|| config.default_output_dir.clone());
    if !is_writable_dir(&out_dir) {
        bail!("output directory {} is not a writable directory", out_dir.display());
    }

    let catalog = if cli.formats.is_empty() {
        config.formats.clone()
    } else {
        let (selected, unknown) = config.formats.select(cli.formats.as_slice());
        for name in &unknown {
            tracing::warn!(name = %name, "no format specification found");
        }
        if selected.is_empty() {
            bail!("none of the requested formats exist in the catalog");
        }
        selected
    };

    println!("Processing {} into {}...", input.display(), out_dir.display());
    let image = config
        .load_source(&input)
        .with_context(|| format!("failed to load {}", input.display()))?;

    let report = process_catalog(&image, &catalog, &out_dir);
    for entry in &report.entries {
        match &entry.result {
            Ok(output) => println!("  ok      {} ({} bytes)", entry.name, output.bytes_written),
            Err(e) => println!("  failed  {}: {}", entry.name, e),
        }
    }

    let failed = report.failed().count();
    if failed > 0 {
        bail!("{failed} of {} formats failed", report.entries.len());
    }
    println!("All {} formats written.", report.entries.len());
    Ok(())
}
