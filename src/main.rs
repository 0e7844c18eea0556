// Entry point: parse configuration, set up logging, run the pipeline once.
//
// Exit status is non-zero whenever any stage fails; in that case no report
// location is left half-replaced (see `output::write_reports`).
mod clean;
mod config;
mod error;
mod loader;
mod normalize;
mod output;
mod pipeline;
mod reports;
mod types;
mod util;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr) // previews own stdout
        .init();

    let config = Config::parse();
    info!(
        input = %config.input.display(),
        output_root = %config.output_root.display(),
        "configuration loaded"
    );

    let summary = pipeline::run(&config).with_context(|| {
        format!(
            "sales ETL failed for {} -> {}",
            config.input.display(),
            config.output_root.display()
        )
    })?;

    println!(
        "Processed {} rows ({} kept after cleaning); {} reports written to {}",
        util::format_int(summary.loaded_rows),
        util::format_int(summary.cleaned_rows),
        summary.reports.len(),
        config.output_root.display()
    );
    Ok(())
}
