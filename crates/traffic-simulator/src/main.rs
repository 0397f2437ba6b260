mod config;
mod report;
mod telemetry;

extern crate dotenv;

use std::{
    fs::File,
    io::{BufWriter, Write},
    sync::{atomic::AtomicBool, Arc},
};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use traffic_pipeline::{
    report::top_n, sequential::aggregate_sequential, source::read_lines, Pipeline,
    PipelineError,
};

use crate::{config::Configuration, report::write_report, telemetry::setup_telemetry};

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    setup_telemetry("traffic-simulator")?;

    let config = Configuration::from_env()?;
    info!("Chosen configuration: {:#?}", config);

    let pipeline_config = config.pipeline()?;
    let signal_flag = setup_signal_handlers()?;
    let lines = read_lines(&config.input_path)?;

    let output = match Pipeline::new(pipeline_config)
        .with_cancellation(signal_flag)
        .run(&lines)
    {
        Ok(output) => output,
        Err(PipelineError::Cancelled { lines_claimed }) => {
            warn!(
                "Shutdown signal detected after {} of {} lines. No report written.",
                lines_claimed,
                lines.len()
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if config.verify_sequential {
        if output.aggregates != aggregate_sequential(&lines) {
            bail!("Pipeline aggregates differ from the sequential baseline");
        }
        info!("Pipeline aggregates match the sequential baseline");
    }

    let hours = top_n(&output.aggregates, config.top_n);
    let file = File::create(&config.output_path)
        .with_context(|| format!("Creating {}", config.output_path.display()))?;
    let mut writer = BufWriter::new(file);
    write_report(
        &mut writer,
        config.report_format,
        &hours,
        config.top_n,
        &output.summary,
    )?;
    writer.flush()?;

    info!(
        "Wrote report for {} hours to {}",
        hours.len(),
        config.output_path.display()
    );

    Ok(())
}

fn setup_signal_handlers() -> Result<Arc<AtomicBool>> {
    let signal_flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, signal_flag.clone())?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, signal_flag.clone())?;
    Ok(signal_flag)
}
