use std::io::Write;

use serde::Serialize;
use traffic_pipeline::{report::HourlyTop, PipelineSummary};

use crate::config::ReportFormat;

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    top_n: usize,
    summary: &'a PipelineSummary,
    hours: &'a [HourlyTop],
}

pub fn write_report(
    writer: &mut impl Write,
    format: ReportFormat,
    hours: &[HourlyTop],
    top_n: usize,
    summary: &PipelineSummary,
) -> anyhow::Result<()> {
    match format {
        ReportFormat::Text => write_text(writer, hours, top_n)?,
        ReportFormat::Json => {
            serde_json::to_writer_pretty(
                &mut *writer,
                &JsonReport {
                    top_n,
                    summary,
                    hours,
                },
            )?;
            writeln!(writer)?;
        }
    }

    Ok(())
}

fn write_text(writer: &mut impl Write, hours: &[HourlyTop], top_n: usize) -> std::io::Result<()> {
    for hour in hours {
        writeln!(
            writer,
            "Top {} congested lights for hour {}:",
            top_n, hour.bucket
        )?;
        for entry in &hour.entries {
            writeln!(writer, "  Light {}: {} cars", entry.key, entry.total)?;
        }
        writeln!(writer)?;
    }

    Ok(())
}
