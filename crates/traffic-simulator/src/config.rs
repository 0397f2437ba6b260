use std::{path::PathBuf, str::FromStr};

use anyhow::{bail, Context};
use traffic_pipeline::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => bail!("Unknown report format {}", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Configuration {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub report_format: ReportFormat,
    pub producers: usize,
    pub consumers: usize,
    pub buffer_capacity: usize,
    pub top_n: usize,
    pub verify_sequential: bool,
}

impl Configuration {
    pub fn from_env() -> anyhow::Result<Configuration> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Configuration> {
        Ok(Configuration {
            input_path: read_string(&lookup, "INPUT_PATH")
                .unwrap_or_else(|| "data.txt".into())
                .into(),
            output_path: read_string(&lookup, "OUTPUT_PATH")
                .unwrap_or_else(|| "traffic_report.txt".into())
                .into(),
            report_format: read_parsed(&lookup, "REPORT_FORMAT")?.unwrap_or(ReportFormat::Text),
            producers: read_parsed(&lookup, "PRODUCERS")?.unwrap_or(4),
            consumers: read_parsed(&lookup, "CONSUMERS")?.unwrap_or(4),
            buffer_capacity: read_parsed(&lookup, "BUFFER_CAPACITY")?.unwrap_or(100),
            top_n: read_parsed(&lookup, "TOP_N")?.unwrap_or(3),
            verify_sequential: read_flag(&lookup, "VERIFY_SEQUENTIAL"),
        })
    }

    pub fn pipeline(&self) -> anyhow::Result<PipelineConfig> {
        Ok(PipelineConfig::new(
            self.producers,
            self.consumers,
            self.buffer_capacity,
        )?)
    }
}

fn read_string(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|s| !s.trim().is_empty())
}

fn read_parsed<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    read_string(lookup, name)
        .map(|s| {
            s.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{}", e))
                .with_context(|| format!("Invalid value {:?} for environment variable {}", s, name))
        })
        .transpose()
}

fn read_flag(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> bool {
    read_string(lookup, name)
        .map(|s| {
            let s = s.trim().to_lowercase();
            !(s.eq("false") || s.eq("0") || s.eq("no"))
        })
        .unwrap_or(false)
}
