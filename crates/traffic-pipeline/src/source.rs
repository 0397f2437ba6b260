use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use tracing::info;

use crate::error::{PipelineError, Result};

/// Reads every line of `path` up front. Pipeline runs never touch the file themselves.
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let unavailable = |source| PipelineError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(unavailable)?;
    let lines = lines_from_reader(BufReader::new(file)).map_err(unavailable)?;

    info!("Read {} lines from {}", lines.len(), path.display());
    Ok(lines)
}

pub fn lines_from_reader(reader: impl BufRead) -> std::io::Result<Vec<String>> {
    reader.lines().collect()
}
