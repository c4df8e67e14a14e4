use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::error::ProcessorError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Converted,
    Failed(String),
}

/// What happened to one cutfile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub scatter_type: Option<String>,
    pub declared_count: u64,
    pub converted_count: u64,
    pub weight_factor: f64,
    pub average_weight: f64,
    pub zero_weight_events: u64,
    pub efficiency_file: Option<PathBuf>,
    pub status: FileStatus,
}

impl FileSummary {
    /// Summary of a file that never made it to conversion
    pub fn failed(path: &Path, reason: String) -> Self {
        Self {
            path: path.to_path_buf(),
            scatter_type: None,
            declared_count: 0,
            converted_count: 0,
            weight_factor: 0.0,
            average_weight: 0.0,
            zero_weight_events: 0,
            efficiency_file: None,
            status: FileStatus::Failed(reason),
        }
    }

    pub fn is_converted(&self) -> bool {
        self.status == FileStatus::Converted
    }
}

/// Per run bookkeeping, written next to the output as YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub version: String,
    pub total_events: u64,
    pub files: Vec<FileSummary>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            version: format!("{}:{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            total_events: 0,
            files: Vec::new(),
        }
    }

    pub fn push(&mut self, file: FileSummary) {
        if file.is_converted() {
            self.total_events += file.converted_count;
        }
        self.files.push(file);
    }

    pub fn n_failed(&self) -> usize {
        self.files.iter().filter(|f| !f.is_converted()).count()
    }

    /// The summary path for an output file: `<stem>.summary.yml` in the same directory.
    ///
    /// Never equal to `output`, whatever its extension.
    pub fn path_for_output(output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        output.with_file_name(format!("{stem}.summary.yml"))
    }

    pub fn write_yaml(&self, path: &Path) -> Result<(), ProcessorError> {
        let yaml_str = serde_yaml::to_string(self)?;
        let mut file = File::create(path)?;
        file.write_all(yaml_str.as_bytes())?;
        Ok(())
    }
}
