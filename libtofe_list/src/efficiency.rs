use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::constants::{COMMENT_MARKER, EFFICIENCY_FILE_SUFFIX};
use super::error::EfficiencyError;
use super::interpolate::{interpolate_sorted, Lookup};

/// Detection efficiency as a function of energy for one element.
///
/// Points are (energy in keV, efficiency), sorted by strictly increasing energy.
#[derive(Debug, Clone, PartialEq)]
pub struct EfficiencyTable {
    pub path: PathBuf,
    points: Vec<(f64, f64)>,
}

impl EfficiencyTable {
    /// The efficiency file for an element symbol: `<directory>/<symbol>.eff`
    pub fn file_path(directory: &Path, symbol: &str) -> PathBuf {
        directory.join(format!("{symbol}{EFFICIENCY_FILE_SUFFIX}"))
    }

    /// Load the efficiency file for `symbol` if one exists.
    ///
    /// A missing file is not an error, it only means there is no efficiency correction.
    pub fn find(directory: &Path, symbol: &str) -> Result<Option<Self>, EfficiencyError> {
        let path = Self::file_path(directory, symbol);
        if !path.exists() {
            log::info!(
                "No efficiency file {} found, {} weights will not be corrected.",
                path.to_string_lossy(),
                symbol
            );
            return Ok(None);
        }
        let file = File::open(&path)?;
        let table = Self::from_reader(BufReader::new(file), &path)?;
        log::info!(
            "Loaded {} efficiency points from {}.",
            table.points.len(),
            path.to_string_lossy()
        );
        Ok(Some(table))
    }

    pub fn from_reader<R: BufRead>(reader: R, source: &Path) -> Result<Self, EfficiencyError> {
        let mut points: Vec<(f64, f64)> = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let text = line.trim();
            if text.is_empty() || text.starts_with(COMMENT_MARKER) {
                continue;
            }
            let (energy, efficiency) =
                Self::parse_point(text).ok_or_else(|| EfficiencyError::BadLine {
                    file: source.to_path_buf(),
                    line: idx + 1,
                    text: text.to_string(),
                })?;
            if let Some((previous, _)) = points.last() {
                if energy <= *previous {
                    return Err(EfficiencyError::Unsorted {
                        file: source.to_path_buf(),
                        line: idx + 1,
                        energy,
                        previous: *previous,
                    });
                }
            }
            points.push((energy, efficiency));
        }
        if points.is_empty() {
            return Err(EfficiencyError::Empty(source.to_path_buf()));
        }
        Ok(Self {
            path: source.to_path_buf(),
            points,
        })
    }

    /// Exactly two finite numbers: energy and efficiency
    fn parse_point(text: &str) -> Option<(f64, f64)> {
        let mut parts = text.split_whitespace();
        let energy = parts.next()?.parse::<f64>().ok()?;
        let efficiency = parts.next()?.parse::<f64>().ok()?;
        if parts.next().is_some() || !energy.is_finite() || !efficiency.is_finite() {
            return None;
        }
        Some((energy, efficiency))
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Efficiency at `energy` (keV), linearly interpolated, or `None` outside the table
    pub fn lookup(&self, energy: f64) -> Option<f64> {
        match interpolate_sorted(&self.points, energy) {
            Lookup::Value(eff) => Some(eff),
            Lookup::OutOfRange { .. } => None,
        }
    }

    /// Efficiency at `energy` (keV), linearly interpolated.
    ///
    /// Outside the tabulated energies this is zero, with a warning.
    pub fn efficiency_at(&self, energy: f64) -> f64 {
        match interpolate_sorted(&self.points, energy) {
            Lookup::Value(eff) => eff,
            Lookup::OutOfRange { min, max } => {
                log::warn!(
                    "Energy {:.3} keV is outside the range [{}, {}] of efficiency file {}.",
                    energy,
                    min,
                    max,
                    self.path.to_string_lossy()
                );
                0.0
            }
        }
    }
}
