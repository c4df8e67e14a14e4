use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::constants::{
    ATOMIC_MASS_UNIT_G, COMMENT_MARKER, HEADER_SEPARATOR, TFU_ATOMS_PER_CM2,
};
use super::error::ConfigError;

/// Carbon average mass in u, for converting the foil thickness from mass to atoms
const CARBON_MASS_U: f64 = 12.011;

/// Every keyword the configuration format knows about.
///
/// Most of these are carried over from the analysis configuration shared with the
/// depth profiling tools and have no effect on the conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    Beam,
    Energy,
    DetectorAngle,
    TargetAngle,
    Toflen,
    CarbonFoilThickness,
    TargetDensity,
    TofCalibration,
    AngleCalibration,
    DepthSteps,
    DepthStepStopping,
    DepthStepOutput,
    DepthsConcentrationScaling,
    CrossSection,
    Iterations,
    EfficiencyDirectory,
    StoppingTable,
}

const CONFIG_KEYS: [(&str, ConfigKey); 17] = [
    ("Beam", ConfigKey::Beam),
    ("Energy", ConfigKey::Energy),
    ("Detector angle", ConfigKey::DetectorAngle),
    ("Target angle", ConfigKey::TargetAngle),
    ("Toflen", ConfigKey::Toflen),
    ("Carbon foil thickness", ConfigKey::CarbonFoilThickness),
    ("Target density", ConfigKey::TargetDensity),
    ("TOF calibration", ConfigKey::TofCalibration),
    ("Angle calibration", ConfigKey::AngleCalibration),
    ("Number of depth steps", ConfigKey::DepthSteps),
    ("Depth step for stopping", ConfigKey::DepthStepStopping),
    ("Depth step for output", ConfigKey::DepthStepOutput),
    ("Depths for concentration scaling", ConfigKey::DepthsConcentrationScaling),
    ("Cross section", ConfigKey::CrossSection),
    ("Number of iterations", ConfigKey::Iterations),
    ("Efficiency directory", ConfigKey::EfficiencyDirectory),
    ("Stopping table", ConfigKey::StoppingTable),
];

impl ConfigKey {
    pub fn from_header(header: &str) -> Option<Self> {
        CONFIG_KEYS
            .iter()
            .find(|(name, _)| *name == header)
            .map(|(_, key)| *key)
    }

    pub fn as_str(&self) -> &'static str {
        CONFIG_KEYS
            .iter()
            .find(|(_, key)| key == self)
            .map(|(name, _)| *name)
            .unwrap_or("")
    }
}

/// One `key: value` line of a header block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLine<'a> {
    pub key: &'a str,
    pub value: Option<&'a str>,
}

/// Split a header line at the first separator, stripping leading spaces of the value.
///
/// The value is None if there is no separator at all.
pub fn split_header_line(line: &str) -> HeaderLine<'_> {
    match line.split_once(HEADER_SEPARATOR) {
        Some((key, value)) => HeaderLine {
            key,
            value: Some(value.trim_start_matches(' ')),
        },
        None => HeaderLine {
            key: line,
            value: None,
        },
    }
}

/// What a raw line of a header block is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Comment,
    End,
    Content,
}

pub fn classify_line(raw: &str) -> LineKind {
    if raw.starts_with(COMMENT_MARKER) {
        LineKind::Comment
    } else if raw.starts_with('\n') || raw.starts_with('\r') || raw.is_empty() {
        LineKind::End
    } else {
        LineKind::Content
    }
}

/// Parse two whitespace separated numbers (slope offset)
fn parse_calibration(value: &str) -> Option<(f64, f64)> {
    let mut parts = value.split_whitespace();
    let slope = parts.next()?.parse::<f64>().ok()?;
    let offset = parts.next()?.parse::<f64>().ok()?;
    Some((slope, offset))
}

/// Parse the leading float of a value, returning it and whether trailing text was found
pub fn parse_float_prefix(value: &str) -> Option<(f64, bool)> {
    let trimmed = value.trim();
    if let Ok(v) = trimmed.parse::<f64>() {
        return Some((v, false));
    }
    // Walk back from the longest candidate until something parses
    let mut end = trimmed.len();
    while end > 0 {
        if trimmed.is_char_boundary(end) {
            if let Ok(v) = trimmed[..end].trim_end().parse::<f64>() {
                return Some((v, true));
            }
        }
        end -= 1;
    }
    None
}

/// The time-of-flight spectrometer configuration used to convert cutfiles.
///
/// Loaded once from a `key: value` file and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionConfig {
    /// Flight path length in meters
    pub toflen: f64,
    /// Seconds per ToF channel
    pub tof_slope: f64,
    /// Seconds
    pub tof_offset: f64,
    pub angle_slope: f64,
    pub angle_offset: f64,
    /// Carbon foil areal thickness in ug/cm^2, as written in the file
    pub foil_thickness: f64,
    pub efficiency_directory: Option<PathBuf>,
    pub stopping_table: Option<PathBuf>,
}

impl Default for ConversionConfig {
    /// All numbers zero, no optional paths
    fn default() -> Self {
        Self {
            toflen: 0.0,
            tof_slope: 0.0,
            tof_offset: 0.0,
            angle_slope: 0.0,
            angle_offset: 0.0,
            foil_thickness: 0.0,
            efficiency_directory: None,
            stopping_table: None,
        }
    }
}

impl ConversionConfig {
    /// Read the configuration from a file
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }
        let file = File::open(config_path)?;
        Self::from_reader(BufReader::new(file), config_path)
    }

    /// Read the configuration from any buffered source. `source` is only used in diagnostics.
    pub fn from_reader<R: BufRead>(mut reader: R, source: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut raw = String::new();
        let mut lineno = 0;
        loop {
            raw.clear();
            if reader.read_line(&mut raw)? == 0 {
                break;
            }
            lineno += 1;
            match classify_line(&raw) {
                LineKind::Comment => continue,
                LineKind::End => break,
                LineKind::Content => (),
            }
            let line = raw.trim_end_matches(['\r', '\n']);
            let header = split_header_line(line);
            config.apply(header.key, header.value.unwrap_or(""), lineno, source)?;
        }
        log::info!("Read {} lines from {}.", lineno, source.to_string_lossy());
        Ok(config)
    }

    fn apply(
        &mut self,
        key: &str,
        value: &str,
        lineno: usize,
        source: &Path,
    ) -> Result<(), ConfigError> {
        let calibration_error = |key: ConfigKey| ConfigError::Calibration {
            file: source.to_path_buf(),
            line: lineno,
            key: key.as_str().to_string(),
            value: value.to_string(),
        };
        match ConfigKey::from_header(key) {
            Some(ConfigKey::Toflen) => {
                self.toflen = Self::parse_number_or_zero(key, value, lineno);
            }
            Some(ConfigKey::CarbonFoilThickness) => {
                self.foil_thickness = Self::parse_number_or_zero(key, value, lineno);
            }
            Some(ConfigKey::TofCalibration) => {
                let (slope, offset) = parse_calibration(value)
                    .ok_or_else(|| calibration_error(ConfigKey::TofCalibration))?;
                self.tof_slope = slope;
                self.tof_offset = offset;
            }
            Some(ConfigKey::AngleCalibration) => {
                let (slope, offset) = parse_calibration(value)
                    .ok_or_else(|| calibration_error(ConfigKey::AngleCalibration))?;
                self.angle_slope = slope;
                self.angle_offset = offset;
            }
            Some(ConfigKey::EfficiencyDirectory) => {
                self.efficiency_directory = Self::parse_path(value);
            }
            Some(ConfigKey::StoppingTable) => {
                self.stopping_table = Self::parse_path(value);
            }
            Some(_) => (), // Shared with the analysis configuration, nothing to do here
            None => log::warn!("Config line {lineno}: unknown header \"{key}\", ignoring it."),
        }
        Ok(())
    }

    fn parse_number_or_zero(key: &str, value: &str, lineno: usize) -> f64 {
        match parse_float_prefix(value) {
            Some((v, false)) => v,
            Some((v, true)) => {
                log::warn!("Config line {lineno}: {key} has trailing text after {v}.");
                v
            }
            None => {
                log::warn!("Config line {lineno}: {key} could not be parsed from \"{value}\", using 0.");
                0.0
            }
        }
    }

    fn parse_path(value: &str) -> Option<PathBuf> {
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(PathBuf::from(value))
        }
    }

    /// Foil thickness in thin film units (1e15 atoms/cm^2)
    pub fn foil_thickness_tfu(&self) -> f64 {
        self.foil_thickness * 1.0e-6 / (CARBON_MASS_U * ATOMIC_MASS_UNIT_G) / TFU_ATOMS_PER_CM2
    }

    /// Convert an angle channel to an angle with the angle calibration
    pub fn angle_from_channel(&self, channel: i32) -> f64 {
        self.angle_slope * channel as f64 + self.angle_offset
    }

    /// Render a template configuration file
    pub fn template() -> String {
        [
            "# tofe_list configuration. Lines starting with # are comments.",
            "# The configuration ends at the first empty line.",
            "Toflen: 0.623",
            "# seconds per channel, seconds",
            "TOF calibration: 1.0e-10 0.0",
            "Angle calibration: 1.0 0.0",
            "# ug/cm^2",
            "Carbon foil thickness: 3.0",
            "# Efficiency directory: /path/to/efficiency/files",
            "# Stopping table: /path/to/stopping.dat",
            "",
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn load(text: &str) -> Result<ConversionConfig, ConfigError> {
        ConversionConfig::from_reader(Cursor::new(text), Path::new("test.cfg"))
    }

    #[test]
    fn test_full_config() {
        let config = load(
            "# comment\nToflen: 0.5\nTOF calibration: 1e-9 2e-9\nAngle calibration: 0.5 -1\n\
             Carbon foil thickness: 3.0\nEfficiency directory: /tmp/eff\nBeam: 35Cl\n",
        )
        .unwrap();
        assert_eq!(config.toflen, 0.5);
        assert_eq!(config.tof_slope, 1e-9);
        assert_eq!(config.tof_offset, 2e-9);
        assert_eq!(config.angle_slope, 0.5);
        assert_eq!(config.angle_offset, -1.0);
        assert_eq!(config.foil_thickness, 3.0);
        assert_eq!(config.efficiency_directory, Some(PathBuf::from("/tmp/eff")));
        assert_eq!(config.stopping_table, None);
    }

    #[test]
    fn test_blank_line_ends_config() {
        let config = load("Toflen: 0.5\n\nToflen: 0.7\n").unwrap();
        assert_eq!(config.toflen, 0.5);
    }

    #[test]
    fn test_bad_calibration_names_line() {
        match load("Toflen: 0.5\n# c\nTOF calibration: 1e-9\n") {
            Err(ConfigError::Calibration { line, key, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(key, "TOF calibration");
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(load("Angle calibration: one two\n").is_err());
    }

    #[test]
    fn test_unknown_and_malformed_keys_continue() {
        let config = load("Bogus key: 12\nToflen: abc\nCarbon foil thickness: 2.5ug\n").unwrap();
        assert_eq!(config.toflen, 0.0);
        assert_eq!(config.foil_thickness, 2.5);
    }

    #[test]
    fn test_template_round_trip() {
        let config = load(&ConversionConfig::template()).unwrap();
        assert_eq!(config.toflen, 0.623);
        assert_eq!(config.tof_slope, 1.0e-10);
    }

    #[test]
    fn test_foil_thickness_tfu() {
        let config = ConversionConfig {
            foil_thickness: 12.011,
            ..Default::default()
        };
        // 12.011 ug/cm^2 of carbon is 1e-6 mol/cm^2
        let expected = 6.022_140_76e17 / TFU_ATOMS_PER_CM2;
        assert!((config.foil_thickness_tfu() - expected).abs() / expected < 1e-6);
    }

    #[test]
    fn test_float_prefix() {
        assert_eq!(parse_float_prefix("1.5"), Some((1.5, false)));
        assert_eq!(parse_float_prefix("1.5abc"), Some((1.5, true)));
        assert_eq!(parse_float_prefix("abc"), None);
    }

    #[test]
    fn test_missing_file() {
        let result = ConversionConfig::read_config_file(Path::new("/nonexistent/tofe.cfg"));
        assert!(matches!(result, Err(ConfigError::BadFilePath(_))));
    }
}
