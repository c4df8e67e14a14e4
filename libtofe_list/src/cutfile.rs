use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::config::{classify_line, parse_float_prefix, split_header_line, LineKind};
use super::constants::DEFAULT_WEIGHT_FACTOR;
use super::efficiency::EfficiencyTable;
use super::element::{ElementDatabase, Nuclide};
use super::error::{ElementError, FilenameError, HeaderError, ProcessorError};

/// The reaction a cutfile was cut for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScatterType {
    Erd,
    Rbs,
}

const SCATTER_TYPES: [(&str, ScatterType); 2] =
    [("ERD", ScatterType::Erd), ("RBS", ScatterType::Rbs)];

impl ScatterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Erd => SCATTER_TYPES[0].0,
            Self::Rbs => SCATTER_TYPES[1].0,
        }
    }
}

impl FromStr for ScatterType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SCATTER_TYPES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| s.to_string())
    }
}

impl Display for ScatterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything encoded in a cutfile name:
/// `<prefix>.<A><El>.<REACTION>[_<A><El>].<ordinal>.cut`
#[derive(Debug, Clone, PartialEq)]
pub struct FilenameMetadata {
    pub basename: String,
    pub scatter_type: ScatterType,
    /// The particle seen by the telescope
    pub incident: Nuclide,
    /// The scattering atom in the sample, RBS only
    pub sample: Option<Nuclide>,
}

impl FilenameMetadata {
    /// Parse the file name part of `path`
    pub fn from_path(path: &Path, db: &dyn ElementDatabase) -> Result<Self, FilenameError> {
        let basename = path
            .file_name()
            .ok_or_else(|| FilenameError::NoFileName(path.to_path_buf()))?
            .to_string_lossy();
        Self::parse(&basename, db)
    }

    pub fn parse(basename: &str, db: &dyn ElementDatabase) -> Result<Self, FilenameError> {
        let tokens: Vec<&str> = basename.split('.').filter(|t| !t.is_empty()).collect();
        if tokens.len() < 3 {
            return Err(FilenameError::TooFewTokens(basename.to_string()));
        }
        let bad_nuclide = |source: ElementError| FilenameError::BadNuclide {
            name: basename.to_string(),
            source,
        };
        let incident = Nuclide::parse(tokens[1], db).map_err(bad_nuclide)?;

        let (tag, sample_token) = match tokens[2].split_once('_') {
            Some((tag, sample)) => (tag, Some(sample)),
            None => (tokens[2], None),
        };
        let scatter_type =
            ScatterType::from_str(tag).map_err(|tag| FilenameError::UnknownReaction {
                name: basename.to_string(),
                tag,
            })?;
        let sample = match (scatter_type, sample_token) {
            (ScatterType::Rbs, Some(token)) => {
                Some(Nuclide::parse(token, db).map_err(bad_nuclide)?)
            }
            (ScatterType::Rbs, None) => {
                return Err(FilenameError::MissingSampleElement(basename.to_string()))
            }
            (ScatterType::Erd, Some(_)) => {
                return Err(FilenameError::UnexpectedSampleElement(basename.to_string()))
            }
            (ScatterType::Erd, None) => None,
        };

        Ok(Self {
            basename: basename.to_string(),
            scatter_type,
            incident,
            sample,
        })
    }
}

/// Header keywords of a cutfile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKey {
    Type,
    Count,
    WeightFactor,
    Energy,
    DetectorAngle,
    ScatterElement,
    ElementLosses,
    SplitCount,
}

const HEADER_KEYS: [(&str, HeaderKey); 8] = [
    ("Type", HeaderKey::Type),
    ("Count", HeaderKey::Count),
    ("Weight Factor", HeaderKey::WeightFactor),
    ("Energy", HeaderKey::Energy),
    ("Detector Angle", HeaderKey::DetectorAngle),
    ("Scatter Element", HeaderKey::ScatterElement),
    ("Element losses", HeaderKey::ElementLosses),
    ("Split count", HeaderKey::SplitCount),
];

impl HeaderKey {
    pub fn from_header(header: &str) -> Option<Self> {
        HEADER_KEYS
            .iter()
            .find(|(name, _)| *name == header)
            .map(|(_, key)| *key)
    }
}

/// The header block of a cutfile
#[derive(Debug, Clone, PartialEq)]
pub struct CutfileHeader {
    /// Declared type and the line it was declared on
    pub scatter_type: Option<(ScatterType, usize)>,
    pub count: u64,
    pub weight_factor: f64,
    /// Lines read up to and including the empty line ending the header
    pub header_lines: usize,
}

impl Default for CutfileHeader {
    fn default() -> Self {
        Self {
            scatter_type: None,
            count: 0,
            weight_factor: DEFAULT_WEIGHT_FACTOR,
            header_lines: 0,
        }
    }
}

impl CutfileHeader {
    pub fn read(path: &Path) -> Result<Self, HeaderError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), path)
    }

    pub fn from_reader<R: BufRead>(mut reader: R, source: &Path) -> Result<Self, HeaderError> {
        let mut header = Self::default();
        let mut raw = String::new();
        loop {
            raw.clear();
            if reader.read_line(&mut raw)? == 0 {
                break;
            }
            header.header_lines += 1;
            let lineno = header.header_lines;
            match classify_line(&raw) {
                LineKind::Comment => continue,
                LineKind::End => break,
                LineKind::Content => (),
            }
            let line = raw.trim_end_matches(['\r', '\n']);
            let parsed = split_header_line(line);
            let Some(value) = parsed.value else {
                return Err(HeaderError::MissingSeparator {
                    file: source.to_path_buf(),
                    line: lineno,
                    text: line.to_string(),
                });
            };
            if value.is_empty() {
                log::warn!(
                    "Cutfile {} line {}: \"{}\", argument is empty.",
                    source.to_string_lossy(),
                    lineno,
                    line
                );
                continue;
            }
            header.apply(parsed.key, value, lineno, source)?;
        }
        Ok(header)
    }

    fn apply(
        &mut self,
        key: &str,
        value: &str,
        lineno: usize,
        source: &Path,
    ) -> Result<(), HeaderError> {
        match HeaderKey::from_header(key) {
            Some(HeaderKey::Type) => {
                let kind = ScatterType::from_str(value.trim()).map_err(|value| {
                    HeaderError::UnknownType {
                        file: source.to_path_buf(),
                        line: lineno,
                        value,
                    }
                })?;
                self.scatter_type = Some((kind, lineno));
            }
            Some(HeaderKey::Count) => {
                self.count = value.trim().parse::<u64>().unwrap_or_else(|_| {
                    log::warn!(
                        "Cutfile {} line {}: count \"{}\" is not a number, using 0.",
                        source.to_string_lossy(),
                        lineno,
                        value
                    );
                    0
                });
            }
            Some(HeaderKey::WeightFactor) => match parse_float_prefix(value) {
                Some((weight, trailing)) => {
                    if trailing {
                        log::warn!(
                            "Cutfile {} line {}: trailing characters after weight factor {}.",
                            source.to_string_lossy(),
                            lineno,
                            weight
                        );
                    }
                    self.weight_factor = weight;
                }
                None => log::warn!(
                    "Cutfile {} line {}: weight factor \"{}\" is not a number, using {}.",
                    source.to_string_lossy(),
                    lineno,
                    value,
                    self.weight_factor
                ),
            },
            // Written by the cut tools but not needed for the conversion
            Some(HeaderKey::Energy)
            | Some(HeaderKey::DetectorAngle)
            | Some(HeaderKey::ScatterElement)
            | Some(HeaderKey::ElementLosses)
            | Some(HeaderKey::SplitCount) => (),
            None => log::warn!(
                "Cutfile {} line {}: unknown header \"{}\", ignoring it.",
                source.to_string_lossy(),
                lineno,
                key
            ),
        }
        Ok(())
    }

    /// Check the header against what the file name says
    pub fn validate(&self, metadata: &FilenameMetadata, source: &Path) -> Result<(), HeaderError> {
        if let Some((declared, line)) = self.scatter_type {
            if declared != metadata.scatter_type {
                return Err(HeaderError::TypeMismatch {
                    file: source.to_path_buf(),
                    line,
                    header: declared.to_string(),
                    filename: metadata.scatter_type.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A cutfile ready for conversion: validated name and header metadata plus the
/// efficiency table of its incident element, if any.
#[derive(Debug, Clone)]
pub struct CutfileDescriptor {
    pub path: PathBuf,
    pub metadata: FilenameMetadata,
    pub count: u64,
    pub weight_factor: f64,
    pub header_lines: usize,
    pub efficiency: Option<EfficiencyTable>,
}

impl CutfileDescriptor {
    /// Parse the file name, read the header, cross check the two and look for an efficiency file
    pub fn new(
        path: &Path,
        db: &dyn ElementDatabase,
        efficiency_directory: Option<&Path>,
    ) -> Result<Self, ProcessorError> {
        let metadata = FilenameMetadata::from_path(path, db)?;
        let header = CutfileHeader::read(path)?;
        header.validate(&metadata, path)?;
        let efficiency = match efficiency_directory {
            Some(dir) => EfficiencyTable::find(dir, metadata.incident.element.symbol)?,
            None => None,
        };
        Ok(Self {
            path: path.to_path_buf(),
            metadata,
            count: header.count,
            weight_factor: header.weight_factor,
            header_lines: header.header_lines,
            efficiency,
        })
    }

    pub fn basename(&self) -> &str {
        &self.metadata.basename
    }

    pub fn scatter_type(&self) -> ScatterType {
        self.metadata.scatter_type
    }

    /// The nuclide reported in the output: the recoil for ERD, the scatterer for RBS
    pub fn output_nuclide(&self) -> &Nuclide {
        match &self.metadata.sample {
            Some(sample) => sample,
            None => &self.metadata.incident,
        }
    }
}
