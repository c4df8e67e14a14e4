use std::path::PathBuf;
use thiserror::Error;

use super::constants::MAX_MASS_NUMBER;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config {file:?} line {line}: {key} could not be parsed from \"{value}\"; expected two numbers (slope offset)")]
    Calibration {
        file: PathBuf,
        line: usize,
        key: String,
        value: String,
    },
}

#[derive(Debug, Clone, Error)]
pub enum ElementError {
    #[error("Element \"{0}\" was not found in the element database")]
    UnknownElement(String),
    #[error("Mass number {0} is out of range; expected 0 to {max}", max=MAX_MASS_NUMBER)]
    MassNumberOutOfRange(u64),
    #[error("No element symbol found in nuclide \"{0}\"")]
    MissingSymbol(String),
}

#[derive(Debug, Error)]
pub enum FilenameError {
    #[error("Cutfile name \"{0}\" has too few dot separated parts; expected <prefix>.<nuclide>.<reaction>...")]
    TooFewTokens(String),
    #[error("Cutfile name \"{name}\" has a bad nuclide: {source}")]
    BadNuclide {
        name: String,
        #[source]
        source: ElementError,
    },
    #[error("Cutfile name \"{name}\" has unknown reaction type \"{tag}\"")]
    UnknownReaction { name: String, tag: String },
    #[error("Cutfile name \"{0}\" is RBS but does not name the scattering element (e.g. RBS_28Si)")]
    MissingSampleElement(String),
    #[error("Cutfile name \"{0}\" has a sample element but is not RBS")]
    UnexpectedSampleElement(String),
    #[error("Cutfile path {0:?} has no file name")]
    NoFileName(PathBuf),
}

#[derive(Debug, Error)]
pub enum HeaderError {
    #[error("Cutfile header failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Cutfile {file:?} line {line}: \"{text}\" has no separator ':'")]
    MissingSeparator {
        file: PathBuf,
        line: usize,
        text: String,
    },
    #[error("Cutfile {file:?} line {line}: unknown reaction type \"{value}\"")]
    UnknownType {
        file: PathBuf,
        line: usize,
        value: String,
    },
    #[error("Cutfile {file:?} line {line}: header type {header} does not match type {filename} given by the file name")]
    TypeMismatch {
        file: PathBuf,
        line: usize,
        header: String,
        filename: String,
    },
}

#[derive(Debug, Error)]
pub enum EfficiencyError {
    #[error("Efficiency file failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Efficiency file {file:?} line {line}: \"{text}\" is not a pair of numbers (energy efficiency)")]
    BadLine {
        file: PathBuf,
        line: usize,
        text: String,
    },
    #[error("Efficiency file {file:?} line {line}: energy {energy} is not larger than the previous energy {previous}")]
    Unsorted {
        file: PathBuf,
        line: usize,
        energy: f64,
        previous: f64,
    },
    #[error("Efficiency file {0:?} contains no points")]
    Empty(PathBuf),
}

#[derive(Debug, Error)]
pub enum StoppingError {
    #[error("Stopping table failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Stopping table {file:?} line {line}: \"{text}\" is not of the form Z1 Z2 energy_per_mass stopping")]
    BadLine {
        file: PathBuf,
        line: usize,
        text: String,
    },
    #[error("Stopping table {file:?}: energies for Z1={z1} Z2={z2} are not strictly increasing")]
    Unsorted { file: PathBuf, z1: u32, z2: u32 },
    #[error("Foil element \"{0}\" was not found in the element database")]
    UnknownFoilElement(String),
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Conversion failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Cutfile {file:?} line {line}: \"{text}\" is not an event (tof energy [angle] eventnumber)")]
    BadDataLine {
        file: PathBuf,
        line: usize,
        text: String,
    },
    #[error("Cutfile {file:?} ended inside its header; expected {expected} header lines")]
    TruncatedHeader { file: PathBuf, expected: usize },
    #[error("Cutfile {file:?} declares {declared} events but {converted} were converted")]
    CountMismatch {
        file: PathBuf,
        declared: u64,
        converted: u64,
    },
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to cutfile name error: {0}")]
    FilenameError(#[from] FilenameError),
    #[error("Processor failed due to cutfile header error: {0}")]
    HeaderError(#[from] HeaderError),
    #[error("Processor failed due to efficiency file error: {0}")]
    EfficiencyError(#[from] EfficiencyError),
    #[error("Processor failed due to stopping error: {0}")]
    StoppingError(#[from] StoppingError),
    #[error("Processor failed due to conversion error: {0}")]
    ConversionError(#[from] ConversionError),
    #[error("Processor failed to write the run summary: {0}")]
    SummaryError(#[from] serde_yaml::Error),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
