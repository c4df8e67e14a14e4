// Physical constants (CODATA 2018)
pub const ATOMIC_MASS_UNIT_KG: f64 = 1.660_539_066_60e-27;
pub const ELEMENTARY_CHARGE: f64 = 1.602_176_634e-19;
pub const KEV_IN_JOULES: f64 = 1.0e3 * ELEMENTARY_CHARGE;
pub const ATOMIC_MASS_UNIT_G: f64 = ATOMIC_MASS_UNIT_KG * 1.0e3;
/// Atoms per cm^2 in one thin film unit (tfu)
pub const TFU_ATOMS_PER_CM2: f64 = 1.0e15;

// Cutfile conventions
pub const MAX_MASS_NUMBER: u64 = 300;
pub const HEADER_SEPARATOR: char = ':';
pub const COMMENT_MARKER: char = '#';
pub const LEGACY_TITLE_LINE: &str = "ToF, Energy, Event number";
pub const DEFAULT_WEIGHT_FACTOR: f64 = 1.0;
pub const EFFICIENCY_FILE_SUFFIX: &str = ".eff";

// Conversion limits
/// Flight times below this (in seconds) are not physical and give zero energy
pub const MIN_TOF_SECONDS: f64 = 1.0e-9;
/// Efficiencies below this are treated as unusable rather than as a huge weight
pub const MIN_EFFICIENCY: f64 = 1.0e-6;

/// Foil material used for the energy loss correction
pub const FOIL_ELEMENT: &str = "C";
