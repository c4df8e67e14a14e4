//! Energy loss in the timing foil.
//!
//! The stopping model itself is treated as an external collaborator: the conversion only
//! needs the electronic and nuclear stopping cross sections of a projectile in each foil
//! element. Stopping cross sections are in eV/(1e15 atoms/cm^2), energies in keV.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use fxhash::FxHashMap;

use super::constants::{COMMENT_MARKER, FOIL_ELEMENT};
use super::element::{Element, ElementDatabase};
use super::error::StoppingError;
use super::interpolate::{interpolate_sorted, Lookup};

pub trait StoppingModel {
    /// Electronic stopping of projectile `z1` in target `z2` at `energy_per_mass` keV/u
    fn electronic(&self, z1: u32, z2: u32, energy_per_mass: f64) -> f64;

    /// Nuclear stopping of projectile (`z1`, `m1`) in target (`z2`, `m2`) at `energy` keV
    fn nuclear(&self, z1: u32, m1: f64, z2: u32, m2: f64, energy: f64) -> f64 {
        universal_nuclear_stopping(z1, m1, z2, m2, energy)
    }
}

/// ZBL universal nuclear stopping, evaluated in closed form
pub fn universal_nuclear_stopping(z1: u32, m1: f64, z2: u32, m2: f64, energy: f64) -> f64 {
    if energy <= 0.0 || z1 == 0 || z2 == 0 {
        return 0.0;
    }
    let (z1, z2) = (z1 as f64, z2 as f64);
    let screening = z1.powf(0.23) + z2.powf(0.23);
    let reduced = 32.53 * m2 * energy / (z1 * z2 * (m1 + m2) * screening);
    let reduced_stopping = if reduced <= 30.0 {
        (1.0 + 1.1383 * reduced).ln()
            / (2.0 * (reduced + 0.01321 * reduced.powf(0.21226) + 0.19593 * reduced.sqrt()))
    } else {
        reduced.ln() / (2.0 * reduced)
    };
    8.462 * z1 * z2 * m1 * reduced_stopping / ((m1 + m2) * screening)
}

/// Lindhard-Scharff velocity proportional electronic stopping.
///
/// Only valid below roughly 25 keV/u times Z1^(4/3), which covers the recoils
/// usually passing a timing foil.
#[derive(Debug, Clone, Default)]
pub struct LssElectronicStopping;

impl StoppingModel for LssElectronicStopping {
    fn electronic(&self, z1: u32, z2: u32, energy_per_mass: f64) -> f64 {
        if energy_per_mass <= 0.0 || z1 == 0 || z2 == 0 {
            return 0.0;
        }
        let (z1, z2) = (z1 as f64, z2 as f64);
        1.212 * z1.powf(7.0 / 6.0) * z2 / (z1.powf(2.0 / 3.0) + z2.powf(2.0 / 3.0)).powf(1.5)
            * energy_per_mass.sqrt()
    }
}

/// Electronic stopping interpolated from a preloaded table.
///
/// The table file has lines of `Z1 Z2 energy_per_mass stopping`; for each (Z1, Z2) pair
/// the energies must be strictly increasing.
#[derive(Debug, Clone, Default)]
pub struct TabulatedElectronicStopping {
    tables: FxHashMap<(u32, u32), Vec<(f64, f64)>>,
}

impl TabulatedElectronicStopping {
    pub fn new(path: &Path) -> Result<Self, StoppingError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), path)
    }

    pub fn from_reader<R: BufRead>(reader: R, source: &Path) -> Result<Self, StoppingError> {
        let mut tables: FxHashMap<(u32, u32), Vec<(f64, f64)>> = FxHashMap::default();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let text = line.trim();
            if text.is_empty() || text.starts_with(COMMENT_MARKER) {
                continue;
            }
            let bad_line = || StoppingError::BadLine {
                file: source.to_path_buf(),
                line: idx + 1,
                text: text.to_string(),
            };
            let parts: Vec<&str> = text.split_whitespace().collect();
            if parts.len() != 4 {
                return Err(bad_line());
            }
            let z1 = parts[0].parse::<u32>().map_err(|_| bad_line())?;
            let z2 = parts[1].parse::<u32>().map_err(|_| bad_line())?;
            let energy = parts[2].parse::<f64>().map_err(|_| bad_line())?;
            let stopping = parts[3].parse::<f64>().map_err(|_| bad_line())?;
            let points = tables.entry((z1, z2)).or_default();
            if let Some((previous, _)) = points.last() {
                if energy <= *previous {
                    return Err(StoppingError::Unsorted {
                        file: source.to_path_buf(),
                        z1,
                        z2,
                    });
                }
            }
            points.push((energy, stopping));
        }
        log::info!(
            "Loaded stopping table {} with {} projectile/target pairs.",
            source.to_string_lossy(),
            tables.len()
        );
        Ok(Self { tables })
    }
}

impl StoppingModel for TabulatedElectronicStopping {
    fn electronic(&self, z1: u32, z2: u32, energy_per_mass: f64) -> f64 {
        let Some(points) = self.tables.get(&(z1, z2)) else {
            log::warn!("No stopping data for Z1={z1} in Z2={z2}, assuming no electronic stopping.");
            return 0.0;
        };
        match interpolate_sorted(points, energy_per_mass) {
            Lookup::Value(s) => s,
            Lookup::OutOfRange { min, max } => {
                log::warn!(
                    "Energy {energy_per_mass} keV/u is outside the stopping table range [{min}, {max}] for Z1={z1} in Z2={z2}."
                );
                0.0
            }
        }
    }
}

/// A foil element and its atomic fraction
#[derive(Debug, Clone)]
pub struct FoilComponent {
    pub element: Element,
    pub fraction: f64,
}

/// The timing foil: composition and areal density
#[derive(Debug, Clone)]
pub struct Foil {
    pub components: Vec<FoilComponent>,
    /// 1e15 atoms/cm^2
    pub thickness_tfu: f64,
}

impl Foil {
    /// A pure carbon foil of the given thickness
    pub fn carbon(db: &dyn ElementDatabase, thickness_tfu: f64) -> Result<Self, StoppingError> {
        let carbon = db
            .element(FOIL_ELEMENT)
            .ok_or_else(|| StoppingError::UnknownFoilElement(FOIL_ELEMENT.to_string()))?
            .clone();
        Ok(Self {
            components: vec![FoilComponent {
                element: carbon,
                fraction: 1.0,
            }],
            thickness_tfu,
        })
    }

    /// Stopping cross section of the foil (eV/tfu), summed over the components
    pub fn stopping(&self, model: &dyn StoppingModel, z1: u32, m1: f64, energy: f64) -> f64 {
        if m1 <= 0.0 {
            return 0.0;
        }
        self.components
            .iter()
            .map(|c| {
                let z2 = c.element.z;
                let m2 = c.element.average_mass;
                c.fraction
                    * (model.electronic(z1, z2, energy / m1) + model.nuclear(z1, m1, z2, m2, energy))
            })
            .sum()
    }

    /// Energy (keV) lost crossing the foil, using the stopping at the detected energy.
    ///
    /// This is a single step estimate and does not integrate along the path.
    pub fn energy_loss(&self, model: &dyn StoppingModel, z1: u32, m1: f64, energy: f64) -> f64 {
        if self.thickness_tfu <= 0.0 || energy <= 0.0 {
            return 0.0;
        }
        self.stopping(model, z1, m1, energy) * self.thickness_tfu / 1.0e3
    }
}
