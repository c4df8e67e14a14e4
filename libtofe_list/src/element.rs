use std::fmt::Display;

use fxhash::FxHashMap;

use super::constants::MAX_MASS_NUMBER;
use super::error::ElementError;

/// A chemical element as seen by the conversion: atomic number, symbol and the
/// natural-abundance average mass (u).
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub z: u32,
    pub symbol: &'static str,
    pub average_mass: f64,
}

/// The narrow interface the conversion needs from an element/isotope database
pub trait ElementDatabase {
    /// Look up an element by its symbol (case sensitive, e.g. "He")
    fn element(&self, symbol: &str) -> Option<&Element>;

    /// Mass (u) of the isotope with mass number `a` of the element with atomic number `z`
    fn isotope_mass(&self, z: u32, a: u32) -> f64;
}

/// An element with an optional mass number. Without one it stands for the natural isotope mix.
#[derive(Debug, Clone, PartialEq)]
pub struct Nuclide {
    pub element: Element,
    pub mass_number: Option<u32>,
    /// u
    pub mass: f64,
}

impl Nuclide {
    /// Parse a nuclide specifier such as "4He", "Si" or "28Si" and resolve it in the database.
    ///
    /// The mass number must be in 0..=300. A mass number of 0 means the natural mix.
    pub fn parse(text: &str, db: &dyn ElementDatabase) -> Result<Self, ElementError> {
        let digits_end = text
            .char_indices()
            .find(|(_, c)| !c.is_ascii_digit())
            .map(|(idx, _)| idx)
            .unwrap_or(text.len());
        let (digits, symbol) = text.split_at(digits_end);
        if symbol.is_empty() {
            return Err(ElementError::MissingSymbol(text.to_string()));
        }
        let mass_number = if digits.is_empty() {
            None
        } else {
            // Anything too large for u64 is out of range anyway
            let a = digits.parse::<u64>().unwrap_or(u64::MAX);
            if a > MAX_MASS_NUMBER {
                return Err(ElementError::MassNumberOutOfRange(a));
            }
            Some(a as u32).filter(|a| *a > 0)
        };
        let element = db
            .element(symbol)
            .ok_or_else(|| ElementError::UnknownElement(symbol.to_string()))?
            .clone();
        let mass = match mass_number {
            Some(a) => db.isotope_mass(element.z, a),
            None => element.average_mass,
        };
        Ok(Self {
            element,
            mass_number,
            mass,
        })
    }

    pub fn z(&self) -> u32 {
        self.element.z
    }
}

impl Display for Nuclide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mass_number {
            Some(a) => write!(f, "{}{}", a, self.element.symbol),
            None => write!(f, "{}", self.element.symbol),
        }
    }
}

// (symbol, standard atomic weight)
const ELEMENTS: [(&str, f64); 92] = [
    ("H", 1.008),
    ("He", 4.002_602),
    ("Li", 6.94),
    ("Be", 9.012_183),
    ("B", 10.81),
    ("C", 12.011),
    ("N", 14.007),
    ("O", 15.999),
    ("F", 18.998_403),
    ("Ne", 20.1797),
    ("Na", 22.989_769),
    ("Mg", 24.305),
    ("Al", 26.981_538),
    ("Si", 28.085),
    ("P", 30.973_762),
    ("S", 32.06),
    ("Cl", 35.45),
    ("Ar", 39.948),
    ("K", 39.0983),
    ("Ca", 40.078),
    ("Sc", 44.955_908),
    ("Ti", 47.867),
    ("V", 50.9415),
    ("Cr", 51.9961),
    ("Mn", 54.938_043),
    ("Fe", 55.845),
    ("Co", 58.933_194),
    ("Ni", 58.6934),
    ("Cu", 63.546),
    ("Zn", 65.38),
    ("Ga", 69.723),
    ("Ge", 72.630),
    ("As", 74.921_595),
    ("Se", 78.971),
    ("Br", 79.904),
    ("Kr", 83.798),
    ("Rb", 85.4678),
    ("Sr", 87.62),
    ("Y", 88.905_84),
    ("Zr", 91.224),
    ("Nb", 92.906_37),
    ("Mo", 95.95),
    ("Tc", 97.0),
    ("Ru", 101.07),
    ("Rh", 102.905_49),
    ("Pd", 106.42),
    ("Ag", 107.8682),
    ("Cd", 112.414),
    ("In", 114.818),
    ("Sn", 118.710),
    ("Sb", 121.760),
    ("Te", 127.60),
    ("I", 126.904_47),
    ("Xe", 131.293),
    ("Cs", 132.905_452),
    ("Ba", 137.327),
    ("La", 138.905_47),
    ("Ce", 140.116),
    ("Pr", 140.907_66),
    ("Nd", 144.242),
    ("Pm", 145.0),
    ("Sm", 150.36),
    ("Eu", 151.964),
    ("Gd", 157.25),
    ("Tb", 158.925_35),
    ("Dy", 162.500),
    ("Ho", 164.930_33),
    ("Er", 167.259),
    ("Tm", 168.934_22),
    ("Yb", 173.045),
    ("Lu", 174.9668),
    ("Hf", 178.49),
    ("Ta", 180.947_88),
    ("W", 183.84),
    ("Re", 186.207),
    ("Os", 190.23),
    ("Ir", 192.217),
    ("Pt", 195.084),
    ("Au", 196.966_570),
    ("Hg", 200.592),
    ("Tl", 204.38),
    ("Pb", 207.2),
    ("Bi", 208.980_40),
    ("Po", 209.0),
    ("At", 210.0),
    ("Rn", 222.0),
    ("Fr", 223.0),
    ("Ra", 226.0),
    ("Ac", 227.0),
    ("Th", 232.0377),
    ("Pa", 231.035_88),
    ("U", 238.028_91),
];

// (Z, A, mass in u) for the nuclides usually met in ToF-ERDA
const ISOTOPES: [(u32, u32, f64); 24] = [
    (1, 1, 1.007_825_032),
    (1, 2, 2.014_101_778),
    (1, 3, 3.016_049_281),
    (2, 3, 3.016_029_320),
    (2, 4, 4.002_603_254),
    (3, 6, 6.015_122_887),
    (3, 7, 7.016_003_437),
    (5, 10, 10.012_936_95),
    (5, 11, 11.009_305_36),
    (6, 12, 12.0),
    (6, 13, 13.003_354_835),
    (7, 14, 14.003_074_004),
    (7, 15, 15.000_108_899),
    (8, 16, 15.994_914_620),
    (8, 18, 17.999_159_613),
    (9, 19, 18.998_403_163),
    (11, 23, 22.989_769_28),
    (13, 27, 26.981_538_41),
    (14, 28, 27.976_926_535),
    (17, 35, 34.968_852_69),
    (17, 37, 36.965_902_58),
    (35, 79, 78.918_337_6),
    (53, 127, 126.904_471_9),
    (79, 197, 196.966_570_1),
];

/// Built-in element table with exact masses for the common nuclides.
///
/// Isotopes outside the built-in list use their mass number as the mass.
#[derive(Debug, Clone)]
pub struct ElementTable {
    elements: Vec<Element>,
    by_symbol: FxHashMap<&'static str, usize>,
    isotopes: FxHashMap<(u32, u32), f64>,
}

impl Default for ElementTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementTable {
    pub fn new() -> Self {
        let elements: Vec<Element> = ELEMENTS
            .iter()
            .enumerate()
            .map(|(idx, (symbol, mass))| Element {
                z: idx as u32 + 1,
                symbol: *symbol,
                average_mass: *mass,
            })
            .collect();
        let by_symbol = elements
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.symbol, idx))
            .collect();
        let isotopes = ISOTOPES.iter().map(|(z, a, m)| ((*z, *a), *m)).collect();
        Self {
            elements,
            by_symbol,
            isotopes,
        }
    }

    pub fn element_by_z(&self, z: u32) -> Option<&Element> {
        if z == 0 {
            return None;
        }
        self.elements.get(z as usize - 1)
    }
}

impl ElementDatabase for ElementTable {
    fn element(&self, symbol: &str) -> Option<&Element> {
        self.by_symbol.get(symbol).map(|idx| &self.elements[*idx])
    }

    fn isotope_mass(&self, z: u32, a: u32) -> f64 {
        match self.isotopes.get(&(z, a)) {
            Some(m) => *m,
            None => a as f64,
        }
    }
}
