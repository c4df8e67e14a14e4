use std::fmt::Display;

use super::cutfile::ScatterType;

/// One data line of a cutfile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub tof: i32,
    /// Energy detector channel, not used by the conversion
    pub energy_channel: i32,
    pub angle_channel: Option<i32>,
    pub event_number: i64,
}

impl RawEvent {
    /// Parse `tof energy angle eventnumber` or, failing that, `tof energy eventnumber`
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [tof, energy, angle, event] => Some(Self {
                tof: tof.parse().ok()?,
                energy_channel: energy.parse().ok()?,
                angle_channel: Some(angle.parse().ok()?),
                event_number: event.parse().ok()?,
            }),
            [tof, energy, event] => Some(Self {
                tof: tof.parse().ok()?,
                energy_channel: energy.parse().ok()?,
                angle_channel: None,
                event_number: event.parse().ok()?,
            }),
            _ => None,
        }
    }
}

/// A converted event, one line of the output
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub angle1: f64,
    pub angle2: f64,
    /// keV
    pub energy: f64,
    pub z: u32,
    /// u
    pub mass: f64,
    pub scatter_type: ScatterType,
    pub weight: f64,
    pub event_number: i64,
}

impl Display for OutputRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:8.4} {:8.4} {:10.4} {:3} {:8.4} {} {:.6e} {}",
            self.angle1,
            self.angle2,
            self.energy,
            self.z,
            self.mass,
            self.scatter_type,
            self.weight,
            self.event_number
        )
    }
}
