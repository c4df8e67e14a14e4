//! # tofe_list
//!
//! tofe_list converts ToF-ERDA cutfiles into event lists for depth profiling, written
//! in Rust. A cutfile holds the events of one reaction (one recoiling or scattered
//! nuclide) selected from the raw time-of-flight listmode data. For every event,
//! tofe_list reconstructs the energy from the time-of-flight, corrects it for the
//! energy lost in the timing foil, applies the detector efficiency to the event
//! weight and writes one output line.
//!
//! ## Installation
//!
//! Install the CLI with `cargo install --path ./tofe_list_cli` from the top level of
//! the repository. The binary is called `tofe_list`.
//!
//! ## Configuration
//!
//! The configuration is a text file with one `key: value` pair per line. Lines starting
//! with `#` are comments and the first empty line ends the configuration. A template can
//! be made with `tofe_list -c tofe.cfg new`.
//!
//! ```text
//! Toflen: 0.623
//! TOF calibration: 1.0e-10 0.0
//! Angle calibration: 1.0 0.0
//! Carbon foil thickness: 3.0
//! Efficiency directory: /path/to/efficiency/files
//! Stopping table: /path/to/stopping.dat
//! ```
//!
//! - `Toflen`: length of the time-of-flight path in meters
//! - `TOF calibration`: slope (s/channel) and offset (s)
//! - `Angle calibration`: slope and offset of the angle channel
//! - `Carbon foil thickness`: foil thickness in ug/cm^2
//! - `Efficiency directory` (optional): directory of `<Element>.eff` files
//! - `Stopping table` (optional): tabulated electronic stopping, `Z1 Z2 keV/u eV/(1e15 at/cm^2)`
//!   per line. Without it the Lindhard-Scharff formula is used.
//!
//! The keywords of the analysis configuration (`Beam`, `Energy`, `Number of iterations`, ...)
//! are accepted and ignored, so the same file can be shared.
//!
//! ## Cutfiles
//!
//! Cutfile names follow `<prefix>.<A><Element>.<REACTION>[_<A><Element>].<n>.cut`, for example
//! `run1.16O.ERD.0.cut` or `run1.4He.RBS_28Si.0.cut`. RBS cutfiles must name the scattering
//! element of the sample, ERD cutfiles must not. The file starts with a header in the same
//! `key: value` format as the configuration (`Type`, `Count`, `Weight Factor`, ...), ended by
//! an empty line, followed by one event per line: `tof energy angle eventnumber` or
//! `tof energy eventnumber`.
//!
//! ## Output
//!
//! One line per event:
//!
//! ```text
//! angle1 angle2 energy(keV) Z mass(u) type weight eventnumber
//! ```
//!
//! When writing to a file, a YAML summary of the run is written next to it
//! (`<output stem>.summary.yml`).
pub mod config;
pub mod constants;
pub mod cutfile;
pub mod efficiency;
pub mod element;
pub mod energy;
pub mod error;
pub mod event;
pub mod interpolate;
pub mod process;
pub mod stopping;
pub mod summary;
