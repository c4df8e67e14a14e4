use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use rand::Rng;

use super::config::ConversionConfig;
use super::constants::{LEGACY_TITLE_LINE, MIN_EFFICIENCY};
use super::cutfile::CutfileDescriptor;
use super::element::ElementDatabase;
use super::energy::EnergyReconstructor;
use super::error::{ConversionError, ProcessorError};
use super::event::{OutputRecord, RawEvent};
use super::stopping::{Foil, LssElectronicStopping, StoppingModel, TabulatedElectronicStopping};
use super::summary::{FileStatus, FileSummary, RunSummary};

/// The events of one cutfile, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedCutfile {
    pub records: Vec<OutputRecord>,
    /// Events given zero weight by the efficiency correction
    pub zero_weight_events: u64,
}

/// Converts cutfiles with one configuration, element database and stopping model.
pub struct Processor<'a> {
    config: &'a ConversionConfig,
    db: &'a dyn ElementDatabase,
    stopping: Box<dyn StoppingModel>,
    foil: Foil,
}

impl<'a> Processor<'a> {
    /// Create a processor. Uses the configured stopping table for electronic stopping
    /// if there is one, the LSS formula otherwise.
    pub fn new(
        config: &'a ConversionConfig,
        db: &'a dyn ElementDatabase,
    ) -> Result<Self, ProcessorError> {
        let stopping: Box<dyn StoppingModel> = match &config.stopping_table {
            Some(path) => Box::new(TabulatedElectronicStopping::new(path)?),
            None => Box::new(LssElectronicStopping),
        };
        Self::with_stopping(config, db, stopping)
    }

    pub fn with_stopping(
        config: &'a ConversionConfig,
        db: &'a dyn ElementDatabase,
        stopping: Box<dyn StoppingModel>,
    ) -> Result<Self, ProcessorError> {
        let foil = Foil::carbon(db, config.foil_thickness_tfu())?;
        Ok(Self {
            config,
            db,
            stopping,
            foil,
        })
    }

    /// Parse and cross check the name and header of a cutfile
    pub fn load_cutfile(&self, path: &Path) -> Result<CutfileDescriptor, ProcessorError> {
        CutfileDescriptor::new(path, self.db, self.config.efficiency_directory.as_deref())
    }

    /// Event weight after the efficiency correction.
    ///
    /// `None` when the energy is outside the efficiency table or the efficiency is
    /// below `MIN_EFFICIENCY`; such events get zero weight.
    fn corrected_weight(&self, cutfile: &CutfileDescriptor, energy: f64) -> Option<f64> {
        let Some(table) = &cutfile.efficiency else {
            return Some(cutfile.weight_factor);
        };
        match table.lookup(energy) {
            Some(efficiency) if efficiency >= MIN_EFFICIENCY => {
                Some(cutfile.weight_factor / efficiency)
            }
            _ => None,
        }
    }

    /// Convert every event of a cutfile.
    ///
    /// Nothing is returned unless the number of converted events matches the count
    /// declared in the header.
    pub fn convert_cutfile<R: Rng>(
        &self,
        cutfile: &CutfileDescriptor,
        rng: &mut R,
    ) -> Result<ConvertedCutfile, ConversionError> {
        let file = File::open(&cutfile.path)?;
        let mut lines = BufReader::new(file).lines();
        for _ in 0..cutfile.header_lines {
            if lines.next().transpose()?.is_none() {
                return Err(ConversionError::TruncatedHeader {
                    file: cutfile.path.clone(),
                    expected: cutfile.header_lines,
                });
            }
        }

        let reconstructor = EnergyReconstructor::new(self.config, &self.foil, self.stopping.as_ref());
        let incident = &cutfile.metadata.incident;
        let output = cutfile.output_nuclide();
        // The declared count is only checked afterwards, it must not size the buffer
        let mut records: Vec<OutputRecord> = Vec::new();
        let mut zero_weight_events: u64 = 0;
        for (idx, line) in lines.enumerate() {
            let line = line?;
            let text = line.trim();
            if idx == 0 && text == LEGACY_TITLE_LINE {
                continue;
            }
            if text.is_empty() {
                log::warn!(
                    "{} line {}: empty data line skipped.",
                    cutfile.basename(),
                    cutfile.header_lines + idx + 1
                );
                continue;
            }
            let event = RawEvent::parse(text).ok_or_else(|| ConversionError::BadDataLine {
                file: cutfile.path.clone(),
                line: cutfile.header_lines + idx + 1,
                text: text.to_string(),
            })?;

            let angle1 = match event.angle_channel {
                Some(ch) => self.config.angle_from_channel(ch),
                None => 0.0,
            };
            let energy = reconstructor.energy(event.tof, incident, rng);
            let weight = self.corrected_weight(cutfile, energy).unwrap_or_else(|| {
                zero_weight_events += 1;
                0.0
            });
            records.push(OutputRecord {
                angle1,
                angle2: 0.0,
                energy,
                z: output.z(),
                mass: output.mass,
                scatter_type: cutfile.scatter_type(),
                weight,
                event_number: event.event_number,
            });
        }

        if records.len() as u64 != cutfile.count {
            return Err(ConversionError::CountMismatch {
                file: cutfile.path.clone(),
                declared: cutfile.count,
                converted: records.len() as u64,
            });
        }
        if zero_weight_events > 0 {
            log::warn!(
                "{}: {} events outside the efficiency table or below efficiency {}, weights set to zero.",
                cutfile.basename(),
                zero_weight_events,
                MIN_EFFICIENCY
            );
        }
        Ok(ConvertedCutfile {
            records,
            zero_weight_events,
        })
    }

    /// Convert a cutfile and write its events to `out`
    pub fn write_cutfile<W: Write, R: Rng>(
        &self,
        cutfile: &CutfileDescriptor,
        out: &mut W,
        rng: &mut R,
    ) -> Result<FileSummary, ProcessorError> {
        let ConvertedCutfile {
            records,
            zero_weight_events,
        } = self.convert_cutfile(cutfile, rng)?;
        for record in records.iter() {
            writeln!(out, "{record}")?;
        }
        let average_weight = if records.is_empty() {
            0.0
        } else {
            records.iter().map(|r| r.weight).sum::<f64>() / records.len() as f64
        };
        log::info!(
            "{}: converted {} events, average weight {} (weight factor {}).",
            cutfile.basename(),
            records.len(),
            average_weight,
            cutfile.weight_factor
        );
        Ok(FileSummary {
            path: cutfile.path.clone(),
            scatter_type: Some(cutfile.scatter_type().to_string()),
            declared_count: cutfile.count,
            converted_count: records.len() as u64,
            weight_factor: cutfile.weight_factor,
            average_weight,
            zero_weight_events,
            efficiency_file: cutfile.efficiency.as_ref().map(|e| e.path.clone()),
            status: FileStatus::Converted,
        })
    }
}

/// Log the total input size
fn log_input_size(paths: &[PathBuf]) {
    let total_size: u64 = paths
        .iter()
        .filter_map(|p| p.metadata().ok())
        .map(|m| m.len())
        .sum();
    log::info!(
        "Converting {} cutfiles with total size: {}",
        paths.len(),
        human_bytes::human_bytes(total_size as f64)
    );
}

/// Handle a failure according to the batch policy: abort the run, or log it, record it and continue
fn handle_failure(
    summary: &mut RunSummary,
    path: &Path,
    error: ProcessorError,
    keep_going: bool,
) -> Result<(), ProcessorError> {
    if !keep_going {
        return Err(error);
    }
    log::error!("Skipping {}: {}", path.to_string_lossy(), error);
    summary.push(FileSummary::failed(path, error.to_string()));
    Ok(())
}

/// The main loop of tofe_list.
///
/// All cutfile names and headers are read and checked before any event is converted.
/// Files are then converted in the order given. By default the first failure stops
/// the run; with `keep_going` failed files are skipped and recorded in the summary.
/// `on_file` is called after each file has been handled.
pub fn process<W: Write, R: Rng>(
    processor: &Processor,
    paths: &[PathBuf],
    out: &mut W,
    rng: &mut R,
    keep_going: bool,
    mut on_file: impl FnMut(&Path),
) -> Result<RunSummary, ProcessorError> {
    log_input_size(paths);
    let mut summary = RunSummary::new();

    let mut cutfiles: Vec<CutfileDescriptor> = Vec::with_capacity(paths.len());
    for path in paths {
        match processor.load_cutfile(path) {
            Ok(cutfile) => cutfiles.push(cutfile),
            Err(e) => {
                handle_failure(&mut summary, path, e, keep_going)?;
                on_file(path);
            }
        }
    }

    for cutfile in cutfiles.iter() {
        log::info!(
            "Processing {} ({} {}, {} events)...",
            cutfile.basename(),
            cutfile.scatter_type(),
            cutfile.metadata.incident,
            cutfile.count
        );
        match processor.write_cutfile(cutfile, out, rng) {
            Ok(file_summary) => summary.push(file_summary),
            Err(e) => handle_failure(&mut summary, &cutfile.path, e, keep_going)?,
        }
        on_file(&cutfile.path);
    }
    out.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ATOMIC_MASS_UNIT_KG, KEV_IN_JOULES};
    use crate::element::ElementTable;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn scenario_config() -> ConversionConfig {
        ConversionConfig {
            toflen: 0.5,
            tof_slope: 1.0e-9,
            tof_offset: 0.0,
            angle_slope: 1.0,
            angle_offset: 0.0,
            foil_thickness: 0.0,
            ..Default::default()
        }
    }

    fn write_cutfile(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn data_lines(n: usize) -> String {
        (0..n).map(|i| format!("{} 0 {} {}\n", 1000 + i, i, i)).collect()
    }

    #[test]
    fn test_single_event_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cutfile(
            &dir,
            "test.4He.ERD.0.cut",
            "Count: 1\nWeight Factor: 1.0\n\n1000 0 0 1\n",
        );
        let config = scenario_config();
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        let cutfile = processor.load_cutfile(&path).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let records = processor.convert_cutfile(&cutfile, &mut rng).unwrap().records;
        assert_eq!(records.len(), 1);
        let record = &records[0];

        let mut rng = StdRng::seed_from_u64(11);
        let dither: f64 = rng.gen_range(-0.5..0.5);
        let time = 1.0e-9 * (1000.0 + dither);
        let mass = cutfile.metadata.incident.mass;
        let velocity = 0.5 / time;
        let expected = 0.5 * mass * ATOMIC_MASS_UNIT_KG * velocity * velocity / KEV_IN_JOULES;
        assert_eq!(record.energy, expected);
        assert_eq!(record.weight, 1.0);
        assert_eq!(record.z, 2);
        assert_eq!(record.angle1, 0.0);
        assert_eq!(record.event_number, 1);
    }

    #[test]
    fn test_count_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let config = scenario_config();
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        for (declared, ok) in [(4, false), (5, true), (6, false)] {
            let path = write_cutfile(
                &dir,
                "c.16O.ERD.0.cut",
                &format!("Count: {declared}\n\n{}", data_lines(5)),
            );
            let cutfile = processor.load_cutfile(&path).unwrap();
            let result = processor.convert_cutfile(&cutfile, &mut rng);
            if ok {
                assert_eq!(result.unwrap().records.len(), 5);
            } else {
                match result {
                    Err(ConversionError::CountMismatch {
                        declared: d,
                        converted,
                        ..
                    }) => {
                        assert_eq!(d, declared);
                        assert_eq!(converted, 5);
                    }
                    other => panic!("unexpected result {other:?}"),
                }
            }
        }
    }

    #[test]
    fn test_legacy_title_and_three_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cutfile(
            &dir,
            "c.1H.ERD.0.cut",
            "# comment\nType: ERD\nCount: 2\n\nToF, Energy, Event number\n900 10 1\n950 10 2\n",
        );
        let config = ConversionConfig {
            angle_offset: 3.0,
            ..scenario_config()
        };
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        let cutfile = processor.load_cutfile(&path).unwrap();
        let records = processor
            .convert_cutfile(&cutfile, &mut StdRng::seed_from_u64(0))
            .unwrap()
            .records;
        assert_eq!(records.len(), 2);
        // Without an angle channel the angle is zero, not the calibration offset
        assert_eq!(records[0].angle1, 0.0);
        assert_eq!(records[1].event_number, 2);
    }

    #[test]
    fn test_angle_calibration() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cutfile(&dir, "c.1H.ERD.0.cut", "Count: 1\n\n900 10 20 1\n");
        let config = ConversionConfig {
            angle_slope: 0.5,
            angle_offset: 3.0,
            ..scenario_config()
        };
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        let cutfile = processor.load_cutfile(&path).unwrap();
        let records = processor
            .convert_cutfile(&cutfile, &mut StdRng::seed_from_u64(0))
            .unwrap()
            .records;
        assert_eq!(records[0].angle1, 13.0);
        assert_eq!(records[0].angle2, 0.0);
    }

    #[test]
    fn test_bad_data_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cutfile(&dir, "c.1H.ERD.0.cut", "Count: 2\n\n900 10 1\n900 ten 2\n");
        let config = scenario_config();
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        let cutfile = processor.load_cutfile(&path).unwrap();
        match processor.convert_cutfile(&cutfile, &mut StdRng::seed_from_u64(0)) {
            Err(ConversionError::BadDataLine { line, .. }) => assert_eq!(line, 4),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_type_mismatch_fails_before_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cutfile(&dir, "t.4He.ERD.0.cut", "Type: RBS\nCount: 1\n\nnot data\n");
        let config = scenario_config();
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        assert!(matches!(
            processor.load_cutfile(&path),
            Err(ProcessorError::HeaderError(
                crate::error::HeaderError::TypeMismatch { .. }
            ))
        ));
    }

    #[test]
    fn test_efficiency_correction() {
        let dir = tempfile::tempdir().unwrap();
        // Flat efficiency of 0.5 from 1 keV upwards
        std::fs::write(dir.path().join("He.eff"), "1.0 0.5\n1.0e6 0.5\n").unwrap();
        let path = write_cutfile(
            &dir,
            "e.4He.ERD.0.cut",
            "Count: 2\nWeight Factor: 2.0\n\n1000 0 0 1\n100000 0 0 2\n",
        );
        let config = ConversionConfig {
            efficiency_directory: Some(dir.path().to_path_buf()),
            ..scenario_config()
        };
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        let cutfile = processor.load_cutfile(&path).unwrap();
        assert!(cutfile.efficiency.is_some());
        let converted = processor
            .convert_cutfile(&cutfile, &mut StdRng::seed_from_u64(0))
            .unwrap();
        let records = &converted.records;
        // About 5 keV, inside the flat part
        assert!((records[0].weight - 4.0).abs() < 1e-9);
        // Far below 1 keV, outside the table
        assert!(records[1].energy < 1.0);
        assert_eq!(records[1].weight, 0.0);
        assert_eq!(converted.zero_weight_events, 1);

        let mut out: Vec<u8> = Vec::new();
        let summary = processor
            .write_cutfile(&cutfile, &mut out, &mut StdRng::seed_from_u64(0))
            .unwrap();
        assert_eq!(summary.zero_weight_events, 1);
        assert_eq!(summary.converted_count, 2);
    }

    #[test]
    fn test_huge_declared_count_is_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let config = scenario_config();
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        for declared in [u64::MAX, 100_000_000_000] {
            let path = write_cutfile(
                &dir,
                "h.4He.ERD.0.cut",
                &format!("Count: {declared}\n\n1000 0 0 1\n"),
            );
            let cutfile = processor.load_cutfile(&path).unwrap();
            assert_eq!(cutfile.count, declared);
            match processor.convert_cutfile(&cutfile, &mut StdRng::seed_from_u64(0)) {
                Err(ConversionError::CountMismatch {
                    declared: d,
                    converted,
                    ..
                }) => {
                    assert_eq!(d, declared);
                    assert_eq!(converted, 1);
                }
                other => panic!("unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn test_empty_data_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cutfile(
            &dir,
            "b.1H.ERD.0.cut",
            "Count: 2\n\n900 10 1\n\n   \n950 10 2\n",
        );
        let config = scenario_config();
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        let cutfile = processor.load_cutfile(&path).unwrap();
        let records = processor
            .convert_cutfile(&cutfile, &mut StdRng::seed_from_u64(0))
            .unwrap()
            .records;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].event_number, 2);
    }

    #[test]
    fn test_rbs_output_nuclide() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_cutfile(&dir, "r.4He.RBS_28Si.0.cut", "Type: RBS\nCount: 1\n\n800 0 1\n");
        let config = scenario_config();
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        let mut out: Vec<u8> = Vec::new();
        let summary = process(
            &processor,
            &[path],
            &mut out,
            &mut StdRng::seed_from_u64(0),
            false,
            |_| (),
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        let fields: Vec<&str> = text.split_whitespace().collect();
        assert_eq!(fields[3], "14");
        assert_eq!(fields[5], "RBS");
        assert_eq!(summary.total_events, 1);
    }

    #[test]
    fn test_process_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_cutfile(&dir, "a.16O.ERD.0.cut", &format!("Count: 3\n\n{}", data_lines(3))),
            write_cutfile(&dir, "a.1H.ERD.0.cut", &format!("Count: 4\n\n{}", data_lines(4))),
        ];
        let config = ConversionConfig {
            foil_thickness: 3.0,
            ..scenario_config()
        };
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        let mut first: Vec<u8> = Vec::new();
        let mut second: Vec<u8> = Vec::new();
        process(&processor, &paths, &mut first, &mut StdRng::seed_from_u64(5), false, |_| ()).unwrap();
        process(&processor, &paths, &mut second, &mut StdRng::seed_from_u64(5), false, |_| ()).unwrap();
        assert_eq!(first, second);
        assert_eq!(String::from_utf8(first).unwrap().lines().count(), 7);
    }

    #[test]
    fn test_failed_file_aborts_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_cutfile(&dir, "a.16O.ERD.0.cut", &format!("Count: 3\n\n{}", data_lines(2))),
            write_cutfile(&dir, "a.1H.ERD.0.cut", &format!("Count: 2\n\n{}", data_lines(2))),
        ];
        let config = scenario_config();
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        let mut out: Vec<u8> = Vec::new();
        let result = process(&processor, &paths, &mut out, &mut StdRng::seed_from_u64(0), false, |_| ());
        assert!(matches!(
            result,
            Err(ProcessorError::ConversionError(ConversionError::CountMismatch { .. }))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_keep_going() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_cutfile(&dir, "bad.cut", "Count: 1\n\n1 2 3\n"),
            write_cutfile(&dir, "a.16O.ERD.0.cut", &format!("Count: 3\n\n{}", data_lines(2))),
            write_cutfile(&dir, "a.1H.ERD.0.cut", &format!("Count: 2\n\n{}", data_lines(2))),
        ];
        let config = scenario_config();
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        let mut out: Vec<u8> = Vec::new();
        let mut seen = 0;
        let summary = process(
            &processor,
            &paths,
            &mut out,
            &mut StdRng::seed_from_u64(0),
            true,
            |_| seen += 1,
        )
        .unwrap();
        assert_eq!(seen, 3);
        assert_eq!(summary.n_failed(), 2);
        assert_eq!(summary.total_events, 2);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
    }

    #[test]
    fn test_metadata_failure_aborts_before_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![
            write_cutfile(&dir, "a.1H.ERD.0.cut", &format!("Count: 2\n\n{}", data_lines(2))),
            write_cutfile(&dir, "a.1H.RBS.0.cut", "Count: 1\n\n1 2 3\n"),
        ];
        let config = scenario_config();
        let db = ElementTable::new();
        let processor = Processor::new(&config, &db).unwrap();
        let mut out: Vec<u8> = Vec::new();
        let result = process(&processor, &paths, &mut out, &mut StdRng::seed_from_u64(0), false, |_| ());
        assert!(matches!(result, Err(ProcessorError::FilenameError(_))));
        assert!(out.is_empty());
    }
}
