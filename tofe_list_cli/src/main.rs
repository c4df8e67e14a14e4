use clap::{Arg, ArgAction, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use libtofe_list::config::ConversionConfig;
use libtofe_list::element::ElementTable;
use libtofe_list::process::{process, Processor};
use libtofe_list::summary::RunSummary;

fn make_template_config(path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(ConversionConfig::template().as_bytes())
}

fn main() -> ExitCode {
    // Create a cli
    let matches = Command::new("tofe_list")
        .about("Convert ToF-ERDA cutfiles into calibrated event lists")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration file"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .required(true)
                .help("Path to the configuration file"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Output file, standard output if not given"),
        )
        .arg(
            Arg::new("seed")
                .short('s')
                .long("seed")
                .value_parser(clap::value_parser!(u64))
                .help("Seed for the ToF channel dithering, for reproducible output"),
        )
        .arg(
            Arg::new("keep-going")
                .short('k')
                .long("keep-going")
                .action(ArgAction::SetTrue)
                .help("Skip cutfiles that fail instead of stopping"),
        )
        .arg(
            Arg::new("cutfiles")
                .num_args(0..)
                .help("Cutfiles to convert, in output order"),
        )
        .get_matches();

    // Initialize feedback. Output may go to stdout, so logging goes to stderr
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    );
    let pb_manager = MultiProgress::new();
    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return ExitCode::FAILURE;
    }

    let config_path = match matches.get_one::<String>("config") {
        Some(p) => PathBuf::from(p),
        None => {
            log::error!("A configuration file is required.");
            return ExitCode::FAILURE;
        }
    };

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        if let Err(e) = make_template_config(&config_path) {
            log::error!("Could not write template config: {e}");
            return ExitCode::FAILURE;
        }
        log::info!("Done.");
        return ExitCode::SUCCESS;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match ConversionConfig::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("ToF length: {} m", config.toflen);
    log::info!(
        "ToF calibration: {} s/ch, {} s",
        config.tof_slope,
        config.tof_offset
    );
    log::info!(
        "Angle calibration: {} /ch, {}",
        config.angle_slope,
        config.angle_offset
    );
    log::info!(
        "Carbon foil: {} ug/cm^2 ({:.3} tfu)",
        config.foil_thickness,
        config.foil_thickness_tfu()
    );
    if let Some(dir) = &config.efficiency_directory {
        log::info!("Efficiency directory: {}", dir.to_string_lossy());
    }

    let cutfiles: Vec<PathBuf> = matches
        .get_many::<String>("cutfiles")
        .map(|files| files.map(PathBuf::from).collect())
        .unwrap_or_default();
    if cutfiles.is_empty() {
        log::error!("No cutfiles given.");
        return ExitCode::FAILURE;
    }

    let db = ElementTable::new();
    let processor = match Processor::new(&config, &db) {
        Ok(p) => p,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let output_path = matches.get_one::<String>("output").map(PathBuf::from);
    let mut out: Box<dyn Write> = match &output_path {
        Some(path) => match File::create(path) {
            Ok(f) => Box::new(BufWriter::new(f)),
            Err(e) => {
                log::error!("Could not create output {}: {e}", path.to_string_lossy());
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };

    let mut rng = match matches.get_one::<u64>("seed") {
        Some(seed) => StdRng::seed_from_u64(*seed),
        None => StdRng::from_entropy(),
    };
    let keep_going = matches.get_flag("keep-going");

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(cutfiles.len() as u64));
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
        pb.set_style(style);
    }

    let result = process(&processor, &cutfiles, &mut out, &mut rng, keep_going, |path| {
        pb.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        pb.inc(1);
    });
    pb.finish();
    drop(out);

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            log::error!("Conversion failed with error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = &output_path {
        let summary_path = RunSummary::path_for_output(path);
        match summary.write_yaml(&summary_path) {
            Ok(()) => log::info!("Wrote run summary to {}.", summary_path.to_string_lossy()),
            Err(e) => {
                log::error!("Could not write run summary: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    log::info!(
        "Converted {} events from {} cutfiles.",
        summary.total_events,
        summary.files.len() - summary.n_failed()
    );
    if summary.n_failed() > 0 {
        log::warn!("{} cutfiles failed, check the log above.", summary.n_failed());
        return ExitCode::FAILURE;
    }
    log::info!("Done.");
    ExitCode::SUCCESS
}
