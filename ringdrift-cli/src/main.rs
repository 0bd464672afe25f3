use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use ringdrift_core::midi::{self, MidiPortSink};
use ringdrift_core::{
    Config, ConfigLoadError, LogSink, NoteSink, OutputError, Session, SessionError,
    SessionOptions, SessionReport, TaskOutcome,
};
use ringdrift_types::VoiceConfig;

const USAGE: &str = "\
usage: ringdrift [options]

  --device <index|name>  MIDI output port (index, or part of its name)
  --list                 list MIDI output ports and exit
  --dry-run              log notes instead of sending them
  --config <path>        read settings from this file only
  --seed <n>             reproducible generation
  --log-file <path>      write the log to a file instead of stderr
  -v, --verbose          debug logging
  -h, --help             show this help

Press Enter (or close stdin) to stop.";

#[derive(Debug)]
enum CliError {
    Usage(String),
    Config(ConfigLoadError),
    Output(OutputError),
    Session(SessionError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(msg) => write!(f, "{}\n\n{}", msg, USAGE),
            Self::Config(e) => write!(f, "{}", e),
            Self::Output(e) => write!(f, "{}", e),
            Self::Session(e) => write!(f, "{}", e),
        }
    }
}

impl From<ConfigLoadError> for CliError {
    fn from(e: ConfigLoadError) -> Self {
        Self::Config(e)
    }
}

impl From<OutputError> for CliError {
    fn from(e: OutputError) -> Self {
        Self::Output(e)
    }
}

impl From<SessionError> for CliError {
    fn from(e: SessionError) -> Self {
        Self::Session(e)
    }
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    device: Option<String>,
    config: Option<PathBuf>,
    seed: Option<u64>,
    log_file: Option<PathBuf>,
    list: bool,
    dry_run: bool,
    verbose: bool,
    help: bool,
}

const VALUE_FLAGS: [&str; 4] = ["--device", "--config", "--seed", "--log-file"];
const SWITCHES: [&str; 6] = ["--list", "--dry-run", "--verbose", "-v", "--help", "-h"];

fn parse_args(args: &[String]) -> Result<Args, CliError> {
    let mut skip_value = false;
    for arg in args {
        if skip_value {
            skip_value = false;
        } else if VALUE_FLAGS.contains(&arg.as_str()) {
            skip_value = true;
        } else if !SWITCHES.contains(&arg.as_str()) {
            return Err(CliError::Usage(format!("unknown argument '{}'", arg)));
        }
    }

    let seed = parse_flag(args, "--seed")?
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| CliError::Usage(format!("--seed expects a number, got '{}'", s)))
        })
        .transpose()?;

    Ok(Args {
        device: parse_flag(args, "--device")?.map(str::to_string),
        config: parse_flag(args, "--config")?.map(PathBuf::from),
        seed,
        log_file: parse_flag(args, "--log-file")?.map(PathBuf::from),
        list: args.iter().any(|a| a == "--list"),
        dry_run: args.iter().any(|a| a == "--dry-run"),
        verbose: args.iter().any(|a| a == "--verbose" || a == "-v"),
        help: args.iter().any(|a| a == "--help" || a == "-h"),
    })
}

/// Value following `flag`, if the flag is present.
fn parse_flag<'a>(args: &'a [String], flag: &str) -> Result<Option<&'a str>, CliError> {
    match args.iter().position(|a| a == flag) {
        None => Ok(None),
        Some(i) => args
            .get(i + 1)
            .map(|v| Some(v.as_str()))
            .ok_or_else(|| CliError::Usage(format!("{} needs a value", flag))),
    }
}

fn init_logging(verbose: bool, log_file: Option<&PathBuf>) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let config = ConfigBuilder::new()
        .set_thread_level(LevelFilter::Debug)
        .set_target_level(LevelFilter::Error)
        .build();

    let result = match log_file {
        Some(path) => match File::create(path) {
            Ok(file) => WriteLogger::init(log_level, config, file),
            Err(e) => {
                eprintln!("cannot create log file {}: {}", path.display(), e);
                TermLogger::init(log_level, config, TerminalMode::Stderr, ColorChoice::Auto)
            }
        },
        None => TermLogger::init(log_level, config, TerminalMode::Stderr, ColorChoice::Auto),
    };
    if let Err(e) = result {
        eprintln!("logging disabled: {}", e);
    }

    log::debug!("ringdrift starting (log level: {:?})", log_level);
}

fn print_ports() -> Result<(), CliError> {
    let ports = midi::list_output_ports()?;
    if ports.is_empty() {
        println!("no MIDI output ports found");
    }
    for port in ports {
        println!("{}: {}", port.index, port.name);
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<Config, CliError> {
    Ok(match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    })
}

// Any byte, EOF or read error ends the session.
fn wait_for_stdin() -> std::io::Result<()> {
    let mut byte = [0u8; 1];
    std::io::stdin().read(&mut byte).map(|_| ())
}

fn play<S: NoteSink + 'static>(
    voices: &[VoiceConfig],
    sink: S,
    options: SessionOptions,
) -> Result<SessionReport, CliError> {
    let session = Session::start(voices, sink, options)?;
    log::info!(target: "session", "playing {} voices, press Enter to stop", session.voice_count());
    Ok(session.wait_for(wait_for_stdin))
}

fn summarize(report: &SessionReport) {
    for voice in &report.voices {
        match &voice.player {
            TaskOutcome::Finished(r) => log::info!(
                target: "session",
                "voice {} (ch{}): {} notes, {} rests, {} write errors",
                voice.index,
                voice.channel,
                r.notes_played,
                r.rests,
                r.write_errors
            ),
            TaskOutcome::Panicked => {
                log::error!(target: "session", "voice {} (ch{}) failed", voice.index, voice.channel)
            }
            TaskOutcome::Abandoned => log::warn!(
                target: "session",
                "voice {} (ch{}) did not stop in time",
                voice.index,
                voice.channel
            ),
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    if args.list {
        return print_ports();
    }

    let config = load_config(&args)?;
    let mut options = config.session_options()?;
    if args.seed.is_some() {
        options.seed = args.seed;
    }
    let voices = config.voices()?;

    let report = if args.dry_run {
        play(&voices, LogSink, options)?
    } else {
        let Some(selector) = args.device.as_deref().or(config.device()) else {
            println!("no output selected; available MIDI ports:");
            print_ports()?;
            println!("\nrun again with --device <index|name>, or --dry-run");
            return Ok(());
        };
        let sink = MidiPortSink::open(selector)?;
        log::info!(target: "midi", "sending to {}", sink.port_name());
        play(&voices, sink, options)?
    };

    summarize(&report);
    Ok(())
}

fn main() {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("ringdrift: {}", e);
            std::process::exit(2);
        }
    };
    if args.help {
        println!("{}", USAGE);
        return;
    }

    init_logging(args.verbose, args.log_file.as_ref());

    if let Err(e) = run(args) {
        log::error!("{}", e);
        eprintln!("ringdrift: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_arguments() {
        assert_eq!(parse_args(&[]).unwrap(), Args::default());
    }

    #[test]
    fn test_value_flags() {
        let parsed = parse_args(&args(&[
            "--device", "2", "--seed", "42", "--config", "a.toml", "-v",
        ]))
        .unwrap();
        assert_eq!(parsed.device.as_deref(), Some("2"));
        assert_eq!(parsed.seed, Some(42));
        assert_eq!(parsed.config, Some(PathBuf::from("a.toml")));
        assert!(parsed.verbose);
        assert!(!parsed.dry_run);
    }

    #[test]
    fn test_switches() {
        let parsed = parse_args(&args(&["--dry-run", "--log-file", "/tmp/r.log", "--list"])).unwrap();
        assert!(parsed.dry_run);
        assert!(parsed.list);
        assert_eq!(parsed.log_file, Some(PathBuf::from("/tmp/r.log")));
        assert_eq!(parsed.device, None);
    }

    #[test]
    fn test_missing_value_is_a_usage_error() {
        assert!(matches!(
            parse_args(&args(&["--dry-run", "--seed"])),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_bad_seed_is_a_usage_error() {
        assert!(matches!(
            parse_args(&args(&["--seed", "many"])),
            Err(CliError::Usage(_))
        ));
    }

    #[test]
    fn test_unknown_argument() {
        assert!(matches!(
            parse_args(&args(&["--tempo", "120"])),
            Err(CliError::Usage(_))
        ));
    }
}
