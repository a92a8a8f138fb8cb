use std::path::Path;
use std::process;

use clap::ArgEnum;
use env_logger;
use log;

use tape_sort::{Config, Tape, TapeSorterBuilder};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let config_path = arg_parser.value_of("config").expect("value is required");
    let config = match Config::from_file(Path::new(config_path)) {
        Ok(config) => config,
        Err(err) => {
            log::error!("configuration error: {}", err);
            process::exit(1);
        }
    };

    let mut input = match Tape::open(&config.path_in, config.size, config.memory, config.delays) {
        Ok(tape) => tape,
        Err(err) => {
            log::error!("input tape opening error: {}", err);
            process::exit(1);
        }
    };

    let sorter = TapeSorterBuilder::new().build();
    if let Err(err) = sorter.sort(&mut input, &config.path_out) {
        log::error!("tape sorting error: {}", err);
        process::exit(1);
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("tape-sort")
        .about("external merge sort over simulated tape devices")
        .arg(
            clap::Arg::new("config")
                .help("sort job configuration file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
