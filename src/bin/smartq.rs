use std::{io::Write, process::ExitCode};

use log::{LevelFilter, Log, Metadata, Record};
use smartq::{bench, bench::config::USAGE, BenchConfig};

/// Writes `level: message` lines to stderr.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(
                std::io::stderr(),
                "{:<5} {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

fn main() -> ExitCode {
    let config = match BenchConfig::from_args(std::env::args().skip(1)) {
        Ok(Some(config)) => config,
        Ok(None) => {
            println!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("smartq: {err}\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    init_logging(config.verbose);

    match bench::run(&config) {
        Ok(samples) => {
            for sample in samples {
                println!("{sample}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("benchmark aborted: {err}");
            ExitCode::FAILURE
        }
    }
}
