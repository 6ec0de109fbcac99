use std::env;
use std::io;
use std::process::ExitCode;

use log::LevelFilter;

use proctopo::app::{Config, HostContext, write_report};
use proctopo::data::interrogate_host;

fn main() -> ExitCode {
    let config = match Config::from_args() {
        Ok(config) => config,
        Err(err) if err.is_help() => {
            println!("{err}");
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };
    init_logger(config.log_level);

    let report = interrogate_host(config.options);
    if let Some(issue) = report.issue() {
        log::warn!("partial report: {issue}");
    }

    let mut stdout = io::stdout().lock();
    if let Err(err) = write_report(&mut stdout, &report, config.format, &HostContext::detect()) {
        eprintln!("proctopo error: {err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn init_logger(level: LevelFilter) {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(level);
    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();
}
