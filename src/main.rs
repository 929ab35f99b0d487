use std::process;

use anyhow::{self, format_err};
use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use kpsym::interfaces::cli::{log_heading, Cli};
use kpsym::interfaces::input::Input;
use kpsym::interfaces::InputHandle;
use kpsym::io::read_kpsym_yaml;

/// Configures `log4rs` so that the `kpsym-output` target is written to the console or, if
/// requested, to an output file, and all other targets to standard error.
fn configure_logging(cli: &Cli) -> Result<(), anyhow::Error> {
    let level = if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let stderr = ConsoleAppender::builder()
        .target(log4rs::append::console::Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{l}] {m}{n}")))
        .build();
    let output: Box<dyn log4rs::append::Append> = if let Some(path) = cli.output.as_ref() {
        Box::new(
            FileAppender::builder()
                .encoder(Box::new(PatternEncoder::new("{m}{n}")))
                .append(false)
                .build(path)?,
        )
    } else {
        Box::new(
            ConsoleAppender::builder()
                .encoder(Box::new(PatternEncoder::new("{m}{n}")))
                .build(),
        )
    };
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .appender(Appender::builder().build("output", output))
        .logger(
            Logger::builder()
                .appender("output")
                .additive(false)
                .build("kpsym-output", LevelFilter::Info),
        )
        .build(Root::builder().appender("stderr").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn run(cli: &Cli) -> Result<(), anyhow::Error> {
    configure_logging(cli)?;
    log_heading();
    let config = cli
        .config
        .as_ref()
        .ok_or_else(|| format_err!("No YAML input file specified."))?;
    let input = read_kpsym_yaml::<Input, _>(config)?;
    input.handle()
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        log::error!("{err}");
        eprintln!("Error: {err}");
        process::exit(1);
    }
}
