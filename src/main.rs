mod cli;

use std::error::Error;

use clap::Parser;

use cli::{
    args::{CliArgs, Command},
    command_handlers::{do_detect, do_fetch},
};
use repofetch::{config::RepofetchConfig, Repofetch};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = CliArgs::parse();
    let config = RepofetchConfig::load()?;

    let capture = match &cli_args.cmd {
        Command::Fetch { no_capture, .. } => config.capture_output && !no_capture,
        Command::Detect { .. } => config.capture_output,
    };
    let repofetch = Repofetch::builder()
        .git_program(cli_args.git.unwrap_or(config.git_program))
        .capture_output(capture)
        .try_build()?;

    match cli_args.cmd {
        Command::Fetch {
            source,
            output_dir,
            reference,
            ..
        } => do_fetch(&repofetch, &source, reference.as_deref(), &output_dir),
        Command::Detect { source, reference } => {
            do_detect(&repofetch, &source, reference.as_deref())
        }
    }
}
