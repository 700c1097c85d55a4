use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Materializes project sources from git remotes and local directories.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Git client to run. Overrides `git.program` from the configuration file.
    #[clap(long, global = true, env = "REPOFETCH_GIT_PROGRAM")]
    pub git: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetches a source into an empty or missing directory
    Fetch {
        /// Git URL, path to a repository, or `local:<path>`
        source: String,
        output_dir: PathBuf,
        /// Branch, tag or commit hash to check out
        #[clap(short, long = "ref")]
        reference: Option<String>,
        /// Let git write straight to the terminal instead of printing its output line by line
        #[clap(long)]
        no_capture: bool,
    },
    /// Prints which provider handles a source
    Detect {
        source: String,
        #[clap(short, long = "ref")]
        reference: Option<String>,
    },
}
