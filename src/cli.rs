// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::MirrorOptions;

/// Command-line arguments for `globmirror`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "globmirror",
    version,
    about = "Copy files matching a glob into a mirrored destination tree, optionally watching for changes.",
    long_about = None
)]
pub struct CliArgs {
    /// Source glob, e.g. `src/**/*.txt`. Required unless `--config` is given.
    #[arg(value_name = "SOURCE", required_unless_present = "config")]
    pub source: Option<String>,

    /// Destination directory.
    #[arg(value_name = "DEST", required_unless_present = "config")]
    pub dest: Option<PathBuf>,

    /// Remove destination files whose source no longer matches, before copying.
    #[arg(long)]
    pub clean: bool,

    /// Follow symbolic links while matching.
    #[arg(long, short = 'L')]
    pub dereference: bool,

    /// Only copy files whose destination is older than the source.
    #[arg(long, short = 'u')]
    pub update: bool,

    /// With `--watch`, skip the initial copy.
    #[arg(long)]
    pub no_initial: bool,

    /// Glob (relative to the source base directory) to exclude. Repeatable.
    #[arg(long, value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Keep running and mirror changes until Ctrl-C.
    #[arg(long, short = 'w')]
    pub watch: bool,

    /// Run every mirror from a TOML config file instead of SOURCE/DEST.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["source", "dest"])]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `GLOBMIRROR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

impl CliArgs {
    /// Options for the SOURCE/DEST form.
    pub fn mirror_options(&self) -> MirrorOptions {
        MirrorOptions::default()
            .clean(self.clean)
            .dereference(self.dereference)
            .update(self.update)
            .initial_copy(!self.no_initial)
            .ignore(self.ignore.iter().cloned())
    }

    /// Apply flags given on the command line on top of options loaded from a
    /// config file. Flags only ever switch behaviour on.
    pub fn overlay(&self, mut options: MirrorOptions) -> MirrorOptions {
        options.clean |= self.clean;
        options.dereference |= self.dereference;
        options.update |= self.update;
        if self.no_initial {
            options.initial_copy = false;
        }
        options.ignore.extend(self.ignore.iter().cloned());
        options
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
