//! CLI argument parsing with clap

use clap::{ArgAction, Parser};
use srm_backup::{BACKUP_DIR_ENV, DEFAULT_COMPRESSION_LEVEL};
use std::path::PathBuf;

/// srm - safe rm that keeps a restorable backup of everything it removes
#[derive(Parser, Debug)]
#[command(name = "srm")]
#[command(author, version, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Files or directories to remove (or restore with --restore)
    #[arg(value_name = "PATH", required_unless_present_any = ["list", "version"])]
    pub paths: Vec<PathBuf>,

    /// Restore the given paths from the backup store
    #[arg(short, long, conflicts_with = "list")]
    pub restore: bool,

    /// List backed up paths
    #[arg(short, long, conflicts_with = "paths")]
    pub list: bool,

    /// Print version information
    #[arg(short = 'v', long)]
    pub version: bool,

    /// Backup store directory [default: ~/.srm]
    #[arg(long, env = BACKUP_DIR_ENV, value_name = "DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Gzip compression level (1-9)
    #[arg(
        long,
        default_value_t = DEFAULT_COMPRESSION_LEVEL,
        value_parser = clap::value_parser!(u32).range(1..=9)
    )]
    pub compression: u32,

    /// Increase log verbosity (--verbose, --verbose --verbose, ...)
    #[arg(long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// What a single invocation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Remove,
    Restore,
    List,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.list {
            Mode::List
        } else if self.restore {
            Mode::Restore
        } else {
            Mode::Remove
        }
    }
}
