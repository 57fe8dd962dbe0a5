use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Staged activation of next-generation build scripts
#[derive(Parser, Debug)]
#[command(name = "ngactivate", version, about, long_about = None)]
pub struct Cli {
    /// Change to this directory before doing anything
    #[arg(short = 'C', global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install all shadow files, verifying and deleting the legacy files
    Activate,

    /// Re-install shadow files, skipping up-to-date destinations; no
    /// verification, no deletion
    Reactivate,

    /// Remove installed files and reinstate legacy files from version control
    Deactivate {
        /// Directory of a nested secondary repository whose files must be
        /// reverted from within it (svn backend only)
        #[arg(long, value_name = "DIR")]
        secondary_repo: Option<PathBuf>,
    },

    /// Print a replaces directive line (with MD5) for each file
    Sum {
        /// Files to checksum
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Create a .nextgen shadow counterpart for each file
    Ngize {
        /// Files to shadow
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Prepend this header template to each generated shadow
        #[arg(long, value_name = "FILE")]
        header: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
