//! CLI argument parsing using clap 4.x derive macros

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Exercise repetition counting and form feedback from pose landmarks
///
/// Replays a recorded landmark stream (one JSON frame per line) through the
/// coaching engine and syncs the workout to the session store.
#[derive(Parser, Debug)]
#[command(name = "formcoach")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// The command to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log engine activity to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print version information
    #[arg(long)]
    pub version: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a workout from a recorded landmark stream
    Replay {
        /// Exercise being performed (squat, pushup)
        #[arg(short, long)]
        exercise: String,

        /// JSON-lines frame file; reads stdin when omitted or "-"
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Frames per second to replay at
        #[arg(long, default_value_t = 30)]
        fps: u32,

        /// Use an in-process store instead of the remote one
        #[arg(long)]
        offline: bool,

        /// Bearer token for the store (overrides config and environment)
        #[arg(long)]
        token: Option<String>,

        /// Override the up threshold of the primary angle, degrees
        #[arg(long, requires = "down")]
        up: Option<f64>,

        /// Override the down threshold of the primary angle, degrees
        #[arg(long, requires = "up")]
        down: Option<f64>,

        /// Emit events and the summary as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// List past workouts recorded by the store
    History {
        /// Bearer token for the store (overrides config and environment)
        #[arg(long)]
        token: Option<String>,

        /// Show at most this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Emit the entries as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        cmd: Option<ConfigCommand>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration (default)
    Show,

    /// Print the path of the config file in use
    Path,

    /// Write a default config file to the user config directory
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
