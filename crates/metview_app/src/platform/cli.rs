use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum, ValueHint};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Upload accelerometer exports and collect MET estimates",
    long_about = None
)]
pub struct Cli {
    /// Configuration file (defaults to ./metview.toml when present)
    #[arg(long, env = "METVIEW_CONFIG", value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Server base URL, overrides the config file
    #[arg(long, env = "METVIEW_SERVER", value_hint = ValueHint::Url)]
    pub server: Option<String>,

    /// Directory for results and the pending selection
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// How a submitted flow decides its results are ready
    #[arg(long, value_enum)]
    pub readiness: Option<ReadinessArg>,

    /// More log output (repeatable)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Less log output (repeatable)
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn verbosity(&self) -> i8 {
        let up = i8::try_from(self.verbose).unwrap_or(i8::MAX);
        let down = i8::try_from(self.quiet).unwrap_or(i8::MAX);
        up.saturating_sub(down)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage the pending wrist file selection
    #[command(subcommand)]
    Select(SelectCommand),
    /// Upload files and wait for MET estimates
    #[command(subcommand)]
    Upload(UploadCommand),
    /// Fetch the server-rendered plots
    Plot,
    /// Drop all results stored on the server
    Clear,
}

#[derive(Subcommand, Debug)]
pub enum SelectCommand {
    /// Append files to the selection
    Add {
        #[arg(required = true, value_hint = ValueHint::FilePath)]
        files: Vec<PathBuf>,
    },
    /// Remove one file by its position in `select list` (1-based)
    Remove { position: usize },
    /// Empty the selection
    Clear,
    /// Show the selection
    List,
}

#[derive(Subcommand, Debug)]
pub enum UploadCommand {
    /// Upload a single ActiGraph export
    Acti {
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Upload the pending wrist selection, plus any files given here
    Wrist {
        #[arg(value_hint = ValueHint::FilePath)]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReadinessArg {
    /// Re-fetch the page until the results table fills in
    Fragment,
    /// Finish as soon as the upload response arrives
    Response,
}
