use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use mercury_core::BufferId;

/// Command-line arguments accepted by the `mercury` binary.
#[derive(Parser, Debug)]
#[command(
    name = "mercury",
    version,
    about = "Span-level consistency annotation of source/summary pairs"
)]
pub struct Cli {
    #[arg(
        long,
        value_name = "URL",
        env = "MERCURY_BACKEND",
        default_value = "http://localhost:8000",
        global = true,
        help = "Base URL of the annotation backend"
    )]
    pub backend: String,

    #[arg(
        long,
        value_name = "KEY",
        env = "MERCURY_USER_KEY",
        global = true,
        help = "Identity token sent with label and history requests"
    )]
    pub user_key: Option<String>,

    #[arg(
        long,
        value_name = "FILE",
        default_value = ".mercury-key",
        global = true,
        help = "Where a freshly issued user key is cached"
    )]
    pub key_file: PathBuf,

    #[arg(
        long,
        value_name = "MS",
        env = "MERCURY_DEBOUNCE_MS",
        default_value_t = 100,
        global = true,
        help = "Delay before a candidate query is sent"
    )]
    pub debounce_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the number of tasks.
    Tasks,

    /// Print both buffers of a task with their partitions.
    Show { index: usize },

    /// Pin an anchor range and print the candidate counterparts.
    Select {
        index: usize,
        #[arg(long, value_enum)]
        from: Side,
        start: usize,
        end: usize,
    },

    /// Submit a label. `-1 -1` marks a missing side.
    Label {
        index: usize,
        #[arg(long, num_args = 2, value_names = ["START", "END"], allow_negative_numbers = true)]
        source: Vec<i64>,
        #[arg(long, num_args = 2, value_names = ["START", "END"], allow_negative_numbers = true)]
        summary: Vec<i64>,
        /// Mark the pair as inconsistent.
        #[arg(long)]
        inconsistent: bool,
        #[arg(long)]
        note: Option<String>,
        /// Taxonomy label, as a dotted path. Repeatable.
        #[arg(long = "tag", value_name = "PATH")]
        tags: Vec<String>,
    },

    /// List the records for a task.
    History {
        index: usize,
        /// Render one record over both buffers.
        #[arg(long, value_name = "RECORD_ID")]
        show: Option<String>,
    },

    /// Write all of the user's records as JSON.
    Export {
        #[arg(long, default_value = "label.json")]
        out: PathBuf,
    },

    /// Delete a record.
    Delete { record_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Side {
    Source,
    Summary,
}

impl From<Side> for BufferId {
    fn from(side: Side) -> Self {
        match side {
            Side::Source => BufferId::Source,
            Side::Summary => BufferId::Summary,
        }
    }
}
