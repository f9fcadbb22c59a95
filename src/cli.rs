// src/cli.rs
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use workout_map_lib::{Coords, SortKey, WorkoutType};

#[derive(Parser, Debug)]
#[command(author, version, about = "Log running and cycling workouts pinned to a map", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Print lists as CSV instead of a table
    #[arg(long, global = true)]
    pub export_csv: bool,

    /// Current position as "lat,lng" (defaults to `home` from the config file)
    #[arg(long, global = true, value_name = "LAT,LNG")]
    pub position: Option<Coords>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkoutTypeCli {
    Running,
    Cycling,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortCli {
    #[default]
    Default,
    Distance,
    Duration,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log a new workout at a map position
    Add {
        /// Type of workout
        #[arg(value_enum)]
        type_: WorkoutTypeCli,
        /// Where it happened, "lat,lng" (defaults to the current position)
        #[arg(short, long, value_name = "LAT,LNG")]
        at: Option<Coords>,
        /// Distance in km
        #[arg(short = 'k', long, allow_hyphen_values = true)]
        distance: String,
        /// Duration in minutes
        #[arg(short, long, allow_hyphen_values = true)]
        duration: String,
        /// Cadence in steps/min (running)
        #[arg(short, long, allow_hyphen_values = true)]
        cadence: Option<String>,
        /// Elevation gain in meters (cycling)
        #[arg(short, long, allow_hyphen_values = true)]
        elevation: Option<String>,
    },
    /// Change a workout's numbers (its type stays the same)
    Edit {
        id: String,
        #[arg(short = 'k', long, allow_hyphen_values = true)]
        distance: Option<String>,
        #[arg(short, long, allow_hyphen_values = true)]
        duration: Option<String>,
        #[arg(short, long, allow_hyphen_values = true)]
        cadence: Option<String>,
        #[arg(short, long, allow_hyphen_values = true)]
        elevation: Option<String>,
    },
    /// Delete one workout
    Delete { id: String },
    /// Delete every workout
    DeleteAll {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// List workouts
    List {
        #[arg(short, long, value_enum, default_value_t = SortCli::Default)]
        sort: SortCli,
    },
    /// Center the map on a workout
    Show { id: String },
    /// Fit the map around every workout
    ShowAll,
    /// Print the workout list as HTML
    Render {
        #[arg(short, long, value_enum, default_value_t = SortCli::Default)]
        sort: SortCli,
    },
    /// Show the path to the config file
    ConfigPath,
    /// Show the path to the database file
    DbPath,
    /// Generate shell completion scripts
    GenerateCompletion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl From<WorkoutTypeCli> for WorkoutType {
    fn from(value: WorkoutTypeCli) -> Self {
        match value {
            WorkoutTypeCli::Running => WorkoutType::Running,
            WorkoutTypeCli::Cycling => WorkoutType::Cycling,
        }
    }
}

impl From<SortCli> for SortKey {
    fn from(value: SortCli) -> Self {
        match value {
            SortCli::Default => SortKey::Default,
            SortCli::Distance => SortKey::Distance,
            SortCli::Duration => SortKey::Duration,
        }
    }
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
