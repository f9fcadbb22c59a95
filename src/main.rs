//src/main.rs
mod cli; // Keep cli module for parsing args

use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use std::io::{self, stdin, stdout, Write};
use tracing_subscriber::EnvFilter;

use workout_map_lib::{
    AppError, AppService, FormValues, Workout, WorkoutId, WorkoutType,
};

fn main() -> Result<()> {
    init_logging();

    let cli_args = cli::parse_args(); // Parse arguments once
    let export_csv = cli_args.export_csv;

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command();
        let bin_name = cmd.get_name().to_string();
        eprintln!("Generating completion script for {shell}...");
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    let mut service = AppService::initialize().context("Failed to initialize application service")?;
    // A workout's own position stands in for a live fix when nothing else is known.
    let add_at = match &cli_args.command {
        cli::Commands::Add { at, .. } => *at,
        _ => None,
    };
    service.locate(cli_args.position.or(add_at));

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }
        cli::Commands::Add { type_, at, distance, duration, cadence, elevation } => {
            let workout_type = WorkoutType::from(type_);
            let at = at.or(cli_args.position).or(service.config.home);
            let Some(at) = at else {
                bail!("No position given. Use --at, --position, or set `home` in {:?}.", service.get_config_path());
            };
            require_map(&service)?;
            if !service.app.on_map_click(at) {
                bail!("Could not open the workout form.");
            }

            let values = FormValues {
                workout_type,
                distance,
                duration,
                cadence: cadence.unwrap_or_default(),
                elevation: elevation.unwrap_or_default(),
            };
            match service.app.submit_new(&values) {
                Ok(id) => {
                    let description = service.app.workout(&id).map_or("", |w| w.description.as_str());
                    println!("Workout logged: {description} at {at} (ID: {id})");
                }
                Err(AppError::Validation(e)) => bail!("Error: {e}"),
                Err(e) => return Err(e).context("Failed to save the new workout"),
            }
        }
        cli::Commands::Edit { id, distance, duration, cadence, elevation } => {
            let id = WorkoutId::from(id.as_str());
            let Some(existing) = service.app.workout(&id) else {
                bail!(AppError::WorkoutNotFound(id));
            };
            let mut values = FormValues::from_workout(existing);
            if let Some(v) = distance { values.distance = v; }
            if let Some(v) = duration { values.duration = v; }
            if let Some(v) = cadence { values.cadence = v; }
            if let Some(v) = elevation { values.elevation = v; }

            match service.app.edit_workout(&id, &values) {
                Ok(()) => println!("Successfully updated workout ID {id}."),
                Err(AppError::Validation(e)) => bail!("Error: {e}"),
                Err(e) => bail!("Error editing workout ID {id}: {e}"),
            }
        }
        cli::Commands::Delete { id } => {
            let id = WorkoutId::from(id.as_str());
            match service.app.delete_workout(&id) {
                Ok(removed) => println!("Deleted workout ID {id} ({}).", removed.description),
                Err(e) => bail!("Error deleting workout: {e}"),
            }
        }
        cli::Commands::DeleteAll { yes } => {
            let count = service.app.workouts().len();
            if count == 0 {
                println!("No workouts to delete.");
                return Ok(());
            }
            if !yes && !confirm(&format!("Delete all {count} workouts? [y/N]: "))? {
                println!("Cancelled.");
                return Ok(());
            }
            service.app.delete_all().context("Failed to delete workouts")?;
            println!("Deleted {count} workouts.");
        }
        cli::Commands::List { sort } => {
            service.app.sort(sort.into());
            let workouts = service.app.workouts();
            if workouts.is_empty() {
                println!("No workouts logged yet. Add one with `workout-map add`.");
            } else if export_csv {
                print_workout_csv(workouts)?;
            } else {
                let header_color = workout_map_lib::parse_color(&service.config.theme.header_color)
                    .map(Color::from)
                    .unwrap_or(Color::Green); // Fallback
                print_workout_table(workouts, header_color);
            }
        }
        cli::Commands::Show { id } => {
            let id = WorkoutId::from(id.as_str());
            require_map(&service)?;
            service.app.center_on(&id)?;
            if let Some(view) = service.app.map().view() {
                println!("Map centered on {} at zoom {}.", view.center, view.zoom);
            }
            if let Some(workout) = service.app.workout(&id) {
                println!("{}", workout.popup_text());
            }
        }
        cli::Commands::ShowAll => {
            require_map(&service)?;
            if service.app.fit_all_markers()? {
                if let Some(bounds) = service.app.map().fitted_bounds() {
                    println!(
                        "Map fitted to {} markers: {} to {}.",
                        service.app.markers().len(),
                        bounds.south_west,
                        bounds.north_east
                    );
                }
            } else {
                println!("No markers to show.");
            }
        }
        cli::Commands::Render { sort } => {
            service.app.sort(sort.into());
            println!("{}", service.app.list().to_html());
        }
        cli::Commands::ConfigPath => {
            println!("{}", service.get_config_path().display());
        }
        cli::Commands::DbPath => {
            println!("{}", service.get_db_path().display());
        }
    }

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn require_map(service: &AppService) -> Result<()> {
    if let Some(e) = service.app.location_error() {
        bail!("{e}. Pass --position or set `home` in {:?}.", service.get_config_path());
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    stdout().flush()?;
    let mut input = String::new();
    stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_workout_table(workouts: &[Workout], header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(header_color),
            Cell::new("Date (UTC)").fg(header_color),
            Cell::new("Type").fg(header_color),
            Cell::new("Distance (km)").fg(header_color),
            Cell::new("Duration (min)").fg(header_color),
            Cell::new("Pace / Speed").fg(header_color),
            Cell::new("Cadence / Elevation").fg(header_color),
            Cell::new("Position").fg(header_color),
        ]);

    for workout in workouts {
        table.add_row(vec![
            Cell::new(workout.id.to_string()),
            Cell::new(workout.created_at.format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(workout.workout_type().to_string()),
            Cell::new(workout.distance_km.to_string()),
            Cell::new(workout.duration_min.to_string()),
            Cell::new(format!("{:.1} {}", workout.metric(), workout.metric_unit())),
            Cell::new(format!("{} {}", workout.intensity(), workout.intensity_unit())),
            Cell::new(workout.coords.to_string()),
        ]);
    }
    println!("{table}");
}

fn print_workout_csv(workouts: &[Workout]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "ID",
        "Timestamp_UTC",
        "Type",
        "Distance_km",
        "Duration_min",
        "Pace_min_per_km",
        "Speed_km_per_h",
        "Cadence_spm",
        "Elevation_m",
        "Lat",
        "Lng",
    ])?;

    for workout in workouts {
        let (pace, speed, cadence, elevation) = match workout.workout_type() {
            WorkoutType::Running => (
                format!("{:.2}", workout.metric()),
                String::new(),
                workout.intensity().to_string(),
                String::new(),
            ),
            WorkoutType::Cycling => (
                String::new(),
                format!("{:.2}", workout.metric()),
                String::new(),
                workout.intensity().to_string(),
            ),
        };
        writer.write_record(&[
            workout.id.to_string(),
            workout.created_at.to_rfc3339(),
            workout.workout_type().to_string(),
            workout.distance_km.to_string(),
            workout.duration_min.to_string(),
            pace,
            speed,
            cadence,
            elevation,
            workout.coords.lat.to_string(),
            workout.coords.lng.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
