// src/form.rs
use chrono::{DateTime, Utc};
use strum_macros::Display;
use thiserror::Error;

use crate::workout::{self, Coords, IdGenerator, Workout, WorkoutId, WorkoutKind, WorkoutType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FormField {
    Distance,
    Duration,
    Cadence,
    Elevation,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Please fill in the {field} field.")]
    Missing { field: FormField },
    #[error("Inputs have to be finite numbers: {field} was '{input}'.")]
    NotFinite { field: FormField, input: String },
    #[error("Inputs have to be positive numbers: {field} was {value}.")]
    NotPositive { field: FormField, value: f64 },
    #[error("Distance {distance_km} km over {duration_min} min gives a {metric} that can't be recorded.")]
    MetricOutOfRange {
        metric: &'static str,
        distance_km: f64,
        duration_min: f64,
    },
    #[error("Click on the map to choose where the workout happened.")]
    NoPendingPosition,
}

/// Raw text of the form inputs, as typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormValues {
    pub workout_type: WorkoutType,
    pub distance: String,
    pub duration: String,
    pub cadence: String,
    pub elevation: String,
}

impl FormValues {
    /// Pre-fills an edit form from an existing workout.
    pub fn from_workout(workout: &Workout) -> Self {
        let mut values = Self {
            workout_type: workout.workout_type(),
            distance: workout.distance_km.to_string(),
            duration: workout.duration_min.to_string(),
            ..Default::default()
        };
        match workout.kind {
            WorkoutKind::Running { cadence, .. } => values.cadence = cadence.to_string(),
            WorkoutKind::Cycling { elevation_gain, .. } => {
                values.elevation = elevation_gain.to_string();
            }
        }
        values
    }
}

/// Which type-specific input row is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldVisibility {
    pub cadence: bool,
    pub elevation: bool,
}

pub const fn visible_fields(workout_type: WorkoutType) -> FieldVisibility {
    match workout_type {
        WorkoutType::Running => FieldVisibility { cadence: true, elevation: false },
        WorkoutType::Cycling => FieldVisibility { cadence: false, elevation: true },
    }
}

/// Which form (if any) is on screen. At most one at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FormState {
    #[default]
    Closed,
    Creating { pending: Coords },
    Editing { id: WorkoutId },
}

impl FormState {
    pub const fn is_open(&self) -> bool {
        !matches!(self, FormState::Closed)
    }

    /// Returns false (and changes nothing) when a form is already open.
    pub fn open_create(&mut self, pending: Coords) -> bool {
        if self.is_open() {
            return false;
        }
        *self = FormState::Creating { pending };
        true
    }

    pub fn open_edit(&mut self, id: WorkoutId) -> bool {
        if self.is_open() {
            return false;
        }
        *self = FormState::Editing { id };
        true
    }

    pub fn close(&mut self) {
        *self = FormState::Closed;
    }
}

/// Validated numbers for one submission; `intensity` is cadence or elevation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Checked {
    distance_km: f64,
    duration_min: f64,
    intensity: f64,
}

fn parse_number(field: FormField, input: &str) -> Result<f64, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing { field });
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::NotFinite {
            field,
            input: trimmed.to_string(),
        }),
    }
}

fn require_positive(field: FormField, value: f64) -> Result<f64, ValidationError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::NotPositive { field, value })
    }
}

// All fields must be finite before any sign check runs.
fn check(workout_type: WorkoutType, values: &FormValues) -> Result<Checked, ValidationError> {
    let distance = parse_number(FormField::Distance, &values.distance)?;
    let duration = parse_number(FormField::Duration, &values.duration)?;
    let intensity = match workout_type {
        WorkoutType::Running => parse_number(FormField::Cadence, &values.cadence)?,
        WorkoutType::Cycling => parse_number(FormField::Elevation, &values.elevation)?,
    };

    let distance_km = require_positive(FormField::Distance, distance)?;
    let duration_min = require_positive(FormField::Duration, duration)?;
    let intensity = match workout_type {
        WorkoutType::Running => require_positive(FormField::Cadence, intensity)?,
        WorkoutType::Cycling => intensity,
    };

    // Extreme but positive inputs can still overflow the derived metric.
    let (metric, value) = match workout_type {
        WorkoutType::Running => ("pace", workout::pace(distance_km, duration_min)),
        WorkoutType::Cycling => ("speed", workout::speed(distance_km, duration_min)),
    };
    if !value.is_finite() {
        return Err(ValidationError::MetricOutOfRange {
            metric,
            distance_km,
            duration_min,
        });
    }

    Ok(Checked {
        distance_km,
        duration_min,
        intensity,
    })
}

/// Validates a creation form and builds the workout of the selected type.
/// # Errors
/// Returns `ValidationError` if a field is missing, non-finite, or out of range,
/// or if no map position was picked.
pub fn submit_new(
    values: &FormValues,
    pending: Option<Coords>,
    ids: &mut IdGenerator,
    now: DateTime<Utc>,
) -> Result<Workout, ValidationError> {
    let checked = check(values.workout_type, values)?;
    let coords = pending.ok_or(ValidationError::NoPendingPosition)?;
    let workout = match values.workout_type {
        WorkoutType::Running => Workout::new_running(
            ids,
            now,
            coords,
            checked.distance_km,
            checked.duration_min,
            checked.intensity,
        ),
        WorkoutType::Cycling => Workout::new_cycling(
            ids,
            now,
            coords,
            checked.distance_km,
            checked.duration_min,
            checked.intensity,
        ),
    };
    Ok(workout)
}

/// Validates an edit form and applies it in place. The workout keeps its type,
/// id, position and description; the derived metric is recomputed.
/// # Errors
/// Returns `ValidationError` without touching the workout if any field is invalid.
pub fn submit_edit(workout: &mut Workout, values: &FormValues) -> Result<(), ValidationError> {
    let checked = check(workout.workout_type(), values)?;

    workout.distance_km = checked.distance_km;
    workout.duration_min = checked.duration_min;
    match &mut workout.kind {
        WorkoutKind::Running { cadence, .. } => *cadence = checked.intensity,
        WorkoutKind::Cycling { elevation_gain, .. } => *elevation_gain = checked.intensity,
    }
    workout.recompute_metric();
    Ok(())
}
