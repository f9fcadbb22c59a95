// src/workout.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use strum_macros::Display;

/// A latitude/longitude pair. Persisted as `[lat, lng]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coords {
    pub lat: f64,
    pub lng: f64,
}

impl Coords {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<[f64; 2]> for Coords {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Self { lat, lng }
    }
}

impl From<Coords> for [f64; 2] {
    fn from(value: Coords) -> Self {
        [value.lat, value.lng]
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lng)
    }
}

// Parses "lat,lng" as typed on the command line or in config
impl FromStr for Coords {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| format!("Expected 'lat,lng', got '{s}'"))?;
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|e| format!("Invalid latitude '{}': {e}", lat.trim()))?;
        let lng: f64 = lng
            .trim()
            .parse()
            .map_err(|e| format!("Invalid longitude '{}': {e}", lng.trim()))?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(format!("Coordinates out of range: {lat},{lng}"));
        }
        Ok(Self { lat, lng })
    }
}

/// Opaque workout identifier, stable for the lifetime of the workout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkoutId(String);

impl WorkoutId {
    /// Builds an id from a millisecond timestamp, keeping its last 10 digits.
    pub fn from_millis(millis: i64) -> Self {
        let digits = millis.to_string();
        let start = digits.len().saturating_sub(10);
        Self(digits[start..].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkoutId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for WorkoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out session-unique ids derived from the creation time.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    last_millis: i64,
    taken: HashSet<WorkoutId>,
}

impl IdGenerator {
    /// Two workouts created in the same millisecond still get distinct ids,
    /// and no reserved id is ever handed out.
    pub fn next_id(&mut self, now: DateTime<Utc>) -> WorkoutId {
        let mut millis = now.timestamp_millis().max(self.last_millis + 1);
        let mut id = WorkoutId::from_millis(millis);
        while self.taken.contains(&id) {
            millis += 1;
            id = WorkoutId::from_millis(millis);
        }
        self.last_millis = millis;
        self.taken.insert(id.clone());
        id
    }

    /// Marks ids already in use, e.g. ones restored from storage.
    pub fn reserve<'a, I: IntoIterator<Item = &'a WorkoutId>>(&mut self, ids: I) {
        self.taken.extend(ids.into_iter().cloned());
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WorkoutType {
    #[default]
    Running,
    Cycling,
}

impl WorkoutType {
    pub const fn icon(self) -> &'static str {
        match self {
            WorkoutType::Running => "🏃‍♂️",
            WorkoutType::Cycling => "🚴‍♀️",
        }
    }

    /// "Running" / "Cycling", used in titles.
    pub const fn label(self) -> &'static str {
        match self {
            WorkoutType::Running => "Running",
            WorkoutType::Cycling => "Cycling",
        }
    }
}

/// Variant payload. The derived metric is stored next to the raw field so a
/// loaded record reproduces the value computed when it was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkoutKind {
    Running {
        #[serde(rename = "cadenceStepsPerMin")]
        cadence: f64,
        /// min/km
        pace: f64,
    },
    Cycling {
        #[serde(rename = "elevationGainM")]
        elevation_gain: f64,
        /// km/h
        speed: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    pub id: WorkoutId,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "coordinates")]
    pub coords: Coords,
    pub distance_km: f64,
    pub duration_min: f64,
    pub description: String,
    #[serde(flatten)]
    pub kind: WorkoutKind,
}

pub fn pace(distance_km: f64, duration_min: f64) -> f64 {
    duration_min / distance_km
}

pub fn speed(distance_km: f64, duration_min: f64) -> f64 {
    distance_km / (duration_min / 60.0)
}

/// "Running on April 14"
pub fn describe(workout_type: WorkoutType, created_at: DateTime<Utc>) -> String {
    format!("{} on {}", workout_type.label(), created_at.format("%B %-d"))
}

impl Workout {
    /// Builds a running workout. Inputs are not validated here; the form does that.
    pub fn running(
        id: WorkoutId,
        created_at: DateTime<Utc>,
        coords: Coords,
        distance_km: f64,
        duration_min: f64,
        cadence: f64,
    ) -> Self {
        Self {
            id,
            created_at,
            coords,
            distance_km,
            duration_min,
            description: describe(WorkoutType::Running, created_at),
            kind: WorkoutKind::Running {
                cadence,
                pace: pace(distance_km, duration_min),
            },
        }
    }

    /// Builds a cycling workout. Elevation gain may be negative.
    pub fn cycling(
        id: WorkoutId,
        created_at: DateTime<Utc>,
        coords: Coords,
        distance_km: f64,
        duration_min: f64,
        elevation_gain: f64,
    ) -> Self {
        Self {
            id,
            created_at,
            coords,
            distance_km,
            duration_min,
            description: describe(WorkoutType::Cycling, created_at),
            kind: WorkoutKind::Cycling {
                elevation_gain,
                speed: speed(distance_km, duration_min),
            },
        }
    }

    /// Running workout created at `now` with a fresh id from `ids`.
    pub fn new_running(
        ids: &mut IdGenerator,
        now: DateTime<Utc>,
        coords: Coords,
        distance_km: f64,
        duration_min: f64,
        cadence: f64,
    ) -> Self {
        let id = ids.next_id(now);
        Self::running(id, now, coords, distance_km, duration_min, cadence)
    }

    pub fn new_cycling(
        ids: &mut IdGenerator,
        now: DateTime<Utc>,
        coords: Coords,
        distance_km: f64,
        duration_min: f64,
        elevation_gain: f64,
    ) -> Self {
        let id = ids.next_id(now);
        Self::cycling(id, now, coords, distance_km, duration_min, elevation_gain)
    }

    pub const fn workout_type(&self) -> WorkoutType {
        match self.kind {
            WorkoutKind::Running { .. } => WorkoutType::Running,
            WorkoutKind::Cycling { .. } => WorkoutType::Cycling,
        }
    }

    /// Pace (min/km) for running, speed (km/h) for cycling.
    pub const fn metric(&self) -> f64 {
        match self.kind {
            WorkoutKind::Running { pace, .. } => pace,
            WorkoutKind::Cycling { speed, .. } => speed,
        }
    }

    pub const fn metric_unit(&self) -> &'static str {
        match self.kind {
            WorkoutKind::Running { .. } => "min/km",
            WorkoutKind::Cycling { .. } => "km/h",
        }
    }

    /// Cadence (spm) for running, elevation gain (m) for cycling.
    pub const fn intensity(&self) -> f64 {
        match self.kind {
            WorkoutKind::Running { cadence, .. } => cadence,
            WorkoutKind::Cycling { elevation_gain, .. } => elevation_gain,
        }
    }

    pub const fn intensity_unit(&self) -> &'static str {
        match self.kind {
            WorkoutKind::Running { .. } => "spm",
            WorkoutKind::Cycling { .. } => "m",
        }
    }

    pub fn recompute_metric(&mut self) {
        match &mut self.kind {
            WorkoutKind::Running { pace: p, .. } => *p = pace(self.distance_km, self.duration_min),
            WorkoutKind::Cycling { speed: s, .. } => {
                *s = speed(self.distance_km, self.duration_min);
            }
        }
    }

    pub fn popup_text(&self) -> String {
        format!("{} {}", self.workout_type().icon(), self.description)
    }

    pub fn popup_class(&self) -> String {
        format!("{}-popup", self.workout_type())
    }
}
