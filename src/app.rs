// src/app.rs
use chrono::{DateTime, Utc};
use strum_macros::Display;
use thiserror::Error;

use crate::config::Config;
use crate::form::{self, FormState, FormValues, ValidationError};
use crate::locate::{GeolocationError, GeolocationProvider};
use crate::map::{Bounds, MapAdapter, MarkerHandle, Popup};
use crate::notice::{Notices, UiTimer};
use crate::render::ListView;
use crate::storage::{KeyValueStore, Persistence, StorageError};
use crate::workout::{Coords, IdGenerator, Workout, WorkoutId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Workout not found: ID {0}")]
    WorkoutNotFound(WorkoutId),
    #[error("The map is not available; no position could be determined.")]
    MapUnavailable,
    #[error("No form is open.")]
    NoOpenForm,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SortKey {
    /// Creation order.
    #[default]
    Default,
    Distance,
    Duration,
}

impl SortKey {
    fn value(self, workout: &Workout) -> f64 {
        match self {
            SortKey::Default => 0.0,
            SortKey::Distance => workout.distance_km,
            SortKey::Duration => workout.duration_min,
        }
    }
}

/// Transient banner currently on screen.
#[derive(Debug, Clone, PartialEq)]
pub enum Banner {
    Success,
    Error(String),
}

/// A marker on the map, tied to the workout it shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub workout_id: WorkoutId,
    pub handle: MarkerHandle,
    pub at: Coords,
}

/// Settings the controller reads from `Config`.
#[derive(Debug, Clone, Copy)]
struct Settings {
    zoom: u8,
    notice_ms: u64,
    form_reset_ms: u64,
}

/// Owns the workout list and keeps the map, the rendered list and storage in step with it.
pub struct WorkoutApp<M: MapAdapter, S: KeyValueStore> {
    map: M,
    store: S,
    persistence: Persistence,
    settings: Settings,
    workouts: Vec<Workout>,
    markers: Vec<Marker>,
    list: ListView,
    form: FormState,
    notices: Notices,
    banner: Option<Banner>,
    map_ready: bool,
    location_error: Option<GeolocationError>,
    ids: IdGenerator,
}

impl<M: MapAdapter, S: KeyValueStore> WorkoutApp<M, S> {
    pub fn new(map: M, store: S, config: &Config) -> Self {
        Self {
            map,
            store,
            persistence: Persistence::new(config.storage_key.clone()),
            settings: Settings {
                zoom: config.map_zoom_level,
                notice_ms: config.notice_ms,
                form_reset_ms: config.form_reset_ms,
            },
            workouts: Vec::new(),
            markers: Vec::new(),
            list: ListView::new(),
            form: FormState::Closed,
            notices: Notices::new(),
            banner: None,
            map_ready: false,
            location_error: None,
            ids: IdGenerator::default(),
        }
    }

    // --- Accessors ---

    pub fn workouts(&self) -> &[Workout] {
        &self.workouts
    }

    pub fn workout(&self, id: &WorkoutId) -> Option<&Workout> {
        self.workouts.iter().find(|w| w.id == *id)
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn list(&self) -> &ListView {
        &self.list
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn location_error(&self) -> Option<&GeolocationError> {
        self.location_error.as_ref()
    }

    pub const fn is_map_ready(&self) -> bool {
        self.map_ready
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The delete-all / sort / show-all toolbar is offered once there is more than one workout.
    pub fn toolbar_visible(&self) -> bool {
        self.workouts.len() > 1
    }

    /// Whether a just-closed form is still hidden waiting for its layout reset.
    pub fn form_reset_pending(&self) -> bool {
        self.notices.is_pending(UiTimer::FormReset)
    }

    // --- Startup ---

    /// Loads the stored snapshot and renders it. Markers follow once the map is ready.
    pub fn restore(&mut self) {
        self.workouts = self.persistence.load(&self.store);
        self.ids.reserve(self.workouts.iter().map(|w| &w.id));
        self.list.replace_all(&self.workouts);
        if self.map_ready {
            self.place_all_markers();
        }
        tracing::debug!(count = self.workouts.len(), "Restored workouts");
    }

    /// Asks `provider` for the current position and hands the answer to `on_position`.
    pub fn locate<G: GeolocationProvider + ?Sized>(&mut self, provider: &G) {
        let position = provider.current_position();
        self.on_position(position);
    }

    /// Geolocation callback. Success opens the map and replays markers; failure
    /// leaves the map unavailable for the rest of the session.
    pub fn on_position(&mut self, position: Result<Coords, GeolocationError>) {
        if self.map_ready || self.location_error.is_some() {
            tracing::debug!("Ignoring repeated position callback");
            return;
        }
        match position {
            Ok(coords) => {
                self.map.set_view(coords, self.settings.zoom, false);
                self.map_ready = true;
                self.place_all_markers();
                tracing::info!(%coords, "Map ready");
            }
            Err(e) => {
                tracing::warn!(code = e.code, message = %e.message, "Geolocation failed");
                self.location_error = Some(e);
            }
        }
    }

    fn place_all_markers(&mut self) {
        for marker in self.markers.drain(..) {
            self.map.remove_marker(marker.handle);
        }
        let placed: Vec<Marker> = self
            .workouts
            .iter()
            .map(|w| Marker {
                workout_id: w.id.clone(),
                handle: self.map.add_marker(w.coords, Popup::for_workout(w)),
                at: w.coords,
            })
            .collect();
        self.markers = placed;
    }

    fn index_of(&self, id: &WorkoutId) -> Result<usize, AppError> {
        self.workouts
            .iter()
            .position(|w| w.id == *id)
            .ok_or_else(|| AppError::WorkoutNotFound(id.clone()))
    }

    // --- Forms ---

    /// Map click: opens the creation form for `coords`. No-op while another form
    /// is open or before the map is ready.
    pub fn on_map_click(&mut self, coords: Coords) -> bool {
        if !self.map_ready {
            return false;
        }
        let opened = self.form.open_create(coords);
        if opened {
            self.notices.cancel(UiTimer::FormReset);
        }
        opened
    }

    /// Opens the edit form for `id` and centers the map on it. No-op while
    /// another form is open.
    /// # Errors
    /// `AppError::MapUnavailable` before the map is ready, `WorkoutNotFound` for unknown ids.
    pub fn open_edit(&mut self, id: &WorkoutId) -> Result<bool, AppError> {
        if !self.map_ready {
            return Err(AppError::MapUnavailable);
        }
        self.center_on(id)?;
        let opened = self.form.open_edit(id.clone());
        if opened {
            self.notices.cancel(UiTimer::FormReset);
        }
        Ok(opened)
    }

    /// Values the open edit form is pre-filled with.
    pub fn edit_form_values(&self) -> Option<FormValues> {
        match &self.form {
            FormState::Editing { id } => self.workout(id).map(FormValues::from_workout),
            _ => None,
        }
    }

    pub fn cancel_form(&mut self) {
        if self.form.is_open() {
            self.hide_form(Utc::now());
        }
    }

    fn hide_form(&mut self, now: DateTime<Utc>) {
        self.form.close();
        self.notices.schedule(UiTimer::FormReset, now, self.settings.form_reset_ms);
    }

    fn show_success(&mut self, now: DateTime<Utc>) {
        self.notices.cancel(UiTimer::ErrorBanner);
        self.banner = Some(Banner::Success);
        self.notices.schedule(UiTimer::SuccessBanner, now, self.settings.notice_ms);
    }

    fn show_error(&mut self, error: &ValidationError, now: DateTime<Utc>) {
        self.notices.cancel(UiTimer::SuccessBanner);
        self.banner = Some(Banner::Error(error.to_string()));
        self.notices.schedule(UiTimer::ErrorBanner, now, self.settings.notice_ms);
    }

    /// Fires due UI resets. Never touches workout data.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<UiTimer> {
        let fired = self.notices.tick(now);
        for timer in &fired {
            match timer {
                UiTimer::SuccessBanner if self.banner == Some(Banner::Success) => self.banner = None,
                UiTimer::ErrorBanner if matches!(self.banner, Some(Banner::Error(_))) => {
                    self.banner = None;
                }
                _ => {}
            }
        }
        fired
    }

    /// Submits the open creation form.
    /// # Errors
    /// `NoOpenForm` if the creation form isn't open; `Validation` if the input is
    /// rejected (the form stays open and nothing is added); `Storage` if saving fails.
    pub fn submit_new(&mut self, values: &FormValues) -> Result<WorkoutId, AppError> {
        let pending = match self.form {
            FormState::Creating { pending } => pending,
            _ => return Err(AppError::NoOpenForm),
        };
        let now = Utc::now();
        let workout = match form::submit_new(values, Some(pending), &mut self.ids, now) {
            Ok(workout) => workout,
            Err(e) => {
                self.show_error(&e, now);
                return Err(e.into());
            }
        };
        let id = workout.id.clone();
        self.show_success(now);
        self.hide_form(now);
        self.add_workout(workout)?;
        Ok(id)
    }

    /// Submits the open edit form.
    /// # Errors
    /// `NoOpenForm` if the edit form isn't open, otherwise as `edit_workout`.
    /// Only a rejected input keeps the form open.
    pub fn submit_edit(&mut self, values: &FormValues) -> Result<(), AppError> {
        let id = match &self.form {
            FormState::Editing { id } => id.clone(),
            _ => return Err(AppError::NoOpenForm),
        };
        let result = self.edit_workout(&id, values);
        if !matches!(result, Err(AppError::Validation(_))) {
            self.hide_form(Utc::now());
        }
        result
    }

    // --- Collection operations ---

    /// Appends a workout, marks it on the map, renders it and saves.
    /// # Errors
    /// Returns `AppError::Storage` if the snapshot cannot be written.
    pub fn add_workout(&mut self, workout: Workout) -> Result<(), AppError> {
        if self.map_ready {
            let handle = self.map.add_marker(workout.coords, Popup::for_workout(&workout));
            self.markers.push(Marker {
                workout_id: workout.id.clone(),
                handle,
                at: workout.coords,
            });
        }
        self.list.append_one(&workout);
        tracing::debug!(id = %workout.id, kind = %workout.workout_type(), "Workout added");
        self.workouts.push(workout);
        self.save()
    }

    /// Validates `values` and applies them to workout `id` in place.
    /// # Errors
    /// `WorkoutNotFound`, `Validation` (workout unchanged), or `Storage`.
    pub fn edit_workout(&mut self, id: &WorkoutId, values: &FormValues) -> Result<(), AppError> {
        let index = self.index_of(id)?;
        let now = Utc::now();
        if let Err(e) = form::submit_edit(&mut self.workouts[index], values) {
            self.show_error(&e, now);
            return Err(e.into());
        }
        self.show_success(now);
        self.list.replace_one(&self.workouts[index]);
        tracing::debug!(%id, "Workout edited");
        self.save()
    }

    /// Removes workout `id`, its marker and its list item, then saves.
    /// # Errors
    /// `WorkoutNotFound` or `Storage`.
    pub fn delete_workout(&mut self, id: &WorkoutId) -> Result<Workout, AppError> {
        let index = self.index_of(id)?;
        let removed = self.workouts.remove(index);
        if let Some(pos) = self.markers.iter().position(|m| m.workout_id == *id) {
            let marker = self.markers.remove(pos);
            self.map.remove_marker(marker.handle);
        }
        self.list.remove(id);
        if matches!(&self.form, FormState::Editing { id: editing } if editing == id) {
            self.form.close();
        }
        tracing::debug!(%id, "Workout deleted");
        self.save()?;
        Ok(removed)
    }

    /// Reorders the list, largest first, keeping the relative order of ties.
    /// The new order is shown but not saved.
    pub fn sort(&mut self, key: SortKey) {
        match key {
            SortKey::Default => self.workouts.sort_by_key(|w| w.created_at),
            _ => self
                .workouts
                .sort_by(|a, b| key.value(b).total_cmp(&key.value(a))),
        }
        self.list.replace_all(&self.workouts);
        tracing::debug!(%key, "Workouts sorted");
    }

    /// Removes every workout and marker and clears the stored snapshot.
    /// # Errors
    /// Returns `AppError::Storage` if the snapshot cannot be removed.
    pub fn delete_all(&mut self) -> Result<(), AppError> {
        for marker in self.markers.drain(..) {
            self.map.remove_marker(marker.handle);
        }
        self.workouts.clear();
        self.form.close();
        self.list.replace_all(&self.workouts);
        self.persistence.clear(&mut self.store)?;
        tracing::info!("All workouts deleted");
        Ok(())
    }

    /// Pans (animated) to workout `id` at the configured zoom.
    /// # Errors
    /// `MapUnavailable` or `WorkoutNotFound`.
    pub fn center_on(&mut self, id: &WorkoutId) -> Result<(), AppError> {
        if !self.map_ready {
            return Err(AppError::MapUnavailable);
        }
        let index = self.index_of(id)?;
        let coords = self.workouts[index].coords;
        self.map.set_view(coords, self.settings.zoom, true);
        Ok(())
    }

    /// Fits the view around every marker. Returns false when there are none.
    /// # Errors
    /// `MapUnavailable` before the map is ready.
    pub fn fit_all_markers(&mut self) -> Result<bool, AppError> {
        if !self.map_ready {
            return Err(AppError::MapUnavailable);
        }
        match Bounds::around(self.markers.iter().map(|m| m.at)) {
            Some(bounds) => {
                self.map.fit_bounds(bounds);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn save(&mut self) -> Result<(), AppError> {
        self.persistence
            .save(&mut self.store, &self.workouts)
            .map_err(AppError::from)
    }
}
