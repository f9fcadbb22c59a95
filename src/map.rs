// src/map.rs
use std::collections::BTreeMap;

use crate::workout::{Coords, Workout};

/// Handle to a marker placed on a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerHandle(pub u64);

/// Popup bound to a marker; stays open until the user closes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub content: String,
    pub class_name: String,
    pub max_width: u32,
    pub min_width: u32,
    pub auto_close: bool,
    pub close_on_click: bool,
}

impl Popup {
    pub fn for_workout(workout: &Workout) -> Self {
        Self {
            content: workout.popup_text(),
            class_name: workout.popup_class(),
            max_width: 250,
            min_width: 100,
            auto_close: false,
            close_on_click: false,
        }
    }
}

/// Axis-aligned lat/lng box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south_west: Coords,
    pub north_east: Coords,
}

impl Bounds {
    /// Smallest box holding every point, or `None` for no points.
    pub fn around<I: IntoIterator<Item = Coords>>(points: I) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => Bounds {
                    south_west: p,
                    north_east: p,
                },
                Some(b) => Bounds {
                    south_west: Coords::new(b.south_west.lat.min(p.lat), b.south_west.lng.min(p.lng)),
                    north_east: Coords::new(b.north_east.lat.max(p.lat), b.north_east.lng.max(p.lng)),
                },
            })
        })
    }

    pub fn center(&self) -> Coords {
        Coords::new(
            (self.south_west.lat + self.north_east.lat) / 2.0,
            (self.south_west.lng + self.north_east.lng) / 2.0,
        )
    }

    pub fn contains(&self, point: Coords) -> bool {
        (self.south_west.lat..=self.north_east.lat).contains(&point.lat)
            && (self.south_west.lng..=self.north_east.lng).contains(&point.lng)
    }
}

/// What a map widget has to offer the application.
pub trait MapAdapter {
    /// Centers the view. The first call creates the view.
    fn set_view(&mut self, center: Coords, zoom: u8, animate: bool);
    fn add_marker(&mut self, at: Coords, popup: Popup) -> MarkerHandle;
    fn remove_marker(&mut self, marker: MarkerHandle);
    fn fit_bounds(&mut self, bounds: Bounds);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct View {
    pub center: Coords,
    pub zoom: u8,
    pub animated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedMarker {
    pub at: Coords,
    pub popup: Popup,
}

/// Map kept entirely in memory; records every call it receives.
#[derive(Debug, Default)]
pub struct MemoryMap {
    view: Option<View>,
    markers: BTreeMap<MarkerHandle, PlacedMarker>,
    next_handle: u64,
    fitted: Option<Bounds>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn view(&self) -> Option<View> {
        self.view
    }

    pub fn markers(&self) -> impl Iterator<Item = (&MarkerHandle, &PlacedMarker)> {
        self.markers.iter()
    }

    pub fn marker(&self, handle: MarkerHandle) -> Option<&PlacedMarker> {
        self.markers.get(&handle)
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub const fn fitted_bounds(&self) -> Option<Bounds> {
        self.fitted
    }
}

impl MapAdapter for MemoryMap {
    fn set_view(&mut self, center: Coords, zoom: u8, animate: bool) {
        tracing::debug!(%center, zoom, animate, "Map view set");
        self.view = Some(View {
            center,
            zoom,
            animated: animate,
        });
    }

    fn add_marker(&mut self, at: Coords, popup: Popup) -> MarkerHandle {
        let handle = MarkerHandle(self.next_handle);
        self.next_handle += 1;
        tracing::debug!(%at, handle = handle.0, popup = %popup.content, "Marker added");
        self.markers.insert(handle, PlacedMarker { at, popup });
        handle
    }

    fn remove_marker(&mut self, marker: MarkerHandle) {
        if self.markers.remove(&marker).is_none() {
            tracing::warn!(handle = marker.0, "Tried to remove unknown marker");
        }
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        tracing::debug!(sw = %bounds.south_west, ne = %bounds.north_east, "Map fitted to bounds");
        self.fitted = Some(bounds);
        if let Some(view) = self.view.as_mut() {
            view.center = bounds.center();
        }
    }
}
