// src/render.rs
use std::fmt::Write;

use crate::workout::{Workout, WorkoutId, WorkoutKind};

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn detail_row(out: &mut String, icon: &str, value: &str, unit: &str) {
    // Writing to a String cannot fail.
    let _ = write!(
        out,
        r#"<div class="workout__details"><span class="workout__icon">{icon}</span><span class="workout__value">{value}</span><span class="workout__unit">{unit}</span></div>"#
    );
}

/// Markup for the inside of one list item (title, actions, metric rows).
fn render_workout_body(workout: &Workout) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        r##"<h2 class="workout__title">{}</h2><div class="workout__toggles toggle--hidden"><a href="#" class="workout__toggle_btn toggle__btn-Edit" data-type="edit">Edit</a><a href="#" class="workout__toggle_btn toggle__btn-Delete" data-type="delete">Delete</a></div>"##,
        escape_html(&workout.description)
    );
    detail_row(
        &mut out,
        workout.workout_type().icon(),
        &workout.distance_km.to_string(),
        "km",
    );
    detail_row(&mut out, "⏱", &workout.duration_min.to_string(), "min");

    match workout.kind {
        WorkoutKind::Running { cadence, pace } => {
            detail_row(&mut out, "⚡️", &format!("{pace:.1}"), "min/km");
            detail_row(&mut out, "🦶🏼", &cadence.to_string(), "spm");
        }
        WorkoutKind::Cycling {
            elevation_gain,
            speed,
        } => {
            detail_row(&mut out, "⚡️", &format!("{speed:.1}"), "km/h");
            detail_row(&mut out, "⛰", &elevation_gain.to_string(), "m");
        }
    }
    out
}

/// Full list item for one workout. Same input, same markup.
pub fn render_workout(workout: &Workout) -> String {
    format!(
        r#"<li class="workout workout--{}" data-id="{}">{}</li>"#,
        workout.workout_type(),
        escape_html(workout.id.as_str()),
        render_workout_body(workout)
    )
}

/// The rendered workout list, one entry per workout in display order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListView {
    items: Vec<(WorkoutId, String)>,
}

impl ListView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_one(&mut self, workout: &Workout) {
        self.items.push((workout.id.clone(), render_workout(workout)));
    }

    pub fn replace_all<'a, I: IntoIterator<Item = &'a Workout>>(&mut self, workouts: I) {
        self.items = workouts
            .into_iter()
            .map(|w| (w.id.clone(), render_workout(w)))
            .collect();
    }

    /// Re-renders the item for `workout` in place. Returns false if it isn't listed.
    pub fn replace_one(&mut self, workout: &Workout) -> bool {
        match self.items.iter_mut().find(|(id, _)| *id == workout.id) {
            Some(item) => {
                item.1 = render_workout(workout);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &WorkoutId) -> bool {
        let before = self.items.len();
        self.items.retain(|(item_id, _)| item_id != id);
        self.items.len() != before
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &WorkoutId> {
        self.items.iter().map(|(id, _)| id)
    }

    pub fn item(&self, id: &WorkoutId) -> Option<&str> {
        self.items
            .iter()
            .find(|(item_id, _)| item_id == id)
            .map(|(_, html)| html.as_str())
    }

    pub fn to_html(&self) -> String {
        let mut out = String::from(r#"<ul class="workouts">"#);
        for (_, html) in &self.items {
            out.push_str(html);
        }
        out.push_str("</ul>");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workout::Coords;
    use chrono::{TimeZone, Utc};

    fn run() -> Workout {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 6, 0, 0).unwrap();
        Workout::running("1700000001".into(), at, Coords::new(1.0, 1.0), 5.0, 27.0, 172.0)
    }

    fn ride() -> Workout {
        let at = Utc.with_ymd_and_hms(2024, 3, 6, 6, 0, 0).unwrap();
        Workout::cycling("1700000002".into(), at, Coords::new(2.0, 2.0), 40.0, 90.0, 310.0)
    }

    #[test]
    fn running_item_shows_pace_and_cadence() {
        let html = render_workout(&run());
        assert!(html.starts_with(r#"<li class="workout workout--running" data-id="1700000001">"#));
        assert!(html.contains("Running on March 5"));
        assert!(html.contains(r#"<span class="workout__value">5.4</span><span class="workout__unit">min/km</span>"#));
        assert!(html.contains(r#"<span class="workout__value">172</span><span class="workout__unit">spm</span>"#));
        assert!(!html.contains("km/h"));
        assert!(html.contains(r#"data-type="edit""#));
        assert!(html.contains(r#"data-type="delete""#));
    }

    #[test]
    fn cycling_item_shows_speed_and_elevation() {
        let html = render_workout(&ride());
        assert!(html.contains(r#"<span class="workout__value">26.7</span><span class="workout__unit">km/h</span>"#));
        assert!(html.contains(r#"<span class="workout__value">310</span><span class="workout__unit">m</span>"#));
        assert!(!html.contains("spm"));
    }

    #[test]
    fn rendering_is_idempotent() {
        assert_eq!(render_workout(&run()), render_workout(&run()));
    }

    #[test]
    fn stored_text_is_escaped() {
        let mut w = run();
        w.description = "<script>alert(1)</script>".into();
        let html = render_workout(&w);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn list_modes_keep_items_in_sync() {
        let mut list = ListView::new();
        list.append_one(&run());
        list.append_one(&ride());
        assert_eq!(list.len(), 2);

        let mut edited = run();
        edited.distance_km = 6.0;
        edited.recompute_metric();
        assert!(list.replace_one(&edited));
        assert_eq!(list.item(&edited.id), Some(render_workout(&edited).as_str()));

        list.replace_all([&ride(), &run()]);
        let ids: Vec<_> = list.ids().cloned().collect();
        assert_eq!(ids, vec![ride().id, run().id]);

        assert!(list.remove(&ride().id));
        assert!(!list.remove(&ride().id));
        assert!(list.to_html().starts_with(r#"<ul class="workouts"><li"#));
    }
}
