use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use workout_map_lib::{
    AppError, Banner, Config, Coords, FixedPosition, FormState, FormValues, GeolocationError,
    KeyValueStore, MemoryMap, MemoryStore, Persistence, SortKey, SqliteStore, StorageError,
    ValidationError, Workout, WorkoutApp, WorkoutId, WorkoutType,
};

type TestApp = WorkoutApp<MemoryMap, MemoryStore>;

fn home() -> Coords {
    Coords::new(40.7128, -74.0060)
}

// Helper function to create a controller with an in-memory map and store, map ready
fn create_test_app() -> TestApp {
    let config = Config {
        home: Some(home()),
        ..Default::default()
    };
    let mut app = WorkoutApp::new(MemoryMap::new(), MemoryStore::new(), &config);
    app.restore();
    app.locate(&FixedPosition(config.home));
    app
}

fn running(distance: &str, duration: &str, cadence: &str) -> FormValues {
    FormValues {
        workout_type: WorkoutType::Running,
        distance: distance.into(),
        duration: duration.into(),
        cadence: cadence.into(),
        ..Default::default()
    }
}

fn cycling(distance: &str, duration: &str, elevation: &str) -> FormValues {
    FormValues {
        workout_type: WorkoutType::Cycling,
        distance: distance.into(),
        duration: duration.into(),
        elevation: elevation.into(),
        ..Default::default()
    }
}

fn log(app: &mut TestApp, at: Coords, values: &FormValues) -> Result<WorkoutId> {
    assert!(app.on_map_click(at));
    Ok(app.submit_new(values)?)
}

fn at(n: f64) -> Coords {
    Coords::new(40.0 + n / 100.0, -74.0 - n / 100.0)
}

#[test]
fn test_running_pace_and_cycling_speed() -> Result<()> {
    let mut app = create_test_app();
    let run = log(&mut app, at(1.0), &running("7", "45", "165"))?;
    let ride = log(&mut app, at(2.0), &cycling("33", "80", "420"))?;

    let run = app.workout(&run).unwrap();
    assert_eq!(run.metric(), 45.0 / 7.0);
    assert_eq!(run.workout_type(), WorkoutType::Running);

    let ride = app.workout(&ride).unwrap();
    assert_eq!(ride.metric(), 33.0 / (80.0 / 60.0));
    assert_eq!(ride.intensity(), 420.0);
    Ok(())
}

#[test]
fn test_add_places_marker_renders_and_saves() -> Result<()> {
    let mut app = create_test_app();
    let id = log(&mut app, at(1.0), &running("5", "25", "170"))?;

    assert_eq!(app.workouts().len(), 1);
    assert_eq!(app.markers().len(), 1);
    assert_eq!(app.markers()[0].workout_id, id);
    assert_eq!(app.map().marker_count(), 1);

    let placed = app.map().marker(app.markers()[0].handle).unwrap();
    assert_eq!(placed.at, at(1.0));
    assert_eq!(placed.popup.class_name, "running-popup");
    assert!(placed.popup.content.ends_with(&app.workouts()[0].description));

    assert!(app.list().item(&id).is_some());
    assert_eq!(app.form(), &FormState::Closed);
    assert_eq!(app.banner(), Some(&Banner::Success));

    let saved = Persistence::new("workouts").load(app.store());
    assert_eq!(saved, app.workouts());
    Ok(())
}

#[test]
fn test_zero_distance_is_rejected_without_mutation() -> Result<()> {
    let mut app = create_test_app();
    assert!(app.on_map_click(at(1.0)));

    let err = app.submit_new(&running("0", "30", "170")).unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::NotPositive { .. })));
    assert!(app.workouts().is_empty());
    assert!(app.markers().is_empty());
    assert!(app.list().is_empty());
    assert!(matches!(app.banner(), Some(Banner::Error(_))));
    // The form stays open so the user can fix the input
    assert!(matches!(app.form(), FormState::Creating { .. }));
    assert!(app.store().get("workouts")?.is_none());
    Ok(())
}

#[test]
fn test_only_one_form_open_at_a_time() -> Result<()> {
    let mut app = create_test_app();
    let id = log(&mut app, at(1.0), &running("5", "25", "170"))?;

    assert!(app.on_map_click(at(2.0)));
    assert!(!app.open_edit(&id)?);
    assert_eq!(app.form(), &FormState::Creating { pending: at(2.0) });

    // A second map click doesn't move the pending position either
    assert!(!app.on_map_click(at(3.0)));
    assert_eq!(app.form(), &FormState::Creating { pending: at(2.0) });

    app.cancel_form();
    assert!(app.open_edit(&id)?);
    assert_eq!(app.edit_form_values(), Some(running("5", "25", "170")));
    assert!(!app.on_map_click(at(3.0)));
    Ok(())
}

#[test]
fn test_no_forms_before_the_map_is_ready() -> Result<()> {
    let mut app = WorkoutApp::new(MemoryMap::new(), MemoryStore::new(), &Config::default());
    assert!(!app.on_map_click(at(1.0)));
    assert!(matches!(app.open_edit(&"1".into()), Err(AppError::MapUnavailable)));
    Ok(())
}

#[test]
fn test_geolocation_failure_disables_map_for_the_session() -> Result<()> {
    let mut app = WorkoutApp::new(MemoryMap::new(), MemoryStore::new(), &Config::default());
    app.on_position(Err(GeolocationError::permission_denied()));

    assert!(!app.is_map_ready());
    assert_eq!(
        app.location_error().map(ToString::to_string).as_deref(),
        Some("Error: 1 : User denied Geolocation")
    );
    // A late success does not revive the map
    app.on_position(Ok(home()));
    assert!(!app.is_map_ready());
    assert!(app.map().view().is_none());
    assert!(matches!(app.fit_all_markers(), Err(AppError::MapUnavailable)));
    Ok(())
}

#[test]
fn test_map_opens_at_position_with_configured_zoom() -> Result<()> {
    let app = create_test_app();
    let view = app.map().view().unwrap();
    assert_eq!(view.center, home());
    assert_eq!(view.zoom, 13);
    assert!(!view.animated);
    Ok(())
}

#[test]
fn test_edit_updates_in_place_and_keeps_identity() -> Result<()> {
    let mut app = create_test_app();
    let run = log(&mut app, at(1.0), &running("5", "25", "170"))?;
    let ride = log(&mut app, at(2.0), &cycling("20", "60", "100"))?;
    let before = app.workout(&ride).unwrap().clone();
    let marker_before = app.markers().to_vec();

    app.edit_workout(&run, &running("10", "50", "180"))?;
    app.edit_workout(&ride, &cycling("30", "60", "-40"))?;

    let edited_run = app.workout(&run).unwrap();
    assert_eq!(edited_run.distance_km, 10.0);
    assert_eq!(edited_run.intensity(), 180.0);
    assert_eq!(edited_run.metric(), 5.0);

    let edited_ride = app.workout(&ride).unwrap();
    assert_eq!(edited_ride.id, before.id);
    assert_eq!(edited_ride.created_at, before.created_at);
    assert_eq!(edited_ride.coords, before.coords);
    assert_eq!(edited_ride.description, before.description);
    assert_eq!(edited_ride.intensity(), -40.0);
    assert_eq!(edited_ride.metric(), 30.0);

    assert_eq!(app.markers(), marker_before.as_slice());
    assert!(app.list().item(&ride).unwrap().contains(">30.0</span>"));
    assert_eq!(Persistence::new("workouts").load(app.store()), app.workouts());
    Ok(())
}

#[test]
fn test_invalid_edit_leaves_workout_unchanged() -> Result<()> {
    let mut app = create_test_app();
    let run = log(&mut app, at(1.0), &running("5", "25", "170"))?;
    let before = app.workout(&run).unwrap().clone();

    let err = app.edit_workout(&run, &running("5", "25", "abc")).unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::NotFinite { .. })));
    assert_eq!(app.workout(&run), Some(&before));

    let err = app.edit_workout(&"missing".into(), &running("5", "25", "170")).unwrap_err();
    assert!(matches!(err, AppError::WorkoutNotFound(_)));
    Ok(())
}

#[test]
fn test_submit_edit_through_the_form() -> Result<()> {
    let mut app = create_test_app();
    let ride = log(&mut app, at(1.0), &cycling("20", "60", "100"))?;

    assert!(matches!(app.submit_edit(&cycling("25", "60", "0")), Err(AppError::NoOpenForm)));
    assert!(app.open_edit(&ride)?);
    app.submit_edit(&cycling("25", "60", "0"))?;
    assert_eq!(app.form(), &FormState::Closed);
    assert_eq!(app.workout(&ride).unwrap().distance_km, 25.0);
    Ok(())
}

#[test]
fn test_delete_removes_exactly_one_and_keeps_order() -> Result<()> {
    let mut app = create_test_app();
    let ids: Vec<WorkoutId> = (1..=4)
        .map(|n| log(&mut app, at(n as f64), &running(&n.to_string(), "30", "170")))
        .collect::<Result<_>>()?;

    let removed = app.delete_workout(&ids[1])?;
    assert_eq!(removed.id, ids[1]);

    let remaining: Vec<_> = app.workouts().iter().map(|w| w.id.clone()).collect();
    assert_eq!(remaining, vec![ids[0].clone(), ids[2].clone(), ids[3].clone()]);
    let marker_ids: Vec<_> = app.markers().iter().map(|m| m.workout_id.clone()).collect();
    assert_eq!(marker_ids, remaining);
    assert_eq!(app.map().marker_count(), 3);
    assert_eq!(app.list().len(), 3);
    assert_eq!(Persistence::new("workouts").load(app.store()).len(), 3);

    assert!(matches!(app.delete_workout(&ids[1]), Err(AppError::WorkoutNotFound(_))));
    Ok(())
}

#[test]
fn test_sort_by_distance_is_descending_and_stable() -> Result<()> {
    let mut app = create_test_app();
    for (n, distance) in ["5", "2", "8"].iter().enumerate() {
        log(&mut app, at(n as f64), &running(distance, "30", "170"))?;
    }
    app.sort(SortKey::Distance);
    let distances: Vec<f64> = app.workouts().iter().map(|w| w.distance_km).collect();
    assert_eq!(distances, vec![8.0, 5.0, 2.0]);

    let mut app = create_test_app();
    let first = log(&mut app, at(1.0), &running("5", "20", "170"))?;
    let second = log(&mut app, at(2.0), &cycling("5", "40", "10"))?;
    let third = log(&mut app, at(3.0), &running("5", "30", "170"))?;
    app.sort(SortKey::Distance);
    let order: Vec<_> = app.workouts().iter().map(|w| w.id.clone()).collect();
    assert_eq!(order, vec![first.clone(), second.clone(), third.clone()]);

    app.sort(SortKey::Duration);
    let order: Vec<_> = app.workouts().iter().map(|w| w.id.clone()).collect();
    assert_eq!(order, vec![second, third, first]);
    let listed: Vec<_> = app.list().ids().cloned().collect();
    assert_eq!(listed, order);
    Ok(())
}

#[test]
fn test_sort_is_not_persisted_and_markers_stay_attached() -> Result<()> {
    let mut app = create_test_app();
    let small = log(&mut app, at(1.0), &running("2", "30", "170"))?;
    let big = log(&mut app, at(2.0), &running("9", "30", "170"))?;

    app.sort(SortKey::Distance);
    assert_eq!(app.workouts()[0].id, big);

    let saved: Vec<_> = Persistence::new("workouts")
        .load(app.store())
        .into_iter()
        .map(|w| w.id)
        .collect();
    assert_eq!(saved, vec![small.clone(), big.clone()]);

    // Deleting after a sort removes the marker of the deleted workout, not its old slot
    app.delete_workout(&big)?;
    assert_eq!(app.markers().len(), 1);
    assert_eq!(app.markers()[0].workout_id, small);
    assert_eq!(app.markers()[0].at, at(1.0));

    app.sort(SortKey::Default);
    assert_eq!(app.workouts()[0].id, small);
    Ok(())
}

#[test]
fn test_delete_all_clears_everything() -> Result<()> {
    let mut app = create_test_app();
    log(&mut app, at(1.0), &running("5", "25", "170"))?;
    log(&mut app, at(2.0), &cycling("20", "60", "100"))?;
    assert!(app.toolbar_visible());

    app.delete_all()?;
    assert!(app.workouts().is_empty());
    assert!(app.markers().is_empty());
    assert_eq!(app.map().marker_count(), 0);
    assert!(app.list().is_empty());
    assert!(!app.toolbar_visible());
    assert!(app.store().get("workouts")?.is_none());
    assert!(Persistence::new("workouts").load(app.store()).is_empty());
    Ok(())
}

#[test]
fn test_reload_replays_list_and_markers() -> Result<()> {
    let mut app = create_test_app();
    let run = log(&mut app, at(1.0), &running("5", "25", "170"))?;
    let ride = log(&mut app, at(2.0), &cycling("20", "60", "100"))?;
    let snapshot = app.store().clone();
    let expected = app.workouts().to_vec();

    let config = Config { home: Some(home()), ..Default::default() };
    let mut reloaded = WorkoutApp::new(MemoryMap::new(), snapshot, &config);
    reloaded.restore();
    assert_eq!(reloaded.workouts(), expected.as_slice());
    assert_eq!(reloaded.list().len(), 2);
    // Markers wait for the map
    assert!(reloaded.markers().is_empty());

    reloaded.locate(&FixedPosition(Some(home())));
    let marker_ids: Vec<_> = reloaded.markers().iter().map(|m| m.workout_id.clone()).collect();
    assert_eq!(marker_ids, vec![run, ride]);
    assert_eq!(reloaded.map().marker_count(), 2);
    Ok(())
}

#[test]
fn test_loaded_records_keep_stored_metrics() -> Result<()> {
    let mut store = MemoryStore::new();
    let created = Utc.with_ymd_and_hms(2023, 11, 2, 18, 0, 0).unwrap();
    let mut stored = Workout::running("1698948000".into(), created, at(1.0), 10.0, 50.0, 170.0);
    // Whatever pace was saved is what comes back
    if let workout_map_lib::WorkoutKind::Running { pace, .. } = &mut stored.kind {
        *pace = 4.75;
    }
    Persistence::new("workouts").save(&mut store, std::slice::from_ref(&stored))?;

    let mut app = WorkoutApp::new(MemoryMap::new(), store, &Config::default());
    app.restore();
    assert_eq!(app.workouts()[0].metric(), 4.75);
    assert_eq!(app.workouts()[0].description, "Running on November 2");
    Ok(())
}

#[test]
fn test_malformed_storage_loads_empty() -> Result<()> {
    let mut store = MemoryStore::new();
    store.set("workouts", "[{\"id\": 12")?;
    let mut app = WorkoutApp::new(MemoryMap::new(), store, &Config::default());
    app.restore();
    assert!(app.workouts().is_empty());
    assert!(app.list().is_empty());
    Ok(())
}

#[test]
fn test_center_on_and_fit_all_markers() -> Result<()> {
    let mut app = create_test_app();
    assert!(!app.fit_all_markers()?);
    assert!(app.map().fitted_bounds().is_none());

    let a = log(&mut app, Coords::new(10.0, 20.0), &running("5", "25", "170"))?;
    log(&mut app, Coords::new(12.0, 18.0), &cycling("20", "60", "100"))?;

    app.center_on(&a)?;
    let view = app.map().view().unwrap();
    assert_eq!(view.center, Coords::new(10.0, 20.0));
    assert!(view.animated);

    assert!(app.fit_all_markers()?);
    let bounds = app.map().fitted_bounds().unwrap();
    assert_eq!(bounds.south_west, Coords::new(10.0, 18.0));
    assert_eq!(bounds.north_east, Coords::new(12.0, 20.0));

    assert!(matches!(app.center_on(&"nope".into()), Err(AppError::WorkoutNotFound(_))));
    Ok(())
}

#[test]
fn test_banners_and_form_reset_expire_on_tick() -> Result<()> {
    let mut app = create_test_app();
    log(&mut app, at(1.0), &running("5", "25", "170"))?;
    assert!(app.form_reset_pending());
    assert_eq!(app.banner(), Some(&Banner::Success));

    let now = Utc::now();
    app.tick(now + Duration::milliseconds(1500));
    assert!(!app.form_reset_pending());
    assert_eq!(app.banner(), Some(&Banner::Success));

    app.tick(now + Duration::seconds(3));
    assert_eq!(app.banner(), None);
    assert_eq!(app.workouts().len(), 1);
    Ok(())
}

#[test]
fn test_sqlite_store_backs_the_controller() -> Result<()> {
    let conn = rusqlite::Connection::open_in_memory()?;
    let store = SqliteStore::from_connection(conn)?;
    let config = Config { home: Some(home()), ..Default::default() };
    let mut app = WorkoutApp::new(MemoryMap::new(), store, &config);
    app.restore();
    app.locate(&FixedPosition(config.home));

    assert!(app.on_map_click(at(1.0)));
    let id = app.submit_new(&cycling("12.5", "40", "75"))?;
    let loaded = Persistence::new("workouts").load(app.store());
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, id);
    assert_eq!(loaded[0], app.workouts()[0]);
    Ok(())
}

#[test]
fn test_overflowing_metric_is_rejected_and_storage_survives() -> Result<()> {
    let mut app = create_test_app();
    log(&mut app, at(1.0), &running("5", "25", "170"))?;
    log(&mut app, at(2.0), &running("8", "44", "175"))?;

    assert!(app.on_map_click(at(3.0)));
    let result = app.submit_new(&cycling("1e308", "1", "0"));
    assert!(matches!(
        result,
        Err(AppError::Validation(ValidationError::MetricOutOfRange { .. }))
    ));
    assert_eq!(app.workouts().len(), 2);

    let reloaded = Persistence::new("workouts").load(app.store());
    assert_eq!(reloaded, app.workouts());
    Ok(())
}

#[test]
fn test_snapshot_reproduces_computed_values_exactly() -> Result<()> {
    let created = Utc.with_ymd_and_hms(2024, 5, 20, 6, 30, 0).unwrap();
    let workouts: Vec<Workout> = (1..=2000)
        .map(|i| {
            let n = f64::from(i);
            let id = WorkoutId::from_millis(1_700_000_000_000 + i64::from(i));
            let coords = Coords::new(n * 0.013 - 12.7, n * 0.071 - 70.3);
            if i % 2 == 0 {
                Workout::running(id, created, coords, n * 0.1 + 0.3, n / 7.0 + 20.1, n * 0.3 + 150.0)
            } else {
                Workout::cycling(id, created, coords, n * 0.7 + 1.1, n / 3.0 + 40.3, n * 0.9 - 80.0)
            }
        })
        .collect();

    let mut store = MemoryStore::new();
    let persistence = Persistence::new("workouts");
    persistence.save(&mut store, &workouts)?;
    assert_eq!(persistence.load(&store), workouts);
    Ok(())
}

#[test]
fn test_new_ids_never_reuse_restored_ones() -> Result<()> {
    // Stored ids run slightly ahead of the clock, as after a clock change.
    let created = Utc::now();
    let start = created.timestamp_millis();
    let stored: Vec<Workout> = (0..2000)
        .map(|i| {
            let id = WorkoutId::from_millis(start + i);
            Workout::running(id, created, at(1.0), 5.0, 25.0, 170.0)
        })
        .collect();
    let mut store = MemoryStore::new();
    Persistence::new("workouts").save(&mut store, &stored)?;

    let config = Config { home: Some(home()), ..Default::default() };
    let mut app = WorkoutApp::new(MemoryMap::new(), store, &config);
    app.restore();
    app.locate(&FixedPosition(config.home));

    let id = log(&mut app, at(2.0), &cycling("20", "60", "100"))?;
    assert!(stored.iter().all(|w| w.id != id));

    app.delete_workout(&id)?;
    assert_eq!(app.workouts(), stored.as_slice());
    Ok(())
}

/// Reads fine, refuses every write.
struct ReadOnlyStore;

impl KeyValueStore for ReadOnlyStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
    }

    fn remove(&mut self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full")))
    }
}

#[test]
fn test_failed_save_still_closes_the_edit_form() -> Result<()> {
    let config = Config { home: Some(home()), ..Default::default() };
    let mut app = WorkoutApp::new(MemoryMap::new(), ReadOnlyStore, &config);
    app.restore();
    app.locate(&FixedPosition(config.home));

    assert!(app.on_map_click(at(1.0)));
    assert!(matches!(app.submit_new(&running("5", "25", "170")), Err(AppError::Storage(_))));
    assert_eq!(*app.form(), FormState::Closed);
    let id = app.workouts()[0].id.clone();

    assert!(app.open_edit(&id)?);
    assert!(matches!(app.submit_edit(&running("6", "30", "172")), Err(AppError::Storage(_))));
    assert_eq!(*app.form(), FormState::Closed);
    assert_eq!(app.workouts()[0].intensity(), 172.0);

    // Rejected input keeps the form open for correction
    assert!(app.open_edit(&id)?);
    assert!(matches!(app.submit_edit(&running("0", "30", "172")), Err(AppError::Validation(_))));
    assert_eq!(*app.form(), FormState::Editing { id });
    Ok(())
}
