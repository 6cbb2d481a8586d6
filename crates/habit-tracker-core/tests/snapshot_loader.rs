//! Integration tests for reading snapshot files from disk.

use std::fs;

use habit_tracker_core::{HabitStatus, SnapshotError, load_snapshot, snapshot_mtime};

#[test]
fn loads_profiles_with_children() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("perfiles.json");
    fs::write(
        &path,
        r#"[
          {"id": "1700000000", "nombre": "Ana", "email": "a@x.com", "contraseña": "h1",
           "habitos_programados": [{"id": "5", "nombre": "Run", "hora": "07:00", "activo": true}],
           "historial_habitos": [{"id": "6", "nombre": "Run", "hora": "07:00", "estado": "completed",
                                  "fecha": "2024-05-01T07:05:00"}]},
          {"nombre": "Sin id"}
        ]"#,
    )
    .expect("write snapshot");

    let profiles = load_snapshot(&path).expect("load");
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles[0].scheduled_habits.len(), 1);
    assert_eq!(profiles[0].history[0].status(), Some(HabitStatus::Completed));
    assert!(profiles[1].id.is_none());
}

#[test]
fn missing_file_is_not_found() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.json");
    assert!(matches!(
        load_snapshot(&path),
        Err(SnapshotError::NotFound { .. })
    ));
    assert!(matches!(
        snapshot_mtime(&path),
        Err(SnapshotError::NotFound { .. })
    ));
}

#[test]
fn malformed_file_is_parse_error_not_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("perfiles.json");
    fs::write(&path, "[{\"nombre\": \"Ana\",]").expect("write");
    match load_snapshot(&path) {
        Err(SnapshotError::Parse { line, .. }) => assert_eq!(line, 1),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn mtime_is_readable_for_existing_file() {
    let file = tempfile::NamedTempFile::new().expect("temp file");
    assert!(snapshot_mtime(file.path()).is_ok());
}
