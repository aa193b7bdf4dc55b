//! Settings persistence tests.

use geoset::{Error, Settings};

#[test]
fn test_settings_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("geoset.json");

    let settings = Settings {
        parallel_modify: false,
        min_parallel_nodes: 16,
        num_threads: Some(4),
    };
    settings.save(&path).unwrap();
    let loaded = Settings::load(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_settings_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Settings::load(dir.path().join("missing.json"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_settings_bad_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, b"{ \"parallel_modify\": 3 }").unwrap();
    assert!(matches!(Settings::load(file.path()), Err(Error::Json(_))));
}
