//! Loading decoded map dumps from disk and navigating over them.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use flate2::write::GzEncoder;
use flate2::Compression;

use nav_engine_rs::NavigationEngine;

/// Two crossing streets around the usual San Francisco corner, one of
/// them oneway, plus a footpath that must be ignored.
fn dump_json() -> String {
    r#"[
        {"type": "node", "id": 1, "lat": 37.7749, "lon": -122.4194},
        {"type": "node", "id": 2, "lat": 37.7749, "lon": -122.4184},
        {"type": "node", "id": 3, "lat": 37.7749, "lon": -122.4174},
        {"type": "node", "id": 4, "lat": 37.7759, "lon": -122.4184},
        {"type": "node", "id": 5, "lat": 37.7739, "lon": -122.4184},
        {"type": "way", "id": 100, "nodes": [1, 2, 3],
         "tags": {"highway": "residential", "name": "Valencia Street"}},
        {"type": "way", "id": 101, "nodes": [5, 2, 4],
         "tags": {"highway": "residential", "name": "Guerrero Street", "oneway": "yes"}},
        {"type": "way", "id": 102, "nodes": [1, 4],
         "tags": {"highway": "footway"}}
    ]"#
    .to_string()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("nav_engine_{}_{}", std::process::id(), name))
}

#[test]
fn load_plain_json_dump() {
    let path = temp_path("plain.json");
    std::fs::write(&path, dump_json()).unwrap();

    let mut engine = NavigationEngine::new();
    assert!(engine.load_map(&path));

    // 5 nodes; way 100 yields 4 segments, oneway 101 yields 2, the
    // footway contributes nothing
    assert_eq!(engine.graph().node_count(), 5);
    assert_eq!(engine.graph().segment_count(), 6);

    std::fs::remove_file(&path).ok();
}

#[test]
fn load_gzipped_dump() {
    let path = temp_path("compressed.json.gz");
    let file = File::create(&path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(dump_json().as_bytes()).unwrap();
    encoder.finish().unwrap();

    let mut engine = NavigationEngine::new();
    assert!(engine.load_map(&path));
    assert_eq!(engine.graph().segment_count(), 6);

    std::fs::remove_file(&path).ok();
}

#[test]
fn load_missing_file_fails() {
    let mut engine = NavigationEngine::new();
    assert!(!engine.load_map(&temp_path("does_not_exist.json")));
}

#[test]
fn load_dump_without_roads_fails() {
    let path = temp_path("no_roads.json");
    std::fs::write(
        &path,
        r#"[
            {"type": "node", "id": 1, "lat": 37.7749, "lon": -122.4194},
            {"type": "node", "id": 2, "lat": 37.7749, "lon": -122.4184},
            {"type": "way", "id": 100, "nodes": [1, 2], "tags": {"highway": "footway"}}
        ]"#,
    )
    .unwrap();

    let mut engine = NavigationEngine::new();
    assert!(!engine.load_map(&path));

    std::fs::remove_file(&path).ok();
}

#[test]
fn navigate_over_loaded_dump() {
    let path = temp_path("navigate.json");
    std::fs::write(&path, dump_json()).unwrap();

    let mut engine = NavigationEngine::new();
    assert!(engine.load_map(&path));

    // Fix on Valencia Street, destination at its east end
    engine.update_location(37.7749, -122.4194, 90.0, 5.0, 5.0);
    assert!(engine.set_destination(37.7749, -122.4174));

    let observation = engine.update_location(37.7749, -122.4190, 90.0, 5.0, 5.0);
    assert_eq!(observation.street_name, "Valencia Street");

    std::fs::remove_file(&path).ok();
}
