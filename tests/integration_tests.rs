//! Integration tests for the complete TextDB pipeline
//!
//! These tests verify end-to-end functionality across crates:
//! - Files on disk → Loader → Temporal view
//! - Temporal view → Remap (unique and grouped, chained)
//! - Reload → fresh log identity → cache invalidation
//!
//! Run with: cargo test --test integration_tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use textdb_core::{Remap, TemporalQuery, ValidityMode};
use textdb_loader::TextDb;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn t(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, day, 0, 0, 0).unwrap()
}

// ============================================================================
// Overlay modes through files on disk
// ============================================================================

#[test]
fn test_overlay_modes_end_to_end() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "runs/f2.json", r#"{"f2": true}"#);
    write(root, "runs/f3.json", r#"{"f3": true}"#);
    write(
        root,
        "runs/validity.yaml",
        "
- valid_from: 20230301T000000Z
  apply: [f3.json]
- valid_from: 20230302T000000Z
  mode: append
  apply: [f2.json]
- valid_from: 20230303T000000Z
  mode: remove
  apply: [f2.json]
- valid_from: 20230304T000000Z
  mode: reset
  apply: [f2.json]
- valid_from: 20230305T000000Z
  mode: replace
  apply: [f2.json, f3.json]
",
    );

    let db = TextDb::open_path(root).unwrap();
    let log = db.branch("runs").unwrap().validity().unwrap();
    assert_eq!(log.records()[3].mode, ValidityMode::Reset);

    let half = Duration::hours(12);
    let active = |at: DateTime<Utc>| db.active("runs", "all", at).unwrap().to_vec();
    assert_eq!(active(t(2) + half), vec!["f3", "f2"]);
    assert_eq!(active(t(3) + half), vec!["f3"]);
    assert_eq!(active(t(4) + half), vec!["f2"]);
    assert_eq!(active(t(5) + half), vec!["f2", "f3"]);
    assert!(active(t(1) - half).is_empty());

    let view = db.on("runs", &TemporalQuery::at(t(3) + half)).unwrap();
    assert_eq!(view.to_value(), json!({"f3": true}));
    let view = db.on("runs", &TemporalQuery::at(t(5) + half)).unwrap();
    assert_eq!(view.to_value(), json!({"f2": true, "f3": true}));
}

#[test]
fn test_selectors_are_independent_streams() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "cfg/base.json", r#"{"gain": 1.0, "threshold": 10}"#);
    write(root, "cfg/cal.json", r#"{"gain": 1.5}"#);
    write(root, "cfg/phy.json", r#"{"threshold": 20}"#);
    write(
        root,
        "cfg/validity.jsonl",
        concat!(
            r#"{"valid_from": "20230301T000000Z", "category": "all", "apply": ["base.json"]}"#,
            "\n",
            r#"{"valid_from": "20230302T000000Z", "category": "cal", "mode": "append", "apply": ["cal.json"]}"#,
            "\n",
            r#"{"valid_from": "20230302T000000Z", "category": "phy", "mode": "append", "apply": ["phy.json"]}"#,
            "\n",
        ),
    );

    let db = TextDb::open_path(root).unwrap();
    let at = t(3);
    let view = |selector: &str| {
        db.on("cfg", &TemporalQuery::at(at).with_selector(selector))
            .unwrap()
            .to_value()
    };
    assert_eq!(view("cal"), json!({"gain": 1.5, "threshold": 10}));
    assert_eq!(view("phy"), json!({"gain": 1.0, "threshold": 20}));
    assert_eq!(view("all"), json!({"gain": 1.0, "threshold": 10}));
    assert_eq!(view("other"), json!({"gain": 1.0, "threshold": 10}));
}

// ============================================================================
// Temporal view feeding the remap engine
// ============================================================================

fn channel_db(root: &Path) {
    write(
        root,
        "hardware/channelmaps/v1.json",
        r#"{
            "ged1": {"system": "geds", "daq": {"card": 1, "channel": 0}},
            "ged2": {"system": "geds", "daq": {"card": 1, "channel": 1}},
            "spm1": {"system": "spms", "daq": {"card": 2, "channel": 0}}
        }"#,
    );
    write(
        root,
        "hardware/channelmaps/v2.yaml",
        "
ged2:
  system: geds
  daq: {card: 3, channel: 1}
",
    );
    write(
        root,
        "hardware/channelmaps/validity.jsonl",
        concat!(
            r#"{"valid_from": "20230301T000000Z", "apply": ["v1.json"]}"#,
            "\n",
            r#"{"valid_from": "20230310T000000Z", "mode": "append", "apply": ["v2.yaml"]}"#,
        ),
    );
}

#[test]
fn test_remap_resolved_view() {
    let dir = tempdir().unwrap();
    channel_db(dir.path());
    let db = TextDb::open_path(dir.path()).unwrap();

    let before = db.on("hardware/channelmaps", &TemporalQuery::at(t(5))).unwrap();
    let by_card = before.group("daq.card").unwrap();
    assert_eq!(by_card.get(1).unwrap().len(), 2);
    assert!(before.map("daq.card").is_err());

    let after = db.on("hardware/channelmaps", &TemporalQuery::at(t(11))).unwrap();
    let by_card = after.map("daq.card").unwrap();
    assert_eq!(by_card.len(), 3);
    assert_eq!(by_card.get(3).unwrap().lookup("daq.channel").unwrap().as_i64(), Some(1));
    assert!(by_card.get(1).unwrap().lookup("system").unwrap().as_str() == Some("geds"));

    let by_system = after.group("system").unwrap();
    let geds = by_system.get("geds").unwrap().map("daq.channel").unwrap();
    assert_eq!(geds.get(1).unwrap().lookup("daq.card").unwrap().as_i64(), Some(3));
    assert_eq!(
        by_system.to_value().unwrap()["spms"],
        json!({"0": {"system": "spms", "daq": {"card": 2, "channel": 0}}})
    );
}

#[test]
fn test_temporal_query_from_root() {
    let dir = tempdir().unwrap();
    channel_db(dir.path());
    write(dir.path(), "detectors.json", r#"{"ged1": {"mass": 2.1}}"#);
    let db = TextDb::open_path(dir.path()).unwrap();

    let view = db.on(".", &TemporalQuery::new("20230311T000000Z").unwrap()).unwrap();
    assert_eq!(view.get("detectors").unwrap(), db.get("detectors.json").unwrap());
    let maps = view
        .get("hardware")
        .and_then(|hw| hw.as_branch())
        .and_then(|hw| hw.get("channelmaps"))
        .unwrap();
    assert_eq!(maps.lookup("ged2.daq.card").unwrap().as_i64(), Some(3));

    let Remap::Grouped(grouped) = db.map("hardware/channelmaps/v1", "system", false).unwrap() else {
        panic!("expected grouped result");
    };
    assert_eq!(grouped.keys().count(), 2);
}

// ============================================================================
// Reload
// ============================================================================

#[test]
fn test_reload_picks_up_new_records() {
    let dir = tempdir().unwrap();
    channel_db(dir.path());
    let mut db = TextDb::open_path(dir.path()).unwrap();
    let query = TemporalQuery::at(t(20));

    let first_id = db.branch("hardware/channelmaps").unwrap().validity().unwrap().id();
    let view = db.on("hardware/channelmaps", &query).unwrap();
    assert_eq!(view.lookup("ged2.daq.card").unwrap().as_i64(), Some(3));
    assert!(!db.cache().is_empty());

    write(
        dir.path(),
        "hardware/channelmaps/validity.jsonl",
        concat!(
            r#"{"valid_from": "20230301T000000Z", "apply": ["v1.json"]}"#,
            "\n",
            r#"{"valid_from": "20230310T000000Z", "mode": "append", "apply": ["v2.yaml"]}"#,
            "\n",
            r#"{"valid_from": "20230315T000000Z", "mode": "remove", "apply": ["v2.yaml"]}"#,
        ),
    );
    db.reload().unwrap();

    let second_id = db.branch("hardware/channelmaps").unwrap().validity().unwrap().id();
    assert_ne!(first_id, second_id);
    let view = db.on("hardware/channelmaps", &query).unwrap();
    assert_eq!(view.lookup("ged2.daq.card").unwrap().as_i64(), Some(1));
}
