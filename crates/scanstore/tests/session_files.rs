mod common;

use std::fs;

use anyhow::Result;
use common::{populated_store, scan, TestFixture};
use pretty_assertions::assert_eq;
use scanstore::stream::{BinarySink, SectionSink, TextSink};
use scanstore::{
    CheckpointEncoding, CodecError, KindFilter, ReservedSlot, SessionEncoding, SessionError, SessionStore,
    StoreConfig, Trial, Volume,
};

fn roundtrip(file_name: &str) -> Result<()> {
    let fixture = TestFixture::new();
    let path = fixture.path(file_name);

    let store = populated_store();
    store.save_session_as(&path, SessionEncoding::from_path(&path))?;

    let restored = SessionStore::new();
    restored.load_session(&path)?;

    assert_eq!(restored.snapshot(), store.snapshot());
    Ok(())
}

#[test]
fn test_text_roundtrip() -> Result<()> {
    roundtrip("session.txt")
}

#[test]
fn test_binary_roundtrip() -> Result<()> {
    roundtrip("session.dat")
}

/// A session built from a subset of the reserved slots, with or without
/// each task map.
fn session_with(slots: &[ReservedSlot], task_volumes: bool, task_trials: bool) -> SessionStore {
    let store = SessionStore::new();
    let mut volume = scan(1, 1);
    store.add_volume(&mut volume);

    for (nr, &slot) in (1..).zip(slots) {
        store.set_slot(slot, Some(scan(0, nr)));
    }
    if task_volumes {
        store.set_task_volumes("Localizer", vec![volume]).expect("task name");
        store.set_task_volumes("Rest", Vec::new()).expect("task name");
    }
    if task_trials {
        store.set_task_trials("Localizer", vec![Trial::with_duration(1, 20).at(4.0)]);
        store.set_task_trials("Empty", Vec::new());
    }
    store
}

#[test]
fn test_roundtrip_across_session_shapes() -> Result<()> {
    use ReservedSlot::*;

    let slot_sets: [&[ReservedSlot]; 8] = [
        &[],
        &[Correction],
        &[Realignment],
        &[GlobalMask],
        &[GlobalRtMask],
        &[RoiMask],
        &[Realignment, GlobalRtMask],
        &ReservedSlot::ALL,
    ];
    let task_maps = [
        ("no task collections", false, false),
        ("task volumes only", true, false),
        ("trials without task volumes", false, true),
        ("task volumes and trials", true, true),
    ];

    let fixture = TestFixture::new();
    for (set, slots) in slot_sets.iter().enumerate() {
        for (label, task_volumes, task_trials) in task_maps {
            let store = session_with(slots, task_volumes, task_trials);
            for extension in ["txt", "dat"] {
                let path = fixture.path(&format!("shape{set}_{task_volumes}_{task_trials}.{extension}"));
                store.save_session_as(&path, SessionEncoding::from_path(&path))?;

                let restored = SessionStore::new();
                restored.load_session(&path)?;
                assert_eq!(
                    restored.snapshot(),
                    store.snapshot(),
                    "slots {slots:?}, {label}, .{extension}"
                );
            }
        }
    }
    Ok(())
}

#[test]
fn test_empty_session_roundtrip() -> Result<()> {
    let fixture = TestFixture::new();
    let store = SessionStore::new();

    for file_name in ["empty.txt", "empty.dat"] {
        let path = fixture.path(file_name);
        store.save_session_as(&path, SessionEncoding::from_path(&path))?;

        let restored = SessionStore::new();
        restored.add_volume(&mut scan(9, 9));
        restored.load_session(&path)?;
        assert!(restored.snapshot().is_empty(), "{file_name} should load empty");
    }
    Ok(())
}

#[test]
fn test_binary_keeps_derived_values_text_drops_them() -> Result<()> {
    let fixture = TestFixture::new();
    let store = SessionStore::new();
    let mut volume = Volume {
        roi_values: Some(vec![101.5, 99.25]),
        detrended_roi_values: Some(vec![0.75]),
        is_roi_masked: true,
        ..scan(1, 1)
    };
    store.add_volume(&mut volume);

    let binary = fixture.path("derived.dat");
    let text = fixture.path("derived.txt");
    store.save_session_binary(&binary)?;
    store.save_session(&text)?;

    let restored = SessionStore::new();
    restored.load_session(&binary)?;
    assert_eq!(restored.volumes("allVolumes"), Some(vec![volume.clone()]));

    restored.load_session(&text)?;
    let from_text = restored.volumes("allVolumes").unwrap_or_default();
    assert_eq!(from_text.len(), 1);
    assert_eq!(from_text[0].roi_values, None);
    assert!(!from_text[0].is_roi_masked);
    assert_eq!(
        Volume {
            roi_values: None,
            detrended_roi_values: None,
            is_roi_masked: false,
            ..volume
        },
        from_text[0]
    );
    Ok(())
}

#[test]
fn test_text_file_layout() -> Result<()> {
    let fixture = TestFixture::new();
    let path = fixture.path("layout.txt");
    populated_store().save_session(&path)?;

    let text = fs::read_to_string(&path)?;
    let markers: Vec<&str> = text.lines().filter(|line| line.starts_with('<')).collect();
    assert_eq!(
        markers,
        vec![
            "<allVolumes type=\"volumes\">",
            "<\\allVolumes>",
            "<taskVolumes>",
            "<Localizer type=\"volumes\">",
            "<\\Localizer>",
            "<Baseline type=\"volumes\">",
            "<\\Baseline>",
            "<\\taskVolumes>",
            "<corrVolume type=\"volumes\">",
            "<\\corrVolume>",
            "<globalMask type=\"volumes\">",
            "<\\globalMask>",
            "<roiMask type=\"volumes\">",
            "<\\roiMask>",
            "<taskTrials>",
            "<Localizer type=\"blocks\">",
            "<\\Localizer>",
            "<Feedback type=\"blocks\">",
            "<\\Feedback>",
            "<\\taskTrials>",
        ]
    );
    Ok(())
}

/// Sections A (volumes), B (blocks), C (volumes), with no wrappers.
fn write_abc(sink: &mut impl SectionSink) -> Result<(), CodecError> {
    sink.write_volumes("A", &[scan(1, 1), scan(1, 2)])?;
    sink.write_trials("B", &[Trial::with_duration(1, 5)])?;
    sink.write_volumes("C", &[scan(2, 1)])
}

fn abc_files(fixture: &TestFixture) -> Result<Vec<std::path::PathBuf>> {
    let text_path = fixture.path("abc.txt");
    let mut text = TextSink::new(fs::File::create(&text_path)?, &text_path);
    write_abc(&mut text)?;
    text.finish()?;

    let binary_path = fixture.path("abc.dat");
    let mut binary = BinarySink::new(fs::File::create(&binary_path)?, &binary_path);
    write_abc(&mut binary)?;
    binary.finish()?;

    Ok(vec![text_path, binary_path])
}

#[test]
fn test_selective_read() -> Result<()> {
    let fixture = TestFixture::new();
    let store = SessionStore::new();

    for path in abc_files(&fixture)? {
        let selected = store.read_volume_variables_from_file(&path, &["A", "C", "Z"])?;

        assert_eq!(selected.get("A"), Some(&[scan(1, 1), scan(1, 2)][..]));
        assert_eq!(selected.get("C"), Some(&[scan(2, 1)][..]));
        assert!(!selected.is_found("Z"));
        assert!(!selected.is_requested("B"));
        assert_eq!(selected.missing().collect::<Vec<_>>(), vec!["Z"]);

        // B is a blocks section; asking for it as volumes finds nothing
        let selected = store.read_volume_variables_from_file(&path, &["B"])?;
        assert!(!selected.is_found("B"));

        let trials = store.read_trial_variables_from_file(&path, &["B", "A"])?;
        assert_eq!(trials.get("B"), Some(&[Trial::with_duration(1, 5)][..]));
        assert!(!trials.is_found("A"));
    }
    Ok(())
}

#[test]
fn test_listing_filters_by_kind() -> Result<()> {
    let fixture = TestFixture::new();
    let store = SessionStore::new();

    for path in abc_files(&fixture)? {
        assert_eq!(store.list_variable_names_in_file(&path, KindFilter::VOLUMES)?, vec!["A", "C"]);
        assert_eq!(store.list_variable_names_in_file(&path, KindFilter::BLOCKS)?, vec!["B"]);
        assert_eq!(store.list_variable_names_in_file(&path, KindFilter::ALL)?, vec!["A", "B", "C"]);
    }
    Ok(())
}

#[test]
fn test_listing_two_sections() -> Result<()> {
    let fixture = TestFixture::new();
    let path = fixture.path("ab.txt");
    let mut sink = TextSink::new(fs::File::create(&path)?, &path);
    sink.write_volumes("A", &[scan(1, 1)])?;
    sink.write_trials("B", &[Trial::new(2)])?;
    sink.finish()?;

    let names = SessionStore::new().list_variable_names_in_file(&path, KindFilter::VOLUMES)?;
    assert_eq!(names, vec!["A"]);
    Ok(())
}

#[test]
fn test_session_file_listing() -> Result<()> {
    let fixture = TestFixture::new();
    let path = fixture.path("session.dat");
    let store = populated_store();
    store.save_session_binary(&path)?;

    assert_eq!(
        store.list_variable_names_in_file(&path, KindFilter::VOLUMES)?,
        vec!["allVolumes", "Localizer", "Baseline", "corrVolume", "globalMask", "roiMask"]
    );
    assert_eq!(
        store.list_variable_names_in_file(&path, KindFilter::BLOCKS)?,
        vec!["Localizer", "Feedback"]
    );
    Ok(())
}

#[test]
fn test_truncated_binary_fails_listing() -> Result<()> {
    let fixture = TestFixture::new();
    let path = fixture.path("cut.dat");
    populated_store().save_session_binary(&path)?;

    let bytes = fs::read(&path)?;
    fs::write(&path, &bytes[..bytes.len() - 3])?;

    let err = SessionStore::new()
        .list_variable_names_in_file(&path, KindFilter::ALL)
        .unwrap_err();
    assert!(
        matches!(err, SessionError::Codec(CodecError::Truncated { .. })),
        "unexpected error: {err:?}"
    );
    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let fixture = TestFixture::new();
    let err = SessionStore::new()
        .list_variable_names_in_file(fixture.path("nope.txt"), KindFilter::ALL)
        .unwrap_err();
    assert!(matches!(err, SessionError::Codec(CodecError::Io { .. })));
}

#[test]
fn test_empty_request_does_not_open_file() -> Result<()> {
    let fixture = TestFixture::new();
    let names: [&str; 0] = [];
    let selected = SessionStore::new().read_volume_variables_from_file(fixture.path("nope.dat"), &names)?;
    assert!(selected.is_empty());
    Ok(())
}

#[test]
fn test_failed_load_leaves_session_untouched() -> Result<()> {
    let fixture = TestFixture::new();
    let path = fixture.path("broken.txt");
    fs::write(&path, "<taskVolumes>\n<Loc type=\"volumes\">\nheader\n")?;

    let store = populated_store();
    let before = store.snapshot();
    let revision = store.revision();

    assert!(store.load_session(&path).is_err());
    assert_eq!(store.snapshot(), before);
    assert_eq!(store.revision(), revision);
    Ok(())
}

#[test]
fn test_text_rows_that_fail_are_dropped() -> Result<()> {
    let fixture = TestFixture::new();
    let path = fixture.path("partial.txt");
    populated_store().save_session(&path)?;

    // The first row naming this file is the allVolumes copy
    let text = fs::read_to_string(&path)?;
    let mut lines: Vec<String> = text.lines().map(String::from).collect();
    let position = lines
        .iter()
        .position(|line| line.contains("/scans/run1/f0002.nii"))
        .expect("row present");
    lines[position] = "garbage\trow".to_string();
    fs::write(&path, lines.join("\n"))?;

    let store = SessionStore::new();
    store.load_session(&path)?;
    assert_eq!(store.volume_count("allVolumes"), 3);
    assert_eq!(store.task_volume_count("Localizer"), 4);

    let ids: Vec<i32> = store
        .volumes("allVolumes")
        .unwrap_or_default()
        .iter()
        .map(|volume| volume.volume_id)
        .collect();
    assert_eq!(ids, vec![10_001, 10_003, 10_004]);
    Ok(())
}

#[test]
fn test_import_applies_found_variables() -> Result<()> {
    let fixture = TestFixture::new();
    let path = fixture.path("import.txt");
    populated_store().save_session(&path)?;

    let store = SessionStore::new();
    let applied = store.import_volume_variables(&path, &["Localizer", "Baseline", "corrVolume", "Missing"])?;
    assert_eq!(applied, vec!["Localizer", "corrVolume"]);
    assert_eq!(store.task_volume_count("Localizer"), 4);
    assert_eq!(store.task_volumes("Baseline"), None);
    assert_eq!(store.slot(ReservedSlot::Correction), Some(scan(0, 1)));

    let applied = store.import_trial_variables(&path, &["Feedback"])?;
    assert_eq!(applied, vec!["Feedback"]);
    assert_eq!(store.task_trials("Feedback"), Some(vec![Trial::with_duration(3, 10)]));
    Ok(())
}

#[test]
fn test_checkpoint_writes_configured_encodings() -> Result<()> {
    let fixture = TestFixture::new();
    let config = StoreConfig::with_session_dir(fixture.path("checkpoints"));
    let store = populated_store();

    let written = store.save_checkpoint(&config, "StartPhase_3")?;
    assert_eq!(written.len(), 2);
    for path in &written {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert!(name.starts_with("SessionData___StartPhase_3___"), "{name}");
        assert!(path.exists());

        let restored = SessionStore::new();
        restored.load_session(path)?;
        assert_eq!(restored.snapshot(), store.snapshot());
    }
    assert_eq!(written[0].extension().and_then(|e| e.to_str()), Some("txt"));
    assert_eq!(written[1].extension().and_then(|e| e.to_str()), Some("dat"));

    let text_only = config.checkpoint_encoding(CheckpointEncoding::Text);
    assert_eq!(store.save_checkpoint(&text_only, "end")?.len(), 1);
    Ok(())
}

fn assert_unencodable(result: Result<(), SessionError>) {
    assert!(
        matches!(result, Err(SessionError::Codec(CodecError::Unencodable { .. }))),
        "unexpected result: {result:?}"
    );
}

#[test]
fn test_unencodable_text_keeps_previous_file() -> Result<()> {
    let fixture = TestFixture::new();
    let path = fixture.path("session.txt");
    let store = populated_store();
    store.save_session(&path)?;
    let saved = store.snapshot();
    let bytes = fs::read(&path)?;

    let tabbed = Volume {
        filepath: Some("/scans/run 1\tcopy/f1.nii".into()),
        ..scan(2, 1)
    };
    let bad = SessionStore::new();
    bad.set_volumes("allVolumes", vec![tabbed]);
    assert_unencodable(bad.save_session(&path));

    let stamped = SessionStore::new();
    stamped.set_slot(ReservedSlot::Realignment, Some(Volume {
        date_time: "20240401\n101500".to_string(),
        ..scan(2, 2)
    }));
    assert_unencodable(stamped.save_session(&path));

    store.set_task_trials("Run\n1", vec![Trial::new(1)]);
    assert_unencodable(store.save_session(&path));
    assert_unencodable(store.save_session_binary(fixture.path("session.dat")));

    assert_eq!(fs::read(&path)?, bytes);
    let restored = SessionStore::new();
    restored.load_session(&path)?;
    assert_eq!(restored.snapshot(), saved);

    let leftovers: Vec<_> = fs::read_dir(fixture.dir.path())?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("session.txt")]);
    Ok(())
}

#[test]
fn test_binary_keeps_tabs_in_text_fields() -> Result<()> {
    let fixture = TestFixture::new();
    let path = fixture.path("tabs.dat");
    let store = SessionStore::new();
    let mut volume = Volume {
        filepath: Some("/scans/run 1\tcopy/f1.nii".into()),
        ..scan(1, 1)
    };
    store.add_volume(&mut volume);
    store.save_session_binary(&path)?;

    let restored = SessionStore::new();
    restored.load_session(&path)?;
    assert_eq!(restored.volumes("allVolumes"), Some(vec![volume]));
    Ok(())
}
