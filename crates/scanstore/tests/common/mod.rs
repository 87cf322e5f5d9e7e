//! Shared fixtures for the session file tests.

#![allow(dead_code)]

use scanstore::{
    AutoProcessType, HeaderCorrection, OrientationTransform, ReservedSlot, SessionStore, Trial, Volume,
    VolumeSource,
};
use std::path::PathBuf;
use tempfile::TempDir;

/// A scratch directory that lives as long as the test.
pub struct TestFixture {
    pub dir: TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.path().join(file_name)
    }
}

/// A collected volume with every row column away from its default.
pub fn scan(sub_dir: i32, nr: i32) -> Volume {
    Volume {
        volume_source: VolumeSource::Collected,
        filepath: Some(PathBuf::from(format!("/scans/run{sub_dir}/f{nr:04}.nii"))),
        time_stamp: 1_712_000_000_000_000 + i64::from(nr) * 2_000_000,
        date_time: "20240401_101500".to_string(),
        volume_id: sub_dir * 10_000 + nr,
        volume_nr: nr,
        sub_dir_nr: sub_dir,
        condition: nr % 3,
        predictive_quality: 1,
        matched: true,
        header_correction: HeaderCorrection::StandardHeader,
        orient_data_correction: OrientationTransform::new(3).expect("valid transform"),
        rev_orient_data_correction: OrientationTransform::new(4).expect("valid transform"),
        realigned: true,
        smoothed: 6,
        auto_process_type: AutoProcessType::CorrectRealignSmooth,
        auto_process_success: true,
        auto_process_time: 0.25 * f64::from(nr),
        ..Volume::default()
    }
}

/// A session with every kind of content: indexed volumes, two task lists
/// (one empty), three filled slots, and two trial designs.
pub fn populated_store() -> SessionStore {
    let store = SessionStore::new();

    let mut localizer = Vec::new();
    for nr in 1..=4 {
        let mut volume = scan(1, nr);
        store.add_volume(&mut volume);
        localizer.push(volume);
    }
    store.set_task_volumes("Localizer", localizer).expect("task name");
    store.set_task_volumes("Baseline", Vec::new()).expect("task name");

    store.set_slot(ReservedSlot::Correction, Some(scan(0, 1)));
    store.set_slot(ReservedSlot::GlobalMask, Some(scan(0, 2)));
    store.set_slot(ReservedSlot::RoiMask, Some(scan(0, 3)));

    store.set_task_trials(
        "Localizer",
        vec![
            Trial::with_duration(1, 20).at(0.0),
            Trial::with_duration(2, 20).at(20.0),
            Trial { condition: 1, duration: 20, onset: 40.0, onset2: 42.5 },
        ],
    );
    store.set_task_trials("Feedback", vec![Trial::with_duration(3, 10)]);
    store
}
