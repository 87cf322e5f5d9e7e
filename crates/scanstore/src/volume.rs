//! Volume: metadata for one collected or generated imaging scan.
//!
//! A volume never carries voxel data. The image itself lives on disk at
//! `filepath`; the store only keeps identity, provenance, processing state,
//! and (optionally) the signal values extracted from the region of interest.

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a volume came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VolumeSource {
    /// Picked up from the scanner export directory.
    Collected,
    /// Produced by processing (masks, means, realignment targets).
    #[default]
    Generated,
}

impl VolumeSource {
    pub fn code(self) -> i64 {
        match self {
            Self::Collected => 0,
            Self::Generated => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Collected),
            1 => Some(Self::Generated),
            _ => None,
        }
    }
}

/// Which header the image was corrected to, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HeaderCorrection {
    #[default]
    None,
    StandardHeader,
    CorrectionVolume,
}

impl HeaderCorrection {
    pub fn code(self) -> i64 {
        match self {
            Self::None => 0,
            Self::StandardHeader => 1,
            Self::CorrectionVolume => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::StandardHeader),
            2 => Some(Self::CorrectionVolume),
            _ => None,
        }
    }
}

/// How a volume was processed automatically on arrival.
///
/// Each step implies the ones before it: realignment runs after correction,
/// ROI extraction after realignment (and smoothing, when present).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AutoProcessType {
    #[default]
    None,
    Correct,
    CorrectRealign,
    CorrectRealignRoi,
    CorrectRealignRoiDetrend,
    CorrectRealignSmooth,
    CorrectRealignSmoothRoi,
    CorrectRealignSmoothRoiDetrend,
}

impl AutoProcessType {
    const ALL: [Self; 8] = [
        Self::None,
        Self::Correct,
        Self::CorrectRealign,
        Self::CorrectRealignRoi,
        Self::CorrectRealignRoiDetrend,
        Self::CorrectRealignSmooth,
        Self::CorrectRealignSmoothRoi,
        Self::CorrectRealignSmoothRoiDetrend,
    ];

    pub fn code(self) -> i64 {
        Self::ALL
            .iter()
            .position(|candidate| *candidate == self)
            .map_or(0, |index| index as i64)
    }

    pub fn from_code(code: i64) -> Option<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }
}

/// Orientation transform tag assigned by the imaging-format layer.
///
/// The tag identifies one of the 48 axis flip/rotation combinations that map
/// scanner output onto the reference orientation. The store treats it as
/// opaque and only checks the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct OrientationTransform(u8);

impl OrientationTransform {
    pub const NONE: Self = Self(0);
    pub const MAX_CODE: u8 = 47;

    pub fn new(code: u8) -> Option<Self> {
        (code <= Self::MAX_CODE).then_some(Self(code))
    }

    pub fn code(self) -> i64 {
        i64::from(self.0)
    }

    pub fn from_code(code: i64) -> Option<Self> {
        u8::try_from(code).ok().and_then(Self::new)
    }
}

impl TryFrom<u8> for OrientationTransform {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::new(code).ok_or_else(|| {
            format!("orientation transform {} out of range 0..={}", code, Self::MAX_CODE)
        })
    }
}

impl From<OrientationTransform> for u8 {
    fn from(transform: OrientationTransform) -> Self {
        transform.0
    }
}

/// Metadata record for one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volume {
    pub volume_source: VolumeSource,
    pub filepath: Option<PathBuf>,
    /// Microseconds since the Unix epoch at construction.
    pub time_stamp: i64,
    /// Local wall clock at construction, `YYYYMMDD_HHMMSS`.
    pub date_time: String,

    /// Subdirectory number * 10000 + file sequence number.
    pub volume_id: i32,
    pub volume_nr: i32,
    pub sub_dir_nr: i32,
    /// Assigned by the store on append; -1 until then.
    pub volume_index_in_session: i32,

    pub discarded: bool,
    /// Whether a predicted trigger was matched with an incoming file.
    pub matched: bool,
    /// -1 unexpected, 0 ad hoc, 1 predicted, 2 predicted with directory correction.
    pub predictive_quality: i32,
    pub condition: i32,

    pub header_correction: HeaderCorrection,
    pub orient_data_correction: OrientationTransform,
    pub rev_orient_data_correction: OrientationTransform,
    pub realigned: bool,
    /// FWHM applied, 0 when unsmoothed.
    pub smoothed: i32,

    pub roi_values: Option<Vec<f64>>,
    pub detrended_roi_values: Option<Vec<f64>>,

    pub auto_process_type: AutoProcessType,
    pub auto_process_success: bool,
    pub auto_process_time: f64,

    pub is_global_masked: bool,
    pub is_roi_masked: bool,
}

impl Volume {
    /// Create a volume stamped with the current time.
    pub fn new(volume_source: VolumeSource) -> Self {
        Self {
            volume_source,
            time_stamp: Utc::now().timestamp_micros(),
            date_time: Local::now().format(crate::DATE_TIME_FORMAT).to_string(),
            ..Self::default()
        }
    }

    /// Create a volume for an image file on disk.
    pub fn with_path(volume_source: VolumeSource, filepath: impl Into<PathBuf>) -> Self {
        Self {
            filepath: Some(filepath.into()),
            ..Self::new(volume_source)
        }
    }

    /// Whether this volume has been appended to a session.
    pub fn is_indexed(&self) -> bool {
        self.volume_index_in_session >= 0
    }
}

impl Default for Volume {
    /// An unstamped volume with every field at its "unknown" value.
    fn default() -> Self {
        Self {
            volume_source: VolumeSource::Generated,
            filepath: None,
            time_stamp: 0,
            date_time: String::new(),
            volume_id: -1,
            volume_nr: -1,
            sub_dir_nr: -1,
            volume_index_in_session: -1,
            discarded: false,
            matched: false,
            predictive_quality: -1,
            condition: -1,
            header_correction: HeaderCorrection::None,
            orient_data_correction: OrientationTransform::NONE,
            rev_orient_data_correction: OrientationTransform::NONE,
            realigned: false,
            smoothed: 0,
            roi_values: None,
            detrended_roi_values: None,
            auto_process_type: AutoProcessType::None,
            auto_process_success: false,
            auto_process_time: 0.0,
            is_global_masked: false,
            is_roi_masked: false,
        }
    }
}
