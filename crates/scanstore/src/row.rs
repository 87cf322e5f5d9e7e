//! Row codec: one entity per tab-separated line.
//!
//! Column order is part of the file format and must not change:
//!
//! ```text
//! Trial:  duration  condition  onset  onset2
//! Volume: volumeSource volumeId volumeNr subDirNr volumeIndexInSession
//!         timeStamp dateTime condition filePath discarded matched
//!         predictiveQuality headerCorrection orientDataCorrection
//!         revOrientDataCorrection realigned smoothed autoProcessType
//!         autoProcessSuccess autoProcessTime
//! ```
//!
//! Volume rows are strict: exactly 20 columns or the row is rejected. Trial
//! rows may omit trailing columns, which then read as zero, and anything
//! past `onset2` is ignored.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::RowError;
use crate::trial::Trial;
use crate::volume::{AutoProcessType, HeaderCorrection, OrientationTransform, Volume, VolumeSource};

const SEPARATOR: char = '\t';

/// An entity with a fixed-column text representation.
pub trait Row: Sized {
    /// Column names in file order.
    const COLUMNS: &'static [&'static str];

    /// The header line written after every section start marker.
    fn header_line() -> String {
        Self::COLUMNS.join("\t")
    }

    fn to_row(&self) -> String;

    fn from_row(line: &str) -> Result<Self, RowError>;
}

/// Split a line into columns, ignoring a trailing carriage return.
fn columns(line: &str) -> Vec<&str> {
    line.strip_suffix('\r').unwrap_or(line).split(SEPARATOR).collect()
}

fn number<T: FromStr>(column: &'static str, value: &str) -> Result<T, RowError> {
    value.trim().parse().map_err(|_| RowError::InvalidField {
        column,
        value: value.to_string(),
    })
}

fn code<T>(
    column: &'static str,
    value: &str,
    decode: impl FnOnce(i64) -> Option<T>,
) -> Result<T, RowError> {
    let raw: i64 = number(column, value)?;
    decode(raw).ok_or(RowError::UnknownCode { column, code: raw })
}

/// Case-insensitive "true" or "1"; everything else is false.
pub fn parse_flag(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("true") || value == "1"
}

fn flag(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

impl Row for Trial {
    const COLUMNS: &'static [&'static str] = &["duration", "condition", "onset", "onset2"];

    fn to_row(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            self.duration, self.condition, self.onset, self.onset2
        )
    }

    fn from_row(line: &str) -> Result<Self, RowError> {
        let fields = columns(line);

        let mut trial = Trial::default();
        for (index, value) in fields.iter().take(Self::COLUMNS.len()).enumerate() {
            let column = Self::COLUMNS[index];
            match index {
                0 => trial.duration = number(column, value)?,
                1 => trial.condition = number(column, value)?,
                2 => trial.onset = number(column, value)?,
                _ => trial.onset2 = number(column, value)?,
            }
        }
        Ok(trial)
    }
}

impl Row for Volume {
    const COLUMNS: &'static [&'static str] = &[
        "volumeSource",
        "volumeId",
        "volumeNr",
        "subDirNr",
        "volumeIndexInSession",
        "timeStamp",
        "dateTime",
        "condition",
        "filePath",
        "discarded",
        "matched",
        "predictiveQuality",
        "headerCorrection",
        "orientDataCorrection",
        "revOrientDataCorrection",
        "realigned",
        "smoothed",
        "autoProcessType",
        "autoProcessSuccess",
        "autoProcessTime",
    ];

    /// Derived ROI vectors and masking flags are not part of the row.
    fn to_row(&self) -> String {
        let filepath = self
            .filepath
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_default();

        let fields: [String; 20] = [
            self.volume_source.code().to_string(),
            self.volume_id.to_string(),
            self.volume_nr.to_string(),
            self.sub_dir_nr.to_string(),
            self.volume_index_in_session.to_string(),
            self.time_stamp.to_string(),
            self.date_time.clone(),
            self.condition.to_string(),
            filepath,
            flag(self.discarded).to_string(),
            flag(self.matched).to_string(),
            self.predictive_quality.to_string(),
            self.header_correction.code().to_string(),
            self.orient_data_correction.code().to_string(),
            self.rev_orient_data_correction.code().to_string(),
            flag(self.realigned).to_string(),
            self.smoothed.to_string(),
            self.auto_process_type.code().to_string(),
            flag(self.auto_process_success).to_string(),
            self.auto_process_time.to_string(),
        ];
        fields.join("\t")
    }

    fn from_row(line: &str) -> Result<Self, RowError> {
        let f = columns(line);
        if f.len() != Self::COLUMNS.len() {
            return Err(RowError::ColumnCount {
                expected: Self::COLUMNS.len(),
                found: f.len(),
            });
        }
        let c = Self::COLUMNS;

        Ok(Volume {
            volume_source: code(c[0], f[0], VolumeSource::from_code)?,
            volume_id: number(c[1], f[1])?,
            volume_nr: number(c[2], f[2])?,
            sub_dir_nr: number(c[3], f[3])?,
            volume_index_in_session: number(c[4], f[4])?,
            time_stamp: number(c[5], f[5])?,
            date_time: f[6].to_string(),
            condition: number(c[7], f[7])?,
            filepath: (!f[8].is_empty()).then(|| PathBuf::from(f[8])),
            discarded: parse_flag(f[9]),
            matched: parse_flag(f[10]),
            predictive_quality: number(c[11], f[11])?,
            header_correction: code(c[12], f[12], HeaderCorrection::from_code)?,
            orient_data_correction: code(c[13], f[13], OrientationTransform::from_code)?,
            rev_orient_data_correction: code(c[14], f[14], OrientationTransform::from_code)?,
            realigned: parse_flag(f[15]),
            smoothed: number(c[16], f[16])?,
            auto_process_type: code(c[17], f[17], AutoProcessType::from_code)?,
            auto_process_success: parse_flag(f[18]),
            auto_process_time: number(c[19], f[19])?,
            ..Volume::default()
        })
    }
}
