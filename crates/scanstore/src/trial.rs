//! Trial: one scheduled interval of the experiment design.

use serde::{Deserialize, Serialize};

/// A block/trial with a condition code, a duration, and its onset times.
///
/// Trials have no identity of their own; their position in a task's list is
/// what orders them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Trial {
    pub condition: i32,
    pub duration: i32,
    /// Onset in seconds.
    pub onset: f64,
    /// Secondary onset in seconds (e.g. the response window).
    pub onset2: f64,
}

impl Trial {
    pub fn new(condition: i32) -> Self {
        Self {
            condition,
            ..Self::default()
        }
    }

    pub fn with_duration(condition: i32, duration: i32) -> Self {
        Self {
            condition,
            duration,
            ..Self::default()
        }
    }

    pub fn at(mut self, onset: f64) -> Self {
        self.onset = onset;
        self
    }
}
