//! Session store for real-time fMRI neurofeedback.
//!
//! Holds the metadata of every scan volume collected or generated during a
//! session, the per-task volume lists, the trial (block) design of each task,
//! and five single-volume slots (correction, realignment, global mask,
//! global real-time mask, ROI mask). Acquisition, processing, and display
//! threads share one [`SessionStore`]; every call is serialized by a single
//! session-wide lock.
//!
//! Sessions persist to tagged section files in one of two encodings:
//! tab-separated text (`.txt`) or compact binary (`.dat`). Both can be
//! listed and read selectively without loading the whole file into the
//! session.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use scanstore::{KindFilter, SessionStore, Trial, Volume, VolumeSource};
//!
//! let store = SessionStore::new();
//!
//! // Append an incoming scan
//! let mut volume = Volume::with_path(VolumeSource::Collected, "/scans/run1/f0001.nii");
//! let index = store.add_volume(&mut volume);
//! assert_eq!(volume.volume_index_in_session as usize, index);
//!
//! // Group it under a task and record the design
//! store.add_task_volume("Localizer", volume).unwrap();
//! store.set_task_trials("Localizer", vec![Trial::with_duration(1, 20)]);
//!
//! // Persist, then peek into the file
//! store.save_session("/tmp/session.txt").unwrap();
//! let names = store
//!     .list_variable_names_in_file("/tmp/session.txt", KindFilter::VOLUMES)
//!     .unwrap();
//! println!("volume variables: {:?}", names);
//! ```
//!
//! # Configuration
//!
//! Environment variables (see [`StoreConfig`]):
//! - `SCANSTORE_SESSION_DIR`: Where checkpoints go (default: `~/.scanstore/sessions`)
//! - `SCANSTORE_CHECKPOINT_ENCODING`: `text`, `binary`, or `both`

pub mod config;
pub mod error;
pub mod row;
pub mod session;
pub mod store;
pub mod stream;
pub mod trial;
pub mod variable;
pub mod volume;

/// Wall-clock format for volume stamps and checkpoint file names.
pub const DATE_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

// Re-exports for convenience
pub use config::{CheckpointEncoding, StoreConfig};
pub use error::{CodecError, ConfigError, RowError, SessionError};
pub use row::Row;
pub use session::{NamedLists, ReservedVolumes, SessionData};
pub use store::SessionStore;
pub use stream::SessionEncoding;
pub use trial::Trial;
pub use variable::{is_reserved_name, KindFilter, ReservedSlot, SectionKind, SelectedVariables, SessionVariable};
pub use volume::{AutoProcessType, HeaderCorrection, OrientationTransform, Volume, VolumeSource};
