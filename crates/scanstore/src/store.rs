//! SessionStore: the shared, lock-guarded session.
//!
//! Every public method takes the one session-wide lock for its full
//! duration, file I/O included, so operations are totally ordered and no
//! caller ever observes a half-applied mutation. Getters hand out snapshots;
//! poll [`SessionStore::revision`] or [`SessionStore::volume_count`] to
//! notice changes.
//!
//! Share a store between threads with `Arc<SessionStore>`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::config::StoreConfig;
use crate::error::{CodecError, SessionError};
use crate::session::SessionData;
use crate::stream::{self, SessionEncoding};
use crate::trial::Trial;
use crate::variable::{is_reserved_name, KindFilter, ReservedSlot, SelectedVariables, SessionVariable};
use crate::volume::Volume;

#[derive(Debug, Default)]
struct StoreState {
    data: SessionData,
    revision: u64,
}

impl StoreState {
    fn touch(&mut self) {
        self.revision += 1;
    }

    fn set_volumes(&mut self, name: &str, volumes: Vec<Volume>) {
        match SessionVariable::parse(name) {
            SessionVariable::AllVolumes => self.data.all_volumes = volumes,
            SessionVariable::Slot(slot) => self.data.reserved.set(slot, volumes.into_iter().next()),
            SessionVariable::Task(task) => self.data.task_volumes.replace(&task, volumes),
        }
        self.touch();
    }
}

/// Thread-safe store for one neurofeedback session.
#[derive(Debug, Default)]
pub struct SessionStore {
    state: Mutex<StoreState>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every mutation leaves the state consistent, so a lock poisoned by a
    /// panicking caller is still safe to use.
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_task_name(name: &str) -> Result<(), SessionError> {
        if is_reserved_name(name) {
            error!(variable = name, "refusing to use a reserved variable name as a task");
            return Err(SessionError::ReservedName(name.to_string()));
        }
        Ok(())
    }

    /// Drop everything and start an empty session.
    pub fn new_session(&self) {
        let mut state = self.lock();
        state.data.clear();
        state.touch();
        info!("started new session");
    }

    /// Incremented by every mutation.
    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    /// A copy of the whole session.
    pub fn snapshot(&self) -> SessionData {
        self.lock().data.clone()
    }

    // --- volumes by name ---

    /// Append to `allVolumes`, stamping `volume` with its session index.
    ///
    /// The index is the position in `allVolumes` at append time.
    pub fn add_volume(&self, volume: &mut Volume) -> usize {
        let mut state = self.lock();
        let index = state.data.all_volumes.len();
        volume.volume_index_in_session = i32::try_from(index).unwrap_or(i32::MAX);
        state.data.all_volumes.push(volume.clone());
        state.touch();
        index
    }

    /// Volumes stored under `name`.
    ///
    /// Reserved names always resolve: `allVolumes` to the full list, the
    /// slots to a list of zero or one volume. Unknown task names give `None`.
    pub fn volumes(&self, name: &str) -> Option<Vec<Volume>> {
        let state = self.lock();
        match SessionVariable::parse(name) {
            SessionVariable::AllVolumes => Some(state.data.all_volumes.clone()),
            SessionVariable::Slot(slot) => Some(state.data.reserved.get(slot).cloned().into_iter().collect()),
            SessionVariable::Task(task) => state.data.task_volumes.get(&task).cloned(),
        }
    }

    /// Replace the volumes stored under `name`, creating a task list if
    /// needed. A slot keeps the first volume, or empties on an empty list.
    pub fn set_volumes(&self, name: &str, volumes: Vec<Volume>) {
        self.lock().set_volumes(name, volumes);
    }

    pub fn volume_count(&self, name: &str) -> usize {
        let state = self.lock();
        match SessionVariable::parse(name) {
            SessionVariable::AllVolumes => state.data.all_volumes.len(),
            SessionVariable::Slot(slot) => usize::from(state.data.reserved.get(slot).is_some()),
            SessionVariable::Task(task) => state.data.task_volumes.get(&task).map_or(0, Vec::len),
        }
    }

    pub fn slot(&self, slot: ReservedSlot) -> Option<Volume> {
        self.lock().data.reserved.get(slot).cloned()
    }

    pub fn set_slot(&self, slot: ReservedSlot, volume: Option<Volume>) {
        let mut state = self.lock();
        state.data.reserved.set(slot, volume);
        state.touch();
    }

    // --- task volumes ---

    pub fn add_task_volume(&self, name: &str, volume: Volume) -> Result<(), SessionError> {
        Self::check_task_name(name)?;
        let mut state = self.lock();
        state.data.task_volumes.entry(name).push(volume);
        state.touch();
        Ok(())
    }

    pub fn set_task_volumes(&self, name: &str, volumes: Vec<Volume>) -> Result<(), SessionError> {
        Self::check_task_name(name)?;
        let mut state = self.lock();
        state.data.task_volumes.replace(name, volumes);
        state.touch();
        Ok(())
    }

    /// Empty a task list in place. Unknown names are left alone.
    pub fn clear_task_volumes(&self, name: &str) -> Result<(), SessionError> {
        Self::check_task_name(name)?;
        let mut state = self.lock();
        if state.data.task_volumes.clear_list(name) {
            state.touch();
        }
        Ok(())
    }

    pub fn task_volumes(&self, name: &str) -> Option<Vec<Volume>> {
        self.lock().data.task_volumes.get(name).cloned()
    }

    pub fn task_volume_count(&self, name: &str) -> usize {
        self.lock().data.task_volumes.get(name).map_or(0, Vec::len)
    }

    /// Task names in insertion order.
    pub fn task_volume_names(&self) -> Vec<String> {
        self.lock().data.task_volumes.names().map(String::from).collect()
    }

    pub fn task_volume_variable_count(&self) -> usize {
        self.lock().data.task_volumes.len()
    }

    // --- task trials ---

    pub fn add_task_trial(&self, name: &str, trial: Trial) {
        let mut state = self.lock();
        state.data.task_trials.entry(name).push(trial);
        state.touch();
    }

    pub fn set_task_trials(&self, name: &str, trials: Vec<Trial>) {
        let mut state = self.lock();
        state.data.task_trials.replace(name, trials);
        state.touch();
    }

    pub fn clear_task_trials(&self, name: &str) {
        let mut state = self.lock();
        if state.data.task_trials.clear_list(name) {
            state.touch();
        }
    }

    pub fn task_trials(&self, name: &str) -> Option<Vec<Trial>> {
        self.lock().data.task_trials.get(name).cloned()
    }

    pub fn task_trial_names(&self) -> Vec<String> {
        self.lock().data.task_trials.names().map(String::from).collect()
    }

    pub fn task_trial_variable_count(&self) -> usize {
        self.lock().data.task_trials.len()
    }

    // --- session files ---

    /// Names of the variables in a session file, in file order.
    pub fn list_variable_names_in_file(
        &self,
        path: impl AsRef<Path>,
        filter: KindFilter,
    ) -> Result<Vec<String>, SessionError> {
        let _state = self.lock();
        Ok(stream::list_variable_names_in_file(path.as_ref(), filter)?)
    }

    pub fn read_volume_variables_from_file<N: AsRef<str>>(
        &self,
        path: impl AsRef<Path>,
        names: &[N],
    ) -> Result<SelectedVariables<Volume>, SessionError> {
        let _state = self.lock();
        Ok(stream::read_volume_variables_from_file(path.as_ref(), names)?)
    }

    pub fn read_trial_variables_from_file<N: AsRef<str>>(
        &self,
        path: impl AsRef<Path>,
        names: &[N],
    ) -> Result<SelectedVariables<Trial>, SessionError> {
        let _state = self.lock();
        Ok(stream::read_trial_variables_from_file(path.as_ref(), names)?)
    }

    /// Save the session as text.
    pub fn save_session(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        self.save_session_as(path, SessionEncoding::Text)
    }

    /// Save the session in the binary encoding.
    pub fn save_session_binary(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        self.save_session_as(path, SessionEncoding::Binary)
    }

    pub fn save_session_as(&self, path: impl AsRef<Path>, encoding: SessionEncoding) -> Result<(), SessionError> {
        let path = path.as_ref();
        let state = self.lock();
        stream::write_session_file(path, &state.data, encoding)?;
        info!(
            path = %path.display(),
            ?encoding,
            volumes = state.data.all_volumes.len(),
            tasks = state.data.task_volumes.len(),
            "saved session"
        );
        Ok(())
    }

    /// Replace the session with the contents of a file.
    ///
    /// The file is read in full before the session is touched; on error the
    /// current session is unchanged. Volumes keep their stored indexes.
    pub fn load_session(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let path = path.as_ref();
        let data = stream::read_session_file(path)?;

        let mut state = self.lock();
        state.data = data;
        state.touch();
        info!(
            path = %path.display(),
            volumes = state.data.all_volumes.len(),
            tasks = state.data.task_volumes.len(),
            trial_tasks = state.data.task_trials.len(),
            "loaded session"
        );
        Ok(())
    }

    /// Read the named volume variables from a file and install every one
    /// that was found and non-empty, as [`SessionStore::set_volumes`] would.
    ///
    /// Returns the names that were installed.
    pub fn import_volume_variables<N: AsRef<str>>(
        &self,
        path: impl AsRef<Path>,
        names: &[N],
    ) -> Result<Vec<String>, SessionError> {
        let path = path.as_ref();
        let selected = stream::read_volume_variables_from_file(path, names)?;

        let mut state = self.lock();
        let mut applied = Vec::new();
        for (name, volumes) in selected {
            match volumes {
                Some(volumes) if !volumes.is_empty() => {
                    debug!(variable = %name, count = volumes.len(), "importing volumes");
                    state.set_volumes(&name, volumes);
                    applied.push(name);
                }
                _ => warn!(path = %path.display(), variable = %name, "no volumes to import"),
            }
        }
        Ok(applied)
    }

    /// Trial counterpart of [`SessionStore::import_volume_variables`].
    pub fn import_trial_variables<N: AsRef<str>>(
        &self,
        path: impl AsRef<Path>,
        names: &[N],
    ) -> Result<Vec<String>, SessionError> {
        let path = path.as_ref();
        let selected = stream::read_trial_variables_from_file(path, names)?;

        let mut state = self.lock();
        let mut applied = Vec::new();
        for (name, trials) in selected {
            match trials {
                Some(trials) if !trials.is_empty() => {
                    debug!(variable = %name, count = trials.len(), "importing trials");
                    state.data.task_trials.replace(&name, trials);
                    state.touch();
                    applied.push(name);
                }
                _ => warn!(path = %path.display(), variable = %name, "no trials to import"),
            }
        }
        Ok(applied)
    }

    /// Write `SessionData___{label}___{YYYYMMDD_HHMMSS}` checkpoint file(s)
    /// into the configured session directory.
    ///
    /// The label becomes part of a file name, so empty labels, path
    /// separators, and `..` are refused.
    pub fn save_checkpoint(&self, config: &StoreConfig, label: &str) -> Result<Vec<PathBuf>, SessionError> {
        if label.is_empty() || label.contains(['/', '\\']) || label.contains("..") {
            error!(label, "refusing checkpoint label");
            return Err(SessionError::InvalidLabel(label.to_string()));
        }
        fs::create_dir_all(&config.session_dir).map_err(|e| CodecError::io(&config.session_dir, e))?;

        let stem = format!(
            "SessionData___{}___{}",
            label,
            Local::now().format(crate::DATE_TIME_FORMAT)
        );

        let state = self.lock();
        let mut written = Vec::new();
        for &encoding in config.checkpoint_encoding.encodings() {
            let path = config
                .session_dir
                .join(format!("{}.{}", stem, encoding.extension()));
            stream::write_session_file(&path, &state.data, encoding)?;
            written.push(path);
        }
        info!(label, files = written.len(), dir = %config.session_dir.display(), "wrote checkpoint");
        Ok(written)
    }
}
