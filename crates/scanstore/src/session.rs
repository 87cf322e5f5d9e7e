//! Plain session state: what the store guards and what the codec writes.

use crate::trial::Trial;
use crate::variable::ReservedSlot;
use crate::volume::Volume;

/// Insertion-ordered map from task name to an ordered list.
///
/// Task names compare exactly. Lists are mutated in place; an entry, once
/// created, is only removed by [`NamedLists::clear`].
#[derive(Debug, Clone, PartialEq)]
pub struct NamedLists<T> {
    entries: Vec<(String, Vec<T>)>,
}

impl<T> Default for NamedLists<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> NamedLists<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Vec<T>> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, list)| list)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Vec<T>> {
        self.entries
            .iter_mut()
            .find(|(key, _)| key == name)
            .map(|(_, list)| list)
    }

    /// The list for `name`, created empty if absent.
    pub fn entry(&mut self, name: &str) -> &mut Vec<T> {
        match self.entries.iter().position(|(key, _)| key == name) {
            Some(index) => &mut self.entries[index].1,
            None => {
                self.entries.push((name.to_string(), Vec::new()));
                let last = self.entries.len() - 1;
                &mut self.entries[last].1
            }
        }
    }

    /// Replace the contents of `name`, creating it if absent.
    pub fn replace(&mut self, name: &str, items: impl IntoIterator<Item = T>) {
        let list = self.entry(name);
        list.clear();
        list.extend(items);
    }

    /// Empty the list for `name`. Returns false if there is no such list.
    pub fn clear_list(&mut self, name: &str) -> bool {
        match self.get_mut(name) {
            Some(list) => {
                list.clear();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.entries
            .iter()
            .map(|(key, list)| (key.as_str(), list.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The five single-volume slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservedVolumes {
    correction: Option<Volume>,
    realignment: Option<Volume>,
    global_mask: Option<Volume>,
    global_rt_mask: Option<Volume>,
    roi_mask: Option<Volume>,
}

impl ReservedVolumes {
    fn slot_ref(&self, slot: ReservedSlot) -> &Option<Volume> {
        match slot {
            ReservedSlot::Correction => &self.correction,
            ReservedSlot::Realignment => &self.realignment,
            ReservedSlot::GlobalMask => &self.global_mask,
            ReservedSlot::GlobalRtMask => &self.global_rt_mask,
            ReservedSlot::RoiMask => &self.roi_mask,
        }
    }

    fn slot_mut(&mut self, slot: ReservedSlot) -> &mut Option<Volume> {
        match slot {
            ReservedSlot::Correction => &mut self.correction,
            ReservedSlot::Realignment => &mut self.realignment,
            ReservedSlot::GlobalMask => &mut self.global_mask,
            ReservedSlot::GlobalRtMask => &mut self.global_rt_mask,
            ReservedSlot::RoiMask => &mut self.roi_mask,
        }
    }

    pub fn get(&self, slot: ReservedSlot) -> Option<&Volume> {
        self.slot_ref(slot).as_ref()
    }

    pub fn set(&mut self, slot: ReservedSlot, volume: Option<Volume>) {
        *self.slot_mut(slot) = volume;
    }

    /// Filled slots in file emission order.
    pub fn iter(&self) -> impl Iterator<Item = (ReservedSlot, &Volume)> {
        ReservedSlot::ALL
            .into_iter()
            .filter_map(move |slot| self.get(slot).map(|volume| (slot, volume)))
    }
}

/// Everything a session holds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionData {
    /// Every volume appended during the session; index = position.
    pub all_volumes: Vec<Volume>,
    pub task_volumes: NamedLists<Volume>,
    pub task_trials: NamedLists<Trial>,
    pub reserved: ReservedVolumes,
}

impl SessionData {
    pub fn clear(&mut self) {
        self.all_volumes.clear();
        self.task_volumes.clear();
        self.task_trials.clear();
        self.reserved = ReservedVolumes::default();
    }

    pub fn is_empty(&self) -> bool {
        self.all_volumes.is_empty()
            && self.task_volumes.is_empty()
            && self.task_trials.is_empty()
            && self.reserved.iter().next().is_none()
    }
}
