//! Session variable names and the result of a selective read.
//!
//! Names arrive as strings from callers and from files. They are resolved
//! once, at the API boundary, into a [`SessionVariable`]; everything below
//! works on the variant.

use std::fmt;

/// The five single-volume slots of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservedSlot {
    Correction,
    Realignment,
    GlobalMask,
    GlobalRtMask,
    RoiMask,
}

impl ReservedSlot {
    /// Slots in file emission order.
    pub const ALL: [Self; 5] = [
        Self::Correction,
        Self::Realignment,
        Self::GlobalMask,
        Self::GlobalRtMask,
        Self::RoiMask,
    ];

    /// Name used for this slot in session files.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Correction => "corrVolume",
            Self::Realignment => "realignVolume",
            Self::GlobalMask => "globalMask",
            Self::GlobalRtMask => "globalRTMask",
            Self::RoiMask => "roiMask",
        }
    }

    /// Exact (case-sensitive) match on the file name, as used by the codec.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.file_name() == name)
    }
}

/// A resolved session variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionVariable {
    AllVolumes,
    Slot(ReservedSlot),
    Task(String),
}

impl SessionVariable {
    pub const ALL_VOLUMES: &'static str = "allVolumes";

    /// Resolve a caller-supplied name. Reserved names match case-insensitively;
    /// anything else is a task name, kept verbatim.
    pub fn parse(name: &str) -> Self {
        if name.eq_ignore_ascii_case(Self::ALL_VOLUMES) {
            return Self::AllVolumes;
        }
        ReservedSlot::ALL
            .into_iter()
            .find(|slot| name.eq_ignore_ascii_case(slot.file_name()))
            .map_or_else(|| Self::Task(name.to_string()), Self::Slot)
    }

    pub fn is_reserved(&self) -> bool {
        !matches!(self, Self::Task(_))
    }

    pub fn file_name(&self) -> &str {
        match self {
            Self::AllVolumes => Self::ALL_VOLUMES,
            Self::Slot(slot) => slot.file_name(),
            Self::Task(name) => name,
        }
    }
}

impl fmt::Display for SessionVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Whether a name is one of the six reserved variable names (any case).
pub fn is_reserved_name(name: &str) -> bool {
    SessionVariable::parse(name).is_reserved()
}

/// What a tagged section holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Volumes,
    /// Trials; "blocks" in the file format.
    Blocks,
}

impl SectionKind {
    pub fn attribute(self) -> &'static str {
        match self {
            Self::Volumes => "volumes",
            Self::Blocks => "blocks",
        }
    }

    pub fn from_attribute(value: &str) -> Option<Self> {
        match value {
            "volumes" => Some(Self::Volumes),
            "blocks" => Some(Self::Blocks),
            _ => None,
        }
    }
}

/// Which kinds of variables to report when listing a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindFilter {
    pub volumes: bool,
    pub blocks: bool,
}

impl KindFilter {
    pub const VOLUMES: Self = Self {
        volumes: true,
        blocks: false,
    };
    pub const BLOCKS: Self = Self {
        volumes: false,
        blocks: true,
    };
    pub const ALL: Self = Self {
        volumes: true,
        blocks: true,
    };

    pub fn accepts(self, kind: SectionKind) -> bool {
        match kind {
            SectionKind::Volumes => self.volumes,
            SectionKind::Blocks => self.blocks,
        }
    }
}

/// Result of a selective read: one entry per requested name, in request order.
///
/// `None` means the name never appeared in the file with the right kind;
/// `Some(vec![])` means the section was there but empty.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedVariables<T> {
    entries: Vec<(String, Option<Vec<T>>)>,
}

impl<T> SelectedVariables<T> {
    /// Seed every requested name as not found. Duplicates collapse.
    pub fn requested<S: AsRef<str>>(names: &[S]) -> Self {
        let mut entries: Vec<(String, Option<Vec<T>>)> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref();
            if !entries.iter().any(|(existing, _)| existing == name) {
                entries.push((name.to_string(), None));
            }
        }
        Self { entries }
    }

    pub fn is_requested(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == name)
    }

    /// Mark a requested name as found with an empty list, replacing any
    /// earlier contents. Unrequested names are ignored.
    pub(crate) fn open(&mut self, name: &str) {
        if let Some((_, slot)) = self.entries.iter_mut().find(|(existing, _)| existing == name) {
            *slot = Some(Vec::new());
        }
    }

    pub(crate) fn extend(&mut self, name: &str, items: impl IntoIterator<Item = T>) {
        if let Some((_, Some(list))) = self.entries.iter_mut().find(|(existing, _)| existing == name) {
            list.extend(items);
        }
    }

    /// `None` when the name was not requested or not found.
    pub fn get(&self, name: &str) -> Option<&[T]> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .and_then(|(_, list)| list.as_deref())
    }

    pub fn is_found(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Requested names that never appeared in the file.
    pub fn missing(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|(_, list)| list.is_none())
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&[T]>)> {
        self.entries
            .iter()
            .map(|(name, list)| (name.as_str(), list.as_deref()))
    }
}

impl<T> IntoIterator for SelectedVariables<T> {
    type Item = (String, Option<Vec<T>>);
    type IntoIter = std::vec::IntoIter<(String, Option<Vec<T>>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
