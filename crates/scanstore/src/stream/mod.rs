//! Tagged stream codec: session files as a sequence of named sections.
//!
//! A session file is a flat run of sections, each framed by a start and an
//! end marker:
//!
//! ```text
//! <allVolumes type="volumes">
//! volumeSource	volumeId	...          (text only: column header)
//! 0	10001	...                      (one row per volume)
//! <\allVolumes>
//!
//! <taskVolumes>                        (wrapper, not a variable)
//! <Localizer type="volumes">
//! ...
//! <\Localizer>
//! <\taskVolumes>
//! ```
//!
//! The same structure has two encodings. Text files carry one row per line.
//! Binary files (`.dat`) carry one bincode record per marker and one record
//! per section body, with nothing in between, so a reader must decode a
//! body to get past it.
//!
//! The walking logic (listing, selective reads, full reads, and the fixed
//! write order) is written once against [`SectionSource`] and
//! [`SectionSink`]; [`text`] and [`binary`] provide the two backends.

pub mod binary;
pub mod text;

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::CodecError;
use crate::session::SessionData;
use crate::trial::Trial;
use crate::variable::{KindFilter, ReservedSlot, SectionKind, SelectedVariables, SessionVariable};
use crate::volume::Volume;

pub use binary::{BinarySink, BinarySource};
pub use text::{TextSink, TextSource};

/// Wrapper around the task volume sections.
pub const TASK_VOLUMES: &str = "taskVolumes";
/// Wrapper around the task trial sections.
pub const TASK_TRIALS: &str = "taskTrials";

/// Physical encoding of a session file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEncoding {
    Text,
    Binary,
}

impl SessionEncoding {
    /// `.dat` (any case) is binary; everything else is text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("dat") => Self::Binary,
            _ => Self::Text,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Binary => "dat",
        }
    }
}

/// A start or end marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// `<name>` or `<name type="...">`; `kind` is `None` without the attribute.
    Open {
        name: String,
        kind: Option<SectionKind>,
    },
    /// `<\name>`
    Close(String),
}

impl Marker {
    pub fn open(name: impl Into<String>, kind: Option<SectionKind>) -> Self {
        Self::Open {
            name: name.into(),
            kind,
        }
    }

    /// Parse a marker line. Anything not shaped like `<...>` is not a marker.
    pub fn parse(line: &str) -> Option<Self> {
        let inner = line.strip_prefix('<')?.strip_suffix('>')?;
        if let Some(name) = inner.strip_prefix('\\') {
            return Some(Self::Close(name.to_string()));
        }

        for kind in [SectionKind::Volumes, SectionKind::Blocks] {
            let suffix = format!(" type=\"{}\"", kind.attribute());
            if let Some(name) = inner.strip_suffix(suffix.as_str()) {
                return Some(Self::open(name, Some(kind)));
            }
        }
        Some(Self::open(inner, None))
    }
}

impl std::fmt::Display for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { name, kind: None } => write!(f, "<{}>", name),
            Self::Open {
                name,
                kind: Some(kind),
            } => write!(f, "<{} type=\"{}\">", name, kind.attribute()),
            Self::Close(name) => write!(f, "<\\{}>", name),
        }
    }
}

/// A variable section that has just been opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: String,
    pub kind: SectionKind,
}

impl SectionHeader {
    pub fn new(name: impl Into<String>, kind: SectionKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Reserved single-volume sections hold one volume rather than a list.
    pub fn is_singleton(&self) -> bool {
        self.kind == SectionKind::Volumes && ReservedSlot::from_file_name(&self.name).is_some()
    }
}

/// Reading side of the tag stream.
///
/// Body methods are called right after [`SectionSource::next_marker`]
/// returned the section's start marker, and consume everything up to and
/// including its end marker.
pub trait SectionSource {
    /// Next marker, or `None` at a clean end of stream.
    fn next_marker(&mut self) -> Result<Option<Marker>, CodecError>;

    fn read_volumes(&mut self, section: &SectionHeader) -> Result<Vec<Volume>, CodecError>;

    fn read_trials(&mut self, section: &SectionHeader) -> Result<Vec<Trial>, CodecError>;

    fn skip_body(&mut self, section: &SectionHeader) -> Result<(), CodecError>;

    /// Human-readable position, for error messages.
    fn location(&self) -> String;
}

/// Writing side of the tag stream.
pub trait SectionSink {
    fn open_wrapper(&mut self, name: &str) -> Result<(), CodecError>;

    fn close_wrapper(&mut self, name: &str) -> Result<(), CodecError>;

    fn write_volumes(&mut self, name: &str, volumes: &[Volume]) -> Result<(), CodecError>;

    /// A reserved single-volume section.
    fn write_volume(&mut self, name: &str, volume: &Volume) -> Result<(), CodecError>;

    fn write_trials(&mut self, name: &str, trials: &[Trial]) -> Result<(), CodecError>;
}

/// Reject names that would not survive a trip through a marker.
pub(crate) fn check_section_name(name: &str) -> Result<(), CodecError> {
    let problem = if name.is_empty() {
        Some("empty name")
    } else if name.starts_with('\\') {
        Some("name starts with a backslash")
    } else if name.contains(['\t', '\r', '\n']) {
        Some("name contains a tab or line break")
    } else if name.trim() != name {
        Some("name has leading or trailing whitespace")
    } else {
        None
    };

    match problem {
        Some(message) => Err(CodecError::Unencodable {
            variable: name.to_string(),
            message: message.to_string(),
        }),
        None => Ok(()),
    }
}

fn is_wrapper(name: &str) -> bool {
    name == TASK_VOLUMES || name == TASK_TRIALS
}

/// Walk every variable section of a stream, handing each to `on_section`,
/// which must consume the section body.
fn walk<S, F>(source: &mut S, mut on_section: F) -> Result<(), CodecError>
where
    S: SectionSource + ?Sized,
    F: FnMut(&mut S, &SectionHeader) -> Result<(), CodecError>,
{
    let mut wrapper: Option<String> = None;

    while let Some(marker) = source.next_marker()? {
        match marker {
            Marker::Open { name, kind: None } if is_wrapper(&name) => {
                if let Some(open) = &wrapper {
                    return Err(CodecError::malformed(
                        source.location(),
                        format!("wrapper '{}' opened inside '{}'", name, open),
                    ));
                }
                wrapper = Some(name);
            }
            Marker::Close(name) if is_wrapper(&name) => {
                if wrapper.as_deref() != Some(name.as_str()) {
                    return Err(CodecError::malformed(
                        source.location(),
                        format!("unexpected end of wrapper '{}'", name),
                    ));
                }
                wrapper = None;
            }
            Marker::Open { name, kind } => {
                let kind = kind.unwrap_or(SectionKind::Volumes);
                on_section(source, &SectionHeader::new(name, kind))?;
            }
            Marker::Close(name) => {
                return Err(CodecError::malformed(
                    source.location(),
                    format!("end marker for '{}' without a matching start", name),
                ));
            }
        }
    }

    match wrapper {
        Some(section) => Err(CodecError::Truncated { section }),
        None => Ok(()),
    }
}

/// Names of the variables in a stream, in file order, without keeping any
/// of their contents.
pub fn list_variable_names<S>(source: &mut S, filter: KindFilter) -> Result<Vec<String>, CodecError>
where
    S: SectionSource + ?Sized,
{
    let mut names = Vec::new();
    walk(source, |source, section| {
        if filter.accepts(section.kind) {
            names.push(section.name.clone());
        }
        source.skip_body(section)
    })?;
    Ok(names)
}

fn read_selected<S, T, N>(
    source: &mut S,
    names: &[N],
    kind: SectionKind,
    read: fn(&mut S, &SectionHeader) -> Result<Vec<T>, CodecError>,
) -> Result<SelectedVariables<T>, CodecError>
where
    S: SectionSource + ?Sized,
    N: AsRef<str>,
{
    let mut selected = SelectedVariables::requested(names);
    walk(source, |source, section| {
        if section.kind == kind && selected.is_requested(&section.name) {
            let items = read(source, section)?;
            debug!(variable = %section.name, count = items.len(), "read session variable");
            selected.open(&section.name);
            selected.extend(&section.name, items);
            Ok(())
        } else {
            source.skip_body(section)
        }
    })?;
    Ok(selected)
}

/// Materialize only the requested volume variables.
pub fn read_volume_variables<S, N>(
    source: &mut S,
    names: &[N],
) -> Result<SelectedVariables<Volume>, CodecError>
where
    S: SectionSource + ?Sized,
    N: AsRef<str>,
{
    read_selected(source, names, SectionKind::Volumes, S::read_volumes)
}

/// Materialize only the requested trial variables.
pub fn read_trial_variables<S, N>(
    source: &mut S,
    names: &[N],
) -> Result<SelectedVariables<Trial>, CodecError>
where
    S: SectionSource + ?Sized,
    N: AsRef<str>,
{
    read_selected(source, names, SectionKind::Blocks, S::read_trials)
}

/// Read a whole stream back into session state.
///
/// Volume sections are placed by name: `allVolumes` and the reserved slot
/// names go to their fixed places, anything else becomes a task list.
pub fn read_session<S>(source: &mut S) -> Result<SessionData, CodecError>
where
    S: SectionSource + ?Sized,
{
    let mut data = SessionData::default();
    walk(source, |source, section| {
        match section.kind {
            SectionKind::Blocks => {
                let trials = source.read_trials(section)?;
                data.task_trials.replace(&section.name, trials);
            }
            SectionKind::Volumes => {
                let volumes = source.read_volumes(section)?;
                match SessionVariable::parse(&section.name) {
                    SessionVariable::AllVolumes => data.all_volumes = volumes,
                    SessionVariable::Slot(slot) => {
                        if volumes.len() > 1 {
                            warn!(
                                variable = %section.name,
                                count = volumes.len(),
                                "single-volume section holds several volumes, keeping the first"
                            );
                        }
                        data.reserved.set(slot, volumes.into_iter().next());
                    }
                    SessionVariable::Task(name) => data.task_volumes.replace(&name, volumes),
                }
            }
        }
        Ok(())
    })?;
    Ok(data)
}

/// Write a whole session in the fixed section order:
/// `allVolumes`, the task volume wrapper, the five reserved slots, and the
/// task trial wrapper. Empty collections are left out.
pub fn write_session<K>(sink: &mut K, data: &SessionData) -> Result<(), CodecError>
where
    K: SectionSink + ?Sized,
{
    if !data.all_volumes.is_empty() {
        sink.write_volumes(SessionVariable::ALL_VOLUMES, &data.all_volumes)?;
    }

    if !data.task_volumes.is_empty() {
        sink.open_wrapper(TASK_VOLUMES)?;
        for (name, volumes) in data.task_volumes.iter() {
            sink.write_volumes(name, volumes)?;
        }
        sink.close_wrapper(TASK_VOLUMES)?;
    }

    for (slot, volume) in data.reserved.iter() {
        sink.write_volume(slot.file_name(), volume)?;
    }

    if !data.task_trials.is_empty() {
        sink.open_wrapper(TASK_TRIALS)?;
        for (name, trials) in data.task_trials.iter() {
            sink.write_trials(name, trials)?;
        }
        sink.close_wrapper(TASK_TRIALS)?;
    }

    Ok(())
}

fn open_source(path: &Path) -> Result<Box<dyn SectionSource>, CodecError> {
    let file = File::open(path).map_err(|e| CodecError::io(path, e))?;
    let reader = BufReader::new(file);
    Ok(match SessionEncoding::from_path(path) {
        SessionEncoding::Text => Box::new(TextSource::new(reader, path)),
        SessionEncoding::Binary => Box::new(BinarySource::new(reader, path)),
    })
}

/// List the variable names in a session file. The encoding follows the
/// file extension.
pub fn list_variable_names_in_file(path: &Path, filter: KindFilter) -> Result<Vec<String>, CodecError> {
    let mut source = open_source(path)?;
    list_variable_names(source.as_mut(), filter)
}

/// Read the requested volume variables from a session file.
pub fn read_volume_variables_from_file<N: AsRef<str>>(
    path: &Path,
    names: &[N],
) -> Result<SelectedVariables<Volume>, CodecError> {
    if names.is_empty() {
        return Ok(SelectedVariables::requested(names));
    }
    let mut source = open_source(path)?;
    read_volume_variables(source.as_mut(), names)
}

/// Read the requested trial variables from a session file.
pub fn read_trial_variables_from_file<N: AsRef<str>>(
    path: &Path,
    names: &[N],
) -> Result<SelectedVariables<Trial>, CodecError> {
    if names.is_empty() {
        return Ok(SelectedVariables::requested(names));
    }
    let mut source = open_source(path)?;
    read_trial_variables(source.as_mut(), names)
}

/// Read a whole session file.
pub fn read_session_file(path: &Path) -> Result<SessionData, CodecError> {
    let mut source = open_source(path)?;
    read_session(source.as_mut())
}

/// Sibling path a session is written to before it replaces `path`.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

fn write_staged(staging: &Path, origin: &Path, data: &SessionData, encoding: SessionEncoding) -> Result<(), CodecError> {
    let file = File::create(staging).map_err(|e| CodecError::io(staging, e))?;
    let writer = BufWriter::new(file);

    match encoding {
        SessionEncoding::Text => {
            let mut sink = TextSink::new(writer, origin);
            write_session(&mut sink, data)?;
            sink.finish()?;
        }
        SessionEncoding::Binary => {
            let mut sink = BinarySink::new(writer, origin);
            write_session(&mut sink, data)?;
            sink.finish()?;
        }
    }
    Ok(())
}

/// Write a session file in the given encoding, replacing any existing file.
///
/// The file is written next to `path` and renamed into place, so a failed
/// write leaves the previous file intact.
pub fn write_session_file(
    path: &Path,
    data: &SessionData,
    encoding: SessionEncoding,
) -> Result<(), CodecError> {
    let staging = staging_path(path);
    let result = write_staged(&staging, path, data, encoding)
        .and_then(|()| fs::rename(&staging, path).map_err(|e| CodecError::io(path, e)));

    if result.is_err() {
        if let Err(e) = fs::remove_file(&staging) {
            debug!(path = %staging.display(), error = %e, "could not remove partial session file");
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encoding_from_extension() {
        assert_eq!(SessionEncoding::from_path(Path::new("run.dat")), SessionEncoding::Binary);
        assert_eq!(SessionEncoding::from_path(Path::new("RUN.DAT")), SessionEncoding::Binary);
        assert_eq!(SessionEncoding::from_path(Path::new("run.txt")), SessionEncoding::Text);
        assert_eq!(SessionEncoding::from_path(Path::new("run")), SessionEncoding::Text);
        assert_eq!(SessionEncoding::from_path(&PathBuf::from("a.dat.txt")), SessionEncoding::Text);
    }

    #[test]
    fn test_marker_parse() {
        assert_eq!(Marker::parse("<allVolumes>"), Some(Marker::open("allVolumes", None)));
        assert_eq!(
            Marker::parse("<Loc type=\"volumes\">"),
            Some(Marker::open("Loc", Some(SectionKind::Volumes)))
        );
        assert_eq!(
            Marker::parse("<design type=\"blocks\">"),
            Some(Marker::open("design", Some(SectionKind::Blocks)))
        );
        assert_eq!(Marker::parse("<\\design>"), Some(Marker::Close("design".to_string())));
        assert_eq!(Marker::parse("0\t1\t2"), None);
        assert_eq!(Marker::parse("<unterminated"), None);
    }

    #[test]
    fn test_marker_display() {
        assert_eq!(Marker::open("taskVolumes", None).to_string(), "<taskVolumes>");
        assert_eq!(
            Marker::open("Loc", Some(SectionKind::Volumes)).to_string(),
            "<Loc type=\"volumes\">"
        );
        assert_eq!(Marker::Close("Loc".to_string()).to_string(), "<\\Loc>");
    }

    #[test]
    fn test_section_names_that_cannot_be_encoded() {
        for name in ["", "\\Loc", "Run\n1", "Run\t1", "Run\r", " Loc", "Loc "] {
            assert!(
                matches!(check_section_name(name), Err(CodecError::Unencodable { .. })),
                "{name:?} should be rejected"
            );
        }
        for name in ["Loc", "Run 1", "FeatureLocGLM", "a<b>"] {
            assert!(check_section_name(name).is_ok(), "{name:?} should be accepted");
        }
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.txt");

        let mut data = SessionData::default();
        data.task_trials.replace("design", [Trial::new(1)]);
        write_session_file(&path, &data, SessionEncoding::Text).unwrap();
        let before = std::fs::read(&path).unwrap();

        data.task_trials.replace("bad\nname", [Trial::new(2)]);
        assert!(write_session_file(&path, &data, SessionEncoding::Text).is_err());

        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(!staging_path(&path).exists());
        assert_eq!(read_session_file(&path).unwrap().task_trials.len(), 1);
    }

    #[test]
    fn test_section_header_singleton() {
        assert!(SectionHeader::new("corrVolume", SectionKind::Volumes).is_singleton());
        assert!(!SectionHeader::new("allVolumes", SectionKind::Volumes).is_singleton());
        assert!(!SectionHeader::new("corrVolume", SectionKind::Blocks).is_singleton());
        assert!(!SectionHeader::new("Loc", SectionKind::Volumes).is_singleton());
    }
}
