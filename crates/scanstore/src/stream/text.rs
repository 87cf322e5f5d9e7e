//! Line-oriented encoding: markers and rows, one per line.
//!
//! Rows that fail to parse are logged and dropped; the rest of the section
//! still loads. Structural problems (a foreign marker inside a body, a body
//! that never closes) abort the read.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{check_section_name, Marker, SectionHeader, SectionSink, SectionSource};
use crate::error::CodecError;
use crate::row::Row;
use crate::trial::Trial;
use crate::variable::SectionKind;
use crate::volume::Volume;

pub struct TextSource<R> {
    reader: R,
    origin: PathBuf,
    line_no: usize,
}

impl<R: BufRead> TextSource<R> {
    /// `origin` names the stream in log lines and errors.
    pub fn new(reader: R, origin: impl AsRef<Path>) -> Self {
        Self {
            reader,
            origin: origin.as_ref().to_path_buf(),
            line_no: 0,
        }
    }

    /// Next line without its terminator, or `None` at end of stream.
    fn next_line(&mut self) -> Result<Option<String>, CodecError> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|e| CodecError::io(&self.origin, e))?;
        if read == 0 {
            return Ok(None);
        }
        self.line_no += 1;

        if line.ends_with('\n') {
            line.pop();
        }
        if line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Walk a section body up to its end marker, handing each row line to
    /// `on_row`. The first non-blank line is the column header.
    fn body<F>(&mut self, section: &SectionHeader, mut on_row: F) -> Result<(), CodecError>
    where
        F: FnMut(&str, usize),
    {
        let mut header_seen = false;
        loop {
            let line = self.next_line()?.ok_or_else(|| CodecError::Truncated {
                section: section.name.clone(),
            })?;
            if line.trim().is_empty() {
                continue;
            }

            match Marker::parse(line.trim_end()) {
                Some(Marker::Close(name)) if name == section.name => return Ok(()),
                Some(marker) => {
                    return Err(CodecError::malformed(
                        self.location(),
                        format!("found {} inside section '{}'", marker, section.name),
                    ));
                }
                None if !header_seen => header_seen = true,
                None => on_row(&line, self.line_no),
            }
        }
    }

    fn read_rows<T: Row>(&mut self, section: &SectionHeader) -> Result<Vec<T>, CodecError> {
        let origin = self.origin.clone();
        let mut rows = Vec::new();
        self.body(section, |line, line_no| match T::from_row(line) {
            Ok(row) => rows.push(row),
            Err(e) => warn!(
                file = %origin.display(),
                variable = %section.name,
                line = line_no,
                error = %e,
                "dropping unreadable row"
            ),
        })?;
        Ok(rows)
    }
}

impl<R: BufRead> SectionSource for TextSource<R> {
    fn next_marker(&mut self) -> Result<Option<Marker>, CodecError> {
        while let Some(line) = self.next_line()? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match Marker::parse(trimmed) {
                Some(marker) => return Ok(Some(marker)),
                None => debug!(location = %self.location(), "skipping text outside any section"),
            }
        }
        Ok(None)
    }

    fn read_volumes(&mut self, section: &SectionHeader) -> Result<Vec<Volume>, CodecError> {
        self.read_rows(section)
    }

    fn read_trials(&mut self, section: &SectionHeader) -> Result<Vec<Trial>, CodecError> {
        self.read_rows(section)
    }

    fn skip_body(&mut self, section: &SectionHeader) -> Result<(), CodecError> {
        self.body(section, |_, _| {})
    }

    fn location(&self) -> String {
        format!("{}:{}", self.origin.display(), self.line_no)
    }
}

/// Encode a row, refusing text fields that would split it or end the line.
fn encode_row<T: Row>(name: &str, row: &T) -> Result<String, CodecError> {
    let line = row.to_row();
    if line.contains(['\r', '\n']) {
        return Err(CodecError::Unencodable {
            variable: name.to_string(),
            message: format!("row contains a line break: {:?}", line),
        });
    }
    let columns = line.split('\t').count();
    if columns != T::COLUMNS.len() {
        return Err(CodecError::Unencodable {
            variable: name.to_string(),
            message: format!(
                "row has {} tab-separated fields, expected {}: {:?}",
                columns,
                T::COLUMNS.len(),
                line
            ),
        });
    }
    Ok(line)
}

pub struct TextSink<W> {
    writer: W,
    origin: PathBuf,
    in_wrapper: bool,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W, origin: impl AsRef<Path>) -> Self {
        Self {
            writer,
            origin: origin.as_ref().to_path_buf(),
            in_wrapper: false,
        }
    }

    fn line(&mut self, text: &str) -> Result<(), CodecError> {
        writeln!(self.writer, "{}", text).map_err(|e| CodecError::io(&self.origin, e))
    }

    fn section<'a, T, I>(&mut self, name: &str, kind: SectionKind, rows: I) -> Result<(), CodecError>
    where
        T: Row + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        check_section_name(name)?;
        let rows = rows
            .into_iter()
            .map(|row| encode_row(name, row))
            .collect::<Result<Vec<_>, _>>()?;

        self.line(&Marker::open(name, Some(kind)).to_string())?;
        self.line(&T::header_line())?;
        for row in &rows {
            self.line(row)?;
        }
        self.line(&Marker::Close(name.to_string()).to_string())?;
        if !self.in_wrapper {
            self.line("")?;
        }
        Ok(())
    }

    /// Flush and hand back the writer.
    pub fn finish(mut self) -> Result<W, CodecError> {
        self.writer
            .flush()
            .map_err(|e| CodecError::io(&self.origin, e))?;
        Ok(self.writer)
    }
}

impl<W: Write> SectionSink for TextSink<W> {
    fn open_wrapper(&mut self, name: &str) -> Result<(), CodecError> {
        self.line(&Marker::open(name, None).to_string())?;
        self.in_wrapper = true;
        Ok(())
    }

    fn close_wrapper(&mut self, name: &str) -> Result<(), CodecError> {
        self.line(&Marker::Close(name.to_string()).to_string())?;
        self.in_wrapper = false;
        self.line("")
    }

    fn write_volumes(&mut self, name: &str, volumes: &[Volume]) -> Result<(), CodecError> {
        self.section(name, SectionKind::Volumes, volumes)
    }

    fn write_volume(&mut self, name: &str, volume: &Volume) -> Result<(), CodecError> {
        self.section(name, SectionKind::Volumes, std::iter::once(volume))
    }

    fn write_trials(&mut self, name: &str, trials: &[Trial]) -> Result<(), CodecError> {
        self.section(name, SectionKind::Blocks, trials)
    }
}
