//! Compact encoding: a flat run of bincode records.
//!
//! Each marker is one string record. A section body is one record holding
//! the whole list, or a single volume for the reserved slots. There is no
//! length framing around bodies, so even skipping a section decodes it.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{check_section_name, Marker, SectionHeader, SectionSink, SectionSource};
use crate::error::CodecError;
use crate::trial::Trial;
use crate::variable::SectionKind;
use crate::volume::Volume;

/// Upper bound on a single record, so a corrupt length prefix fails fast
/// instead of allocating.
const MAX_RECORD_BYTES: u64 = 1 << 30;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_RECORD_BYTES)
}

pub struct BinarySink<W> {
    writer: W,
    origin: PathBuf,
}

impl<W: Write> BinarySink<W> {
    pub fn new(writer: W, origin: impl AsRef<Path>) -> Self {
        Self {
            writer,
            origin: origin.as_ref().to_path_buf(),
        }
    }

    fn record<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CodecError> {
        options()
            .serialize_into(&mut self.writer, value)
            .map_err(|e| match *e {
                bincode::ErrorKind::Io(io) => CodecError::io(&self.origin, io),
                other => CodecError::Binary(Box::new(other)),
            })
    }

    fn marker(&mut self, marker: Marker) -> Result<(), CodecError> {
        self.record(&marker.to_string())
    }

    pub fn finish(mut self) -> Result<W, CodecError> {
        self.writer
            .flush()
            .map_err(|e| CodecError::io(&self.origin, e))?;
        Ok(self.writer)
    }
}

impl<W: Write> SectionSink for BinarySink<W> {
    fn open_wrapper(&mut self, name: &str) -> Result<(), CodecError> {
        self.marker(Marker::open(name, None))
    }

    fn close_wrapper(&mut self, name: &str) -> Result<(), CodecError> {
        self.marker(Marker::Close(name.to_string()))
    }

    fn write_volumes(&mut self, name: &str, volumes: &[Volume]) -> Result<(), CodecError> {
        check_section_name(name)?;
        self.marker(Marker::open(name, Some(SectionKind::Volumes)))?;
        self.record(volumes)?;
        self.marker(Marker::Close(name.to_string()))
    }

    fn write_volume(&mut self, name: &str, volume: &Volume) -> Result<(), CodecError> {
        check_section_name(name)?;
        self.marker(Marker::open(name, Some(SectionKind::Volumes)))?;
        self.record(volume)?;
        self.marker(Marker::Close(name.to_string()))
    }

    fn write_trials(&mut self, name: &str, trials: &[Trial]) -> Result<(), CodecError> {
        check_section_name(name)?;
        self.marker(Marker::open(name, Some(SectionKind::Blocks)))?;
        self.record(trials)?;
        self.marker(Marker::Close(name.to_string()))
    }
}

pub struct BinarySource<R> {
    reader: R,
    origin: PathBuf,
    records: usize,
}

impl<R: BufRead> BinarySource<R> {
    pub fn new(reader: R, origin: impl AsRef<Path>) -> Self {
        Self {
            reader,
            origin: origin.as_ref().to_path_buf(),
            records: 0,
        }
    }

    fn at_end(&mut self) -> Result<bool, CodecError> {
        self.reader
            .fill_buf()
            .map(|buf| buf.is_empty())
            .map_err(|e| CodecError::io(&self.origin, e))
    }

    /// Decode one record. Running out of bytes mid-record is a truncation
    /// of `section`.
    fn decode<T: DeserializeOwned>(&mut self, section: &str) -> Result<T, CodecError> {
        let value = options()
            .deserialize_from(&mut self.reader)
            .map_err(|e| match *e {
                bincode::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                    CodecError::Truncated {
                        section: section.to_string(),
                    }
                }
                bincode::ErrorKind::Io(io) => CodecError::io(&self.origin, io),
                other => CodecError::Binary(Box::new(other)),
            })?;
        self.records += 1;
        Ok(value)
    }

    fn expect_close(&mut self, section: &SectionHeader) -> Result<(), CodecError> {
        let text: String = self.decode(&section.name)?;
        match Marker::parse(&text) {
            Some(Marker::Close(name)) if name == section.name => Ok(()),
            _ => Err(CodecError::malformed(
                self.location(),
                format!("expected end of '{}', found {:?}", section.name, text),
            )),
        }
    }
}

impl<R: BufRead> SectionSource for BinarySource<R> {
    fn next_marker(&mut self) -> Result<Option<Marker>, CodecError> {
        if self.at_end()? {
            return Ok(None);
        }
        let location = self.location();
        let text: String = self.decode(&location)?;
        Marker::parse(&text)
            .map(Some)
            .ok_or_else(|| CodecError::malformed(self.location(), format!("expected a marker, found {:?}", text)))
    }

    fn read_volumes(&mut self, section: &SectionHeader) -> Result<Vec<Volume>, CodecError> {
        let volumes = if section.is_singleton() {
            vec![self.decode::<Volume>(&section.name)?]
        } else {
            self.decode::<Vec<Volume>>(&section.name)?
        };
        self.expect_close(section)?;
        Ok(volumes)
    }

    fn read_trials(&mut self, section: &SectionHeader) -> Result<Vec<Trial>, CodecError> {
        let trials = self.decode(&section.name)?;
        self.expect_close(section)?;
        Ok(trials)
    }

    fn skip_body(&mut self, section: &SectionHeader) -> Result<(), CodecError> {
        match section.kind {
            SectionKind::Volumes => self.read_volumes(section).map(drop),
            SectionKind::Blocks => self.read_trials(section).map(drop),
        }
    }

    fn location(&self) -> String {
        format!("{} record {}", self.origin.display(), self.records)
    }
}
