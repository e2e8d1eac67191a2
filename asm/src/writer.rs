use crate::{error::Error, resource::Resource, unit::CompilationUnit};
use std::path::PathBuf;

/// Emitted code of one unit, with the span actually written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectCode {
    pub resource: Resource,
    pub first_write: Option<u16>,
    pub last_write: Option<u16>,
}

impl ObjectCode {
    pub fn bytes(&self) -> Result<Vec<u8>, Error> {
        self.resource.read_bytes()
    }
}

/// Sink for generated words, addressed in the unit's address space.
pub trait ObjectCodeWriter {
    fn write(&mut self, address: u16, words: &[u16]) -> Result<(), Error>;

    fn first_write_offset(&self) -> Option<u16>;

    fn last_write_offset(&self) -> Option<u16>;

    fn close(self: Box<Self>) -> Result<ObjectCode, Error>;
}

/// Creates one writer per compilation unit.
pub trait WriterFactory {
    fn create(&self, unit: &CompilationUnit) -> Result<Box<dyn ObjectCodeWriter>, Error>;
}

// ----------------------------------------------------------------------------
// Word buffer

/// Words from the unit's start address on; gaps are zero-filled.
#[derive(Debug, Clone)]
struct WordBuffer {
    start: u16,
    words: Vec<u16>,
    first: Option<u16>,
    last: Option<u16>,
}

impl WordBuffer {
    fn new(start: u16) -> Self {
        Self {
            start,
            words: Vec::new(),
            first: None,
            last: None,
        }
    }

    fn write(&mut self, address: u16, words: &[u16]) -> Result<(), Error> {
        if words.is_empty() {
            return Ok(());
        }
        let offset = address
            .checked_sub(self.start)
            .ok_or_else(|| Error::Internal(format!("write at 0x{:04X} before start", address)))?;
        let end = address
            .checked_add(words.len() as u16 - 1)
            .ok_or(Error::AddressOutOfRange(address, words.len() as u16))?;

        let offset = offset as usize;
        if self.words.len() < offset + words.len() {
            self.words.resize(offset + words.len(), 0);
        }
        self.words[offset..offset + words.len()].copy_from_slice(words);

        self.first = Some(self.first.map_or(address, |f| f.min(address)));
        self.last = Some(self.last.map_or(end, |l| l.max(end)));
        Ok(())
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }
}

// ----------------------------------------------------------------------------
// Memory

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryWriterFactory;

pub struct MemoryWriter {
    name: String,
    buffer: WordBuffer,
}

impl WriterFactory for MemoryWriterFactory {
    fn create(&self, unit: &CompilationUnit) -> Result<Box<dyn ObjectCodeWriter>, Error> {
        Ok(Box::new(MemoryWriter {
            name: format!("{}.bin", unit.identifier()),
            buffer: WordBuffer::new(unit.start_address()),
        }))
    }
}

impl ObjectCodeWriter for MemoryWriter {
    fn write(&mut self, address: u16, words: &[u16]) -> Result<(), Error> {
        self.buffer.write(address, words)
    }

    fn first_write_offset(&self) -> Option<u16> {
        self.buffer.first
    }

    fn last_write_offset(&self) -> Option<u16> {
        self.buffer.last
    }

    fn close(self: Box<Self>) -> Result<ObjectCode, Error> {
        let MemoryWriter { name, buffer } = *self;
        Ok(ObjectCode {
            resource: Resource::memory(name, buffer.to_bytes()),
            first_write: buffer.first,
            last_write: buffer.last,
        })
    }
}

// ----------------------------------------------------------------------------
// File

/// Writes `<stem>.o` next to each source, or into `dir` if given.
#[derive(Debug, Clone, Default)]
pub struct FileWriterFactory {
    dir: Option<PathBuf>,
}

impl FileWriterFactory {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }
}

pub struct FileWriter {
    path: PathBuf,
    buffer: WordBuffer,
}

impl WriterFactory for FileWriterFactory {
    fn create(&self, unit: &CompilationUnit) -> Result<Box<dyn ObjectCodeWriter>, Error> {
        let source = PathBuf::from(unit.identifier());
        let name = source
            .file_stem()
            .map(|s| format!("{}.o", s.to_string_lossy()))
            .unwrap_or_else(|| format!("unit{}.o", unit.id().0));
        let path = match (&self.dir, source.parent()) {
            (Some(dir), _) => dir.join(name),
            (None, Some(parent)) => parent.join(name),
            (None, None) => PathBuf::from(name),
        };
        Ok(Box::new(FileWriter {
            path,
            buffer: WordBuffer::new(unit.start_address()),
        }))
    }
}

impl ObjectCodeWriter for FileWriter {
    fn write(&mut self, address: u16, words: &[u16]) -> Result<(), Error> {
        self.buffer.write(address, words)
    }

    fn first_write_offset(&self) -> Option<u16> {
        self.buffer.first
    }

    fn last_write_offset(&self) -> Option<u16> {
        self.buffer.last
    }

    fn close(self: Box<Self>) -> Result<ObjectCode, Error> {
        let FileWriter { path, buffer } = *self;
        std::fs::write(&path, buffer.to_bytes())
            .map_err(|e| Error::ResourceWrite(path.display().to_string(), e))?;
        Ok(ObjectCode {
            resource: Resource::file(path),
            first_write: buffer.first,
            last_write: buffer.last,
        })
    }
}
