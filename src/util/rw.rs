use std::{fs::File, io, path::PathBuf};

use super::rc::{RcRefCell, RcRefCellT};

/// An in-memory io::Write sink, mostly for capturing output in tests.
#[derive(Default)]
pub struct StringBuffer {
    s: String,
}

impl StringBuffer {
    pub fn new() -> StringBuffer {
        StringBuffer::default()
    }

    pub fn as_str(&self) -> &str {
        &self.s
    }

    pub fn clear(&mut self) {
        self.s.clear();
    }
}

impl io::Write for StringBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = std::str::from_utf8(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.s.push_str(text);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A cloneable handle to a shared output stream. The same error sink gets
/// handed to csv parsing, the rate loader and the app root.
#[derive(Clone)]
pub struct WriteHandle {
    w: RcRefCell<dyn io::Write>,
}

impl WriteHandle {
    pub fn stdout_write_handle() -> WriteHandle {
        WriteHandle { w: RcRefCellT::new(io::stdout()) }
    }

    pub fn stderr_write_handle() -> WriteHandle {
        WriteHandle { w: RcRefCellT::new(io::stderr()) }
    }

    /// Also returns the buffer, so its contents can be inspected.
    pub fn string_buff_write_handle() -> (WriteHandle, RcRefCell<StringBuffer>) {
        let buffer = RcRefCellT::new(StringBuffer::new());
        (WriteHandle { w: buffer.clone() }, buffer)
    }

    pub fn empty_write_handle() -> WriteHandle {
        WriteHandle { w: RcRefCellT::new(io::sink()) }
    }
}

impl io::Write for WriteHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Tests cannot capture writes to stdout/stderr, so mirror them to the
        // trace log.
        tracing::trace!("WriteHandle::write {}", String::from_utf8_lossy(buf));
        self.w.borrow_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.w.borrow_mut().flush()
    }
}

/// Transaction input, along with a name to use for it in error messages.
/// Files are only opened once read.
pub enum DescribedReader {
    Text { desc: String, data: String },
    File(PathBuf),
}

impl DescribedReader {
    pub fn from_string(desc: String, data: String) -> DescribedReader {
        DescribedReader::Text { desc, data }
    }

    pub fn from_file_path(path: PathBuf) -> DescribedReader {
        DescribedReader::File(path)
    }

    pub fn desc(&self) -> &str {
        match self {
            DescribedReader::Text { desc, .. } => desc,
            DescribedReader::File(path) => path.to_str().unwrap_or("<unknown path>"),
        }
    }

    pub fn reader(&self) -> io::Result<Box<dyn io::Read + '_>> {
        Ok(match self {
            DescribedReader::Text { data, .. } => Box::new(data.as_bytes()),
            DescribedReader::File(path) => Box::new(File::open(path)?),
        })
    }
}
