//! Append-only JSONL file writer.
//!
//! Every write is flushed immediately so that concurrent readers (`tail -f`)
//! and other processes appending to the same file see whole lines.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;

/// Shared, line-flushed writer over a log file opened in append mode.
#[derive(Clone)]
pub struct AppendLogWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl AppendLogWriter {
    /// Open (or create) `path` for appending, creating parent directories.
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for AppendLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let written = guard.write(buf)?;
        guard.flush()?;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// `MakeWriter` that hands out clones of one [`AppendLogWriter`].
#[derive(Clone)]
pub struct AppendWriterFactory {
    writer: AppendLogWriter,
}

impl AppendWriterFactory {
    pub fn new(writer: AppendLogWriter) -> Self {
        Self { writer }
    }
}

impl<'a> MakeWriter<'a> for AppendWriterFactory {
    type Writer = AppendLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn test_append_writer_creates_file_and_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("logs").join("test.jsonl");

        let mut writer = AppendLogWriter::new(&path).unwrap();
        writer.write_all(b"first line\n").unwrap();

        let mut content = String::new();
        File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "first line\n");
    }

    #[test]
    fn test_append_writer_appends_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.jsonl");

        AppendLogWriter::new(&path)
            .unwrap()
            .write_all(b"one\n")
            .unwrap();
        let factory = AppendWriterFactory::new(AppendLogWriter::new(&path).unwrap());
        factory.make_writer().write_all(b"two\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "one\ntwo\n");
    }
}
