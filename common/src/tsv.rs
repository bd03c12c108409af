//  Copyright (c) Facebook, Inc. and its affiliates.
//  SPDX-License-Identifier: Apache-2.0

//! Tab-separated record streams.
//!
//! The protocol stages only ever see the [`RecordRead`] and [`RecordWrite`]
//! capabilities; paths, gzip and line syntax stay on this side of the
//! boundary. A path ending in `.gz` is transparently (de)compressed, any
//! other suffix is plain text. The in-memory variants back the test suites.

use std::fs::File;
use std::io;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

#[derive(Debug, thiserror::Error)]
pub enum TsvError {
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
    #[error("record syntax: {0}")]
    Csv(#[from] csv::Error),
}

/// Pull one record; `None` marks the end of the stream.
pub trait RecordRead {
    fn read(&mut self) -> Result<Option<Vec<String>>, TsvError>;
}

/// Append one record.
pub trait RecordWrite {
    fn write(&mut self, record: &[String]) -> Result<(), TsvError>;
}

/// Byte source that can rewind to its start.
trait ReadReset: Read + Send {
    fn reset(&mut self) -> io::Result<()>;
}

struct FileSource {
    file: File,
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl ReadReset for FileSource {
    fn reset(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

/// Gzip decoder state cannot rewind, so reset rebuilds it over the rewound
/// file. The `Option` is only ever `None` mid-reset.
struct GzipSource {
    decoder: Option<MultiGzDecoder<File>>,
}

impl Read for GzipSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder
            .as_mut()
            .expect("gzip decoder present")
            .read(buf)
    }
}

impl ReadReset for GzipSource {
    fn reset(&mut self) -> io::Result<()> {
        let mut file = self
            .decoder
            .take()
            .expect("gzip decoder present")
            .into_inner();
        file.seek(SeekFrom::Start(0))?;
        self.decoder = Some(MultiGzDecoder::new(file));
        Ok(())
    }
}

struct MemSource {
    cursor: Cursor<Vec<u8>>,
}

impl Read for MemSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

impl ReadReset for MemSource {
    fn reset(&mut self) -> io::Result<()> {
        self.cursor.set_position(0);
        Ok(())
    }
}

fn is_gzip_path(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

fn build_reader(src: Box<dyn ReadReset>) -> csv::Reader<Box<dyn ReadReset>> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(src)
}

/// Tab-separated record reader over a plain file, a gzipped file or an
/// in-memory buffer. Tracks how many records were handed out so the
/// progress reporter can watch from another thread.
pub struct TsvReader {
    // `None` only while reset swaps the underlying source back in
    reader: Option<csv::Reader<Box<dyn ReadReset>>>,
    lines_read: Arc<AtomicU64>,
}

impl TsvReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<TsvReader, TsvError> {
        let file = File::open(&path)?;
        let src: Box<dyn ReadReset> = if is_gzip_path(path.as_ref()) {
            Box::new(GzipSource {
                decoder: Some(MultiGzDecoder::new(file)),
            })
        } else {
            Box::new(FileSource { file })
        };
        Ok(TsvReader::from_source(src))
    }

    /// Reader over a TSV text, for tests and tools.
    pub fn memory(data: &str) -> TsvReader {
        TsvReader::from_source(Box::new(MemSource {
            cursor: Cursor::new(data.as_bytes().to_vec()),
        }))
    }

    fn from_source(src: Box<dyn ReadReset>) -> TsvReader {
        TsvReader {
            reader: Some(build_reader(src)),
            lines_read: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Shared counter of records read so far; see [`crate::progress`].
    pub fn lines_read(&self) -> Arc<AtomicU64> {
        self.lines_read.clone()
    }

    /// Rewind to the first record and zero the counter.
    pub fn reset(&mut self) -> Result<(), TsvError> {
        let mut src = self
            .reader
            .take()
            .expect("reader present")
            .into_inner();
        src.reset()?;
        self.reader = Some(build_reader(src));
        self.lines_read.store(0, Ordering::Relaxed);
        Ok(())
    }

    /// Total number of records in the stream; leaves it rewound.
    pub fn line_count(&mut self) -> Result<u64, TsvError> {
        let mut count = 0;
        while self.read()?.is_some() {
            count += 1;
        }
        self.reset()?;
        Ok(count)
    }
}

impl RecordRead for TsvReader {
    fn read(&mut self) -> Result<Option<Vec<String>>, TsvError> {
        let reader = self.reader.as_mut().expect("reader present");
        let mut record = csv::StringRecord::new();
        if reader.read_record(&mut record)? {
            self.lines_read.fetch_add(1, Ordering::Relaxed);
            Ok(Some(record.iter().map(String::from).collect()))
        } else {
            Ok(None)
        }
    }
}

/// Byte sink with an explicit finalization step (gzip trailers).
trait WriteFinish: Write + Send {
    fn finish(&mut self) -> io::Result<()>;
}

struct FileSink {
    file: File,
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl WriteFinish for FileSink {
    fn finish(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

struct GzipSink {
    encoder: GzEncoder<File>,
}

impl Write for GzipSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

impl WriteFinish for GzipSink {
    fn finish(&mut self) -> io::Result<()> {
        self.encoder.try_finish()
    }
}

struct SharedBufSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Write for SharedBufSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.lock().expect("mem sink lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl WriteFinish for SharedBufSink {
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Read side of an in-memory writer, valid after [`TsvWriter::close`].
pub struct MemSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl MemSink {
    pub fn contents(&self) -> String {
        String::from_utf8(self.buf.lock().expect("mem sink lock").clone())
            .expect("tsv output is utf-8")
    }
}

fn build_writer(sink: Box<dyn WriteFinish>) -> csv::Writer<Box<dyn WriteFinish>> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_writer(sink)
}

/// Tab-separated record writer; gzip-compresses when the path ends in `.gz`.
pub struct TsvWriter {
    // `None` once closed
    writer: Option<csv::Writer<Box<dyn WriteFinish>>>,
}

impl TsvWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<TsvWriter, TsvError> {
        let file = File::create(&path)?;
        let sink: Box<dyn WriteFinish> = if is_gzip_path(path.as_ref()) {
            Box::new(GzipSink {
                encoder: GzEncoder::new(file, Compression::default()),
            })
        } else {
            Box::new(FileSink { file })
        };
        Ok(TsvWriter {
            writer: Some(build_writer(sink)),
        })
    }

    /// Writer into memory plus the handle to read it back after close.
    pub fn memory() -> (TsvWriter, MemSink) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let writer = TsvWriter {
            writer: Some(build_writer(Box::new(SharedBufSink { buf: buf.clone() }))),
        };
        (writer, MemSink { buf })
    }

    /// Flush buffered records and finalize the sink. Further writes fail.
    pub fn close(&mut self) -> Result<(), TsvError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            let mut sink = writer
                .into_inner()
                .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
            sink.finish()?;
        }
        Ok(())
    }
}

impl RecordWrite for TsvWriter {
    fn write(&mut self, record: &[String]) -> Result<(), TsvError> {
        match self.writer.as_mut() {
            Some(writer) => {
                writer.write_record(record)?;
                Ok(())
            }
            None => Err(TsvError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write after close",
            ))),
        }
    }
}
