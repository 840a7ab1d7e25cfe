//! Seekable, exclusion-aware view over a file
//!
//! A `RandomAccessStream` addresses either a whole file or a byte range of
//! it (the payload following a container header). Excluded byte runs are
//! skipped transparently on read and skip; the file itself is never written.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use log::{debug, trace};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::error::{Result, TrimlineError};
use crate::interval::Interval;
use crate::stream::exclusion::{self, ExclusionList};
use crate::stream::source::ByteSource;

#[derive(Debug)]
struct RandomAccessState {
    /// `None` once closed
    file: Option<File>,
    /// Physical cursor relative to the range start
    position: i64,
    exclusions: ExclusionList,
}

/// File-backed byte stream with its own exclusion list
#[derive(Debug)]
pub struct RandomAccessStream {
    path: PathBuf,
    /// File offset of position 0
    start: u64,
    /// Addressable bytes from `start`
    length: u64,
    state: Mutex<RandomAccessState>,
}

impl RandomAccessStream {
    /// Open a stream over the whole file
    ///
    /// # Errors
    /// * `InvalidArgument` - if `path` is empty
    /// * `FileNotFound` - if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = open_file(path)?;
        let length = file.metadata()?.len();

        Ok(Self::with_file(path.to_path_buf(), file, 0, length))
    }

    /// Open a stream over file bytes `[start, end)`; position 0 is `start`
    ///
    /// # Errors
    /// * `InvalidArgument` - if `path` is empty or `end < start`
    /// * `FileNotFound` - if the file does not exist
    pub fn open_range(path: impl AsRef<Path>, start: u64, end: u64) -> Result<Self> {
        if end < start {
            return Err(TrimlineError::invalid_argument(format!(
                "range end {} lies before start {}",
                end, start
            )));
        }

        let path = path.as_ref();
        let file = open_file(path)?;

        Ok(Self::with_file(path.to_path_buf(), file, start, end - start))
    }

    fn with_file(path: PathBuf, file: File, start: u64, length: u64) -> Self {
        debug!(
            "Opened {} at [{}, {})",
            path.display(),
            start,
            start + length
        );

        Self {
            path,
            start,
            length,
            state: Mutex::new(RandomAccessState {
                file: Some(file),
                position: 0,
                exclusions: ExclusionList::new(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File offset of position 0
    pub fn start_offset(&self) -> u64 {
        self.start
    }

    /// Addressable length, exclusions not taken into account
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Copy up to `buf.len()` non-excluded bytes, returning 0 at end of stream.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock();
        if state.file.is_none() {
            return Err(TrimlineError::StreamClosed);
        }

        let limit = self.length as i64;
        let runs = state.exclusions.merged(0, limit);
        let mut filled = 0;

        while filled < buf.len() {
            let Some((from, readable)) =
                exclusion::next_span(&runs, state.position, limit, buf.len() - filled)
            else {
                state.position = limit;
                break;
            };

            state.position = from;
            let file = state.file.as_mut().ok_or(TrimlineError::StreamClosed)?;
            file.seek(SeekFrom::Start(self.start + from as u64))?;
            let n = file.read(&mut buf[filled..filled + readable])?;
            if n == 0 {
                // The file is shorter than the addressed range.
                break;
            }

            state.position += n as i64;
            filled += n;
        }

        trace!("read {} bytes, position {}", filled, state.position);
        Ok(filled)
    }

    /// Advance by `n` non-excluded bytes, returning how many were skipped.
    pub fn skip(&self, n: u64) -> Result<u64> {
        let mut state = self.state.lock();
        if state.file.is_none() {
            return Err(TrimlineError::StreamClosed);
        }

        let limit = self.length as i64;
        let runs = state.exclusions.merged(0, limit);
        let mut skipped = 0u64;

        while skipped < n {
            let wanted = (n - skipped).min(usize::MAX as u64) as usize;
            let Some((from, readable)) = exclusion::next_span(&runs, state.position, limit, wanted)
            else {
                state.position = limit;
                break;
            };

            state.position = from + readable as i64;
            skipped += readable as u64;
        }

        Ok(skipped)
    }

    /// `length - position - excluded bytes ahead`, never negative
    pub fn available(&self) -> u64 {
        let state = self.state.lock();
        let runs = state.exclusions.merged(0, self.length as i64);
        let remaining = self.length as i64
            - state.position
            - exclusion::excluded_after(&runs, state.position);

        remaining.max(0) as u64
    }

    /// Physical cursor relative to the range start
    pub fn position(&self) -> u64 {
        self.state.lock().position as u64
    }

    /// Rewind to the range start; exclusions are kept.
    pub fn reset(&self) {
        self.state.lock().position = 0;
    }

    pub fn add_exclusion(&self, interval: Interval<i64>) {
        debug!("{}: exclude {}", self.path.display(), interval);
        self.state.lock().exclusions.add(interval);
    }

    pub fn remove_exclusion(&self, interval: &Interval<i64>) -> bool {
        self.state.lock().exclusions.remove(interval)
    }

    pub fn clear_exclusions(&self) {
        self.state.lock().exclusions.clear();
    }

    pub fn set_exclusions(&self, intervals: Vec<Interval<i64>>) {
        self.state.lock().exclusions.replace(intervals);
    }

    /// Copy of the exclusions as they were added
    pub fn exclusions(&self) -> Vec<Interval<i64>> {
        self.state.lock().exclusions.to_vec()
    }

    pub fn excluded_length(&self) -> i64 {
        self.state
            .lock()
            .exclusions
            .excluded_length(0, self.length as i64)
    }

    /// Independent stream with its own file handle and a copy of the
    /// exclusions, positioned at the range start.
    pub fn try_clone(&self) -> Result<Self> {
        let exclusions = self.state.lock().exclusions.clone();
        let file = open_file(&self.path)?;

        debug!("Cloned {} ({} exclusions)", self.path.display(), exclusions.len());

        Ok(Self {
            path: self.path.clone(),
            start: self.start,
            length: self.length,
            state: Mutex::new(RandomAccessState {
                file: Some(file),
                position: 0,
                exclusions,
            }),
        })
    }

    /// Release the file handle. Closing twice is a no-op.
    pub fn close(&self) {
        if self.state.lock().file.take().is_some() {
            debug!("Closed {}", self.path.display());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().file.is_none()
    }

    /// SHA-256 of the raw addressed bytes, exclusions ignored
    pub fn checksum(&self) -> Result<String> {
        let mut state = self.state.lock();
        let file = state.file.as_mut().ok_or(TrimlineError::StreamClosed)?;

        file.seek(SeekFrom::Start(self.start))?;
        let mut range = file.take(self.length);
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let bytes_read = range.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl ByteSource for RandomAccessStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        RandomAccessStream::read(self, buf)
    }

    fn skip(&mut self, n: u64) -> Result<u64> {
        RandomAccessStream::skip(self, n)
    }

    /// Bytes a full read from the range start yields
    fn len(&self) -> u64 {
        let limit = self.length as i64;
        let runs = self.state.lock().exclusions.merged(0, limit);
        exclusion::yielded_length(&runs, limit) as u64
    }

    fn rewind(&mut self) -> Result<()> {
        self.reset();
        Ok(())
    }

    fn try_clone_source(&self) -> Result<Box<dyn ByteSource>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn close(&mut self) -> Result<()> {
        RandomAccessStream::close(self);
        Ok(())
    }
}

fn open_file(path: &Path) -> Result<File> {
    if path.as_os_str().is_empty() {
        return Err(TrimlineError::invalid_argument("file path is empty"));
    }

    File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TrimlineError::FileNotFound {
            path: path.display().to_string(),
            source: Some(e),
        },
        _ => TrimlineError::Io(e),
    })
}
