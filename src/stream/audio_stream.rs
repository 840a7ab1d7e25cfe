//! Audio-domain editing stream
//!
//! `RandomAccessAudioStream` is what edit actions work with. It knows the
//! audio format, converts between milliseconds and bytes, maps between the
//! physical timeline (untouched file) and the virtual one (after edits), and
//! exports the edited result as a new WAVE file.
//!
//! Physical byte positions are those of the wrapped [`DynamicInputStream`].
//! When the container header is part of that stream, the payload starts at
//! [`min_byte_position`](RandomAccessAudioStream::min_byte_position) and every
//! byte value derived from milliseconds is offset by it.

use std::collections::BTreeMap;
use std::io::{self, Read, Seek, Write};
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::audio::filter::AudioFilter;
use crate::audio::format::AudioFormat;
use crate::audio::wave::{self, WaveHeader};
use crate::config::ExportOptions;
use crate::error::{Result, TrimlineError};
use crate::interval::Interval;
use crate::stream::dynamic::DynamicInputStream;
use crate::stream::random_access::RandomAccessStream;

/// Exclusions added for one "keep only this range" edit
#[derive(Debug, Clone)]
struct KeepRange {
    keep: Interval<i64>,
    added: Vec<Interval<i64>>,
}

#[derive(Debug, Clone)]
/// Its lock also serialises edits, so a mapped edit sees one exclusion set
struct AudioState {
    format: Option<AudioFormat>,
    keep_ranges: Vec<KeepRange>,
}

/// Editable, exportable view of a recording
#[derive(Debug)]
pub struct RandomAccessAudioStream {
    inner: DynamicInputStream,
    state: Mutex<AudioState>,
    encoded: bool,
    /// First payload byte
    min_position: i64,
    /// One past the last payload byte
    stream_length: i64,
    tags: BTreeMap<String, String>,
}

impl RandomAccessAudioStream {
    /// Open a WAVE file. Only the `data` payload is addressed; physical
    /// position 0 is its first byte.
    ///
    /// # Errors
    /// * `InvalidArgument` - if `path` is empty
    /// * `FileNotFound` - if the file does not exist
    /// * `InvalidAudio` / `UnsupportedFormat` - if the header cannot be used
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let probe = RandomAccessStream::open(path)?;
        let header = WaveHeader::read(&mut ReadFn(|buf: &mut [u8]| probe.read(buf)))?;
        let file_length = probe.length();
        probe.close();

        let format = header.audio_format()?;
        let end = payload_end(&header, file_length);
        let stream = RandomAccessStream::open_range(path, header.data_offset, end)?;

        info!(
            "Opened {} ({}, {} payload bytes)",
            path.display(),
            format,
            stream.length()
        );

        let audio = Self {
            stream_length: stream.length() as i64,
            inner: DynamicInputStream::new(stream),
            state: Mutex::new(AudioState {
                format: Some(format),
                keep_ranges: Vec::new(),
            }),
            encoded: false,
            min_position: 0,
            tags: header.info,
        };

        Ok(audio)
    }

    /// Wrap an existing stream.
    ///
    /// With `encoded == false` the stream must start with a WAVE header; the
    /// format is read from it and the payload starts behind it. With
    /// `encoded == true` the whole stream is payload and the format stays
    /// unset until [`set_audio_format`](Self::set_audio_format).
    pub fn from_stream(inner: DynamicInputStream, encoded: bool) -> Result<Self> {
        let physical_length = inner.physical_length();

        let (format, min_position, stream_length, tags) = if encoded {
            (None, 0, physical_length, BTreeMap::new())
        } else {
            inner.rewind()?;
            let header = WaveHeader::read(&mut ReadFn(|buf: &mut [u8]| inner.read(buf)))?;
            let format = header.audio_format()?;
            let end = payload_end(&header, physical_length);
            inner.set_read_limit(Some(end));

            (Some(format), header.data_offset, end, header.info)
        };

        let audio = Self {
            inner,
            state: Mutex::new(AudioState {
                format,
                keep_ranges: Vec::new(),
            }),
            encoded,
            min_position: min_position as i64,
            stream_length: stream_length as i64,
            tags,
        };
        audio.reset()?;

        debug!(
            "Wrapped stream: payload [{}, {}), encoded {}",
            audio.min_position, audio.stream_length, encoded
        );

        Ok(audio)
    }

    pub fn from_random_access(stream: RandomAccessStream, encoded: bool) -> Result<Self> {
        Self::from_stream(DynamicInputStream::new(stream), encoded)
    }

    pub fn is_encoded(&self) -> bool {
        self.encoded
    }

    pub fn audio_format(&self) -> Option<AudioFormat> {
        self.state.lock().format
    }

    pub fn set_audio_format(&self, format: AudioFormat) {
        debug!("audio format set to {}", format);
        self.state.lock().format = Some(format);
    }

    /// `LIST/INFO` tags of the source header
    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// First payload byte (`MIN_BYTE_POSITION`)
    pub fn min_byte_position(&self) -> i64 {
        self.min_position
    }

    /// Physical end of the payload
    pub fn stream_length(&self) -> i64 {
        self.stream_length
    }

    fn format(&self) -> Result<AudioFormat> {
        self.state
            .lock()
            .format
            .ok_or_else(TrimlineError::format_not_set)
    }

    fn clip(&self, interval: Interval<i64>) -> Interval<i64> {
        interval.clipped(self.min_position, self.stream_length)
    }

    /// Payload-relative byte count for `millis`, floored to a whole frame
    pub fn millis_to_bytes(&self, millis: i64) -> Result<i64> {
        Ok(millis_to_bytes(&self.format()?, millis))
    }

    pub fn bytes_to_millis(&self, bytes: i64) -> Result<i64> {
        Ok(bytes_to_millis(&self.format()?, bytes))
    }

    /// Payload bytes left after exclusions
    pub fn length(&self) -> i64 {
        (self.stream_length - self.min_position) - self.excluded_length()
    }

    pub fn length_in_millis(&self) -> Result<i64> {
        let format = self.format()?;
        let bytes_per_second = format.bytes_per_second() as i128;
        if bytes_per_second == 0 {
            return Ok(0);
        }

        Ok((self.length() as i128 * 1000 / bytes_per_second) as i64)
    }

    /// Merged excluded bytes inside the payload
    pub fn excluded_length(&self) -> i64 {
        self.inner
            .merged_exclusions(self.min_position, self.stream_length)
            .iter()
            .map(|run| run.length())
            .sum()
    }

    pub fn exclusions(&self) -> Vec<Interval<i64>> {
        self.inner.exclusions()
    }

    /// Exclude physical bytes, clipped to the payload.
    pub fn add_exclusion(&self, interval: Interval<i64>) {
        let _edit = self.state.lock();
        self.inner.add_exclusion(self.clip(interval));
    }

    pub fn remove_exclusion(&self, interval: &Interval<i64>) -> bool {
        let _edit = self.state.lock();
        self.inner.remove_exclusion(&self.clip(*interval))
    }

    pub fn clear_exclusions(&self) {
        self.state.lock().keep_ranges.clear();
        self.inner.clear_exclusions();
    }

    /// Exclude `[start_ms, end_ms)` of the unedited recording.
    ///
    /// # Errors
    /// * `InvalidArgument` - if `start_ms >= end_ms`
    /// * `IllegalState` - if the format is not set
    pub fn add_exclusion_millis(&self, start_ms: i64, end_ms: i64) -> Result<()> {
        check_range(start_ms, end_ms)?;

        let state = self.state.lock();
        let format = state.format.ok_or_else(TrimlineError::format_not_set)?;

        let start = self.min_position.saturating_add(millis_to_bytes(&format, start_ms));
        let end = self.min_position.saturating_add(millis_to_bytes(&format, end_ms));
        self.inner.add_exclusion(self.clip(Interval::new(start, end)));

        Ok(())
    }

    /// Exclude `[start_ms, end_ms)` of the edited timeline.
    ///
    /// Both ends go through [`virtual_millis_to_physical_bytes`](Self::virtual_millis_to_physical_bytes)
    /// first, so repeated cuts at the same timeline position compose. Both
    /// ends are mapped against the same exclusion set.
    pub fn add_exclusion_virtual_millis(&self, start_ms: i64, end_ms: i64) -> Result<()> {
        check_range(start_ms, end_ms)?;

        let state = self.state.lock();
        let format = state.format.ok_or_else(TrimlineError::format_not_set)?;

        let start = self.map_virtual_millis(&format, start_ms);
        let end = self.map_virtual_millis(&format, end_ms);
        self.inner.add_exclusion(self.clip(Interval::new(start, end)));

        Ok(())
    }

    /// Keep only the virtual range `keep`, excluding what lies before and
    /// after it. A side the range already touches gets no exclusion.
    pub fn add_exclusive_millis(&self, keep: Interval<i64>) -> Result<()> {
        check_range(keep.start, keep.end)?;

        let mut state = self.state.lock();
        let format = state.format.ok_or_else(TrimlineError::format_not_set)?;

        let start = self.map_virtual_millis(&format, keep.start);
        let end = self.map_virtual_millis(&format, keep.end);

        let mut added = Vec::with_capacity(2);
        if start > self.min_position {
            added.push(self.clip(Interval::new(self.min_position, start)));
        }
        if end < self.stream_length {
            added.push(self.clip(Interval::new(end, self.stream_length)));
        }

        for interval in &added {
            self.inner.add_exclusion(*interval);
        }

        debug!("keep {} ms: added {:?}", keep, added);
        state.keep_ranges.push(KeepRange { keep, added });

        Ok(())
    }

    /// Undo the most recent [`add_exclusive_millis`](Self::add_exclusive_millis)
    /// for `keep`. Returns false if there is none.
    pub fn remove_exclusive_millis(&self, keep: Interval<i64>) -> Result<bool> {
        check_range(keep.start, keep.end)?;

        let mut state = self.state.lock();
        if state.format.is_none() {
            return Err(TrimlineError::format_not_set());
        }

        let Some(index) = state.keep_ranges.iter().rposition(|r| r.keep == keep) else {
            return Ok(false);
        };

        let record = state.keep_ranges.remove(index);
        for interval in &record.added {
            self.inner.remove_exclusion(interval);
        }

        debug!("keep {} ms removed", keep);
        Ok(true)
    }

    /// Physical byte position of virtual time `virtual_ms`.
    ///
    /// A time that lands on a cut maps to the end of the removed range.
    pub fn virtual_millis_to_physical_bytes(&self, virtual_ms: i64) -> Result<i64> {
        let format = self.format()?;
        Ok(self.map_virtual_millis(&format, virtual_ms))
    }

    fn map_virtual_millis(&self, format: &AudioFormat, virtual_ms: i64) -> i64 {
        let virtual_bytes = self
            .min_position
            .saturating_add(millis_to_bytes(format, virtual_ms));
        self.inner.virtual_to_physical(virtual_bytes)
    }

    /// Virtual time of physical byte `physical`, or `-1` if that byte lies
    /// strictly inside an excluded run.
    pub fn physical_bytes_to_virtual_millis(&self, physical: i64) -> Result<i64> {
        let format = self.format()?;

        Ok(match self.inner.physical_to_virtual(physical) {
            Some(virtual_bytes) => bytes_to_millis(&format, virtual_bytes - self.min_position),
            None => -1,
        })
    }

    /// Apply `filter` to physical bytes `range`.
    pub fn set_audio_filter(&self, filter: Arc<dyn AudioFilter>, range: Interval<i64>) {
        let _edit = self.state.lock();
        self.inner.set_audio_filter(filter, range);
    }

    /// Apply `filter` to the virtual time range `range`.
    pub fn set_audio_filter_millis(
        &self,
        filter: Arc<dyn AudioFilter>,
        range: Interval<i64>,
    ) -> Result<()> {
        let state = self.state.lock();
        let format = state.format.ok_or_else(TrimlineError::format_not_set)?;

        let start = self.map_virtual_millis(&format, range.start);
        let end = self.map_virtual_millis(&format, range.end);
        self.inner.set_audio_filter(filter, Interval::new(start, end));
        Ok(())
    }

    pub fn remove_audio_filter(&self, filter: &Arc<dyn AudioFilter>) -> bool {
        let _edit = self.state.lock();
        self.inner.remove_audio_filter(filter)
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(buf)
    }

    pub fn skip(&self, n: u64) -> Result<u64> {
        self.inner.skip(n)
    }

    pub fn available(&self) -> u64 {
        self.inner.available()
    }

    /// Virtual payload bytes consumed since the last reset
    pub fn position(&self) -> u64 {
        self.inner.position().saturating_sub(self.min_position as u64)
    }

    /// Move to the first payload byte, exclusions kept.
    pub fn reset(&self) -> Result<()> {
        self.inner.rewind()?;
        if self.min_position > 0 {
            self.inner.skip(self.min_position as u64)?;
        }
        Ok(())
    }

    /// Export the edited recording with default options.
    pub fn write<W: Write + Seek>(&self, channel: &mut W) -> Result<u64> {
        self.write_with(channel, &ExportOptions::default())
    }

    /// Export the edited recording as a WAVE file at the channel's current
    /// position, returning the number of payload bytes written.
    ///
    /// The stream is rewound first and left at its end.
    ///
    /// # Errors
    /// * `IllegalState` - if the format is not set
    /// * `InvalidAudio` - if the payload does not fit a WAVE file
    pub fn write_with<W: Write + Seek>(&self, channel: &mut W, options: &ExportOptions) -> Result<u64> {
        let format = self.format()?;
        options.validate()?;
        self.reset()?;

        let header_start = channel.stream_position()?;
        wave::write_header(channel, &format, 0)?;

        let mut buffer = vec![0u8; options.buffer_size];
        let mut written = 0u64;
        loop {
            let n = self.inner.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            channel.write_all(&buffer[..n])?;
            written += n as u64;
        }

        if written % 2 == 1 {
            channel.write_all(&[0])?;
        }

        let data_length = u32::try_from(written).map_err(|_| TrimlineError::InvalidAudio {
            reason: format!("{} payload bytes exceed the WAVE size limit", written),
        })?;
        wave::patch_sizes(channel, header_start, data_length)?;
        channel.flush()?;

        info!(
            "Exported {} payload bytes ({} excluded)",
            written,
            self.excluded_length()
        );

        Ok(written)
    }

    /// Independent copy for undo snapshots and concurrent export: same
    /// format, exclusions, filters and keep ranges, own handle and cursor.
    pub fn try_clone(&self) -> Result<Self> {
        let state = self.state.lock();
        let inner = self.inner.try_clone()?;

        let clone = Self {
            inner,
            state: Mutex::new(state.clone()),
            encoded: self.encoded,
            min_position: self.min_position,
            stream_length: self.stream_length,
            tags: self.tags.clone(),
        };
        drop(state);
        clone.reset()?;

        Ok(clone)
    }

    pub fn close(&self) -> Result<()> {
        self.inner.close()
    }
}

/// Adapts a fallible read function to `std::io::Read` for header parsing
struct ReadFn<F>(F);

impl<F> Read for ReadFn<F>
where
    F: FnMut(&mut [u8]) -> Result<usize>,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (self.0)(buf).map_err(|e| match e {
            TrimlineError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::Other, other),
        })
    }
}

/// Physical end of the payload described by `header` in a stream of
/// `available` bytes
fn payload_end(header: &WaveHeader, available: u64) -> u64 {
    let start = header.data_offset.min(available);

    match header.data_length {
        Some(declared) if start + declared <= available => start + declared,
        Some(declared) => {
            warn!(
                "Header declares {} payload bytes but only {} are present",
                declared,
                available - start
            );
            available
        }
        None => {
            warn!("Header data size not finalised, using the remaining {} bytes", available - start);
            available
        }
    }
}

fn check_range(start: i64, end: i64) -> Result<()> {
    if start >= end {
        return Err(TrimlineError::invalid_argument(format!(
            "range start {} is not before end {}",
            start, end
        )));
    }
    Ok(())
}

/// `millis * bytesPerSecond / 1000`, floored to a whole frame and saturated
fn millis_to_bytes(format: &AudioFormat, millis: i64) -> i64 {
    let block_align = format.block_align().max(1) as i128;
    let bytes = millis as i128 * format.bytes_per_second() as i128 / 1000;
    let bytes = bytes - bytes.rem_euclid(block_align);

    bytes.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Bytes to milliseconds, rounded to nearest
fn bytes_to_millis(format: &AudioFormat, bytes: i64) -> i64 {
    let bytes_per_second = format.bytes_per_second() as i128;
    if bytes_per_second == 0 {
        return 0;
    }

    let millis = (bytes as i128 * 2000 + bytes_per_second).div_euclid(2 * bytes_per_second);
    millis.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::Encoding;
    use crate::stream::source::MemorySource;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    /// 8 kHz mono 16-bit: 16 bytes per millisecond
    fn format() -> AudioFormat {
        AudioFormat::new(Encoding::S16LE, 8000, 1)
    }

    fn wave_bytes(payload_len: usize) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        wave::write_header(&mut cursor, &format(), payload_len as u32).unwrap();
        let payload: Vec<u8> = (0..payload_len).map(|i| (i % 251) as u8).collect();
        cursor.write_all(&payload).unwrap();
        cursor.into_inner()
    }

    /// Header-carrying stream with 1000 ms of payload
    fn wrapped() -> RandomAccessAudioStream {
        let source = MemorySource::new(wave_bytes(16_000));
        RandomAccessAudioStream::from_stream(DynamicInputStream::new(source), false).unwrap()
    }

    /// Encoded stream of 16000 bytes with the format set
    fn encoded() -> RandomAccessAudioStream {
        let source = MemorySource::new(vec![0u8; 16_000]);
        let stream =
            RandomAccessAudioStream::from_stream(DynamicInputStream::new(source), true).unwrap();
        stream.set_audio_format(format());
        stream
    }

    #[test]
    fn test_header_parsed_from_stream() {
        let stream = wrapped();
        assert_eq!(stream.audio_format(), Some(format()));
        assert_eq!(stream.min_byte_position(), 44);
        assert_eq!(stream.stream_length(), 44 + 16_000);
        assert_eq!(stream.length(), 16_000);
        assert_eq!(stream.length_in_millis().unwrap(), 1000);
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_encoded_stream_requires_format() {
        let source = MemorySource::new(vec![0u8; 100]);
        let stream =
            RandomAccessAudioStream::from_stream(DynamicInputStream::new(source), true).unwrap();

        assert!(stream.is_encoded());
        assert_eq!(stream.min_byte_position(), 0);
        assert!(matches!(
            stream.length_in_millis(),
            Err(TrimlineError::IllegalState { .. })
        ));
        assert!(matches!(
            stream.add_exclusion_millis(0, 10),
            Err(TrimlineError::IllegalState { .. })
        ));
        assert!(matches!(
            stream.virtual_millis_to_physical_bytes(0),
            Err(TrimlineError::IllegalState { .. })
        ));
        assert!(matches!(
            stream.write(&mut Cursor::new(Vec::new())),
            Err(TrimlineError::IllegalState { .. })
        ));

        // byte-based operations still work
        stream.add_exclusion(Interval::new(0, 10));
        assert_eq!(stream.length(), 90);
    }

    #[test]
    fn test_zero_byte_rate() {
        let stream = encoded();
        stream.set_audio_format(AudioFormat::new(Encoding::S16LE, 0, 1));
        assert_eq!(stream.length_in_millis().unwrap(), 0);
    }

    #[test]
    fn test_conversions_round_trip() {
        for (rate, channels) in [(8000, 1), (22050, 1), (44100, 2), (48000, 2)] {
            let format = AudioFormat::new(Encoding::S16LE, rate, channels);
            for ms in [0, 1, 7, 333, 1000, 59_999] {
                let back = bytes_to_millis(&format, millis_to_bytes(&format, ms));
                assert!((back - ms).abs() <= 1, "{} Hz x{}: {} -> {}", rate, channels, ms, back);
            }
        }
    }

    #[test]
    fn test_millis_to_bytes_saturates() {
        assert_eq!(millis_to_bytes(&format(), i64::MAX), i64::MAX);
        assert_eq!(millis_to_bytes(&format(), 1300), 20_800);
    }

    #[test]
    fn test_add_exclusion_clips_to_payload() {
        let stream = wrapped();
        stream.add_exclusion(Interval::new(0, 100));
        stream.add_exclusion(Interval::new(16_000, i64::MAX));

        assert_eq!(
            stream.exclusions(),
            vec![Interval::new(44, 100), Interval::new(16_000, 16_044)]
        );
        assert_eq!(stream.excluded_length(), 56 + 44);
        assert_eq!(stream.length(), 16_000 - 100);
    }

    #[test]
    fn test_add_exclusion_millis() {
        let stream = wrapped();
        stream.add_exclusion_millis(100, 200).unwrap();

        assert_eq!(stream.exclusions(), vec![Interval::new(44 + 1600, 44 + 3200)]);
        assert_eq!(stream.length_in_millis().unwrap(), 900);
    }

    #[test]
    fn test_add_exclusion_millis_rejects_empty_range() {
        let stream = wrapped();
        assert!(matches!(
            stream.add_exclusion_millis(200, 200),
            Err(TrimlineError::InvalidArgument { .. })
        ));
        assert!(matches!(
            stream.add_exclusion_virtual_millis(300, 200),
            Err(TrimlineError::InvalidArgument { .. })
        ));
        assert!(stream.exclusions().is_empty());
    }

    #[test]
    fn test_degenerate_exclusions_contribute_nothing() {
        let stream = encoded();
        stream.add_exclusion(Interval::new(100, 100));
        stream.add_exclusion(Interval::new(200, 100));

        assert_eq!(stream.exclusions().len(), 2);
        assert_eq!(stream.length(), 16_000);
    }

    #[test]
    fn test_length_tracks_add_and_remove() {
        let stream = encoded();
        let cuts = [Interval::new(0, 160), Interval::new(100, 400), Interval::new(800, 960)];
        for cut in cuts {
            stream.add_exclusion(cut);
            assert_eq!(stream.length(), 16_000 - stream.excluded_length());
        }

        assert!(stream.remove_exclusion(&cuts[1]));
        assert_eq!(stream.length(), 16_000 - 320);
    }

    #[test]
    fn test_virtual_cuts_compose() {
        let stream = encoded();
        // Cutting the first 100 ms of the edited timeline twice removes 200 ms.
        stream.add_exclusion_virtual_millis(0, 100).unwrap();
        stream.add_exclusion_virtual_millis(0, 100).unwrap();

        assert_eq!(stream.excluded_length(), 3200);
        assert_eq!(stream.length_in_millis().unwrap(), 800);

        // Compare with physical millis, which would hit the same bytes again.
        let physical = encoded();
        physical.add_exclusion_millis(0, 100).unwrap();
        physical.add_exclusion_millis(0, 100).unwrap();
        assert_eq!(physical.excluded_length(), 1600);
    }

    #[test]
    fn test_concurrent_virtual_cuts_compose() {
        let stream = Arc::new(encoded());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stream = Arc::clone(&stream);
                std::thread::spawn(move || {
                    for _ in 0..5 {
                        stream.add_exclusion_virtual_millis(0, 10).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // 40 cuts of 10 ms, each one right behind the last
        assert_eq!(stream.exclusions().len(), 40);
        assert_eq!(stream.excluded_length(), 40 * 160);
        assert_eq!(stream.virtual_millis_to_physical_bytes(0).unwrap(), 40 * 160);
        assert_eq!(stream.length_in_millis().unwrap(), 600);
    }

    #[test]
    fn test_virtual_to_physical_lands_after_cut() {
        let stream = encoded();
        stream.add_exclusion_millis(100, 200).unwrap();

        assert_eq!(stream.virtual_millis_to_physical_bytes(50).unwrap(), 800);
        assert_eq!(stream.virtual_millis_to_physical_bytes(100).unwrap(), 3200);
        assert_eq!(stream.virtual_millis_to_physical_bytes(150).unwrap(), 4000);
    }

    #[test]
    fn test_physical_to_virtual() {
        let stream = encoded();
        stream.add_exclusion_millis(100, 200).unwrap();

        assert_eq!(stream.physical_bytes_to_virtual_millis(800).unwrap(), 50);
        assert_eq!(stream.physical_bytes_to_virtual_millis(1600).unwrap(), 100);
        assert_eq!(stream.physical_bytes_to_virtual_millis(2000).unwrap(), -1);
        assert_eq!(stream.physical_bytes_to_virtual_millis(3200).unwrap(), 100);
        assert_eq!(stream.physical_bytes_to_virtual_millis(4000).unwrap(), 150);
    }

    #[test]
    fn test_mapping_is_inverse_outside_cuts() {
        let stream = wrapped();
        stream.add_exclusion_millis(100, 200).unwrap();
        stream.add_exclusion_millis(500, 650).unwrap();

        for virtual_ms in [0, 50, 99, 101, 300, 399, 401, 700] {
            let physical = stream.virtual_millis_to_physical_bytes(virtual_ms).unwrap();
            let back = stream.physical_bytes_to_virtual_millis(physical).unwrap();
            assert_eq!(back, virtual_ms);
        }
    }

    #[test]
    fn test_exclusive_adds_both_sides() {
        let stream = encoded();
        stream.add_exclusive_millis(Interval::new(100, 300)).unwrap();

        assert_eq!(
            stream.exclusions(),
            vec![Interval::new(0, 1600), Interval::new(4800, 16_000)]
        );
        assert_eq!(stream.length_in_millis().unwrap(), 200);
    }

    #[test]
    fn test_exclusive_omits_touching_sides() {
        let stream = encoded();
        stream.add_exclusive_millis(Interval::new(0, 300)).unwrap();
        assert_eq!(stream.exclusions(), vec![Interval::new(4800, 16_000)]);

        let stream = encoded();
        stream.add_exclusive_millis(Interval::new(300, 1000)).unwrap();
        assert_eq!(stream.exclusions(), vec![Interval::new(0, 4800)]);

        let stream = encoded();
        stream.add_exclusive_millis(Interval::new(0, 5000)).unwrap();
        assert!(stream.exclusions().is_empty());
    }

    #[test]
    fn test_remove_exclusive() {
        let stream = encoded();
        stream.add_exclusion_millis(500, 600).unwrap();
        stream.add_exclusive_millis(Interval::new(100, 300)).unwrap();

        assert!(stream.remove_exclusive_millis(Interval::new(100, 300)).unwrap());
        assert_eq!(stream.exclusions(), vec![Interval::new(8000, 9600)]);
        assert!(!stream.remove_exclusive_millis(Interval::new(100, 300)).unwrap());
        assert!(stream.remove_exclusive_millis(Interval::new(300, 100)).is_err());
    }

    #[test]
    fn test_read_skips_header_and_exclusions() {
        let stream = wrapped();
        let mut buf = [0u8; 4];
        stream.read(&mut buf).unwrap();
        assert_eq!(buf, [0, 1, 2, 3]);

        stream.add_exclusion(Interval::new(44, 52));
        stream.reset().unwrap();
        stream.read(&mut buf).unwrap();
        // payload bytes 0..=8 are dropped
        assert_eq!(buf, [9, 10, 11, 12]);
    }

    #[test]
    fn test_filter_millis() {
        let stream = encoded();
        let filter: Arc<dyn AudioFilter> = Arc::new(|data: &mut [u8]| data.fill(7));
        stream.add_exclusion_millis(0, 100).unwrap();
        stream.set_audio_filter_millis(filter.clone(), Interval::new(0, 1)).unwrap();

        // virtual 0..1 ms is physical 1600..1616
        let mut buf = vec![0u8; 32];
        stream.reset().unwrap();
        stream.read(&mut buf).unwrap();
        // reading starts at physical 1601
        assert!(buf[..15].iter().all(|&b| b == 7));
        assert!(buf[15..].iter().all(|&b| b == 0));

        assert!(stream.remove_audio_filter(&filter));
    }

    #[test]
    fn test_write_rewrites_header() {
        let stream = wrapped();
        stream.add_exclusion_millis(0, 100).unwrap();

        let mut out = Cursor::new(Vec::new());
        let written = stream.write(&mut out).unwrap();
        assert_eq!(written, 16_000 - 1600 - 1);

        let bytes = out.into_inner();
        // odd payload is padded
        assert_eq!(bytes.len() as u64, 44 + written + 1);

        let header = WaveHeader::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(header.data_length, Some(written));
        assert_eq!(header.audio_format().unwrap(), format());
    }

    #[test]
    fn test_write_twice_gives_same_output() {
        let stream = wrapped();
        stream.add_exclusion_millis(200, 300).unwrap();

        let mut first = Cursor::new(Vec::new());
        let mut second = Cursor::new(Vec::new());
        stream.write_with(&mut first, &ExportOptions::new(7)).unwrap();
        stream.write(&mut second).unwrap();

        assert_eq!(first.into_inner(), second.into_inner());
    }

    #[test]
    fn test_clone_is_independent() {
        let stream = wrapped();
        stream.add_exclusion_millis(100, 200).unwrap();
        stream.add_exclusive_millis(Interval::new(0, 500)).unwrap();

        let clone = stream.try_clone().unwrap();
        assert_eq!(clone.exclusions(), stream.exclusions());
        assert_eq!(clone.excluded_length(), stream.excluded_length());
        assert_eq!(clone.audio_format(), stream.audio_format());
        assert_eq!(clone.position(), 0);

        assert!(clone.remove_exclusive_millis(Interval::new(0, 500)).unwrap());
        clone.add_exclusion_millis(700, 800).unwrap();
        assert_eq!(stream.exclusions().len(), 2);
        assert_eq!(clone.exclusions().len(), 2);
        assert_ne!(clone.exclusions(), stream.exclusions());
    }

    #[test]
    fn test_clear_exclusions_forgets_keep_ranges() {
        let stream = encoded();
        stream.add_exclusive_millis(Interval::new(100, 300)).unwrap();
        stream.clear_exclusions();

        assert!(stream.exclusions().is_empty());
        assert!(!stream.remove_exclusive_millis(Interval::new(100, 300)).unwrap());
    }
}
