//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use log::info;

use crate::audio::wave::WaveHeader;
use crate::config::ExportOptions;
use crate::error::{Result, TrimlineError};
use crate::interval::Interval;
use crate::stream::{RandomAccessAudioStream, RandomAccessStream};

/// Print format, duration and payload checksum of a recording.
pub fn info(input: &Path) -> Result<()> {
    info!("Inspecting: {}", input.display());

    let stream = RandomAccessAudioStream::open(input)?;
    let format = stream
        .audio_format()
        .ok_or_else(TrimlineError::format_not_set)?;

    let header = WaveHeader::read(&mut std::io::BufReader::new(File::open(input)?))?;
    let payload = RandomAccessStream::open_range(
        input,
        header.data_offset,
        header.data_offset + stream.stream_length() as u64,
    )?;

    println!("File:      {}", input.display());
    println!("Format:    {}", format);
    println!("Payload:   {} bytes at offset {}", stream.length(), header.data_offset);
    println!("Duration:  {} ms", stream.length_in_millis()?);
    println!("SHA-256:   {}", payload.checksum()?);
    for (tag, value) in stream.tags() {
        println!("{}:      {}", tag, value);
    }

    payload.close();
    stream.close()
}

/// Remove `ranges` (milliseconds) and export to `output`.
///
/// With `virtual_time` every range is taken on the timeline left by the
/// ranges before it.
pub fn cut(
    input: &Path,
    output: &Path,
    ranges: &[Interval<i64>],
    virtual_time: bool,
    config: Option<&Path>,
) -> Result<()> {
    info!("Cutting {} range(s) from: {}", ranges.len(), input.display());

    let options = load_options(config)?;
    let stream = RandomAccessAudioStream::open(input)?;

    for range in ranges {
        if virtual_time {
            stream.add_exclusion_virtual_millis(range.start, range.end)?;
        } else {
            stream.add_exclusion_millis(range.start, range.end)?;
        }
    }

    export(&stream, input, output, &options)
}

/// Keep only `[from, to)` milliseconds and export to `output`.
pub fn keep(input: &Path, output: &Path, from: i64, to: i64, config: Option<&Path>) -> Result<()> {
    info!("Keeping [{}, {}) ms of: {}", from, to, input.display());

    let options = load_options(config)?;
    let stream = RandomAccessAudioStream::open(input)?;
    stream.add_exclusive_millis(Interval::new(from, to))?;

    export(&stream, input, output, &options)
}

fn load_options(config: Option<&Path>) -> Result<ExportOptions> {
    match config {
        Some(path) => ExportOptions::from_json_file(path),
        None => Ok(ExportOptions::default()),
    }
}

fn export(
    stream: &RandomAccessAudioStream,
    input: &Path,
    output: &Path,
    options: &ExportOptions,
) -> Result<()> {
    if output.exists() && fs::canonicalize(output)? == fs::canonicalize(input)? {
        return Err(TrimlineError::invalid_argument(
            "output would overwrite the input recording",
        ));
    }

    let mut writer = BufWriter::new(File::create(output)?);
    let written = stream.write_with(&mut writer, options)?;
    let millis = stream.length_in_millis()?;
    stream.close()?;

    println!(
        "Exported {} ({} payload bytes, {} ms)",
        output.display(),
        written,
        millis
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// 2 s of 8 kHz mono 16-bit audio
    fn fixture() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..16_000 {
            writer.write_sample((i % 1000) as i16).unwrap();
        }
        writer.finalize().unwrap();

        (dir, path)
    }

    fn payload_length(path: &Path) -> Option<u64> {
        let mut file = File::open(path).unwrap();
        WaveHeader::read(&mut file).unwrap().data_length
    }

    #[test]
    fn test_info() {
        let (_dir, input) = fixture();
        assert!(info(&input).is_ok());
    }

    #[test]
    fn test_cut_and_keep() {
        let (dir, input) = fixture();

        let cut_path = dir.path().join("cut.wav");
        cut(&input, &cut_path, &[Interval::new(1000, i64::MAX)], false, None).unwrap();
        assert_eq!(payload_length(&cut_path), Some(16_000));

        let keep_path = dir.path().join("keep.wav");
        keep(&input, &keep_path, 500, 1500, None).unwrap();
        // 1000 ms kept, less the byte swallowed behind the leading cut
        assert_eq!(payload_length(&keep_path), Some(16_000 - 1));
    }

    #[test]
    fn test_refuses_to_overwrite_input() {
        let (_dir, input) = fixture();
        let before = fs::read(&input).unwrap();

        let result = cut(&input, &input, &[Interval::new(0, 100)], false, None);
        assert!(matches!(result, Err(TrimlineError::InvalidArgument { .. })));
        assert_eq!(fs::read(&input).unwrap(), before);
    }
}
