//! RIFF/WAVE container handling
//!
//! Only what an editing stream needs: find the format and the `data`
//! payload of a recording, and write a canonical header around an exported
//! payload. Sample data is never decoded here.

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom, Write};

use log::debug;

use crate::audio::format::{AudioFormat, Encoding, WAVE_FORMAT_EXTENSIBLE};
use crate::error::{Result, TrimlineError};

/// Length of the header written by [`write_header`]
pub const CANONICAL_HEADER_LEN: u64 = 44;

/// Declared data size used by recorders that never finalised their header
const UNKNOWN_DATA_SIZE: u32 = u32::MAX;

/// Parsed RIFF/WAVE header
#[derive(Debug, Clone, PartialEq)]
pub struct WaveHeader {
    pub format_tag: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Offset of the first payload byte from the start of the container
    pub data_offset: u64,
    /// Declared payload size, `None` when the header was never finalised
    pub data_length: Option<u64>,
    /// `LIST/INFO` tags, e.g. `INAM` or `ICMT`
    pub info: BTreeMap<String, String>,
}

impl WaveHeader {
    /// Parse a header, leaving `reader` positioned at the first payload byte.
    ///
    /// # Errors
    /// * `InvalidAudio` - if the RIFF structure is malformed or truncated
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut reader = CountingReader { inner: reader, count: 0 };

        if reader.read_tag()? != *b"RIFF" {
            return Err(invalid("missing 'RIFF' chunk"));
        }
        let _riff_size = reader.read_u32()?;
        if reader.read_tag()? != *b"WAVE" {
            return Err(invalid("expected 'WAVE' stream"));
        }

        let mut fmt: Option<FmtChunk> = None;
        let mut info = BTreeMap::new();

        loop {
            let id = reader.read_tag()?;
            let size = reader.read_u32()?;

            match &id {
                b"fmt " => fmt = Some(FmtChunk::read(&mut reader, size)?),
                b"LIST" => read_list_chunk(&mut reader, size, &mut info)?,
                b"data" => {
                    let fmt = fmt.ok_or_else(|| invalid("'data' chunk before 'fmt ' chunk"))?;
                    let data_length = match size {
                        0 | UNKNOWN_DATA_SIZE => None,
                        n => Some(n as u64),
                    };

                    return Ok(Self {
                        format_tag: fmt.format_tag,
                        channels: fmt.channels,
                        sample_rate: fmt.sample_rate,
                        byte_rate: fmt.byte_rate,
                        block_align: fmt.block_align,
                        bits_per_sample: fmt.bits_per_sample,
                        data_offset: reader.count,
                        data_length,
                        info,
                    });
                }
                other => {
                    debug!(
                        "Skipping '{}' chunk ({} bytes)",
                        String::from_utf8_lossy(other),
                        size
                    );
                    reader.skip(padded(size))?;
                }
            }
        }
    }

    /// Audio format described by the `fmt ` chunk
    ///
    /// # Errors
    /// * `UnsupportedFormat` - if the format tag/sample width has no [`Encoding`]
    pub fn audio_format(&self) -> Result<AudioFormat> {
        let encoding = Encoding::from_wave(self.format_tag, self.bits_per_sample).ok_or_else(
            || TrimlineError::UnsupportedFormat {
                format: format!(
                    "format tag {} with {} bits per sample",
                    self.format_tag, self.bits_per_sample
                ),
            },
        )?;

        Ok(AudioFormat::new(encoding, self.sample_rate, self.channels))
    }

    /// Bytes preceding the payload
    pub fn header_length(&self) -> u64 {
        self.data_offset
    }
}

/// Write a canonical 44-byte PCM header announcing `data_length` payload bytes.
pub fn write_header<W: Write>(writer: &mut W, format: &AudioFormat, data_length: u32) -> Result<()> {
    let block_align = format.block_align();
    let byte_rate = format.sample_rate.saturating_mul(block_align);

    writer.write_all(b"RIFF")?;
    writer.write_all(&riff_size(data_length).to_le_bytes())?;
    writer.write_all(b"WAVE")?;

    writer.write_all(b"fmt ")?;
    writer.write_all(&16u32.to_le_bytes())?;
    writer.write_all(&format.encoding.format_tag().to_le_bytes())?;
    writer.write_all(&format.channels.to_le_bytes())?;
    writer.write_all(&format.sample_rate.to_le_bytes())?;
    writer.write_all(&byte_rate.to_le_bytes())?;
    writer.write_all(&(block_align as u16).to_le_bytes())?;
    writer.write_all(&format.bits_per_sample().to_le_bytes())?;

    writer.write_all(b"data")?;
    writer.write_all(&data_length.to_le_bytes())?;

    Ok(())
}

/// Rewrite the size fields of a header written by [`write_header`] at
/// `header_start`. The writer is left where it was.
pub fn patch_sizes<W: Write + Seek>(writer: &mut W, header_start: u64, data_length: u32) -> Result<()> {
    let end = writer.stream_position()?;

    writer.seek(SeekFrom::Start(header_start + 4))?;
    writer.write_all(&riff_size(data_length).to_le_bytes())?;
    writer.seek(SeekFrom::Start(header_start + 40))?;
    writer.write_all(&data_length.to_le_bytes())?;
    writer.seek(SeekFrom::Start(end))?;

    Ok(())
}

fn riff_size(data_length: u32) -> u32 {
    let pad = data_length & 1;
    (CANONICAL_HEADER_LEN as u32 - 8)
        .saturating_add(data_length)
        .saturating_add(pad)
}

/// Chunk sizes are padded to an even number of bytes
fn padded(size: u32) -> u64 {
    size as u64 + (size as u64 & 1)
}

fn invalid(reason: &str) -> TrimlineError {
    TrimlineError::InvalidAudio {
        reason: reason.to_string(),
    }
}

struct FmtChunk {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
}

impl FmtChunk {
    fn read<R: Read>(reader: &mut CountingReader<'_, R>, size: u32) -> Result<Self> {
        if size < 16 {
            return Err(invalid("'fmt ' chunk too short"));
        }

        let mut chunk = FmtChunk {
            format_tag: reader.read_u16()?,
            channels: reader.read_u16()?,
            sample_rate: reader.read_u32()?,
            byte_rate: reader.read_u32()?,
            block_align: reader.read_u16()?,
            bits_per_sample: reader.read_u16()?,
        };
        let mut consumed = 16u64;

        if chunk.format_tag == WAVE_FORMAT_EXTENSIBLE && size >= 40 {
            let _extension_size = reader.read_u16()?;
            let valid_bits = reader.read_u16()?;
            let _channel_mask = reader.read_u32()?;
            let mut sub_format = [0u8; 16];
            reader.read_exact(&mut sub_format)?;
            consumed += 24;

            // The first two GUID bytes carry the actual format tag.
            chunk.format_tag = u16::from_le_bytes([sub_format[0], sub_format[1]]);
            if valid_bits != 0 && valid_bits != chunk.bits_per_sample {
                debug!(
                    "Extensible format: {} valid bits in {}-bit container",
                    valid_bits, chunk.bits_per_sample
                );
            }
        }

        reader.skip(padded(size) - consumed)?;

        Ok(chunk)
    }
}

fn read_list_chunk<R: Read>(
    reader: &mut CountingReader<'_, R>,
    size: u32,
    info: &mut BTreeMap<String, String>,
) -> Result<()> {
    let mut remaining = padded(size);
    if remaining < 4 {
        reader.skip(remaining)?;
        return Ok(());
    }

    let list_type = reader.read_tag()?;
    remaining -= 4;

    if list_type != *b"INFO" {
        debug!(
            "Skipping '{}' list",
            String::from_utf8_lossy(&list_type)
        );
        return reader.skip(remaining);
    }

    while remaining >= 8 {
        let id = reader.read_tag()?;
        let entry_size = reader.read_u32()?;
        let entry_len = padded(entry_size).min(remaining - 8);

        let mut value = vec![0u8; entry_len as usize];
        reader.read_exact(&mut value)?;
        remaining -= 8 + entry_len;

        let text = String::from_utf8_lossy(&value)
            .trim_end_matches('\0')
            .trim()
            .to_string();
        info.insert(String::from_utf8_lossy(&id).into_owned(), text);
    }

    reader.skip(remaining)
}

/// Reader that counts consumed bytes so the payload offset falls out of parsing
struct CountingReader<'a, R> {
    inner: &'a mut R,
    count: u64,
}

impl<R: Read> CountingReader<'_, R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => invalid("truncated WAVE header"),
            _ => TrimlineError::Io(e),
        })?;
        self.count += buf.len() as u64;
        Ok(())
    }

    fn read_tag(&mut self) -> Result<[u8; 4]> {
        let mut tag = [0u8; 4];
        self.read_exact(&mut tag)?;
        Ok(tag)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut bytes = [0u8; 2];
        self.read_exact(&mut bytes)?;
        Ok(u16::from_le_bytes(bytes))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_exact(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        let copied = std::io::copy(&mut self.inner.by_ref().take(n), &mut std::io::sink())?;
        if copied < n {
            return Err(invalid("truncated WAVE header"));
        }
        self.count += n;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pcm_format() -> AudioFormat {
        AudioFormat::new(Encoding::S16LE, 8000, 1)
    }

    #[test]
    fn test_write_then_read_header() {
        let mut bytes = Vec::new();
        write_header(&mut bytes, &pcm_format(), 100).unwrap();
        assert_eq!(bytes.len() as u64, CANONICAL_HEADER_LEN);

        let header = WaveHeader::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(header.audio_format().unwrap(), pcm_format());
        assert_eq!(header.data_offset, CANONICAL_HEADER_LEN);
        assert_eq!(header.data_length, Some(100));
        assert_eq!(header.byte_rate, 16000);
        assert_eq!(header.block_align, 2);
    }

    #[test]
    fn test_list_chunk_before_data() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&2u16.to_le_bytes());
        bytes.extend_from_slice(&44100u32.to_le_bytes());
        bytes.extend_from_slice(&176400u32.to_le_bytes());
        bytes.extend_from_slice(&4u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        // LIST/INFO with one odd-sized entry ("Talk\0" padded to 6)
        bytes.extend_from_slice(b"LIST");
        bytes.extend_from_slice(&18u32.to_le_bytes());
        bytes.extend_from_slice(b"INFO");
        bytes.extend_from_slice(b"INAM");
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(b"Talk\0\0");
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 8]);

        let mut cursor = Cursor::new(&bytes);
        let header = WaveHeader::read(&mut cursor).unwrap();

        assert_eq!(header.channels, 2);
        assert_eq!(header.info.get("INAM").map(String::as_str), Some("Talk"));
        assert_eq!(header.data_offset, bytes.len() as u64 - 8);
        assert_eq!(cursor.position(), header.data_offset);
    }

    #[test]
    fn test_unfinalised_data_size() {
        let mut bytes = Vec::new();
        write_header(&mut bytes, &pcm_format(), 0).unwrap();
        let header = WaveHeader::read(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(header.data_length, None);
    }

    #[test]
    fn test_not_a_wave_file() {
        let result = WaveHeader::read(&mut Cursor::new(b"ID3\x03 definitely not riff"));
        match result {
            Err(TrimlineError::InvalidAudio { reason }) => assert!(reason.contains("RIFF")),
            other => panic!("Expected InvalidAudio error, got: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_header() {
        let mut bytes = Vec::new();
        write_header(&mut bytes, &pcm_format(), 10).unwrap();
        bytes.truncate(30);
        assert!(matches!(
            WaveHeader::read(&mut Cursor::new(&bytes)),
            Err(TrimlineError::InvalidAudio { .. })
        ));
    }

    #[test]
    fn test_patch_sizes() {
        let mut cursor = Cursor::new(Vec::new());
        write_header(&mut cursor, &pcm_format(), 0).unwrap();
        cursor.write_all(&[1, 2, 3]).unwrap();
        patch_sizes(&mut cursor, 0, 3).unwrap();

        assert_eq!(cursor.position(), CANONICAL_HEADER_LEN + 3);
        let bytes = cursor.into_inner();
        assert_eq!(&bytes[4..8], &(36u32 + 3 + 1).to_le_bytes());
        assert_eq!(&bytes[40..44], &3u32.to_le_bytes());
    }

    #[test]
    fn test_unsupported_encoding() {
        let mut header = WaveHeader::read(&mut Cursor::new({
            let mut bytes = Vec::new();
            write_header(&mut bytes, &pcm_format(), 2).unwrap();
            bytes
        }))
        .unwrap();
        header.format_tag = 0x55; // MP3
        assert!(matches!(
            header.audio_format(),
            Err(TrimlineError::UnsupportedFormat { .. })
        ));
    }
}
