//! Audio format description
//!
//! A stream only needs enough format knowledge to convert between
//! milliseconds and bytes, and to write a WAVE header on export.

use std::fmt;

use serde::{Deserialize, Serialize};

/// WAVE `fmt ` format tag for integer PCM
pub const WAVE_FORMAT_PCM: u16 = 1;
/// WAVE `fmt ` format tag for IEEE float
pub const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;
/// WAVE `fmt ` format tag for G.711 A-law
pub const WAVE_FORMAT_ALAW: u16 = 6;
/// WAVE `fmt ` format tag for G.711 mu-law
pub const WAVE_FORMAT_MULAW: u16 = 7;
/// WAVE `fmt ` format tag announcing an extensible sub-format
pub const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// Unsigned 8-bit PCM
    U8,
    /// Signed 16-bit little-endian PCM
    S16LE,
    /// Signed 24-bit little-endian PCM
    S24LE,
    /// Signed 32-bit little-endian PCM
    S32LE,
    /// 32-bit little-endian IEEE float
    Float32LE,
    /// 8-bit ITU-T G.711 A-law
    ALaw,
    /// 8-bit ITU-T G.711 mu-law
    MuLaw,
}

impl Encoding {
    /// Width of a single sample of one channel
    pub fn bytes_per_sample(&self) -> u32 {
        match self {
            Encoding::U8 | Encoding::ALaw | Encoding::MuLaw => 1,
            Encoding::S16LE => 2,
            Encoding::S24LE => 3,
            Encoding::S32LE | Encoding::Float32LE => 4,
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        (self.bytes_per_sample() * 8) as u16
    }

    /// WAVE format tag used when writing this encoding
    pub fn format_tag(&self) -> u16 {
        match self {
            Encoding::Float32LE => WAVE_FORMAT_IEEE_FLOAT,
            Encoding::ALaw => WAVE_FORMAT_ALAW,
            Encoding::MuLaw => WAVE_FORMAT_MULAW,
            _ => WAVE_FORMAT_PCM,
        }
    }

    /// Map a WAVE format tag and sample width to an encoding
    pub fn from_wave(format_tag: u16, bits_per_sample: u16) -> Option<Self> {
        match (format_tag, bits_per_sample) {
            (WAVE_FORMAT_PCM, 8) => Some(Encoding::U8),
            (WAVE_FORMAT_PCM, 16) => Some(Encoding::S16LE),
            (WAVE_FORMAT_PCM, 24) => Some(Encoding::S24LE),
            (WAVE_FORMAT_PCM, 32) => Some(Encoding::S32LE),
            (WAVE_FORMAT_IEEE_FLOAT, 32) => Some(Encoding::Float32LE),
            (WAVE_FORMAT_ALAW, 8) => Some(Encoding::ALaw),
            (WAVE_FORMAT_MULAW, 8) => Some(Encoding::MuLaw),
            _ => None,
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Encoding::U8 => "U8",
            Encoding::S16LE => "S16LE",
            Encoding::S24LE => "S24LE",
            Encoding::S32LE => "S32LE",
            Encoding::Float32LE => "FLOAT32LE",
            Encoding::ALaw => "A-law",
            Encoding::MuLaw => "mu-law",
        };
        write!(f, "{}", name)
    }
}

/// Audio format of a stream's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample encoding
    pub encoding: Encoding,
    /// Sample rate in Hz (e.g., 8000, 44100, 48000)
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(encoding: Encoding, sample_rate: u32, channels: u16) -> Self {
        Self {
            encoding,
            sample_rate,
            channels,
        }
    }

    pub fn bytes_per_sample(&self) -> u32 {
        self.encoding.bytes_per_sample()
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.encoding.bits_per_sample()
    }

    /// Bytes of one frame (one sample for every channel)
    pub fn block_align(&self) -> u32 {
        self.bytes_per_sample() * self.channels as u32
    }

    /// `sample_rate * bytes_per_sample * channels`
    pub fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.block_align() as u64
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} Hz, {} channel(s)",
            self.encoding, self.sample_rate, self.channels
        )
    }
}
