// Stream format and the 44-byte RIFF/WAVE header
//
// Everything the header stores besides the two size fields is a pure
// function of AudioStreamConfig, so the header can be written before the
// first sample arrives and only the sizes need patching afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, ExtractionError};

/// Size of the canonical PCM WAV header in bytes
pub const HEADER_LEN: usize = 44;

/// ChunkSize = data length + this
pub const RIFF_SIZE_OVERHEAD: u32 = 36;

/// Byte offset of the ChunkSize field
pub const CHUNK_SIZE_OFFSET: u64 = 4;

/// Byte offset of the Subchunk2Size field
pub const DATA_SIZE_OFFSET: u64 = 40;

const PCM_FORMAT: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

/// Immutable description of the PCM stream being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStreamConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioStreamConfig {
    /// Mono, signed 16-bit little-endian stream at `sample_rate`
    pub fn mono_16bit(sample_rate: u32) -> Result<Self, CaptureError> {
        if sample_rate == 0 {
            return Err(CaptureError::InvalidConfig {
                reason: "sample_rate must be greater than 0".to_string(),
            });
        }
        Ok(Self {
            sample_rate,
            channels: 1,
            bits_per_sample: 16,
        })
    }

    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// channels x bits / 8
    pub fn block_align(&self) -> u16 {
        self.channels.saturating_mul(self.bytes_per_sample())
    }

    /// sample rate x channels x bits / 8
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate.saturating_mul(u32::from(self.block_align()))
    }
}

/// Parsed or to-be-written 44-byte container header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerHeader {
    pub chunk_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl ContainerHeader {
    /// Header describing `data_len` bytes of PCM in `config`'s format
    pub fn for_stream(config: &AudioStreamConfig, data_len: u32) -> Self {
        Self {
            chunk_size: data_len.wrapping_add(RIFF_SIZE_OVERHEAD),
            audio_format: PCM_FORMAT,
            channels: config.channels,
            sample_rate: config.sample_rate,
            byte_rate: config.byte_rate(),
            block_align: config.block_align(),
            bits_per_sample: config.bits_per_sample,
            data_len,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(b"RIFF");
        header[4..8].copy_from_slice(&self.chunk_size.to_le_bytes());
        header[8..12].copy_from_slice(b"WAVE");
        header[12..16].copy_from_slice(b"fmt ");
        header[16..20].copy_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
        header[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        header[22..24].copy_from_slice(&self.channels.to_le_bytes());
        header[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        header[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        header[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        header[36..40].copy_from_slice(b"data");
        header[40..44].copy_from_slice(&self.data_len.to_le_bytes());
        header
    }

    /// Parse and validate a header produced by the streaming writer
    ///
    /// Only the canonical 44-byte layout is accepted: tags at fixed offsets,
    /// PCM format code, and byte rate / block align consistent with the
    /// channel count and bit depth.
    pub fn parse(bytes: &[u8]) -> Result<Self, ExtractionError> {
        if bytes.len() < HEADER_LEN {
            return Err(invalid(format!(
                "expected at least {} header bytes, got {}",
                HEADER_LEN,
                bytes.len()
            )));
        }

        expect_tag(bytes, 0, b"RIFF")?;
        expect_tag(bytes, 8, b"WAVE")?;
        expect_tag(bytes, 12, b"fmt ")?;
        expect_tag(bytes, 36, b"data")?;

        let fmt_len = read_u32(bytes, 16);
        if fmt_len != FMT_CHUNK_LEN {
            return Err(invalid(format!("fmt chunk size {} (expected 16)", fmt_len)));
        }

        let header = Self {
            chunk_size: read_u32(bytes, 4),
            audio_format: read_u16(bytes, 20),
            channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            byte_rate: read_u32(bytes, 28),
            block_align: read_u16(bytes, 32),
            bits_per_sample: read_u16(bytes, 34),
            data_len: read_u32(bytes, 40),
        };

        if header.audio_format != PCM_FORMAT {
            return Err(invalid(format!(
                "audio format {} is not PCM",
                header.audio_format
            )));
        }
        if header.channels == 0 || header.sample_rate == 0 || header.bits_per_sample == 0 {
            return Err(invalid(
                "channels, sample rate and bit depth must be non-zero".to_string(),
            ));
        }
        let expected_align = u32::from(header.channels)
            .checked_mul(u32::from(header.bits_per_sample / 8))
            .filter(|align| *align <= u32::from(u16::MAX));
        let expected_rate = expected_align
            .and_then(|align| u64::from(header.sample_rate).checked_mul(u64::from(align)))
            .filter(|rate| *rate <= u64::from(u32::MAX));
        let (expected_align, expected_rate) = match (expected_align, expected_rate) {
            (Some(align), Some(rate)) => (align, rate),
            _ => {
                return Err(invalid(format!(
                    "{} Hz x {} ch x {} bit overflows the header fields",
                    header.sample_rate, header.channels, header.bits_per_sample
                )))
            }
        };
        if u32::from(header.block_align) != expected_align
            || u64::from(header.byte_rate) != expected_rate
        {
            return Err(invalid(format!(
                "byte rate {} / block align {} inconsistent with {} Hz x {} ch x {} bit",
                header.byte_rate,
                header.block_align,
                header.sample_rate,
                header.channels,
                header.bits_per_sample
            )));
        }

        Ok(header)
    }

    pub fn stream_config(&self) -> AudioStreamConfig {
        AudioStreamConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
        }
    }

    /// True once both size fields agree with each other
    pub fn sizes_consistent(&self) -> bool {
        self.chunk_size == self.data_len.wrapping_add(RIFF_SIZE_OVERHEAD)
    }
}

/// Decode signed 16-bit little-endian PCM into samples in [-1.0, 1.0)
///
/// A trailing odd byte is ignored.
pub fn decode_pcm16(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32_768.0)
        .collect()
}

/// Encode samples in [-1.0, 1.0] as signed 16-bit little-endian PCM
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn invalid(reason: String) -> ExtractionError {
    ExtractionError::InvalidContainer { reason }
}

fn expect_tag(bytes: &[u8], offset: usize, tag: &[u8; 4]) -> Result<(), ExtractionError> {
    if &bytes[offset..offset + 4] != tag {
        return Err(invalid(format!(
            "expected {:?} at offset {}",
            String::from_utf8_lossy(tag),
            offset
        )));
    }
    Ok(())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}
