//! PCM scaling and WAV framing.
//!
//! Pure functions — no I/O, no async runtime.

use thiserror::Error;

/// Scale factor from a nominal `[-1.0, 1.0]` float sample to 16-bit PCM.
pub const PCM16_SCALE: f32 = 32767.0;

/// Size of the canonical RIFF/fmt/data header written by [`write_wav`].
pub const WAV_HEADER_LEN: usize = 44;

/// Convert float samples to 16-bit PCM by multiplying by [`PCM16_SCALE`].
///
/// The cast saturates: samples beyond `[-1.0, 1.0]` pin to `i16::MIN` /
/// `i16::MAX` instead of wrapping, and NaN becomes silence.
pub fn scale_to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| (s * PCM16_SCALE) as i16).collect()
}

/// Write a WAV file (16-bit mono PCM) from raw samples.
pub fn write_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let file_len = 36 + data_len;
    let mut buf = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_len.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&1u16.to_le_bytes()); // mono
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&(sample_rate * 2).to_le_bytes()); // byte rate
    buf.extend_from_slice(&2u16.to_le_bytes()); // block align
    buf.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_len.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}

/// Reasons a buffer is not a PCM WAV file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WavError {
    #[error("too short for RIFF header")]
    TooShort,
    #[error("missing RIFF tag")]
    MissingRiff,
    #[error("missing WAVE tag")]
    MissingWave,
    #[error("fmt chunk truncated")]
    FmtTruncated,
    #[error("not PCM format (audio format {0})")]
    NotPcm(u16),
    #[error("data chunk before fmt chunk")]
    DataBeforeFmt,
    #[error("data chunk not found")]
    DataNotFound,
}

/// Parsed WAV header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Byte offset in the buffer where raw PCM data begins.
    pub data_offset: usize,
    /// Declared length of the `data` chunk in bytes.
    pub data_len: usize,
}

impl WavHeader {
    /// Number of sample frames in the `data` chunk.
    pub fn frame_count(&self) -> usize {
        let frame_bytes = usize::from(self.channels) * usize::from(self.bits_per_sample / 8);
        if frame_bytes == 0 {
            0
        } else {
            self.data_len / frame_bytes
        }
    }
}

fn le_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Parse a WAV header from a byte buffer, skipping unknown chunks.
pub fn parse_wav_header(buf: &[u8]) -> Result<WavHeader, WavError> {
    if buf.len() < 12 {
        return Err(WavError::TooShort);
    }
    if &buf[0..4] != b"RIFF" {
        return Err(WavError::MissingRiff);
    }
    if &buf[8..12] != b"WAVE" {
        return Err(WavError::MissingWave);
    }

    let mut pos = 12;
    let mut fmt: Option<(u16, u32, u16)> = None;

    while pos + 8 <= buf.len() {
        let chunk_id = &buf[pos..pos + 4];
        let chunk_size = le_u32(buf, pos + 4) as usize;

        if chunk_id == b"fmt " {
            if pos + 24 > buf.len() {
                return Err(WavError::FmtTruncated);
            }
            let audio_format = le_u16(buf, pos + 8);
            if audio_format != 1 {
                return Err(WavError::NotPcm(audio_format));
            }
            fmt = Some((
                le_u16(buf, pos + 10),
                le_u32(buf, pos + 12),
                le_u16(buf, pos + 22),
            ));
        } else if chunk_id == b"data" {
            let (channels, sample_rate, bits_per_sample) = fmt.ok_or(WavError::DataBeforeFmt)?;
            let data_offset = pos + 8;
            return Ok(WavHeader {
                channels,
                sample_rate,
                bits_per_sample,
                data_offset,
                data_len: chunk_size.min(buf.len() - data_offset),
            });
        }

        // Chunks are word-aligned.
        pos += 8 + chunk_size + (chunk_size & 1);
    }

    Err(WavError::DataNotFound)
}
