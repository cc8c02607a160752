//! Canonical 44-byte WAV header decode.
//!
//! The device plays exactly one sample format: mono 16-bit PCM at
//! 44 100 Hz with the classic RIFF/WAVE/fmt /data chunk order. Anything
//! else is rejected at load time rather than resampled.

use scroll::Pread;
use static_assertions::const_assert_eq;
use thiserror::Error;

pub const WAV_HEADER_LEN: usize = 44;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("missing RIFF/WAVE header")]
    BadRiff,
    #[error("not PCM encoded")]
    NotPcm,
    #[error("not 44100 Hz")]
    BadRate,
    #[error("not 16-bit")]
    BadBits,
    #[error("not mono")]
    NotMono,
    #[error("sample read failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, Pread)]
#[repr(C)]
#[allow(dead_code)]
pub(crate) struct WavHeader {
    pub riff: [u8; 4],
    pub file_size: u32,
    pub wave: [u8; 4],
    pub fmt: [u8; 4],
    pub fmt_size: u32,
    pub audio_format: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data: [u8; 4],
    pub data_size: u32,
}

const_assert_eq!(core::mem::size_of::<WavHeader>(), WAV_HEADER_LEN);

pub(crate) fn parse(bytes: &[u8; WAV_HEADER_LEN]) -> Result<WavHeader, LoadError> {
    let header: WavHeader = bytes
        .pread_with(0, scroll::LE)
        .map_err(|_| LoadError::BadRiff)?;

    if &header.riff != b"RIFF"
        || &header.wave != b"WAVE"
        || &header.fmt != b"fmt "
        || &header.data != b"data"
    {
        return Err(LoadError::BadRiff);
    }
    if header.audio_format != 1 {
        return Err(LoadError::NotPcm);
    }
    if header.num_channels != 1 {
        return Err(LoadError::NotMono);
    }
    if header.sample_rate != common::SAMPLE_RATE {
        return Err(LoadError::BadRate);
    }
    if header.bits_per_sample != 16 {
        return Err(LoadError::BadBits);
    }

    Ok(header)
}
