use core::ops::Deref;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::io::{self, Read};

use spin::{RwLock, RwLockReadGuard};

use common::NUM_CHANNELS;

use crate::wav::{self, LoadError, WAV_HEADER_LEN};

/// Per-channel PCM capacity: 16 KiB of mono 16-bit frames.
pub const MAX_SAMPLE_FRAMES: usize = 8192;

pub(crate) struct SampleBuffer {
    len: usize,
    data: [i16; MAX_SAMPLE_FRAMES],
}

impl SampleBuffer {
    const fn empty() -> Self {
        Self {
            len: 0,
            data: [0; MAX_SAMPLE_FRAMES],
        }
    }
}

/// Owner of all sample PCM.
///
/// Each channel holds one fixed buffer behind a `spin::RwLock`; the
/// loaded length is mirrored in a lock-free atomic so trigger decisions
/// and observers never touch the lock. Loading runs in the foreground
/// only; the render path takes `try_read` views and treats a channel
/// whose buffer is write-locked as silent for that fill.
pub struct SampleStore {
    buffers: [RwLock<SampleBuffer>; NUM_CHANNELS],
    lengths: [AtomicUsize; NUM_CHANNELS],
}

/// Read-only view of one channel's PCM, alive for the duration of a
/// render pass.
pub struct SampleView<'a>(RwLockReadGuard<'a, SampleBuffer>);

impl Deref for SampleView<'_> {
    type Target = [i16];

    fn deref(&self) -> &[i16] {
        &self.0.data[..self.0.len]
    }
}

impl SampleStore {
    pub fn new() -> Self {
        const BUFFER: RwLock<SampleBuffer> = RwLock::new(SampleBuffer::empty());
        const LEN: AtomicUsize = AtomicUsize::new(0);
        Self {
            buffers: [BUFFER; NUM_CHANNELS],
            lengths: [LEN; NUM_CHANNELS],
        }
    }

    /// Currently loaded length of a channel, in frames. Zero for
    /// out-of-range channels and channels with nothing loaded.
    pub fn len(&self, channel: usize) -> usize {
        match self.lengths.get(channel) {
            Some(len) => len.load(Ordering::Relaxed),
            None => 0,
        }
    }

    pub fn is_empty(&self, channel: usize) -> bool {
        self.len(channel) == 0
    }

    /// Read-only view of a channel's PCM, or `None` while a reload holds
    /// the write side (or for an out-of-range channel).
    pub fn try_view(&self, channel: usize) -> Option<SampleView<'_>> {
        let guard = self.buffers.get(channel)?.try_read()?;
        Some(SampleView(guard))
    }

    /// Decode a WAV stream into a channel, replacing whatever was loaded.
    ///
    /// Validates the canonical header, then copies up to
    /// [`MAX_SAMPLE_FRAMES`] frames; longer samples are truncated. The
    /// channel reads as unloaded for the duration of the copy, and as
    /// empty if decode fails. Returns the number of frames written.
    pub fn load<R: Read>(&self, channel: usize, reader: &mut R) -> Result<usize, LoadError> {
        let Some(buffer) = self.buffers.get(channel) else {
            return Ok(0);
        };

        let mut guard = buffer.write();
        self.lengths[channel].store(0, Ordering::Relaxed);
        guard.len = 0;

        let mut header_bytes = [0u8; WAV_HEADER_LEN];
        reader.read_exact(&mut header_bytes)?;
        let header = wav::parse(&header_bytes)?;

        let frames = (header.data_size as usize / 2).min(MAX_SAMPLE_FRAMES);

        let mut filled = 0;
        let mut chunk = [0u8; 512];
        while filled < frames {
            let want = ((frames - filled) * 2).min(chunk.len());
            let got = read_full(reader, &mut chunk[..want])?;
            // A torn final sample (odd byte) is dropped.
            for pair in chunk[..got & !1].chunks_exact(2) {
                guard.data[filled] = i16::from_le_bytes([pair[0], pair[1]]);
                filled += 1;
            }
            if got < want {
                break;
            }
        }

        guard.len = filled;
        drop(guard);
        self.lengths[channel].store(filled, Ordering::Release);
        log::debug!("mixer: channel {} loaded, {} frames", channel, filled);
        Ok(filled)
    }

    /// Install raw PCM directly, truncating to capacity. Returns the
    /// number of frames installed (zero for an out-of-range channel).
    pub fn load_pcm(&self, channel: usize, pcm: &[i16]) -> usize {
        let Some(buffer) = self.buffers.get(channel) else {
            return 0;
        };

        let mut guard = buffer.write();
        self.lengths[channel].store(0, Ordering::Relaxed);

        let frames = pcm.len().min(MAX_SAMPLE_FRAMES);
        guard.data[..frames].copy_from_slice(&pcm[..frames]);
        guard.len = frames;
        drop(guard);

        self.lengths[channel].store(frames, Ordering::Release);
        frames
    }

    pub fn unload(&self, channel: usize) {
        let Some(buffer) = self.buffers.get(channel) else {
            return;
        };
        let mut guard = buffer.write();
        guard.len = 0;
        self.lengths[channel].store(0, Ordering::Release);
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Like `read_exact`, but EOF short of the buffer is reported as the
/// byte count instead of an error.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
