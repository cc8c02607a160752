//! Double-buffered audio output.
//!
//! The pipeline owns the interleaved stereo ring the DMA engine streams
//! to the I²S DAC. The engine raises an interrupt at the ring's halfway
//! point and at its end; each interrupt hands the half the hardware just
//! left back to the mixer for refill, so playback never gaps.
//!
//! The hardware side is abstracted as a [`FrameSink`]: the platform
//! programs its DMA stream for circular transmission of the ring and
//! routes the half/full-transfer interrupts to [`AudioPipeline::on_half`]
//! and [`AudioPipeline::on_full`].

use core::cell::UnsafeCell;

use mixer::Mixer;

/// Ring size in 16-bit samples (stereo interleaved): 2048 frames total,
/// 1024 frames per half-fill.
pub const AUDIO_RING_SAMPLES: usize = 4096;

/// Frames rendered by one half/full-transfer fill.
pub const FRAMES_PER_FILL: usize = AUDIO_RING_SAMPLES / 4;

/// Capability provided by the DMA/I²S collaborator.
pub trait FrameSink {
    /// Begin circular transmission of `len` 16-bit samples starting at
    /// `ring`, with half- and full-transfer interrupts enabled, then
    /// enable the I²S peripheral in master-transmit mode.
    fn start(&mut self, ring: *const i16, len: usize);

    /// Stop in the reverse order: disable I²S, then the DMA stream.
    fn stop(&mut self);
}

/// The DMA ring and its refill dispatch.
///
/// Fills must complete within one half-buffer period
/// (`FRAMES_PER_FILL / 44_100` s, about 23 ms at the canonical size);
/// that deadline is the mixer's hard real-time budget.
pub struct AudioPipeline<'m> {
    mixer: &'m Mixer<'m>,
    ring: UnsafeCell<[i16; AUDIO_RING_SAMPLES]>,
}

// SAFETY: the ring is written only from the DMA interrupt, through
// `on_half`/`on_full`, and the two fills target disjoint halves and can
// never preempt each other (same interrupt). `start` writes before the
// sink is armed. The DMA engine reads the half the fill is not writing;
// that hand-off is the hardware contract, not something the type system
// can see.
unsafe impl Sync for AudioPipeline<'_> {}

impl<'m> AudioPipeline<'m> {
    pub fn new(mixer: &'m Mixer<'m>) -> Self {
        Self {
            mixer,
            ring: UnsafeCell::new([0; AUDIO_RING_SAMPLES]),
        }
    }

    /// Zero the ring and arm the sink. The first interrupts arrive with
    /// silence already queued, so startup is click-free.
    pub fn start<S: FrameSink>(&self, sink: &mut S) {
        // SAFETY: the sink is not armed yet, nothing else touches the ring.
        let ring = unsafe { &mut *self.ring.get() };
        ring.fill(0);
        log::info!(
            "audio: starting stream, {} frames per fill",
            FRAMES_PER_FILL
        );
        sink.start(ring.as_ptr(), AUDIO_RING_SAMPLES);
    }

    pub fn stop<S: FrameSink>(&self, sink: &mut S) {
        sink.stop();
        log::info!("audio: stream stopped");
    }

    /// Half-transfer interrupt: the DMA moved into the second half, so
    /// refill the first.
    pub fn on_half(&self) {
        self.fill(0);
    }

    /// Full-transfer interrupt: the DMA wrapped to the first half, so
    /// refill the second.
    pub fn on_full(&self) {
        self.fill(1);
    }

    fn fill(&self, half: usize) {
        const HALF_LEN: usize = AUDIO_RING_SAMPLES / 2;
        // SAFETY: see the `Sync` impl; each fill has exclusive access to
        // its half of the ring.
        let ring = unsafe { &mut *self.ring.get() };
        let slice = &mut ring[half * HALF_LEN..(half + 1) * HALF_LEN];
        self.mixer.render(slice);
    }

    /// Copy the ring out, for the level visualizer and tests. The copy
    /// may interleave with an in-flight fill; that is fine for display
    /// purposes.
    pub fn snapshot(&self, out: &mut [i16; AUDIO_RING_SAMPLES]) {
        // SAFETY: reads may race fills; i16 loads are individually whole.
        let ring = unsafe { &*self.ring.get() };
        out.copy_from_slice(ring);
    }
}
