use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use common::NUM_CHANNELS;

use crate::store::SampleStore;

pub(crate) const PAN_CENTER: u8 = 128;
pub(crate) const VOLUME_MAX: u8 = 255;

/// One polyphonic voice.
///
/// Every field is written and read as a single word: `position` and
/// `active` by the audio fill, `velocity` by the trigger path, `volume`
/// and `pan` by the foreground. No field is ever read-modify-written by
/// two contexts, so plain relaxed atomics suffice; `active` is armed last
/// so the fill never observes a half-initialized trigger.
struct Voice {
    active: AtomicBool,
    position: AtomicUsize,
    velocity: AtomicU8,
    volume: AtomicU8,
    pan: AtomicU8,
}

impl Voice {
    const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            position: AtomicUsize::new(0),
            velocity: AtomicU8::new(0),
            volume: AtomicU8::new(VOLUME_MAX),
            pan: AtomicU8::new(PAN_CENTER),
        }
    }
}

/// Foreground-visible copy of one voice's state, for the display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoiceSnapshot {
    pub active: bool,
    pub position: usize,
    pub velocity: u8,
    pub volume: u8,
    pub pan: u8,
}

/// The voice mixer. See the crate docs for the sharing rules.
pub struct Mixer<'s> {
    store: &'s SampleStore,
    voices: [Voice; NUM_CHANNELS],
}

impl<'s> Mixer<'s> {
    pub fn new(store: &'s SampleStore) -> Self {
        const VOICE: Voice = Voice::new();
        Self {
            store,
            voices: [VOICE; NUM_CHANNELS],
        }
    }

    pub fn store(&self) -> &'s SampleStore {
        self.store
    }

    /// Arm a voice from the start of its sample at the given velocity.
    ///
    /// Monophonic per channel: retriggering a playing voice restarts it.
    /// A channel with no loaded sample, or an out-of-range channel, is
    /// left untouched.
    pub fn trigger(&self, channel: usize, velocity: u8) {
        let Some(voice) = self.voices.get(channel) else {
            return;
        };
        if self.store.is_empty(channel) {
            return;
        }

        voice.position.store(0, Ordering::Relaxed);
        voice.velocity.store(velocity, Ordering::Relaxed);
        voice.active.store(true, Ordering::Release);
    }

    pub fn stop(&self, channel: usize) {
        if let Some(voice) = self.voices.get(channel) {
            voice.active.store(false, Ordering::Relaxed);
        }
    }

    pub fn stop_all(&self) {
        for voice in &self.voices {
            voice.active.store(false, Ordering::Relaxed);
        }
    }

    /// Set the channel mix level. Takes effect on the next rendered
    /// frame, which may land mid-buffer.
    pub fn set_volume(&self, channel: usize, volume: u8) {
        if let Some(voice) = self.voices.get(channel) {
            voice.volume.store(volume, Ordering::Relaxed);
        }
    }

    /// Set stereo placement: 0 = full left, 128 = center, 255 = full
    /// right.
    pub fn set_pan(&self, channel: usize, pan: u8) {
        if let Some(voice) = self.voices.get(channel) {
            voice.pan.store(pan, Ordering::Relaxed);
        }
    }

    pub fn voice(&self, channel: usize) -> Option<VoiceSnapshot> {
        let voice = self.voices.get(channel)?;
        Some(VoiceSnapshot {
            active: voice.active.load(Ordering::Relaxed),
            position: voice.position.load(Ordering::Relaxed),
            velocity: voice.velocity.load(Ordering::Relaxed),
            volume: voice.volume.load(Ordering::Relaxed),
            pan: voice.pan.load(Ordering::Relaxed),
        })
    }

    /// Render `out.len() / 2` interleaved stereo frames.
    ///
    /// Per frame and active voice: velocity gain (`>>8`), mix volume
    /// (`>>8`), then the pan split with `>>7` so center pan is unity.
    /// The stereo sums accumulate in i32 and saturate to i16. A voice
    /// whose sample is exhausted disarms itself. Never fails, never
    /// allocates, never blocks.
    pub fn render(&self, out: &mut [i16]) {
        let views: [Option<crate::SampleView<'_>>; NUM_CHANNELS] =
            core::array::from_fn(|ch| self.store.try_view(ch));

        for frame in out.chunks_exact_mut(2) {
            let mut left = 0i32;
            let mut right = 0i32;

            for (voice, view) in self.voices.iter().zip(views.iter()) {
                if !voice.active.load(Ordering::Relaxed) {
                    continue;
                }
                let Some(pcm) = view.as_deref() else {
                    // Reload in flight; the channel is silent this fill.
                    continue;
                };

                let position = voice.position.load(Ordering::Relaxed);
                if position >= pcm.len() {
                    voice.active.store(false, Ordering::Relaxed);
                    continue;
                }

                let mut sample = pcm[position] as i32;
                voice.position.store(position + 1, Ordering::Relaxed);

                sample = (sample * voice.velocity.load(Ordering::Relaxed) as i32) >> 8;
                sample = (sample * voice.volume.load(Ordering::Relaxed) as i32) >> 8;

                let pan = voice.pan.load(Ordering::Relaxed) as i32;
                left += (sample * (255 - pan)) >> 7;
                right += (sample * pan) >> 7;

                if position + 1 == pcm.len() {
                    voice.active.store(false, Ordering::Relaxed);
                }
            }

            frame[0] = sat16(left);
            frame[1] = sat16(right);
        }
    }
}

#[inline]
fn sat16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}
