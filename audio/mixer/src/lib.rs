//! Polyphonic sample mixer and sample storage.
//!
//! The mixer sums up to [`common::NUM_CHANNELS`] one-shot voices into
//! interleaved stereo frames with per-voice velocity, mix volume, and pan,
//! saturating to 16 bits. It renders from interrupt context, so every
//! operation takes `&self` and all voice state is atomic; the only
//! blocking primitive in the crate is the per-channel sample lock, which
//! the render path acquires with `try_read` and skips if a reload is in
//! flight.
//!
//! Sample PCM is owned by the [`SampleStore`]; the mixer holds a borrow
//! of the store and reads the channel buffers through short-lived
//! read-only views.

mod store;
mod voice;
mod wav;

pub use store::{SampleStore, SampleView, MAX_SAMPLE_FRAMES};
pub use voice::{Mixer, VoiceSnapshot};
pub use wav::{LoadError, WAV_HEADER_LEN};
