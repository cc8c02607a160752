//! Tempo clock and step sequencer.
//!
//! The clock turns a hardware timer into 24 pulses per quarter note; the
//! sequencer counts six pulses per sixteenth-note step, advances the
//! shared pattern, and fires the mixer. [`SeqCore`] bundles the two
//! behind the control surface the UI talks to: the timer interrupt calls
//! [`SeqCore::on_tick`], everything else is a foreground method.

mod clock;
mod pattern;
mod seq;

use core::sync::atomic::{AtomicBool, Ordering};

pub use clock::{
    period_micros, PulseHandler, TempoClock, TickTimer, BPM_MAX, BPM_MIN, DEFAULT_BPM,
};
pub use pattern::{Pattern, PATTERN_NAME_LEN};
pub use seq::Sequencer;

/// Where triggers land. The mixer is the real sink; tests substitute a
/// recorder.
pub trait TriggerSink {
    fn trigger(&self, channel: usize, velocity: u8);
}

impl TriggerSink for mixer::Mixer<'_> {
    fn trigger(&self, channel: usize, velocity: u8) {
        mixer::Mixer::trigger(self, channel, velocity);
    }
}

/// The sequencer core: clock, pattern state machine, and the encoder's
/// coarse/fine tempo scaling, in one handle.
pub struct SeqCore<'m, M: TriggerSink, T: TickTimer> {
    clock: TempoClock<T>,
    seq: Sequencer<'m, M>,
    coarse: AtomicBool,
}

impl<'m, M: TriggerSink, T: TickTimer> SeqCore<'m, M, T> {
    pub fn new(mixer: &'m M, timer: T) -> Self {
        Self {
            clock: TempoClock::new(timer),
            seq: Sequencer::new(mixer),
            coarse: AtomicBool::new(false),
        }
    }

    /// Timer-interrupt entry point.
    pub fn on_tick(&self) {
        self.clock.tick(&self.seq);
    }

    pub fn start(&self) {
        self.seq.start();
        self.clock.start();
        log::info!("seq: started at {} BPM", self.clock.bpm());
    }

    pub fn stop(&self) {
        self.seq.stop();
        self.clock.stop();
        log::info!("seq: stopped");
    }

    pub fn is_playing(&self) -> bool {
        self.seq.is_playing()
    }

    pub fn current_step(&self) -> u8 {
        self.seq.current_step()
    }

    pub fn step_count(&self) -> u8 {
        self.seq.step_count()
    }

    pub fn set_step_count(&self, count: u8) {
        self.seq.set_step_count(count);
    }

    /// Retune, clamped to `[40, 300]`; the pattern remembers the tempo it
    /// plays at.
    pub fn set_bpm(&self, bpm: u16) -> u16 {
        let bpm = self.clock.set_bpm(bpm);
        self.seq.cache_bpm(bpm);
        bpm
    }

    pub fn bpm(&self) -> u16 {
        self.clock.bpm()
    }

    pub fn get_step(&self, channel: usize, step: usize) -> u8 {
        self.seq.get_step(channel, step)
    }

    pub fn set_step(&self, channel: usize, step: usize, velocity: u8) {
        self.seq.set_step(channel, step, velocity);
    }

    pub fn toggle_step(&self, channel: usize, step: usize) {
        self.seq.toggle_step(channel, step);
    }

    pub fn cycle_step(&self, channel: usize, step: usize) {
        self.seq.cycle_step(channel, step);
    }

    pub fn clear_pattern(&self) {
        self.seq.clear_pattern();
    }

    /// Replace the live pattern now and retune the clock from it
    /// (foreground load path; for a bar-aligned switch while playing use
    /// [`SeqCore::queue_pattern`]).
    pub fn install_pattern(&self, pattern: &Pattern) {
        self.seq.install_pattern(pattern);
        self.set_bpm(pattern.bpm);
    }

    pub fn pattern(&self) -> Pattern {
        self.seq.pattern()
    }

    pub fn queue_pattern(&self, pattern: &Pattern, slot: u8) {
        self.seq.queue_pattern(pattern, slot);
    }

    pub fn is_pattern_queued(&self) -> bool {
        self.seq.is_pattern_queued()
    }

    pub fn queued_slot(&self) -> u8 {
        self.seq.queued_slot()
    }

    /// Encoder click: flip between fine (×1) and coarse (×10) tempo
    /// steps. Returns the new scale.
    pub fn toggle_encoder_scale(&self) -> u16 {
        let coarse = !self.coarse.load(Ordering::Relaxed);
        self.coarse.store(coarse, Ordering::Relaxed);
        self.encoder_scale()
    }

    pub fn encoder_scale(&self) -> u16 {
        if self.coarse.load(Ordering::Relaxed) {
            10
        } else {
            1
        }
    }

    /// Encoder rotation: apply a signed tick delta at the current scale.
    pub fn nudge_bpm(&self, ticks: i32) -> u16 {
        let target = self.bpm() as i32 + ticks * self.encoder_scale() as i32;
        self.set_bpm(target.clamp(0, u16::MAX as i32) as u16)
    }
}
