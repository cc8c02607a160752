use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use spin::Mutex;

use common::{NUM_CHANNELS, PULSES_PER_STEP};

use crate::clock::PulseHandler;
use crate::pattern::{Pattern, PatternCell};
use crate::TriggerSink;

/// The step state machine.
///
/// Owns the live pattern and the single queued-pattern slot. Pulse
/// handling runs in the tempo interrupt; everything else is foreground.
/// The queued slot is the only multi-word hand-off: the foreground writes
/// the payload, then sets `queued_ready` (release); the interrupt checks
/// the flag (acquire) at exactly one point, the wrap to step 0, and
/// clears it after copying in. If the interrupt catches the foreground
/// mid-write it leaves the swap for the next bar.
pub struct Sequencer<'m, M: TriggerSink> {
    mixer: &'m M,
    pattern: PatternCell,
    queued: Mutex<Pattern>,
    queued_ready: AtomicBool,
    queued_slot: AtomicU8,
    current_step: AtomicU8,
    pulse_count: AtomicU8,
    playing: AtomicBool,
}

impl<'m, M: TriggerSink> Sequencer<'m, M> {
    pub fn new(mixer: &'m M) -> Self {
        Self {
            mixer,
            pattern: PatternCell::new(&Pattern::default()),
            queued: Mutex::new(Pattern::default()),
            queued_ready: AtomicBool::new(false),
            queued_slot: AtomicU8::new(0),
            current_step: AtomicU8::new(0),
            pulse_count: AtomicU8::new(0),
            playing: AtomicBool::new(false),
        }
    }

    /// Begin playback on the downbeat: step 0's triggers fire now, not
    /// six pulses from now. The caller starts the clock afterwards.
    pub fn start(&self) {
        self.current_step.store(0, Ordering::Relaxed);
        self.pulse_count.store(0, Ordering::Relaxed);
        self.playing.store(true, Ordering::Relaxed);
        self.trigger_step(0);
    }

    pub fn stop(&self) {
        self.playing.store(false, Ordering::Relaxed);
        self.current_step.store(0, Ordering::Relaxed);
        self.pulse_count.store(0, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    pub fn current_step(&self) -> u8 {
        self.current_step.load(Ordering::Relaxed)
    }

    pub fn step_count(&self) -> u8 {
        self.pattern.step_count()
    }

    pub fn set_step_count(&self, count: u8) {
        if (1..=common::MAX_STEPS as u8).contains(&count) {
            self.pattern.set_step_count(count);
        }
    }

    pub fn get_step(&self, channel: usize, step: usize) -> u8 {
        self.pattern.step(channel, step)
    }

    pub fn set_step(&self, channel: usize, step: usize, velocity: u8) {
        self.pattern.set_step(channel, step, velocity);
    }

    /// Flip a step between silent and full velocity.
    pub fn toggle_step(&self, channel: usize, step: usize) {
        let velocity = match self.pattern.step(channel, step) {
            0 => 255,
            _ => 0,
        };
        self.pattern.set_step(channel, step, velocity);
    }

    /// Walk a step through the velocity tiers:
    /// off, full, half, quarter, eighth, off.
    pub fn cycle_step(&self, channel: usize, step: usize) {
        let velocity = match self.pattern.step(channel, step) {
            0 => 255,
            255 => 128,
            128 => 64,
            64 => 32,
            _ => 0,
        };
        self.pattern.set_step(channel, step, velocity);
    }

    pub fn clear_pattern(&self) {
        self.pattern.clear_steps();
    }

    /// Replace the live pattern immediately (foreground load path). The
    /// caller is responsible for retuning the clock from `pattern.bpm`.
    pub fn install_pattern(&self, pattern: &Pattern) {
        self.pattern.store(pattern);
    }

    pub fn pattern(&self) -> Pattern {
        self.pattern.snapshot()
    }

    pub(crate) fn cache_bpm(&self, bpm: u16) {
        self.pattern.set_bpm(bpm);
    }

    pub fn bpm(&self) -> u16 {
        self.pattern.bpm()
    }

    /// Queue a pattern for the next bar boundary; remembers which slot it
    /// came from so the display can show the pending swap.
    pub fn queue_pattern(&self, pattern: &Pattern, slot: u8) {
        {
            let mut queued = self.queued.lock();
            *queued = *pattern;
        }
        self.queued_slot.store(slot, Ordering::Relaxed);
        self.queued_ready.store(true, Ordering::Release);
    }

    pub fn is_pattern_queued(&self) -> bool {
        self.queued_ready.load(Ordering::Relaxed)
    }

    pub fn queued_slot(&self) -> u8 {
        self.queued_slot.load(Ordering::Relaxed)
    }

    fn trigger_step(&self, step: u8) {
        for channel in 0..NUM_CHANNELS {
            let velocity = self.pattern.step(channel, step as usize);
            if velocity > 0 {
                self.mixer.trigger(channel, velocity);
            }
        }
    }

    fn advance(&self) {
        let mut step = self.current_step.load(Ordering::Relaxed) + 1;
        if step >= self.pattern.step_count() {
            step = 0;
            if self.queued_ready.load(Ordering::Acquire) {
                // try_lock: if the foreground is mid-queue, swap next bar.
                if let Some(queued) = self.queued.try_lock() {
                    let bpm = self.pattern.bpm();
                    self.pattern.store(&queued);
                    // The tempo does not change on a swap.
                    self.pattern.set_bpm(bpm);
                    drop(queued);
                    self.queued_ready.store(false, Ordering::Release);
                }
            }
        }
        self.current_step.store(step, Ordering::Relaxed);
        self.trigger_step(step);
    }
}

impl<M: TriggerSink> PulseHandler for Sequencer<'_, M> {
    /// Six pulses per sixteenth note; the step advance happens strictly
    /// before its triggers.
    fn on_pulse(&self, _pulse: u8) {
        if !self.playing.load(Ordering::Relaxed) {
            return;
        }
        let pulses = self.pulse_count.load(Ordering::Relaxed) + 1;
        if pulses < PULSES_PER_STEP {
            self.pulse_count.store(pulses, Ordering::Relaxed);
            return;
        }
        self.pulse_count.store(0, Ordering::Relaxed);
        self.advance();
    }
}
