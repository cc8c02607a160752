use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};

use spin::Mutex;

use common::PPQN;

pub const BPM_MIN: u16 = 40;
pub const BPM_MAX: u16 = 300;
pub const DEFAULT_BPM: u16 = 120;

/// Hardware-timer capability the platform supplies.
///
/// The timer fires the pulse interrupt once per period and must apply
/// period changes with preload: the in-flight period completes at the old
/// rate and the next one begins at the new rate, so a retune never drops
/// or doubles a tick.
pub trait TickTimer {
    fn set_period_micros(&mut self, micros: u32);
    fn start(&mut self);
    fn stop(&mut self);
}

/// Receiver for clock pulses; the sequencer supplies one.
pub trait PulseHandler {
    fn on_pulse(&self, pulse: u8);
}

/// Timer period for a tempo, in microseconds: `60e6 / (bpm * 24)`.
pub fn period_micros(bpm: u16) -> u32 {
    60_000_000 / (bpm as u32 * PPQN)
}

/// 24-PPQN tempo clock.
///
/// Pulse delivery runs in the timer interrupt via [`TempoClock::tick`];
/// `set_bpm`, `start`, and `stop` are foreground calls, so the timer
/// capability sits behind a lock the interrupt never takes.
pub struct TempoClock<T: TickTimer> {
    timer: Mutex<T>,
    bpm: AtomicU16,
    running: AtomicBool,
    pulse: AtomicU8,
}

impl<T: TickTimer> TempoClock<T> {
    pub fn new(mut timer: T) -> Self {
        timer.set_period_micros(period_micros(DEFAULT_BPM));
        Self {
            timer: Mutex::new(timer),
            bpm: AtomicU16::new(DEFAULT_BPM),
            running: AtomicBool::new(false),
            pulse: AtomicU8::new(0),
        }
    }

    /// Retune. The tempo is clamped to `[BPM_MIN, BPM_MAX]`; the clamped
    /// value is returned and takes effect at the next period boundary.
    pub fn set_bpm(&self, bpm: u16) -> u16 {
        let bpm = bpm.clamp(BPM_MIN, BPM_MAX);
        self.bpm.store(bpm, Ordering::Relaxed);
        self.timer.lock().set_period_micros(period_micros(bpm));
        bpm
    }

    pub fn bpm(&self) -> u16 {
        self.bpm.load(Ordering::Relaxed)
    }

    pub fn start(&self) {
        self.pulse.store(0, Ordering::Relaxed);
        self.running.store(true, Ordering::Relaxed);
        self.timer.lock().start();
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.timer.lock().stop();
        self.pulse.store(0, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Pulse index within the current quarter note, `[0, 24)`.
    pub fn pulse(&self) -> u8 {
        self.pulse.load(Ordering::Relaxed)
    }

    /// Timer-interrupt entry: deliver the current pulse, then advance.
    /// O(1) beyond whatever the handler does; at 300 BPM the whole call
    /// must return within one 83 µs period.
    pub fn tick<H: PulseHandler>(&self, handler: &H) {
        if !self.running.load(Ordering::Relaxed) {
            return;
        }
        let pulse = self.pulse.load(Ordering::Relaxed);
        handler.on_pulse(pulse);
        let next = if pulse + 1 >= PPQN as u8 { 0 } else { pulse + 1 };
        self.pulse.store(next, Ordering::Relaxed);
    }
}
