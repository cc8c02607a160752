use core::sync::atomic::{AtomicU16, AtomicU8, Ordering};

use common::{MAX_STEPS, NUM_CHANNELS};

pub const PATTERN_NAME_LEN: usize = 16;

/// One step grid: velocity bytes per channel and step, the active loop
/// length, the tempo, and a short label. This is the unit the persistence
/// layer moves to and from the card, byte for byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pattern {
    /// 0 = silent, otherwise trigger velocity.
    pub steps: [[u8; MAX_STEPS]; NUM_CHANNELS],
    /// Steps that participate in playback, `1..=MAX_STEPS`.
    pub step_count: u8,
    pub bpm: u16,
    /// NUL-padded ASCII label.
    pub name: [u8; PATTERN_NAME_LEN],
}

impl Pattern {
    pub fn named(name: &str) -> Self {
        Self {
            name: pack_name(name),
            ..Self::default()
        }
    }

    pub fn name_str(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(PATTERN_NAME_LEN);
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            steps: [[0; MAX_STEPS]; NUM_CHANNELS],
            step_count: 16,
            bpm: 120,
            name: pack_name("PATTERN 001"),
        }
    }
}

pub(crate) fn pack_name(name: &str) -> [u8; PATTERN_NAME_LEN] {
    let mut packed = [0u8; PATTERN_NAME_LEN];
    for (dst, src) in packed.iter_mut().zip(name.bytes()) {
        *dst = src;
    }
    packed
}

/// The live pattern, shared between the pulse interrupt and the
/// foreground editor.
///
/// Every cell is its own atomic byte: a step edit is one store, a step
/// read is one load, and neither side ever takes a lock. The bar-boundary
/// swap rewrites the whole grid from the interrupt; observers can see a
/// mix of old and new bytes for the duration of that copy, which the
/// byte-granularity contract accepts.
pub(crate) struct PatternCell {
    steps: [[AtomicU8; MAX_STEPS]; NUM_CHANNELS],
    step_count: AtomicU8,
    bpm: AtomicU16,
    name: [AtomicU8; PATTERN_NAME_LEN],
}

impl PatternCell {
    pub fn new(pattern: &Pattern) -> Self {
        const ZERO: AtomicU8 = AtomicU8::new(0);
        const ROW: [AtomicU8; MAX_STEPS] = [ZERO; MAX_STEPS];
        let cell = Self {
            steps: [ROW; NUM_CHANNELS],
            step_count: AtomicU8::new(16),
            bpm: AtomicU16::new(120),
            name: [ZERO; PATTERN_NAME_LEN],
        };
        cell.store(pattern);
        cell
    }

    pub fn store(&self, pattern: &Pattern) {
        for (row, src) in self.steps.iter().zip(pattern.steps.iter()) {
            for (cell, &v) in row.iter().zip(src.iter()) {
                cell.store(v, Ordering::Relaxed);
            }
        }
        self.step_count.store(pattern.step_count, Ordering::Relaxed);
        self.bpm.store(pattern.bpm, Ordering::Relaxed);
        for (cell, &b) in self.name.iter().zip(pattern.name.iter()) {
            cell.store(b, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> Pattern {
        let mut pattern = Pattern::default();
        for (src, row) in self.steps.iter().zip(pattern.steps.iter_mut()) {
            for (cell, dst) in src.iter().zip(row.iter_mut()) {
                *dst = cell.load(Ordering::Relaxed);
            }
        }
        pattern.step_count = self.step_count();
        pattern.bpm = self.bpm();
        for (cell, dst) in self.name.iter().zip(pattern.name.iter_mut()) {
            *dst = cell.load(Ordering::Relaxed);
        }
        pattern
    }

    pub fn step(&self, channel: usize, step: usize) -> u8 {
        match self.steps.get(channel).and_then(|row| row.get(step)) {
            Some(cell) => cell.load(Ordering::Relaxed),
            None => 0,
        }
    }

    pub fn set_step(&self, channel: usize, step: usize, velocity: u8) {
        if let Some(cell) = self.steps.get(channel).and_then(|row| row.get(step)) {
            cell.store(velocity, Ordering::Relaxed);
        }
    }

    pub fn clear_steps(&self) {
        for row in &self.steps {
            for cell in row {
                cell.store(0, Ordering::Relaxed);
            }
        }
    }

    pub fn step_count(&self) -> u8 {
        self.step_count.load(Ordering::Relaxed)
    }

    pub fn set_step_count(&self, count: u8) {
        self.step_count.store(count, Ordering::Relaxed);
    }

    pub fn bpm(&self) -> u16 {
        self.bpm.load(Ordering::Relaxed)
    }

    pub fn set_bpm(&self, bpm: u16) {
        self.bpm.store(bpm, Ordering::Relaxed);
    }
}
