//! Pattern slots: the raw byte image of a [`Pattern`].
//!
//! Fixed layout, bit-exact on the card: the velocity grid in
//! channel-major order, the step count, the tempo little-endian, then the
//! NUL-padded name. 211 bytes at the canonical build, comfortably inside
//! the one-sector write the filesystem layer supports.

use static_assertions::const_assert;
use static_assertions::const_assert_eq;

use common::{MAX_STEPS, NUM_CHANNELS};
use driver_block::{BlockDevice, BLOCK_SIZE};
use fat32lib::Volume;
use sequencer::{Pattern, PATTERN_NAME_LEN};

use crate::{check_slot, slot_file_name, Error, Result, SlotKind, PATTERNS_DIR};

pub const PATTERN_IMAGE_LEN: usize = NUM_CHANNELS * MAX_STEPS + 1 + 2 + PATTERN_NAME_LEN;

const_assert_eq!(PATTERN_IMAGE_LEN, 211);
const_assert!(PATTERN_IMAGE_LEN <= BLOCK_SIZE);

pub fn encode_pattern(pattern: &Pattern) -> [u8; PATTERN_IMAGE_LEN] {
    let mut img = [0u8; PATTERN_IMAGE_LEN];
    let mut off = 0;
    for row in &pattern.steps {
        img[off..off + MAX_STEPS].copy_from_slice(row);
        off += MAX_STEPS;
    }
    img[off] = pattern.step_count;
    off += 1;
    img[off..off + 2].copy_from_slice(&pattern.bpm.to_le_bytes());
    off += 2;
    img[off..off + PATTERN_NAME_LEN].copy_from_slice(&pattern.name);
    img
}

pub fn decode_pattern(img: &[u8]) -> Result<Pattern> {
    if img.len() < PATTERN_IMAGE_LEN {
        return Err(Error::Malformed);
    }

    let mut pattern = Pattern::default();
    let mut off = 0;
    for row in &mut pattern.steps {
        row.copy_from_slice(&img[off..off + MAX_STEPS]);
        off += MAX_STEPS;
    }
    pattern.step_count = img[off];
    off += 1;
    pattern.bpm = u16::from_le_bytes([img[off], img[off + 1]]);
    off += 2;
    pattern.name.copy_from_slice(&img[off..off + PATTERN_NAME_LEN]);
    Ok(pattern)
}

pub fn pattern_save<D: BlockDevice>(
    vol: &mut Volume<D>,
    slot: u8,
    pattern: &Pattern,
) -> Result<()> {
    check_slot(slot)?;
    let dir = vol.find_dir(vol.root_cluster(), PATTERNS_DIR)?;
    let name = slot_file_name(SlotKind::Pattern, slot);
    vol.write_file(dir, &name, &encode_pattern(pattern))?;
    log::info!("slots: saved pattern to slot {}", slot);
    Ok(())
}

pub fn pattern_load<D: BlockDevice>(vol: &mut Volume<D>, slot: u8) -> Result<Pattern> {
    check_slot(slot)?;
    let name = slot_file_name(SlotKind::Pattern, slot);
    let path = format!("{}/{}", PATTERNS_DIR, name);

    let mut img = [0u8; PATTERN_IMAGE_LEN];
    let read = vol.read_file(&path, &mut img)?;
    if read < PATTERN_IMAGE_LEN {
        return Err(Error::Malformed);
    }
    let pattern = decode_pattern(&img)?;
    log::info!("slots: loaded pattern {} from slot {}", pattern.name_str(), slot);
    Ok(pattern)
}

/// The pattern to come up with: slot 1 if the card has one, otherwise the
/// built-in default at 120 BPM.
pub fn boot_pattern<D: BlockDevice>(vol: &mut Volume<D>) -> Pattern {
    match pattern_load(vol, 1) {
        Ok(pattern) => pattern,
        Err(err) => {
            log::info!("slots: no boot pattern ({}), using default", err);
            Pattern::default()
        }
    }
}
