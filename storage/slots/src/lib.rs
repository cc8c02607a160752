//! Kit and pattern slot persistence.
//!
//! One hundred numbered slots per kind, stored as small files the FAT32
//! layer can move in a single sector: `/PATTERNS/PAT-NNN.PAT` holds the
//! raw pattern image, `/DRUMSETS/KIT-NNN.DRM` holds an ASCII line per
//! channel. Everything here is foreground code, invoked between bars or
//! while stopped; the audio path never waits on the card.

pub mod kit;
pub mod pattern;

use thiserror::Error;

use driver_block::BlockDevice;
use fat32lib::{DirItem, Volume};

pub use kit::{
    apply_kit, kit_load, kit_save, load_default_kit, Drumset, KitChannel, DEFAULT_PAN,
    DEFAULT_VOLUME, KIT_KEYWORDS,
};
pub use pattern::{
    boot_pattern, decode_pattern, encode_pattern, pattern_load, pattern_save, PATTERN_IMAGE_LEN,
};

pub const SLOT_MIN: u8 = 1;
pub const SLOT_MAX: u8 = 100;

pub const PATTERNS_DIR: &str = "PATTERNS";
pub const DRUMSETS_DIR: &str = "DRUMSETS";

/// Listing buffer bound, matching one directory cluster at the common
/// geometry.
const MAX_DIR_ITEMS: usize = fat32lib::DIR_ENTRIES_PER_CLUSTER_MAX;

#[derive(Debug, Error)]
pub enum Error {
    #[error("filesystem: {0}")]
    Fs(#[from] fat32lib::Error),
    #[error("sample: {0}")]
    Sample(#[from] mixer::LoadError),
    #[error("slot out of range")]
    BadSlot,
    #[error("malformed slot file")]
    Malformed,
}

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotKind {
    Kit,
    Pattern,
}

impl SlotKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            SlotKind::Kit => DRUMSETS_DIR,
            SlotKind::Pattern => PATTERNS_DIR,
        }
    }

    pub fn prefix(self) -> &'static str {
        match self {
            SlotKind::Kit => "KIT-",
            SlotKind::Pattern => "PAT-",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SlotKind::Kit => "DRM",
            SlotKind::Pattern => "PAT",
        }
    }
}

/// `KIT-007.DRM` / `PAT-042.PAT`.
pub fn slot_file_name(kind: SlotKind, slot: u8) -> String {
    format!("{}{:03}.{}", kind.prefix(), slot, kind.extension())
}

pub(crate) fn check_slot(slot: u8) -> Result<()> {
    if (SLOT_MIN..=SLOT_MAX).contains(&slot) {
        Ok(())
    } else {
        Err(Error::BadSlot)
    }
}

/// Slot numbers present on the card for one kind, in directory order.
/// A card without the slot directory simply has no occupied slots.
pub fn occupied_slots<D: BlockDevice>(vol: &mut Volume<D>, kind: SlotKind) -> Result<Vec<u8>> {
    let dir = match vol.find_dir(vol.root_cluster(), kind.dir_name()) {
        Ok(cluster) => cluster,
        Err(fat32lib::Error::NotFound) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut items = vec![DirItem::default(); MAX_DIR_ITEMS];
    let count = vol.list_dir(dir, &mut items)?;

    let mut slots = Vec::new();
    for item in &items[..count] {
        if let Some(slot) = parse_slot_name(item.name.as_str(), kind) {
            if !slots.contains(&slot) {
                slots.push(slot);
            }
        }
    }
    Ok(slots)
}

fn parse_slot_name(name: &str, kind: SlotKind) -> Option<u8> {
    let rest = name.strip_prefix(kind.prefix())?;
    let (digits, ext) = rest.split_once('.')?;
    if digits.len() != 3 || !ext.eq_ignore_ascii_case(kind.extension()) {
        return None;
    }
    let slot: u16 = digits.parse().ok()?;
    ((SLOT_MIN as u16..=SLOT_MAX as u16).contains(&slot)).then_some(slot as u8)
}
