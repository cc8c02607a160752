//! Drum-kit slots: per-channel sample bindings and gains.
//!
//! On the card a kit is plain ASCII, one line per channel:
//!
//! ```text
//! 0,SAMPLES/KICK.WAV,255,128
//! 1,EMPTY,255,128
//! ```
//!
//! Loading a kit is the one persistence operation that reaches into the
//! audio side: it stops each voice, applies volume and pan, and streams
//! the WAV into the sample store. A channel that fails to load is
//! silenced and reset to the defaults rather than left with stale audio.

use common::NUM_CHANNELS;
use driver_block::{BlockDevice, BLOCK_SIZE};
use fat32lib::{DirItem, Volume};
use mixer::{Mixer, SampleStore};

use crate::{check_slot, slot_file_name, Error, Result, SlotKind, DRUMSETS_DIR, MAX_DIR_ITEMS};

pub const DEFAULT_VOLUME: u8 = 255;
pub const DEFAULT_PAN: u8 = 128;

/// The path token for a channel with no sample bound.
pub const EMPTY_PATH: &str = "EMPTY";

/// Root-directory search keywords for the fallback kit, one per channel.
pub const KIT_KEYWORDS: [&str; NUM_CHANNELS] = ["KICK", "SNARE", "HATS", "CLAP", "TOM", "PERC"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KitChannel {
    /// Relative path on the card, `None` for an empty channel.
    pub path: Option<String>,
    pub volume: u8,
    pub pan: u8,
}

impl Default for KitChannel {
    fn default() -> Self {
        Self {
            path: None,
            volume: DEFAULT_VOLUME,
            pan: DEFAULT_PAN,
        }
    }
}

impl KitChannel {
    /// Display label: the file stem of the bound sample (`PACK1/CLAP.WAV`
    /// reads as `CLAP`).
    pub fn label(&self) -> &str {
        match &self.path {
            Some(path) => {
                let name = path.rsplit('/').next().unwrap_or(path.as_str());
                name.split('.').next().unwrap_or(name)
            }
            None => "---",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Drumset {
    pub name: String,
    pub channels: [KitChannel; NUM_CHANNELS],
}

impl Drumset {
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            channels: core::array::from_fn(|_| KitChannel::default()),
        }
    }
}

pub fn encode_kit(set: &Drumset) -> String {
    let mut out = String::new();
    for (ch, channel) in set.channels.iter().enumerate() {
        let path = channel.path.as_deref().unwrap_or(EMPTY_PATH);
        out.push_str(&format!(
            "{},{},{},{}\n",
            ch, path, channel.volume, channel.pan
        ));
    }
    out
}

pub fn decode_kit(name: &str, text: &str) -> Result<Drumset> {
    let mut set = Drumset::empty(name);
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.splitn(4, ',');
        let ch: usize = parse_field(fields.next())?;
        let path = fields.next().ok_or(Error::Malformed)?;
        let volume: u8 = parse_field(fields.next())?;
        let pan: u8 = parse_field(fields.next())?;

        // Rows beyond the build's channel count are tolerated and dropped.
        if ch >= NUM_CHANNELS {
            continue;
        }
        set.channels[ch] = KitChannel {
            path: (path != EMPTY_PATH).then(|| path.to_string()),
            volume,
            pan,
        };
    }
    Ok(set)
}

fn parse_field<T: core::str::FromStr>(field: Option<&str>) -> Result<T> {
    field
        .ok_or(Error::Malformed)?
        .trim()
        .parse()
        .map_err(|_| Error::Malformed)
}

pub fn kit_save<D: BlockDevice>(vol: &mut Volume<D>, slot: u8, set: &Drumset) -> Result<()> {
    check_slot(slot)?;
    let dir = vol.find_dir(vol.root_cluster(), DRUMSETS_DIR)?;
    let name = slot_file_name(SlotKind::Kit, slot);
    vol.write_file(dir, &name, encode_kit(set).as_bytes())?;
    log::info!("slots: saved kit to slot {}", slot);
    Ok(())
}

/// Load a kit slot and configure the audio side from it.
pub fn kit_load<D: BlockDevice>(
    vol: &mut Volume<D>,
    slot: u8,
    mixer: &Mixer<'_>,
    store: &SampleStore,
) -> Result<Drumset> {
    check_slot(slot)?;
    let name = slot_file_name(SlotKind::Kit, slot);
    let path = format!("{}/{}", DRUMSETS_DIR, name);

    let mut buf = [0u8; BLOCK_SIZE];
    let read = vol.read_file(&path, &mut buf)?;
    let text = core::str::from_utf8(&buf[..read]).map_err(|_| Error::Malformed)?;

    let stem = name.split('.').next().unwrap_or(name.as_str());
    let set = decode_kit(stem, text)?;
    apply_kit(vol, &set, mixer, store);
    log::info!("slots: loaded kit {} from slot {}", set.name, slot);
    Ok(set)
}

/// Configure mixer and store from a kit description.
///
/// Channels are stopped before their buffers are replaced. A channel
/// whose sample cannot be found or decoded ends up silent at default
/// volume and pan; the rest of the kit still loads.
pub fn apply_kit<D: BlockDevice>(
    vol: &mut Volume<D>,
    set: &Drumset,
    mixer: &Mixer<'_>,
    store: &SampleStore,
) {
    for (ch, channel) in set.channels.iter().enumerate() {
        mixer.stop(ch);
        mixer.set_volume(ch, channel.volume);
        mixer.set_pan(ch, channel.pan);

        let Some(path) = &channel.path else {
            store.unload(ch);
            continue;
        };

        match load_wav_channel(vol, path, ch, store) {
            Ok(frames) => {
                log::info!("slots: channel {} <- {} ({} frames)", ch, path, frames);
            }
            Err(err) => {
                log::warn!("slots: channel {} failed to load {}: {}", ch, path, err);
                store.unload(ch);
                mixer.set_volume(ch, DEFAULT_VOLUME);
                mixer.set_pan(ch, DEFAULT_PAN);
            }
        }
    }
}

fn load_wav_channel<D: BlockDevice>(
    vol: &mut Volume<D>,
    path: &str,
    channel: usize,
    store: &SampleStore,
) -> Result<usize> {
    let mut file = vol.open(path)?;
    Ok(store.load(channel, &mut file)?)
}

/// Fallback when the card carries loose samples instead of kit slots:
/// bind the first root file whose name starts with each channel's
/// keyword. Channels without a match stay silent.
pub fn load_default_kit<D: BlockDevice>(
    vol: &mut Volume<D>,
    mixer: &Mixer<'_>,
    store: &SampleStore,
) -> Result<Drumset> {
    let mut items = vec![DirItem::default(); MAX_DIR_ITEMS];
    let count = vol.list_dir(vol.root_cluster(), &mut items)?;

    let mut set = Drumset::empty("ROOT KIT");
    for (ch, keyword) in KIT_KEYWORDS.iter().enumerate() {
        let hit = items[..count].iter().find(|item| {
            !item.is_dir
                && item.name.as_str().len() >= keyword.len()
                && item.name.as_str()[..keyword.len()].eq_ignore_ascii_case(keyword)
        });
        if let Some(item) = hit {
            set.channels[ch].path = Some(item.name.as_str().to_string());
        }
    }

    apply_kit(vol, &set, mixer, store);
    Ok(set)
}
