//! MBR probe: find where the FAT volume starts.

use scroll::Pread;

use driver_block::BLOCK_SIZE;

/// Partition types we accept as FAT (FAT16 variants included; the BPB
/// parse rejects anything that is not really FAT32).
const FAT_TYPES: [u8; 4] = [0x04, 0x06, 0x0B, 0x0C];

#[derive(Clone, Copy, Debug, Pread)]
#[allow(dead_code)]
struct Entry {
    drive_attrs: u8,
    start_head: u8,
    start_cs: u16,
    sys_id: u8,
    end_head: u8,
    end_cs: u16,
    rel_sector: u32,
    len: u32,
}

#[derive(Pread)]
#[allow(dead_code)]
struct Header {
    bootstrap: [u8; 446],
    first_entry: Entry,
    second_entry: Entry,
    third_entry: Entry,
    fourth_entry: Entry,
    last_signature: u16, // 0xAA55
}

/// Start LBA of the volume: the first partition's start if sector 0 is a
/// valid MBR carrying a FAT type, otherwise 0 (superfloppy — the boot
/// sector is sector 0 itself).
pub(crate) fn partition_start(sector: &[u8; BLOCK_SIZE]) -> u32 {
    let header: Header = match sector.pread_with(0, scroll::LE) {
        Ok(header) => header,
        Err(_) => return 0,
    };
    if header.last_signature != 0xAA55 {
        return 0;
    }
    let entry = header.first_entry;
    if FAT_TYPES.contains(&entry.sys_id) {
        entry.rel_sector
    } else {
        0
    }
}
