use scroll::{Pread, Pwrite, LE};

use driver_block::{BlockDevice, BLOCK_SIZE};

use crate::file::File;
use crate::layout::{
    pack_83, Attributes, BiosParameterBlock, DirEntryRaw, DirItem, DIR_ENTRIES_PER_SECTOR,
    DIR_ENTRY_LEN, ENTRY_DELETED, ENTRY_END,
};
use crate::{mbr, Error, Result};

/// FAT32 entries are 28-bit; the top nibble is reserved and preserved.
const FAT_ENTRY_MASK: u32 = 0x0FFF_FFFF;
/// First end-of-chain value; anything at or above terminates a chain.
pub(crate) const FAT_END_OF_CHAIN: u32 = 0x0FFF_FFF8;
/// The mark written when a cluster is claimed.
const FAT_CLAIMED: u32 = 0x0FFF_FFFF;

/// Upper bound on live entries in one directory cluster (128 at the
/// common 8 sectors per cluster); sized for listing buffers.
pub const DIR_ENTRIES_PER_CLUSTER_MAX: usize = 128;

/// A mounted FAT32 volume over a block device.
///
/// Owns the device and one scratch sector, the way the firmware keeps a
/// single static sector buffer; every operation below streams through it.
pub struct Volume<D: BlockDevice> {
    pub(crate) dev: D,
    partition_start: u32,
    pub(crate) sectors_per_cluster: u8,
    num_fats: u8,
    fat_size: u32,
    fat_start: u32,
    first_data_sector: u32,
    root_cluster: u32,
    pub(crate) buf: [u8; BLOCK_SIZE],
}

impl<D: BlockDevice> Volume<D> {
    /// Bring up the device and parse the volume geometry: MBR probe
    /// (optional), then the BPB at the partition start.
    pub fn mount(mut dev: D) -> Result<Self> {
        dev.init()?;

        let mut buf = [0u8; BLOCK_SIZE];
        dev.read_block(0, &mut buf)?;
        let partition_start = mbr::partition_start(&buf);

        dev.read_block(partition_start, &mut buf)?;
        let bpb: BiosParameterBlock = buf
            .pread_with(0, LE)
            .map_err(|_| Error::Format("boot sector"))?;

        if bpb.bytes_per_sector as usize != BLOCK_SIZE {
            return Err(Error::Format("bytes per sector"));
        }
        if bpb.sectors_per_cluster == 0 || !bpb.sectors_per_cluster.is_power_of_two() {
            return Err(Error::Format("sectors per cluster"));
        }
        if bpb.num_fats == 0 {
            return Err(Error::Format("FAT count"));
        }
        if bpb.fat_size_32 == 0 {
            return Err(Error::Format("FAT size"));
        }
        if bpb.root_cluster < 2 {
            return Err(Error::Format("root cluster"));
        }

        let fat_start = partition_start + bpb.reserved_sectors as u32;
        let first_data_sector = fat_start + bpb.num_fats as u32 * bpb.fat_size_32;

        log::info!(
            "fat32: volume at LBA {}, {} sectors/cluster, {} FATs of {} sectors, root cluster {}",
            partition_start,
            bpb.sectors_per_cluster,
            bpb.num_fats,
            bpb.fat_size_32,
            bpb.root_cluster
        );

        Ok(Self {
            dev,
            partition_start,
            sectors_per_cluster: bpb.sectors_per_cluster,
            num_fats: bpb.num_fats,
            fat_size: bpb.fat_size_32,
            fat_start,
            first_data_sector,
            root_cluster: bpb.root_cluster,
            buf,
        })
    }

    pub fn root_cluster(&self) -> u32 {
        self.root_cluster
    }

    /// Unmount, handing the device back.
    pub fn into_device(self) -> D {
        self.dev
    }

    pub fn partition_start(&self) -> u32 {
        self.partition_start
    }

    pub(crate) fn cluster_to_sector(&self, cluster: u32) -> u32 {
        self.first_data_sector + (cluster - 2) * self.sectors_per_cluster as u32
    }

    /// List a directory's live entries into `out`, in directory order.
    /// The scan covers one cluster; deleted slots, long-name entries, and
    /// the volume label are skipped. `Capacity` if `out` is too small for
    /// what the directory holds.
    pub fn list_dir(&mut self, cluster: u32, out: &mut [DirItem]) -> Result<usize> {
        let first = self.cluster_to_sector(cluster);
        let mut count = 0;

        for sec in 0..self.sectors_per_cluster as u32 {
            self.dev.read_block(first + sec, &mut self.buf)?;
            for slot in 0..DIR_ENTRIES_PER_SECTOR {
                let raw: DirEntryRaw = self
                    .buf
                    .pread_with(slot * DIR_ENTRY_LEN, LE)
                    .map_err(|_| Error::Format("directory entry"))?;
                match raw.name[0] {
                    ENTRY_END => return Ok(count),
                    ENTRY_DELETED => continue,
                    _ => {}
                }
                let attr = Attributes::from_bits_truncate(raw.attr);
                if attr.is_long_name() || attr.contains(Attributes::VOLUME_ID) {
                    continue;
                }
                if count == out.len() {
                    return Err(Error::Capacity("directory listing"));
                }
                out[count] = DirItem::from_raw(&raw);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Find one entry by name, case-insensitively.
    pub fn find_entry(&mut self, cluster: u32, name: &str) -> Result<Option<DirItem>> {
        let packed = pack_83(name)?;
        let first = self.cluster_to_sector(cluster);

        for sec in 0..self.sectors_per_cluster as u32 {
            self.dev.read_block(first + sec, &mut self.buf)?;
            for slot in 0..DIR_ENTRIES_PER_SECTOR {
                let raw: DirEntryRaw = self
                    .buf
                    .pread_with(slot * DIR_ENTRY_LEN, LE)
                    .map_err(|_| Error::Format("directory entry"))?;
                match raw.name[0] {
                    ENTRY_END => return Ok(None),
                    ENTRY_DELETED => continue,
                    _ => {}
                }
                let attr = Attributes::from_bits_truncate(raw.attr);
                if attr.is_long_name() || attr.contains(Attributes::VOLUME_ID) {
                    continue;
                }
                if raw.name.map(|b| b.to_ascii_uppercase()) == packed {
                    return Ok(Some(DirItem::from_raw(&raw)));
                }
            }
        }
        Ok(None)
    }

    /// Resolve a subdirectory to its first cluster.
    pub fn find_dir(&mut self, parent: u32, name: &str) -> Result<u32> {
        match self.find_entry(parent, name)? {
            Some(item) if item.is_dir => Ok(item.first_cluster),
            Some(_) => Err(Error::NotFound),
            None => Err(Error::NotFound),
        }
    }

    /// Walk a `/`-separated relative path from the root.
    pub fn lookup_path(&mut self, path: &str) -> Result<DirItem> {
        let mut cluster = self.root_cluster;
        let mut found: Option<DirItem> = None;

        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if let Some(prev) = found {
                if !prev.is_dir {
                    return Err(Error::NotFound);
                }
                cluster = prev.first_cluster;
            }
            found = Some(self.find_entry(cluster, segment)?.ok_or(Error::NotFound)?);
        }

        found.ok_or(Error::BadArgument)
    }

    /// Open a file for sequential reading.
    pub fn open(&mut self, path: &str) -> Result<File<'_, D>> {
        let item = self.lookup_path(path)?;
        if item.is_dir {
            return Err(Error::BadArgument);
        }
        Ok(File::new(self, &item))
    }

    /// Read up to `out.len()` bytes of a file from its start; returns the
    /// byte count (the smaller of file size and buffer).
    pub fn read_file(&mut self, path: &str, out: &mut [u8]) -> Result<usize> {
        let mut file = self.open(path)?;
        let mut filled = 0;
        while filled < out.len() {
            let n = file.read_chunk(&mut out[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }

    /// One FAT entry, masked to its 28 valid bits.
    pub(crate) fn fat_entry(&mut self, cluster: u32) -> Result<u32> {
        let offset = cluster * 4;
        let sector = self.fat_start + offset / BLOCK_SIZE as u32;
        self.dev.read_block(sector, &mut self.buf)?;
        let raw: u32 = self
            .buf
            .pread_with((offset % BLOCK_SIZE as u32) as usize, LE)
            .map_err(|_| Error::Format("FAT entry"))?;
        Ok(raw & FAT_ENTRY_MASK)
    }

    /// Write one FAT entry into every FAT copy, preserving the reserved
    /// top nibble.
    fn set_fat_entry(&mut self, cluster: u32, value: u32) -> Result<()> {
        let offset = cluster * 4;
        let within = (offset % BLOCK_SIZE as u32) as usize;
        for fat in 0..self.num_fats as u32 {
            let sector = self.fat_start + fat * self.fat_size + offset / BLOCK_SIZE as u32;
            self.dev.read_block(sector, &mut self.buf)?;
            let old: u32 = self
                .buf
                .pread_with(within, LE)
                .map_err(|_| Error::Format("FAT entry"))?;
            let merged = (old & !FAT_ENTRY_MASK) | (value & FAT_ENTRY_MASK);
            self.buf
                .pwrite_with(merged, within, LE)
                .map_err(|_| Error::Format("FAT entry"))?;
            self.dev.write_block(sector, &self.buf)?;
        }
        Ok(())
    }

    /// Claim the first free cluster, marking it end-of-chain.
    fn alloc_cluster(&mut self) -> Result<u32> {
        let entries_per_sector = (BLOCK_SIZE / 4) as u32;
        for fat_sector in 0..self.fat_size {
            self.dev
                .read_block(self.fat_start + fat_sector, &mut self.buf)?;
            for slot in 0..entries_per_sector {
                let cluster = fat_sector * entries_per_sector + slot;
                if cluster < 2 {
                    continue;
                }
                let raw: u32 = self
                    .buf
                    .pread_with((slot * 4) as usize, LE)
                    .map_err(|_| Error::Format("FAT entry"))?;
                if raw & FAT_ENTRY_MASK == 0 {
                    self.set_fat_entry(cluster, FAT_CLAIMED)?;
                    return Ok(cluster);
                }
            }
        }
        Err(Error::NoFreeCluster)
    }

    /// Write a small file (one sector or less) into a directory.
    ///
    /// An existing entry of the same name keeps its first cluster and
    /// gets its size updated; otherwise the first free directory slot is
    /// claimed and a fresh cluster allocated. The data lands in the
    /// cluster's first sector, zero-padded to a full block.
    pub fn write_file(&mut self, dir_cluster: u32, name: &str, data: &[u8]) -> Result<()> {
        if data.len() > BLOCK_SIZE {
            return Err(Error::Capacity("file larger than one sector"));
        }
        let packed = pack_83(name)?;
        let dir_first = self.cluster_to_sector(dir_cluster);

        // One pass over the directory: the matching entry wins, else the
        // first free slot.
        let mut free_slot: Option<(u32, usize)> = None;
        let mut existing: Option<(u32, usize, u32)> = None;
        'scan: for sec in 0..self.sectors_per_cluster as u32 {
            let lba = dir_first + sec;
            self.dev.read_block(lba, &mut self.buf)?;
            for slot in 0..DIR_ENTRIES_PER_SECTOR {
                let off = slot * DIR_ENTRY_LEN;
                let raw: DirEntryRaw = self
                    .buf
                    .pread_with(off, LE)
                    .map_err(|_| Error::Format("directory entry"))?;
                match raw.name[0] {
                    ENTRY_END => {
                        if free_slot.is_none() {
                            free_slot = Some((lba, off));
                        }
                        break 'scan;
                    }
                    ENTRY_DELETED => {
                        if free_slot.is_none() {
                            free_slot = Some((lba, off));
                        }
                        continue;
                    }
                    _ => {}
                }
                let attr = Attributes::from_bits_truncate(raw.attr);
                if attr.is_long_name() || attr.contains(Attributes::VOLUME_ID) {
                    continue;
                }
                if raw.name.map(|b| b.to_ascii_uppercase()) == packed {
                    existing = Some((lba, off, raw.first_cluster()));
                    break 'scan;
                }
            }
        }

        let (entry_lba, entry_off, cluster) = match existing {
            Some(found) => found,
            None => {
                let (lba, off) = free_slot.ok_or(Error::Capacity("directory full"))?;
                let cluster = self.alloc_cluster()?;
                (lba, off, cluster)
            }
        };

        // Directory entry first, then the data sector.
        let entry = DirEntryRaw::file(packed, cluster, data.len() as u32);
        self.dev.read_block(entry_lba, &mut self.buf)?;
        self.buf
            .pwrite_with(entry, entry_off, LE)
            .map_err(|_| Error::Format("directory entry"))?;
        self.dev.write_block(entry_lba, &self.buf)?;

        let mut sector = [0u8; BLOCK_SIZE];
        sector[..data.len()].copy_from_slice(data);
        self.dev
            .write_block(self.cluster_to_sector(cluster), &sector)?;

        log::info!("fat32: wrote {} ({} bytes)", name, data.len());
        Ok(())
    }
}
