#![allow(dead_code)]

//! In-memory FAT32 image builder for the tests.
//!
//! Builds just enough of a volume to exercise the mount, directory, and
//! FAT paths: one boot sector, two FAT copies, and a data region, laid
//! out the way a freshly formatted card would be.

use driver_block::{RamDisk, BLOCK_SIZE};

pub const END_OF_CHAIN: u32 = 0x0FFF_FFFF;

pub struct ImageBuilder {
    img: Vec<u8>,
    part_start: u32,
    spc: u8,
    fat_size: u32,
    num_fats: u32,
    reserved: u32,
    next_free: u32,
}

impl ImageBuilder {
    pub fn new(part_start: u32, spc: u8, fat_size: u32, total_blocks: u32) -> Self {
        let mut builder = Self {
            img: vec![0; total_blocks as usize * BLOCK_SIZE],
            part_start,
            spc,
            fat_size,
            num_fats: 2,
            reserved: 1,
            next_free: 3,
        };
        if part_start > 0 {
            builder.write_mbr();
        }
        builder.write_boot_sector();
        // Media/reserved entries, and the root directory's chain.
        builder.fat_set(0, 0x0FFF_FFF8);
        builder.fat_set(1, END_OF_CHAIN);
        builder.fat_set(2, END_OF_CHAIN);
        builder
    }

    pub fn build(self) -> RamDisk {
        RamDisk::from_image(self.img)
    }

    pub fn root_cluster(&self) -> u32 {
        2
    }

    fn write_mbr(&mut self) {
        self.img[450] = 0x0C;
        self.img[454..458].copy_from_slice(&self.part_start.to_le_bytes());
        self.img[510] = 0x55;
        self.img[511] = 0xAA;
    }

    fn write_boot_sector(&mut self) {
        let base = self.part_start as usize * BLOCK_SIZE;
        let bs = &mut self.img[base..base + BLOCK_SIZE];
        bs[11..13].copy_from_slice(&(BLOCK_SIZE as u16).to_le_bytes());
        bs[13] = self.spc;
        bs[14..16].copy_from_slice(&(self.reserved as u16).to_le_bytes());
        bs[16] = self.num_fats as u8;
        bs[36..40].copy_from_slice(&self.fat_size.to_le_bytes());
        bs[44..48].copy_from_slice(&2u32.to_le_bytes());
        bs[510] = 0x55;
        bs[511] = 0xAA;
    }

    fn fat_start(&self) -> u32 {
        self.part_start + self.reserved
    }

    fn data_start(&self) -> u32 {
        self.fat_start() + self.num_fats * self.fat_size
    }

    pub fn cluster_to_block(&self, cluster: u32) -> u32 {
        self.data_start() + (cluster - 2) * self.spc as u32
    }

    pub fn cluster_bytes(&self) -> usize {
        self.spc as usize * BLOCK_SIZE
    }

    pub fn fat_set(&mut self, cluster: u32, value: u32) {
        for fat in 0..self.num_fats {
            let block = self.fat_start() + fat * self.fat_size + cluster / 128;
            let offset = block as usize * BLOCK_SIZE + (cluster % 128) as usize * 4;
            self.img[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
    }

    pub fn fat_get(&self, cluster: u32) -> u32 {
        let block = self.fat_start() + cluster / 128;
        let offset = block as usize * BLOCK_SIZE + (cluster % 128) as usize * 4;
        u32::from_le_bytes(self.img[offset..offset + 4].try_into().unwrap())
    }

    /// Mark every data cluster claimed, to starve the allocator.
    pub fn fill_fat(&mut self) {
        for cluster in 2..self.fat_size * 128 {
            self.fat_set(cluster, END_OF_CHAIN);
        }
    }

    fn take_cluster(&mut self) -> u32 {
        let cluster = self.next_free;
        self.next_free += 1;
        cluster
    }

    fn pack_83(name: &str) -> [u8; 11] {
        let (stem, ext) = match name.split_once('.') {
            Some((stem, ext)) => (stem, ext),
            None => (name, ""),
        };
        let mut packed = [b' '; 11];
        for (dst, b) in packed[..8].iter_mut().zip(stem.bytes()) {
            *dst = b.to_ascii_uppercase();
        }
        for (dst, b) in packed[8..].iter_mut().zip(ext.bytes()) {
            *dst = b.to_ascii_uppercase();
        }
        packed
    }

    /// Append a raw 32-byte entry to the first free slot of a directory
    /// cluster; returns the image offset of the entry.
    fn append_entry(
        &mut self,
        dir_cluster: u32,
        name: [u8; 11],
        attr: u8,
        first_cluster: u32,
        size: u32,
    ) -> usize {
        let base = self.cluster_to_block(dir_cluster) as usize * BLOCK_SIZE;
        let slots = self.spc as usize * 16;
        for slot in 0..slots {
            let off = base + slot * 32;
            if self.img[off] == 0x00 {
                self.img[off..off + 11].copy_from_slice(&name);
                self.img[off + 11] = attr;
                self.img[off + 20..off + 22]
                    .copy_from_slice(&((first_cluster >> 16) as u16).to_le_bytes());
                self.img[off + 26..off + 28]
                    .copy_from_slice(&(first_cluster as u16).to_le_bytes());
                self.img[off + 28..off + 32].copy_from_slice(&size.to_le_bytes());
                return off;
            }
        }
        panic!("directory cluster full while building image");
    }

    pub fn add_dir(&mut self, parent_cluster: u32, name: &str) -> u32 {
        let cluster = self.take_cluster();
        self.fat_set(cluster, END_OF_CHAIN);
        self.append_entry(parent_cluster, Self::pack_83(name), 0x10, cluster, 0);
        cluster
    }

    /// Add a file in contiguous clusters.
    pub fn add_file(&mut self, dir_cluster: u32, name: &str, data: &[u8]) -> u32 {
        let count = data.len().div_ceil(self.cluster_bytes()).max(1);
        let clusters: Vec<u32> = (0..count).map(|_| self.take_cluster()).collect();
        self.add_file_with_clusters(dir_cluster, name, data, &clusters);
        clusters[0]
    }

    /// Add a file over an explicit (possibly non-contiguous) chain.
    pub fn add_file_with_clusters(
        &mut self,
        dir_cluster: u32,
        name: &str,
        data: &[u8],
        clusters: &[u32],
    ) {
        assert!(!clusters.is_empty());
        assert!(data.len() <= clusters.len() * self.cluster_bytes());
        self.next_free = self.next_free.max(clusters.iter().max().unwrap() + 1);

        for pair in clusters.windows(2) {
            self.fat_set(pair[0], pair[1]);
        }
        self.fat_set(*clusters.last().unwrap(), END_OF_CHAIN);

        for (i, chunk) in data.chunks(self.cluster_bytes()).enumerate() {
            let base = self.cluster_to_block(clusters[i]) as usize * BLOCK_SIZE;
            self.img[base..base + chunk.len()].copy_from_slice(chunk);
        }

        self.append_entry(
            dir_cluster,
            Self::pack_83(name),
            0x20,
            clusters[0],
            data.len() as u32,
        );
    }

    pub fn add_volume_label(&mut self, dir_cluster: u32, label: &str) {
        self.append_entry(dir_cluster, Self::pack_83(label), 0x08, 0, 0);
    }

    /// A long-name stub entry (attr 0x0F), as VFAT writes ahead of the
    /// real entry.
    pub fn add_lfn_stub(&mut self, dir_cluster: u32) {
        let mut name = [0u8; 11];
        name[0] = 0x41; // sequence 1, last-entry flag
        for (i, b) in b"longname.w".iter().enumerate() {
            name[i + 1] = *b;
        }
        self.append_entry(dir_cluster, name, 0x0F, 0, 0);
    }

    /// Add a file entry, then mark it deleted.
    pub fn add_deleted(&mut self, dir_cluster: u32, name: &str) {
        let off = self.append_entry(dir_cluster, Self::pack_83(name), 0x20, 0, 0);
        self.img[off] = 0xE5;
    }
}

/// Canonical mono 16-bit 44.1 kHz WAV bytes around a PCM payload.
pub fn wav_bytes(samples: &[i16]) -> Vec<u8> {
    let data_size = (samples.len() * 2) as u32;
    let mut bytes = Vec::with_capacity(44 + samples.len() * 2);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_size).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&44_100u32.to_le_bytes());
    bytes.extend_from_slice(&88_200u32.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_size.to_le_bytes());
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}
