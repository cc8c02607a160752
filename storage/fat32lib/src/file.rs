use std::io;

use driver_block::{BlockDevice, BLOCK_SIZE};

use crate::layout::DirItem;
use crate::volume::{Volume, FAT_END_OF_CHAIN};
use crate::{Error, Result};

/// Sequential reader over a file's cluster chain.
///
/// Holds its own sector buffer so the WAV decoder can pull small reads
/// without hitting the card once per call; the volume's scratch sector
/// stays free for the FAT lookups the chain walk needs.
pub struct File<'v, D: BlockDevice> {
    vol: &'v mut Volume<D>,
    cluster: u32,
    sector_in_cluster: u32,
    byte_in_sector: usize,
    remaining: u32,
    buf: [u8; BLOCK_SIZE],
    buffered_lba: Option<u32>,
}

impl<'v, D: BlockDevice> File<'v, D> {
    pub(crate) fn new(vol: &'v mut Volume<D>, item: &DirItem) -> Self {
        Self {
            vol,
            cluster: item.first_cluster,
            sector_in_cluster: 0,
            byte_in_sector: 0,
            remaining: item.size,
            buf: [0; BLOCK_SIZE],
            buffered_lba: None,
        }
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Read the next chunk; `Ok(0)` at end of file (or if the chain ends
    /// short of the recorded size).
    pub fn read_chunk(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() || self.remaining == 0 {
            return Ok(0);
        }
        if self.cluster < 2 || self.cluster >= FAT_END_OF_CHAIN {
            return Ok(0);
        }

        let lba = self.vol.cluster_to_sector(self.cluster) + self.sector_in_cluster;
        if self.buffered_lba != Some(lba) {
            self.vol.dev.read_block(lba, &mut self.buf)?;
            self.buffered_lba = Some(lba);
        }

        let take = out
            .len()
            .min(BLOCK_SIZE - self.byte_in_sector)
            .min(self.remaining as usize);
        out[..take].copy_from_slice(&self.buf[self.byte_in_sector..self.byte_in_sector + take]);
        self.byte_in_sector += take;
        self.remaining -= take as u32;

        if self.byte_in_sector == BLOCK_SIZE {
            self.byte_in_sector = 0;
            self.sector_in_cluster += 1;
            if self.sector_in_cluster == self.vol.sectors_per_cluster as u32 {
                self.sector_in_cluster = 0;
                self.cluster = self.vol.fat_entry(self.cluster)?;
            }
        }
        Ok(take)
    }
}

/// `io::Read` so stream consumers (the WAV decoder) can take any reader.
impl<D: BlockDevice> io::Read for File<'_, D> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.read_chunk(out)
            .map_err(|e: Error| io::Error::new(io::ErrorKind::Other, e))
    }
}
