//! Block-device capability consumed by the filesystem layer.
//!
//! Card drivers (SPI SD, SDIO, whatever the board provides) implement
//! [`BlockDevice`]; the core only ever moves whole 512-byte sectors and
//! only from the foreground loop, so the interface is synchronous.

use thiserror::Error;

/// Sector size. The filesystem layer rejects volumes formatted with any
/// other logical block size.
pub const BLOCK_SIZE: usize = 512;

#[derive(Debug, Error)]
pub enum BlockError {
    /// The transfer failed outright (CRC error, card removed, bus fault).
    #[error("block I/O failed")]
    Io,
    /// A bounded retry loop ran out of attempts waiting on the card.
    #[error("block device timed out")]
    Timeout,
    /// The LBA lies outside the medium.
    #[error("block address out of range")]
    OutOfRange,
}

pub trait BlockDevice {
    /// Bring the medium up (card reset, voltage negotiation). Called once
    /// by the filesystem before the first sector is touched.
    fn init(&mut self) -> Result<(), BlockError>;

    fn read_block(&mut self, lba: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), BlockError>;

    fn write_block(&mut self, lba: u32, buf: &[u8; BLOCK_SIZE]) -> Result<(), BlockError>;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    fn init(&mut self) -> Result<(), BlockError> {
        (**self).init()
    }

    fn read_block(&mut self, lba: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), BlockError> {
        (**self).read_block(lba, buf)
    }

    fn write_block(&mut self, lba: u32, buf: &[u8; BLOCK_SIZE]) -> Result<(), BlockError> {
        (**self).write_block(lba, buf)
    }
}

/// RAM-backed block device.
///
/// Stands in for the card in hosted tests and on-target bring-up before
/// the SPI driver exists.
pub struct RamDisk {
    data: Vec<u8>,
}

impl RamDisk {
    pub fn new(blocks: u32) -> Self {
        Self {
            data: vec![0; blocks as usize * BLOCK_SIZE],
        }
    }

    pub fn from_image(data: Vec<u8>) -> Self {
        assert!(
            data.len() % BLOCK_SIZE == 0,
            "image is not a whole number of blocks"
        );
        Self { data }
    }

    pub fn into_image(self) -> Vec<u8> {
        self.data
    }

    fn range(&self, lba: u32) -> Result<std::ops::Range<usize>, BlockError> {
        let start = lba as usize * BLOCK_SIZE;
        let end = start + BLOCK_SIZE;
        if end > self.data.len() {
            return Err(BlockError::OutOfRange);
        }
        Ok(start..end)
    }
}

impl BlockDevice for RamDisk {
    fn init(&mut self) -> Result<(), BlockError> {
        log::debug!(
            "ramdisk: {} blocks ready",
            self.data.len() / BLOCK_SIZE
        );
        Ok(())
    }

    fn read_block(&mut self, lba: u32, buf: &mut [u8; BLOCK_SIZE]) -> Result<(), BlockError> {
        let range = self.range(lba)?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_block(&mut self, lba: u32, buf: &[u8; BLOCK_SIZE]) -> Result<(), BlockError> {
        let range = self.range(lba)?;
        self.data[range].copy_from_slice(buf);
        Ok(())
    }
}
