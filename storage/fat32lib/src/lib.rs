//! Minimal FAT32 for the sample card.
//!
//! Covers exactly what the device needs: mount an MBR-partitioned or
//! superfloppy card, scan single-cluster directories of 8.3 entries, walk
//! paths, stream file contents through the FAT chain, and write small
//! (one sector or less) files for the kit and pattern slots. Long names,
//! multi-sector writes, and timestamps are out of scope.
//!
//! All of this runs in the foreground loop; nothing here is touched from
//! interrupt context.

mod file;
mod layout;
mod mbr;
mod volume;

use thiserror::Error;

pub use driver_block::{BlockDevice, BlockError, BLOCK_SIZE};
pub use file::File;
pub use layout::{Attributes, DirItem, ShortName};
pub use volume::{Volume, DIR_ENTRIES_PER_CLUSTER_MAX};

#[derive(Debug, Error)]
pub enum Error {
    #[error("block device: {0}")]
    Io(#[from] BlockError),
    #[error("filesystem structure invalid: {0}")]
    Format(&'static str),
    #[error("no such file or directory")]
    NotFound,
    #[error("capacity exceeded: {0}")]
    Capacity(&'static str),
    #[error("no free cluster")]
    NoFreeCluster,
    #[error("bad argument")]
    BadArgument,
}

pub type Result<T> = core::result::Result<T, Error>;
