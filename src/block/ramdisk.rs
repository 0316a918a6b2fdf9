use crate::block::block_core::{Block, BlockOp, BlockSector, BLOCK_SECTOR_SIZE};
use crate::block::block_error::BlockError;
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

/// A RAM-backed block device.
///
/// Sectors live in a flat heap buffer; reads and writes never fail once the
/// `Block` wrapper has validated bounds. Used as the proof device for the
/// filesystem stack and by the tests.
pub struct RamDisk {
    data: Vec<u8>,
}

impl RamDisk {
    pub fn new(sectors: BlockSector) -> Self {
        RamDisk {
            data: vec![0; sectors as usize * BLOCK_SECTOR_SIZE],
        }
    }

    /// Build a RAM disk preloaded with an image. The image is zero-padded
    /// up to `sectors` whole sectors.
    pub fn from_image(image: &[u8], sectors: BlockSector) -> Self {
        let mut disk = Self::new(sectors);
        disk.data[..image.len()].copy_from_slice(image);
        disk
    }

    fn range(&self, sector: BlockSector) -> core::ops::Range<usize> {
        let start = sector as usize * BLOCK_SECTOR_SIZE;
        start..start + BLOCK_SECTOR_SIZE
    }
}

impl BlockOp for RamDisk {
    fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError> {
        buf.copy_from_slice(&self.data[self.range(sector)]);
        Ok(())
    }

    fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError> {
        let range = self.range(sector);
        self.data[range].copy_from_slice(buf);
        Ok(())
    }
}

/// Convenience constructor for a RAM-disk-backed [`Block`].
pub fn ram_disk(name: &str, sectors: BlockSector) -> Block {
    Block::new(name, sectors, Box::new(RamDisk::new(sectors)))
}

/// A RAM disk whose backing store is shared between handles, so a volume
/// survives the teardown of the `Block` that was mounted on it and can be
/// mounted again.
pub struct SharedRamDisk {
    data: alloc::sync::Arc<spin::Mutex<Vec<u8>>>,
}

impl SharedRamDisk {
    pub fn new(sectors: BlockSector) -> Self {
        SharedRamDisk {
            data: alloc::sync::Arc::new(spin::Mutex::new(vec![
                0;
                sectors as usize * BLOCK_SECTOR_SIZE
            ])),
        }
    }

    /// Another handle onto the same sectors.
    pub fn handle(&self) -> SharedRamDisk {
        SharedRamDisk {
            data: self.data.clone(),
        }
    }
}

impl BlockOp for SharedRamDisk {
    fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError> {
        let data = self.data.lock();
        let start = sector as usize * BLOCK_SECTOR_SIZE;
        buf.copy_from_slice(&data[start..start + BLOCK_SECTOR_SIZE]);
        Ok(())
    }

    fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError> {
        let mut data = self.data.lock();
        let start = sector as usize * BLOCK_SECTOR_SIZE;
        data[start..start + BLOCK_SECTOR_SIZE].copy_from_slice(buf);
        Ok(())
    }
}
