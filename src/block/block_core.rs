use crate::block::block_error::BlockError;
use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

/// Size of a block device sector in bytes.
///
/// All supported disks use this sector size; filesystems whose logical
/// sector is larger issue multi-sector transfers.
pub const BLOCK_SECTOR_SIZE: usize = 512;

/// Index of a block device sector.
///
/// Good enough for devices up to 2 TB.
pub type BlockSector = u32;

/// Lower-level interface to block device drivers.
///
/// Drivers transfer exactly one sector per call; `buf` is always
/// `BLOCK_SECTOR_SIZE` bytes.
pub trait BlockOp: Send + Sync {
    /// Read a sector into `buf`.
    fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError>;

    /// Write a sector from `buf`.
    fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError>;
}

/// A block device: a named, fixed-size array of sectors behind a driver.
pub struct Block {
    /// The name of the block device (also the device name recorded in mounts)
    name: String,
    /// The driver backing this device
    driver: Box<dyn BlockOp>,
    /// The size of the device in sectors
    size: BlockSector,
    /// Sectors read since creation
    read_count: u64,
    /// Sectors written since creation
    write_count: u64,
}

impl Block {
    pub fn new(name: &str, size: BlockSector, driver: Box<dyn BlockOp>) -> Self {
        Block {
            name: String::from(name),
            driver,
            size,
            read_count: 0,
            write_count: 0,
        }
    }

    fn check(&self, sector: BlockSector, len: usize) -> Result<u32, BlockError> {
        if len == 0 || len % BLOCK_SECTOR_SIZE != 0 {
            return Err(BlockError::BufferInvalid);
        }
        let count = (len / BLOCK_SECTOR_SIZE) as u32;
        match sector.checked_add(count) {
            Some(end) if end <= self.size => {}
            _ => return Err(BlockError::SectorOutOfBounds),
        }
        Ok(count)
    }

    /// Reads `buf.len() / BLOCK_SECTOR_SIZE` contiguous sectors starting at
    /// `sector` into `buf`.
    ///
    /// The transfer is all-or-nothing from the caller's point of view: any
    /// sector failing aborts the call with an error.
    pub fn read(&mut self, sector: BlockSector, buf: &mut [u8]) -> Result<(), BlockError> {
        let count = self.check(sector, buf.len())?;
        for i in 0..count {
            let chunk = &mut buf[i as usize * BLOCK_SECTOR_SIZE..(i as usize + 1) * BLOCK_SECTOR_SIZE];
            self.driver.read(sector + i, chunk)?;
            self.read_count += 1;
        }
        Ok(())
    }

    /// Writes `buf.len() / BLOCK_SECTOR_SIZE` contiguous sectors starting at
    /// `sector` from `buf`. Returns after the driver has acknowledged the
    /// last sector.
    pub fn write(&mut self, sector: BlockSector, buf: &[u8]) -> Result<(), BlockError> {
        let count = self.check(sector, buf.len())?;
        for i in 0..count {
            let chunk = &buf[i as usize * BLOCK_SECTOR_SIZE..(i as usize + 1) * BLOCK_SECTOR_SIZE];
            self.driver.write(sector + i, chunk)?;
            self.write_count += 1;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The size of the device in sectors.
    pub fn size(&self) -> BlockSector {
        self.size
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "\"{}\": {} sectors, {} read, {} written",
            self.name, self.size, self.read_count, self.write_count
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::ramdisk::RamDisk;

    #[test]
    fn bounds_and_buffer_checks() {
        let mut block = Block::new("rd0", 4, Box::new(RamDisk::new(4)));
        let mut buf = [0u8; BLOCK_SECTOR_SIZE];
        assert_eq!(block.read(4, &mut buf), Err(BlockError::SectorOutOfBounds));
        assert_eq!(
            block.read(0, &mut buf[..100]),
            Err(BlockError::BufferInvalid)
        );
        assert!(block.read(3, &mut buf).is_ok());
        let mut big = [0u8; 2 * BLOCK_SECTOR_SIZE];
        assert_eq!(block.read(3, &mut big), Err(BlockError::SectorOutOfBounds));
        assert!(block.read(2, &mut big).is_ok());
    }

    #[test]
    fn write_then_read() {
        let mut block = Block::new("rd0", 8, Box::new(RamDisk::new(8)));
        let mut buf = [0u8; BLOCK_SECTOR_SIZE];
        buf[0] = 0xAB;
        buf[511] = 0xCD;
        block.write(5, &buf).unwrap();
        let mut out = [0u8; BLOCK_SECTOR_SIZE];
        block.read(5, &mut out).unwrap();
        assert_eq!(buf, out);
    }
}
