pub mod block_core;
pub mod block_error;
pub mod ramdisk;

pub use block_core::{Block, BlockOp, BlockSector, BLOCK_SECTOR_SIZE};
pub use block_error::BlockError;
