//! Volume formatter: writes a fresh FAT16 or FAT32 layout onto a block
//! device, producing boot sectors the mount path accepts unchanged.

use crate::block::{Block, BLOCK_SECTOR_SIZE};
use crate::fs::fat::fat::{EOC16, EOC32};
use crate::fs::fat::{
    Fat16Header, Fat32Header, FatBaseHeader, FatError, FatResult, FatType, BOOT_SIGNATURE,
};
use alloc::format;
use alloc::vec;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{AsBytes, FromZeroes};

const MEDIA_FIXED: u8 = 0xF8;

/// Parameters of a new volume. Sector and FAT sizing are caller-chosen so
/// test volumes can be shaped precisely; the constructors fill in the
/// conventional values.
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    pub fat_type: FatType,
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub reserved_sectors: u32,
    pub num_fats: u32,
    /// FAT16 fixed-root entry count; ignored for FAT32
    pub root_entries: u32,
    /// Logical sectors per FAT copy
    pub fat_size: u32,
}

impl FormatOptions {
    pub fn fat16(sectors_per_cluster: u32, root_entries: u32, fat_size: u32) -> Self {
        FormatOptions {
            fat_type: FatType::Fat16,
            bytes_per_sector: BLOCK_SECTOR_SIZE as u32,
            sectors_per_cluster,
            reserved_sectors: 1,
            num_fats: 2,
            root_entries,
            fat_size,
        }
    }

    pub fn fat32(sectors_per_cluster: u32, fat_size: u32) -> Self {
        FormatOptions {
            fat_type: FatType::Fat32,
            bytes_per_sector: BLOCK_SECTOR_SIZE as u32,
            sectors_per_cluster,
            reserved_sectors: 32,
            num_fats: 2,
            root_entries: 0,
            fat_size,
        }
    }
}

fn base_header(opts: &FormatOptions, total_sectors: u32) -> FatBaseHeader {
    let mut base = FatBaseHeader::new_zeroed();
    base.jmp_boot = [0xEB, 0x3C, 0x90];
    base.oem_name = *b"KVFS 1.0";
    base.bytes_per_sector = U16::new(opts.bytes_per_sector as u16);
    base.sectors_per_cluster = opts.sectors_per_cluster as u8;
    base.reserved_sector_count = U16::new(opts.reserved_sectors as u16);
    base.num_fats = opts.num_fats as u8;
    base.media = MEDIA_FIXED;
    base.sectors_per_track = U16::new(63);
    base.num_heads = U16::new(16);
    if opts.fat_type == FatType::Fat16 {
        base.fat16_root_ent_count = U16::new(opts.root_entries as u16);
        base.fat16_fat_size = U16::new(opts.fat_size as u16);
    }
    if opts.fat_type == FatType::Fat16 && total_sectors <= u32::from(u16::MAX) {
        base.total_sectors16 = U16::new(total_sectors as u16);
    } else {
        base.total_sectors32 = U32::new(total_sectors);
    }
    base
}

/// Format `device` with the given layout.
///
/// Checks that the resulting cluster count lands in the requested variant's
/// range before touching the device, then writes the boot sector, zeroes and
/// seeds every FAT copy, and clears the root directory region.
pub fn format(device: &mut Block, opts: &FormatOptions) -> FatResult<()> {
    if !matches!(opts.bytes_per_sector, 512 | 1024 | 2048 | 4096)
        || opts.sectors_per_cluster == 0
        || !opts.sectors_per_cluster.is_power_of_two()
        || opts.reserved_sectors == 0
        || opts.num_fats == 0
        || opts.fat_size == 0
    {
        return Err(FatError::InvalidBootSector("bad format parameters".into()));
    }
    let sectors_per_block = opts.bytes_per_sector / BLOCK_SECTOR_SIZE as u32;
    let total_sectors = device.size() / sectors_per_block;
    let root_entries = if opts.fat_type == FatType::Fat16 {
        opts.root_entries
    } else {
        0
    };
    let root_dir_sectors = (root_entries * 32).div_ceil(opts.bytes_per_sector);
    let meta_sectors = opts.reserved_sectors + opts.num_fats * opts.fat_size + root_dir_sectors;
    let data_sectors = total_sectors
        .checked_sub(meta_sectors)
        .ok_or_else(|| FatError::InvalidBootSector("device smaller than volume metadata".into()))?;
    let total_clusters = data_sectors / opts.sectors_per_cluster;
    match opts.fat_type {
        FatType::Fat16 if !(4085..65525).contains(&total_clusters) => {
            return Err(FatError::InvalidBootSector(format!(
                "{total_clusters} clusters will not be read back as FAT16"
            )));
        }
        FatType::Fat32 if total_clusters < 65525 => {
            return Err(FatError::InvalidBootSector(format!(
                "{total_clusters} clusters will not be read back as FAT32"
            )));
        }
        _ => {}
    }
    let fat_entry_capacity = opts.fat_size * opts.bytes_per_sector
        / if opts.fat_type == FatType::Fat16 { 2 } else { 4 };
    if fat_entry_capacity < total_clusters + 2 {
        log::warn!(
            "FAT of {} sectors holds {fat_entry_capacity} entries but the volume has {total_clusters} clusters; the volume will not mount",
            opts.fat_size
        );
    }

    // boot sector
    let mut sector = vec![0u8; opts.bytes_per_sector as usize];
    match opts.fat_type {
        FatType::Fat16 => {
            let mut header = Fat16Header::new_zeroed();
            header.base = base_header(opts, total_sectors);
            header.drive_num = 0x80;
            header.boot_signature = 0x29;
            header.volume_id = U32::new(0x1234_5678);
            header.volume_label = *b"NO NAME    ";
            header.fs_type = *b"FAT16   ";
            header.signature_word = BOOT_SIGNATURE;
            sector[..512].copy_from_slice(header.as_bytes());
        }
        FatType::Fat32 => {
            let mut header = Fat32Header::new_zeroed();
            header.base = base_header(opts, total_sectors);
            header.base.jmp_boot = [0xEB, 0x58, 0x90];
            header.fat_size = U32::new(opts.fat_size);
            header.root_cluster = U32::new(2);
            header.drive_num = 0x80;
            header.boot_signature = 0x29;
            header.volume_id = U32::new(0x1234_5678);
            header.volume_label = *b"NO NAME    ";
            header.fs_type = *b"FAT32   ";
            header.signature_word = BOOT_SIGNATURE;
            sector[..512].copy_from_slice(header.as_bytes());
        }
    }
    device.write(0, &sector)?;

    // zero every FAT copy, then seed the reserved entries of each: entry 0
    // carries the media byte, entry 1 is end-of-chain, and on FAT32 the
    // root directory's cluster is terminated too
    let zero_sector = vec![0u8; opts.bytes_per_sector as usize];
    for copy in 0..opts.num_fats {
        let first = opts.reserved_sectors + copy * opts.fat_size;
        for s in 0..opts.fat_size {
            device.write((first + s) * sectors_per_block, &zero_sector)?;
        }
    }
    let mut fat_head = vec![0u8; opts.bytes_per_sector as usize];
    match opts.fat_type {
        FatType::Fat16 => {
            fat_head[0..2].copy_from_slice(&(0xFF00u16 | u16::from(MEDIA_FIXED)).to_le_bytes());
            fat_head[2..4].copy_from_slice(&(EOC16 as u16).to_le_bytes());
        }
        FatType::Fat32 => {
            fat_head[0..4].copy_from_slice(&(0x0FFF_FF00 | u32::from(MEDIA_FIXED)).to_le_bytes());
            fat_head[4..8].copy_from_slice(&EOC32.to_le_bytes());
            fat_head[8..12].copy_from_slice(&EOC32.to_le_bytes());
        }
    }
    for copy in 0..opts.num_fats {
        let first = opts.reserved_sectors + copy * opts.fat_size;
        device.write(first * sectors_per_block, &fat_head)?;
    }

    // clear the root directory: the fixed region on FAT16, cluster 2 on FAT32
    let root_first_sector = opts.reserved_sectors + opts.num_fats * opts.fat_size;
    let root_clear_sectors = match opts.fat_type {
        FatType::Fat16 => root_dir_sectors,
        FatType::Fat32 => opts.sectors_per_cluster,
    };
    for s in 0..root_clear_sectors {
        device.write((root_first_sector + s) * sectors_per_block, &zero_sector)?;
    }

    log::debug!(
        "formatted {} as {:?}: {total_clusters} clusters, {} sectors per cluster",
        device.name(),
        opts.fat_type,
        opts.sectors_per_cluster
    );
    Ok(())
}
