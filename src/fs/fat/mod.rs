//! FAT16/FAT32 filesystem driver.
//!
//! Owns on-disk layout parsing, the in-memory FAT cache, cluster-chain
//! logic, 8.3 name conversion, and directory-entry I/O, and publishes the
//! VFS operation table for mounted volumes.

pub mod dirent;
#[allow(clippy::module_inception)]
pub mod fat;
pub mod format;
pub mod names;

use crate::block::{Block, BlockError, BLOCK_SECTOR_SIZE};
use crate::fs::fs_manager::MountFlags;
use crate::fs::registry::FilesystemType;
use crate::fs::superblock::{Superblock, SuperblockOps};
use crate::vfs::{
    DirEntries, Error, FileHandle, FileSystem, INodeNum, InodeType, Metadata, Result,
};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use dirent::{
    fat_datetime_to_unix, DirOffset, FatDirEntry, ATTR_ARCHIVE, ATTR_DIRECTORY, ATTR_READ_ONLY,
};
use fat::Fat;
use names::to_83;
use spin::Mutex;
use zerocopy::little_endian::{U16, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Superblock magic reported for mounted FAT volumes.
pub const FAT_SUPER_MAGIC: u32 = 0x4d44;

/// Inode number of the FAT16 fixed root directory (cluster numbers 0 and 1
/// are reserved, so this cannot collide with a real chain).
const FAT16_ROOT_INO: INodeNum = 0;

/// Synthetic inode numbers handed to foreign directory entries that carry no
/// first cluster yet. Far above any valid cluster number.
const VIRTUAL_INO_BASE: INodeNum = 0xF000_0000;

/// Driver-internal error taxonomy; collapsed into the VFS taxonomy at the
/// operation-table boundary.
#[derive(Debug)]
pub enum FatError {
    /// Boot sector failed validation
    InvalidBootSector(String),
    /// FAT12 or some other variant this driver does not speak
    Unsupported(String),
    /// Cluster number outside the data region
    InvalidCluster(u32),
    /// On-disk structure is inconsistent
    Corrupt(String),
    /// Underlying device error
    Block(BlockError),
    /// No free cluster left
    NoSpace,
}

pub type FatResult<T> = core::result::Result<T, FatError>;

impl From<BlockError> for FatError {
    fn from(value: BlockError) -> Self {
        FatError::Block(value)
    }
}

impl From<FatError> for Error {
    fn from(value: FatError) -> Self {
        match value {
            FatError::InvalidBootSector(s) => Error::Io(format!("invalid boot sector: {s}")),
            FatError::Unsupported(s) => {
                log::warn!("unsupported FAT volume: {s}");
                Error::Unsupported
            }
            FatError::InvalidCluster(c) => Error::Io(format!("invalid cluster number {c}")),
            FatError::Corrupt(s) => Error::Io(s),
            FatError::Block(e) => Error::Io(format!("{e}")),
            FatError::NoSpace => Error::NoSpace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatType {
    Fat16,
    Fat32,
}

// Base BPB (BIOS Parameter Block) shared by FAT16 and FAT32 boot sectors.
// The integer fields are little-endian and unaligned, exactly as on disk.
#[repr(C)]
#[derive(FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct FatBaseHeader {
    pub jmp_boot: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: U16,
    pub sectors_per_cluster: u8,
    pub reserved_sector_count: U16,
    pub num_fats: u8,
    pub fat16_root_ent_count: U16,
    pub total_sectors16: U16,
    pub media: u8,
    pub fat16_fat_size: U16,
    pub sectors_per_track: U16,
    pub num_heads: U16,
    pub hidden_sectors: U32,
    pub total_sectors32: U32,
}

impl FatBaseHeader {
    pub fn bytes_per_sector(&self) -> u32 {
        u32::from(self.bytes_per_sector.get())
    }

    pub fn reserved_sector_count(&self) -> u32 {
        u32::from(self.reserved_sector_count.get())
    }

    pub fn total_sectors(&self) -> u32 {
        let total16 = self.total_sectors16.get();
        if total16 == 0 {
            self.total_sectors32.get()
        } else {
            u32::from(total16)
        }
    }

    pub fn check_integrity(&self) -> FatResult<()> {
        if !matches!(self.bytes_per_sector(), 512 | 1024 | 2048 | 4096) {
            return Err(FatError::InvalidBootSector(format!(
                "bad bytes per sector: {}",
                self.bytes_per_sector
            )));
        }
        if self.sectors_per_cluster == 0 || !self.sectors_per_cluster.is_power_of_two() {
            return Err(FatError::InvalidBootSector(format!(
                "sectors per cluster ({}) is not a power of two",
                self.sectors_per_cluster
            )));
        }
        if self.reserved_sector_count() == 0 {
            return Err(FatError::InvalidBootSector(
                "reserved sector count must be nonzero".into(),
            ));
        }
        if self.num_fats == 0 {
            return Err(FatError::InvalidBootSector("FAT count must be nonzero".into()));
        }
        Ok(())
    }
}

#[repr(C)]
#[derive(FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct Fat16Header {
    pub base: FatBaseHeader,
    pub drive_num: u8,
    pub _reserved: u8,
    pub boot_signature: u8,
    pub volume_id: U32,
    pub volume_label: [u8; 11],
    pub fs_type: [u8; 8],
    pub _unused: [u8; 448],
    pub signature_word: [u8; 2],
}

#[repr(C)]
#[derive(FromZeroes, FromBytes, AsBytes, Unaligned)]
pub struct Fat32Header {
    pub base: FatBaseHeader,
    pub fat_size: U32,
    pub ext_flags: U16,
    pub fs_version: U16,
    pub root_cluster: U32,
    pub fs_info: U16,
    pub bk_boot_sector: U16,
    pub _reserved: [u8; 12],
    pub drive_num: u8,
    pub _reserved1: u8,
    pub boot_signature: u8,
    pub volume_id: U32,
    pub volume_label: [u8; 11],
    pub fs_type: [u8; 8],
    pub _unused: [u8; 420],
    pub signature_word: [u8; 2],
}

/// Boot-sector signature word at offset 510.
pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// Check a raw boot sector without parsing the whole geometry: signature
/// word plus the boot-sector integrity checks
/// ([`FatBaseHeader::check_integrity`]).
pub fn is_valid_boot_sector(sector: &[u8]) -> bool {
    if sector.len() < 512 || sector[510..512] != BOOT_SIGNATURE {
        return false;
    }
    let Some(header) = FatBaseHeader::ref_from_prefix(sector) else {
        return false;
    };
    header.check_integrity().is_ok()
}

/// The volume geometry derived from a boot sector.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub ty: FatType,
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    /// Block-device sectors per logical sector
    pub sectors_per_block: u32,
    pub reserved_sectors: u32,
    pub num_fats: u32,
    /// Logical sectors per FAT copy
    pub fat_size: u32,
    pub root_entries: u32,
    pub root_dir_sectors: u32,
    /// First logical sector of the FAT16 fixed root region
    pub first_root_sector: u32,
    pub first_data_sector: u32,
    pub total_sectors: u32,
    pub total_clusters: u32,
    /// FAT32 root directory cluster (0 on FAT16)
    pub root_cluster: u32,
}

/// Parse and validate a boot sector, determining the FAT variant by the
/// cluster-count rule computed from the BPB fields alone.
pub fn parse_boot_sector(sector: &[u8; 512]) -> FatResult<Geometry> {
    let fat16_header =
        Fat16Header::ref_from(&sector[..]).expect("Fat16Header is exactly 512 bytes");
    let fat32_header =
        Fat32Header::ref_from(&sector[..]).expect("Fat32Header is exactly 512 bytes");
    if fat16_header.signature_word != BOOT_SIGNATURE {
        return Err(FatError::InvalidBootSector(format!(
            "signature word is {:02x}{:02x}, not 55aa",
            fat16_header.signature_word[0], fat16_header.signature_word[1]
        )));
    }
    let base = &fat16_header.base;
    base.check_integrity()?;

    let bytes_per_sector = base.bytes_per_sector();
    let reserved_sectors = base.reserved_sector_count();
    let root_entries = u32::from(base.fat16_root_ent_count.get());
    // always zero for FAT32
    let root_dir_sectors = (root_entries * 32).div_ceil(bytes_per_sector);
    let mut fat_size = u32::from(base.fat16_fat_size.get());
    if fat_size == 0 {
        fat_size = fat32_header.fat_size.get();
    }
    if fat_size == 0 {
        return Err(FatError::InvalidBootSector("FAT size is zero".into()));
    }
    let num_fats = u32::from(base.num_fats);
    let total_sectors = base.total_sectors();
    let meta_sectors = reserved_sectors + num_fats * fat_size + root_dir_sectors;
    let data_sectors = total_sectors
        .checked_sub(meta_sectors)
        .ok_or_else(|| FatError::InvalidBootSector("volume smaller than its metadata".into()))?;
    let total_clusters = data_sectors / u32::from(base.sectors_per_cluster);

    // Odd as it looks, counting clusters really is the one correct way to
    // tell the variants apart.
    let ty = if total_clusters < 4085 {
        return Err(FatError::Unsupported(format!(
            "{total_clusters} clusters makes this FAT12; try a larger volume"
        )));
    } else if total_clusters < 65525 {
        FatType::Fat16
    } else {
        FatType::Fat32
    };
    let root_cluster = match ty {
        FatType::Fat16 => 0,
        FatType::Fat32 => fat32_header.root_cluster.get(),
    };
    if ty == FatType::Fat32 && root_cluster < 2 {
        return Err(FatError::InvalidBootSector(format!(
            "bad FAT32 root cluster {root_cluster}"
        )));
    }
    Ok(Geometry {
        ty,
        bytes_per_sector,
        sectors_per_cluster: u32::from(base.sectors_per_cluster),
        sectors_per_block: bytes_per_sector / BLOCK_SECTOR_SIZE as u32,
        reserved_sectors,
        num_fats,
        fat_size,
        root_entries,
        root_dir_sectors,
        first_root_sector: reserved_sectors + num_fats * fat_size,
        first_data_sector: reserved_sectors + num_fats * fat_size + root_dir_sectors,
        total_sectors,
        total_clusters,
        root_cluster,
    })
}

/// Cached per-inode state: the originating directory entry's interesting
/// fields plus its location, so size and attribute updates can be written
/// back without rescanning by name.
#[derive(Debug, Clone)]
struct FatInode {
    /// First cluster of the chain; 0 when no cluster is allocated yet
    /// (foreign zero-length files)
    first_cluster: u32,
    size: u32,
    attr: u8,
    /// (directory inode, byte offset in the directory stream); `None` for
    /// the root directory
    entry: Option<(INodeNum, DirOffset)>,
    creation_date: u16,
    creation_time: u16,
    write_date: u16,
    write_time: u16,
    access_date: u16,
}

impl FatInode {
    fn is_dir(&self) -> bool {
        self.attr & ATTR_DIRECTORY != 0
    }
}

/// Per-open-file state: the inode plus a sequential-access cursor
/// remembering which cluster the last I/O ended in, so forward reads resume
/// without rewalking the chain from the start.
pub struct FatHandle {
    inode: INodeNum,
    /// (cluster index within the chain, cluster number)
    cursor: Option<(u64, u32)>,
}

impl FileHandle for FatHandle {
    fn inode(&self) -> INodeNum {
        self.inode
    }
}

/// A mounted FAT16 or FAT32 volume.
pub struct FatFS {
    device: Block,
    /// The cached first FAT, under its own exclusion region
    fat: Mutex<Fat>,
    ty: FatType,
    bytes_per_sector: u32,
    sectors_per_cluster: u32,
    sectors_per_block: u32,
    cluster_bytes: u32,
    reserved_sectors: u32,
    num_fats: u32,
    fat_size: u32,
    root_dir_sectors: u32,
    first_root_sector: u32,
    first_data_sector: u32,
    total_clusters: u32,
    root_ino: INodeNum,
    inodes: BTreeMap<INodeNum, FatInode>,
    next_virtual_ino: INodeNum,
    /// Cluster-sized scratch buffer for data I/O, allocated once per mount
    scratch: Vec<u8>,
}

impl FatFS {
    /// Mount a FAT volume from a block device: read and validate the boot
    /// sector, determine the variant, and load the first FAT into memory.
    pub fn new(mut device: Block) -> FatResult<Self> {
        let mut boot = [0u8; 512];
        device.read(0, &mut boot)?;
        let geo = parse_boot_sector(&boot)?;

        let mut fat_bytes = vec![0u8; (geo.fat_size * geo.bytes_per_sector) as usize];
        device.read(geo.reserved_sectors * geo.sectors_per_block, &mut fat_bytes)?;
        let fat = Fat::new(geo.ty, fat_bytes, geo.total_clusters)?;

        let root_ino = match geo.ty {
            FatType::Fat16 => FAT16_ROOT_INO,
            FatType::Fat32 => geo.root_cluster,
        };
        let mut inodes = BTreeMap::new();
        inodes.insert(
            root_ino,
            FatInode {
                first_cluster: geo.root_cluster,
                size: 0,
                attr: ATTR_DIRECTORY,
                entry: None,
                creation_date: 0,
                creation_time: 0,
                write_date: 0,
                write_time: 0,
                access_date: 0,
            },
        );
        let cluster_bytes = geo.sectors_per_cluster * geo.bytes_per_sector;
        log::debug!(
            "mounted {:?} volume on {}: {} clusters of {} bytes, data region at sector {}",
            geo.ty,
            device.name(),
            geo.total_clusters,
            cluster_bytes,
            geo.first_data_sector
        );
        Ok(FatFS {
            device,
            fat: Mutex::new(fat),
            ty: geo.ty,
            bytes_per_sector: geo.bytes_per_sector,
            sectors_per_cluster: geo.sectors_per_cluster,
            sectors_per_block: geo.sectors_per_block,
            cluster_bytes,
            reserved_sectors: geo.reserved_sectors,
            num_fats: geo.num_fats,
            fat_size: geo.fat_size,
            root_dir_sectors: geo.root_dir_sectors,
            first_root_sector: geo.first_root_sector,
            first_data_sector: geo.first_data_sector,
            total_clusters: geo.total_clusters,
            root_ino,
            inodes,
            next_virtual_ino: VIRTUAL_INO_BASE,
            scratch: vec![0; cluster_bytes as usize],
        })
    }

    pub fn fat_type(&self) -> FatType {
        self.ty
    }

    pub fn cluster_bytes(&self) -> u32 {
        self.cluster_bytes
    }

    /// First block-device sector of a data cluster.
    fn cluster_block_sector(&self, cluster: u32) -> FatResult<u32> {
        if cluster < 2 || cluster >= self.total_clusters + 2 {
            return Err(FatError::InvalidCluster(cluster));
        }
        let fat_sector = self.first_data_sector + (cluster - 2) * self.sectors_per_cluster;
        Ok(fat_sector * self.sectors_per_block)
    }

    fn inode_info(&self, inode: INodeNum) -> FatResult<&FatInode> {
        self.inodes
            .get(&inode)
            .ok_or_else(|| FatError::Corrupt(format!("unknown inode {inode}")))
    }

    /// Read a whole cluster into the per-mount scratch buffer.
    fn load_cluster(&mut self, cluster: u32) -> FatResult<()> {
        let sector = self.cluster_block_sector(cluster)?;
        self.device.read(sector, &mut self.scratch)?;
        Ok(())
    }

    /// Write the scratch buffer back to a cluster.
    fn store_cluster(&mut self, cluster: u32) -> FatResult<()> {
        let sector = self.cluster_block_sector(cluster)?;
        self.device.write(sector, &self.scratch)?;
        Ok(())
    }

    /// Register (or refresh) the cached inode for a directory entry,
    /// returning its inode number.
    fn register_inode(&mut self, dir: INodeNum, offset: DirOffset, entry: &FatDirEntry) -> INodeNum {
        let location = Some((dir, offset));
        let existing = self
            .inodes
            .iter()
            .find(|(_, i)| i.entry == location)
            .map(|(&ino, _)| ino);
        let ino = match existing {
            Some(ino) => ino,
            None if entry.first_cluster() != 0 => entry.first_cluster(),
            None => {
                let ino = self.next_virtual_ino;
                self.next_virtual_ino += 1;
                ino
            }
        };
        self.inodes.insert(
            ino,
            FatInode {
                first_cluster: entry.first_cluster(),
                size: entry.file_size.get(),
                attr: entry.attr,
                entry: location,
                creation_date: entry.creation_date.get(),
                creation_time: entry.creation_time.get(),
                write_date: entry.write_date.get(),
                write_time: entry.write_time.get(),
                access_date: entry.access_date.get(),
            },
        );
        ino
    }

    fn evict_inode(&mut self, ino: INodeNum) {
        if ino != self.root_ino {
            self.inodes.remove(&ino);
        }
    }

    /// Number of clusters in an inode's chain (0 when it has none).
    fn chain_len(&self, first_cluster: u32) -> FatResult<u64> {
        if first_cluster == 0 {
            return Ok(0);
        }
        let mut n = 0;
        self.fat.lock().walk(first_cluster, |_| n += 1)?;
        Ok(n)
    }

    /// Byte size of a directory for stat purposes: the fixed root region, or
    /// the full span of the directory's chain.
    fn dir_byte_size(&self, info: &FatInode) -> FatResult<u64> {
        if self.ty == FatType::Fat16 && info.entry.is_none() {
            return Ok(u64::from(self.root_dir_sectors * self.bytes_per_sector));
        }
        Ok(self.chain_len(info.first_cluster)? * u64::from(self.cluster_bytes))
    }

    /// Make sure `inode`'s chain covers `end` bytes, allocating and linking
    /// zeroed clusters as needed. Returns the (possibly fresh) first cluster.
    fn ensure_chain(&mut self, inode: INodeNum, end: u64) -> FatResult<u32> {
        let cb = u64::from(self.cluster_bytes);
        let needed = end.div_ceil(cb).max(1);
        let mut first = self.inode_info(inode)?.first_cluster;
        if first == 0 {
            first = self.fat.lock().alloc_eoc()?;
            self.zero_cluster(first)?;
            if let Some(info) = self.inodes.get_mut(&inode) {
                info.first_cluster = first;
            }
            let entry = self.inode_info(inode)?.entry;
            if let Some((dir, offset)) = entry {
                self.dir_update(dir, offset, |e| e.set_first_cluster(first))?;
            }
        }
        let (mut have, mut tail) = {
            let fat = self.fat.lock();
            let mut have = 0u64;
            let mut tail = first;
            fat.walk(first, |c| {
                have += 1;
                tail = c;
            })?;
            (have, tail)
        };
        while have < needed {
            let new_cluster = {
                let mut fat = self.fat.lock();
                let new_cluster = fat.alloc_eoc()?;
                fat.set(tail, new_cluster);
                new_cluster
            };
            self.zero_cluster(new_cluster)?;
            tail = new_cluster;
            have += 1;
        }
        Ok(first)
    }

    /// Walk to the cluster holding byte index `offset`, reusing an open
    /// file's forward cursor when it helps.
    fn seek_cluster(
        &self,
        first_cluster: u32,
        cursor: Option<(u64, u32)>,
        offset: u64,
    ) -> FatResult<(u64, u32)> {
        let target = offset / u64::from(self.cluster_bytes);
        let (mut idx, mut cluster) = match cursor {
            Some((i, c)) if i <= target => (i, c),
            _ => (0, first_cluster),
        };
        let fat = self.fat.lock();
        while idx < target {
            cluster = fat.next(cluster).ok_or_else(|| {
                FatError::Corrupt(format!(
                    "cluster chain ends early at {cluster} (index {idx}, wanted {target})"
                ))
            })?;
            idx += 1;
        }
        Ok((idx, cluster))
    }

    /// Zero the byte range `[from, to)` of a chain, read-modify-writing the
    /// clusters it touches.
    fn zero_range(&mut self, first_cluster: u32, from: u64, to: u64) -> FatResult<()> {
        if from >= to {
            return Ok(());
        }
        let cb = u64::from(self.cluster_bytes);
        let (_, mut cluster) = self.seek_cluster(first_cluster, None, from)?;
        let mut pos = from;
        while pos < to {
            let within = (pos % cb) as usize;
            let n = ((to - pos) as usize).min(self.cluster_bytes as usize - within);
            self.load_cluster(cluster)?;
            self.scratch[within..within + n].fill(0);
            self.store_cluster(cluster)?;
            pos += n as u64;
            if pos < to {
                cluster = self
                    .fat
                    .lock()
                    .next(cluster)
                    .ok_or_else(|| FatError::Corrupt("chain ends inside zeroed range".into()))?;
            }
        }
        Ok(())
    }

    /// Write the new size (and first cluster) into the inode's directory
    /// entry and the cache.
    fn update_size(&mut self, inode: INodeNum, size: u32) -> FatResult<()> {
        let (entry, first_cluster) = {
            let info = self.inode_info(inode)?;
            (info.entry, info.first_cluster)
        };
        if let Some(info) = self.inodes.get_mut(&inode) {
            info.size = size;
        }
        if let Some((dir, offset)) = entry {
            self.dir_update(dir, offset, |e| {
                e.file_size = U32::new(size);
                e.set_first_cluster(first_cluster);
            })?;
        }
        Ok(())
    }

    /// Flush the FAT cache to every FAT copy, primary first. A failure
    /// leaves the dirty flag set.
    fn flush_fat(&mut self) -> FatResult<()> {
        let mut fat = self.fat.lock();
        if !fat.is_dirty() {
            return Ok(());
        }
        for copy in 0..self.num_fats {
            let sector = (self.reserved_sectors + copy * self.fat_size) * self.sectors_per_block;
            self.device.write(sector, fat.bytes())?;
        }
        fat.mark_clean();
        Ok(())
    }
}

impl FileSystem for FatFS {
    type FileHandle = FatHandle;

    fn root(&self) -> INodeNum {
        self.root_ino
    }

    fn lookup(&mut self, dir: INodeNum, name: &str) -> Result<INodeNum> {
        if !self.inode_info(dir).map_err(Error::from)?.is_dir() {
            return Err(Error::NotDirectory);
        }
        match self.dir_find(dir, name).map_err(Error::from)? {
            Some((offset, entry)) => Ok(self.register_inode(dir, offset, &entry)),
            None => Err(Error::NotFound),
        }
    }

    fn open(&mut self, inode: INodeNum) -> Result<FatHandle> {
        if !self.inodes.contains_key(&inode) {
            return Err(Error::NotFound);
        }
        Ok(FatHandle {
            inode,
            cursor: None,
        })
    }

    fn release(&mut self, _inode: INodeNum) {
        // per-handle state lives in the handle itself; the inode record
        // stays cached because dentries may still point at it
    }

    fn create(&mut self, parent: &mut FatHandle, name: &str) -> Result<FatHandle> {
        let parent_ino = parent.inode;
        if !self.inode_info(parent_ino).map_err(Error::from)?.is_dir() {
            return Err(Error::NotDirectory);
        }
        if self.dir_find(parent_ino, name).map_err(Error::from)?.is_some() {
            return Err(Error::Exists);
        }
        let cluster = self.fat.lock().alloc_eoc().map_err(Error::from)?;
        self.zero_cluster(cluster).map_err(Error::from)?;
        let entry = FatDirEntry::new(to_83(name), ATTR_ARCHIVE, cluster, 0);
        let offset = match self.dir_insert(parent_ino, entry) {
            Ok(offset) => offset,
            Err(e) => {
                // give the cluster back before reporting the failure
                self.fat.lock().set(cluster, 0);
                return Err(e.into());
            }
        };
        let ino = self.register_inode(parent_ino, offset, &entry);
        Ok(FatHandle {
            inode: ino,
            cursor: None,
        })
    }

    fn mkdir(&mut self, parent: &mut FatHandle, name: &str) -> Result<INodeNum> {
        let parent_ino = parent.inode;
        if !self.inode_info(parent_ino).map_err(Error::from)?.is_dir() {
            return Err(Error::NotDirectory);
        }
        if self.dir_find(parent_ino, name).map_err(Error::from)?.is_some() {
            return Err(Error::Exists);
        }
        let cluster = self.fat.lock().alloc_eoc().map_err(Error::from)?;
        // `.` points at the new directory; `..` points at the parent, with
        // the conventional 0 standing in for the root directory
        let parent_cluster = self.inode_info(parent_ino).map_err(Error::from)?.first_cluster;
        let dotdot_cluster = if parent_ino == self.root_ino { 0 } else { parent_cluster };
        self.scratch.fill(0);
        let dot = FatDirEntry::new(*b".          ", ATTR_DIRECTORY, cluster, 0);
        let dotdot = FatDirEntry::new(*b"..         ", ATTR_DIRECTORY, dotdot_cluster, 0);
        self.scratch[..32].copy_from_slice(dot.as_bytes());
        self.scratch[32..64].copy_from_slice(dotdot.as_bytes());
        self.store_cluster(cluster).map_err(Error::from)?;
        let entry = FatDirEntry::new(to_83(name), ATTR_DIRECTORY, cluster, 0);
        let offset = match self.dir_insert(parent_ino, entry) {
            Ok(offset) => offset,
            Err(e) => {
                self.fat.lock().set(cluster, 0);
                return Err(e.into());
            }
        };
        Ok(self.register_inode(parent_ino, offset, &entry))
    }

    fn unlink(&mut self, parent: &mut FatHandle, name: &str) -> Result<()> {
        let parent_ino = parent.inode;
        let (offset, entry) = self
            .dir_find(parent_ino, name)
            .map_err(Error::from)?
            .ok_or(Error::NotFound)?;
        if entry.is_directory() {
            return Err(Error::IsDirectory);
        }
        let ino = self.register_inode(parent_ino, offset, &entry);
        self.dir_update(parent_ino, offset, FatDirEntry::mark_deleted)
            .map_err(Error::from)?;
        if entry.first_cluster() != 0 {
            self.fat
                .lock()
                .free_chain(entry.first_cluster())
                .map_err(Error::from)?;
        }
        self.evict_inode(ino);
        Ok(())
    }

    fn rmdir(&mut self, parent: &mut FatHandle, name: &str) -> Result<()> {
        let parent_ino = parent.inode;
        let (offset, entry) = self
            .dir_find(parent_ino, name)
            .map_err(Error::from)?
            .ok_or(Error::NotFound)?;
        if !entry.is_directory() {
            return Err(Error::NotDirectory);
        }
        let ino = self.register_inode(parent_ino, offset, &entry);
        if !self.dir_is_empty(ino).map_err(Error::from)? {
            return Err(Error::Busy);
        }
        self.dir_update(parent_ino, offset, FatDirEntry::mark_deleted)
            .map_err(Error::from)?;
        if entry.first_cluster() != 0 {
            self.fat
                .lock()
                .free_chain(entry.first_cluster())
                .map_err(Error::from)?;
        }
        self.evict_inode(ino);
        Ok(())
    }

    fn readdir(&mut self, dir: &mut FatHandle) -> Result<DirEntries> {
        let ino = dir.inode;
        if !self.inode_info(ino).map_err(Error::from)?.is_dir() {
            return Err(Error::NotDirectory);
        }
        self.list_dir(ino).map_err(Error::from)
    }

    fn read(&mut self, file: &mut FatHandle, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let info = self.inode_info(file.inode).map_err(Error::from)?;
        if info.is_dir() {
            return Err(Error::IsDirectory);
        }
        let size = u64::from(info.size);
        let first_cluster = info.first_cluster;
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }
        let count = (buf.len() as u64).min(size - offset) as usize;
        if first_cluster == 0 {
            return Err(Error::Io("file has a size but no cluster chain".into()));
        }
        let cb = self.cluster_bytes as usize;
        let (mut idx, mut cluster) = self
            .seek_cluster(first_cluster, file.cursor, offset)
            .map_err(Error::from)?;
        let mut done = 0;
        let mut within = (offset % cb as u64) as usize;
        while done < count {
            self.load_cluster(cluster).map_err(Error::from)?;
            let n = (count - done).min(cb - within);
            buf[done..done + n].copy_from_slice(&self.scratch[within..within + n]);
            done += n;
            within = 0;
            if done < count {
                cluster = self
                    .fat
                    .lock()
                    .next(cluster)
                    .ok_or_else(|| Error::Io("cluster chain shorter than file size".into()))?;
                idx += 1;
            }
        }
        file.cursor = Some((idx, cluster));
        Ok(done)
    }

    fn write(&mut self, file: &mut FatHandle, offset: u64, buf: &[u8]) -> Result<usize> {
        let info = self.inode_info(file.inode).map_err(Error::from)?;
        if info.is_dir() {
            return Err(Error::IsDirectory);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let size = u64::from(info.size);
        let end = offset + buf.len() as u64;
        if end > u64::from(u32::MAX) {
            // a FAT file size field is 32 bits
            return Err(Error::NoSpace);
        }
        let first_cluster = self.ensure_chain(file.inode, end).map_err(Error::from)?;
        if offset > size {
            // the gap between old EOF and the write start must read back as
            // zeroes once the size grows
            self.zero_range(first_cluster, size, offset)
                .map_err(Error::from)?;
        }
        let cb = self.cluster_bytes as usize;
        let (mut idx, mut cluster) = self
            .seek_cluster(first_cluster, file.cursor, offset)
            .map_err(Error::from)?;
        let mut done = 0;
        let mut within = (offset % cb as u64) as usize;
        while done < buf.len() {
            let n = (buf.len() - done).min(cb - within);
            if n == cb {
                self.scratch.copy_from_slice(&buf[done..done + n]);
            } else {
                self.load_cluster(cluster).map_err(Error::from)?;
                self.scratch[within..within + n].copy_from_slice(&buf[done..done + n]);
            }
            self.store_cluster(cluster).map_err(Error::from)?;
            done += n;
            within = 0;
            if done < buf.len() {
                cluster = self
                    .fat
                    .lock()
                    .next(cluster)
                    .ok_or_else(|| Error::Io("cluster chain shorter than write range".into()))?;
                idx += 1;
            }
        }
        if end > size {
            self.update_size(file.inode, end as u32).map_err(Error::from)?;
        }
        file.cursor = Some((idx, cluster));
        Ok(done)
    }

    fn stat(&mut self, file: &FatHandle) -> Result<Metadata> {
        let info = self.inode_info(file.inode).map_err(Error::from)?.clone();
        let (r#type, size, nlink, base_mode) = if info.is_dir() {
            (
                InodeType::Directory,
                self.dir_byte_size(&info).map_err(Error::from)?,
                2,
                0o755,
            )
        } else {
            (InodeType::Regular, u64::from(info.size), 1, 0o644)
        };
        let mode = if info.attr & ATTR_READ_ONLY != 0 {
            base_mode & !0o222
        } else {
            base_mode
        };
        Ok(Metadata {
            inode: file.inode,
            r#type,
            mode,
            uid: 0,
            gid: 0,
            nlink,
            size,
            blocks: size.div_ceil(BLOCK_SECTOR_SIZE as u64),
            atime: fat_datetime_to_unix(info.access_date, 0),
            mtime: fat_datetime_to_unix(info.write_date, info.write_time),
            ctime: fat_datetime_to_unix(info.creation_date, info.creation_time),
        })
    }

    fn set_readonly(&mut self, file: &mut FatHandle, readonly: bool) -> Result<()> {
        let entry = self.inode_info(file.inode).map_err(Error::from)?.entry;
        if let Some(info) = self.inodes.get_mut(&file.inode) {
            if readonly {
                info.attr |= ATTR_READ_ONLY;
            } else {
                info.attr &= !ATTR_READ_ONLY;
            }
        }
        let Some((dir, offset)) = entry else {
            // the root directory has no entry to persist into
            return Ok(());
        };
        self.dir_update(dir, offset, |e| {
            if readonly {
                e.attr |= ATTR_READ_ONLY;
            } else {
                e.attr &= !ATTR_READ_ONLY;
            }
        })
        .map_err(Error::from)
    }

    fn truncate(&mut self, file: &mut FatHandle, size: u64) -> Result<()> {
        let info = self.inode_info(file.inode).map_err(Error::from)?;
        if info.is_dir() {
            return Err(Error::IsDirectory);
        }
        if size > u64::from(u32::MAX) {
            return Err(Error::NoSpace);
        }
        let old = u64::from(info.size);
        let first_cluster = info.first_cluster;
        if size == old {
            return Ok(());
        }
        if size > old {
            let first = self.ensure_chain(file.inode, size).map_err(Error::from)?;
            self.zero_range(first, old, size).map_err(Error::from)?;
        } else if first_cluster != 0 {
            // keep enough clusters for the new size (never fewer than one),
            // terminate the chain there, free the rest
            let cb = u64::from(self.cluster_bytes);
            let keep = size.div_ceil(cb).max(1);
            let mut clusters = Vec::new();
            self.fat
                .lock()
                .walk(first_cluster, |c| clusters.push(c))
                .map_err(Error::from)?;
            if (clusters.len() as u64) > keep {
                let mut fat = self.fat.lock();
                let eoc = fat.eoc();
                fat.set(clusters[keep as usize - 1], eoc);
                for &c in &clusters[keep as usize..] {
                    fat.set(c, 0);
                }
            }
        }
        file.cursor = None;
        self.update_size(file.inode, size as u32).map_err(Error::from)
    }

    fn sync(&mut self) -> Result<()> {
        self.flush_fat().map_err(Error::from)
    }
}

/// The registrable "fat" filesystem type: hands mounted volumes to the VFS
/// as type-erased superblocks.
pub struct FatFilesystemType;

impl FilesystemType for FatFilesystemType {
    fn name(&self) -> &str {
        "fat"
    }

    fn mount(&self, device: Block, _flags: MountFlags) -> Result<Box<dyn SuperblockOps>> {
        let fs = FatFS::new(device)?;
        let block_size = fs.cluster_bytes();
        Ok(Box::new(Superblock::new(fs, FAT_SUPER_MAGIC, block_size)))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fs::fat::format::{format, FormatOptions};
    use crate::block::ramdisk::ram_disk;

    fn fat16_disk() -> Block {
        let mut disk = ram_disk("rd0", 16384);
        format(&mut disk, &FormatOptions::fat16(1, 512, 64)).unwrap();
        disk
    }

    #[test]
    fn cluster_to_sector_mapping() {
        let fs = FatFS::new(fat16_disk()).unwrap();
        assert_eq!(
            fs.cluster_block_sector(2).unwrap(),
            fs.first_data_sector * fs.sectors_per_block
        );
        for c in 2..16 {
            let step =
                fs.cluster_block_sector(c + 1).unwrap() - fs.cluster_block_sector(c).unwrap();
            assert_eq!(step, fs.sectors_per_cluster * fs.sectors_per_block);
        }
        assert!(fs.cluster_block_sector(0).is_err());
        assert!(fs.cluster_block_sector(1).is_err());
        assert!(fs.cluster_block_sector(fs.total_clusters + 2).is_err());
    }

    #[test]
    fn fresh_volume_has_empty_root() {
        let mut fs = FatFS::new(fat16_disk()).unwrap();
        let root = fs.root();
        let mut handle = fs.open(root).unwrap();
        let entries = fs.readdir(&mut handle).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn lookup_miss_is_not_found() {
        let mut fs = FatFS::new(fat16_disk()).unwrap();
        let root = fs.root();
        assert_eq!(fs.lookup(root, "NOPE.TXT"), Err(Error::NotFound));
    }

    #[test]
    fn create_registers_allocated_cluster() {
        let mut fs = FatFS::new(fat16_disk()).unwrap();
        let root = fs.root();
        let mut root_handle = fs.open(root).unwrap();
        let handle = fs.create(&mut root_handle, "f.txt").unwrap();
        // first free cluster on a fresh volume is 2, and it names the inode
        assert_eq!(handle.inode(), 2);
        let meta = fs.stat(&handle).unwrap();
        assert_eq!(meta.size, 0);
        assert_eq!(meta.r#type, InodeType::Regular);
        let found = fs.lookup(root, "f.txt").unwrap();
        assert_eq!(found, 2);
    }

    #[test]
    fn fat12_sized_volume_rejected() {
        // shrink the sector count below the FAT16 threshold
        let mut disk = fat16_disk();
        let mut boot = [0u8; 512];
        disk.read(0, &mut boot).unwrap();
        boot[19..21].copy_from_slice(&2048u16.to_le_bytes());
        boot[32..36].copy_from_slice(&0u32.to_le_bytes());
        disk.write(0, &boot).unwrap();
        assert!(matches!(
            FatFS::new(disk),
            Err(FatError::Unsupported(_))
        ));
    }

    #[test]
    fn mount_requires_signature() {
        let mut disk = fat16_disk();
        let mut boot = [0u8; 512];
        disk.read(0, &mut boot).unwrap();
        boot[510] = 0;
        disk.write(0, &boot).unwrap();
        assert!(matches!(
            FatFS::new(disk),
            Err(FatError::InvalidBootSector(_))
        ));
    }

    #[test]
    fn directory_scan_stops_at_end_sentinel() {
        let mut fs = FatFS::new(fat16_disk()).unwrap();
        let root = fs.root();
        let mut root_handle = fs.open(root).unwrap();
        fs.create(&mut root_handle, "a.txt").unwrap();
        fs.create(&mut root_handle, "b.txt").unwrap();
        // plant debris past the end sentinel: a valid-looking entry two
        // slots beyond the live region must stay invisible
        let sectors = fs.dir_block_sectors(root).unwrap();
        let mut buf = [0u8; BLOCK_SECTOR_SIZE];
        fs.device.read(sectors[0], &mut buf).unwrap();
        let ghost = FatDirEntry::new(*b"GHOST   TXT", ATTR_ARCHIVE, 9, 1);
        buf[3 * 32..4 * 32].copy_from_slice(ghost.as_bytes());
        fs.device.write(sectors[0], &buf).unwrap();
        let entries = fs.list_dir(root).unwrap();
        let names: Vec<String> = (&entries).into_iter().map(|e| e.name.into_owned()).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert_eq!(fs.lookup(root, "ghost.txt"), Err(Error::NotFound));
    }

    #[test]
    fn deleted_entries_are_skipped_and_reused() {
        let mut fs = FatFS::new(fat16_disk()).unwrap();
        let root = fs.root();
        let mut root_handle = fs.open(root).unwrap();
        fs.create(&mut root_handle, "a.txt").unwrap();
        fs.create(&mut root_handle, "b.txt").unwrap();
        fs.unlink(&mut root_handle, "a.txt").unwrap();
        assert_eq!(fs.lookup(root, "a.txt"), Err(Error::NotFound));
        // the freed slot is the first candidate for the next entry
        let (offset, _) = {
            fs.create(&mut root_handle, "c.txt").unwrap();
            fs.dir_find(root, "c.txt").unwrap().unwrap()
        };
        assert_eq!(offset, 0);
    }

    #[test]
    fn full_fat16_root_reports_no_space() {
        let mut disk = ram_disk("rd0", 16384);
        // a root region of a single sector: 16 entries
        format(&mut disk, &FormatOptions::fat16(1, 16, 64)).unwrap();
        let mut fs = FatFS::new(disk).unwrap();
        let root = fs.root();
        let mut root_handle = fs.open(root).unwrap();
        for i in 0..16 {
            let name = alloc::format!("f{i}.txt");
            fs.create(&mut root_handle, &name).unwrap();
        }
        let result = fs.create(&mut root_handle, "extra.txt");
        assert_eq!(result.err(), Some(Error::NoSpace));
    }

    #[test]
    fn subdirectories_grow_by_cluster() {
        let mut fs = FatFS::new(fat16_disk()).unwrap();
        let root = fs.root();
        let mut root_handle = fs.open(root).unwrap();
        let dir_ino = fs.mkdir(&mut root_handle, "docs").unwrap();
        let mut dir_handle = fs.open(dir_ino).unwrap();
        // a 512-byte cluster holds 16 entries; `.` and `..` occupy two, so
        // the 15th file forces a chain extension
        for i in 0..15 {
            let name = alloc::format!("f{i}.txt");
            fs.create(&mut dir_handle, &name).unwrap();
        }
        assert_eq!(fs.chain_len(fs.inode_info(dir_ino).unwrap().first_cluster).unwrap(), 2);
        let entries = fs.readdir(&mut dir_handle).unwrap();
        assert_eq!(entries.len(), 15);
    }

    #[test]
    fn mkdir_writes_dot_entries() {
        let mut fs = FatFS::new(fat16_disk()).unwrap();
        let root = fs.root();
        let mut root_handle = fs.open(root).unwrap();
        let dir_ino = fs.mkdir(&mut root_handle, "d").unwrap();
        fs.load_cluster(dir_ino).unwrap();
        let dot = FatDirEntry::ref_from(&fs.scratch[..32]).unwrap();
        assert_eq!(&dot.name, b".          ");
        assert_eq!(dot.first_cluster(), dir_ino);
        let dotdot = FatDirEntry::ref_from(&fs.scratch[32..64]).unwrap();
        assert_eq!(&dotdot.name, b"..         ");
        assert_eq!(dotdot.first_cluster(), 0); // parent is the root
    }
}
