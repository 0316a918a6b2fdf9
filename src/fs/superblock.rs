use crate::fs::FileDescriptor;
use crate::vfs::{
    DirEntries, Error, FileHandle, FileSystem, INodeNum, Metadata, OwnedDirEntry, Result,
};
use alloc::collections::BTreeMap;
use core::num::NonZeroUsize;

/// One mounted filesystem instance: the driver plus the per-superblock
/// bookkeeping the VFS core needs (open handles keyed by descriptor, open
/// counts per inode driving `release`).
pub struct Superblock<F: FileSystem> {
    fs: F,
    magic: u32,
    block_size: u32,
    /// Driver file handles for each open descriptor
    open_files: BTreeMap<FileDescriptor, F::FileHandle>,
    /// Number of open descriptors pointing at each inode
    open_count: BTreeMap<INodeNum, NonZeroUsize>,
    /// Directory listings snapshotted per open directory descriptor,
    /// indexed by readdir position
    dir_cache: BTreeMap<FileDescriptor, DirEntries>,
}

struct TempOpen<F: FileSystem> {
    handle: F::FileHandle,
}

impl<F: FileSystem> Drop for TempOpen<F> {
    fn drop(&mut self) {
        panic!("temporarily-open file dropped; pass it to temp_close instead");
    }
}

/// Temporarily open an inode for one internal operation.
///
/// The return value must not be dropped; hand it back to [`temp_close`].
/// (A destructor cannot do the release itself because it would need the
/// filesystem borrow.)
fn temp_open<F: FileSystem>(fs: &mut F, inode: INodeNum) -> Result<TempOpen<F>> {
    let handle = fs.open(inode)?;
    Ok(TempOpen { handle })
}

fn temp_close<F: FileSystem>(
    fs: &mut F,
    file: TempOpen<F>,
    open_count: &BTreeMap<INodeNum, NonZeroUsize>,
) {
    let inode = file.handle.inode();
    if !open_count.contains_key(&inode) {
        fs.release(inode);
    }
    // prevent the drop guard from firing
    core::mem::forget(file);
}

impl<F: FileSystem> Superblock<F> {
    pub fn new(fs: F, magic: u32, block_size: u32) -> Self {
        Superblock {
            fs,
            magic,
            block_size,
            open_files: BTreeMap::new(),
            open_count: BTreeMap::new(),
            dir_cache: BTreeMap::new(),
        }
    }

    fn temp_open(&mut self, inode: INodeNum) -> Result<TempOpen<F>> {
        temp_open(&mut self.fs, inode)
    }

    fn temp_close(&mut self, file: TempOpen<F>) {
        temp_close(&mut self.fs, file, &self.open_count);
    }

    fn inc_ref(&mut self, inode: INodeNum) {
        self.open_count
            .entry(inode)
            .and_modify(|c| {
                *c = c
                    .checked_add(1)
                    .expect("open count cannot overflow usize");
            })
            .or_insert(NonZeroUsize::MIN);
    }

    fn dec_ref(&mut self, inode: INodeNum) {
        let Some(count) = self.open_count.get_mut(&inode) else {
            return;
        };
        match NonZeroUsize::new(count.get() - 1) {
            Some(n) => *count = n,
            None => {
                self.open_count.remove(&inode);
                self.fs.release(inode);
            }
        }
    }
}

/// The object-safe face of [`Superblock`].
///
/// `Superblock<dyn FileSystem>` cannot exist (the handle type is
/// associated), so the mount table stores superblocks behind this trait
/// instead.
pub trait SuperblockOps: Send + Sync {
    fn root(&self) -> INodeNum;
    fn magic(&self) -> u32;
    fn block_size(&self) -> u32;
    /// Driver lookup, invoked by path resolution on a dentry-cache miss.
    fn lookup(&mut self, dir: INodeNum, name: &str) -> Result<INodeNum>;
    fn open(&mut self, inode: INodeNum, fd: FileDescriptor) -> Result<()>;
    /// Create a regular file and open it under `fd`, returning its inode.
    fn create(&mut self, parent: INodeNum, name: &str, fd: FileDescriptor) -> Result<INodeNum>;
    fn close(&mut self, fd: FileDescriptor) -> Result<()>;
    fn read(&mut self, fd: FileDescriptor, offset: u64, buf: &mut [u8]) -> Result<usize>;
    fn write(&mut self, fd: FileDescriptor, offset: u64, buf: &[u8]) -> Result<usize>;
    fn stat_fd(&mut self, fd: FileDescriptor) -> Result<Metadata>;
    fn stat_inode(&mut self, inode: INodeNum) -> Result<Metadata>;
    fn set_readonly(&mut self, inode: INodeNum, readonly: bool) -> Result<()>;
    fn truncate(&mut self, fd: FileDescriptor, size: u64) -> Result<()>;
    fn mkdir(&mut self, parent: INodeNum, name: &str) -> Result<INodeNum>;
    fn unlink(&mut self, parent: INodeNum, name: &str) -> Result<()>;
    fn rmdir(&mut self, parent: INodeNum, name: &str) -> Result<()>;
    /// Directory entry at `index` in listing order for an open directory,
    /// `None` once exhausted.
    fn readdir_at(&mut self, fd: FileDescriptor, index: u64) -> Result<Option<OwnedDirEntry>>;
    fn has_open_files(&self) -> bool;
    fn sync(&mut self) -> Result<()>;
}

impl<F: FileSystem + 'static> SuperblockOps for Superblock<F> {
    fn root(&self) -> INodeNum {
        self.fs.root()
    }

    fn magic(&self) -> u32 {
        self.magic
    }

    fn block_size(&self) -> u32 {
        self.block_size
    }

    fn lookup(&mut self, dir: INodeNum, name: &str) -> Result<INodeNum> {
        self.fs.lookup(dir, name)
    }

    fn open(&mut self, inode: INodeNum, fd: FileDescriptor) -> Result<()> {
        let handle = self.fs.open(inode)?;
        self.inc_ref(inode);
        let prev = self.open_files.insert(fd, handle);
        debug_assert!(prev.is_none(), "descriptor {fd} double-opened");
        Ok(())
    }

    fn create(&mut self, parent: INodeNum, name: &str, fd: FileDescriptor) -> Result<INodeNum> {
        if name.is_empty() || name == "." || name == ".." {
            return Err(Error::InvalidParameter);
        }
        let mut dir = self.temp_open(parent)?;
        let created = self.fs.create(&mut dir.handle, name);
        self.temp_close(dir);
        let handle = created?;
        let inode = handle.inode();
        self.inc_ref(inode);
        let prev = self.open_files.insert(fd, handle);
        debug_assert!(prev.is_none(), "descriptor {fd} double-opened");
        Ok(inode)
    }

    fn close(&mut self, fd: FileDescriptor) -> Result<()> {
        let handle = self.open_files.remove(&fd).ok_or(Error::InvalidParameter)?;
        self.dir_cache.remove(&fd);
        self.dec_ref(handle.inode());
        Ok(())
    }

    fn read(&mut self, fd: FileDescriptor, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let handle = self.open_files.get_mut(&fd).ok_or(Error::InvalidParameter)?;
        self.fs.read(handle, offset, buf)
    }

    fn write(&mut self, fd: FileDescriptor, offset: u64, buf: &[u8]) -> Result<usize> {
        let handle = self.open_files.get_mut(&fd).ok_or(Error::InvalidParameter)?;
        self.fs.write(handle, offset, buf)
    }

    fn stat_fd(&mut self, fd: FileDescriptor) -> Result<Metadata> {
        let handle = self.open_files.get(&fd).ok_or(Error::InvalidParameter)?;
        self.fs.stat(handle)
    }

    fn stat_inode(&mut self, inode: INodeNum) -> Result<Metadata> {
        let handle = self.temp_open(inode)?;
        let result = self.fs.stat(&handle.handle);
        self.temp_close(handle);
        result
    }

    fn set_readonly(&mut self, inode: INodeNum, readonly: bool) -> Result<()> {
        let mut handle = self.temp_open(inode)?;
        let result = self.fs.set_readonly(&mut handle.handle, readonly);
        self.temp_close(handle);
        result
    }

    fn truncate(&mut self, fd: FileDescriptor, size: u64) -> Result<()> {
        let handle = self.open_files.get_mut(&fd).ok_or(Error::InvalidParameter)?;
        self.fs.truncate(handle, size)
    }

    fn mkdir(&mut self, parent: INodeNum, name: &str) -> Result<INodeNum> {
        if name.is_empty() || name == "." || name == ".." {
            return Err(Error::Exists);
        }
        let mut dir = self.temp_open(parent)?;
        let result = self.fs.mkdir(&mut dir.handle, name);
        self.temp_close(dir);
        result
    }

    fn unlink(&mut self, parent: INodeNum, name: &str) -> Result<()> {
        // refuse to pull a file out from under its open descriptors
        let target = self.fs.lookup(parent, name)?;
        if self.open_count.contains_key(&target) {
            return Err(Error::Busy);
        }
        let mut dir = self.temp_open(parent)?;
        let result = self.fs.unlink(&mut dir.handle, name);
        self.temp_close(dir);
        result
    }

    fn rmdir(&mut self, parent: INodeNum, name: &str) -> Result<()> {
        let target = self.fs.lookup(parent, name)?;
        if self.open_count.contains_key(&target) {
            return Err(Error::Busy);
        }
        let mut dir = self.temp_open(parent)?;
        let result = self.fs.rmdir(&mut dir.handle, name);
        self.temp_close(dir);
        result
    }

    fn readdir_at(&mut self, fd: FileDescriptor, index: u64) -> Result<Option<OwnedDirEntry>> {
        if !self.dir_cache.contains_key(&fd) {
            let handle = self.open_files.get_mut(&fd).ok_or(Error::InvalidParameter)?;
            let entries = self.fs.readdir(handle)?;
            self.dir_cache.insert(fd, entries);
        }
        let entries = &self.dir_cache[&fd];
        let index = usize::try_from(index).map_err(|_| Error::InvalidParameter)?;
        Ok(entries.get(index).map(|e| e.to_owned()))
    }

    fn has_open_files(&self) -> bool {
        !self.open_count.is_empty()
    }

    fn sync(&mut self) -> Result<()> {
        self.fs.sync()
    }
}
