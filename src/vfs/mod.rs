pub mod error;
pub mod path;

pub use error::{Error, Result};

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;

/// Inode numbers are filesystem-local.
pub type INodeNum = u32;

/// Exhaustive file-type tag carried by every inode.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum InodeType {
    /// Regular file
    Regular,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Character device
    CharDev,
    /// Block device
    BlockDev,
    /// Named pipe
    Fifo,
    /// Socket
    Socket,
    /// Anything the driver could not classify
    Unknown,
}

impl InodeType {
    pub fn is_directory(self) -> bool {
        self == InodeType::Directory
    }
}

/// Inode metadata, as returned by stat.
///
/// `size` is authoritative over data-region contents; timestamps are seconds
/// since the Unix epoch.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub inode: INodeNum,
    pub r#type: InodeType,
    /// rwxrwxrwx permission bits (0o777 mask)
    pub mode: u16,
    pub uid: u32,
    pub gid: u32,
    /// Number of hard links; at least 1 while reachable from a dentry
    pub nlink: u32,
    /// Size in bytes
    pub size: u64,
    /// Number of 512-byte blocks attributed to the object
    pub blocks: u64,
    pub atime: u64,
    pub mtime: u64,
    pub ctime: u64,
}

/// Raw directory entry information.
///
/// Rather than owning its name, this holds an offset into
/// [`DirEntries::filenames`].
#[derive(Debug, Clone, Copy)]
pub struct RawDirEntry {
    pub r#type: InodeType,
    pub inode: INodeNum,
    /// Index into [`DirEntries::filenames`]
    pub name: usize,
}

/// Directory entry information
#[derive(Debug, Clone)]
pub struct DirEntry<'a> {
    pub r#type: InodeType,
    pub inode: INodeNum,
    pub name: Cow<'a, str>,
}

/// A directory entry which owns its name
pub type OwnedDirEntry = DirEntry<'static>;

impl DirEntry<'_> {
    pub fn to_owned(&self) -> OwnedDirEntry {
        OwnedDirEntry {
            r#type: self.r#type,
            inode: self.inode,
            name: Cow::Owned(String::from(self.name.as_ref())),
        }
    }
}

/// The full listing of one directory, packed into two allocations.
#[derive(Debug, Default)]
pub struct DirEntries {
    /// Raw entries, with names pointing into [`Self::filenames`]
    pub entries: Vec<RawDirEntry>,
    /// `'\0'`-separated concatenation of all names in this directory
    pub filenames: String,
}

impl DirEntries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the filename behind a [`RawDirEntry::name`] index.
    pub fn get_filename(&self, name: usize) -> &str {
        let s = &self.filenames[name..];
        &s[..s.find('\0').unwrap_or(s.len())]
    }

    pub fn add(&mut self, inode: INodeNum, r#type: InodeType, name: &str) {
        let name_id = self.filenames.len();
        self.filenames.push_str(name);
        self.filenames.push('\0');
        self.entries.push(RawDirEntry {
            inode,
            r#type,
            name: name_id,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a position in listing order, if any.
    pub fn get(&self, index: usize) -> Option<DirEntry<'_>> {
        let raw = self.entries.get(index)?;
        Some(DirEntry {
            inode: raw.inode,
            r#type: raw.r#type,
            name: Cow::Borrowed(self.get_filename(raw.name)),
        })
    }
}

pub struct DirIterator<'a> {
    entries: &'a DirEntries,
    it: core::slice::Iter<'a, RawDirEntry>,
}

impl<'a> Iterator for DirIterator<'a> {
    type Item = DirEntry<'a>;
    fn next(&mut self) -> Option<DirEntry<'a>> {
        let raw = self.it.next()?;
        Some(DirEntry {
            inode: raw.inode,
            r#type: raw.r#type,
            name: Cow::Borrowed(self.entries.get_filename(raw.name)),
        })
    }
}

impl<'a> IntoIterator for &'a DirEntries {
    type IntoIter = DirIterator<'a>;
    type Item = DirEntry<'a>;
    fn into_iter(self) -> Self::IntoIter {
        DirIterator {
            entries: self,
            it: self.entries.iter(),
        }
    }
}

/// Represents an open file within a filesystem driver.
///
/// The VFS core must eventually pair every successful [`FileSystem::open`]
/// with a [`FileSystem::release`] once the last handle to the inode closes;
/// drivers may keep per-handle cursor state in here.
pub trait FileHandle: Send + Sync {
    fn inode(&self) -> INodeNum;
}

/// The per-superblock operation table a filesystem driver provides.
///
/// This is the complete set of dynamic dispatch sites between the VFS core
/// and a concrete filesystem; everything else in the stack is concrete code.
/// Implementations translate their internal error kinds into the [`Error`]
/// taxonomy at this boundary.
pub trait FileSystem: Send + Sync {
    type FileHandle: FileHandle;

    /// Inode number of the filesystem root directory.
    fn root(&self) -> INodeNum;

    /// Find `name` in the directory `dir`.
    ///
    /// Invoked by the VFS on a dentry-cache miss; returns
    /// [`Error::NotFound`] for a negative result.
    fn lookup(&mut self, dir: INodeNum, name: &str) -> Result<INodeNum>;

    /// Open an existing inode.
    fn open(&mut self, inode: INodeNum) -> Result<Self::FileHandle>;

    /// Indicate that no more handles reference `inode`.
    fn release(&mut self, inode: INodeNum);

    /// Create a regular file `name` in `parent` and open it.
    ///
    /// Fails with [`Error::Exists`] if the name is taken.
    fn create(&mut self, parent: &mut Self::FileHandle, name: &str) -> Result<Self::FileHandle>;

    /// Create a directory `name` in `parent`, returning its inode number.
    fn mkdir(&mut self, parent: &mut Self::FileHandle, name: &str) -> Result<INodeNum>;

    /// Remove the regular file `name` from `parent`.
    fn unlink(&mut self, parent: &mut Self::FileHandle, name: &str) -> Result<()>;

    /// Remove the empty directory `name` from `parent`.
    fn rmdir(&mut self, parent: &mut Self::FileHandle, name: &str) -> Result<()>;

    /// List all entries of the directory behind `dir`.
    fn readdir(&mut self, dir: &mut Self::FileHandle) -> Result<DirEntries>;

    /// Read from the file at a byte offset; short reads occur only at
    /// end-of-file. Reading at or past the end returns 0.
    fn read(&mut self, file: &mut Self::FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize>;

    /// Write to the file at a byte offset, growing it if the write extends
    /// past the current end.
    fn write(&mut self, file: &mut Self::FileHandle, offset: u64, buf: &[u8]) -> Result<usize>;

    /// Metadata of the object behind an open handle.
    fn stat(&mut self, file: &Self::FileHandle) -> Result<Metadata>;

    /// Persist the write-protection half of a chmod, where the on-disk
    /// format can express it.
    fn set_readonly(&mut self, file: &mut Self::FileHandle, readonly: bool) -> Result<()>;

    /// Set the file size, freeing or zero-filling as needed.
    fn truncate(&mut self, file: &mut Self::FileHandle, size: u64) -> Result<()>;

    /// Commit all cached state to the underlying device.
    fn sync(&mut self) -> Result<()>;
}
