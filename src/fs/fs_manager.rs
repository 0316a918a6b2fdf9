//! The VFS core: filesystem-type registry, mount table, dentry cache, open
//! file table, and the public file API dispatching into mounted drivers.

use crate::block::Block;
use crate::fs::dcache::{DentryCache, DentryId};
use crate::fs::registry::{FilesystemType, Registry};
use crate::fs::superblock::SuperblockOps;
use crate::fs::{FileDescriptor, MountId};
use crate::vfs::path::{check_component, components, dirname_and_filename, MAX_PATH_DEPTH};
use crate::vfs::{Error, INodeNum, InodeType, Metadata, OwnedDirEntry, Result};
use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use bitflags::bitflags;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use lazy_static::lazy_static;
use spin::Mutex;

/// Maximum number of simultaneously open files.
pub const MAX_OPEN_FILES: usize = 1024;
/// Maximum number of simultaneous mounts.
pub const MAX_MOUNTS: usize = 256;

bitflags! {
    /// Open-mode flags. `RDWR` is the union of the read and write bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const RDONLY = 1;
        const WRONLY = 2;
        const RDWR = 3;
        const CREAT = 4;
        const EXCL = 8;
        const TRUNC = 16;
        const APPEND = 32;
        const NONBLOCK = 64;
        const SYNC = 128;
        const DIRECTORY = 256;
    }
}

bitflags! {
    /// Per-mount flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MountFlags: u32 {
        const RDONLY = 1;
    }
}

impl OpenFlags {
    fn readable(self) -> bool {
        self.contains(OpenFlags::RDONLY)
    }

    fn writable(self) -> bool {
        self.contains(OpenFlags::WRONLY)
    }
}

/// Places a seek can start from.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SeekFrom {
    Set = 0,
    Cur = 1,
    End = 2,
}

/// Metadata for one open file handle.
#[derive(Debug)]
struct OpenFile {
    mount: MountId,
    dentry: DentryId,
    inode: INodeNum,
    flags: OpenFlags,
    /// Permission bits requested at creation; recorded, not enforced
    #[allow(dead_code)]
    mode: u16,
    /// Current byte position
    pos: u64,
    /// Owning process, recorded for diagnostics (no process model here)
    #[allow(dead_code)]
    pid: u32,
    is_dir: bool,
}

/// The global descriptor table: slots plus a used bitmap scanned for the
/// first free index.
struct FdTable {
    slots: Vec<Option<OpenFile>>,
    used: [u64; MAX_OPEN_FILES / 64],
}

impl FdTable {
    fn new() -> Self {
        FdTable {
            slots: (0..MAX_OPEN_FILES).map(|_| None).collect(),
            used: [0; MAX_OPEN_FILES / 64],
        }
    }

    /// Reserve the first free slot. The slot stays empty until
    /// [`FdTable::install`]; a failed open frees it again.
    fn alloc(&mut self) -> Option<FileDescriptor> {
        for (word_index, word) in self.used.iter_mut().enumerate() {
            if *word != u64::MAX {
                let bit = (!*word).trailing_zeros() as usize;
                *word |= 1 << bit;
                return Some((word_index * 64 + bit) as FileDescriptor);
            }
        }
        None
    }

    fn install(&mut self, fd: FileDescriptor, file: OpenFile) {
        self.slots[fd as usize] = Some(file);
    }

    fn is_used(&self, fd: FileDescriptor) -> bool {
        if fd < 0 || fd as usize >= MAX_OPEN_FILES {
            return false;
        }
        self.used[fd as usize / 64] & (1 << (fd as usize % 64)) != 0
    }

    fn get_mut(&mut self, fd: FileDescriptor) -> Result<&mut OpenFile> {
        if !self.is_used(fd) {
            return Err(Error::InvalidParameter);
        }
        self.slots[fd as usize].as_mut().ok_or(Error::InvalidParameter)
    }

    /// Remove an open file, clearing both the slot and its bitmap bit.
    fn take(&mut self, fd: FileDescriptor) -> Result<OpenFile> {
        if !self.is_used(fd) {
            return Err(Error::InvalidParameter);
        }
        self.used[fd as usize / 64] &= !(1 << (fd as usize % 64));
        self.slots[fd as usize].take().ok_or(Error::InvalidParameter)
    }

    /// Free a reserved slot that never got a file installed.
    fn release_slot(&mut self, fd: FileDescriptor) {
        self.used[fd as usize / 64] &= !(1 << (fd as usize % 64));
        self.slots[fd as usize] = None;
    }

    fn live(&self) -> usize {
        self.used.iter().map(|w| w.count_ones() as usize).sum()
    }

    fn used_fds(&self) -> Vec<FileDescriptor> {
        (0..MAX_OPEN_FILES as FileDescriptor)
            .filter(|&fd| self.is_used(fd))
            .collect()
    }
}

/// One active mount: a superblock bound into the dentry tree.
struct Mount {
    sb: Box<dyn SuperblockOps>,
    fstype: String,
    device_name: String,
    path: String,
    flags: MountFlags,
    parent: Option<MountId>,
    /// Dentry in the parent filesystem this mount covers (`None` for the
    /// root mount)
    mount_point: Option<DentryId>,
    /// Dentry representing the mounted filesystem's root
    root_dentry: DentryId,
    /// 1 + open files + child mounts; unmount requires exactly 1
    refcount: usize,
}

/// The mount table and the dentry cache it serializes.
struct MountState {
    mounts: Vec<Option<Mount>>,
    dcache: DentryCache,
    root_mount: Option<MountId>,
}

impl MountState {
    fn new() -> Self {
        MountState {
            mounts: (0..MAX_MOUNTS).map(|_| None).collect(),
            dcache: DentryCache::new(),
            root_mount: None,
        }
    }

    fn mount_mut(&mut self, id: MountId) -> Result<&mut Mount> {
        self.mounts
            .get_mut(id as usize)
            .and_then(Option::as_mut)
            .ok_or(Error::InvalidParameter)
    }

    fn sb_mut(&mut self, id: MountId) -> Result<&mut (dyn SuperblockOps + 'static)> {
        Ok(self.mount_mut(id)?.sb.as_mut())
    }

    /// Follow `mounted` links until the dentry is not covered by a mount.
    fn enter_mounts(&self, mut dentry: DentryId) -> DentryId {
        for _ in 0..MAX_PATH_DEPTH {
            match self.dcache.get(dentry).and_then(|d| d.mounted) {
                Some(mount) => match self.mounts.get(mount as usize).and_then(Option::as_ref) {
                    Some(m) => dentry = m.root_dentry,
                    None => break,
                },
                None => break,
            }
        }
        dentry
    }

    /// Resolve a path to a dentry. Absolute paths start at the VFS root;
    /// relative paths too, there being no per-process working directory.
    /// Iterative over components with a defensive depth cap.
    fn resolve(&mut self, path: &str, stats: &VfsStats) -> Result<DentryId> {
        let mut current = self.enter_mounts(self.dcache.root());
        let mut depth = 0;
        for component in components(path) {
            depth += 1;
            if depth > MAX_PATH_DEPTH {
                return Err(Error::InvalidParameter);
            }
            if component == "." {
                continue;
            }
            if component == ".." {
                if let Some(parent) = self.dcache.get(current).and_then(|d| d.parent) {
                    current = parent;
                }
                continue;
            }
            check_component(component)?;
            stats.lookups.fetch_add(1, Ordering::Relaxed);
            let (mount_id, dir_inode) = self
                .dcache
                .get(current)
                .and_then(|d| d.bound)
                .ok_or(Error::NotFound)?;
            let child = match self.dcache.child(current, component) {
                Some(hit) => hit,
                None => {
                    let inode = self.sb_mut(mount_id)?.lookup(dir_inode, component)?;
                    self.dcache.add_child(current, component, (mount_id, inode))
                }
            };
            current = self.enter_mounts(child);
        }
        Ok(current)
    }

    fn bound(&self, dentry: DentryId) -> Result<(MountId, INodeNum)> {
        self.dcache
            .get(dentry)
            .and_then(|d| d.bound)
            .ok_or(Error::NotFound)
    }

    fn check_writable(&self, mount: MountId) -> Result<()> {
        let flags = self
            .mounts
            .get(mount as usize)
            .and_then(Option::as_ref)
            .map(|m| m.flags)
            .ok_or(Error::InvalidParameter)?;
        if flags.contains(MountFlags::RDONLY) {
            return Err(Error::ReadOnly);
        }
        Ok(())
    }

    /// Resolve the parent directory of `path` and validate its final
    /// component, for the create/mkdir/unlink/rmdir family.
    fn resolve_parent<'p>(
        &mut self,
        path: &'p str,
        stats: &VfsStats,
    ) -> Result<(DentryId, MountId, INodeNum, &'p str)> {
        let (dir_path, name) = dirname_and_filename(path);
        if name.is_empty() {
            return Err(Error::InvalidParameter);
        }
        check_component(name)?;
        let parent = self.resolve(dir_path, stats)?;
        let (mount_id, parent_ino) = self.bound(parent)?;
        Ok((parent, mount_id, parent_ino, name))
    }
}

/// Per-call operation counters.
#[derive(Debug, Default)]
pub struct VfsStats {
    pub opens: AtomicU64,
    pub closes: AtomicU64,
    pub reads: AtomicU64,
    pub writes: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
    pub lookups: AtomicU64,
}

impl VfsStats {
    fn reset(&self) {
        self.opens.store(0, Ordering::Relaxed);
        self.closes.store(0, Ordering::Relaxed);
        self.reads.store(0, Ordering::Relaxed);
        self.writes.store(0, Ordering::Relaxed);
        self.bytes_read.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.lookups.store(0, Ordering::Relaxed);
    }
}

/// The VFS context: the filesystem-type registry, the mount table plus
/// dentry cache, and the descriptor table, each its own exclusion region.
///
/// Lock order where two are held: descriptor table before mount state; the
/// registry lock never nests inside either.
pub struct Vfs {
    types: Mutex<Registry>,
    state: Mutex<MountState>,
    fds: Mutex<FdTable>,
    pub stats: VfsStats,
    initialized: AtomicBool,
}

lazy_static! {
    static ref VFS: Vfs = Vfs::new();
}

/// The canonical VFS instance.
pub fn vfs() -> &'static Vfs {
    &VFS
}

impl Vfs {
    pub fn new() -> Self {
        Vfs {
            types: Mutex::new(Registry::new()),
            state: Mutex::new(MountState::new()),
            fds: Mutex::new(FdTable::new()),
            stats: VfsStats::default(),
            initialized: AtomicBool::new(true),
        }
    }

    /// Re-arm after [`Vfs::shutdown`]. Calling this on an initialized
    /// context is a no-op and succeeds.
    pub fn init(&self) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut state = self.state.lock();
        state.dcache.clear();
        state.root_mount = None;
        self.stats.reset();
        Ok(())
    }

    /// Close every descriptor, unmount everything leaf-first, and reset the
    /// dentry cache and the initialized flag.
    pub fn shutdown(&self) {
        let fds = self.fds.lock().used_fds();
        for fd in fds {
            if let Err(e) = self.close(fd) {
                log::warn!("close({fd}) failed during shutdown: {e}");
            }
        }
        loop {
            let leaf = {
                let state = self.state.lock();
                state
                    .mounts
                    .iter()
                    .flatten()
                    .find(|m| m.refcount == 1)
                    .map(|m| m.path.clone())
            };
            let Some(path) = leaf else { break };
            if let Err(e) = self.unmount(&path) {
                log::warn!("unmount({path}) failed during shutdown: {e}");
                break;
            }
        }
        self.state.lock().dcache.clear();
        self.initialized.store(false, Ordering::SeqCst);
    }

    // ---- filesystem types ----

    pub fn register_filesystem(&self, ty: Box<dyn FilesystemType>) -> Result<()> {
        self.types.lock().register(ty)
    }

    pub fn unregister_filesystem(&self, name: &str) -> Result<()> {
        self.types.lock().unregister(name)
    }

    // ---- mounts ----

    /// Mount a filesystem of registered type `fstype`, backed by `device`,
    /// at `path`. The first mount must be at `/`.
    pub fn mount(&self, device: Block, path: &str, fstype: &str, flags: MountFlags) -> Result<()> {
        let device_name = device.name().to_string();
        let sb = self.types.lock().mount(fstype, device, flags)?;
        let installed = self.install_mount(sb, path, fstype, &device_name, flags);
        match installed {
            Ok(()) => Ok(()),
            Err((sb, e)) => {
                // the type produced a superblock but it never got bound;
                // give it back to the kill routine
                self.types.lock().kill(fstype, sb);
                Err(e)
            }
        }
    }

    #[allow(clippy::type_complexity)]
    fn install_mount(
        &self,
        sb: Box<dyn SuperblockOps>,
        path: &str,
        fstype: &str,
        device_name: &str,
        flags: MountFlags,
    ) -> core::result::Result<(), (Box<dyn SuperblockOps>, Error)> {
        let mut state = self.state.lock();
        let Some(slot) = state.mounts.iter().position(Option::is_none) else {
            return Err((sb, Error::NoSpace));
        };
        let id = slot as MountId;
        let root_ino = sb.root();
        if components(path).next().is_none() {
            // mounting the VFS root
            if state.root_mount.is_some() {
                return Err((sb, Error::Busy));
            }
            let root_dentry = state.dcache.root();
            if let Some(d) = state.dcache.get_mut(root_dentry) {
                d.bound = Some((id, root_ino));
            }
            state.mounts[slot] = Some(Mount {
                sb,
                fstype: fstype.into(),
                device_name: device_name.into(),
                path: String::from("/"),
                flags,
                parent: None,
                mount_point: None,
                root_dentry,
                refcount: 1,
            });
            state.root_mount = Some(id);
            log::debug!("mounted {device_name} ({fstype}) as root");
            return Ok(());
        }
        let mount_point = match state.resolve(path, &self.stats) {
            Ok(d) => d,
            Err(e) => return Err((sb, e)),
        };
        // resolution crosses mounts, so landing on a mounted root means the
        // path is already a mount point; two mounts may not share one
        let already_mounted = state
            .mounts
            .iter()
            .flatten()
            .any(|m| m.root_dentry == mount_point);
        if already_mounted {
            return Err((sb, Error::Busy));
        }
        let (parent_mount, point_ino) = match state.bound(mount_point) {
            Ok(b) => b,
            Err(e) => return Err((sb, e)),
        };
        match state
            .sb_mut(parent_mount)
            .and_then(|psb| psb.stat_inode(point_ino))
        {
            Ok(meta) if meta.r#type == InodeType::Directory => {}
            Ok(_) => return Err((sb, Error::NotDirectory)),
            Err(e) => return Err((sb, e)),
        }
        let covered = state
            .dcache
            .get(mount_point)
            .is_some_and(|d| d.mounted.is_some());
        if covered {
            // two mounts may not share a mount point
            return Err((sb, Error::Busy));
        }
        let point_parent = state.dcache.get(mount_point).and_then(|d| d.parent);
        let root_dentry = state.dcache.add_detached(point_parent, (id, root_ino));
        if let Some(d) = state.dcache.get_mut(mount_point) {
            d.mounted = Some(id);
        }
        if let Ok(parent) = state.mount_mut(parent_mount) {
            parent.refcount += 1;
        }
        state.mounts[slot] = Some(Mount {
            sb,
            fstype: fstype.into(),
            device_name: device_name.into(),
            path: path.to_string(),
            flags,
            parent: Some(parent_mount),
            mount_point: Some(mount_point),
            root_dentry,
            refcount: 1,
        });
        log::debug!("mounted {device_name} ({fstype}) at {path}");
        Ok(())
    }

    /// Unmount the filesystem whose mount path matches exactly.
    pub fn unmount(&self, path: &str) -> Result<()> {
        let (fstype, sb) = {
            let mut state = self.state.lock();
            let id = state
                .mounts
                .iter()
                .position(|m| m.as_ref().is_some_and(|m| m.path == path))
                .ok_or(Error::NotFound)? as MountId;
            let mount = state.mount_mut(id)?;
            if mount.refcount > 1 || mount.sb.has_open_files() {
                return Err(Error::Busy);
            }
            let mount = state.mounts[id as usize].take().ok_or(Error::NotFound)?;
            if let Some(point) = mount.mount_point {
                if let Some(d) = state.dcache.get_mut(point) {
                    d.mounted = None;
                }
                state.dcache.remove_subtree(mount.root_dentry);
            } else {
                // root mount: no child mounts can exist at refcount 1, so
                // resetting the cache just unbinds the root dentry
                state.root_mount = None;
                state.dcache.clear();
            }
            if let Some(parent) = mount.parent {
                if let Ok(p) = state.mount_mut(parent) {
                    p.refcount = p.refcount.saturating_sub(1);
                }
            }
            (mount.fstype, mount.sb)
        };
        self.types.lock().kill(&fstype, sb);
        log::debug!("unmounted {path}");
        Ok(())
    }

    // ---- files ----

    /// Open `path`, allocating the lowest free descriptor.
    pub fn open(&self, path: &str, flags: OpenFlags, mode: u16) -> Result<FileDescriptor> {
        if !flags.readable() && !flags.writable() {
            return Err(Error::InvalidParameter);
        }
        // descriptor first: exhaustion surfaces before any filesystem work
        let fd = self.fds.lock().alloc().ok_or(Error::NoMemory)?;
        match self.open_inner(path, flags, mode, fd) {
            Ok(file) => {
                self.fds.lock().install(fd, file);
                self.stats.opens.fetch_add(1, Ordering::Relaxed);
                Ok(fd)
            }
            Err(e) => {
                self.fds.lock().release_slot(fd);
                Err(e)
            }
        }
    }

    fn open_inner(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: u16,
        fd: FileDescriptor,
    ) -> Result<OpenFile> {
        let mut state = self.state.lock();
        let mut created = false;
        let dentry = match state.resolve(path, &self.stats) {
            Ok(dentry) => {
                if flags.contains(OpenFlags::CREAT | OpenFlags::EXCL) {
                    return Err(Error::Exists);
                }
                dentry
            }
            Err(Error::NotFound) if flags.contains(OpenFlags::CREAT) => {
                let (parent, mount_id, parent_ino, name) =
                    state.resolve_parent(path, &self.stats)?;
                state.check_writable(mount_id)?;
                let inode = state.sb_mut(mount_id)?.create(parent_ino, name, fd)?;
                created = true;
                state.dcache.add_child(parent, name, (mount_id, inode))
            }
            Err(e) => return Err(e),
        };
        let (mount_id, inode) = state.bound(dentry)?;
        if flags.writable() {
            state.check_writable(mount_id)?;
        }
        if !created {
            state.sb_mut(mount_id)?.open(inode, fd)?;
        }
        // from here on the descriptor is open in the superblock; unwind on
        // any refused flag combination
        let checks = (|| -> Result<bool> {
            let meta = state.sb_mut(mount_id)?.stat_fd(fd)?;
            let is_dir = meta.r#type == InodeType::Directory;
            if flags.contains(OpenFlags::DIRECTORY) && !is_dir {
                return Err(Error::NotDirectory);
            }
            if is_dir && flags.writable() {
                return Err(Error::IsDirectory);
            }
            if flags.contains(OpenFlags::TRUNC) && flags.writable() && !is_dir {
                state.sb_mut(mount_id)?.truncate(fd, 0)?;
            }
            Ok(is_dir)
        })();
        let is_dir = match checks {
            Ok(is_dir) => is_dir,
            Err(e) => {
                if let Ok(sb) = state.sb_mut(mount_id) {
                    let _ = sb.close(fd);
                }
                return Err(e);
            }
        };
        state.dcache.inc_ref(dentry);
        if let Ok(mount) = state.mount_mut(mount_id) {
            mount.refcount += 1;
        }
        Ok(OpenFile {
            mount: mount_id,
            dentry,
            inode,
            flags,
            mode,
            pos: 0,
            pid: 0,
            is_dir,
        })
    }

    pub fn close(&self, fd: FileDescriptor) -> Result<()> {
        let file = self.fds.lock().take(fd)?;
        let mut state = self.state.lock();
        let result = state.sb_mut(file.mount)?.close(fd);
        state.dcache.dec_ref(file.dentry);
        if let Ok(mount) = state.mount_mut(file.mount) {
            mount.refcount = mount.refcount.saturating_sub(1);
        }
        self.stats.closes.fetch_add(1, Ordering::Relaxed);
        result
    }

    pub fn read(&self, fd: FileDescriptor, buf: &mut [u8]) -> Result<usize> {
        let mut fds = self.fds.lock();
        let file = fds.get_mut(fd)?;
        if !file.flags.readable() {
            return Err(Error::Permission);
        }
        if file.is_dir {
            return Err(Error::IsDirectory);
        }
        let mut state = self.state.lock();
        let n = state.sb_mut(file.mount)?.read(fd, file.pos, buf)?;
        file.pos += n as u64;
        self.stats.reads.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    pub fn write(&self, fd: FileDescriptor, buf: &[u8]) -> Result<usize> {
        let mut fds = self.fds.lock();
        let file = fds.get_mut(fd)?;
        if !file.flags.writable() {
            return Err(Error::Permission);
        }
        if file.is_dir {
            return Err(Error::IsDirectory);
        }
        let mut state = self.state.lock();
        if file.flags.contains(OpenFlags::APPEND) {
            file.pos = state.sb_mut(file.mount)?.stat_fd(fd)?.size;
        }
        let n = state.sb_mut(file.mount)?.write(fd, file.pos, buf)?;
        file.pos += n as u64;
        self.stats.writes.fetch_add(1, Ordering::Relaxed);
        self.stats
            .bytes_written
            .fetch_add(n as u64, Ordering::Relaxed);
        if file.flags.contains(OpenFlags::SYNC) {
            state.sb_mut(file.mount)?.sync()?;
        }
        Ok(n)
    }

    /// Reposition a descriptor. No bounds are enforced beyond the result
    /// being non-negative; reads past EOF simply return 0.
    pub fn lseek(&self, fd: FileDescriptor, offset: i64, whence: SeekFrom) -> Result<i64> {
        let mut fds = self.fds.lock();
        let file = fds.get_mut(fd)?;
        let base = match whence {
            SeekFrom::Set => 0,
            SeekFrom::Cur => file.pos as i64,
            SeekFrom::End => {
                let mut state = self.state.lock();
                state.sb_mut(file.mount)?.stat_fd(fd)?.size as i64
            }
        };
        let target = base.checked_add(offset).ok_or(Error::InvalidParameter)?;
        file.pos = u64::try_from(target).map_err(|_| Error::InvalidParameter)?;
        Ok(target)
    }

    // ---- directories ----

    pub fn mkdir(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock();
        let (parent, mount_id, parent_ino, name) = state.resolve_parent(path, &self.stats)?;
        state.check_writable(mount_id)?;
        let inode = state.sb_mut(mount_id)?.mkdir(parent_ino, name)?;
        state.dcache.add_child(parent, name, (mount_id, inode));
        Ok(())
    }

    pub fn rmdir(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock();
        let (parent, mount_id, parent_ino, name) = state.resolve_parent(path, &self.stats)?;
        state.check_writable(mount_id)?;
        if let Some(child) = state.dcache.child(parent, name) {
            let covered = state.dcache.get(child).is_some_and(|d| d.mounted.is_some());
            let held = state.dcache.get(child).map_or(0, |d| d.refcount);
            if covered || held > 0 {
                return Err(Error::Busy);
            }
        }
        state.sb_mut(mount_id)?.rmdir(parent_ino, name)?;
        state.dcache.remove_child(parent, name);
        Ok(())
    }

    pub fn unlink(&self, path: &str) -> Result<()> {
        let mut state = self.state.lock();
        let (parent, mount_id, parent_ino, name) = state.resolve_parent(path, &self.stats)?;
        state.check_writable(mount_id)?;
        state.sb_mut(mount_id)?.unlink(parent_ino, name)?;
        state.dcache.remove_child(parent, name);
        Ok(())
    }

    /// Open a directory for [`Vfs::readdir`].
    pub fn opendir(&self, path: &str) -> Result<FileDescriptor> {
        self.open(path, OpenFlags::RDONLY | OpenFlags::DIRECTORY, 0)
    }

    /// Stream one directory entry per call, advancing the descriptor's
    /// position; `None` once the listing is exhausted.
    pub fn readdir(&self, fd: FileDescriptor) -> Result<Option<OwnedDirEntry>> {
        let mut fds = self.fds.lock();
        let file = fds.get_mut(fd)?;
        if !file.is_dir {
            return Err(Error::NotDirectory);
        }
        let mut state = self.state.lock();
        let entry = state.sb_mut(file.mount)?.readdir_at(fd, file.pos)?;
        if entry.is_some() {
            file.pos += 1;
        }
        Ok(entry)
    }

    pub fn closedir(&self, fd: FileDescriptor) -> Result<()> {
        self.close(fd)
    }

    // ---- metadata ----

    pub fn stat(&self, path: &str) -> Result<Metadata> {
        let mut state = self.state.lock();
        let dentry = state.resolve(path, &self.stats)?;
        let (mount_id, inode) = state.bound(dentry)?;
        state.sb_mut(mount_id)?.stat_inode(inode)
    }

    pub fn fstat(&self, fd: FileDescriptor) -> Result<Metadata> {
        let mut fds = self.fds.lock();
        let file = fds.get_mut(fd)?;
        let mut state = self.state.lock();
        state.sb_mut(file.mount)?.stat_fd(fd)
    }

    /// Record new permission bits. Only the write-protection half reaches
    /// disk where the filesystem can express it.
    pub fn chmod(&self, path: &str, mode: u16) -> Result<()> {
        let mut state = self.state.lock();
        let dentry = state.resolve(path, &self.stats)?;
        let (mount_id, inode) = state.bound(dentry)?;
        state.check_writable(mount_id)?;
        let readonly = mode & 0o200 == 0;
        state.sb_mut(mount_id)?.set_readonly(inode, readonly)
    }

    /// Flush every mounted filesystem; keeps going past individual failures.
    pub fn sync(&self) -> Result<()> {
        let mut state = self.state.lock();
        let mut result = Ok(());
        for slot in 0..state.mounts.len() {
            if state.mounts[slot].is_some() {
                let r = state.sb_mut(slot as MountId).and_then(|sb| sb.sync());
                result = result.and(r);
            }
        }
        result
    }

    /// Number of live descriptors.
    pub fn open_file_count(&self) -> usize {
        self.fds.lock().live()
    }

    /// Snapshot of the active mounts.
    pub fn mounts(&self) -> Vec<MountInfo> {
        let state = self.state.lock();
        state
            .mounts
            .iter()
            .flatten()
            .map(|m| MountInfo {
                device: m.device_name.clone(),
                path: m.path.clone(),
                fstype: m.fstype.clone(),
                flags: m.flags,
            })
            .collect()
    }
}

/// One row of the mount table, as reported to callers.
#[derive(Debug, Clone)]
pub struct MountInfo {
    pub device: String,
    pub path: String,
    pub fstype: String,
    pub flags: MountFlags,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block::ramdisk::{ram_disk, SharedRamDisk};
    use crate::block::{Block, BLOCK_SECTOR_SIZE};
    use crate::fs::fat::format::{format, FormatOptions};
    use crate::fs::fat::FatFilesystemType;
    use crate::fs::superblock::SuperblockOps;
    use crate::vfs::InodeType;

    const DISK_SECTORS: u32 = 16384;

    fn fat_disk(name: &str) -> Block {
        let mut disk = ram_disk(name, DISK_SECTORS);
        format(&mut disk, &FormatOptions::fat16(1, 512, 64)).unwrap();
        disk
    }

    fn new_vfs() -> Vfs {
        let vfs = Vfs::new();
        vfs.register_filesystem(Box::new(FatFilesystemType)).unwrap();
        vfs
    }

    fn mounted_vfs() -> Vfs {
        let vfs = new_vfs();
        vfs.mount(fat_disk("rd0"), "/", "fat", MountFlags::empty())
            .unwrap();
        vfs
    }

    fn create_file(vfs: &Vfs, path: &str, contents: &[u8]) {
        let fd = vfs
            .open(path, OpenFlags::RDWR | OpenFlags::CREAT, 0o644)
            .unwrap();
        let mut remaining = contents;
        while !remaining.is_empty() {
            let n = vfs.write(fd, remaining).unwrap();
            assert!(n > 0);
            remaining = &remaining[n..];
        }
        vfs.close(fd).unwrap();
    }

    fn read_to_end(vfs: &Vfs, path: &str) -> Vec<u8> {
        let fd = vfs.open(path, OpenFlags::RDONLY, 0).unwrap();
        // odd buffer size to exercise reads crossing cluster boundaries
        let mut buf = [0u8; 37];
        let mut out = Vec::new();
        loop {
            let n = vfs.read(fd, &mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        vfs.close(fd).unwrap();
        out
    }

    /// Scenario: a prebuilt volume carrying TEST.TXT ("Hello, World!",
    /// first cluster 2, size 13) mounts and reads back exactly.
    #[test]
    fn mount_and_read_prebuilt_file() {
        let mut disk = fat_disk("rd0");
        // geometry of fat_disk: 1 reserved, 2 FATs x 64 sectors, 32 root
        // sectors; root region at 129, data region at 161
        let mut dirent = [0u8; 32];
        dirent[..11].copy_from_slice(b"TEST    TXT");
        dirent[11] = 0x20;
        dirent[26..28].copy_from_slice(&2u16.to_le_bytes());
        dirent[28..32].copy_from_slice(&13u32.to_le_bytes());
        let mut sector = [0u8; BLOCK_SECTOR_SIZE];
        disk.read(129, &mut sector).unwrap();
        sector[..32].copy_from_slice(&dirent);
        disk.write(129, &sector).unwrap();
        // terminate cluster 2 in both FAT copies
        for fat_start in [1u32, 65] {
            disk.read(fat_start, &mut sector).unwrap();
            sector[4..6].copy_from_slice(&0xFFFFu16.to_le_bytes());
            disk.write(fat_start, &sector).unwrap();
        }
        sector = [0u8; BLOCK_SECTOR_SIZE];
        sector[..13].copy_from_slice(b"Hello, World!");
        disk.write(161, &sector).unwrap();

        let vfs = new_vfs();
        vfs.mount(disk, "/", "fat", MountFlags::empty()).unwrap();
        let fd = vfs.open("/TEST.TXT", OpenFlags::RDONLY, 0).unwrap();
        let mut buf = [0u8; 32];
        assert_eq!(vfs.read(fd, &mut buf).unwrap(), 13);
        assert_eq!(&buf[..13], b"Hello, World!");
        assert_eq!(vfs.read(fd, &mut buf).unwrap(), 0);
        vfs.close(fd).unwrap();
    }

    #[test]
    fn registry_names_are_unique_and_busy_while_mounted() {
        struct DummyFs(&'static str);
        impl FilesystemType for DummyFs {
            fn name(&self) -> &str {
                self.0
            }
            fn mount(&self, _device: Block, _flags: MountFlags) -> Result<Box<dyn SuperblockOps>> {
                Err(Error::Unsupported)
            }
        }
        let vfs = new_vfs();
        vfs.register_filesystem(Box::new(DummyFs("alpha"))).unwrap();
        vfs.register_filesystem(Box::new(DummyFs("beta"))).unwrap();
        assert_eq!(
            vfs.register_filesystem(Box::new(DummyFs("alpha"))),
            Err(Error::Exists)
        );
        vfs.mount(fat_disk("rd0"), "/", "fat", MountFlags::empty())
            .unwrap();
        assert_eq!(vfs.unregister_filesystem("fat"), Err(Error::Busy));
        vfs.unmount("/").unwrap();
        vfs.unregister_filesystem("fat").unwrap();
        vfs.unregister_filesystem("alpha").unwrap();
        assert_eq!(vfs.unregister_filesystem("alpha"), Err(Error::NotFound));
    }

    #[test]
    fn mount_requires_registered_type() {
        let vfs = Vfs::new();
        assert_eq!(
            vfs.mount(fat_disk("rd0"), "/", "fat", MountFlags::empty()),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn corrupt_volume_does_not_mount() {
        let vfs = new_vfs();
        let mut disk = fat_disk("rd0");
        let mut boot = [0u8; BLOCK_SECTOR_SIZE];
        disk.read(0, &mut boot).unwrap();
        boot[510] = 0x34;
        boot[511] = 0x12;
        disk.write(0, &boot).unwrap();
        assert!(matches!(
            vfs.mount(disk, "/", "fat", MountFlags::empty()),
            Err(Error::Io(_))
        ));
        assert!(vfs.mounts().is_empty());
        assert_eq!(vfs.open_file_count(), 0);
    }

    #[test]
    fn descriptor_exhaustion_and_reuse() {
        let vfs = mounted_vfs();
        create_file(&vfs, "/f.txt", b"x");
        let mut fds = Vec::new();
        for _ in 0..MAX_OPEN_FILES {
            fds.push(vfs.open("/f.txt", OpenFlags::RDONLY, 0).unwrap());
        }
        assert_eq!(
            vfs.open("/f.txt", OpenFlags::RDONLY, 0),
            Err(Error::NoMemory)
        );
        let victim = fds[5];
        vfs.close(victim).unwrap();
        assert_eq!(vfs.open("/f.txt", OpenFlags::RDONLY, 0).unwrap(), victim);
        for fd in fds {
            vfs.close(fd).unwrap();
        }
        assert_eq!(vfs.open_file_count(), 0);
    }

    #[test]
    fn open_close_balance() {
        let vfs = mounted_vfs();
        let before = vfs.open_file_count();
        create_file(&vfs, "/a.txt", b"data");
        for _ in 0..10 {
            let fd = vfs.open("/a.txt", OpenFlags::RDONLY, 0).unwrap();
            vfs.close(fd).unwrap();
        }
        assert_eq!(vfs.open_file_count(), before);
    }

    #[test]
    fn write_then_read_round_trip() {
        let vfs = mounted_vfs();
        // three and a half 512-byte clusters
        let data: Vec<u8> = (0..1800u32).map(|i| (i % 251) as u8).collect();
        create_file(&vfs, "/blob.bin", &data);
        assert_eq!(read_to_end(&vfs, "/blob.bin"), data);
        let meta = vfs.stat("/blob.bin").unwrap();
        assert_eq!(meta.size, 1800);
        assert_eq!(meta.r#type, InodeType::Regular);
    }

    #[test]
    fn reads_are_deterministic_after_seek() {
        let vfs = mounted_vfs();
        create_file(&vfs, "/seek.txt", b"abcdefghij");
        let fd = vfs.open("/seek.txt", OpenFlags::RDONLY, 0).unwrap();
        let mut first = [0u8; 4];
        let mut second = [0u8; 4];
        vfs.lseek(fd, 0, SeekFrom::Set).unwrap();
        vfs.read(fd, &mut first).unwrap();
        vfs.lseek(fd, 0, SeekFrom::Set).unwrap();
        vfs.read(fd, &mut second).unwrap();
        assert_eq!(first, second);
        assert_eq!(vfs.lseek(fd, -2, SeekFrom::End).unwrap(), 8);
        let mut tail = [0u8; 8];
        assert_eq!(vfs.read(fd, &mut tail).unwrap(), 2);
        assert_eq!(&tail[..2], b"ij");
        assert_eq!(vfs.lseek(fd, -1, SeekFrom::Set), Err(Error::InvalidParameter));
        vfs.close(fd).unwrap();
    }

    #[test]
    fn overwrite_in_place_keeps_size() {
        let vfs = mounted_vfs();
        create_file(&vfs, "/w.txt", b"0123456789");
        let fd = vfs.open("/w.txt", OpenFlags::RDWR, 0).unwrap();
        vfs.lseek(fd, 2, SeekFrom::Set).unwrap();
        assert_eq!(vfs.write(fd, b"XY").unwrap(), 2);
        vfs.close(fd).unwrap();
        assert_eq!(read_to_end(&vfs, "/w.txt"), b"01XY456789");
    }

    #[test]
    fn writes_extend_the_cluster_chain() {
        let vfs = mounted_vfs();
        create_file(&vfs, "/grow.bin", b"");
        let fd = vfs.open("/grow.bin", OpenFlags::RDWR, 0).unwrap();
        let chunk = [0xA5u8; 700];
        assert_eq!(vfs.write(fd, &chunk).unwrap(), 700);
        assert_eq!(vfs.write(fd, &chunk).unwrap(), 700);
        vfs.close(fd).unwrap();
        let back = read_to_end(&vfs, "/grow.bin");
        assert_eq!(back.len(), 1400);
        assert!(back.iter().all(|&b| b == 0xA5));
    }

    #[test]
    fn sparse_gap_reads_back_as_zeroes() {
        let vfs = mounted_vfs();
        create_file(&vfs, "/gap.bin", b"head");
        let fd = vfs.open("/gap.bin", OpenFlags::RDWR, 0).unwrap();
        vfs.lseek(fd, 1000, SeekFrom::Set).unwrap();
        vfs.write(fd, b"tail").unwrap();
        vfs.close(fd).unwrap();
        let back = read_to_end(&vfs, "/gap.bin");
        assert_eq!(back.len(), 1004);
        assert_eq!(&back[..4], b"head");
        assert!(back[4..1000].iter().all(|&b| b == 0));
        assert_eq!(&back[1000..], b"tail");
    }

    #[test]
    fn append_and_truncate() {
        let vfs = mounted_vfs();
        create_file(&vfs, "/log.txt", b"one\n");
        let fd = vfs
            .open("/log.txt", OpenFlags::RDWR | OpenFlags::APPEND, 0)
            .unwrap();
        vfs.write(fd, b"two\n").unwrap();
        vfs.close(fd).unwrap();
        assert_eq!(read_to_end(&vfs, "/log.txt"), b"one\ntwo\n");
        let fd = vfs
            .open("/log.txt", OpenFlags::RDWR | OpenFlags::TRUNC, 0)
            .unwrap();
        assert_eq!(vfs.fstat(fd).unwrap().size, 0);
        vfs.close(fd).unwrap();
        assert_eq!(read_to_end(&vfs, "/log.txt"), b"");
    }

    #[test]
    fn exclusive_create_refuses_existing() {
        let vfs = mounted_vfs();
        create_file(&vfs, "/once.txt", b"x");
        assert_eq!(
            vfs.open(
                "/once.txt",
                OpenFlags::RDWR | OpenFlags::CREAT | OpenFlags::EXCL,
                0
            ),
            Err(Error::Exists)
        );
        let n = vfs.open_file_count();
        assert_eq!(n, 0);
    }

    #[test]
    fn directories_create_list_remove() {
        let vfs = mounted_vfs();
        vfs.mkdir("/docs").unwrap();
        create_file(&vfs, "/docs/a.txt", b"a");
        create_file(&vfs, "/docs/b.txt", b"bb");
        let fd = vfs.opendir("/docs").unwrap();
        let mut names = Vec::new();
        while let Some(entry) = vfs.readdir(fd).unwrap() {
            names.push(entry.name.into_owned());
        }
        vfs.closedir(fd).unwrap();
        names.sort();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert_eq!(vfs.rmdir("/docs"), Err(Error::Busy));
        vfs.unlink("/docs/a.txt").unwrap();
        vfs.unlink("/docs/b.txt").unwrap();
        vfs.rmdir("/docs").unwrap();
        assert!(matches!(vfs.stat("/docs"), Err(Error::NotFound)));
    }

    #[test]
    fn dot_components_resolve() {
        let vfs = mounted_vfs();
        vfs.mkdir("/a").unwrap();
        vfs.mkdir("/a/b").unwrap();
        create_file(&vfs, "/a/b/f.txt", b"deep");
        assert_eq!(read_to_end(&vfs, "/a/./b/../b/f.txt"), b"deep");
        assert_eq!(read_to_end(&vfs, "a/b/f.txt"), b"deep");
        assert_eq!(vfs.stat("/..").unwrap().r#type, InodeType::Directory);
    }

    #[test]
    fn type_mismatches_are_rejected() {
        let vfs = mounted_vfs();
        create_file(&vfs, "/plain.txt", b"x");
        vfs.mkdir("/dir").unwrap();
        assert_eq!(
            vfs.open("/plain.txt", OpenFlags::RDONLY | OpenFlags::DIRECTORY, 0),
            Err(Error::NotDirectory)
        );
        assert_eq!(
            vfs.open("/dir", OpenFlags::RDWR, 0),
            Err(Error::IsDirectory)
        );
        let fd = vfs.opendir("/dir").unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(vfs.read(fd, &mut buf), Err(Error::IsDirectory));
        vfs.close(fd).unwrap();
        let fd = vfs.open("/plain.txt", OpenFlags::RDONLY, 0).unwrap();
        assert_eq!(vfs.write(fd, b"y"), Err(Error::Permission));
        assert!(matches!(vfs.readdir(fd), Err(Error::NotDirectory)));
        vfs.close(fd).unwrap();
    }

    #[test]
    fn chmod_persists_readonly_bit() {
        let vfs = mounted_vfs();
        create_file(&vfs, "/ro.txt", b"x");
        assert_eq!(vfs.stat("/ro.txt").unwrap().mode, 0o644);
        vfs.chmod("/ro.txt", 0o444).unwrap();
        assert_eq!(vfs.stat("/ro.txt").unwrap().mode, 0o444);
        vfs.chmod("/ro.txt", 0o644).unwrap();
        assert_eq!(vfs.stat("/ro.txt").unwrap().mode, 0o644);
    }

    #[test]
    fn readonly_mount_refuses_writes() {
        // place one file, tear the volume down, remount it read-only
        let store = SharedRamDisk::new(DISK_SECTORS);
        let mut block = Block::new("rd0", DISK_SECTORS, Box::new(store.handle()));
        format(&mut block, &FormatOptions::fat16(1, 512, 64)).unwrap();
        {
            let rw = new_vfs();
            rw.mount(block, "/", "fat", MountFlags::empty()).unwrap();
            create_file(&rw, "/keep.txt", b"data");
            rw.unmount("/").unwrap();
        }
        let vfs = new_vfs();
        let block = Block::new("rd0", DISK_SECTORS, Box::new(store.handle()));
        vfs.mount(block, "/", "fat", MountFlags::RDONLY).unwrap();
        assert_eq!(read_to_end(&vfs, "/keep.txt"), b"data");
        assert_eq!(
            vfs.open("/new.txt", OpenFlags::RDWR | OpenFlags::CREAT, 0),
            Err(Error::ReadOnly)
        );
        assert_eq!(
            vfs.open("/keep.txt", OpenFlags::RDWR, 0),
            Err(Error::ReadOnly)
        );
        assert_eq!(vfs.mkdir("/d"), Err(Error::ReadOnly));
        assert_eq!(vfs.unlink("/keep.txt"), Err(Error::ReadOnly));
    }

    #[test]
    fn data_survives_remount() {
        let store = SharedRamDisk::new(DISK_SECTORS);
        let mut block = Block::new("rd0", DISK_SECTORS, Box::new(store.handle()));
        format(&mut block, &FormatOptions::fat16(1, 512, 64)).unwrap();
        let vfs = new_vfs();
        vfs.mount(block, "/", "fat", MountFlags::empty()).unwrap();
        let payload: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 256) as u8).collect();
        create_file(&vfs, "/persist.bin", &payload);
        vfs.mkdir("/sub").unwrap();
        create_file(&vfs, "/sub/inner.txt", b"inner");
        vfs.unmount("/").unwrap();

        let block = Block::new("rd0", DISK_SECTORS, Box::new(store.handle()));
        vfs.mount(block, "/", "fat", MountFlags::empty()).unwrap();
        assert_eq!(read_to_end(&vfs, "/persist.bin"), payload);
        assert_eq!(read_to_end(&vfs, "/sub/inner.txt"), b"inner");
    }

    #[test]
    fn nested_mounts_and_busy_unmount() {
        let vfs = mounted_vfs();
        vfs.mkdir("/mnt").unwrap();
        vfs.mount(fat_disk("rd1"), "/mnt", "fat", MountFlags::empty())
            .unwrap();
        assert_eq!(vfs.mounts().len(), 2);
        create_file(&vfs, "/mnt/inner.txt", b"inside");
        assert_eq!(read_to_end(&vfs, "/mnt/inner.txt"), b"inside");
        // a second mount over the same point is refused
        assert_eq!(
            vfs.mount(fat_disk("rd2"), "/mnt", "fat", MountFlags::empty()),
            Err(Error::Busy)
        );
        // the parent cannot go while a child mount exists
        assert_eq!(vfs.unmount("/"), Err(Error::Busy));
        let fd = vfs.open("/mnt/inner.txt", OpenFlags::RDONLY, 0).unwrap();
        assert_eq!(vfs.unmount("/mnt"), Err(Error::Busy));
        vfs.close(fd).unwrap();
        vfs.unmount("/mnt").unwrap();
        // the file now underneath belongs to the parent volume again
        assert!(matches!(vfs.stat("/mnt/inner.txt"), Err(Error::NotFound)));
        vfs.unmount("/").unwrap();
    }

    #[test]
    fn unlink_of_open_file_is_busy() {
        let vfs = mounted_vfs();
        create_file(&vfs, "/held.txt", b"x");
        let fd = vfs.open("/held.txt", OpenFlags::RDONLY, 0).unwrap();
        assert_eq!(vfs.unlink("/held.txt"), Err(Error::Busy));
        vfs.close(fd).unwrap();
        vfs.unlink("/held.txt").unwrap();
        assert!(matches!(vfs.stat("/held.txt"), Err(Error::NotFound)));
    }

    #[test]
    fn stats_count_bytes() {
        let vfs = mounted_vfs();
        create_file(&vfs, "/c.txt", b"12345678");
        let before = vfs.stats.bytes_read.load(Ordering::Relaxed);
        assert_eq!(read_to_end(&vfs, "/c.txt").len(), 8);
        let after = vfs.stats.bytes_read.load(Ordering::Relaxed);
        assert_eq!(after - before, 8);
        assert!(vfs.stats.bytes_written.load(Ordering::Relaxed) >= 8);
    }

    #[test]
    fn shutdown_closes_and_unmounts_everything() {
        let vfs = mounted_vfs();
        create_file(&vfs, "/f.txt", b"x");
        let _fd = vfs.open("/f.txt", OpenFlags::RDONLY, 0).unwrap();
        vfs.mkdir("/m").unwrap();
        vfs.mount(fat_disk("rd1"), "/m", "fat", MountFlags::empty())
            .unwrap();
        vfs.shutdown();
        assert_eq!(vfs.open_file_count(), 0);
        assert!(vfs.mounts().is_empty());
        // repeated init is a no-op and succeeds
        vfs.init().unwrap();
        vfs.init().unwrap();
        vfs.mount(fat_disk("rd0"), "/", "fat", MountFlags::empty())
            .unwrap();
        assert_eq!(vfs.stat("/").unwrap().r#type, InodeType::Directory);
    }

    #[test]
    fn global_instance_is_usable() {
        let name = "global-test-fs";
        struct DummyFs;
        impl FilesystemType for DummyFs {
            fn name(&self) -> &str {
                "global-test-fs"
            }
            fn mount(&self, _device: Block, _flags: MountFlags) -> Result<Box<dyn SuperblockOps>> {
                Err(Error::Unsupported)
            }
        }
        vfs().register_filesystem(Box::new(DummyFs)).unwrap();
        assert_eq!(
            vfs().register_filesystem(Box::new(DummyFs)),
            Err(Error::Exists)
        );
        vfs().unregister_filesystem(name).unwrap();
    }

    #[test]
    fn fat32_volume_round_trip() {
        let vfs = new_vfs();
        let mut disk = ram_disk("rd0", 131072);
        format(&mut disk, &FormatOptions::fat32(1, 1024)).unwrap();
        vfs.mount(disk, "/", "fat", MountFlags::empty()).unwrap();
        vfs.mkdir("/d").unwrap();
        let data: Vec<u8> = (0..3000u32).map(|i| (i % 199) as u8).collect();
        create_file(&vfs, "/d/file.bin", &data);
        assert_eq!(read_to_end(&vfs, "/d/file.bin"), data);
        let meta = vfs.stat("/d").unwrap();
        assert_eq!(meta.r#type, InodeType::Directory);
        vfs.unmount("/").unwrap();
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}
