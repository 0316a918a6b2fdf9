use crate::block::Block;
use crate::fs::fs_manager::MountFlags;
use crate::fs::superblock::SuperblockOps;
use crate::vfs::{Error, Result};
use alloc::boxed::Box;
use alloc::vec::Vec;

/// A registrable filesystem type: an immutable descriptor with a mount
/// routine producing superblocks and a kill routine tearing them down.
pub trait FilesystemType: Send + Sync {
    /// Unique registry key.
    fn name(&self) -> &str;

    /// Build a superblock from a device. The device handle is the opaque
    /// driver data of the mount call.
    fn mount(&self, device: Block, flags: MountFlags) -> Result<Box<dyn SuperblockOps>>;

    /// Tear down a superblock produced by [`FilesystemType::mount`]. The
    /// default flushes and lets the caller drop it.
    fn kill(&self, sb: &mut dyn SuperblockOps) {
        if let Err(e) = sb.sync() {
            log::warn!("sync failed while killing superblock: {e}");
        }
    }
}

struct RegisteredType {
    ty: Box<dyn FilesystemType>,
    /// Count of live superblocks produced by this type; unregistration is
    /// refused while non-zero.
    live_superblocks: u32,
}

/// The filesystem-type registry, keyed by unique name.
pub struct Registry {
    types: Vec<RegisteredType>,
}

impl Registry {
    pub const fn new() -> Self {
        Registry { types: Vec::new() }
    }

    pub fn register(&mut self, ty: Box<dyn FilesystemType>) -> Result<()> {
        if self.types.iter().any(|t| t.ty.name() == ty.name()) {
            return Err(Error::Exists);
        }
        log::debug!("registered filesystem type {:?}", ty.name());
        self.types.push(RegisteredType {
            ty,
            live_superblocks: 0,
        });
        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Result<()> {
        let index = self
            .types
            .iter()
            .position(|t| t.ty.name() == name)
            .ok_or(Error::NotFound)?;
        if self.types[index].live_superblocks > 0 {
            return Err(Error::Busy);
        }
        self.types.remove(index);
        Ok(())
    }

    /// Invoke a type's mount routine, bumping its live-superblock count on
    /// success.
    pub fn mount(
        &mut self,
        name: &str,
        device: Block,
        flags: MountFlags,
    ) -> Result<Box<dyn SuperblockOps>> {
        let entry = self
            .types
            .iter_mut()
            .find(|t| t.ty.name() == name)
            .ok_or(Error::NotFound)?;
        let sb = entry.ty.mount(device, flags)?;
        entry.live_superblocks += 1;
        Ok(sb)
    }

    /// Invoke a type's kill routine and drop the superblock.
    pub fn kill(&mut self, name: &str, mut sb: Box<dyn SuperblockOps>) {
        if let Some(entry) = self.types.iter_mut().find(|t| t.ty.name() == name) {
            entry.ty.kill(sb.as_mut());
            entry.live_superblocks = entry.live_superblocks.saturating_sub(1);
        }
        drop(sb);
    }

    pub fn live_superblocks(&self, name: &str) -> Option<u32> {
        self.types
            .iter()
            .find(|t| t.ty.name() == name)
            .map(|t| t.live_superblocks)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
