pub mod dcache;
pub mod fat;
pub mod fs_manager;
pub mod registry;
pub mod superblock;

/// A file descriptor: a small non-negative integer index into the global
/// descriptor table.
pub type FileDescriptor = i32;

/// Identifies one active mount.
pub type MountId = u16;
