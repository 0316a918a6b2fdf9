use crate::fs::MountId;
use crate::vfs::INodeNum;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// Index of a dentry in the cache slab.
pub type DentryId = u32;

/// A cached (name, parent, inode) triple in the path-resolution tree.
///
/// Parent links are slab indices rather than owning pointers, so the
/// up/down/sibling graph stays a plain tree with no reference cycles; the
/// root carries the explicit no-parent tag instead of pointing at itself.
#[derive(Debug)]
pub struct Dentry {
    pub name: String,
    pub parent: Option<DentryId>,
    pub children: BTreeMap<String, DentryId>,
    /// The (mount, inode) this name resolves to; `None` while negative
    /// (unbound during lookup, or the root before the first mount)
    pub bound: Option<(MountId, INodeNum)>,
    /// Held by open files and mount records
    pub refcount: usize,
    /// Set when another filesystem is mounted over this dentry; lookups
    /// crossing it continue from the mounted root
    pub mounted: Option<MountId>,
}

/// The dentry tree, stored as a slab so back references are indices.
pub struct DentryCache {
    entries: BTreeMap<DentryId, Dentry>,
    next: DentryId,
    root: DentryId,
}

impl DentryCache {
    /// An empty cache holding only the root dentry `/`.
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            0,
            Dentry {
                name: String::from("/"),
                parent: None,
                children: BTreeMap::new(),
                bound: None,
                refcount: 0,
                mounted: None,
            },
        );
        DentryCache {
            entries,
            next: 1,
            root: 0,
        }
    }

    pub fn root(&self) -> DentryId {
        self.root
    }

    pub fn get(&self, id: DentryId) -> Option<&Dentry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: DentryId) -> Option<&mut Dentry> {
        self.entries.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a bound child under `parent`, replacing any stale entry of the
    /// same name.
    pub fn add_child(
        &mut self,
        parent: DentryId,
        name: &str,
        bound: (MountId, INodeNum),
    ) -> DentryId {
        if let Some(&existing) = self
            .entries
            .get(&parent)
            .and_then(|p| p.children.get(name))
        {
            if let Some(dentry) = self.entries.get_mut(&existing) {
                dentry.bound = Some(bound);
            }
            return existing;
        }
        let id = self.next;
        self.next += 1;
        self.entries.insert(
            id,
            Dentry {
                name: String::from(name),
                parent: Some(parent),
                children: BTreeMap::new(),
                bound: Some(bound),
                refcount: 0,
                mounted: None,
            },
        );
        if let Some(p) = self.entries.get_mut(&parent) {
            p.children.insert(String::from(name), id);
        }
        id
    }

    /// Insert a dentry that is *not* listed among its parent's children:
    /// the root of a mounted filesystem. Its parent link exists purely so
    /// `..` escapes the mount; the mount-point dentry keeps its own name.
    pub fn add_detached(
        &mut self,
        parent: Option<DentryId>,
        bound: (MountId, INodeNum),
    ) -> DentryId {
        let id = self.next;
        self.next += 1;
        self.entries.insert(
            id,
            Dentry {
                name: String::from("/"),
                parent,
                children: BTreeMap::new(),
                bound: Some(bound),
                refcount: 0,
                mounted: None,
            },
        );
        id
    }

    /// Look up a cached child by name.
    pub fn child(&self, parent: DentryId, name: &str) -> Option<DentryId> {
        self.entries.get(&parent)?.children.get(name).copied()
    }

    /// Drop one name from the cache along with everything below it.
    pub fn remove_child(&mut self, parent: DentryId, name: &str) {
        let Some(id) = self
            .entries
            .get_mut(&parent)
            .and_then(|p| p.children.remove(name))
        else {
            return;
        };
        self.remove_subtree(id);
    }

    /// Remove a dentry and its whole subtree from the slab (the parent's
    /// child link must already be gone, or be removed by the caller).
    pub fn remove_subtree(&mut self, id: DentryId) {
        let mut stack = Vec::from([id]);
        while let Some(id) = stack.pop() {
            if let Some(dentry) = self.entries.remove(&id) {
                stack.extend(dentry.children.values().copied());
            }
        }
    }

    pub fn inc_ref(&mut self, id: DentryId) {
        if let Some(dentry) = self.entries.get_mut(&id) {
            dentry.refcount += 1;
        }
    }

    pub fn dec_ref(&mut self, id: DentryId) {
        if let Some(dentry) = self.entries.get_mut(&id) {
            dentry.refcount = dentry.refcount.saturating_sub(1);
        }
    }

    /// Reset to the post-init state: just the unbound root.
    pub fn clear(&mut self) {
        *self = DentryCache::new();
    }
}

impl Default for DentryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn root_has_no_parent() {
        let cache = DentryCache::new();
        let root = cache.get(cache.root()).unwrap();
        assert_eq!(root.name, "/");
        assert!(root.parent.is_none());
        assert!(root.bound.is_none());
    }

    #[test]
    fn add_and_find_children() {
        let mut cache = DentryCache::new();
        let root = cache.root();
        let a = cache.add_child(root, "a", (0, 5));
        let b = cache.add_child(a, "b", (0, 6));
        assert_eq!(cache.child(root, "a"), Some(a));
        assert_eq!(cache.child(a, "b"), Some(b));
        assert_eq!(cache.get(b).unwrap().parent, Some(a));
        // re-adding rebinds rather than duplicating
        let a2 = cache.add_child(root, "a", (0, 9));
        assert_eq!(a, a2);
        assert_eq!(cache.get(a).unwrap().bound, Some((0, 9)));
    }

    #[test]
    fn subtree_removal() {
        let mut cache = DentryCache::new();
        let root = cache.root();
        let a = cache.add_child(root, "a", (0, 5));
        let b = cache.add_child(a, "b", (0, 6));
        cache.remove_child(root, "a");
        assert!(cache.get(a).is_none());
        assert!(cache.get(b).is_none());
        assert_eq!(cache.child(root, "a"), None);
    }
}
