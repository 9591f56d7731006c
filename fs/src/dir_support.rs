//! Filesystem layer with directory support.
//!
//! Implements the [`DirectorySupport`] trait on top of the inode layer: children
//! tables as flat arrays of inode offsets, name lookup by linear scan, appending with
//! geometric growth through the allocator, and swap-with-last removal. Slot 0 of every
//! table is the parent back-reference and is counted by `num_children`, so an "empty"
//! directory has one child.
//!
//! [`DirectorySupport`]: ../../regionfs_api/fs/trait.DirectorySupport.html

use regionfs_api::controller::Region;
use regionfs_api::fs::{AllocSupport, DirectorySupport, FileSysSupport, InodeSupport};
use regionfs_api::types::{IKind, Inode, SuperBlock, TimeSpec, DIR_INIT_SLOTS, SLOT_SIZE};
use std::path::Path;

use super::error_fs::DirError;
use super::inode_support::InodeLayerFS;

/// The filesystem type of this layer
pub type FSName = DirLayerFS;

///Struct representing a filesystem with up to directory layer support
#[derive(Debug)]
pub struct DirLayerFS {
    inode_fs: InodeLayerFS,
}

/// Functions specific to DirLayerFS
impl DirLayerFS {
    /// Returns a reference to the filesystem's cached superblock
    pub fn sup_as_ref(&self) -> &SuperBlock {
        self.inode_fs.sup_as_ref()
    }

    /// Read access to the underlying region, for the layers above
    pub fn region(&self) -> &Region {
        self.inode_fs.region()
    }

    /// Write access to the underlying region, for the layers above
    pub fn region_mut(&mut self) -> &mut Region {
        self.inode_fs.region_mut()
    }

    fn dir_parts(dir: &Inode) -> Result<(u64, u64), DirError> {
        dir.node
            .dir_parts()
            .ok_or(DirError::DirInput("Inode is not a directory"))
    }

    fn slot_get(&self, table: u64, slot: u64) -> Result<u64, DirError> {
        Ok(self
            .region()
            .deserialize_from::<u64>(table + slot * SLOT_SIZE)?)
    }

    fn slot_put(&mut self, table: u64, slot: u64, child: u64) -> Result<(), DirError> {
        Ok(self
            .region_mut()
            .serialize_into(&child, table + slot * SLOT_SIZE)?)
    }
}

impl FileSysSupport for DirLayerFS {
    type Error = DirError;

    fn mkfs<P: AsRef<Path>>(path: P, len: u64) -> Result<Self, Self::Error> {
        Ok(DirLayerFS {
            inode_fs: InodeLayerFS::mkfs(path, len)?,
        })
    }

    fn mountfs(region: Region) -> Result<Self, Self::Error> {
        Ok(DirLayerFS {
            inode_fs: InodeLayerFS::mountfs(region)?,
        })
    }

    fn unmountfs(self) -> Region {
        self.inode_fs.unmountfs()
    }
}

impl AllocSupport for DirLayerFS {
    fn m_alloc(&mut self, size: u64) -> Result<u64, Self::Error> {
        Ok(self.inode_fs.m_alloc(size)?)
    }

    fn m_realloc(&mut self, off: u64, size: u64) -> Result<u64, Self::Error> {
        Ok(self.inode_fs.m_realloc(off, size)?)
    }

    fn m_free(&mut self, off: u64) -> Result<(), Self::Error> {
        Ok(self.inode_fs.m_free(off)?)
    }

    fn m_size(&self, off: u64) -> Result<u64, Self::Error> {
        Ok(self.inode_fs.m_size(off)?)
    }

    fn free_size(&self) -> Result<u64, Self::Error> {
        Ok(self.inode_fs.free_size()?)
    }

    fn largest_free(&self) -> Result<u64, Self::Error> {
        Ok(self.inode_fs.largest_free()?)
    }

    fn sup_get(&self) -> Result<SuperBlock, Self::Error> {
        Ok(self.inode_fs.sup_get()?)
    }

    fn sup_put(&mut self, sup: &SuperBlock) -> Result<(), Self::Error> {
        Ok(self.inode_fs.sup_put(sup)?)
    }

    fn sup_check(&self) -> Result<(), Self::Error> {
        Ok(self.inode_fs.sup_check()?)
    }
}

impl InodeSupport for DirLayerFS {
    fn i_get(&self, off: u64) -> Result<Inode, Self::Error> {
        Ok(self.inode_fs.i_get(off)?)
    }

    fn i_put(&mut self, ino: &Inode) -> Result<(), Self::Error> {
        Ok(self.inode_fs.i_put(ino)?)
    }

    fn i_root(&self) -> Result<Inode, Self::Error> {
        Ok(self.inode_fs.i_root()?)
    }

    fn i_trunc(&mut self, inode: &mut Inode) -> Result<(), Self::Error> {
        Ok(self.inode_fs.i_trunc(inode)?)
    }
}

impl DirectorySupport for DirLayerFS {
    fn dirlookup(&self, dir: &Inode, name: &str) -> Result<Option<(Inode, u64)>, Self::Error> {
        let (num_children, table) = Self::dir_parts(dir)?;
        // slot 0 is the parent back-reference, not an entry
        for slot in 1..num_children {
            let child_off = self.slot_get(table, slot)?;
            let child = self.i_get(child_off)?;
            if child.node.name.matches(name) {
                return Ok(Some((child, slot)));
            }
        }
        Ok(None)
    }

    fn dir_child(&self, dir: &Inode, slot: u64) -> Result<u64, Self::Error> {
        let (num_children, table) = Self::dir_parts(dir)?;
        if slot >= num_children {
            return Err(DirError::DirInput("Child slot is out of bounds"));
        }
        self.slot_get(table, slot)
    }

    fn dirlink(&mut self, dir: &mut Inode, child_off: u64) -> Result<u64, Self::Error> {
        let (num_children, mut table) = Self::dir_parts(dir)?;

        // a full table doubles its byte capacity
        let cap_bytes = self.m_size(table)?;
        if num_children == cap_bytes / SLOT_SIZE {
            table = self.m_realloc(table, cap_bytes * 2)?;
        }

        self.slot_put(table, num_children, child_off)?;
        dir.node.kind = IKind::Dir {
            num_children: num_children + 1,
            children: table,
        };
        dir.node.mtime = TimeSpec::now();
        self.i_put(dir)?;
        Ok(num_children)
    }

    fn dir_compact(&mut self, dir: &mut Inode, slot: u64) -> Result<(), Self::Error> {
        let (num_children, table) = Self::dir_parts(dir)?;
        if slot == 0 {
            return Err(DirError::DirInput("The parent slot cannot be removed"));
        }
        if slot >= num_children {
            return Err(DirError::DirInput("Child slot is out of bounds"));
        }

        let last = num_children - 1;
        if slot != last {
            let moved = self.slot_get(table, last)?;
            self.slot_put(table, slot, moved)?;
        }
        dir.node.kind = IKind::Dir {
            num_children: last,
            children: table,
        };
        dir.node.mtime = TimeSpec::now();
        self.i_put(dir)
    }

    fn dir_alloc_table(&mut self, parent_off: u64) -> Result<u64, Self::Error> {
        let table = self.m_alloc(DIR_INIT_SLOTS * SLOT_SIZE)?;
        self.slot_put(table, 0, parent_off)?;
        for slot in 1..DIR_INIT_SLOTS {
            self.slot_put(table, slot, 0)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
#[path = "../../api/fs-tests/dir_test.rs"]
mod tests;
