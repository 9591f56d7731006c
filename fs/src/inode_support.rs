//! Filesystem layer with inode support.
//!
//! Implements the [`InodeSupport`] trait on top of the allocation layer: inode records
//! are read and written at allocator-assigned offsets, the root inode lives at its
//! fixed offset right after the superblock, and `i_trunc` releases a file's whole chunk
//! chain when the file disappears.
//!
//! [`InodeSupport`]: ../../regionfs_api/fs/trait.InodeSupport.html

use regionfs_api::controller::Region;
use regionfs_api::fs::{AllocSupport, FileSysSupport, InodeSupport};
use regionfs_api::types::{
    FileBlock, IKind, Inode, SuperBlock, INODE_SIZE,
};
use std::path::Path;

use super::alloc_support::AllocLayerFS;
use super::error_fs::InodeError;

/// The filesystem type of this layer
pub type FSName = InodeLayerFS;

///Struct representing a filesystem with up to inode layer support
#[derive(Debug)]
pub struct InodeLayerFS {
    alloc_fs: AllocLayerFS,
}

/// Functions specific to InodeLayerFS
impl InodeLayerFS {
    /// Returns a reference to the filesystem's cached superblock
    pub fn sup_as_ref(&self) -> &SuperBlock {
        self.alloc_fs.sup_as_ref()
    }

    /// Read access to the underlying region, for the layers above
    pub fn region(&self) -> &Region {
        self.alloc_fs.region()
    }

    /// Write access to the underlying region, for the layers above
    pub fn region_mut(&mut self) -> &mut Region {
        self.alloc_fs.region_mut()
    }
}

impl FileSysSupport for InodeLayerFS {
    type Error = InodeError;

    fn mkfs<P: AsRef<Path>>(path: P, len: u64) -> Result<Self, Self::Error> {
        Ok(InodeLayerFS {
            alloc_fs: AllocLayerFS::mkfs(path, len)?,
        })
    }

    fn mountfs(region: Region) -> Result<Self, Self::Error> {
        Ok(InodeLayerFS {
            alloc_fs: AllocLayerFS::mountfs(region)?,
        })
    }

    fn unmountfs(self) -> Region {
        self.alloc_fs.unmountfs()
    }
}

impl AllocSupport for InodeLayerFS {
    fn m_alloc(&mut self, size: u64) -> Result<u64, Self::Error> {
        Ok(self.alloc_fs.m_alloc(size)?)
    }

    fn m_realloc(&mut self, off: u64, size: u64) -> Result<u64, Self::Error> {
        Ok(self.alloc_fs.m_realloc(off, size)?)
    }

    fn m_free(&mut self, off: u64) -> Result<(), Self::Error> {
        Ok(self.alloc_fs.m_free(off)?)
    }

    fn m_size(&self, off: u64) -> Result<u64, Self::Error> {
        Ok(self.alloc_fs.m_size(off)?)
    }

    fn free_size(&self) -> Result<u64, Self::Error> {
        Ok(self.alloc_fs.free_size()?)
    }

    fn largest_free(&self) -> Result<u64, Self::Error> {
        Ok(self.alloc_fs.largest_free()?)
    }

    fn sup_get(&self) -> Result<SuperBlock, Self::Error> {
        Ok(self.alloc_fs.sup_get()?)
    }

    fn sup_put(&mut self, sup: &SuperBlock) -> Result<(), Self::Error> {
        Ok(self.alloc_fs.sup_put(sup)?)
    }

    fn sup_check(&self) -> Result<(), Self::Error> {
        Ok(self.alloc_fs.sup_check()?)
    }
}

impl InodeSupport for InodeLayerFS {
    fn i_get(&self, off: u64) -> Result<Inode, Self::Error> {
        if off == 0 {
            return Err(InodeError::InodeInput("Inode offset 0 means absent"));
        }
        if off + *INODE_SIZE > self.sup_as_ref().size {
            return Err(InodeError::InodeInput("Inode record escapes the region"));
        }
        let node = self.region().deserialize_from(off)?;
        Ok(Inode::new(off, node))
    }

    fn i_put(&mut self, ino: &Inode) -> Result<(), Self::Error> {
        if ino.off == 0 {
            return Err(InodeError::InodeInput("Inode offset 0 means absent"));
        }
        Ok(self.region_mut().serialize_into(&ino.node, ino.off)?)
    }

    fn i_root(&self) -> Result<Inode, Self::Error> {
        let root = self.sup_as_ref().root;
        self.i_get(root)
    }

    fn i_trunc(&mut self, inode: &mut Inode) -> Result<(), Self::Error> {
        let (_, first) = inode
            .node
            .file_parts()
            .ok_or(InodeError::InodeInput("Cannot truncate a directory inode"))?;

        // release the chain, payload before record
        let mut cur = first;
        while cur != 0 {
            let fb: FileBlock = self.region().deserialize_from(cur)?;
            self.m_free(fb.data)?;
            self.m_free(cur)?;
            cur = fb.next;
        }

        inode.node.kind = IKind::File {
            size: 0,
            first_block: 0,
        };
        self.i_put(inode)
    }
}

#[cfg(test)]
#[path = "../../api/fs-tests/inode_test.rs"]
mod tests;
