//! The POSIX operation surface.
//!
//! Implements the [`PosixSupport`] trait on top of the file layer: the thirteen entry
//! points the host harness dispatches into. Everything below this layer reports
//! semantic errors; this layer adds the input validation the POSIX signatures call for
//! (negative `off_t` values, type checks on the resolved inode) and shapes the results
//! (`FileStat`, `FsStat`, name listings).
//!
//! Every entry point re-verifies the superblock before touching the tree, so a region
//! corrupted behind our back turns into an EFAULT instead of undefined behavior.
//! The errno mapping itself lives on [`FsError`](../error_fs/enum.FsError.html).
//!
//! [`PosixSupport`]: ../../regionfs_api/fs/trait.PosixSupport.html

use regionfs_api::controller::Region;
use regionfs_api::fs::{
    AllocSupport, DirectorySupport, FileRWSupport, FileSysSupport, InodeSupport, PathSupport,
    PosixSupport,
};
use regionfs_api::types::{
    FType, FileStat, FsStat, IKind, Inode, SuperBlock, TimeSpec, BLOCK_SIZE, NAME_MAX_LEN,
};
use std::path::Path;

use super::error_fs::{FsError, PathError};
use super::file_support::FileLayerFS;

/// The filesystem type of this layer, and of the crate as a whole
pub type FSName = PosixFS;

///Struct representing the complete filesystem
#[derive(Debug)]
pub struct PosixFS {
    file_fs: FileLayerFS,
}

/// Functions specific to PosixFS
impl PosixFS {
    /// Returns a reference to the filesystem's cached superblock
    pub fn sup_as_ref(&self) -> &SuperBlock {
        self.file_fs.sup_as_ref()
    }
}

impl FileSysSupport for PosixFS {
    type Error = FsError;

    fn mkfs<P: AsRef<Path>>(path: P, len: u64) -> Result<Self, Self::Error> {
        Ok(PosixFS {
            file_fs: FileLayerFS::mkfs(path, len)?,
        })
    }

    fn mountfs(region: Region) -> Result<Self, Self::Error> {
        Ok(PosixFS {
            file_fs: FileLayerFS::mountfs(region)?,
        })
    }

    fn unmountfs(self) -> Region {
        self.file_fs.unmountfs()
    }
}

impl AllocSupport for PosixFS {
    fn m_alloc(&mut self, size: u64) -> Result<u64, Self::Error> {
        Ok(self.file_fs.m_alloc(size)?)
    }

    fn m_realloc(&mut self, off: u64, size: u64) -> Result<u64, Self::Error> {
        Ok(self.file_fs.m_realloc(off, size)?)
    }

    fn m_free(&mut self, off: u64) -> Result<(), Self::Error> {
        Ok(self.file_fs.m_free(off)?)
    }

    fn m_size(&self, off: u64) -> Result<u64, Self::Error> {
        Ok(self.file_fs.m_size(off)?)
    }

    fn free_size(&self) -> Result<u64, Self::Error> {
        Ok(self.file_fs.free_size()?)
    }

    fn largest_free(&self) -> Result<u64, Self::Error> {
        Ok(self.file_fs.largest_free()?)
    }

    fn sup_get(&self) -> Result<SuperBlock, Self::Error> {
        Ok(self.file_fs.sup_get()?)
    }

    fn sup_put(&mut self, sup: &SuperBlock) -> Result<(), Self::Error> {
        Ok(self.file_fs.sup_put(sup)?)
    }

    fn sup_check(&self) -> Result<(), Self::Error> {
        Ok(self.file_fs.sup_check()?)
    }
}

impl InodeSupport for PosixFS {
    fn i_get(&self, off: u64) -> Result<Inode, Self::Error> {
        Ok(self.file_fs.i_get(off)?)
    }

    fn i_put(&mut self, ino: &Inode) -> Result<(), Self::Error> {
        Ok(self.file_fs.i_put(ino)?)
    }

    fn i_root(&self) -> Result<Inode, Self::Error> {
        Ok(self.file_fs.i_root()?)
    }

    fn i_trunc(&mut self, inode: &mut Inode) -> Result<(), Self::Error> {
        Ok(self.file_fs.i_trunc(inode)?)
    }
}

impl DirectorySupport for PosixFS {
    fn dirlookup(&self, dir: &Inode, name: &str) -> Result<Option<(Inode, u64)>, Self::Error> {
        Ok(self.file_fs.dirlookup(dir, name)?)
    }

    fn dir_child(&self, dir: &Inode, slot: u64) -> Result<u64, Self::Error> {
        Ok(self.file_fs.dir_child(dir, slot)?)
    }

    fn dirlink(&mut self, dir: &mut Inode, child_off: u64) -> Result<u64, Self::Error> {
        Ok(self.file_fs.dirlink(dir, child_off)?)
    }

    fn dir_compact(&mut self, dir: &mut Inode, slot: u64) -> Result<(), Self::Error> {
        Ok(self.file_fs.dir_compact(dir, slot)?)
    }

    fn dir_alloc_table(&mut self, parent_off: u64) -> Result<u64, Self::Error> {
        Ok(self.file_fs.dir_alloc_table(parent_off)?)
    }
}

impl PathSupport for PosixFS {
    fn resolve_path(&self, path: &str) -> Result<Inode, Self::Error> {
        Ok(self.file_fs.resolve_path(path)?)
    }

    fn resolve_parent(&self, path: &str) -> Result<(Inode, String), Self::Error> {
        Ok(self.file_fs.resolve_parent(path)?)
    }

    fn t_create(&mut self, path: &str, kind: FType) -> Result<Inode, Self::Error> {
        Ok(self.file_fs.t_create(path, kind)?)
    }

    fn t_unlink(&mut self, path: &str) -> Result<(), Self::Error> {
        Ok(self.file_fs.t_unlink(path)?)
    }

    fn t_rmdir(&mut self, path: &str) -> Result<(), Self::Error> {
        Ok(self.file_fs.t_rmdir(path)?)
    }

    fn t_rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error> {
        Ok(self.file_fs.t_rename(from, to)?)
    }
}

impl FileRWSupport for PosixFS {
    fn i_read(&mut self, inode: &mut Inode, buf: &mut [u8], off: u64) -> Result<u64, Self::Error> {
        Ok(self.file_fs.i_read(inode, buf, off)?)
    }

    fn i_write(&mut self, inode: &mut Inode, buf: &[u8], off: u64) -> Result<u64, Self::Error> {
        Ok(self.file_fs.i_write(inode, buf, off)?)
    }

    fn i_resize(&mut self, inode: &mut Inode, size: u64) -> Result<(), Self::Error> {
        Ok(self.file_fs.i_resize(inode, size)?)
    }
}

impl PosixSupport for PosixFS {
    fn getattr(&self, uid: u32, gid: u32, path: &str) -> Result<FileStat, Self::Error> {
        self.sup_check()?;
        let ino = self.resolve_path(path)?;
        let stat = match ino.node.kind {
            IKind::Dir { num_children, .. } => {
                // 2 links for the directory itself plus one per subdirectory
                let mut nlink = 2;
                for slot in 1..num_children {
                    let child = self.i_get(self.dir_child(&ino, slot)?)?;
                    if child.node.is_dir() {
                        nlink += 1;
                    }
                }
                FileStat {
                    uid,
                    gid,
                    mode: libc::S_IFDIR as u32 | 0o755,
                    nlink,
                    size: 0,
                    atime: ino.node.atime,
                    mtime: ino.node.mtime,
                }
            }
            IKind::File { size, .. } => FileStat {
                uid,
                gid,
                mode: libc::S_IFREG as u32 | 0o755,
                nlink: 1,
                size,
                atime: ino.node.atime,
                mtime: ino.node.mtime,
            },
        };
        Ok(stat)
    }

    fn readdir(&self, path: &str) -> Result<Vec<String>, Self::Error> {
        self.sup_check()?;
        let ino = self.resolve_path(path)?;
        let (num_children, _) = ino.node.dir_parts().ok_or(PathError::NotDir)?;
        let mut names = Vec::with_capacity((num_children - 1) as usize);
        for slot in 1..num_children {
            let child = self.i_get(self.dir_child(&ino, slot)?)?;
            names.push(child.node.name.to_string_lossy());
        }
        Ok(names)
    }

    fn mknod(&mut self, path: &str) -> Result<(), Self::Error> {
        self.sup_check()?;
        self.t_create(path, FType::TFile)?;
        Ok(())
    }

    fn mkdir(&mut self, path: &str) -> Result<(), Self::Error> {
        self.sup_check()?;
        self.t_create(path, FType::TDir)?;
        Ok(())
    }

    fn unlink(&mut self, path: &str) -> Result<(), Self::Error> {
        self.sup_check()?;
        self.t_unlink(path)
    }

    fn rmdir(&mut self, path: &str) -> Result<(), Self::Error> {
        self.sup_check()?;
        self.t_rmdir(path)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error> {
        self.sup_check()?;
        self.t_rename(from, to)
    }

    fn truncate(&mut self, path: &str, size: i64) -> Result<(), Self::Error> {
        self.sup_check()?;
        if size < 0 {
            return Err(FsError::BadOffset);
        }
        let mut ino = self.resolve_path(path)?;
        self.i_resize(&mut ino, size as u64)
    }

    fn open(&self, path: &str) -> Result<(), Self::Error> {
        self.sup_check()?;
        self.resolve_path(path)?;
        Ok(())
    }

    fn read(&mut self, path: &str, buf: &mut [u8], offset: i64) -> Result<u64, Self::Error> {
        self.sup_check()?;
        if offset < 0 {
            return Err(FsError::BadOffset);
        }
        let mut ino = self.resolve_path(path)?;
        self.i_read(&mut ino, buf, offset as u64)
    }

    fn write(&mut self, path: &str, buf: &[u8], offset: i64) -> Result<u64, Self::Error> {
        self.sup_check()?;
        if offset < 0 {
            return Err(FsError::BadOffset);
        }
        let mut ino = self.resolve_path(path)?;
        self.i_write(&mut ino, buf, offset as u64)
    }

    fn utimens(
        &mut self,
        path: &str,
        atime: TimeSpec,
        mtime: TimeSpec,
    ) -> Result<(), Self::Error> {
        self.sup_check()?;
        let mut ino = self.resolve_path(path)?;
        ino.node.atime = atime;
        ino.node.mtime = mtime;
        self.i_put(&ino)
    }

    fn statfs(&self) -> Result<FsStat, Self::Error> {
        self.sup_check()?;
        let sup = self.sup_get()?;
        let free = self.free_size()? / BLOCK_SIZE;
        Ok(FsStat {
            block_size: BLOCK_SIZE,
            blocks: sup.size / BLOCK_SIZE,
            blocks_free: free,
            blocks_avail: free,
            name_max: NAME_MAX_LEN as u64,
        })
    }
}

#[cfg(test)]
#[path = "../../api/fs-tests/posix_test.rs"]
mod tests;
