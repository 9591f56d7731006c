//! Filesystem layer with file content support.
//!
//! Implements the [`FileRWSupport`] trait on top of the path layer. A file's bytes
//! live in a singly-linked chain of `FileBlock` records; each record points at a
//! payload allocation of at most `BLOCK_SIZE` bytes and tracks how much of it holds
//! content. Every block before the last is filled to capacity, so a byte offset can be
//! located by walking the chain and subtracting fill levels.
//!
//! Growth zero-fills: whether a file grows through a truncate or through a write past
//! its end, the bytes between the old and the new end are written as zeroes, which is
//! what makes holes read back as zeroes after a remount.
//!
//! [`FileRWSupport`]: ../../regionfs_api/fs/trait.FileRWSupport.html

use regionfs_api::controller::Region;
use regionfs_api::fs::{
    AllocSupport, DirectorySupport, FileRWSupport, FileSysSupport, InodeSupport, PathSupport,
};
use regionfs_api::types::{
    FType, FileBlock, IKind, Inode, SuperBlock, TimeSpec, BLOCK_SIZE, FILE_BLOCK_SIZE,
};
use std::path::Path;

use super::error_fs::FileError;
use super::path_support::PathLayerFS;

/// The filesystem type of this layer
pub type FSName = FileLayerFS;

///Struct representing a filesystem with up to file layer support
#[derive(Debug)]
pub struct FileLayerFS {
    path_fs: PathLayerFS,
}

/// Functions specific to FileLayerFS
impl FileLayerFS {
    /// Returns a reference to the filesystem's cached superblock
    pub fn sup_as_ref(&self) -> &SuperBlock {
        self.path_fs.sup_as_ref()
    }

    /// Read access to the underlying region, for the layer above
    pub fn region(&self) -> &Region {
        self.path_fs.region()
    }

    /// Write access to the underlying region, for the layer above
    pub fn region_mut(&mut self) -> &mut Region {
        self.path_fs.region_mut()
    }

    fn fb_get(&self, off: u64) -> Result<FileBlock, FileError> {
        Ok(self.region().deserialize_from(off)?)
    }

    fn fb_put(&mut self, off: u64, fb: &FileBlock) -> Result<(), FileError> {
        Ok(self.region_mut().serialize_into(fb, off)?)
    }

    /// Release every record from `from` to the end of the chain, payloads included.
    fn release_chain(&mut self, from: u64) -> Result<(), FileError> {
        let mut cur = from;
        while cur != 0 {
            let fb = self.fb_get(cur)?;
            self.m_free(fb.data)?;
            self.m_free(cur)?;
            cur = fb.next;
        }
        Ok(())
    }

    /// Extend the file to exactly `target` bytes of explicit zeroes past its current
    /// content. Restores the previous size if the region runs out midway.
    fn grow_to(&mut self, inode: &mut Inode, target: u64) -> Result<(), FileError> {
        let (orig_size, mut first) = inode.node.file_parts().ok_or(FileError::IsDir)?;

        // top up the slack of the existing chain with zeroes
        let mut acc = 0u64;
        let mut prev = 0u64;
        let mut cur = first;
        while cur != 0 {
            let mut fb = self.fb_get(cur)?;
            if acc + fb.used < target && fb.used < fb.capacity {
                let fill = (fb.capacity - fb.used).min(target - acc - fb.used);
                self.region_mut().fill_zero(fb.data + fb.used, fill)?;
                fb.used += fill;
                self.fb_put(cur, &fb)?;
            }
            acc += fb.used;
            prev = cur;
            cur = fb.next;
        }

        // append fresh zeroed blocks until the target is reached
        while acc < target {
            let want = (target - acc).min(BLOCK_SIZE);
            let step = self.append_block(prev, want);
            let (rec, fb) = match step {
                Ok(appended) => appended,
                Err(e) => {
                    // put the inode back the way it was; what was appended goes away
                    inode.node.kind = IKind::File {
                        size: acc,
                        first_block: first,
                    };
                    self.i_put(inode)?;
                    self.shrink_to(inode, orig_size)?;
                    return Err(e);
                }
            };
            let used = fb.capacity.min(target - acc);
            self.region_mut().fill_zero(fb.data, used)?;
            self.fb_put(rec, &FileBlock { used, ..fb })?;
            if prev == 0 {
                first = rec;
            }
            acc += used;
            prev = rec;
        }

        inode.node.kind = IKind::File {
            size: target,
            first_block: first,
        };
        self.i_put(inode)?;
        Ok(())
    }

    /// Allocate one payload of up to `want` bytes plus its record, and hang the record
    /// off `prev`; when `prev` is 0 the caller installs the record as the chain head.
    /// Returns the record offset and its initial, unfilled state.
    fn append_block(&mut self, prev: u64, want: u64) -> Result<(u64, FileBlock), FileError> {
        let data = self.m_alloc(want)?;
        // the allocator may have handed out a whole block; the capacity still respects
        // the chunk ceiling
        let capacity = self.m_size(data)?.min(BLOCK_SIZE);
        let rec = match self.m_alloc(*FILE_BLOCK_SIZE) {
            Ok(rec) => rec,
            Err(e) => {
                self.m_free(data)?;
                return Err(e);
            }
        };
        let fb = FileBlock {
            capacity,
            used: 0,
            next: 0,
            data,
        };
        self.fb_put(rec, &fb)?;
        if prev != 0 {
            let mut pfb = self.fb_get(prev)?;
            pfb.next = rec;
            self.fb_put(prev, &pfb)?;
        }
        Ok((rec, fb))
    }

    /// Cut the file down to exactly `target` bytes: truncate the block the new end
    /// falls into, return what the allocator can reuse of its payload, and release
    /// every block past it.
    fn shrink_to(&mut self, inode: &mut Inode, target: u64) -> Result<(), FileError> {
        let (_, first) = inode.node.file_parts().ok_or(FileError::IsDir)?;

        if target == 0 {
            // dropping everything is the inode layer's truncate
            return Ok(self.i_trunc(inode)?);
        }

        let mut acc = 0u64;
        let mut prev = 0u64;
        let mut cur = first;
        while cur != 0 {
            let mut fb = self.fb_get(cur)?;
            if acc + fb.used >= target {
                let keep = target - acc;
                if keep == 0 {
                    // the cut lands exactly on a block boundary; this block goes too
                    self.release_chain(cur)?;
                    let mut pfb = self.fb_get(prev)?;
                    pfb.next = 0;
                    self.fb_put(prev, &pfb)?;
                } else {
                    let tail = fb.next;
                    fb.used = keep;
                    // shrinking in place never moves the payload
                    self.m_realloc(fb.data, keep)?;
                    fb.capacity = self.m_size(fb.data)?.min(BLOCK_SIZE);
                    fb.next = 0;
                    self.fb_put(cur, &fb)?;
                    self.release_chain(tail)?;
                }
                break;
            }
            acc += fb.used;
            prev = cur;
            cur = fb.next;
        }

        inode.node.kind = IKind::File {
            size: target,
            first_block: first,
        };
        self.i_put(inode)?;
        Ok(())
    }
}

impl FileSysSupport for FileLayerFS {
    type Error = FileError;

    fn mkfs<P: AsRef<Path>>(path: P, len: u64) -> Result<Self, Self::Error> {
        Ok(FileLayerFS {
            path_fs: PathLayerFS::mkfs(path, len)?,
        })
    }

    fn mountfs(region: Region) -> Result<Self, Self::Error> {
        Ok(FileLayerFS {
            path_fs: PathLayerFS::mountfs(region)?,
        })
    }

    fn unmountfs(self) -> Region {
        self.path_fs.unmountfs()
    }
}

impl AllocSupport for FileLayerFS {
    fn m_alloc(&mut self, size: u64) -> Result<u64, Self::Error> {
        Ok(self.path_fs.m_alloc(size)?)
    }

    fn m_realloc(&mut self, off: u64, size: u64) -> Result<u64, Self::Error> {
        Ok(self.path_fs.m_realloc(off, size)?)
    }

    fn m_free(&mut self, off: u64) -> Result<(), Self::Error> {
        Ok(self.path_fs.m_free(off)?)
    }

    fn m_size(&self, off: u64) -> Result<u64, Self::Error> {
        Ok(self.path_fs.m_size(off)?)
    }

    fn free_size(&self) -> Result<u64, Self::Error> {
        Ok(self.path_fs.free_size()?)
    }

    fn largest_free(&self) -> Result<u64, Self::Error> {
        Ok(self.path_fs.largest_free()?)
    }

    fn sup_get(&self) -> Result<SuperBlock, Self::Error> {
        Ok(self.path_fs.sup_get()?)
    }

    fn sup_put(&mut self, sup: &SuperBlock) -> Result<(), Self::Error> {
        Ok(self.path_fs.sup_put(sup)?)
    }

    fn sup_check(&self) -> Result<(), Self::Error> {
        Ok(self.path_fs.sup_check()?)
    }
}

impl InodeSupport for FileLayerFS {
    fn i_get(&self, off: u64) -> Result<Inode, Self::Error> {
        Ok(self.path_fs.i_get(off)?)
    }

    fn i_put(&mut self, ino: &Inode) -> Result<(), Self::Error> {
        Ok(self.path_fs.i_put(ino)?)
    }

    fn i_root(&self) -> Result<Inode, Self::Error> {
        Ok(self.path_fs.i_root()?)
    }

    fn i_trunc(&mut self, inode: &mut Inode) -> Result<(), Self::Error> {
        Ok(self.path_fs.i_trunc(inode)?)
    }
}

impl DirectorySupport for FileLayerFS {
    fn dirlookup(&self, dir: &Inode, name: &str) -> Result<Option<(Inode, u64)>, Self::Error> {
        Ok(self.path_fs.dirlookup(dir, name)?)
    }

    fn dir_child(&self, dir: &Inode, slot: u64) -> Result<u64, Self::Error> {
        Ok(self.path_fs.dir_child(dir, slot)?)
    }

    fn dirlink(&mut self, dir: &mut Inode, child_off: u64) -> Result<u64, Self::Error> {
        Ok(self.path_fs.dirlink(dir, child_off)?)
    }

    fn dir_compact(&mut self, dir: &mut Inode, slot: u64) -> Result<(), Self::Error> {
        Ok(self.path_fs.dir_compact(dir, slot)?)
    }

    fn dir_alloc_table(&mut self, parent_off: u64) -> Result<u64, Self::Error> {
        Ok(self.path_fs.dir_alloc_table(parent_off)?)
    }
}

impl PathSupport for FileLayerFS {
    fn resolve_path(&self, path: &str) -> Result<Inode, Self::Error> {
        Ok(self.path_fs.resolve_path(path)?)
    }

    fn resolve_parent(&self, path: &str) -> Result<(Inode, String), Self::Error> {
        Ok(self.path_fs.resolve_parent(path)?)
    }

    fn t_create(&mut self, path: &str, kind: FType) -> Result<Inode, Self::Error> {
        Ok(self.path_fs.t_create(path, kind)?)
    }

    fn t_unlink(&mut self, path: &str) -> Result<(), Self::Error> {
        Ok(self.path_fs.t_unlink(path)?)
    }

    fn t_rmdir(&mut self, path: &str) -> Result<(), Self::Error> {
        Ok(self.path_fs.t_rmdir(path)?)
    }

    fn t_rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error> {
        Ok(self.path_fs.t_rename(from, to)?)
    }
}

impl FileRWSupport for FileLayerFS {
    fn i_read(&mut self, inode: &mut Inode, buf: &mut [u8], off: u64) -> Result<u64, Self::Error> {
        let (size, first) = inode.node.file_parts().ok_or(FileError::IsDir)?;
        if off >= size {
            return Ok(0);
        }
        let n = (buf.len() as u64).min(size - off);

        let mut copied = 0u64;
        let mut skip = off;
        let mut cur = first;
        while cur != 0 && copied < n {
            let fb = self.fb_get(cur)?;
            if skip >= fb.used {
                skip -= fb.used;
                cur = fb.next;
                continue;
            }
            let take = (fb.used - skip).min(n - copied);
            let start = copied as usize;
            let end = (copied + take) as usize;
            self.region().read_at(fb.data + skip, &mut buf[start..end])?;
            copied += take;
            skip = 0;
            cur = fb.next;
        }

        inode.node.atime = TimeSpec::now();
        self.i_put(inode)?;
        Ok(copied)
    }

    fn i_write(&mut self, inode: &mut Inode, buf: &[u8], off: u64) -> Result<u64, Self::Error> {
        let (size, _) = inode.node.file_parts().ok_or(FileError::IsDir)?;
        if buf.is_empty() {
            return Ok(0);
        }
        if off > size {
            // a write past the end makes the hole explicit zeroes first
            self.grow_to(inode, off)?;
        }
        let (mut size, mut first) = inode.node.file_parts().ok_or(FileError::IsDir)?;

        let total = buf.len() as u64;
        let mut written = 0u64;
        let mut skip = off;
        let mut prev = 0u64;
        let mut cur = first;
        while written < total {
            if cur == 0 {
                // end of the chain; append
                let want = (total - written).min(BLOCK_SIZE);
                match self.append_block(prev, want) {
                    Ok((rec, _)) => {
                        if prev == 0 {
                            first = rec;
                        }
                        cur = rec;
                    }
                    Err(e) => {
                        if written == 0 {
                            return Err(e);
                        }
                        // a short write; commit what made it in
                        break;
                    }
                }
                continue;
            }
            let mut fb = self.fb_get(cur)?;
            if skip >= fb.used && fb.used == fb.capacity {
                // committed content entirely before the write offset
                skip -= fb.used;
                prev = cur;
                cur = fb.next;
                continue;
            }
            let take = (fb.capacity - skip).min(total - written);
            let start = written as usize;
            let end = (written + take) as usize;
            self.region_mut().write_at(fb.data + skip, &buf[start..end])?;
            if skip + take > fb.used {
                fb.used = skip + take;
            }
            self.fb_put(cur, &fb)?;
            written += take;
            skip = 0;
            prev = cur;
            cur = fb.next;
        }

        if off + written > size {
            size = off + written;
        }
        inode.node.kind = IKind::File {
            size,
            first_block: first,
        };
        let now = TimeSpec::now();
        inode.node.atime = now;
        inode.node.mtime = now;
        self.i_put(inode)?;
        Ok(written)
    }

    fn i_resize(&mut self, inode: &mut Inode, size: u64) -> Result<(), Self::Error> {
        let (old_size, _) = inode.node.file_parts().ok_or(FileError::IsDir)?;
        if size > old_size {
            self.grow_to(inode, size)?;
        } else if size < old_size {
            self.shrink_to(inode, size)?;
        }
        inode.node.mtime = TimeSpec::now();
        self.i_put(inode)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../api/fs-tests/file_test.rs"]
mod tests;
