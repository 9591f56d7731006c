//! Filesystem layer with path support.
//!
//! Implements the [`PathSupport`] trait on top of the directory layer: resolution of
//! absolute paths to inodes, and the four tree mutations (create, unlink, rmdir,
//! rename). Resolution walks the region, not the string: `..` follows the parent slot
//! of the children table, so it keeps working after directories have been moved around.
//!
//! [`PathSupport`]: ../../regionfs_api/fs/trait.PathSupport.html

use regionfs_api::controller::Region;
use regionfs_api::fs::{
    AllocSupport, DirectorySupport, FileSysSupport, InodeSupport, PathSupport,
};
use regionfs_api::types::{
    DInode, FType, IKind, Inode, Name, SuperBlock, TimeSpec, INODE_SIZE, NAME_MAX_LEN,
};
use relative_path::{Component, RelativePath};
use std::path::Path;

use super::dir_support::DirLayerFS;
use super::error_fs::PathError;

/// The filesystem type of this layer
pub type FSName = PathLayerFS;

///Struct representing a filesystem with up to path layer support
#[derive(Debug)]
pub struct PathLayerFS {
    dir_fs: DirLayerFS,
}

/// Functions specific to PathLayerFS
impl PathLayerFS {
    /// Returns a reference to the filesystem's cached superblock
    pub fn sup_as_ref(&self) -> &SuperBlock {
        self.dir_fs.sup_as_ref()
    }

    /// Read access to the underlying region, for the layers above
    pub fn region(&self) -> &Region {
        self.dir_fs.region()
    }

    /// Write access to the underlying region, for the layers above
    pub fn region_mut(&mut self) -> &mut Region {
        self.dir_fs.region_mut()
    }

    /// Split an absolute path into its components, skipping empty ones.
    /// Errors if the path does not start with "/".
    fn components(path: &str) -> Result<Vec<Component>, PathError> {
        if !path.starts_with('/') {
            return Err(PathError::NotFound);
        }
        let rel = RelativePath::new(path.trim_start_matches('/'));
        Ok(rel.components().collect())
    }

    /// Walk the given components down from the root.
    fn walk(&self, comps: &[Component]) -> Result<Inode, PathError> {
        let mut cur = self.i_root()?;
        for comp in comps {
            if !cur.node.is_dir() {
                // an intermediate component named something that is not a directory
                return Err(PathError::NotFound);
            }
            match comp {
                Component::CurDir => {}
                Component::ParentDir => {
                    let parent = self.dir_child(&cur, 0)?;
                    // the root's parent slot is 0: `..` at the top stays at the top
                    if parent != 0 {
                        cur = self.i_get(parent)?;
                    }
                }
                Component::Normal(name) => {
                    cur = match self.dirlookup(&cur, name)? {
                        Some((child, _)) => child,
                        None => return Err(PathError::NotFound),
                    };
                }
            }
        }
        Ok(cur)
    }

    /// Find the slot of the child at `child_off` in `dir`, scanning by offset rather
    /// than by name.
    fn slot_of(&self, dir: &Inode, child_off: u64) -> Result<Option<u64>, PathError> {
        let num_children = match dir.node.kind {
            IKind::Dir { num_children, .. } => num_children,
            IKind::File { .. } => return Ok(None),
        };
        for slot in 1..num_children {
            if self.dir_child(dir, slot)? == child_off {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    /// Is `ino` the directory at `dir_off` itself, or any ancestor of it?
    /// Used by rename to refuse moving a directory below itself.
    fn is_ancestor_of(&self, ino: &Inode, dir_off: u64) -> Result<bool, PathError> {
        let mut cur = dir_off;
        loop {
            if cur == ino.off {
                return Ok(true);
            }
            let dir = self.i_get(cur)?;
            let parent = self.dir_child(&dir, 0)?;
            if parent == 0 {
                return Ok(false);
            }
            cur = parent;
        }
    }

    /// Remove the inode `victim`, sitting in `parent` at `slot`, from the tree.
    /// Files lose their chunk chain, directories their (empty) children table.
    fn remove_entry(&mut self, parent: &mut Inode, victim: Inode, slot: u64) -> Result<(), PathError> {
        let mut victim = victim;
        match victim.node.kind {
            IKind::File { .. } => self.i_trunc(&mut victim)?,
            IKind::Dir { children, .. } => self.m_free(children)?,
        }
        self.m_free(victim.off)?;
        self.dir_compact(parent, slot)?;
        Ok(())
    }
}

impl FileSysSupport for PathLayerFS {
    type Error = PathError;

    fn mkfs<P: AsRef<Path>>(path: P, len: u64) -> Result<Self, Self::Error> {
        Ok(PathLayerFS {
            dir_fs: DirLayerFS::mkfs(path, len)?,
        })
    }

    fn mountfs(region: Region) -> Result<Self, Self::Error> {
        Ok(PathLayerFS {
            dir_fs: DirLayerFS::mountfs(region)?,
        })
    }

    fn unmountfs(self) -> Region {
        self.dir_fs.unmountfs()
    }
}

impl AllocSupport for PathLayerFS {
    fn m_alloc(&mut self, size: u64) -> Result<u64, Self::Error> {
        Ok(self.dir_fs.m_alloc(size)?)
    }

    fn m_realloc(&mut self, off: u64, size: u64) -> Result<u64, Self::Error> {
        Ok(self.dir_fs.m_realloc(off, size)?)
    }

    fn m_free(&mut self, off: u64) -> Result<(), Self::Error> {
        Ok(self.dir_fs.m_free(off)?)
    }

    fn m_size(&self, off: u64) -> Result<u64, Self::Error> {
        Ok(self.dir_fs.m_size(off)?)
    }

    fn free_size(&self) -> Result<u64, Self::Error> {
        Ok(self.dir_fs.free_size()?)
    }

    fn largest_free(&self) -> Result<u64, Self::Error> {
        Ok(self.dir_fs.largest_free()?)
    }

    fn sup_get(&self) -> Result<SuperBlock, Self::Error> {
        Ok(self.dir_fs.sup_get()?)
    }

    fn sup_put(&mut self, sup: &SuperBlock) -> Result<(), Self::Error> {
        Ok(self.dir_fs.sup_put(sup)?)
    }

    fn sup_check(&self) -> Result<(), Self::Error> {
        Ok(self.dir_fs.sup_check()?)
    }
}

impl InodeSupport for PathLayerFS {
    fn i_get(&self, off: u64) -> Result<Inode, Self::Error> {
        Ok(self.dir_fs.i_get(off)?)
    }

    fn i_put(&mut self, ino: &Inode) -> Result<(), Self::Error> {
        Ok(self.dir_fs.i_put(ino)?)
    }

    fn i_root(&self) -> Result<Inode, Self::Error> {
        Ok(self.dir_fs.i_root()?)
    }

    fn i_trunc(&mut self, inode: &mut Inode) -> Result<(), Self::Error> {
        Ok(self.dir_fs.i_trunc(inode)?)
    }
}

impl DirectorySupport for PathLayerFS {
    fn dirlookup(&self, dir: &Inode, name: &str) -> Result<Option<(Inode, u64)>, Self::Error> {
        Ok(self.dir_fs.dirlookup(dir, name)?)
    }

    fn dir_child(&self, dir: &Inode, slot: u64) -> Result<u64, Self::Error> {
        Ok(self.dir_fs.dir_child(dir, slot)?)
    }

    fn dirlink(&mut self, dir: &mut Inode, child_off: u64) -> Result<u64, Self::Error> {
        Ok(self.dir_fs.dirlink(dir, child_off)?)
    }

    fn dir_compact(&mut self, dir: &mut Inode, slot: u64) -> Result<(), Self::Error> {
        Ok(self.dir_fs.dir_compact(dir, slot)?)
    }

    fn dir_alloc_table(&mut self, parent_off: u64) -> Result<u64, Self::Error> {
        Ok(self.dir_fs.dir_alloc_table(parent_off)?)
    }
}

impl PathSupport for PathLayerFS {
    fn resolve_path(&self, path: &str) -> Result<Inode, Self::Error> {
        let comps = Self::components(path)?;
        self.walk(&comps)
    }

    fn resolve_parent(&self, path: &str) -> Result<(Inode, String), Self::Error> {
        let mut comps = Self::components(path)?;
        let name = match comps.pop() {
            Some(Component::Normal(name)) => name.to_string(),
            // "/", or a path ending in "." or ".." — nothing to create or remove there
            _ => return Err(PathError::NotFound),
        };
        // the parent has to resolve before the basename is judged
        let parent = self.walk(&comps)?;
        if name.len() > NAME_MAX_LEN {
            return Err(PathError::NameTooLong);
        }
        Ok((parent, name))
    }

    fn t_create(&mut self, path: &str, kind: FType) -> Result<Inode, Self::Error> {
        let (parent, name) = self.resolve_parent(path)?;
        if !parent.node.is_dir() {
            return Err(PathError::NotDir);
        }
        if self.dirlookup(&parent, &name)?.is_some() {
            return Err(PathError::Exists);
        }
        let name = Name::new(&name).ok_or(PathError::NameTooLong)?;
        let now = TimeSpec::now();

        let ino_off = self.m_alloc(*INODE_SIZE)?;
        let node = match kind {
            FType::TFile => DInode::new_file(name, now),
            FType::TDir => {
                let table = match self.dir_alloc_table(parent.off) {
                    Ok(table) => table,
                    Err(e) => {
                        self.m_free(ino_off)?;
                        return Err(e);
                    }
                };
                DInode::new_dir(name, now, 1, table)
            }
        };
        let ino = Inode::new(ino_off, node);
        self.i_put(&ino)?;

        let mut parent = parent;
        if let Err(e) = self.dirlink(&mut parent, ino_off) {
            // unwind the orphan allocations; the tree has not seen the inode yet
            if let IKind::Dir { children, .. } = ino.node.kind {
                self.m_free(children)?;
            }
            self.m_free(ino_off)?;
            return Err(e);
        }
        Ok(ino)
    }

    fn t_unlink(&mut self, path: &str) -> Result<(), Self::Error> {
        let (parent, name) = self.resolve_parent(path)?;
        if !parent.node.is_dir() {
            return Err(PathError::NotDir);
        }
        let (ino, slot) = self
            .dirlookup(&parent, &name)?
            .ok_or(PathError::NotFound)?;
        if ino.node.is_dir() {
            return Err(PathError::IsDir);
        }
        let mut parent = parent;
        self.remove_entry(&mut parent, ino, slot)
    }

    fn t_rmdir(&mut self, path: &str) -> Result<(), Self::Error> {
        let (parent, name) = self.resolve_parent(path)?;
        if !parent.node.is_dir() {
            return Err(PathError::NotDir);
        }
        let (ino, slot) = self
            .dirlookup(&parent, &name)?
            .ok_or(PathError::NotFound)?;
        let (num_children, _) = ino.node.dir_parts().ok_or(PathError::NotDir)?;
        if num_children > 1 {
            return Err(PathError::NotEmpty);
        }
        let mut parent = parent;
        self.remove_entry(&mut parent, ino, slot)
    }

    fn t_rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error> {
        let src = self.resolve_path(from)?;
        let (sparent, sname) = self.resolve_parent(from)?;
        let (tparent, tname) = self.resolve_parent(to)?;
        if !tparent.node.is_dir() {
            return Err(PathError::NotDir);
        }
        if src.node.is_dir() && self.is_ancestor_of(&src, tparent.off)? {
            return Err(PathError::Cycle);
        }
        if sparent.off == tparent.off && sname == tname {
            // renaming a path onto itself
            return Ok(());
        }
        let new_name = Name::new(&tname).ok_or(PathError::NameTooLong)?;

        // an existing target of the matching type gets replaced
        let mut tparent = tparent;
        if let Some((existing, tslot)) = self.dirlookup(&tparent, &tname)? {
            match (src.node.is_dir(), existing.node.is_dir()) {
                (false, true) => return Err(PathError::IsDir),
                (true, false) => return Err(PathError::NotDir),
                _ => {}
            }
            if let Some((num_children, _)) = existing.node.dir_parts() {
                if num_children > 1 {
                    return Err(PathError::NotEmpty);
                }
            }
            self.remove_entry(&mut tparent, existing, tslot)?;
        }

        // insert into the target before removing from the source, so a failure in the
        // growth step leaves the inode reachable under its old path
        let mut tparent = self.i_get(tparent.off)?;
        self.dirlink(&mut tparent, src.off)?;

        // a moved directory's parent slot has to follow it
        if let Some((_, children)) = src.node.dir_parts() {
            self.region_mut().serialize_into(&tparent.off, children)?;
        }

        let sparent = self.i_get(sparent.off)?;
        if let Some(slot) = self.slot_of(&sparent, src.off)? {
            let mut sparent = sparent;
            self.dir_compact(&mut sparent, slot)?;
        }

        let mut src = self.i_get(src.off)?;
        src.node.name = new_name;
        self.i_put(&src)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../api/fs-tests/path_test.rs"]
mod tests;
