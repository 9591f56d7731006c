//! Mounting and the region allocator.
//!
//! This is the bottom layer of the ladder and the only one that owns the
//! [`Region`](../../regionfs_api/controller/struct.Region.html). It implements the
//! [`FileSysSupport`] and [`AllocSupport`] traits together (you have no other choice,
//! as the first one is a supertrait of the second).
//!
//! [`FileSysSupport`]: ../../regionfs_api/fs/trait.FileSysSupport.html
//! [`AllocSupport`]: ../../regionfs_api/fs/trait.AllocSupport.html
//!
//! Free space management works on one address-ordered list of free blocks, headed by
//! the superblock's `free_list` field. Each block is described by a `BlockHeader`
//! directly in front of its payload; the header's `size` field excludes the header
//! itself. Allocation takes the largest-fit block and carves from its head; release
//! re-inserts at the sorted position and merges with physically adjacent neighbors.
//! The same header also fronts allocated blocks, which is how `m_size` can recover any
//! allocation's capacity with nothing but its payload offset.

use regionfs_api::controller::Region;
use regionfs_api::fs::{AllocSupport, FileSysSupport};
use regionfs_api::types::{
    BlockHeader, DInode, Name, SuperBlock, TimeSpec, BLOCK_HEADER_SIZE, DIR_INIT_SLOTS,
    INODE_SIZE, MAGIC_NUMBER, MIN_REGION_SIZE, SLOT_SIZE, SUPERBLOCK_SIZE,
};
use std::path::Path;

use super::error_fs::AllocError;

/// The filesystem type of this layer
pub type FSName = AllocLayerFS;

/// Struct representing the allocation layer
#[derive(Debug)]
pub struct AllocLayerFS {
    /// the region everything lives in
    region: Region,
    /// cached copy of the superblock, so it is not re-read on every allocator step
    sup: SuperBlock,
}

impl AllocLayerFS {
    /// Returns a reference to the filesystem's cached superblock
    pub fn sup_as_ref(&self) -> &SuperBlock {
        &self.sup
    }

    /// Read access to the underlying region, for the layers above
    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Write access to the underlying region, for the layers above
    pub fn region_mut(&mut self) -> &mut Region {
        &mut self.region
    }

    fn hdr_get(&self, off: u64) -> Result<BlockHeader, AllocError> {
        Ok(self.region.deserialize_from::<BlockHeader>(off)?)
    }

    fn hdr_put(&mut self, off: u64, hdr: &BlockHeader) -> Result<(), AllocError> {
        Ok(self.region.serialize_into(hdr, off)?)
    }

    /// Point the list link that used to lead to some block at `new_off` instead.
    /// A `prev_off` of 0 means the link is the superblock's free-list head.
    fn relink(&mut self, prev_off: u64, new_off: u64) -> Result<(), AllocError> {
        if prev_off == 0 {
            let mut sup = self.sup;
            sup.free_list = new_off;
            self.sup_put(&sup)
        } else {
            let mut prev = self.hdr_get(prev_off)?;
            prev.next = new_off;
            self.hdr_put(prev_off, &prev)
        }
    }

    /// Insert the block whose header sits at `blk_off` into the free list, keeping the
    /// list sorted by offset, then merge with the successor and predecessor if they are
    /// physically adjacent.
    fn insert_free(&mut self, blk_off: u64) -> Result<(), AllocError> {
        let mut blk = self.hdr_get(blk_off)?;

        // find the sorted position
        let (mut prev, mut cur) = (0u64, self.sup.free_list);
        while cur != 0 && cur < blk_off {
            let h = self.hdr_get(cur)?;
            prev = cur;
            cur = h.next;
        }
        if cur == blk_off {
            return Err(AllocError::AllocInput("Block is already on the free list"));
        }

        blk.next = cur;
        self.hdr_put(blk_off, &blk)?;
        self.relink(prev, blk_off)?;

        // merge with the successor first, then the predecessor
        if cur != 0 && blk_off + *BLOCK_HEADER_SIZE + blk.size == cur {
            let nxt = self.hdr_get(cur)?;
            blk.size += *BLOCK_HEADER_SIZE + nxt.size;
            blk.next = nxt.next;
            self.hdr_put(blk_off, &blk)?;
        }
        if prev != 0 {
            let mut ph = self.hdr_get(prev)?;
            if prev + *BLOCK_HEADER_SIZE + ph.size == blk_off {
                ph.size += *BLOCK_HEADER_SIZE + blk.size;
                ph.next = blk.next;
                self.hdr_put(prev, &ph)?;
            }
        }
        Ok(())
    }

    /// Try to grow the allocation at `off` (currently `old` bytes) by `extra` bytes
    /// without moving it, by consuming the front of a free block that starts exactly
    /// where the payload ends. Returns whether that worked.
    fn grow_adjacent(&mut self, off: u64, old: u64, extra: u64) -> Result<bool, AllocError> {
        let adj = off + old;
        let (mut prev, mut cur) = (0u64, self.sup.free_list);
        while cur != 0 && cur < adj {
            let h = self.hdr_get(cur)?;
            prev = cur;
            cur = h.next;
        }
        if cur != adj {
            return Ok(false);
        }

        let h = self.hdr_get(adj)?;
        let span = *BLOCK_HEADER_SIZE + h.size;
        if span < extra {
            return Ok(false);
        }
        if span - extra >= 2 * *BLOCK_HEADER_SIZE {
            // consume the front of the neighbor; what remains stays a free block
            let moved = adj + extra;
            self.hdr_put(
                moved,
                &BlockHeader {
                    size: span - extra - *BLOCK_HEADER_SIZE,
                    next: h.next,
                },
            )?;
            self.relink(prev, moved)?;
            self.hdr_put(
                off - *BLOCK_HEADER_SIZE,
                &BlockHeader {
                    size: old + extra,
                    next: 0,
                },
            )?;
        } else {
            // the leftover could not stand alone; absorb the whole neighbor
            self.relink(prev, h.next)?;
            self.hdr_put(
                off - *BLOCK_HEADER_SIZE,
                &BlockHeader {
                    size: old + span,
                    next: 0,
                },
            )?;
        }
        Ok(true)
    }

    /// First-time initialization of a fresh (or garbage) region: superblock, root
    /// inode, the root's children table, and one free block over the remainder.
    fn format(&mut self) -> Result<(), AllocError> {
        let len = self.region.len();

        // A region that is neither initialized nor all-zero carries garbage from an
        // earlier life; wipe everything past the superblock before laying out.
        if self.sup.magic != 0 {
            self.region.fill_zero(*SUPERBLOCK_SIZE, len - *SUPERBLOCK_SIZE)?;
        }

        let root_off = *SUPERBLOCK_SIZE;
        let table_hdr = root_off + *INODE_SIZE;
        let table_off = table_hdr + *BLOCK_HEADER_SIZE;
        let free_off = table_off + DIR_INIT_SLOTS * SLOT_SIZE;

        // the root directory, with the parent slot as its only child
        let root = DInode::new_dir(Name::root(), TimeSpec::now(), 1, table_off);
        self.region.serialize_into(&root, root_off)?;

        // its children table, an allocation like any other
        self.region.serialize_into(
            &BlockHeader {
                size: DIR_INIT_SLOTS * SLOT_SIZE,
                next: 0,
            },
            table_hdr,
        )?;
        for slot in 0..DIR_INIT_SLOTS {
            self.region
                .serialize_into(&0u64, table_off + slot * SLOT_SIZE)?;
        }

        // everything after the root metadata is one free block
        self.region.serialize_into(
            &BlockHeader {
                size: len - free_off - *BLOCK_HEADER_SIZE,
                next: 0,
            },
            free_off,
        )?;

        let sup = SuperBlock {
            magic: MAGIC_NUMBER,
            size: len,
            root: root_off,
            free_list: free_off,
        };
        self.sup_put(&sup)
    }
}

impl FileSysSupport for AllocLayerFS {
    type Error = AllocError;

    fn mkfs<P: AsRef<Path>>(path: P, len: u64) -> Result<Self, Self::Error> {
        let region = Region::new(path, len)?;
        Self::mountfs(region)
    }

    fn mountfs(region: Region) -> Result<Self, Self::Error> {
        if region.len() < MIN_REGION_SIZE {
            return Err(AllocError::Corrupt(
                "Region is too small to hold a filesystem",
            ));
        }
        let sup = region.deserialize_from::<SuperBlock>(0)?;
        let mut fs = AllocLayerFS { region, sup };
        if fs.sup.magic != MAGIC_NUMBER {
            fs.format()?;
        } else {
            fs.sup_check()?;
        }
        Ok(fs)
    }

    fn unmountfs(self) -> Region {
        self.region
    }
}

impl AllocSupport for AllocLayerFS {
    fn m_alloc(&mut self, size: u64) -> Result<u64, Self::Error> {
        if size == 0 {
            return Err(AllocError::AllocInput("Cannot allocate zero bytes"));
        }
        let size = size.max(*BLOCK_HEADER_SIZE);

        // pick the free block with the most room
        let (mut best_prev, mut best_off) = (0u64, 0u64);
        let mut best: Option<BlockHeader> = None;
        let (mut prev, mut cur) = (0u64, self.sup.free_list);
        while cur != 0 {
            let h = self.hdr_get(cur)?;
            if best.map_or(true, |b| h.size > b.size) {
                best_prev = prev;
                best_off = cur;
                best = Some(h);
            }
            prev = cur;
            cur = h.next;
        }
        let hdr = match best {
            Some(h) if h.size >= size => h,
            _ => return Err(AllocError::NoSpace),
        };

        if hdr.size - size >= 2 * *BLOCK_HEADER_SIZE {
            // carve from the head; the residual tail keeps the list position
            let residual = best_off + *BLOCK_HEADER_SIZE + size;
            self.hdr_put(
                residual,
                &BlockHeader {
                    size: hdr.size - size - *BLOCK_HEADER_SIZE,
                    next: hdr.next,
                },
            )?;
            self.relink(best_prev, residual)?;
            self.hdr_put(best_off, &BlockHeader { size, next: 0 })?;
        } else {
            // too little left to stand alone; hand out the whole block
            self.relink(best_prev, hdr.next)?;
            self.hdr_put(
                best_off,
                &BlockHeader {
                    size: hdr.size,
                    next: 0,
                },
            )?;
        }
        Ok(best_off + *BLOCK_HEADER_SIZE)
    }

    fn m_realloc(&mut self, off: u64, size: u64) -> Result<u64, Self::Error> {
        if off == 0 {
            return self.m_alloc(size);
        }
        if size == 0 {
            self.m_free(off)?;
            return Ok(0);
        }
        let old = self.m_size(off)?;
        let size = size.max(*BLOCK_HEADER_SIZE);

        if size <= old {
            if old - size >= 2 * *BLOCK_HEADER_SIZE {
                // carve the tail off and hand it back
                self.hdr_put(off - *BLOCK_HEADER_SIZE, &BlockHeader { size, next: 0 })?;
                self.hdr_put(
                    off + size,
                    &BlockHeader {
                        size: old - size - *BLOCK_HEADER_SIZE,
                        next: 0,
                    },
                )?;
                self.insert_free(off + size)?;
            }
            return Ok(off);
        }

        if self.grow_adjacent(off, old, size - old)? {
            return Ok(off);
        }

        // no room in place; move the payload
        let new_off = self.m_alloc(size)?;
        let mut scratch = vec![0u8; old as usize];
        self.region.read_at(off, &mut scratch)?;
        self.region.write_at(new_off, &scratch)?;
        self.m_free(off)?;
        Ok(new_off)
    }

    fn m_free(&mut self, off: u64) -> Result<(), Self::Error> {
        if off < *SUPERBLOCK_SIZE + *BLOCK_HEADER_SIZE || off >= self.sup.size {
            return Err(AllocError::AllocInput(
                "Offset to free lies outside the allocatable region",
            ));
        }
        self.insert_free(off - *BLOCK_HEADER_SIZE)
    }

    fn m_size(&self, off: u64) -> Result<u64, Self::Error> {
        if off < *SUPERBLOCK_SIZE + *BLOCK_HEADER_SIZE || off >= self.sup.size {
            return Err(AllocError::AllocInput(
                "Offset lies outside the allocatable region",
            ));
        }
        Ok(self.hdr_get(off - *BLOCK_HEADER_SIZE)?.size)
    }

    fn free_size(&self) -> Result<u64, Self::Error> {
        let mut total = 0;
        let mut cur = self.sup.free_list;
        while cur != 0 {
            let h = self.hdr_get(cur)?;
            total += h.size;
            cur = h.next;
        }
        Ok(total)
    }

    fn largest_free(&self) -> Result<u64, Self::Error> {
        let mut largest = 0;
        let mut cur = self.sup.free_list;
        while cur != 0 {
            let h = self.hdr_get(cur)?;
            if h.size > largest {
                largest = h.size;
            }
            cur = h.next;
        }
        Ok(largest)
    }

    fn sup_get(&self) -> Result<SuperBlock, Self::Error> {
        Ok(self.sup)
    }

    fn sup_put(&mut self, sup: &SuperBlock) -> Result<(), Self::Error> {
        self.sup = *sup;
        Ok(self.region.serialize_into(sup, 0)?)
    }

    fn sup_check(&self) -> Result<(), Self::Error> {
        let sup = self.region.deserialize_from::<SuperBlock>(0)?;
        if sup.magic != MAGIC_NUMBER {
            return Err(AllocError::Corrupt("Superblock magic number is gone"));
        }
        if sup.size != self.region.len() {
            return Err(AllocError::Corrupt(
                "Recorded size does not match the region",
            ));
        }
        if sup.root != *SUPERBLOCK_SIZE {
            return Err(AllocError::Corrupt("Root inode is not at its fixed offset"));
        }
        if sup.free_list > self.region.len() {
            return Err(AllocError::Corrupt("Free list head escapes the region"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../api/fs-tests/alloc_test.rs"]
mod tests;
