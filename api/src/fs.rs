//! Collection of the traits the filesystem layers implement.
//! Each layer of the system is a struct wrapping the layer below it, and every layer
//! implements all the traits up to and including its own; the traits below form a ladder
//! of supertraits in the same order. The bottom of the ladder owns the region; everything
//! above it only ever sees byte offsets.
//!
//! Keeping the trait definitions in one place, away from the implementations, also keeps
//! the documented contracts in one place: the comments below are the authoritative
//! description of what each operation does, and the per-layer modules only document
//! their deviations and internals.

use super::{
    controller::Region,
    types::{FileStat, FsStat, FType, Inode, SuperBlock, TimeSpec},
};
use std::{error, path::Path};

/// General trait that each filesystem layer implements, allowing us to set up, load and
/// tear down a filesystem.
/// Additionally, this trait defines the error type that is used in all of the other
/// traits (which will require implementing this trait).
///
/// Mounting is idempotent: `mountfs` initializes the region only when its superblock
/// does not carry the magic number yet, and adopts it unchanged otherwise. Mounting the
/// same region twice in a row without intervening operations therefore changes no byte.
pub trait FileSysSupport: Sized {
    /// The type of the errors of this layer.
    ///
    /// Note the “supertrait” the error type must implement:
    /// [`error::Error`](https://doc.rust-lang.org/std/error/trait.Error.html),
    /// the base trait for all Rust errors.
    type Error: error::Error;

    /// Create a fresh, zeroed region of `len` bytes backed by the file at `path`, and
    /// mount a new filesystem in it.
    /// The region must be at least `MIN_REGION_SIZE` bytes long.
    ///
    /// *EXTRA*: mkfs is inspired by the unix command of the same name (although this
    /// version also immediately mounts the file system)
    fn mkfs<P: AsRef<Path>>(path: P, len: u64) -> Result<Self, Self::Error>;

    /// Given an existing `Region` called `region`, mount a filesystem in it.
    /// If the region's superblock carries the magic number, its recorded size has to
    /// match the region length, and the existing state is adopted as-is; nothing is
    /// written. Otherwise the region is initialized first: superblock, root inode
    /// (named "/", with `num_children` 1 and its parent slot 0), the root's initial
    /// children table, and a single free block covering the rest of the region.
    /// A region that carries neither the magic number nor all zeroes is wiped beyond
    /// the superblock before initialization.
    fn mountfs(region: Region) -> Result<Self, Self::Error>;

    /// Unmount the given file system, thereby consuming it
    /// Returns the region backing it, so the host can flush or reload it.
    /// The implementation of this method should be almost trivial
    fn unmountfs(self) -> Region;
}

/// This trait adds the region allocator to the filesystem.
///
/// Free space is kept as a single list of free blocks, threaded through the region in
/// ascending offset order and headed by the superblock's `free_list` field. Every block,
/// free or allocated, is preceded by a `BlockHeader` recording its payload size; the
/// offsets handed out and accepted by the methods below always point at the payload,
/// one header past the block itself. Physically adjacent free blocks are merged on
/// every release, so external fragmentation stays bounded by the live allocations.
pub trait AllocSupport: FileSysSupport {
    /// Allocate `size` bytes and return the offset of the new payload.
    /// Requests smaller than one block header are rounded up to it, so that any payload
    /// can later rejoin the free list.
    /// The free block with the most room is chosen and the allocation carved from its
    /// head; the remainder stays on the free list in the same position, unless it is too
    /// small to stand alone as a block, in which case the whole block is handed out.
    /// Errors if no single free block can satisfy the request; the allocator never
    /// partially fulfils.
    fn m_alloc(&mut self, size: u64) -> Result<u64, Self::Error>;

    /// Resize the allocation at `off` to `size` bytes, returning the payload's new
    /// offset.
    /// Shrinking happens in place; the tail is carved off and freed when it is big
    /// enough to stand alone as a block, and silently kept otherwise. Growing first
    /// tries to extend in place by consuming a free block that starts exactly where the
    /// payload ends; only if there is none does the payload move (allocate, copy, free).
    /// An `off` of 0 is a plain allocation; a `size` of 0 frees the allocation and
    /// returns 0.
    fn m_realloc(&mut self, off: u64, size: u64) -> Result<u64, Self::Error>;

    /// Release the allocation at `off`.
    /// The block re-enters the free list at its address-ordered position and is merged
    /// with its physical neighbors when they are free too.
    fn m_free(&mut self, off: u64) -> Result<(), Self::Error>;

    /// The payload size of the allocation at `off`, read back from its header.
    /// This is at least the size that was requested, but can be larger when the
    /// allocator handed out a whole block rather than splitting it.
    fn m_size(&self, off: u64) -> Result<u64, Self::Error>;

    /// Total free payload bytes, summed over the free list.
    /// Backs the statfs free-block count.
    fn free_size(&self) -> Result<u64, Self::Error>;

    /// The payload size of the largest free block.
    /// An allocation of any size up to this value is guaranteed to succeed.
    fn largest_free(&self) -> Result<u64, Self::Error>;

    /// Get the superblock describing the current file system
    fn sup_get(&self) -> Result<SuperBlock, Self::Error>;

    /// Write the given superblock to the region (and cache it, depending on how the
    /// layer is implemented)
    fn sup_put(&mut self, sup: &SuperBlock) -> Result<(), Self::Error>;

    /// Verify that the superblock in the region still describes a sane mount: correct
    /// magic number, recorded size matching the region length, root and free-list
    /// offsets in bounds. Errors if any check fails.
    /// Every operation of the POSIX surface calls this before touching the tree.
    fn sup_check(&self) -> Result<(), Self::Error>;
}

/// This trait adds the abstraction of inodes to the filesystem.
/// An inode is addressed by the region offset of its record; the in-memory handle
/// `Inode` pairs that offset with the deserialized record, and `i_put` writes a possibly
/// modified handle back to where it came from.
pub trait InodeSupport: AllocSupport {
    /// Read the inode record at offset `off` and wrap it into an inode handle.
    /// Errors if `off` is 0 or the record would not fit inside the region.
    fn i_get(&self, off: u64) -> Result<Inode, Self::Error>;

    /// Write the given inode back to the region at the offset it was read from
    fn i_put(&mut self, ino: &Inode) -> Result<(), Self::Error>;

    /// The root directory's inode, at its fixed offset right after the superblock
    fn i_root(&self) -> Result<Inode, Self::Error>;

    /// Release the entire chunk chain of the given file inode (payloads first, then the
    /// records), leaving an empty file of size 0, and write the inode back.
    /// Both the given `inode` and the record in the region are updated.
    /// Errors if the inode is a directory.
    fn i_trunc(&mut self, inode: &mut Inode) -> Result<(), Self::Error>;
}

/// This trait adds the abstraction of directories and their children tables to the
/// filesystem.
///
/// A directory's children live in one allocation holding a contiguous array of inode
/// offsets. Slot 0 is reserved for the parent directory's offset (0 for the root) and is
/// counted by `num_children`, so an empty directory has one child. The table's slot
/// capacity is not stored anywhere; it is recovered from the allocation's own header as
/// `m_size / SLOT_SIZE`.
///
/// The methods of this trait do not resolve paths and do not check name uniqueness;
/// that is the path layer's job. They maintain the table mechanics: lookup, append with
/// geometric growth, and swap-with-last removal.
pub trait DirectorySupport: InodeSupport {
    /// Look for a child named `name` in the given directory inode.
    /// Scans slots 1 up to `num_children`; slot 0 is the parent and is never matched.
    /// If found, returns the child's inode and the slot it occupies; `None` otherwise.
    /// Errors if the given inode is not a directory.
    fn dirlookup(&self, dir: &Inode, name: &str) -> Result<Option<(Inode, u64)>, Self::Error>;

    /// The inode offset stored in the given slot of the directory's children table.
    /// Slot 0 yields the parent's offset, which is 0 for the root.
    /// Errors if the slot is past `num_children`.
    fn dir_child(&self, dir: &Inode, slot: u64) -> Result<u64, Self::Error>;

    /// Append the inode at `child_off` to the directory's children table, growing the
    /// table to double its byte capacity first when it is full.
    /// Updates the directory's child count and modification time, writes it back, and
    /// returns the slot the child ended up in.
    /// Does *not* check whether a child with the same name already exists.
    fn dirlink(&mut self, dir: &mut Inode, child_off: u64) -> Result<u64, Self::Error>;

    /// Remove the given slot from the directory's children table by moving the last
    /// child into it and decrementing the child count.
    /// Updates the directory's modification time and writes it back.
    /// Errors on slot 0 (the parent slot cannot be removed) and on slots past the end.
    fn dir_compact(&mut self, dir: &mut Inode, slot: u64) -> Result<(), Self::Error>;

    /// Allocate and initialize a fresh children table for a directory whose parent
    /// lives at `parent_off`: `DIR_INIT_SLOTS` slots, slot 0 set to `parent_off`, the
    /// rest zeroed. Returns the table's payload offset.
    fn dir_alloc_table(&mut self, parent_off: u64) -> Result<u64, Self::Error>;
}

/// This trait adds paths to the filesystem: resolution of absolute paths to inodes, and
/// the path-level tree mutations (create, unlink, rmdir, rename).
///
/// All paths are absolute and `/`-separated. The special names `.` and `..` can appear
/// anywhere; `.` stays in the current directory and `..` moves to the parent, through
/// the parent slot of the children table rather than by string manipulation. `..` at the
/// root stays at the root. Empty components (from doubled or trailing slashes) are
/// ignored.
pub trait PathSupport: DirectorySupport {
    /// Look up the inode at the given absolute path (the final inode can be either a
    /// file or a directory).
    ///
    /// Errors if
    /// - the path does not start with "/"
    /// - any named component does not exist
    /// - any component other than the last resolves to something that is not a
    ///   directory.
    fn resolve_path(&self, path: &str) -> Result<Inode, Self::Error>;

    /// Resolve all but the last component of the given path, and return the resulting
    /// inode together with the final component.
    /// This is what the create-style operations use to find the directory they mutate.
    /// Errors as `resolve_path` does for the leading components; additionally errors if
    /// the final component is missing, is `.` or `..`, or exceeds `NAME_MAX_LEN` bytes.
    fn resolve_parent(&self, path: &str) -> Result<(Inode, String), Self::Error>;

    /// Create a new file or directory at the given path, where the last component of
    /// the path is the name for the new inode.
    /// Returns the newly created inode in case of success.
    /// New directories start out with an empty children table of `DIR_INIT_SLOTS`
    /// slots, slot 0 pointing back at the parent.
    ///
    /// Errors if
    /// - the path's prefix does not resolve to an existing directory
    /// - an entry with the same name already exists in the parent
    /// - the final component is invalid (empty, `.`/`..`, or too long)
    /// - the region is out of space; nothing is left allocated in that case.
    fn t_create(&mut self, path: &str, kind: FType) -> Result<Inode, Self::Error>;

    /// Remove the regular file at the given path: release its chunk chain and its
    /// inode, and take it out of its parent's children table.
    /// Errors if the path does not resolve, or resolves to a directory.
    fn t_unlink(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Remove the directory at the given path: release its children table and its
    /// inode, and take it out of its parent's children table.
    /// Errors if the path does not resolve, resolves to a file, or the directory still
    /// has children besides the parent slot.
    fn t_rmdir(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Move or rename the inode at `from` to `to`.
    ///
    /// In case the target exists, it has to match the source's type — replacing a
    /// directory additionally requires it to be empty — and it is removed first. Moving
    /// a directory into itself or any of its descendants is refused. Renaming a path
    /// onto itself does nothing.
    ///
    /// The operation is ordered so that a failure partway through never loses the
    /// source: the inode is inserted into the target directory (the only step that can
    /// run out of space) before it is removed from the source directory, and its name
    /// is rewritten last.
    fn t_rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error>;
}

/// This trait additionally provides support to read and write file contents through
/// inodes.
///
/// A file's bytes live in a singly-linked chain of file-block records, each pointing at
/// a payload allocation of up to `BLOCK_SIZE` bytes. The sum of the blocks' fill levels
/// equals the file's logical size; every block before the last is filled to capacity.
/// Bytes between the end of the written data and the logical size ("holes", created by
/// growing truncates or writes past the end) are explicit zeroes in the payloads.
pub trait FileRWSupport: PathSupport {
    /// Read bytes from the file at byte offset `off` into `buf`.
    /// Reads stop at the end of the file; the number of bytes read is returned, which
    /// is 0 when `off` is at or past the end.
    /// Updates the inode's access time, both in place and in the region.
    /// Errors if the inode is a directory.
    fn i_read(&mut self, inode: &mut Inode, buf: &mut [u8], off: u64) -> Result<u64, Self::Error>;

    /// Write the bytes of `buf` into the file at byte offset `off`, allocating blocks
    /// as needed.
    /// A write starting past the end of the file first extends it with explicit zeroes
    /// up to `off`. The file's size grows to `off + buf.len()` when the write reaches
    /// past the old end.
    /// Returns the number of bytes written, which is `buf.len()` unless the region
    /// fills up mid-write: a write that can make no progress at all errors instead.
    /// Updates the inode's access and modification times.
    /// Errors if the inode is a directory.
    fn i_write(&mut self, inode: &mut Inode, buf: &[u8], off: u64) -> Result<u64, Self::Error>;

    /// Change the file's size to exactly `size` bytes.
    /// Growing appends explicit zeroes; shrinking truncates the chain at the new end,
    /// returns what it can of the final block's payload to the allocator, and releases
    /// every block past it. A growing resize that runs out of space restores the
    /// previous size before erroring, so already committed bytes stay readable.
    /// Updates the inode's modification time.
    /// Errors if the inode is a directory.
    fn i_resize(&mut self, inode: &mut Inode, size: u64) -> Result<(), Self::Error>;
}

/// The thirteen POSIX-style entry points, layered over everything below.
///
/// This is the surface the host harness dispatches into. Every method starts by
/// re-verifying the superblock (`sup_check`), then resolves its path and performs the
/// operation. Failures are reported as this layer's error value, which maps onto a
/// POSIX errno for the harness to place in the caller's error slot; the mapping is part
/// of the implementation crate.
pub trait PosixSupport: FileRWSupport {
    /// Stat the inode at `path`: uid and gid are echoed from the caller, the mode is
    /// the fixed published one (`S_IFDIR|0755` or `S_IFREG|0755`), directories report
    /// 2 + number of subdirectories as their link count and files report 1.
    fn getattr(&self, uid: u32, gid: u32, path: &str) -> Result<FileStat, Self::Error>;

    /// The names of the entries in the directory at `path`, in table order.
    /// `.` and `..` are not part of the listing (the parent reference is the unnamed
    /// slot 0, so there is nothing to filter).
    fn readdir(&self, path: &str) -> Result<Vec<String>, Self::Error>;

    /// Create a regular file of size zero at `path`.
    fn mknod(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Create an empty directory at `path`.
    fn mkdir(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Remove the regular file at `path`.
    fn unlink(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Remove the empty directory at `path`.
    fn rmdir(&mut self, path: &str) -> Result<(), Self::Error>;

    /// Move or rename `from` to `to`; see `t_rename` for the exact semantics.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error>;

    /// Set the size of the file at `path` to `size` bytes, growing with zeroes or
    /// shrinking. A negative `size` is reported as EFAULT.
    fn truncate(&mut self, path: &str, size: i64) -> Result<(), Self::Error>;

    /// Check that `path` resolves to an existing inode. No file handle is produced;
    /// this is purely the existence check the open syscall reduces to here.
    fn open(&self, path: &str) -> Result<(), Self::Error>;

    /// Read up to `buf.len()` bytes from the file at `path`, starting at byte `offset`.
    /// Returns the number of bytes read; 0 signals end-of-file. A negative `offset` is
    /// reported as EFAULT.
    fn read(&mut self, path: &str, buf: &mut [u8], offset: i64) -> Result<u64, Self::Error>;

    /// Write the bytes of `buf` to the file at `path`, starting at byte `offset`.
    /// Returns the number of bytes written. A negative `offset` is reported as EFAULT.
    fn write(&mut self, path: &str, buf: &[u8], offset: i64) -> Result<u64, Self::Error>;

    /// Overwrite the access and modification times of the inode at `path`.
    fn utimens(&mut self, path: &str, atime: TimeSpec, mtime: TimeSpec)
        -> Result<(), Self::Error>;

    /// Filesystem statistics: total and free space in `BLOCK_SIZE` units, and the
    /// maximum name length.
    fn statfs(&self) -> Result<FsStat, Self::Error>;
}
