//! Module containing the types used in this project.
//!
//! The types in this module fall into two groups. The first group is the on-region
//! records: `SuperBlock`, `BlockHeader`, `DInode` (with its `IKind` payload and `Name`
//! buffer), and `FileBlock`. These are written into the region with
//! [`bincode`](https://docs.rs/bincode/1.3.1/bincode/), whose default configuration
//! encodes integers fixed-width and little-endian — the serialized bytes are therefore
//! identical on every mount, which is what makes a region written by one process
//! readable by the next. Their serialized sizes are computed once at startup (see the
//! `lazy_static` blocks below) and all layout arithmetic goes through those constants.
//!
//! The second group is host-side values that never enter the region: `Inode` (a record
//! paired with the offset it was read from), `FileStat` and `FsStat` (the results of the
//! getattr and statfs operations), and the `FType` tag used when creating files.

use lazy_static::lazy_static;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Magic number identifying an initialized region
pub const MAGIC_NUMBER: u32 = 0x0ADD_BEEF;

/// Hard-coded number of bytes a file or directory name can contain
pub const NAME_MAX_LEN: usize = 255;

/// Size of the on-region name buffer: `NAME_MAX_LEN` bytes plus the NUL terminator
pub const NAME_BUF_LEN: usize = NAME_MAX_LEN + 1;

/// Ceiling on the payload capacity of a single file block, in bytes
pub const BLOCK_SIZE: u64 = 1024;

/// Smallest region a filesystem can be mounted in; the host guarantees at least this
pub const MIN_REGION_SIZE: u64 = 2048;

/// Number of slots a directory's children table starts out with
pub const DIR_INIT_SLOTS: u64 = 4;

/// Serialized size of one children-table slot (a `u64` offset)
pub const SLOT_SIZE: u64 = 8;

/// A point in time, as seconds and nanoseconds since the epoch.
/// The same shape as the C `timespec`, so timestamps survive the region byte-for-byte.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpec {
    /// Whole seconds since the epoch
    pub sec: i64,
    /// Nanosecond remainder
    pub nsec: i64,
}

impl TimeSpec {
    /// The current wall-clock time. Clocks set before the epoch saturate to it.
    pub fn now() -> TimeSpec {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => TimeSpec {
                sec: d.as_secs() as i64,
                nsec: d.subsec_nanos() as i64,
            },
            Err(_) => TimeSpec::default(),
        }
    }
}

/// A NUL-terminated name buffer of `NAME_BUF_LEN` bytes.
/// Names can be up to `NAME_MAX_LEN` bytes long; shorter names are terminated by a 0
/// byte, and the bytes after the terminator are 0 as well.
///
/// Serde only derives array support up to 32 elements, so the `Serialize` and
/// `Deserialize` implementations below are written by hand as a 256-element tuple; the
/// bincode encoding of that tuple is exactly the 256 raw bytes of the buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Name([u8; NAME_BUF_LEN]);

impl Name {
    /// Create a name from a string slice.
    /// Returns `None` if the name is empty or longer than `NAME_MAX_LEN` bytes.
    pub fn new(name: &str) -> Option<Name> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > NAME_MAX_LEN {
            return None;
        }
        let mut buf = [0u8; NAME_BUF_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Name(buf))
    }

    /// The name of the root directory, "/"
    pub fn root() -> Name {
        let mut buf = [0u8; NAME_BUF_LEN];
        buf[0] = b'/';
        Name(buf)
    }

    /// The bytes of this name, up to but not including the NUL terminator
    pub fn as_bytes(&self) -> &[u8] {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(NAME_BUF_LEN);
        &self.0[..end]
    }

    /// Does this name equal the given string?
    pub fn matches(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }

    /// The name as an owned `String`, replacing invalid UTF-8 if any crept in
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }
}

impl Default for Name {
    fn default() -> Name {
        Name([0; NAME_BUF_LEN])
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Name({:?})", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl Serialize for Name {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut tup = serializer.serialize_tuple(NAME_BUF_LEN)?;
        for b in self.0.iter() {
            tup.serialize_element(b)?;
        }
        tup.end()
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D>(deserializer: D) -> Result<Name, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct NameVisitor;

        impl<'de> Visitor<'de> for NameVisitor {
            type Value = Name;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a name buffer of {} bytes", NAME_BUF_LEN)
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Name, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut buf = [0u8; NAME_BUF_LEN];
                for (i, b) in buf.iter_mut().enumerate() {
                    *b = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                Ok(Name(buf))
            }
        }

        deserializer.deserialize_tuple(NAME_BUF_LEN, NameVisitor)
    }
}

/// Structure describing the whole mount, stored at offset 0 of the region.
/// This is the first record read on every operation: its magic number tells a fresh
/// region apart from an initialized one, and its `free_list` field is the head of the
/// allocator's free list.
///
/// The layout of an initialized region is as follows:
///     \[super block | root inode | root children table | allocator-managed space\]
/// , where each component has the following meaning:
///
/// 1. *super block*: this record.
/// 2. *root inode*: the `DInode` of the directory "/", at the fixed offset
///    `SUPERBLOCK_SIZE`. It is written exactly once, when the region is first mounted.
/// 3. *root children table*: the root's initial table of `DIR_INIT_SLOTS` child slots,
///    preceded by its allocation header like every other allocation.
/// 4. *allocator-managed space*: the remainder of the region, carved into blocks by the
///    free-list allocator. Inodes, children tables, file-block records and file payloads
///    all live here.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    ///Magic number identifying the file system; `MAGIC_NUMBER` once initialized
    pub magic: u32,
    ///Total size of the region in bytes, recorded at first mount\
    ///A region whose length no longer matches this value is corrupt
    pub size: u64,
    ///Offset of the root inode\
    ///Always `SUPERBLOCK_SIZE`; stored anyway so the region is self-describing
    pub root: u64,
    ///Offset of the header of the first free block, in ascending address order\
    ///0 means the allocator is exhausted
    pub free_list: u64,
}

/// Header preceding every allocator block, free or allocated.
/// `size` is the usable payload byte count and does *not* include the header itself.
/// For a block on the free list, `next` is the offset of the next free block's header
/// (0 terminates the list); for an allocated block, `next` is 0 and the payload starts
/// right after the header.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    ///Usable bytes in this block, excluding this header
    pub size: u64,
    ///Offset of the next free block's header; 0 if none, and 0 while allocated
    pub next: u64,
}

/// Enum describing file types
/// Currently, either a file `TFile` or a directory `TDir`
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum FType {
    /// Directory file type
    TDir,
    /// Regular file type
    TFile,
}

/// The type-specific half of an inode.
/// Both variants serialize to the same number of bytes, so the size of a `DInode` does
/// not depend on which variant it holds (the serialization tests assert this).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IKind {
    /// A regular file
    File {
        /// Logical size of the file in bytes
        size: u64,
        /// Offset of the first file-block record; 0 if the file is empty
        first_block: u64,
    },
    /// A directory
    Dir {
        /// Number of children, including the reserved parent slot
        num_children: u64,
        /// Offset of the children table (a contiguous array of inode offsets)
        children: u64,
    },
}

impl Default for IKind {
    fn default() -> IKind {
        IKind::File {
            size: 0,
            first_block: 0,
        }
    }
}

/// Struct describing the data held by an inode in the region.
/// One uniform record represents both files and directories; the `kind` field carries
/// the tag and the type-specific payload.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct DInode {
    /// Name of the file or directory within its parent; "/" for the root
    pub name: Name,
    /// Time of last access
    pub atime: TimeSpec,
    /// Time of last modification
    pub mtime: TimeSpec,
    /// File or directory payload
    pub kind: IKind,
}

impl DInode {
    /// A fresh, empty regular file
    pub fn new_file(name: Name, now: TimeSpec) -> DInode {
        DInode {
            name,
            atime: now,
            mtime: now,
            kind: IKind::File {
                size: 0,
                first_block: 0,
            },
        }
    }

    /// A fresh directory with the given children table
    pub fn new_dir(name: Name, now: TimeSpec, num_children: u64, children: u64) -> DInode {
        DInode {
            name,
            atime: now,
            mtime: now,
            kind: IKind::Dir {
                num_children,
                children,
            },
        }
    }

    /// The file type of this inode
    pub fn ft(&self) -> FType {
        match self.kind {
            IKind::File { .. } => FType::TFile,
            IKind::Dir { .. } => FType::TDir,
        }
    }

    /// Is this inode a directory?
    pub fn is_dir(&self) -> bool {
        self.ft() == FType::TDir
    }

    /// Is this inode a regular file?
    pub fn is_file(&self) -> bool {
        self.ft() == FType::TFile
    }

    /// The size and first block offset, if this inode is a file
    pub fn file_parts(&self) -> Option<(u64, u64)> {
        match self.kind {
            IKind::File { size, first_block } => Some((size, first_block)),
            IKind::Dir { .. } => None,
        }
    }

    /// The child count and children table offset, if this inode is a directory
    pub fn dir_parts(&self) -> Option<(u64, u64)> {
        match self.kind {
            IKind::Dir {
                num_children,
                children,
            } => Some((num_children, children)),
            IKind::File { .. } => None,
        }
    }
}

/// Wrapper around region inodes `DInode` used for in-memory inodes.
/// Additionally contains the region offset `off` the record was read from.
/// This information is not required as long as the inode is stored in the region, as it
/// is implicit from its position there, but a loose record would otherwise not know
/// where to write itself back.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Inode {
    /// Region offset of this inode's record
    pub off: u64,
    /// The region contents corresponding to `off`
    pub node: DInode,
}

impl Inode {
    /// Create a new inode handle
    pub fn new(off: u64, node: DInode) -> Inode {
        Inode { off, node }
    }
}

/// One link of a file's chunk chain.
/// The payload bytes do not follow this record; they live in a separate allocation at
/// `data`, so record and payload can be allocated and released independently.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileBlock {
    /// Payload capacity of this block, at most `BLOCK_SIZE` bytes
    pub capacity: u64,
    /// Bytes of the payload currently holding file content
    pub used: u64,
    /// Offset of the next file-block record; 0 terminates the chain
    pub next: u64,
    /// Offset of this block's payload allocation
    pub data: u64,
}

/// The result of a getattr operation, shaped like the fields of `struct stat` the host
/// harness actually forwards. Never stored in the region.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Owner user id, as supplied by the caller
    pub uid: u32,
    /// Owner group id, as supplied by the caller
    pub gid: u32,
    /// File mode: `S_IFDIR | 0755` or `S_IFREG | 0755`
    pub mode: u32,
    /// Link count: 2 plus the number of subdirectories for directories, 1 for files
    pub nlink: u64,
    /// Logical size in bytes; 0 for directories
    pub size: u64,
    /// Time of last access
    pub atime: TimeSpec,
    /// Time of last modification
    pub mtime: TimeSpec,
}

/// The result of a statfs operation. Never stored in the region.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    /// Block size the statistics are expressed in (`BLOCK_SIZE`)
    pub block_size: u64,
    /// Total number of blocks in the region
    pub blocks: u64,
    /// Number of free blocks
    pub blocks_free: u64,
    /// Number of blocks available to unprivileged users; equal to `blocks_free`
    pub blocks_avail: u64,
    /// Maximum length of a file or directory name
    pub name_max: u64,
}

lazy_static! {
    /// Serialized size of the superblock, in bytes.
    /// This size can only be found out at runtime, which is the reason why we have to wrap this code in a `lazy_static` macro.
    /// Notice the use of the `ref` keyword; `SUPERBLOCK_SIZE` is a reference to an `u64` number, that will only be filled in at runtime.
    /// The root inode lives at exactly this offset.
    pub static ref SUPERBLOCK_SIZE: u64 =
        bincode::serialize(&SuperBlock::default()).unwrap().len() as u64;

    /// Serialized size of an allocator block header, in bytes.
    /// A block's payload starts this many bytes past its header offset, and it doubles
    /// as the minimum allocation size, so any freed payload can hold a free-list link.
    pub static ref BLOCK_HEADER_SIZE: u64 =
        bincode::serialize(&BlockHeader::default()).unwrap().len() as u64;

    /// Serialized size of an inode record, in bytes.
    /// For similar reasons, again wrapped in the `lazy_static!` macro.
    pub static ref INODE_SIZE: u64 =
        bincode::serialize(&DInode::default()).unwrap().len() as u64;

    /// Serialized size of a file-block record, in bytes.
    pub static ref FILE_BLOCK_SIZE: u64 =
        bincode::serialize(&FileBlock::default()).unwrap().len() as u64;
}
