//! Implementation of the memory region a filesystem lives in, and the controller that
//! hands it out.
//! The region is a single contiguous range of bytes, represented by a file in the host
//! file system that is memory mapped and stored in a `Region` struct.
//! When initializing the controller, you either provide a path to a non-existing file,
//! which will be created (zero-filled) and used as the contents of the region, or a path
//! to an existing file, whose contents are adopted unchanged — this is what makes
//! remounting work: the bytes written during a previous mount come back exactly as they
//! were, at whatever virtual address the new mapping happens to land on.
//!
//! Because the mapping address changes between mounts, nothing stored inside the region
//! may ever be a host pointer. All bookkeeping above this module works with byte offsets
//! from the start of the region, and the accessors below are the only place where an
//! offset meets actual memory. Every accessor checks its bounds against the region
//! length; an offset that does not fit is reported as an error rather than followed.

use super::error;
use super::error::ApiError;
use memmap::MmapMut;
use serde::{de::DeserializeOwned, Serialize};
use std::io::prelude::*;
use std::io::{Cursor, SeekFrom};
use std::{
    fs::{remove_file, OpenOptions},
    path::{Path, PathBuf},
};

use super::types::MIN_REGION_SIZE;

/// Struct representing the byte region backing a mounted filesystem.
/// The implementation of this structure allows reading and writing raw bytes and
/// serialized records at byte offsets, after checking that the access stays inside the
/// region.
#[derive(Debug)]
pub struct Region {
    /// Total length of the region, in bytes
    len: u64,
    /// Path to the file in the host file system that backs this region
    path: PathBuf,
    /// Memory-mapped contents of the above file. This is what is manipulated in the read and write functions.
    contents: MmapMut,
}

/// Small enum, used to specify whether we expect to open a fresh region
#[derive(PartialEq, Eq, Copy, Clone)]
pub enum RegionState {
    /// Creating a new region image
    New,
    /// Loading an old region image
    Load,
}

// Import the components of this enum, so we can reuse them here
use self::RegionState::*;
impl RegionState {
    /// Convert a boolean to a `RegionState`
    pub fn new(ex: bool) -> RegionState {
        match ex {
            true => Load,
            false => New,
        }
    }
}

impl Drop for Region {
    /// This implementation of drop makes sure all writes are persisted to the backing
    /// file before we release ownership of the region.
    /// We only need to persist these writes if the file backing this region actually still exists
    fn drop(&mut self) {
        if self.path.exists() {
            self.contents.flush().unwrap();
        }
    }
}

impl Region {
    /// Core function that handles both `new` and `load`, based on the value of the
    /// switch `rs`, representing whether we want to load or create a region
    pub fn create_region<P: AsRef<Path>>(
        path: P,
        len: u64,
        rs: RegionState,
    ) -> error::Result<Region> {
        let path_buf = path.as_ref().to_path_buf();
        let mmapf = mmap_path(path, len, rs)?;
        Ok(Region {
            len,
            path: path_buf,
            contents: mmapf,
        })
    }

    /// Create a *new* region, given:
    /// - A `path` to store its image
    /// - A length `len` in bytes, which has to be at least `MIN_REGION_SIZE`
    /// This new region will have contents 0 at each address.
    /// This function will return an error if the file represented by `path` already exists.
    pub fn new<P: AsRef<Path>>(path: P, len: u64) -> error::Result<Region> {
        Region::create_region(path, len, New)
    }

    /// Load an *existing* region from its backing file.
    /// The length of the region is taken from the file's metadata.
    /// This function will return an error if the file represented by `path` does not yet
    /// exist, or is too small to ever have held a filesystem.
    pub fn load<P: AsRef<Path>>(path: P) -> error::Result<Region> {
        let len = path
            .as_ref()
            .metadata()
            .map(|m| m.len())
            .unwrap_or(0);
        Region::create_region(path, len, Load)
    }

    /// End the lifetime of this region, and remove the file backing it
    /// Assumes that you have not made any other links to the backing file
    /// Panics if removing the file fails
    pub fn destruct(self) {
        remove_file(&self.path).unwrap();
    }

    /// Length of this region in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true if the region holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Path of the file backing this region
    pub fn region_path(&self) -> &Path {
        &self.path
    }

    /// Reads bytes from the region into the `data` buffer, starting at the given `offset`.
    /// If the function does not return an error, the number of bytes read is always equal
    /// to `data.len()`.
    pub fn read_at(&self, offset: u64, data: &mut [u8]) -> error::Result<()> {
        if offset + data.len() as u64 > self.len {
            return Err(ApiError::RegionBounds(
                "Trying to read beyond the end of the region",
            ));
        }
        let start = offset as usize;
        let end = start + data.len();
        data.copy_from_slice(&self.contents[start..end]);
        Ok(())
    }

    /// Writes the bytes of the given slice into the region, starting at the given `offset`.
    /// If the function does not return an error, the number of bytes written is always
    /// equal to `data.len()`.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> error::Result<()> {
        if offset + data.len() as u64 > self.len {
            return Err(ApiError::RegionBounds(
                "Trying to write beyond the end of the region",
            ));
        }
        let start = offset as usize;
        let end = start + data.len();
        self.contents[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Overwrites `n` bytes of the region with zeroes, starting at the given `offset`.
    pub fn fill_zero(&mut self, offset: u64, n: u64) -> error::Result<()> {
        if offset + n > self.len {
            return Err(ApiError::RegionBounds(
                "Trying to zero beyond the end of the region",
            ));
        }
        let start = offset as usize;
        let end = start + n as usize;
        for b in self.contents[start..end].iter_mut() {
            *b = 0;
        }
        Ok(())
    }

    /// Read any object that implements the DeserializeOwned trait from the region,
    /// starting at the given `offset`.
    ///
    /// *EXTRA*: Note that since this method takes ownership of the deserialized data, the
    /// link with the original bytes in the region necessarily breaks. A high-performance C
    /// implementation would cast the memory in place instead; we accept the copy to keep
    /// lifetimes and mutability simple.
    pub fn deserialize_from<S>(&self, offset: u64) -> error::Result<S>
    where
        S: DeserializeOwned,
    {
        if offset > self.len {
            return Err(ApiError::RegionBounds(
                "Trying to read a record beyond the end of the region",
            ));
        }
        let mut c = Cursor::new(&self.contents[..]);
        c.seek(SeekFrom::Start(offset))?;
        Ok(bincode::deserialize_from(c)?)
    }

    /// Write any object that implements the Serialize trait into the region at the given
    /// `offset`.
    /// Goes through `write_at` so that the appropriate bounds errors get triggered.
    pub fn serialize_into<S>(&mut self, stru: &S, offset: u64) -> error::Result<()>
    where
        S: Serialize,
    {
        let stru_bin = bincode::serialize(stru)?;
        //Going through write_at so that the appropriate errors get triggered
        self.write_at(offset, &stru_bin)
    }
}

/// Either open or create the specified file path.
/// If the path already exists, check that the region represented by it is large enough to
/// hold a filesystem at all.
/// If any one of the intermediate calls fails, the result of this method is not an actual
/// region file
fn mmap_path<P: AsRef<Path>>(path: P, len: u64, rs: RegionState) -> error::Result<MmapMut> {
    let exists = RegionState::new(path.as_ref().exists());
    if exists != rs {
        if rs == Load {
            return Err(ApiError::RegionInput(
                "Tried to load a non-existing file path",
            ));
        } else {
            return Err(ApiError::RegionInput(
                "Tried to create a pre-existing file path",
            ));
        }
    }

    if len < MIN_REGION_SIZE {
        return Err(ApiError::RegionInput(
            "Region is too small to hold a filesystem",
        ));
    }

    let f = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;

    if rs == New {
        f.set_len(len)?; // The file will be extended to len bytes, filled in with 0s.
    }

    let data = unsafe { memmap::MmapOptions::new().map_mut(&f)? };
    Ok(data)
}
