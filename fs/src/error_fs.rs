//! The errors used by the filesystem layers.
//!
//! Every layer has its own error enum, and each enum embeds the one of the layer below
//! through a `#[from]` variant, so the `?` operator converts errors upward along the
//! ladder without any explicit mapping. The semantic variants (`NotFound`, `Exists`,
//! `NoSpace`, ...) sit in the layer that detects them.
//!
//! At the top, [`FsError::errno`](enum.FsError.html#method.errno) flattens whatever is
//! inside the chain into the POSIX errno value the host harness places in the caller's
//! error slot. Each enum carries its own `errno` method and the top one delegates, so
//! the mapping lives next to the variants it maps.

use regionfs_api::error::ApiError;
use thiserror::Error;

///Error type used in the allocation layer
#[derive(Error, Debug)]
pub enum AllocError {
    ///errors from the region controller
    #[error("Error in the region controller")]
    Api(#[from] ApiError),

    ///no single free block can satisfy an allocation
    #[error("Not enough free space in the region")]
    NoSpace,

    ///the superblock or free list failed an invariant check
    #[error("Region state is corrupt: {0}")]
    Corrupt(&'static str),

    ///errors regarding input to the allocator
    #[error("Invalid allocator input: {0}")]
    AllocInput(&'static str),
}

impl AllocError {
    ///The POSIX errno value for this error
    pub fn errno(&self) -> i32 {
        match self {
            AllocError::NoSpace => libc::ENOSPC,
            _ => libc::EFAULT,
        }
    }
}

///Error type used in the inode layer
#[derive(Error, Debug)]
pub enum InodeError {
    ///errors from the allocation layer
    #[error("Error in the allocation layer")]
    Alloc(#[from] AllocError),

    ///errors from the region controller
    #[error("Error in the region controller")]
    Api(#[from] ApiError),

    ///errors regarding input to the inode layer
    #[error("Invalid inode input: {0}")]
    InodeInput(&'static str),
}

impl InodeError {
    ///The POSIX errno value for this error
    pub fn errno(&self) -> i32 {
        match self {
            InodeError::Alloc(e) => e.errno(),
            _ => libc::EFAULT,
        }
    }
}

///Error type used in the directory layer
#[derive(Error, Debug)]
pub enum DirError {
    ///errors from the inode layer
    #[error("Error in the inode layer")]
    Inode(#[from] InodeError),

    ///errors from the region controller
    #[error("Error in the region controller")]
    Api(#[from] ApiError),

    ///errors regarding input to the directory layer
    #[error("Invalid directory input: {0}")]
    DirInput(&'static str),
}

impl DirError {
    ///The POSIX errno value for this error
    pub fn errno(&self) -> i32 {
        match self {
            DirError::Inode(e) => e.errno(),
            _ => libc::EFAULT,
        }
    }
}

///Error type used in the path layer
#[derive(Error, Debug)]
pub enum PathError {
    ///errors from the directory layer
    #[error("Error in the directory layer")]
    Dir(#[from] DirError),

    ///errors from the region controller
    #[error("Error in the region controller")]
    Api(#[from] ApiError),

    ///a path component does not exist, or the path is not absolute
    #[error("No such file or directory")]
    NotFound,

    ///a directory was required but something else was found
    #[error("Not a directory")]
    NotDir,

    ///a regular file was required but a directory was found
    #[error("Is a directory")]
    IsDir,

    ///the name to create already exists in its parent
    #[error("File or directory already exists")]
    Exists,

    ///a path component exceeds the maximum name length
    #[error("Name is too long")]
    NameTooLong,

    ///a directory that had to be empty is not
    #[error("Directory is not empty")]
    NotEmpty,

    ///a rename would move a directory below itself
    #[error("Cannot move a directory into itself")]
    Cycle,
}

impl PathError {
    ///The POSIX errno value for this error
    pub fn errno(&self) -> i32 {
        match self {
            PathError::Dir(e) => e.errno(),
            PathError::Api(_) => libc::EFAULT,
            PathError::NotFound => libc::ENOENT,
            PathError::NotDir => libc::ENOTDIR,
            PathError::IsDir => libc::EISDIR,
            PathError::Exists => libc::EEXIST,
            PathError::NameTooLong => libc::ENAMETOOLONG,
            PathError::NotEmpty => libc::ENOTEMPTY,
            PathError::Cycle => libc::EINVAL,
        }
    }
}

///Error type used in the file layer
#[derive(Error, Debug)]
pub enum FileError {
    ///errors from the path layer
    #[error("Error in the path layer")]
    Path(#[from] PathError),

    ///errors from the region controller
    #[error("Error in the region controller")]
    Api(#[from] ApiError),

    ///file content was requested of a directory
    #[error("Is a directory")]
    IsDir,
}

impl FileError {
    ///The POSIX errno value for this error
    pub fn errno(&self) -> i32 {
        match self {
            FileError::Path(e) => e.errno(),
            FileError::Api(_) => libc::EFAULT,
            FileError::IsDir => libc::EISDIR,
        }
    }
}

///Error type used by the POSIX operation surface
#[derive(Error, Debug)]
pub enum FsError {
    ///errors from the file layer
    #[error("Error in the file layer")]
    File(#[from] FileError),

    ///a negative size or offset was passed in an `off_t`-typed argument
    #[error("Negative size or offset")]
    BadOffset,

    ///catch-all for errors outside of the layer chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// The operation surface detects a few path-level conditions itself; let those travel
// without spelling out the intermediate wrapping.
impl From<PathError> for FsError {
    fn from(e: PathError) -> FsError {
        FsError::File(e.into())
    }
}

impl FsError {
    ///The POSIX errno value for this error, as the host harness reports it
    pub fn errno(&self) -> i32 {
        match self {
            FsError::File(e) => e.errno(),
            FsError::BadOffset => libc::EFAULT,
            FsError::Other(_) => libc::EFAULT,
        }
    }
}
