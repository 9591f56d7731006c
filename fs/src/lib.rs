//! An in-memory POSIX-style filesystem living in a single byte region.
//!
//! The filesystem is built as a ladder of layers, bottom to top:
//!
//! 1. [`alloc_support`](alloc_support/index.html) — mounting and the free-list region
//!    allocator. The only layer that owns the region.
//! 2. [`inode_support`](inode_support/index.html) — inode records at region offsets.
//! 3. [`dir_support`](dir_support/index.html) — directory children tables.
//! 4. [`path_support`](path_support/index.html) — path resolution and the tree
//!    mutations (create, unlink, rmdir, rename).
//! 5. [`file_support`](file_support/index.html) — file contents as chunk chains.
//! 6. [`posix_support`](posix_support/index.html) — the thirteen POSIX entry points.
//!
//! Each layer is a struct wrapping the one below it and re-implementing the lower
//! traits by delegation, so any layer can be used (and tested) on its own. The traits
//! themselves, the on-region record types and the region controller live in the
//! `regionfs_api` crate; this crate provides the semantics.
//!
//! Nothing in the region is ever a host pointer. Directories reference their children,
//! files reference their data blocks, and the allocator threads its free list, all as
//! byte offsets from the start of the region, with 0 standing for "absent". That is
//! what lets the backing file be mapped at a different virtual address on every mount
//! and still come up intact.

#![deny(missing_docs)]

// The errors used by the different layers
pub mod error_fs;

// The layers, bottom to top
pub mod alloc_support;
pub mod inode_support;
pub mod dir_support;
pub mod path_support;
pub mod file_support;
pub mod posix_support;
