//! The errors used in the API crate.
//!
//! Every fallible function in this crate returns a [`Result`](type.Result.html) with the
//! [`ApiError`](enum.ApiError.html) type below. The implementation crate defines one error
//! enum per filesystem layer and embeds this type at the bottom of the chain, so that the
//! `?` operator can convert upwards at every call boundary.
//!
//! The [`thiserror`](https://docs.rs/thiserror/1.0.21/thiserror/) annotations take care of
//! the `Display` and `Error` boilerplate; the `#[from]` tags generate the `From`
//! implementations that make `?` work across error types.

use std::io;
use thiserror::Error;

///Error type used in the API crate.
///The `#[error]` tag generates the corresponding case of the derived `Display`
///implementation, and `#[from]` wraps foreign errors so they travel up unchanged.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Error caused when performing IO on the backing file of a region
    #[error("Issue using IO in the region controller")]
    RegionIO(#[from] io::Error),
    /// Error caused when (de)serializing an on-region record
    #[error("Issue with serialization in the region controller")]
    RegionSerialize(#[from] bincode::Error),
    /// Invalid input to the region controller
    /// Note: use `String` instead of `&'static str` if you want non-literal, i.e. non-hard-coded, runtime error messages
    #[error("Invalid region input: {0}")]
    RegionInput(&'static str),
    /// An access that would fall outside of the region
    #[error("Region access out of bounds: {0}")]
    RegionBounds(&'static str),

    ///Catch-all for errors that no other variant captures.
    ///The [`anyhow`](https://docs.rs/anyhow/1.0.33/anyhow/) package allows any error
    ///implementing the `Error` trait to be cast into this variant with the `?` operator,
    ///which is convenient at the edges of the system where no handling happens anymore.
    #[error(transparent)]
    Other(#[from] anyhow::Error), // source and Display delegate to anyhow::Error
}

/// Define a generic alias for a `Result` with the error type `ApiError`.
pub type Result<T> = std::result::Result<T, ApiError>;
