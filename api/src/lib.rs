//! Core API of the region filesystem.
//!
//! This crate contains everything the implementation crate and its host
//! harness agree on: the memory-mapped region controller, the on-region
//! record types together with their serialized sizes, the trait ladder that
//! the filesystem layers implement, and the API-level error type.
//!
//! Placing the modules here ensures that Cargo notices them as part of the build process.

#![deny(missing_docs)]

//Implementation of the region controller
pub mod controller;
pub mod error;

//Basic modules for types
pub mod types;

//Traits the filesystem layers implement
pub mod fs;
