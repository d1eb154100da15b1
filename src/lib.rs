//! Oxibsdiff: bsdiff-compatible binary diffing and patching in Rust.
//!
//! The crate provides:
//! - The suffix-array diff engine (`suffix`, `diff`)
//! - Patch writing and reading for the `BSDIFF40` and `BSDF2` formats
//!   (`writer`, `reader`, `format`)
//! - Patch application (`patch`)
//! - Pluggable stream compressors (`compress`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use oxibsdiff::diff;
//! use oxibsdiff::patch;
//! use oxibsdiff::writer::WriterOptions;
//!
//! let old = b"hello old world";
//! let new = b"hello new world";
//!
//! let delta = diff::diff_to_vec(old, new, &WriterOptions::default()).unwrap();
//! let patched = patch::apply(old, &delta).unwrap();
//! assert_eq!(patched, new);
//! ```

pub mod compress;
pub mod diff;
pub mod error;
pub mod format;
pub mod io;
pub mod patch;
pub mod reader;
pub mod suffix;
pub mod writer;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::{PatchError, Result};
