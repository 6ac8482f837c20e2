//! # oxilzma Core
//!
//! Core components shared by the oxilzma crates:
//!
//! - [`error`]: The [`LzmaError`] type and `Result` alias
//! - [`crc`]: CRC-32 table (also used for match-finder hashing) and checksum
//! - [`window`]: Sliding output window for decompression
//!
//! ## Example
//!
//! ```rust
//! use oxilzma_core::crc::Crc32;
//! use oxilzma_core::window::OutputWindow;
//!
//! let mut window = OutputWindow::new(4096, Vec::new());
//! for &b in b"ab" {
//!     window.put_byte(b).unwrap();
//! }
//! window.copy_block(1, 4).unwrap();
//! let out = window.into_inner().unwrap();
//! assert_eq!(out, b"ababab");
//! assert_eq!(Crc32::compute(&out), Crc32::compute(b"ababab"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod crc;
pub mod error;
pub mod window;

pub use crc::{Crc32, Crc32Writer};
pub use error::{LzmaError, Result};
pub use window::OutputWindow;
