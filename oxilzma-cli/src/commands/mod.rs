//! Command implementations for OxiLZMA CLI.

pub mod compress;
pub mod decompress;
pub mod info;
pub mod test;

pub use compress::{CompressOptions, MatchFinderArg, cmd_compress};
pub use decompress::cmd_decompress;
pub use info::cmd_info;
pub use test::cmd_test;
