//! Test command implementation.

use oxilzma::LzmaDecoder;
use oxilzma_core::crc::Crc32Writer;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

pub fn cmd_test(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Testing {}", input.display());

    let decoder = LzmaDecoder::from_header(BufReader::new(File::open(input)?))?;
    let mut sink = Crc32Writer::new(io::sink());

    match decoder.decode_to(&mut sink) {
        Ok(produced) => {
            println!("  Size: {} bytes", produced);
            println!("  CRC-32: {:08x}", sink.crc());
            println!("OK");
            Ok(())
        }
        Err(e) => {
            println!("  FAILED after {} bytes: {}", sink.count(), e);
            Err(e.into())
        }
    }
}
