//! Decompress command implementation.

use crate::utils::{create_progress_bar, decompressed_path};
use oxilzma::LzmaDecoder;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub fn cmd_decompress(
    input: &Path,
    output: Option<&Path>,
    progress: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = output.map_or_else(|| decompressed_path(input), Path::to_path_buf);
    if output == input {
        return Err("output would overwrite the input file".into());
    }

    let decoder = LzmaDecoder::from_header(BufReader::new(File::open(input)?))?;
    let header = *decoder.header();

    let pb = create_progress_bar(header.uncompressed_size.unwrap_or(0), progress);
    let writer = pb.wrap_write(BufWriter::new(File::create(&output)?));

    let produced = match decoder.decode_to(writer) {
        Ok(n) => n,
        Err(e) => {
            pb.abandon();
            // Leave no partial output behind.
            let _ = std::fs::remove_file(&output);
            return Err(e.into());
        }
    };
    pb.finish_and_clear();

    println!(
        "{} -> {}: {} bytes",
        input.display(),
        output.display(),
        produced
    );

    Ok(())
}
