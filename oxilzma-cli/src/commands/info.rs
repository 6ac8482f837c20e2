//! Info command implementation.

use crate::utils::ratio;
use oxilzma::LzmaHeader;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Header fields plus file-level facts, as printed by `info`.
#[derive(Debug, Serialize)]
struct StreamInfo {
    file: String,
    file_size: u64,
    properties: u8,
    lc: u32,
    lp: u32,
    pb: u32,
    dict_size: u32,
    uncompressed_size: Option<u64>,
    end_marker: bool,
    ratio: Option<f64>,
}

impl StreamInfo {
    fn new(path: &Path, file_size: u64, header: &LzmaHeader) -> Self {
        Self {
            file: path.display().to_string(),
            file_size,
            properties: header.props.to_byte(),
            lc: header.props.lc,
            lp: header.props.lp,
            pb: header.props.pb,
            dict_size: header.dict_size,
            uncompressed_size: header.uncompressed_size,
            end_marker: header.uncompressed_size.is_none(),
            ratio: header
                .uncompressed_size
                .map(|size| ratio(size, file_size)),
        }
    }
}

pub fn cmd_info(input: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::open(input)?;
    let file_size = file.metadata()?.len();
    let header = LzmaHeader::read(&mut BufReader::new(file))?;
    let info = StreamInfo::new(input, file_size, &header);

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Stream Information");
    println!("==================");
    println!("File: {}", info.file);
    println!("Size: {} bytes", info.file_size);
    println!(
        "Properties: 0x{:02X} (lc={}, lp={}, pb={})",
        info.properties, info.lc, info.lp, info.pb
    );
    println!("Dictionary: {} bytes", info.dict_size);
    match info.uncompressed_size {
        Some(size) => println!("Uncompressed: {} bytes", size),
        None => println!("Uncompressed: unknown (end marker)"),
    }
    if let Some(ratio) = info.ratio {
        println!("Ratio: {:.1}%", ratio);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxilzma::LzmaProperties;

    #[test]
    fn test_stream_info_json() {
        let header = LzmaHeader::new(LzmaProperties::default(), 1 << 16, Some(400));
        let info = StreamInfo::new(Path::new("a.lzma"), 100, &header);
        let value: serde_json::Value = serde_json::to_value(&info).unwrap();

        assert_eq!(value["properties"], 0x5D);
        assert_eq!(value["dict_size"], 65536);
        assert_eq!(value["uncompressed_size"], 400);
        assert_eq!(value["end_marker"], false);
        assert_eq!(value["ratio"], 25.0);
    }

    #[test]
    fn test_stream_info_unknown_size() {
        let header = LzmaHeader::new(LzmaProperties::default(), 1 << 16, None);
        let info = StreamInfo::new(Path::new("b.lzma"), 20, &header);
        assert!(info.end_marker);
        assert!(info.ratio.is_none());
    }
}
