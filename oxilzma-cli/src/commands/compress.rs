//! Compress command implementation.

use crate::utils::{compressed_path, create_progress_bar, ratio};
use clap::ValueEnum;
use indicatif::HumanBytes;
use oxilzma::{EncoderConfig, LzmaEncoder, LzmaLevel, MatchFinderKind};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Match finder selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MatchFinderArg {
    /// Binary tree, 2-byte hash
    Bt2,
    /// Binary tree, 4-byte hash
    Bt4,
}

impl From<MatchFinderArg> for MatchFinderKind {
    fn from(arg: MatchFinderArg) -> Self {
        match arg {
            MatchFinderArg::Bt2 => MatchFinderKind::Bt2,
            MatchFinderArg::Bt4 => MatchFinderKind::Bt4,
        }
    }
}

/// Encoder settings gathered from the command line.
#[derive(Debug, Clone, Copy)]
pub struct CompressOptions {
    pub level: u8,
    pub stream: bool,
    pub dict_size: Option<u32>,
    pub fast_bytes: Option<u32>,
    pub match_finder: Option<MatchFinderArg>,
    pub progress: bool,
}

impl CompressOptions {
    fn config(&self) -> EncoderConfig {
        let mut config = EncoderConfig::from_level(LzmaLevel::new(self.level));
        if let Some(dict_size) = self.dict_size {
            config = config.with_dict_size(dict_size);
        }
        if let Some(fast_bytes) = self.fast_bytes {
            config = config.with_fast_bytes(fast_bytes);
        }
        if let Some(mf) = self.match_finder {
            config = config.with_match_finder(mf.into());
        }
        config
    }
}

pub fn cmd_compress(
    input: &Path,
    output: Option<&Path>,
    options: CompressOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = output.map_or_else(|| compressed_path(input), Path::to_path_buf);
    if output == input {
        return Err("output would overwrite the input file".into());
    }

    let file = File::open(input)?;
    let input_size = file.metadata()?.len();
    let size = (!options.stream).then_some(input_size);

    let config = options.config();
    log::debug!(
        "compressing {} with dict_size={} fast_bytes={} mf={}",
        input.display(),
        config.dict_size,
        config.fast_bytes,
        config.match_finder
    );

    let mut writer = BufWriter::new(File::create(&output)?);
    let pb = create_progress_bar(input_size, options.progress);

    let written = LzmaEncoder::new(config).encode_with_progress(
        BufReader::new(file),
        &mut writer,
        size,
        |read, written| {
            pb.set_position(read);
            pb.set_message(format!("-> {}", HumanBytes(written)));
        },
    )?;
    writer.flush()?;
    pb.finish_and_clear();

    println!(
        "{} -> {}: {} -> {} bytes ({:.1}%)",
        input.display(),
        output.display(),
        input_size,
        written,
        ratio(input_size, written)
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CompressOptions {
        CompressOptions {
            level: 5,
            stream: false,
            dict_size: None,
            fast_bytes: None,
            match_finder: None,
            progress: false,
        }
    }

    #[test]
    fn test_level_config() {
        let config = options().config();
        assert_eq!(config.dict_size, 1 << 21);
        assert_eq!(config.fast_bytes, 128);
        assert_eq!(config.match_finder, MatchFinderKind::Bt4);
    }

    #[test]
    fn test_overrides() {
        let config = CompressOptions {
            dict_size: Some(1 << 16),
            fast_bytes: Some(1000),
            match_finder: Some(MatchFinderArg::Bt2),
            ..options()
        }
        .config();
        assert_eq!(config.dict_size, 1 << 16);
        assert_eq!(config.fast_bytes, 273);
        assert_eq!(config.match_finder, MatchFinderKind::Bt2);
    }
}
