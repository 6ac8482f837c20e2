//! Round-trip tests across levels, sizes and data shapes.

use oxilzma::{
    EncoderConfig, LzmaDecoder, LzmaEncoder, LzmaLevel, MatchFinderKind, compress,
    compress_stream, decompress, decompress_stream,
};

fn text_like(size: usize) -> Vec<u8> {
    let text = b"The quick brown fox jumps over the lazy dog. \
                 Pack my box with five dozen liquor jugs. \
                 How vexingly quick daft zebras jump! ";
    text.iter().copied().cycle().take(size).collect()
}

fn noisy(size: usize, seed: u64) -> Vec<u8> {
    let mut seed = seed;
    (0..size)
        .map(|_| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            (seed >> 33) as u8
        })
        .collect()
}

/// Mostly random bytes with copies of earlier regions at random distances.
fn mixed(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let mut seed = 0x0123_4567_89AB_CDEFu64;
    let mut next = || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        seed >> 24
    };
    while data.len() < size {
        let r = next();
        if data.len() > 1000 && r % 3 == 0 {
            let dist = (next() as usize % data.len().min(200_000)) + 1;
            let len = (next() as usize % 300) + 2;
            let start = data.len() - dist;
            for i in 0..len {
                data.push(data[start + i]);
            }
        } else {
            for _ in 0..(r % 20) {
                data.push(next() as u8);
            }
        }
    }
    data.truncate(size);
    data
}

fn check(data: &[u8], level: LzmaLevel) -> Vec<u8> {
    let compressed = compress(data, level).unwrap();
    let decompressed = decompress(&compressed).unwrap();
    assert_eq!(decompressed.len(), data.len(), "level {}", level.level());
    assert!(decompressed == data, "level {} mismatch", level.level());
    compressed
}

#[test]
fn test_all_levels_text() {
    let data = text_like(40_000);
    for level in 1..=9 {
        check(&data, LzmaLevel::new(level));
    }
}

#[test]
fn test_all_levels_mixed() {
    let data = mixed(150_000);
    for level in 1..=9 {
        check(&data, LzmaLevel::new(level));
    }
}

#[test]
fn test_repeated_byte_ratio() {
    let data = vec![b'A'; 100_000];
    for level in 1..=9 {
        let compressed = check(&data, LzmaLevel::new(level));
        assert!(
            compressed.len() < data.len() / 50,
            "level {}: {} bytes",
            level,
            compressed.len()
        );
    }
}

#[test]
fn test_incompressible_data() {
    let data = noisy(70_000, 42);
    let compressed = check(&data, LzmaLevel::DEFAULT);
    // Random data costs a little over one byte per byte.
    assert!(compressed.len() < data.len() + data.len() / 20 + 64);
}

#[test]
fn test_block_boundary_sizes() {
    for size in [4095, 4096, 4097, 65_535, 65_536, 65_537] {
        let mut data = text_like(size);
        if let Some(last) = data.last_mut() {
            *last = b'#';
        }
        check(&data, LzmaLevel::FAST);
        check(&data, LzmaLevel::DEFAULT);
    }
}

#[test]
fn test_all_byte_values() {
    let data: Vec<u8> = (0..=255u8).collect();
    check(&data, LzmaLevel::DEFAULT);

    let doubled: Vec<u8> = data.iter().chain(data.iter()).copied().collect();
    let compressed = check(&doubled, LzmaLevel::DEFAULT);
    assert!(compressed.len() < doubled.len());
}

#[test]
fn test_fast_bytes_length_pattern() {
    for fast in [64usize, 128, 255] {
        let pattern: Vec<u8> = (0..fast).map(|i| (i * 7 % 251) as u8).collect();
        let data: Vec<u8> = pattern.iter().cycle().take(fast * 40).copied().collect();
        for level in 1..=9 {
            check(&data, LzmaLevel::new(level));
        }
    }
}

#[test]
fn test_long_matches_beyond_fast_bytes() {
    let mut data = noisy(2000, 7);
    let copy = data.clone();
    data.extend_from_slice(&copy);
    data.extend_from_slice(&copy[..700]);
    let compressed = check(&data, LzmaLevel::FAST);
    assert!(compressed.len() < 2300);
}

#[test]
fn test_distances_near_dictionary_size() {
    // A block repeated exactly one level-1 dictionary later.
    let dict = LzmaLevel::FAST.dict_size() as usize;
    let block = noisy(1000, 99);
    let mut data = block.clone();
    data.extend(noisy(dict - 1000, 100));
    data.extend_from_slice(&block);
    check(&data, LzmaLevel::FAST);
}

#[test]
fn test_multi_megabyte_input() {
    let mut data = mixed(1 << 20);
    data.extend(text_like(1 << 19));
    check(&data, LzmaLevel::new(3));
}

#[test]
fn test_stream_api_roundtrip() {
    for data in [Vec::new(), text_like(1), text_like(80_000), mixed(300_000)] {
        let mut compressed = Vec::new();
        compress_stream(&data[..], &mut compressed, LzmaLevel::DEFAULT).unwrap();
        assert_eq!(&compressed[5..13], &[0xFF; 8]);

        let mut out = Vec::new();
        decompress_stream(&compressed[..], &mut out).unwrap();
        assert!(out == data);
    }
}

#[test]
fn test_custom_config_roundtrip() {
    let data = mixed(120_000);
    let configs = [
        EncoderConfig::default().with_dict_size(1 << 12),
        EncoderConfig::default().with_fast_bytes(5),
        EncoderConfig::default()
            .with_match_finder(MatchFinderKind::Bt2)
            .with_fast_bytes(273),
        EncoderConfig::from_level(LzmaLevel::BEST).with_end_marker(true),
    ];

    for config in configs {
        let mut compressed = Vec::new();
        LzmaEncoder::new(config)
            .encode(&data[..], &mut compressed, Some(data.len() as u64))
            .unwrap();

        let decoder = LzmaDecoder::from_header(&compressed[..]).unwrap();
        assert_eq!(decoder.header().dict_size, config.dict_size);
        assert!(decoder.decompress().unwrap() == data);
    }
}

#[test]
fn test_compression_improves_with_level() {
    let data = mixed(200_000);
    let fast = compress(&data, LzmaLevel::FAST).unwrap();
    let best = compress(&data, LzmaLevel::BEST).unwrap();
    assert!(best.len() <= fast.len());
}
