//! Malformed and damaged stream handling.

use oxilzma::{HEADER_SIZE, LzmaError, LzmaLevel, compress, compress_stream, decompress};

fn sample() -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..400u32 {
        data.extend_from_slice(format!("record {:05} value={} ;", i, i * 37 % 101).as_bytes());
    }
    data
}

fn assert_flips_detected(compressed: &[u8], data: &[u8]) {
    for index in HEADER_SIZE..compressed.len() {
        for mask in [0x01u8, 0x80, 0xFF] {
            let mut damaged = compressed.to_vec();
            damaged[index] ^= mask;
            match decompress(&damaged) {
                Ok(out) => assert!(out != data, "flip at {index} with {mask:#04x} went unnoticed"),
                Err(err) => assert!(err.is_data_error(), "flip at {index}: {err:?}"),
            }
        }
    }
}

#[test]
fn test_flipped_bytes_never_return_original() {
    let data = sample();
    let compressed = compress(&data, LzmaLevel::DEFAULT).unwrap();
    assert_flips_detected(&compressed, &data);
}

#[test]
fn test_flipped_bytes_short_input() {
    let data = b"Hello, hello, hello!".to_vec();
    for level in [LzmaLevel::FAST, LzmaLevel::BEST] {
        let compressed = compress(&data, level).unwrap();
        assert_flips_detected(&compressed, &data);
    }
}

#[test]
fn test_flipped_bytes_end_marker_stream() {
    let data: Vec<u8> = sample().into_iter().take(3000).collect();
    let mut compressed = Vec::new();
    compress_stream(&data[..], &mut compressed, LzmaLevel::DEFAULT).unwrap();
    assert_flips_detected(&compressed, &data);
}

#[test]
fn test_flipped_final_bytes_report_corruption() {
    let data = vec![b'A'; 100_000];
    let compressed = compress(&data, LzmaLevel::DEFAULT).unwrap();

    for index in compressed.len() - 4..compressed.len() {
        let mut damaged = compressed.clone();
        damaged[index] ^= 0x80;
        let err = decompress(&damaged).unwrap_err();
        assert!(
            matches!(
                err,
                LzmaError::CorruptStream { .. } | LzmaError::TruncatedInput { .. }
            ),
            "flip at {index}: {err:?}"
        );
    }
}

#[test]
fn test_truncated_streams() {
    let data = sample();
    let compressed = compress(&data, LzmaLevel::DEFAULT).unwrap();

    for cut in [
        HEADER_SIZE,
        HEADER_SIZE + 3,
        compressed.len() / 2,
        compressed.len() - 6,
        compressed.len() - 1,
    ] {
        let err = decompress(&compressed[..cut]).unwrap_err();
        assert!(
            matches!(err, LzmaError::TruncatedInput { .. }),
            "cut at {cut}: {err:?}"
        );
    }
}

#[test]
fn test_truncated_unknown_size_stream() {
    let data = sample();
    let mut compressed = Vec::new();
    compress_stream(&data[..], &mut compressed, LzmaLevel::DEFAULT).unwrap();
    compressed.truncate(compressed.len() - 8);

    let err = decompress(&compressed).unwrap_err();
    assert!(matches!(err, LzmaError::TruncatedInput { .. }));
}

#[test]
fn test_header_errors() {
    let err = decompress(&[]).unwrap_err();
    assert!(matches!(err, LzmaError::InvalidHeader { .. }));

    let err = decompress(&[0x5D, 0x00, 0x00]).unwrap_err();
    assert!(matches!(err, LzmaError::InvalidHeader { .. }));

    let err = decompress(&[0x5D, 0x00, 0x00, 0x01, 0x00, 0x10, 0x00]).unwrap_err();
    assert!(matches!(err, LzmaError::TruncatedInput { .. }));
}

#[test]
fn test_bad_properties_byte() {
    let mut compressed = compress(b"properties", LzmaLevel::DEFAULT).unwrap();
    for byte in [225u8, 240, 255] {
        compressed[0] = byte;
        let err = decompress(&compressed).unwrap_err();
        assert!(matches!(err, LzmaError::InvalidHeader { .. }));
    }
}

#[test]
fn test_oversized_dictionary() {
    let mut compressed = compress(b"dictionary", LzmaLevel::DEFAULT).unwrap();
    compressed[1..5].copy_from_slice(&200_000_000u32.to_le_bytes());
    let err = decompress(&compressed).unwrap_err();
    assert!(matches!(
        err,
        LzmaError::UnsupportedDictionarySize {
            size: 200_000_000,
            ..
        }
    ));
    assert!(err.is_data_error());
}

#[test]
fn test_nonzero_first_body_byte() {
    let mut compressed = compress(b"first byte", LzmaLevel::DEFAULT).unwrap();
    compressed[HEADER_SIZE] = 0x42;
    let err = decompress(&compressed).unwrap_err();
    assert!(matches!(err, LzmaError::CorruptStream { .. }));
}

#[test]
fn test_declared_size_larger_than_stream() {
    let data = sample();
    let mut compressed = compress(&data, LzmaLevel::DEFAULT).unwrap();
    let bigger = data.len() as u64 + 1000;
    compressed[5..13].copy_from_slice(&bigger.to_le_bytes());

    // The decoder keeps going past the real data and runs out or misdecodes.
    let err = decompress(&compressed).unwrap_err();
    assert!(
        matches!(
            err,
            LzmaError::TruncatedInput { .. } | LzmaError::CorruptStream { .. }
        ),
        "{err:?}"
    );
}

#[test]
fn test_declared_size_smaller_than_stream() {
    let data = sample();
    let mut compressed = compress(&data, LzmaLevel::DEFAULT).unwrap();
    let smaller = data.len() as u64 / 2;
    compressed[5..13].copy_from_slice(&smaller.to_le_bytes());

    // The symbols after the declared size are not an end marker.
    let err = decompress(&compressed).unwrap_err();
    assert!(matches!(err, LzmaError::CorruptStream { .. }), "{err:?}");
}
