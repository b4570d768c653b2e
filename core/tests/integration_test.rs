//! End-to-end encode/decode round trips through the public API, covering
//! every combination of compression and encryption spec §8's testable
//! properties call for.

use soniclink_core::crypto::{generate_keypair, StaticKeyProvider};
use soniclink_core::{decode_stream, encode_frame, Config, MemorySource, NullTraceSink};

fn no_cancel() -> &'static dyn Fn() -> bool {
    &|| false
}

#[test]
fn round_trip_plain_payload() {
    let cfg = Config::default();
    let original = b"Hello, SonicLink!".to_vec();

    let samples = encode_frame(&original, &cfg, None, &NullTraceSink).expect("encode failed");
    assert!(!samples.is_empty());

    let mut source = MemorySource::new(samples);
    let decoded = decode_stream(&mut source, &cfg, None, &NullTraceSink, no_cancel()).expect("decode failed");
    assert_eq!(decoded, original);
}

#[test]
fn round_trip_empty_payload() {
    let cfg = Config::default();
    let original: Vec<u8> = Vec::new();

    let samples = encode_frame(&original, &cfg, None, &NullTraceSink).unwrap();
    let mut source = MemorySource::new(samples);
    let decoded = decode_stream(&mut source, &cfg, None, &NullTraceSink, no_cancel()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn round_trip_binary_data() {
    let cfg = Config::default();
    let original: Vec<u8> = vec![0, 1, 2, 255, 128, 64, 32, 16, 8, 4, 2, 1, 0];

    let samples = encode_frame(&original, &cfg, None, &NullTraceSink).unwrap();
    let mut source = MemorySource::new(samples);
    let decoded = decode_stream(&mut source, &cfg, None, &NullTraceSink, no_cancel()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn round_trip_various_payload_sizes() {
    let cfg = Config::default();
    for size in [1usize, 5, 10, 50, 100, 223, 300] {
        let original: Vec<u8> = (0..size).map(|i| (i as u8).wrapping_mul(17)).collect();
        let samples = encode_frame(&original, &cfg, None, &NullTraceSink).unwrap();
        let mut source = MemorySource::new(samples);
        let decoded = decode_stream(&mut source, &cfg, None, &NullTraceSink, no_cancel()).unwrap();
        assert_eq!(decoded, original, "payload size {size}");
    }
}

#[test]
fn round_trip_with_leading_silence() {
    let cfg = Config::default();
    let original = b"silence before the signal".to_vec();
    let mut samples = vec![0.0f32; cfg.sample_rate]; // 1s leading silence
    samples.extend(encode_frame(&original, &cfg, None, &NullTraceSink).unwrap());

    let mut source = MemorySource::new(samples);
    let decoded = decode_stream(&mut source, &cfg, None, &NullTraceSink, no_cancel()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn round_trip_with_trailing_silence() {
    let cfg = Config::default();
    let original = b"silence after the signal".to_vec();
    let mut samples = encode_frame(&original, &cfg, None, &NullTraceSink).unwrap();
    samples.extend(vec![0.0f32; cfg.sample_rate]);

    let mut source = MemorySource::new(samples);
    let decoded = decode_stream(&mut source, &cfg, None, &NullTraceSink, no_cancel()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn round_trip_compressed_payload() {
    let cfg = Config { compress: true, ..Config::default() };
    let original = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaabbbbbbbbbbbbbbbbbbbbccccccdddd".to_vec();

    let samples = encode_frame(&original, &cfg, None, &NullTraceSink).unwrap();
    let mut source = MemorySource::new(samples);
    let decoded = decode_stream(&mut source, &cfg, None, &NullTraceSink, no_cancel()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn round_trip_encrypted_payload() {
    let cfg = Config { encrypt: true, ..Config::default() };
    let (own_private, own_public) = generate_keypair().unwrap();
    let keys = StaticKeyProvider { recipient_public: own_public, own_private };
    let original = b"a secret message over ultrasound".to_vec();

    let samples = encode_frame(&original, &cfg, Some(&keys), &NullTraceSink).unwrap();
    let mut source = MemorySource::new(samples);
    let decoded = decode_stream(&mut source, &cfg, Some(&keys), &NullTraceSink, no_cancel()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn round_trip_compressed_and_encrypted_payload() {
    let cfg = Config { compress: true, encrypt: true, ..Config::default() };
    let (own_private, own_public) = generate_keypair().unwrap();
    let keys = StaticKeyProvider { recipient_public: own_public, own_private };
    let original = b"repetitive repetitive repetitive repetitive secret data".to_vec();

    let samples = encode_frame(&original, &cfg, Some(&keys), &NullTraceSink).unwrap();
    let mut source = MemorySource::new(samples);
    let decoded = decode_stream(&mut source, &cfg, Some(&keys), &NullTraceSink, no_cancel()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn encrypted_frame_cannot_be_decoded_without_the_right_private_key() {
    let cfg = Config { encrypt: true, ..Config::default() };
    let (_own_private, own_public) = generate_keypair().unwrap();
    let (wrong_private, _wrong_public) = generate_keypair().unwrap();
    let encrypt_keys = StaticKeyProvider { recipient_public: own_public.clone(), own_private: wrong_private.clone() };
    let decrypt_keys = StaticKeyProvider { recipient_public: own_public, own_private: wrong_private };

    let original = b"only the right key opens this".to_vec();
    let samples = encode_frame(&original, &cfg, Some(&encrypt_keys), &NullTraceSink).unwrap();
    let mut source = MemorySource::new(samples);
    let result = decode_stream(&mut source, &cfg, Some(&decrypt_keys), &NullTraceSink, no_cancel());
    assert!(result.is_err());
}
