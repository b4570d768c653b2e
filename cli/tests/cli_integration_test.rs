//! Exercises the `soniclink` binary end to end: encode -> WAV -> decode,
//! plus keygen and the encrypted path.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn get_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../target/debug/soniclink")
}

fn tmp_path(name: &str) -> PathBuf {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp");
    fs::create_dir_all(&dir).ok();
    dir.join(name)
}

fn run(args: &[&str]) -> (bool, String) {
    let output = Command::new(get_binary()).args(args).output().expect("failed to run soniclink binary");
    let text = String::from_utf8_lossy(&output.stderr).to_string() + &String::from_utf8_lossy(&output.stdout);
    (output.status.success(), text)
}

#[test]
fn encode_then_decode_round_trip() {
    let input = tmp_path("roundtrip_in.bin");
    let encoded = tmp_path("roundtrip.wav");
    let decoded = tmp_path("roundtrip_out.bin");
    fs::write(&input, b"Hello, World!").unwrap();

    let (ok, out) = run(&["encode", input.to_str().unwrap(), encoded.to_str().unwrap()]);
    assert!(ok, "encode failed: {out}");
    assert!(encoded.exists());

    let (ok, out) = run(&["decode", encoded.to_str().unwrap(), decoded.to_str().unwrap()]);
    assert!(ok, "decode failed: {out}");

    let original = fs::read(&input).unwrap();
    let result = fs::read(&decoded).unwrap();
    assert_eq!(result, original);
}

#[test]
fn encode_with_compress_flag_round_trips() {
    let input = tmp_path("compress_in.bin");
    let encoded = tmp_path("compress.wav");
    let decoded = tmp_path("compress_out.bin");
    fs::write(&input, "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaabbbbbbbbbbbbbbbbbbbbbbbbcccccc").unwrap();

    let (ok, _) = run(&["encode", input.to_str().unwrap(), encoded.to_str().unwrap(), "--compress"]);
    assert!(ok);
    let (ok, _) = run(&["decode", encoded.to_str().unwrap(), decoded.to_str().unwrap()]);
    assert!(ok);

    assert_eq!(fs::read(&decoded).unwrap(), fs::read(&input).unwrap());
}

#[test]
fn keygen_writes_both_pem_files() {
    let private_key = tmp_path("keygen_private.pem");
    let public_key = tmp_path("keygen_public.pem");

    let (ok, out) = run(&["keygen", private_key.to_str().unwrap(), public_key.to_str().unwrap()]);
    assert!(ok, "keygen failed: {out}");
    assert!(private_key.exists());
    assert!(public_key.exists());

    let private_pem = fs::read_to_string(&private_key).unwrap();
    let public_pem = fs::read_to_string(&public_key).unwrap();
    assert!(private_pem.contains("PRIVATE KEY"));
    assert!(public_pem.contains("PUBLIC KEY"));
}

#[test]
fn encode_decode_round_trip_with_encryption() {
    let private_key = tmp_path("encrypt_private.pem");
    let public_key = tmp_path("encrypt_public.pem");
    run(&["keygen", private_key.to_str().unwrap(), public_key.to_str().unwrap()]);

    let input = tmp_path("encrypt_in.bin");
    let encoded = tmp_path("encrypt.wav");
    let decoded = tmp_path("encrypt_out.bin");
    fs::write(&input, b"a secret payload").unwrap();

    let (ok, out) = run(&[
        "encode",
        input.to_str().unwrap(),
        encoded.to_str().unwrap(),
        "--encrypt",
        "--recipient-key",
        public_key.to_str().unwrap(),
    ]);
    assert!(ok, "encrypted encode failed: {out}");

    let (ok, out) = run(&[
        "decode",
        encoded.to_str().unwrap(),
        decoded.to_str().unwrap(),
        "--private-key",
        private_key.to_str().unwrap(),
    ]);
    assert!(ok, "encrypted decode failed: {out}");

    assert_eq!(fs::read(&decoded).unwrap(), fs::read(&input).unwrap());
}

#[test]
fn encode_without_recipient_key_fails_when_encrypt_requested() {
    let input = tmp_path("noenc_in.bin");
    let encoded = tmp_path("noenc.wav");
    fs::write(&input, b"data").unwrap();

    let (ok, _) = run(&["encode", input.to_str().unwrap(), encoded.to_str().unwrap(), "--encrypt"]);
    assert!(!ok);
}

#[test]
fn detect_reports_preamble_presence() {
    let input = tmp_path("detect_in.bin");
    let encoded = tmp_path("detect.wav");
    fs::write(&input, b"ping").unwrap();
    run(&["encode", input.to_str().unwrap(), encoded.to_str().unwrap()]);

    let (ok, out) = run(&["detect", encoded.to_str().unwrap()]);
    assert!(ok);
    assert!(out.contains("preamble detected"));
}
