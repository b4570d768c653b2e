//! Command-line front-end: `encode`/`decode`/`keygen`, wiring `hound` WAV
//! I/O and RSA key files to `soniclink_core`'s trait boundary.
//!
//! Kept the teacher's clap-derive `Cli`/`Commands` shape and hound
//! read/write loop, scoped down from the teacher's spread-spectrum +
//! axum/tokio web-server binary to the CLI-only surface spec §6 describes:
//! the OFDM codec has no HTTP front-end.

use std::fs::File;
use std::io::Read as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use soniclink_core::{
    decode_stream, detect, encode_frame, Config, KeyProvider, LogTraceSink, MemorySource,
    StaticKeyProvider,
};

#[derive(Parser)]
#[command(name = "soniclink")]
#[command(about = "Acoustic OFDM modem: encode/decode binary data as 18-22 kHz audio")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a binary file to a WAV waveform.
    Encode {
        /// Input binary file.
        input: PathBuf,
        /// Output WAV file.
        output: PathBuf,
        /// Compress the payload with Huffman coding before framing.
        #[arg(long)]
        compress: bool,
        /// Encrypt the payload under the recipient's public key.
        #[arg(long)]
        encrypt: bool,
        /// Recipient's RSA public key (PEM), required with --encrypt.
        #[arg(long)]
        recipient_key: Option<PathBuf>,
    },

    /// Decode a WAV waveform back to a binary file.
    Decode {
        /// Input WAV file.
        input: PathBuf,
        /// Output binary file.
        output: PathBuf,
        /// This host's RSA private key (PEM), required if the frame is encrypted.
        #[arg(long)]
        private_key: Option<PathBuf>,
        /// Milliseconds to listen for a preamble before giving up.
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,
    },

    /// Listen on a WAV file for a preamble without decoding the payload.
    Detect {
        input: PathBuf,
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,
    },

    /// Generate an RSA-2048 keypair and write it as two PEM files.
    Keygen {
        /// Output path for the private key PEM.
        private_key_out: PathBuf,
        /// Output path for the public key PEM.
        public_key_out: PathBuf,
    },
}

struct FileKeyProvider {
    recipient_public: Option<RsaPublicKey>,
    own_private: Option<RsaPrivateKey>,
}

impl KeyProvider for FileKeyProvider {
    fn recipient_public_key(&self) -> soniclink_core::Result<RsaPublicKey> {
        self.recipient_public.clone().ok_or_else(|| {
            soniclink_core::CodecError::InvalidConfig("no recipient public key provided".into())
        })
    }

    fn own_private_key(&self) -> soniclink_core::Result<RsaPrivateKey> {
        self.own_private.clone().ok_or_else(|| {
            soniclink_core::CodecError::InvalidConfig("no private key provided".into())
        })
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Encode { input, output, compress, encrypt, recipient_key } => {
            encode_command(&input, &output, compress, encrypt, recipient_key.as_deref())
        }
        Commands::Decode { input, output, private_key, timeout_ms } => {
            decode_command(&input, &output, private_key.as_deref(), timeout_ms)
        }
        Commands::Detect { input, timeout_ms } => detect_command(&input, timeout_ms),
        Commands::Keygen { private_key_out, public_key_out } => {
            keygen_command(&private_key_out, &public_key_out)
        }
    }
}

fn read_pem_public(path: &std::path::Path) -> Result<RsaPublicKey, Box<dyn std::error::Error>> {
    let mut pem = String::new();
    File::open(path)?.read_to_string(&mut pem)?;
    Ok(RsaPublicKey::from_public_key_pem(&pem)?)
}

fn read_pem_private(path: &std::path::Path) -> Result<RsaPrivateKey, Box<dyn std::error::Error>> {
    let mut pem = String::new();
    File::open(path)?.read_to_string(&mut pem)?;
    Ok(RsaPrivateKey::from_pkcs8_pem(&pem)?)
}

fn write_samples_wav(path: &std::path::Path, samples: &[f32], sample_rate: usize) -> Result<(), Box<dyn std::error::Error>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

fn read_wav_samples(path: &std::path::Path) -> Result<(Vec<f32>, usize), Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => reader
            .samples::<i32>()
            .collect::<Result<Vec<i32>, _>>()?
            .into_iter()
            .map(|s| s as f32 / (1i64 << (spec.bits_per_sample - 1)) as f32)
            .collect(),
    };
    Ok((samples, spec.sample_rate as usize))
}

fn encode_command(
    input: &std::path::Path,
    output: &std::path::Path,
    compress: bool,
    encrypt: bool,
    recipient_key: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input)?;
    println!("Read {} bytes from {}", data.len(), input.display());

    let cfg = Config { compress, encrypt, ..Config::default() };

    let provider;
    let keys: Option<&dyn KeyProvider> = if encrypt {
        let path = recipient_key.ok_or("--encrypt requires --recipient-key")?;
        provider = FileKeyProvider { recipient_public: Some(read_pem_public(path)?), own_private: None };
        Some(&provider)
    } else {
        None
    };

    let samples = encode_frame(&data, &cfg, keys, &LogTraceSink)?;
    println!("Encoded to {} audio samples at {} Hz", samples.len(), cfg.sample_rate);

    write_samples_wav(output, &samples, cfg.sample_rate)?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn decode_command(
    input: &std::path::Path,
    output: &std::path::Path,
    private_key: Option<&std::path::Path>,
    timeout_ms: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let (samples, sample_rate) = read_wav_samples(input)?;
    println!("Read {} samples at {} Hz from {}", samples.len(), sample_rate, input.display());

    let cfg = Config { sample_rate, idle_timeout_ms: timeout_ms, ..Config::default() };

    let provider;
    let keys: Option<&dyn KeyProvider> = if let Some(path) = private_key {
        provider = FileKeyProvider { recipient_public: None, own_private: Some(read_pem_private(path)?) };
        Some(&provider)
    } else {
        None
    };

    let mut source = MemorySource::new(samples);
    let no_cancel: &dyn Fn() -> bool = &|| false;
    let data = decode_stream(&mut source, &cfg, keys, &LogTraceSink, no_cancel)?;
    println!("Decoded {} bytes", data.len());

    std::fs::write(output, &data)?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn detect_command(input: &std::path::Path, timeout_ms: u64) -> Result<(), Box<dyn std::error::Error>> {
    let (samples, sample_rate) = read_wav_samples(input)?;
    let cfg = Config { sample_rate, ..Config::default() };
    let mut source = MemorySource::new(samples);
    let found = detect(&mut source, &cfg, timeout_ms)?;
    println!("{}", if found { "preamble detected" } else { "no preamble detected" });
    Ok(())
}

fn keygen_command(private_out: &std::path::Path, public_out: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let (private, public) = soniclink_core::crypto::generate_keypair()?;
    let private_pem = private.to_pkcs8_pem(Default::default())?;
    std::fs::write(private_out, private_pem.as_bytes())?;
    let public_pem = public.to_public_key_pem(Default::default())?;
    std::fs::write(public_out, public_pem)?;
    println!("Wrote {} and {}", private_out.display(), public_out.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_key_provider_errors_when_missing_key() {
        let provider = FileKeyProvider { recipient_public: None, own_private: None };
        assert!(provider.recipient_public_key().is_err());
        assert!(provider.own_private_key().is_err());
    }
}
