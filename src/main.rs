use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use log::info;

use stegbits::config::{DEFAULT_BIT_WIDTH, DEFAULT_BLOCK_SIZE, DEFAULT_COMPLEXITY_THRESHOLD};
use stegbits::{pipeline, CancelToken, StegConfig, Strategy};

/// stegbits — hide files in the low bits of images, WAV audio and video.
#[derive(Parser)]
#[command(name = "stegbits", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Embedding parameters. Nothing is stored in the carrier, so decoding needs
/// the same values used for encoding.
#[derive(Args)]
struct EmbedArgs {
    /// Bits replaced per element, or bit planes used by BPCS (1-8)
    #[arg(short, long, default_value_t = DEFAULT_BIT_WIDTH)]
    bits: u8,

    /// Embedding strategy
    #[arg(short, long, value_enum, default_value_t = Strategy::Lsb)]
    strategy: Strategy,

    /// BPCS block edge length
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// BPCS complexity threshold: blocks above it carry payload
    #[arg(long, default_value_t = DEFAULT_COMPLEXITY_THRESHOLD)]
    threshold: u32,
}

impl From<EmbedArgs> for StegConfig {
    fn from(args: EmbedArgs) -> Self {
        Self {
            bit_width: args.bits,
            strategy: args.strategy,
            block_size: args.block_size,
            complexity_threshold: args.threshold,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Hide a file inside a carrier
    Encode {
        /// Cover image, WAV or video
        #[arg(short, long)]
        carrier: PathBuf,

        /// File to hide
        #[arg(short, long)]
        payload: PathBuf,

        /// Output carrier path (lossless container)
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        embed: EmbedArgs,

        /// Decode the output afterwards and compare SHA-256 digests
        #[arg(long)]
        verify: bool,
    },

    /// Recover a hidden file from a carrier
    Decode {
        /// Stego image, WAV or video
        #[arg(short, long)]
        carrier: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        embed: EmbedArgs,
    },

    /// Report how much a carrier can hold
    Capacity {
        /// Image, WAV or video
        #[arg(short, long)]
        carrier: PathBuf,

        #[command(flatten)]
        embed: EmbedArgs,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let cancel = CancelToken::new();

    match cli.command {
        Commands::Encode {
            carrier,
            payload,
            output,
            embed,
            verify,
        } => {
            let cfg = StegConfig::from(embed);
            if verify {
                let result = pipeline::roundtrip(&carrier, &payload, &output, &cfg, &cancel)?;
                if !result.matched {
                    bail!(
                        "verification failed: payload {} != decoded {}",
                        result.original_hash,
                        result.decoded_hash
                    );
                }
                info!("verified: sha256 {}", result.decoded_hash);
            } else {
                pipeline::encode::encode_file(&carrier, &payload, &output, &cfg, &cancel)?;
            }
        }

        Commands::Decode {
            carrier,
            output,
            embed,
        } => {
            let cfg = StegConfig::from(embed);
            pipeline::decode::decode_file(&carrier, &output, &cfg, &cancel)?;
        }

        Commands::Capacity { carrier, embed } => {
            let cfg = StegConfig::from(embed);
            let report = pipeline::capacity_of_file(&carrier, &cfg)?;
            println!(
                "{} carrier, {} x{}: {} bits, max payload {} bytes",
                report.kind, cfg.strategy, cfg.bit_width, report.bits, report.max_payload_bytes
            );
        }
    }

    Ok(())
}
