use std::path::PathBuf;

use clap::Args;
use frameio_core::units::{format_size, format_speed};
use frameio_core::MB;

use super::TransferFlags;
use crate::output::kv;

#[derive(Args)]
pub struct DownloadArgs {
    /// Asset id
    asset_id: String,
    /// Destination directory
    #[arg(long, default_value = ".")]
    dir: PathBuf,
    /// Prepended to the local file name
    #[arg(long)]
    prefix: Option<String>,
    /// Replace an existing local file
    #[arg(long)]
    overwrite: bool,
    /// Fetch large files as concurrent byte ranges
    #[arg(long)]
    multi_part: bool,
    /// Chunk size in MiB for --multi-part
    #[arg(long, default_value_t = frameio_core::DEFAULT_CHUNK_SIZE / MB)]
    chunk_mb: u64,
    /// Skip checksum verification, allowing assets the service has not checksummed yet
    #[arg(long)]
    no_verify: bool,
    #[command(flatten)]
    transfer: TransferFlags,
}

pub async fn run(args: DownloadArgs, profile: &str) -> anyhow::Result<()> {
    let client = super::connect(profile)?;

    let mut options = args
        .transfer
        .options()
        .with_overwrite(args.overwrite)
        .with_multi_part(args.multi_part)
        .with_chunk_size(args.chunk_mb.max(1) * MB)
        .with_verify_checksum(!args.no_verify);
    if let Some(prefix) = args.prefix {
        options = options.with_filename_prefix(prefix);
    }

    let result = client
        .download_asset(&args.asset_id, &args.dir, &options)
        .await?;

    println!("{}", kv("path", &result.path.display().to_string()));
    println!("{}", kv("strategy", &format!("{:?}", result.strategy)));
    println!("{}", kv("size", &format_size(result.bytes)));
    println!("{}", kv("elapsed", &format!("{:.2}s", result.elapsed.as_secs_f64())));
    println!("{}", kv("speed", &format_speed(result.throughput)));
    println!("{}", kv("chunks", &result.chunks.to_string()));
    println!("{}", kv("checksum", &format!("{:?}", result.checksum)));
    println!("{}", kv("cdn", &result.cdn.to_string()));
    Ok(())
}
