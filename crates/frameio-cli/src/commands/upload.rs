use std::path::PathBuf;

use clap::Args;
use frameio_core::units::format_size;

use super::TransferFlags;

#[derive(Args)]
pub struct UploadArgs {
    /// Folder asset to upload into
    parent_id: String,
    /// Local file, or a directory to upload recursively
    path: PathBuf,
    #[command(flatten)]
    transfer: TransferFlags,
}

pub async fn run(args: UploadArgs, profile: &str) -> anyhow::Result<()> {
    let client = super::connect(profile)?;
    let options = args.transfer.options();

    let uploaded = if args.path.is_dir() {
        client
            .upload_folder(&args.parent_id, &args.path, &options)
            .await?
    } else {
        vec![
            client
                .upload_file(&args.parent_id, &args.path, &options)
                .await?,
        ]
    };

    for asset in &uploaded {
        println!("{}  {:>10}  {}", asset.id, format_size(asset.filesize), asset.name);
    }
    let total: u64 = uploaded.iter().map(|a| a.filesize).sum();
    println!("uploaded {} file(s), {}", uploaded.len(), format_size(total));
    Ok(())
}
