use clap::Args;
use frameio_core::units::format_size;
use frameio_core::Asset;
use frameio_client::ApiClient;

use crate::output::asset_row;

#[derive(Args)]
pub struct LsArgs {
    /// Folder asset id
    asset_id: String,
    /// Stop after this many entries
    #[arg(long)]
    limit: Option<usize>,
    /// Entries requested per page
    #[arg(long)]
    page_size: Option<u32>,
}

pub async fn run(args: LsArgs, profile: &str) -> anyhow::Result<()> {
    let client = super::connect(profile)?;

    let mut request = ApiClient::children_request(&args.asset_id);
    if let Some(limit) = args.limit {
        request = request.with_limit(limit);
    }
    if let Some(size) = args.page_size {
        request = request.with_page_size(size);
    }

    let mut children = client.paginate::<Asset>(request);
    let total = children.size_hint().await?;
    while let Some(asset) = children.next().await? {
        let kind = asset.asset_type.as_deref().unwrap_or("file");
        let size = if asset.is_folder() {
            "-".to_string()
        } else {
            format_size(asset.filesize)
        };
        println!("{}", asset_row(kind, &asset.id, &size, &asset.name));
    }
    println!("{total} item(s)");
    Ok(())
}
