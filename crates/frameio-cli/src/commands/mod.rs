pub mod auth;
pub mod download;
pub mod hash;
pub mod ls;
pub mod upload;

use clap::{Args, Subcommand};
use frameio_client::ApiClient;
use frameio_core::TransferOptions;
use tokio_util::sync::CancellationToken;

use crate::config::resolve_credentials;

#[derive(Subcommand)]
pub enum Commands {
    /// Manage stored credentials
    Auth(auth::AuthArgs),
    /// Download an asset
    Download(download::DownloadArgs),
    /// Upload a file or folder
    Upload(upload::UploadArgs),
    /// List the children of a folder asset
    Ls(ls::LsArgs),
    /// Print the xxHash64 of a local file
    Hash(hash::HashArgs),
}

impl Commands {
    pub async fn run(self, profile: &str) -> anyhow::Result<()> {
        match self {
            Commands::Auth(args) => auth::run(args, profile),
            Commands::Download(args) => download::run(args, profile).await,
            Commands::Upload(args) => upload::run(args, profile).await,
            Commands::Ls(args) => ls::run(args, profile).await,
            Commands::Hash(args) => hash::run(args).await,
        }
    }
}

/// Flags shared by the transfer commands.
#[derive(Args, Debug, Clone)]
pub struct TransferFlags {
    /// Chunks in flight at once
    #[arg(long, default_value_t = frameio_core::DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

impl TransferFlags {
    pub fn options(&self) -> TransferOptions {
        TransferOptions::default().with_concurrency(self.concurrency)
    }
}

/// API client for the selected profile, cancelled on Ctrl-C.
pub fn connect(profile: &str) -> anyhow::Result<ApiClient> {
    let credentials = resolve_credentials(profile)?;
    let client = ApiClient::new(credentials.token)?.with_host(credentials.host);

    let cancel = CancellationToken::new();
    let transfers = client.transfers().clone().with_cancellation(cancel.clone());
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling transfers");
            cancel.cancel();
        }
    });
    Ok(client.with_transfer_client(transfers))
}
