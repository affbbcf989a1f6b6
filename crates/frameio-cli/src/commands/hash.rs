use std::path::PathBuf;

use clap::Args;

#[derive(Args)]
pub struct HashArgs {
    /// File to hash
    path: PathBuf,
    /// Fail unless the digest equals this value
    #[arg(long)]
    expect: Option<String>,
}

pub async fn run(args: HashArgs) -> anyhow::Result<()> {
    let path = args.path.clone();
    let digest = tokio::task::spawn_blocking(move || frameio_core::hash_file(&path)).await??;
    println!("{digest}  {}", args.path.display());

    if let Some(expected) = args.expect {
        if !digest.eq_ignore_ascii_case(expected.trim()) {
            anyhow::bail!("checksum mismatch: expected {expected}, got {digest}");
        }
    }
    Ok(())
}
