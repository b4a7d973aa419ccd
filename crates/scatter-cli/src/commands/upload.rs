use std::path::Path;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use scatter_pipeline::UploadOptions;

pub async fn run(
    base_dir: &Path,
    path: &Path,
    description: Option<&str>,
    chunk_size: Option<usize>,
    provider: Option<&str>,
) -> Result<()> {
    let ctx = super::open(base_dir)?;
    let pipeline = ctx.pipeline(provider)?;

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("cannot determine filename for {}", path.display()))?
        .to_string();
    let size = std::fs::metadata(path)?.len();

    println!("Uploading {} ({size} bytes)", path.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(format!("encrypting and uploading {filename}"));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let reader = std::fs::File::open(path)?;
    let file = pipeline
        .upload_file(
            reader,
            UploadOptions {
                filename,
                description: description.map(str::to_string),
                chunk_size,
            },
        )
        .await?;

    pb.finish_with_message("done");

    println!("\nUpload completed:");
    println!("  ID:       {}", file.id);
    println!("  Size:     {} bytes", file.size);
    println!("  SHA-256:  {}", file.sha256.as_deref().unwrap_or("-"));
    println!("  Status:   {}", file.status);

    Ok(())
}
