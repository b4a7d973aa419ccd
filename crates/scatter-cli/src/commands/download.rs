use std::io::Write;
use std::path::Path;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

pub async fn run(base_dir: &Path, file_id: &str, dest: &Path) -> Result<()> {
    let ctx = super::open(base_dir)?;
    let pipeline = ctx.pipeline_for_file(file_id)?;

    let mut stream = pipeline.get_decrypted_stream(file_id).await?;

    println!("Downloading {file_id} to {}", dest.display());

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = std::fs::File::create(dest)?;

    let pb = ProgressBar::new(stream.remaining() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chunks")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut total = 0u64;
    while let Some(chunk) = stream.next_chunk().await? {
        out.write_all(&chunk)?;
        total += chunk.len() as u64;
        pb.inc(1);
    }
    out.flush()?;
    pb.finish();

    println!("Wrote {total} bytes to {}", dest.display());
    Ok(())
}
