use anyhow::Result;
use std::path::Path;

pub async fn run(base_dir: &Path, file_id: &str) -> Result<()> {
    let ctx = super::open(base_dir)?;
    let pipeline = ctx.pipeline_for_file(file_id)?;

    println!("Deleting {file_id} (remote chunks first)");
    pipeline.delete_file(file_id).await?;
    println!("Deleted {file_id}");
    Ok(())
}
