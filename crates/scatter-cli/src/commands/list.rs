use anyhow::Result;
use std::path::Path;

pub fn run(base_dir: &Path) -> Result<()> {
    let ctx = super::open(base_dir)?;
    let files = ctx
        .catalog
        .lock()
        .map_err(|_| anyhow::anyhow!("catalog mutex poisoned"))?
        .list_files()?;

    if files.is_empty() {
        println!("No files uploaded.");
        return Ok(());
    }

    println!(
        "{:<38} {:<30} {:>12} {:<10} {}",
        "ID", "FILENAME", "SIZE", "STATUS", "CREATED"
    );
    for file in files {
        println!(
            "{:<38} {:<30} {:>12} {:<10} {}",
            file.id,
            file.filename,
            file.size,
            file.status.to_string(),
            file.created_at
        );
    }
    Ok(())
}
