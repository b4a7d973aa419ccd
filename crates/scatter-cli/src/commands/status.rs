use anyhow::Result;
use std::path::Path;

pub fn run(base_dir: &Path) -> Result<()> {
    let ctx = super::open(base_dir)?;
    let (files, chunks, plain, encrypted) = ctx
        .catalog
        .lock()
        .map_err(|_| anyhow::anyhow!("catalog mutex poisoned"))?
        .stats()?;

    println!("Catalog status:");
    println!("  Files:            {files}");
    println!("  Chunks:           {chunks}");
    println!("  Plaintext bytes:  {plain}");
    println!("  Encrypted bytes:  {encrypted}");
    Ok(())
}
