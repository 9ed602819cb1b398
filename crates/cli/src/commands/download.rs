use anyhow::{Context, Result};
use std::path::Path;

use crate::api_client::ApiClient;
use crate::config::CliConfig;

pub async fn run(
    config: &CliConfig,
    api: &ApiClient,
    id: &str,
    output: Option<&Path>,
) -> Result<()> {
    let file = api.download(id).await?;

    let output_path = match output {
        Some(path) => path.to_path_buf(),
        None => {
            let output_dir = &config.storage.download_dir;
            std::fs::create_dir_all(output_dir).with_context(|| {
                format!(
                    "failed to create download directory: {}",
                    output_dir.display()
                )
            })?;
            output_dir.join(file.filename.as_deref().unwrap_or(id))
        }
    };

    write_file(&output_path, &file.data)?;

    println!(
        "Downloaded: {} -> {} ({}, {})",
        id,
        output_path.display(),
        file.content_type.as_deref().unwrap_or("unknown type"),
        crate::commands::quota::format_size(file.data.len() as u64)
    );
    Ok(())
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    std::fs::write(path, data)
        .with_context(|| format!("failed to write file: {}", path.display()))
}
