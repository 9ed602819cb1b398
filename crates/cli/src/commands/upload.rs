use std::path::Path;

use anyhow::Result;

use crate::api_client::ApiClient;

pub async fn run(api: &ApiClient, file_path: &Path, mime: Option<&str>) -> Result<()> {
    tracing::info!("uploading {}", file_path.display());
    let uploaded = api.upload(file_path, mime).await?;

    println!("Uploaded: {}", file_path.display());
    println!("  id:  {}", uploaded.id);
    println!("  url: {}", api.absolute_url(&uploaded.url));
    if let Some(link) = &uploaded.custom_domain_url {
        println!("  link: {link}");
    }
    Ok(())
}
