use anyhow::Result;

use crate::api_client::ApiClient;

pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

pub async fn run(api: &ApiClient) -> Result<()> {
    let quota = api.quota().await?;

    println!("Used:  {:>10}", format_size(quota.used));
    match (quota.total, quota.free) {
        (Some(total), Some(free)) => {
            println!("Total: {:>10}", format_size(total));
            println!("Free:  {:>10}", format_size(free));
        }
        _ => println!("Total:  unlimited"),
    }

    Ok(())
}
