//! CLI Status Command
//!
//! Queries a running server's health endpoint.

use anyhow::Result;

pub async fn run(port: u16) -> Result<()> {
    println!("Meterline status: checking...");
    let client = reqwest::Client::new();
    match client
        .get(format!("http://localhost:{port}/api/health"))
        .send()
        .await
    {
        Ok(resp) => {
            let body: serde_json::Value = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Err(_) => {
            println!("Meterline is not running on port {port}");
        }
    }
    Ok(())
}
