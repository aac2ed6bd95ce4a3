//! `qdm probe` – show what the server supports without downloading.

use anyhow::{Context, Result};
use qdm_core::naming::suggest_file_name;
use qdm_core::probe;
use tokio_util::sync::CancellationToken;

pub async fn run_probe(url: &str, json: bool) -> Result<()> {
    let cancel = CancellationToken::new();
    let mut task = {
        let url = url.to_string();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || probe::probe(&url, &cancel))
    };

    let joined = tokio::select! {
        res = &mut task => res,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            (&mut task).await
        }
    };
    let result = joined
        .context("probe task panicked")?
        .with_context(|| format!("probing {}", url))?;

    let name = suggest_file_name(url, result.content_disposition.as_deref());
    if json {
        let out = serde_json::json!({
            "url": url,
            "probe": result,
            "suggested_file_name": name,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let length = if result.content_length < 0 {
            "unknown".to_string()
        } else {
            result.content_length.to_string()
        };
        println!("URL:            {}", url);
        println!("Status:         {}", result.status);
        println!("Content-Length: {}", length);
        println!("Range support:  {}", result.range_support);
        println!("Pause support:  {}", result.pause_support);
        println!("Suggested name: {}", name);
    }
    Ok(())
}
