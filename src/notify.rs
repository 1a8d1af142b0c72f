//! Outbound webhook notification
//!
//! One POST carrying a title and text body to a user-supplied URL. Both
//! success and failure come back as a status string; delivery problems are
//! reported, never raised.

use tracing::warn;

/// Send a summary to a webhook URL. Returns a human-readable status line.
pub async fn send_webhook(webhook_url: &str, title: &str, body: &str) -> String {
    if webhook_url.is_empty() {
        return "Webhook URL not provided.".to_string();
    }

    let payload = serde_json::json!({
        "text": format!("*{}*\n{}", title, body),
    });

    let client = reqwest::Client::new();
    match client.post(webhook_url).json(&payload).send().await {
        Ok(response) if response.status().is_success() => {
            "Summary sent to webhook successfully.".to_string()
        }
        Ok(response) => {
            let status = response.status().as_u16();
            warn!(status = status, "Webhook delivery rejected");
            format!("Failed to send to webhook. Status: {}", status)
        }
        Err(e) => {
            warn!(error = %e, "Webhook delivery failed");
            format!("Failed to send to webhook: {}", e)
        }
    }
}
