use crate::error::SinkError;
use crate::observability::sink::{SlowQueryEvent, SlowQuerySink};

use reqwest::Client;
use serde::Serialize;
use tokio::runtime::Handle;

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}

/// Posts slow queries to a Slack webhook on the ambient tokio runtime.
#[derive(Debug, Clone)]
pub struct SlackSlowQuerySink {
    webhook_url: String,
    client: Client,
}

impl SlackSlowQuerySink {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self { webhook_url: webhook_url.into(), client: Client::new() }
    }

    fn render(event: &SlowQueryEvent) -> String {
        format!(
            "⚠️ *Slow SQL query*\n• `latency`: {:.3}s\n• `shape`: `{}`\n• `sql`: `{}`",
            event.elapsed_secs, event.shape, event.statement
        )
    }
}

/// Delivery failures surface only in the log; the query path never waits on Slack.
async fn post(client: Client, url: String, text: String) {
    if let Err(e) = client.post(url).json(&SlackPayload { text: &text }).send().await {
        tracing::warn!(target: "querymon::slack", error = %e, "slack notify failed");
    }
}

impl SlowQuerySink for SlackSlowQuerySink {
    fn name(&self) -> &str { "slack" }

    fn emit(&self, event: &SlowQueryEvent) -> Result<(), SinkError> {
        if self.webhook_url.trim().is_empty() {
            return Err(SinkError::Rejected("empty slack webhook url".into()));
        }
        let handle = Handle::try_current().map_err(|_| SinkError::NoRuntime)?;
        handle.spawn(post(self.client.clone(), self.webhook_url.clone(), Self::render(event)));
        Ok(())
    }
}
