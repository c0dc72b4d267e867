//! Summarize a window of the channel's history.

use async_trait::async_trait;
use chorus_core::error::ToolError;
use chorus_core::tool::{Tool, ToolContext};
use serde_json::{Map, Value};
use tracing::debug;

use crate::required_str;

pub const UNSUPPORTED: &str = "This provider does not support summarizing messages.";

pub struct SummarizeMessagesTool;

#[async_trait]
impl Tool for SummarizeMessagesTool {
    fn name(&self) -> &str {
        "summarize_messages"
    }

    fn description(&self) -> &str {
        "Summarize the messages posted in this channel between two ISO 8601 timestamps. \
         The window may span at most 7 days."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "start_time": {
                    "type": "string",
                    "description": "Start of the window, ISO 8601 (e.g. 2024-01-01T12:00:00Z)"
                },
                "end_time": {
                    "type": "string",
                    "description": "End of the window, ISO 8601 (e.g. 2024-01-01T13:00:00Z)"
                }
            },
            "required": ["start_time", "end_time"]
        })
    }

    fn guidance(&self) -> &str {
        "When someone asks what was said in this channel over some period, call \
         summarize_messages with ISO 8601 start and end times worked out from the current time."
    }

    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: Map<String, Value>,
    ) -> Result<String, ToolError> {
        let start_time = required_str(self, &arguments, "start_time")?;
        let end_time = required_str(self, &arguments, "end_time")?;

        let Some(summarizer) = ctx.provider.summarizer() else {
            return Ok(UNSUPPORTED.into());
        };

        debug!(channel_id = %ctx.channel_id(), start_time, end_time, "Summarizing messages");

        match summarizer
            .summarize_messages(ctx.channel.as_ref(), ctx.channel_id(), start_time, end_time)
            .await
        {
            Ok(summary) => Ok(summary),
            // Bad input is explained to the model, not raised
            Err(e) if e.is_invalid_input() => Ok(e.to_string()),
            Err(e) => Err(ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            }),
        }
    }
}
