//! The `done` tool: record the result metadata and finish the run.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Number, Value};

use super::{Tool, ToolContext};
use crate::agents::RunStateUpdate;

/// Marks the content creation run as finished.
pub struct Done;

#[derive(Debug, Deserialize)]
struct DoneArgs {
    title: String,
    word_count: Number,
    summary: String,
}

impl DoneArgs {
    /// Count stored in the run state: rounded, with negatives clamped to zero.
    fn stored_word_count(&self) -> u64 {
        match self.word_count.as_u64() {
            Some(count) => count,
            None => self.word_count.as_f64().unwrap_or_default().round().max(0.0) as u64,
        }
    }
}

/// Confirmation text; every value is echoed exactly as the model sent it.
pub fn confirmation(title: &str, word_count: &Number, summary: &str) -> String {
    format!(
        "Content creation finished!\nTitle: \"{}\"\nWords: {}\nSummary: {}",
        title, word_count, summary
    )
}

#[async_trait]
impl Tool for Done {
    fn name(&self) -> &str {
        "done"
    }

    fn description(&self) -> &str {
        "Call this once the content has been generated and saved to the database. \
        Records the title, word count and summary and ends the run."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Title of the saved content"
                },
                "word_count": {
                    "type": "number",
                    "description": "Number of words in the content"
                },
                "summary": {
                    "type": "string",
                    "description": "One or two sentence summary of the content"
                }
            },
            "required": ["title", "word_count", "summary"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> anyhow::Result<String> {
        let args: DoneArgs = serde_json::from_value(args)
            .map_err(|e| anyhow::anyhow!("Invalid arguments: {}", e))?;
        let word_count = args.stored_word_count();

        tracing::info!(
            run_id = %ctx.run_id,
            title = %args.title,
            word_count,
            "Content creation finished"
        );

        let message = confirmation(&args.title, &args.word_count, &args.summary);
        ctx.state
            .update([
                RunStateUpdate::Title(args.title),
                RunStateUpdate::WordCount(word_count),
                RunStateUpdate::Summary(args.summary),
                RunStateUpdate::Completed,
            ])
            .await;

        Ok(message)
    }
}
