//! Single-agent routing loop.
//!
//! # Algorithm
//! 1. Before each turn, read `completed` from the run state
//! 2. Completed: stop. Turn budget spent: abort. Otherwise dispatch a turn
//! 3. A turn calls the LLM and executes the requested tools in order
//! 4. The whole run is bounded by a wall-clock deadline

use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use super::{AgentDefinition, RunState, SharedRunState};
use crate::llm::{ChatMessage, LlmClient, Role, TokenUsage, ToolCall};
use crate::tools::ToolContext;

const CONTINUE_REMINDER: &str =
    "Continue with the workflow. The run only ends when you call the `done` tool.";

/// Why a run ended without completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    MaxTurns,
    Timeout,
    LlmError,
}

/// Routing loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingState {
    Running,
    Stopped,
    Aborted(AbortReason),
}

impl RoutingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Aborted(_) => "aborted",
        }
    }

    pub fn abort_reason(&self) -> Option<AbortReason> {
        match self {
            Self::Aborted(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl Serialize for RoutingState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Decide, before a turn, whether the loop continues.
///
/// Completion wins over the turn bound: a run that finished on its last
/// allowed turn is stopped, not aborted.
pub fn route(completed: bool, turns: usize, max_turns: usize) -> RoutingState {
    if completed {
        RoutingState::Stopped
    } else if turns >= max_turns {
        RoutingState::Aborted(AbortReason::MaxTurns)
    } else {
        RoutingState::Running
    }
}

/// Bounds applied to every run.
#[derive(Debug, Clone, Copy)]
pub struct RunLimits {
    pub max_turns: usize,
    pub timeout: Duration,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_turns: 25,
            timeout: Duration::from_secs(600),
        }
    }
}

/// One executed tool call.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub turn: usize,
    pub name: String,
    pub arguments: Value,
    pub is_error: bool,
}

/// Result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub state: RoutingState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,
    pub model: String,
    pub turns: usize,
    pub output: String,
    pub result: RunState,
    pub tool_calls: Vec<ToolCallRecord>,
    pub usage: TokenUsage,
}

impl RunOutcome {
    pub fn is_stopped(&self) -> bool {
        self.state == RoutingState::Stopped
    }
}

/// Progress that must survive the deadline cancelling the turn loop.
#[derive(Default)]
struct Progress {
    turns: usize,
    output: String,
    tool_calls: Vec<ToolCallRecord>,
    usage: TokenUsage,
}

/// Routing network with a single agent.
pub struct ContentNetwork {
    agent: AgentDefinition,
    llm: Arc<dyn LlmClient>,
    limits: RunLimits,
}

impl ContentNetwork {
    pub fn new(agent: AgentDefinition, llm: Arc<dyn LlmClient>, limits: RunLimits) -> Self {
        Self { agent, llm, limits }
    }

    pub fn agent(&self) -> &AgentDefinition {
        &self.agent
    }

    pub fn limits(&self) -> RunLimits {
        self.limits
    }

    /// Run the agent on one request until it calls `done` or a bound is hit.
    pub async fn run(&self, input: &str, model_override: Option<&str>) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let model = model_override.unwrap_or(&self.agent.model).to_string();
        let ctx = ToolContext::new(run_id, SharedRunState::new());
        let mut progress = Progress::default();

        tracing::info!(%run_id, model = %model, "Starting run: {}", preview(input));

        let state = match tokio::time::timeout(
            self.limits.timeout,
            self.drive(input, &model, &ctx, &mut progress),
        )
        .await
        {
            Ok(state) => state,
            Err(_) => {
                progress.output = format!(
                    "Run timed out after {}s without completion",
                    self.limits.timeout.as_secs()
                );
                RoutingState::Aborted(AbortReason::Timeout)
            }
        };

        match state {
            RoutingState::Stopped => {
                tracing::info!(%run_id, turns = progress.turns, "Run completed")
            }
            _ => tracing::warn!(
                %run_id,
                turns = progress.turns,
                reason = ?state.abort_reason(),
                "Run aborted: {}",
                progress.output
            ),
        }

        RunOutcome {
            run_id,
            state,
            abort_reason: state.abort_reason(),
            model,
            turns: progress.turns,
            output: progress.output,
            result: ctx.state.snapshot().await,
            tool_calls: progress.tool_calls,
            usage: progress.usage,
        }
    }

    async fn drive(
        &self,
        input: &str,
        model: &str,
        ctx: &ToolContext,
        progress: &mut Progress,
    ) -> RoutingState {
        let tools = &self.agent.tools;
        let tool_schemas = tools.get_tool_schemas();
        let mut messages = vec![
            ChatMessage::system(self.agent.system_prompt.clone()),
            ChatMessage::user(input),
        ];

        loop {
            let state = route(
                ctx.state.is_completed().await,
                progress.turns,
                self.limits.max_turns,
            );
            if state != RoutingState::Running {
                if state == RoutingState::Aborted(AbortReason::MaxTurns) {
                    progress.output = format!(
                        "Max turns ({}) reached without completion",
                        self.limits.max_turns
                    );
                }
                return state;
            }

            progress.turns += 1;
            let turn = progress.turns;
            tracing::debug!(run_id = %ctx.run_id, "Turn {}", turn);

            let response = match self
                .llm
                .chat_completion_with_options(
                    model,
                    &messages,
                    Some(&tool_schemas),
                    self.agent.options.clone(),
                )
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    progress.output = format!("LLM error: {}", e);
                    return RoutingState::Aborted(AbortReason::LlmError);
                }
            };
            if let Some(usage) = response.usage {
                progress.usage.add(usage);
            }

            let tool_calls = response.requested_tool_calls().to_vec();
            if tool_calls.is_empty() {
                match response.content.filter(|c| !c.trim().is_empty()) {
                    Some(text) => {
                        progress.output = text.clone();
                        messages.push(ChatMessage::new(Role::Assistant, text));
                    }
                    None => tracing::debug!(run_id = %ctx.run_id, "Empty response on turn {}", turn),
                }
                messages.push(ChatMessage::user(CONTINUE_REMINDER));
                continue;
            }

            messages.push(ChatMessage::assistant_tool_calls(
                response.content.clone(),
                tool_calls.clone(),
            ));

            for (index, call) in tool_calls.iter().enumerate() {
                let (result, record) = self.execute_tool_call(call, ctx, turn).await;
                progress.tool_calls.push(record);
                messages.push(ChatMessage::tool_result(&call.id, result.clone()));

                if ctx.state.is_completed().await {
                    progress.output = result;
                    let skipped = tool_calls.len() - index - 1;
                    if skipped > 0 {
                        tracing::debug!(
                            run_id = %ctx.run_id,
                            "Skipping {} tool call(s) after completion",
                            skipped
                        );
                    }
                    break;
                }
            }
        }
    }

    /// Execute a single tool call. Failures become `Error: ...` text for the model.
    async fn execute_tool_call(
        &self,
        call: &ToolCall,
        ctx: &ToolContext,
        turn: usize,
    ) -> (String, ToolCallRecord) {
        let name = call.function.name.clone();
        let (arguments, result) = match call.parse_arguments() {
            Ok(args) => {
                let result = self.agent.tools.execute(&name, args.clone(), ctx).await;
                (args, result)
            }
            Err(e) => (
                Value::String(call.function.arguments.clone()),
                Err(anyhow::anyhow!("Invalid JSON arguments: {}", e)),
            ),
        };

        let (output, is_error) = match result {
            Ok(output) => (output, false),
            Err(e) => {
                tracing::warn!(run_id = %ctx.run_id, "Tool {} failed: {}", name, e);
                (format!("Error: {}", e), true)
            }
        };

        let record = ToolCallRecord {
            turn,
            name,
            arguments,
            is_error,
        };
        (output, record)
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(80).collect();
    if preview.len() < text.len() {
        preview.push_str("...");
    }
    preview
}
