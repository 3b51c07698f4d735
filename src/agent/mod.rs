mod providers;
mod retry;
mod system_prompt;
pub mod tools;

pub use providers::{
    LLMProvider, LLMResponse, Message, OpenAIProvider, ProviderError, Role, ToolCall, ToolSchema,
    parse_chat_response,
};
pub use retry::{ResilientProvider, RetryConfig};
pub use system_prompt::build_system_prompt;
pub use tools::{ExplorerTools, Tool, ToolLimits, create_explorer_tools};

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ToolError;

/// Runs the question → tool calls → answer loop.
pub struct Agent {
    provider: Box<dyn LLMProvider>,
    tools: Vec<Box<dyn Tool>>,
    max_turns: usize,
    system_prompt: String,
}

impl Agent {
    pub fn new(
        provider: Box<dyn LLMProvider>,
        explorer: Arc<ExplorerTools>,
        max_turns: usize,
        custom_prompt: Option<&str>,
    ) -> Self {
        let tools = create_explorer_tools(Arc::clone(&explorer));
        let names: Vec<&str> = tools.iter().map(|t| t.name()).collect();
        let system_prompt = build_system_prompt(explorer.root(), &names, custom_prompt);

        Self {
            provider,
            tools,
            max_turns: max_turns.max(1),
            system_prompt,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tool_schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    /// Answer `question`, calling tools as the model requests.
    pub async fn run(&self, question: &str) -> Result<String> {
        let schemas = self.tool_schemas();
        let mut messages = vec![
            Message::system(self.system_prompt.clone()),
            Message::user(question),
        ];

        for turn in 1..=self.max_turns {
            debug!(turn, messages = messages.len(), "Agent turn");

            match self.provider.chat(&messages, &schemas).await? {
                LLMResponse::Text(text) => {
                    info!(turns = turn, "Agent finished");
                    return Ok(text);
                }
                LLMResponse::ToolCalls(calls) => {
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        debug!("Executing tool: {} with args: {}", call.name, call.arguments);
                        let output = self.execute_tool(call).await;
                        results.push(Message::tool_result(call.id.clone(), output.to_string()));
                    }

                    messages.push(Message::assistant_tool_calls(calls));
                    messages.extend(results);
                }
            }
        }

        anyhow::bail!(
            "Agent did not produce an answer within {} turns",
            self.max_turns
        )
    }

    /// Run one call; failures become the error's JSON body so the model can react.
    async fn execute_tool(&self, call: &ToolCall) -> Value {
        let Some(tool) = self.find_tool(&call.name) else {
            return ToolError::input(&call.name, format!("Unknown tool: {}", call.name)).to_json();
        };

        let input = parse_arguments(&call.arguments);
        match tool.execute(input).await {
            Ok(value) => value,
            Err(err) => err.to_json(),
        }
    }

    fn find_tool(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name || t.aliases().contains(&name))
            .map(|t| t.as_ref())
    }
}

/// Model-supplied arguments; anything unparseable becomes `null` and is
/// rejected by the tool's own validation.
fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or(Value::Null)
}
