//! Tools module - operations the model can call
//!
//! # Overview
//!
//! - `Tool` trait: the interface every tool implements
//! - `ToolRegistry`: ordered registry the orchestrator executes against
//! - [`assistant_tools`]: the assistant's tool set, wired to shared state
//!
//! # Built-in Tools
//!
//! - `systemInfo`, `think`, `search`, `time`
//! - `clearMessageHistory`, `remember`
//! - `schedule`, `getSchedule`, `removeFromSchedule`, `updateSchedule`

pub mod history;
pub mod memory;
mod registry;
pub mod schedule;
pub mod search;
pub mod system_info;
pub mod think;
pub mod time;
mod types;

pub use registry::ToolRegistry;
pub use types::{Tool, ToolOutput, NO_RESPONSE};

use std::sync::Arc;

use crate::agent::ContextBuilder;
use crate::providers::LLMProvider;
use crate::search::SearchBackend;
use crate::state::AgentState;

/// Collaborators the assistant's tools need.
pub struct ToolDeps {
    pub state: Arc<AgentState>,
    pub provider: Arc<dyn LLMProvider>,
    /// `None` leaves the `search` tool out.
    pub search: Option<Arc<dyn SearchBackend>>,
    pub context: ContextBuilder,
    pub think_model: String,
}

/// Register the assistant's tools in the order they are offered to the model.
pub fn assistant_tools(deps: ToolDeps) -> ToolRegistry {
    let ToolDeps {
        state,
        provider,
        search,
        context,
        think_model,
    } = deps;

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(system_info::SystemInfoTool));
    registry.register(Box::new(think::ThinkTool::new(
        provider,
        state.clone(),
        context,
        &think_model,
    )));
    if let Some(backend) = search {
        registry.register(Box::new(search::SearchTool::new(backend)));
    }
    registry.register(Box::new(history::ClearHistoryTool::new(state.clone())));
    registry.register(Box::new(memory::RememberTool::new(state.clone())));
    registry.register(Box::new(time::TimeTool));
    registry.register(Box::new(schedule::ScheduleTool::new(state.clone())));
    registry.register(Box::new(schedule::GetScheduleTool::new(state.clone())));
    registry.register(Box::new(schedule::RemoveFromScheduleTool::new(
        state.clone(),
    )));
    registry.register(Box::new(schedule::UpdateScheduleTool::new(state)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::providers::{ChatOptions, LLMResponse, ToolDefinition};
    use crate::session::Turn;
    use crate::state::InMemoryStore;
    use async_trait::async_trait;

    struct SilentProvider;

    #[async_trait]
    impl LLMProvider for SilentProvider {
        async fn chat(
            &self,
            _messages: Vec<Turn>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            Ok(LLMResponse::text(""))
        }
        fn default_model(&self) -> &str {
            "silent"
        }
        fn name(&self) -> &str {
            "silent"
        }
    }

    struct StaticSearch;

    #[async_trait]
    impl SearchBackend for StaticSearch {
        async fn search(&self, _query: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    fn deps(search: Option<Arc<dyn SearchBackend>>) -> ToolDeps {
        ToolDeps {
            state: Arc::new(AgentState::new(Arc::new(InMemoryStore::new()), 50)),
            provider: Arc::new(SilentProvider),
            search,
            context: ContextBuilder::new(),
            think_model: "o3".to_string(),
        }
    }

    #[test]
    fn test_assistant_tools_order() {
        let registry = assistant_tools(deps(Some(Arc::new(StaticSearch))));
        assert_eq!(
            registry.names(),
            [
                "systemInfo",
                "think",
                "search",
                "clearMessageHistory",
                "remember",
                "time",
                "schedule",
                "getSchedule",
                "removeFromSchedule",
                "updateSchedule",
            ]
        );
    }

    #[test]
    fn test_assistant_tools_without_search() {
        let registry = assistant_tools(deps(None));
        assert!(!registry.has("search"));
        assert_eq!(registry.len(), 9);
    }

    #[tokio::test]
    async fn test_think_with_empty_answer_is_no_response() {
        let registry = assistant_tools(deps(None));
        let out = registry
            .execute("think", serde_json::json!({"request": "why?"}))
            .await
            .unwrap();
        assert_eq!(out.into_result_text(), NO_RESPONSE);
    }
}
