use tracing::debug;
use uuid::Uuid;

use crate::client::ModelClient;
use crate::errors::BananaResult;
use crate::types::*;

/// Client-side chat: replays the accumulated history on every message.
///
/// The API keeps no conversation state, so the session owns it. History only
/// grows when an exchange succeeds.
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: Uuid,
    model: String,
    generation_config: Option<GenerationConfig>,
    tools: Option<Vec<Tool>>,
    tool_config: Option<ToolConfig>,
    history: Vec<Content>,
}

impl ChatSession {
    pub fn new(model: impl Into<String>, generation_config: Option<GenerationConfig>) -> Self {
        Self {
            id: Uuid::new_v4(),
            model: model.into(),
            generation_config,
            tools: None,
            tool_config: None,
            history: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_tool_config(mut self, tool_config: ToolConfig) -> Self {
        self.tool_config = Some(tool_config);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn history(&self) -> &[Content] {
        &self.history
    }

    /// Sends one user message and records the exchange on success
    pub async fn send_message<C>(
        &mut self,
        client: &C,
        parts: Vec<Part>,
    ) -> BananaResult<GenerateContentResponse>
    where
        C: ModelClient + ?Sized,
    {
        let user = Content::user(parts);
        let mut contents = self.history.clone();
        contents.push(user.clone());

        let request = GenerateContentRequest {
            contents,
            system_instruction: None,
            tools: self.tools.clone(),
            tool_config: self.tool_config.clone(),
            generation_config: self.generation_config.clone(),
        };

        debug!(session = %self.id, turns = self.history.len() / 2, "Sending chat message");
        let response = client.generate_content(&self.model, &request).await?;

        self.history.push(user);
        if let Some(content) = response.first_candidate().and_then(|c| c.content.clone()) {
            self.history.push(Content {
                parts: content.parts,
                role: Some("model".to_string()),
            });
        }

        Ok(response)
    }
}
