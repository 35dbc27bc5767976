//! Capability router: aggregates tool listings across providers and routes
//! tool calls to the provider that owns the tool name.
//!
//! Provides:
//! - The merged tool list, with duplicate names rejected
//! - Ownership lookup by exact tool name
//! - Argument validation against the declared parameters
//! - Dispatch that always yields a `ToolResult`, never an error

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use super::errors::CapabilityError;
use super::provider::CapabilityProvider;
use super::types::{CapabilityDomain, Tool};
use crate::inference::types::{ToolCall, ToolResult};

// ─── CapabilityRouter ────────────────────────────────────────────────────────

/// Routes tool calls to registered capability providers.
#[derive(Default)]
pub struct CapabilityRouter {
    providers: Vec<Arc<dyn CapabilityProvider>>,
    /// `tool_name → (provider index, definition)`, rebuilt by `all_tools`.
    index: RwLock<HashMap<String, (usize, Tool)>>,
}

impl CapabilityRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider. Registration order is the order tools are listed in.
    pub fn register(&mut self, provider: Arc<dyn CapabilityProvider>) {
        tracing::info!(provider = %provider.name(), domain = %provider.domain(), "registered capability provider");
        self.providers.push(provider);
    }

    /// Builder-style `register`.
    pub fn with_provider(mut self, provider: Arc<dyn CapabilityProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Union of every provider's tools, in registration order.
    ///
    /// A provider whose listing fails (e.g. permission not yet granted)
    /// contributes no tools. Two providers declaring the same tool name is a
    /// configuration error.
    pub async fn all_tools(&self) -> Result<Vec<Tool>, CapabilityError> {
        let mut listings = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match provider.list_tools().await {
                Ok(tools) => listings.push(tools),
                Err(e) => {
                    tracing::warn!(provider = %provider.name(), error = %e, "provider listing failed, offering no tools");
                    listings.push(Vec::new());
                }
            }
        }

        let mut index: HashMap<String, (usize, Tool)> = HashMap::new();
        let mut merged = Vec::new();
        for (owner, tools) in listings.into_iter().enumerate() {
            for tool in tools {
                if let Some((first, _)) = index.get(&tool.name) {
                    return Err(CapabilityError::DuplicateTool {
                        name: tool.name.clone(),
                        first: self.providers[*first].name().to_string(),
                        second: self.providers[owner].name().to_string(),
                    });
                }
                index.insert(tool.name.clone(), (owner, tool.clone()));
                merged.push(tool);
            }
        }

        tracing::debug!(tool_count = merged.len(), "rebuilt tool index");
        match self.index.write() {
            Ok(mut guard) => *guard = index,
            Err(poisoned) => *poisoned.into_inner() = index,
        }

        Ok(merged)
    }

    fn lookup(&self, tool_name: &str) -> Option<(usize, Tool)> {
        match self.index.read() {
            Ok(guard) => guard.get(tool_name).cloned(),
            Err(poisoned) => poisoned.into_inner().get(tool_name).cloned(),
        }
    }

    /// Owning provider's domain, if the tool is known.
    pub fn domain_for(&self, tool_name: &str) -> Option<CapabilityDomain> {
        self.lookup(tool_name)
            .map(|(owner, _)| self.providers[owner].domain())
    }

    /// Domains whose providers think they can help with `message`.
    pub fn hinted_domains(&self, message: &str) -> Vec<CapabilityDomain> {
        self.providers
            .iter()
            .filter(|p| p.can_handle(message))
            .map(|p| p.domain())
            .collect()
    }

    /// Validate a tool call without executing it.
    pub fn validate_tool_call(&self, call: &ToolCall) -> Result<(), CapabilityError> {
        let (_, tool) = self.lookup(&call.name).ok_or(CapabilityError::UnknownTool {
            name: call.name.clone(),
        })?;
        tool.validate_arguments(&call.arguments)
    }

    /// Route one call to its owning provider.
    ///
    /// Unknown tools, invalid arguments and provider failures all come back
    /// as error-flagged results.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResult {
        let entry = match self.lookup(&call.name) {
            Some(entry) => Some(entry),
            None => {
                // Listings can change (permissions granted mid-session); refresh once.
                if let Err(e) = self.all_tools().await {
                    tracing::error!(error = %e, "tool index refresh failed");
                }
                self.lookup(&call.name)
            }
        };

        let Some((owner, tool)) = entry else {
            tracing::warn!(tool = %call.name, call_id = %call.id, "no provider owns tool");
            let err = CapabilityError::UnknownTool {
                name: call.name.clone(),
            };
            return ToolResult::failure(&call.id, err.to_string());
        };

        if let Err(e) = tool.validate_arguments(&call.arguments) {
            tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "rejected tool call arguments");
            return ToolResult::failure(&call.id, e.to_string());
        }

        let provider = &self.providers[owner];
        let start = Instant::now();
        let outcome = provider.execute(&call.name, &call.arguments).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(text) => {
                tracing::info!(
                    tool = %call.name,
                    call_id = %call.id,
                    provider = %provider.name(),
                    duration_ms,
                    result_len = text.len(),
                    "tool call succeeded"
                );
                ToolResult::success(&call.id, text)
            }
            Err(e) => {
                tracing::warn!(
                    tool = %call.name,
                    call_id = %call.id,
                    provider = %provider.name(),
                    duration_ms,
                    error = %e,
                    "tool call failed"
                );
                ToolResult::failure(&call.id, e.to_string())
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
