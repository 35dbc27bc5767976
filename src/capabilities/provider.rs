//! The contract every capability module implements.

use async_trait::async_trait;

use super::errors::CapabilityError;
use super::types::{CapabilityDomain, Tool};
use crate::inference::types::ToolArguments;

/// A module exposing a set of tools against one platform resource.
///
/// Tool names must be disjoint across providers; the router treats a
/// collision as a configuration error.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Stable provider name used in logs and configuration errors.
    fn name(&self) -> &str;

    fn domain(&self) -> CapabilityDomain;

    /// Enumerate the tools this provider currently offers.
    ///
    /// Fails only on provider setup problems such as a missing platform
    /// permission.
    async fn list_tools(&self) -> Result<Vec<Tool>, CapabilityError>;

    /// Execute one of this provider's tools and return a textual summary.
    async fn execute(&self, tool_name: &str, args: &ToolArguments) -> Result<String, CapabilityError>;

    /// Cheap hint: could this provider plausibly help with `message`?
    ///
    /// Never used as a correctness gate.
    fn can_handle(&self, _message: &str) -> bool {
        false
    }
}
