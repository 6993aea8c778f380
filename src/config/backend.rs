use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::mixer::BackendType;

/// Backend selection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct BackendConfig {
    /// Pinned backend; `unknown` tries every backend in priority order.
    #[serde(default)]
    pub backend_type: BackendType,

    /// Sound server address, for backends that connect to a server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_address: Option<String>,
}
