//! cache_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use stash_client::OfflineCache;

use crate::tools::json_result;

pub async fn status_impl(cache: &OfflineCache) -> Result<CallToolResult, McpError> {
    let status = cache.status().await?;
    json_result(&status)
}
