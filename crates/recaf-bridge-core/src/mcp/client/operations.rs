//! MCP protocol operations (tools, resources)

use super::super::error::McpError;
use super::super::protocol::methods;
use super::super::types::{McpResource, McpResourceContent, McpTool, McpToolResult};
use super::McpClient;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsPage {
    #[serde(default)]
    tools: Vec<McpTool>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourcesPage {
    #[serde(default)]
    resources: Vec<McpResource>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadResourceResult {
    #[serde(default)]
    contents: Vec<McpResourceContent>,
}

/// One page of a cursor-paginated listing
trait Page: DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

impl Page for ToolsPage {
    type Item = McpTool;

    fn into_parts(self) -> (Vec<McpTool>, Option<String>) {
        (self.tools, self.next_cursor)
    }
}

impl Page for ResourcesPage {
    type Item = McpResource;

    fn into_parts(self) -> (Vec<McpResource>, Option<String>) {
        (self.resources, self.next_cursor)
    }
}

impl McpClient {
    /// List available tools, following pagination to the end
    #[instrument(skip(self), level = "debug")]
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        self.ensure_initialized()?;
        self.list_all::<ToolsPage>(methods::TOOLS_LIST).await
    }

    /// Call a tool
    #[instrument(skip(self, arguments), fields(tool_name = %name))]
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult, McpError> {
        self.ensure_initialized()?;

        let params = json!({
            "name": name,
            "arguments": arguments
        });

        self.call(methods::TOOLS_CALL, Some(params)).await
    }

    /// List available resources, following pagination to the end
    #[instrument(skip(self), level = "debug")]
    pub async fn list_resources(&self) -> Result<Vec<McpResource>, McpError> {
        self.ensure_initialized()?;
        self.list_all::<ResourcesPage>(methods::RESOURCES_LIST).await
    }

    /// Read a resource, returning every content item in server order
    #[instrument(skip(self), level = "debug")]
    pub async fn read_resource(&self, uri: &str) -> Result<Vec<McpResourceContent>, McpError> {
        self.ensure_initialized()?;

        let params = json!({
            "uri": uri
        });

        let result: ReadResourceResult = self.call(methods::RESOURCES_READ, Some(params)).await?;
        Ok(result.contents)
    }

    /// Ping the server
    pub async fn ping(&self) -> Result<(), McpError> {
        let _: Value = self.call(methods::PING, None).await?;
        Ok(())
    }

    async fn list_all<P: Page>(&self, method: &str) -> Result<Vec<P::Item>, McpError> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let page: P = self.call(method, params).await?;
            let (batch, next) = page.into_parts();
            items.extend(batch);

            match next {
                Some(next) if cursor.as_deref() != Some(next.as_str()) => {
                    debug!("{} continues at cursor {}", method, next);
                    cursor = Some(next);
                }
                Some(next) => {
                    debug!("{} repeated cursor {}, stopping", method, next);
                    break;
                }
                None => break,
            }
        }

        Ok(items)
    }
}
