//! MCP (Model Context Protocol) client used by connectors and tools
//! that delegate to an external MCP server instead of a bespoke REST
//! integration (currently: the Notion connector and its companion
//! `create_notion_page` tool).

pub mod client;
pub mod protocol;

pub use client::McpClient;
