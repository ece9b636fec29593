//! Built-in tools the agent's tool-call node can dispatch to (spec
//! §4.I), registered into a [`super::ToolRegistry`] at startup.

mod memory;
mod notion;
mod podcast;
mod todos;
mod web;

pub use memory::{MemoryReadTool, MemoryWriteTool, RetrieveTool};
pub use notion::CreateNotionPageTool;
pub use podcast::GeneratePodcastTool;
pub use todos::WriteTodosTool;
pub use web::{LinkPreviewTool, MultiLinkPreviewTool, ScrapeWebpageTool};
