//! Model Context Protocol transport to the automation backend.

pub mod client;

pub use client::{McpClient, McpTool};
