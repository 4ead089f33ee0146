pub mod connections;
pub mod mcp;
pub mod oauth;
pub mod webhooks;
