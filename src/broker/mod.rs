//! Hosted connected-accounts broker.

mod client;

pub use client::HostedBrokerClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolkitError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitiatedConnection {
    pub id: String,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectedAccount {
    pub id: String,
    pub user_id: Option<String>,
    pub status: String,
    pub toolkit_slug: Option<String>,
    pub auth_config_id: Option<String>,
}

impl ConnectedAccount {
    /// Display name: the toolkit slug, falling back to the auth config id.
    pub fn app_name(&self) -> Option<&str> {
        self.toolkit_slug
            .as_deref()
            .or(self.auth_config_id.as_deref())
    }
}

#[async_trait]
pub trait ConnectionBroker: Send + Sync {
    async fn initiate(
        &self,
        user_id: &str,
        auth_config_id: &str,
    ) -> Result<InitiatedConnection, ToolkitError>;

    async fn list(&self, user_id: &str) -> Result<Vec<ConnectedAccount>, ToolkitError>;

    /// `None` when the broker does not know the id.
    async fn get(&self, id: &str) -> Result<Option<ConnectedAccount>, ToolkitError>;

    async fn delete(&self, id: &str) -> Result<(), ToolkitError>;
}
