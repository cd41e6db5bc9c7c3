//! Mock Server Gateway
//!
//! Thin client for a WireMock-compatible admin API. Only the mapping
//! endpoints are used:
//! - `POST {admin}/mappings` create
//! - `GET {admin}/mappings` list
//! - `DELETE {admin}/mappings` clear
//! - `POST {admin}/reset` reset

use crate::errors::GatewayError;
use crate::openapi::OpenApiDocument;
use crate::stubs::{stubs_from_contract, MockStub};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Read access to the stubs currently deployed on a mock server
#[async_trait]
pub trait StubCatalog: Send + Sync {
    async fn list_stubs(&self) -> Result<Vec<MockStub>, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct MappingList {
    #[serde(default)]
    mappings: Vec<MockStub>,
}

#[derive(Debug, Deserialize)]
struct CreatedMapping {
    id: Option<String>,
    uuid: Option<String>,
}

pub struct MockServerGateway {
    client: Client,
    admin_url: String,
}

impl MockServerGateway {
    /// `admin_url` is the admin API root, e.g. `http://localhost:8080/__admin`.
    pub fn new(admin_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            admin_url: admin_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn admin_url(&self) -> &str {
        &self.admin_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.admin_url, path)
    }

    /// Create one stub, returning the id the mock server assigned.
    pub async fn create_stub(&self, stub: &MockStub) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(self.endpoint("mappings"))
            .json(stub)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let body = check_status(response).await?;

        let created: CreatedMapping =
            serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))?;
        created
            .id
            .or(created.uuid)
            .ok_or_else(|| GatewayError::Decode("created mapping has no id".to_string()))
    }

    pub async fn list_stubs(&self) -> Result<Vec<MockStub>, GatewayError> {
        let response = self
            .client
            .get(self.endpoint("mappings"))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let body = check_status(response).await?;

        let list: MappingList =
            serde_json::from_str(&body).map_err(|e| GatewayError::Decode(e.to_string()))?;
        debug!(count = list.mappings.len(), "Listed deployed stubs");
        Ok(list.mappings)
    }

    /// Remove every stub. Safe to call on an empty server.
    pub async fn clear_stubs(&self) -> Result<(), GatewayError> {
        let response = self
            .client
            .delete(self.endpoint("mappings"))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        check_status(response).await.map(|_| ())
    }

    /// Reset mappings, scenarios and the request journal.
    pub async fn reset(&self) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(self.endpoint("reset"))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        check_status(response).await.map(|_| ())
    }

    /// Create each stub in order. Failures are logged and the stub is left
    /// out of the result; the rest still deploy.
    pub async fn deploy(&self, stubs: &[MockStub]) -> Vec<MockStub> {
        let mut deployed = Vec::with_capacity(stubs.len());
        for stub in stubs {
            match self.create_stub(stub).await {
                Ok(id) => {
                    let mut stub = stub.clone();
                    stub.id = Some(id);
                    deployed.push(stub);
                }
                Err(e) => warn!(stub = %stub.request_key(), error = %e, "Failed to deploy stub"),
            }
        }
        info!(
            deployed = deployed.len(),
            failed = stubs.len() - deployed.len(),
            "Deployed stubs"
        );
        deployed
    }

    /// Optionally clear the server, then deploy one stub per declared
    /// operation of the contract. Partial success is a normal outcome.
    pub async fn generate_and_deploy(
        &self,
        contract: &OpenApiDocument,
        clear_existing: bool,
    ) -> Result<Vec<MockStub>, GatewayError> {
        if clear_existing {
            self.clear_stubs().await?;
        }
        let stubs = stubs_from_contract(contract);
        Ok(self.deploy(&stubs).await)
    }
}

#[async_trait]
impl StubCatalog for MockServerGateway {
    async fn list_stubs(&self) -> Result<Vec<MockStub>, GatewayError> {
        MockServerGateway::list_stubs(self).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<String, GatewayError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::Transport(e.to_string()))?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(GatewayError::HttpStatus {
            status: status.as_u16(),
            body,
        })
    }
}
