//! Connection to the cluster that receives replayed documents.

use anyhow::{Context, Result};
use elasticsearch::cluster::ClusterHealthParts;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::indices::IndicesRefreshParts;
use elasticsearch::{CountParts, Elasticsearch};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

/// Cluster handle bound to one index or data stream
#[derive(Clone)]
pub struct EsClient {
    client: Elasticsearch,
    target: String,
}

/// Health colour from a `_cluster/health` body
fn cluster_status(body: &Value) -> Option<&str> {
    body["status"].as_str()
}

impl EsClient {
    /// Build the transport and refuse clusters that report `red`
    pub async fn connect(es_url: &str, target: &str) -> Result<Self> {
        let url = Url::parse(es_url)
            .with_context(|| format!("Invalid Elasticsearch URL {}", es_url))?;
        let transport = TransportBuilder::new(SingleNodeConnectionPool::new(url))
            .disable_proxy()
            .build()?;

        let es = Self {
            client: Elasticsearch::new(transport),
            target: target.to_string(),
        };

        let response = es
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .with_context(|| format!("Elasticsearch at {} is unreachable", es_url))?;
        if !response.status_code().is_success() {
            anyhow::bail!("Cluster health returned {}", response.status_code());
        }

        let body = response.json::<Value>().await?;
        match cluster_status(&body) {
            Some("red") => anyhow::bail!("Elasticsearch cluster status is red"),
            Some("yellow") => warn!("Elasticsearch cluster status is yellow"),
            other => debug!("Elasticsearch cluster status: {:?}", other),
        }

        Ok(es)
    }

    pub fn client(&self) -> &Elasticsearch {
        &self.client
    }

    /// Index or data stream documents are created in
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Refresh the target so freshly created documents are counted
    pub async fn settled_count(&self) -> Result<u64> {
        self.client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[&self.target]))
            .send()
            .await
            .context("Refresh failed")?;

        let body = self
            .client
            .count(CountParts::Index(&[&self.target]))
            .send()
            .await?
            .json::<Value>()
            .await?;
        body["count"]
            .as_u64()
            .with_context(|| format!("Unexpected count response: {}", body))
    }
}
