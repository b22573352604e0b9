use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::HostConfig;
use crate::error::GatewayError;
use crate::state::Branch;

/// Branch and version the host service has persisted for this install.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceInfo {
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub version: String,
}

/// Read-only rotating feed entry. Content is host-owned; the controller
/// only tracks the rotation index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub destination_url: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub image_ref: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformInfo {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub num_cpu: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectivityInfo {
    #[serde(default)]
    pub can_reach_game_server: bool,
    #[serde(default)]
    pub game_server_error: Option<String>,
    #[serde(default)]
    pub response_time_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalInstallInfo {
    #[serde(default)]
    pub game_installed: bool,
    #[serde(default)]
    pub current_version: String,
    #[serde(default)]
    pub install_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerVersionsInfo {
    #[serde(default)]
    pub latest_version: String,
    #[serde(default)]
    pub found_versions: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Diagnostics collected by the host service, relayed verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticReport {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub platform: PlatformInfo,
    #[serde(default)]
    pub connectivity: ConnectivityInfo,
    #[serde(default)]
    pub local_installation: LocalInstallInfo,
    #[serde(default)]
    pub server_versions: ServerVersionsInfo,
}

#[derive(Debug, Default, Deserialize)]
struct VersionsResponse {
    #[serde(default)]
    versions: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Command surface of the external host service. Every operation is an
/// independently awaitable request/response call; completion of the
/// long-running ones (`play`, `request_self_update`) is signaled by pushed
/// events, not by the call resolving.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    async fn get_identity(&self) -> Result<String, GatewayError>;
    async fn set_identity(&self, nickname: &str) -> Result<(), GatewayError>;
    async fn get_instance_info(&self) -> Result<InstanceInfo, GatewayError>;
    async fn get_versions(&self, branch: Branch) -> Result<Vec<String>, GatewayError>;
    async fn set_branch(&self, branch: Branch) -> Result<(), GatewayError>;
    async fn set_version(&self, version: &str, instance_id: &str) -> Result<(), GatewayError>;
    async fn play(&self, nickname: &str, server_address: Option<&str>) -> Result<(), GatewayError>;
    async fn request_self_update(&self) -> Result<(), GatewayError>;
    async fn run_diagnostics(&self) -> Result<DiagnosticReport, GatewayError>;
    async fn get_launcher_version(&self) -> Result<String, GatewayError>;
    async fn get_news_feed(&self) -> Result<Vec<NewsItem>, GatewayError>;
}

/// JSON-over-HTTP client for the host service.
///
/// Endpoint: `POST {base}/rpc/{method}` with a JSON body; the response body
/// is the result JSON. Non-2xx responses carry a plain-text reason.
pub struct HttpGateway {
    client: reqwest::Client,
    base: String,
}

impl HttpGateway {
    pub fn new(config: &HostConfig) -> Self {
        HttpGateway {
            client: reqwest::Client::new(),
            base: config.rpc_base.clone(),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, GatewayError> {
        let url = format!("{}/rpc/{}", self.base, method);
        log::info!("gateway POST {url}");
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::transport)?;
        if !resp.status().is_success() {
            let status = resp.status();
            let reason = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected(format!("{status}: {reason}")));
        }
        resp.json::<T>().await.map_err(GatewayError::transport)
    }

    async fn call_ack(&self, method: &str, body: serde_json::Value) -> Result<(), GatewayError> {
        let _ = self.call::<serde_json::Value>(method, body).await?;
        Ok(())
    }
}

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn get_identity(&self) -> Result<String, GatewayError> {
        self.call("getIdentity", json!({})).await
    }

    async fn set_identity(&self, nickname: &str) -> Result<(), GatewayError> {
        self.call_ack("setIdentity", json!({ "nickname": nickname }))
            .await
    }

    async fn get_instance_info(&self) -> Result<InstanceInfo, GatewayError> {
        self.call("getInstanceInfo", json!({})).await
    }

    async fn get_versions(&self, branch: Branch) -> Result<Vec<String>, GatewayError> {
        let resp: VersionsResponse = self
            .call("getVersions", json!({ "branch": branch.as_wire() }))
            .await?;
        if let Some(error) = resp.error {
            return Err(GatewayError::Rejected(error));
        }
        Ok(resp.versions)
    }

    async fn set_branch(&self, branch: Branch) -> Result<(), GatewayError> {
        self.call_ack("setBranch", json!({ "branch": branch.as_wire() }))
            .await
    }

    async fn set_version(&self, version: &str, instance_id: &str) -> Result<(), GatewayError> {
        self.call_ack(
            "setVersion",
            json!({ "version": version, "instanceId": instance_id }),
        )
        .await
    }

    async fn play(&self, nickname: &str, server_address: Option<&str>) -> Result<(), GatewayError> {
        // Long-running: the host holds this open for the whole
        // download/install/launch pipeline. Completion is reported through
        // the event channel, not through this response.
        self.call_ack(
            "play",
            json!({ "nickname": nickname, "serverAddress": server_address }),
        )
        .await
    }

    async fn request_self_update(&self) -> Result<(), GatewayError> {
        self.call_ack("requestSelfUpdate", json!({})).await
    }

    async fn run_diagnostics(&self) -> Result<DiagnosticReport, GatewayError> {
        self.call("runDiagnostics", json!({})).await
    }

    async fn get_launcher_version(&self) -> Result<String, GatewayError> {
        self.call("getLauncherVersion", json!({})).await
    }

    async fn get_news_feed(&self) -> Result<Vec<NewsItem>, GatewayError> {
        self.call("getNewsFeed", json!({})).await
    }
}
