use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use semver::Version;

use crate::error::GatewayError;
use crate::gateway::BackendGateway;
use crate::state::Branch;

fn parse_version_loose(s: &str) -> Option<Version> {
    let s = s.trim().trim_start_matches('v');
    if let Ok(v) = Version::parse(s) {
        return Some(v);
    }
    // Allow "12" or "1.2" by padding.
    let parts: Vec<&str> = s.split('.').collect();
    let padded = match parts.len() {
        1 => format!("{}.0.0", s),
        2 => format!("{}.0", s),
        _ => s.to_string(),
    };
    Version::parse(&padded).ok()
}

pub fn cmp_version_str(a: &str, b: &str) -> Ordering {
    match (parse_version_loose(a), parse_version_loose(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb),
        // Prefer parsable versions over non-parsable.
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Newest first, duplicates and empty ids dropped.
fn normalize_versions(mut versions: Vec<String>) -> Vec<String> {
    versions.retain(|v| !v.trim().is_empty());
    versions.sort_by(|a, b| cmp_version_str(b, a));
    versions.dedup();
    versions
}

type FetchFuture = Shared<BoxFuture<'static, Result<Vec<String>, GatewayError>>>;

/// Last-fetched installable versions per branch.
///
/// A successful fetch replaces the branch's cached list atomically; a failed
/// fetch leaves the previous snapshot untouched. Concurrent fetches for the
/// same branch share one in-flight gateway call. The cache never touches the
/// selected version.
pub struct VersionCatalog {
    gateway: Arc<dyn BackendGateway>,
    cached: Mutex<HashMap<Branch, Vec<String>>>,
    in_flight: Mutex<HashMap<Branch, FetchFuture>>,
}

impl VersionCatalog {
    pub fn new(gateway: Arc<dyn BackendGateway>) -> Self {
        VersionCatalog {
            gateway,
            cached: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Last successful snapshot for `branch`; empty if never fetched.
    pub fn cached(&self, branch: Branch) -> Vec<String> {
        self.cached
            .lock()
            .expect("catalog lock poisoned")
            .get(&branch)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn fetch(&self, branch: Branch) -> Result<Vec<String>, GatewayError> {
        let fut = {
            let mut in_flight = self.in_flight.lock().expect("catalog lock poisoned");
            match in_flight.get(&branch) {
                Some(existing) => existing.clone(),
                None => {
                    let gateway = Arc::clone(&self.gateway);
                    let fut = async move {
                        gateway
                            .get_versions(branch)
                            .await
                            .map(normalize_versions)
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(branch, fut.clone());
                    fut
                }
            }
        };

        let result = fut.clone().await;

        {
            let mut in_flight = self.in_flight.lock().expect("catalog lock poisoned");
            // Only clear our own entry; a newer fetch may already be running.
            if in_flight.get(&branch).is_some_and(|f| f.ptr_eq(&fut)) {
                in_flight.remove(&branch);
            }
        }

        if let Ok(list) = &result {
            self.cached
                .lock()
                .expect("catalog lock poisoned")
                .insert(branch, list.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::gateway::{DiagnosticReport, InstanceInfo, NewsItem};

    struct SlowVersionsGateway {
        calls: AtomicUsize,
        release: Notify,
        versions: Mutex<Result<Vec<String>, GatewayError>>,
    }

    impl SlowVersionsGateway {
        fn new(versions: Result<Vec<String>, GatewayError>) -> Self {
            SlowVersionsGateway {
                calls: AtomicUsize::new(0),
                release: Notify::new(),
                versions: Mutex::new(versions),
            }
        }
    }

    #[async_trait]
    impl BackendGateway for SlowVersionsGateway {
        async fn get_identity(&self) -> Result<String, GatewayError> {
            Err(GatewayError::Rejected("not under test".to_string()))
        }
        async fn set_identity(&self, _nickname: &str) -> Result<(), GatewayError> {
            Err(GatewayError::Rejected("not under test".to_string()))
        }
        async fn get_instance_info(&self) -> Result<InstanceInfo, GatewayError> {
            Err(GatewayError::Rejected("not under test".to_string()))
        }
        async fn get_versions(&self, _branch: Branch) -> Result<Vec<String>, GatewayError> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.release.notified().await;
            self.versions.lock().unwrap().clone()
        }
        async fn set_branch(&self, _branch: Branch) -> Result<(), GatewayError> {
            Err(GatewayError::Rejected("not under test".to_string()))
        }
        async fn set_version(&self, _version: &str, _instance_id: &str) -> Result<(), GatewayError> {
            Err(GatewayError::Rejected("not under test".to_string()))
        }
        async fn play(
            &self,
            _nickname: &str,
            _server_address: Option<&str>,
        ) -> Result<(), GatewayError> {
            Err(GatewayError::Rejected("not under test".to_string()))
        }
        async fn request_self_update(&self) -> Result<(), GatewayError> {
            Err(GatewayError::Rejected("not under test".to_string()))
        }
        async fn run_diagnostics(&self) -> Result<DiagnosticReport, GatewayError> {
            Err(GatewayError::Rejected("not under test".to_string()))
        }
        async fn get_launcher_version(&self) -> Result<String, GatewayError> {
            Err(GatewayError::Rejected("not under test".to_string()))
        }
        async fn get_news_feed(&self) -> Result<Vec<NewsItem>, GatewayError> {
            Err(GatewayError::Rejected("not under test".to_string()))
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_fetches_share_one_call() {
        let gateway = Arc::new(SlowVersionsGateway::new(Ok(vec![
            "12".to_string(),
            "14".to_string(),
            "13".to_string(),
        ])));
        let catalog = Arc::new(VersionCatalog::new(gateway.clone()));

        let a = tokio::spawn({
            let catalog = Arc::clone(&catalog);
            async move { catalog.fetch(Branch::Release).await }
        });
        let b = tokio::spawn({
            let catalog = Arc::clone(&catalog);
            async move { catalog.fetch(Branch::Release).await }
        });

        // Let both callers join the in-flight future before releasing it.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        gateway.release.notify_waiters();

        let list_a = a.await.unwrap().unwrap();
        let list_b = b.await.unwrap().unwrap();
        assert_eq!(list_a, vec!["14", "13", "12"]);
        assert_eq!(list_a, list_b);
        assert_eq!(gateway.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_snapshot() {
        let gateway = Arc::new(SlowVersionsGateway::new(Ok(vec![
            "2.0.0".to_string(),
            "1.0.0".to_string(),
        ])));
        let catalog = VersionCatalog::new(gateway.clone());

        gateway.release.notify_one();
        catalog.fetch(Branch::Release).await.unwrap();
        assert_eq!(catalog.cached(Branch::Release), vec!["2.0.0", "1.0.0"]);

        *gateway.versions.lock().unwrap() =
            Err(GatewayError::Transport("connection refused".to_string()));
        gateway.release.notify_one();
        let err = catalog.fetch(Branch::Release).await.unwrap_err();
        assert!(matches!(err, GatewayError::Transport(_)));
        assert_eq!(catalog.cached(Branch::Release), vec!["2.0.0", "1.0.0"]);
    }

    #[tokio::test]
    async fn refetch_after_resolution_hits_gateway_again() {
        let gateway = Arc::new(SlowVersionsGateway::new(Ok(vec!["1".to_string()])));
        let catalog = VersionCatalog::new(gateway.clone());

        gateway.release.notify_one();
        catalog.fetch(Branch::Release).await.unwrap();
        gateway.release.notify_one();
        catalog.fetch(Branch::Release).await.unwrap();
        assert_eq!(gateway.calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn normalization_orders_newest_first() {
        let got = normalize_versions(vec![
            "1.2.0".to_string(),
            "".to_string(),
            "1.10.0".to_string(),
            "0.9".to_string(),
            "1.2.0".to_string(),
        ]);
        assert_eq!(got, vec!["1.10.0", "1.2.0", "0.9"]);
    }

    #[test]
    fn numeric_ids_compare_numerically() {
        let got = normalize_versions(vec![
            "7".to_string(),
            "10".to_string(),
            "9".to_string(),
        ]);
        assert_eq!(got, vec!["10", "9", "7"]);
    }

    #[test]
    fn unparsable_ids_sort_after_parsable() {
        assert_eq!(cmp_version_str("nightly", "1.0.0"), Ordering::Less);
        assert_eq!(cmp_version_str("v2", "1.9.9"), Ordering::Greater);
    }
}
