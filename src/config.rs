/// Where the host service lives. Everything else the launcher persists
/// (nickname, branch, version) is owned by the host and reached through the
/// gateway, so local configuration is just the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    pub rpc_base: String,
    pub events_url: String,
}

const DEFAULT_HOST_ADDR: &str = "127.0.0.1";
const DEFAULT_HOST_PORT: u16 = 7766;

impl HostConfig {
    /// Resolves the endpoint from `NEBULA_HOST_ADDR` / `NEBULA_HOST_PORT`,
    /// falling back to the local default the host installer registers.
    pub fn from_env() -> Self {
        resolve(
            std::env::var("NEBULA_HOST_ADDR").ok(),
            std::env::var("NEBULA_HOST_PORT").ok(),
        )
    }
}

fn resolve(addr: Option<String>, port: Option<String>) -> HostConfig {
    let addr = addr
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_HOST_ADDR.to_string());
    let port = port
        .and_then(|p| p.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_HOST_PORT);
    HostConfig {
        rpc_base: format!("http://{addr}:{port}"),
        events_url: format!("ws://{addr}:{port}/events"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let cfg = resolve(None, None);
        assert_eq!(cfg.rpc_base, "http://127.0.0.1:7766");
        assert_eq!(cfg.events_url, "ws://127.0.0.1:7766/events");
    }

    #[test]
    fn overrides_apply() {
        let cfg = resolve(Some("10.0.0.5".to_string()), Some("9000".to_string()));
        assert_eq!(cfg.rpc_base, "http://10.0.0.5:9000");
        assert_eq!(cfg.events_url, "ws://10.0.0.5:9000/events");
    }

    #[test]
    fn garbage_port_falls_back() {
        let cfg = resolve(None, Some("not-a-port".to_string()));
        assert_eq!(cfg.rpc_base, "http://127.0.0.1:7766");
    }
}
