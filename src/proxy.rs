/// Upstream reply, mirrored back to the caller as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
#[error("upstream request to {url} failed: {source}")]
pub struct ProxyError {
    pub url: String,
    #[source]
    pub source: reqwest::Error,
}

/// Single-hop GET passthrough to a fixed base URL. No retries, transport
/// default timeouts.
pub struct ProxyClient {
    client: reqwest::Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn target(&self, path: &str, query: Option<&str>) -> String {
        let path = path.strip_prefix('/').unwrap_or(path);
        match query {
            Some(q) if !q.is_empty() => format!("{}/{}?{}", self.base_url, path, q),
            _ => format!("{}/{}", self.base_url, path),
        }
    }

    pub async fn forward(
        &self,
        path: &str,
        query: Option<&str>,
    ) -> Result<UpstreamResponse, ProxyError> {
        let url = self.target(path, query);
        let wrap = |source| ProxyError {
            url: url.clone(),
            source,
        };

        let resp = self.client.get(&url).send().await.map_err(wrap)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(wrap)?;

        tracing::info!("proxied GET {} -> {}", url, status);
        Ok(UpstreamResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_joins_path_and_query() {
        let proxy = ProxyClient::new("http://127.0.0.1:5000/api/");
        assert_eq!(proxy.base_url(), "http://127.0.0.1:5000/api");
        assert_eq!(
            proxy.target("v1/model", None),
            "http://127.0.0.1:5000/api/v1/model"
        );
        assert_eq!(
            proxy.target("/v1/info", Some("a=1&b=2")),
            "http://127.0.0.1:5000/api/v1/info?a=1&b=2"
        );
        assert_eq!(proxy.target("x", Some("")), "http://127.0.0.1:5000/api/x");
        assert_eq!(
            proxy.target("/a%3Fb//c/", None),
            "http://127.0.0.1:5000/api/a%3Fb//c/"
        );
    }
}
