use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::client::ModelClient;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub api_base_url: String,
    pub api_reachable: bool,
    pub checked_at: DateTime<Utc>,
}

/// Check the generation service. Informational only: nothing else waits on it.
pub async fn run_health_check(client: &ModelClient) -> HealthReport {
    info!("Running health check");
    let api_reachable = client.check_health().await;
    info!("3D generation service reachable: {}", api_reachable);

    HealthReport {
        api_base_url: client.base_url().to_string(),
        api_reachable,
        checked_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    #[tokio::test]
    async fn test_unreachable_service_reports_false() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = ModelClient::new(&ApiConfig::new(format!("http://127.0.0.1:{}", port))).unwrap();
        let report = run_health_check(&client).await;
        assert!(!report.api_reachable);
        assert_eq!(report.api_base_url, format!("http://127.0.0.1:{}/", port));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["api_reachable"], false);
    }
}
