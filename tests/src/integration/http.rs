//! # HTTP Surface
//!
//! Handshake status codes, health, metrics and shutdown.

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use block_hub::{ChannelKey, ChannelsConfig, HubConfig};

    #[tokio::test]
    async fn test_disabled_channels_are_not_routed() {
        let hub = TestHub::with_config(HubConfig {
            channels: ChannelsConfig {
                block: false,
                logs: true,
                filter: false,
            },
            ..HubConfig::default()
        })
        .await;

        assert_eq!(handshake_status(hub.ws_url("block")).await, 404);
        assert_eq!(handshake_status(hub.ws_url("filter")).await, 404);
        assert_eq!(handshake_status(hub.ws_url("logs/1")).await, 101);
        hub.close().await;
    }

    #[tokio::test]
    async fn test_non_numeric_application_is_bad_request() {
        let hub = TestHub::start().await;
        assert_eq!(handshake_status(hub.ws_url("logs/abc")).await, 400);
        assert_eq!(handshake_status(hub.ws_url("logs/-1")).await, 400);
        assert!(hub.hub.registry().is_empty());
        hub.close().await;
    }

    #[tokio::test]
    async fn test_health_reports_gate_and_subscribers() {
        let hub = TestHub::start().await;
        let _block = hub.subscribe("block", ChannelKey::Block).await;
        let _logs = hub.subscribe("logs/3", ChannelKey::Logs(3)).await;
        let _filter = hub.attach_filter().await;

        let health: serde_json::Value = reqwest::get(hub.http_url("health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(health["status"], "healthy");
        assert_eq!(health["gate"], "attached_idle");
        assert_eq!(health["subscribers"]["block"], 1);
        assert_eq!(health["subscribers"]["logs"], 1);
        hub.close().await;
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let hub = TestHub::start().await;
        hub.process(sample_record(1)).await.unwrap();

        let response = reqwest::get(hub.http_url("metrics")).await.unwrap();
        assert!(response.status().is_success());
        let body = response.text().await.unwrap();
        assert!(body.contains("hub_records_processed_total"));
        hub.close().await;
    }

    #[tokio::test]
    async fn test_close_disconnects_everyone() {
        let hub = TestHub::start().await;
        let mut subscriber = hub.subscribe("block", ChannelKey::Block).await;
        let mut filter = hub.attach_filter().await;

        hub.close().await;

        assert_eq!(next_binary(&mut subscriber).await, None);
        assert_eq!(next_binary(&mut filter).await, None);
        assert!(hub.hub.registry().is_empty());
        assert!(!hub.hub.gate().is_attached());

        // Idempotent, and processing still works without connections.
        hub.close().await;
        assert_eq!(hub.process(sample_record(2)).await.unwrap(), sample_record(2));
    }
}
