//! # Broadcast Channels
//!
//! `/block` fan-out and `/logs/:app_id` routing over real connections.

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use block_hub::{BroadcastConfig, ChannelKey, HubConfig};
    use shared_types::{decode_app_logs, decode_record, walk_transactions};
    use std::time::Duration;

    fn awaiting_config() -> HubConfig {
        HubConfig {
            broadcast: BroadcastConfig {
                await_delivery: true,
                ..BroadcastConfig::default()
            },
            ..HubConfig::default()
        }
    }

    #[tokio::test]
    async fn test_block_fan_out_to_every_subscriber() {
        let hub = TestHub::start().await;
        let mut clients = Vec::new();
        for _ in 0..3 {
            clients.push(hub.subscribe("block", ChannelKey::Block).await);
        }

        let returned = hub.process(sample_record(5)).await.unwrap();
        assert_eq!(returned, sample_record(5));

        for client in &mut clients {
            let bytes = next_binary(client).await.expect("frame");
            let seen = decode_record(&bytes).unwrap();
            assert_eq!(seen.round(), 5);
            assert_eq!(seen.payset.len(), 3);
            assert!(seen.header.state_proof_tracking.is_none());
            assert!(seen.delta.header.state_proof_tracking.is_none());
            assert!(seen.delta.tx_leases.is_none());
            walk_transactions(&seen.payset, &mut |t| {
                assert!(t.apply_data.eval_delta.local_deltas.is_none());
            });
        }
        hub.close().await;
    }

    #[tokio::test]
    async fn test_logs_routed_by_application() {
        let hub = TestHub::start().await;
        let mut app42 = hub.subscribe("logs/42", ChannelKey::Logs(42)).await;
        let mut app7 = hub.subscribe("logs/7", ChannelKey::Logs(7)).await;
        let mut quiet = hub.subscribe("logs/8", ChannelKey::Logs(8)).await;

        hub.process(sample_record(11)).await.unwrap();

        let frame = decode_app_logs(&next_binary(&mut app42).await.unwrap()).unwrap();
        assert_eq!(frame.round, 11);
        assert_eq!(frame.application_id, 42);
        assert_eq!(
            frame.lines,
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );

        let frame = decode_app_logs(&next_binary(&mut app7).await.unwrap()).unwrap();
        assert_eq!(frame.application_id, 7);
        assert_eq!(frame.lines, vec![b"x".to_vec()]);

        expect_silence(&mut quiet, Duration::from_millis(200)).await;
        hub.close().await;
    }

    #[tokio::test]
    async fn test_departed_subscriber_is_dropped_without_affecting_others() {
        let hub = TestHub::with_config(awaiting_config()).await;
        let gone = hub.subscribe("block", ChannelKey::Block).await;
        let mut stays = hub.subscribe("block", ChannelKey::Block).await;
        drop(gone);

        for round in 1..=3 {
            hub.process(sample_record(round)).await.unwrap();
            let seen = decode_record(&next_binary(&mut stays).await.unwrap()).unwrap();
            assert_eq!(seen.round(), round);
        }

        let registry = std::sync::Arc::clone(hub.hub.registry());
        wait_until(move || registry.len(&ChannelKey::Block) == 1).await;
        hub.close().await;
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_only_later_records() {
        let hub = TestHub::with_config(awaiting_config()).await;
        hub.process(sample_record(1)).await.unwrap();

        let mut late = hub.subscribe("block", ChannelKey::Block).await;
        hub.process(sample_record(2)).await.unwrap();

        let seen = decode_record(&next_binary(&mut late).await.unwrap()).unwrap();
        assert_eq!(seen.round(), 2);
        hub.close().await;
    }
}
