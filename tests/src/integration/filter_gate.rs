//! # Filter Gate
//!
//! The synchronous `/filter` exchange against a live server.

#[cfg(test)]
mod tests {
    use crate::harness::*;
    use block_hub::{BlockProcessor, BlockDistributionHub, FilterConfig, GateError, HubConfig};
    use futures::SinkExt;
    use std::sync::Arc;
    use tokio_tungstenite::tungstenite::Message;

    #[tokio::test]
    async fn test_pass_through_without_filter() {
        let hub = TestHub::start().await;
        assert_eq!(hub.process(sample_record(1)).await.unwrap(), sample_record(1));
        hub.close().await;
    }

    #[tokio::test]
    async fn test_echo_round_trip_restores_stripped_data() {
        let hub = TestHub::start().await;
        let filter = hub.attach_filter().await;
        spawn_filter(filter, Some);

        for round in 1..=3 {
            let returned = hub.process(sample_record(round)).await.unwrap();
            assert_eq!(returned, sample_record(round));
        }
        hub.close().await;
    }

    #[tokio::test]
    async fn test_filter_can_drop_transactions() {
        let hub = TestHub::start().await;
        let filter = hub.attach_filter().await;
        spawn_filter(filter, |mut record| {
            record.payset.remove(1);
            Some(record)
        });

        let returned = hub.process(sample_record(4)).await.unwrap();
        let mut expected = sample_record(4);
        expected.payset.remove(1);
        assert_eq!(returned, expected);
        hub.close().await;
    }

    #[tokio::test]
    async fn test_disconnect_while_pending_fails_fast() {
        let hub = TestHub::start().await;
        let filter = hub.attach_filter().await;
        spawn_filter(filter, |_| None);

        let err = hub.process(sample_record(9)).await.unwrap_err();
        assert!(matches!(err.gate_error(), Some(GateError::Disconnected)));
        assert_eq!(err.fallback(), &sample_record(9));

        // Detached now: the next record passes through.
        assert_eq!(hub.process(sample_record(10)).await.unwrap(), sample_record(10));
        hub.close().await;
    }

    #[tokio::test]
    async fn test_text_reply_is_protocol_error() {
        let hub = TestHub::start().await;
        let mut filter = hub.attach_filter().await;

        let responder = tokio::spawn(async move {
            next_binary(&mut filter).await.expect("record");
            filter.send(Message::text("{\"round\":1}")).await.unwrap();
            filter
        });

        let err = hub.process(sample_record(1)).await.unwrap_err();
        let gate_error = err.gate_error().expect("gate error");
        assert!(gate_error.is_protocol_violation());
        assert!(matches!(gate_error, GateError::UnexpectedFrame("text")));
        drop(responder.await.unwrap());
        hub.close().await;
    }

    #[tokio::test]
    async fn test_second_filter_is_rejected() {
        let hub = TestHub::start().await;
        let _first = hub.attach_filter().await;
        assert_eq!(handshake_status(hub.ws_url("filter")).await, 409);
        hub.close().await;
    }

    #[tokio::test]
    async fn test_filter_can_reattach_after_leaving() {
        let hub = TestHub::start().await;
        let first = hub.attach_filter().await;
        drop(first);
        let gate = Arc::clone(hub.hub.gate());
        wait_until(move || !gate.is_attached()).await;

        let second = hub.attach_filter().await;
        spawn_filter(second, Some);
        assert_eq!(hub.process(sample_record(2)).await.unwrap(), sample_record(2));
        hub.close().await;
    }

    #[tokio::test]
    async fn test_init_waits_for_filter() {
        let hub = Arc::new(
            BlockDistributionHub::new(HubConfig {
                listen_addr: "127.0.0.1:0".into(),
                filter: FilterConfig {
                    wait_on_init: true,
                    ..FilterConfig::default()
                },
                ..HubConfig::default()
            })
            .unwrap(),
        );

        let init = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.init().await })
        };

        let addr = {
            let hub = Arc::clone(&hub);
            wait_until(|| hub.local_addr().is_some()).await;
            hub.local_addr().unwrap()
        };
        assert!(!init.is_finished());

        let (_filter, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/filter"))
            .await
            .unwrap();
        let bound = tokio::time::timeout(WAIT, init).await.unwrap().unwrap().unwrap();
        assert_eq!(bound, addr);
        hub.close().await.unwrap();
    }
}
