//! Shared test infrastructure: a live hub plus WebSocket clients.

use block_hub::{BlockDistributionHub, BlockProcessor, ChannelKey, HubConfig};
use futures::{SinkExt, StreamExt};
use shared_types::{
    decode_record, encode_record, BlockRecord, DeltaAction, SignedTxn, SignedTxnWithAd,
    StateDelta, StateProofTrackingData, Transaction, TxLease, TxType, ValueDelta,
};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

// =============================================================================
// HUB
// =============================================================================

pub struct TestHub {
    pub hub: Arc<BlockDistributionHub>,
    pub addr: SocketAddr,
}

impl TestHub {
    pub async fn start() -> Self {
        Self::with_config(HubConfig::default()).await
    }

    pub async fn with_config(mut config: HubConfig) -> Self {
        config.listen_addr = "127.0.0.1:0".to_string();
        let hub = Arc::new(BlockDistributionHub::new(config).expect("valid config"));
        let addr = hub.init().await.expect("hub starts");
        Self { hub, addr }
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}/{}", self.addr, path)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path)
    }

    pub async fn connect(&self, path: &str) -> Client {
        let (client, _) = connect_async(self.ws_url(path))
            .await
            .unwrap_or_else(|e| panic!("connect to /{path}: {e}"));
        client
    }

    /// Connect and wait until the hub has registered the connection.
    pub async fn subscribe(&self, path: &str, key: ChannelKey) -> Client {
        let before = self.hub.registry().len(&key);
        let client = self.connect(path).await;
        let registry = Arc::clone(self.hub.registry());
        wait_until(move || registry.len(&key) > before).await;
        client
    }

    /// Connect to `/filter` and wait until the gate holds it.
    pub async fn attach_filter(&self) -> Client {
        let client = self.connect("filter").await;
        let gate = Arc::clone(self.hub.gate());
        wait_until(move || gate.is_attached()).await;
        client
    }

    pub async fn process(&self, record: BlockRecord) -> Result<BlockRecord, block_hub::ProcessError> {
        tokio::time::timeout(WAIT, self.hub.process(record))
            .await
            .expect("process did not hang")
    }

    pub async fn close(&self) {
        self.hub.close().await.expect("close");
    }
}

/// HTTP status of a WebSocket handshake against `path` (101 on success).
pub async fn handshake_status(url: String) -> u16 {
    match connect_async(url).await {
        Ok(_) => 101,
        Err(WsError::Http(response)) => response.status().as_u16(),
        Err(e) => panic!("unexpected handshake error: {e}"),
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// =============================================================================
// CLIENT HELPERS
// =============================================================================

/// Next binary payload, or `None` once the hub closed the connection.
pub async fn next_binary(client: &mut Client) -> Option<Vec<u8>> {
    tokio::time::timeout(WAIT, async {
        while let Some(message) = client.next().await {
            match message {
                Ok(Message::Binary(data)) => return Some(data.to_vec()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    })
    .await
    .expect("no frame in time")
}

/// Assert nothing but control frames arrive within `window`.
pub async fn expect_silence(client: &mut Client, window: Duration) {
    let result = tokio::time::timeout(window, async {
        while let Some(Ok(message)) = client.next().await {
            if let Message::Binary(_) | Message::Text(_) = message {
                return message;
            }
        }
        Message::Close(None)
    })
    .await;
    if let Ok(message @ (Message::Binary(_) | Message::Text(_))) = result {
        panic!("expected silence, got {message:?}");
    }
}

/// Answer every record with `respond(record)`; `None` hangs up.
pub fn spawn_filter(
    mut client: Client,
    respond: impl Fn(BlockRecord) -> Option<BlockRecord> + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(data) = next_binary(&mut client).await {
            let record = decode_record(&data).expect("hub sends decodable records");
            match respond(record) {
                Some(reply) => {
                    let bytes = encode_record(&reply).expect("encodable");
                    if client.send(Message::binary(bytes)).await.is_err() {
                        return;
                    }
                }
                None => {
                    let _ = client.close(None).await;
                    return;
                }
            }
        }
    })
}

// =============================================================================
// FIXTURES
// =============================================================================

pub fn app_call(app: u64, note: &str, logs: &[&str]) -> SignedTxnWithAd {
    let mut txn = SignedTxnWithAd {
        signed_txn: SignedTxn {
            txn: Transaction {
                tx_type: TxType::ApplicationCall,
                sender: [app as u8; 32],
                application_id: app,
                note: note.as_bytes().to_vec(),
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    };
    let mut state = StateDelta::new();
    state.insert(
        note.as_bytes().to_vec(),
        ValueDelta {
            action: DeltaAction::SetBytes,
            bytes: note.as_bytes().to_vec(),
            uint: 0,
        },
    );
    txn.apply_data.eval_delta.local_deltas = Some(BTreeMap::from([(1, state)]));
    txn.apply_data.eval_delta.logs = logs.iter().map(|l| l.as_bytes().to_vec()).collect();
    txn
}

/// A record exercising every substructure the hub strips.
///
/// Application 42 logs `a`, `b` (inner), `c`; application 7 logs `x`.
pub fn sample_record(round: u64) -> BlockRecord {
    let tracking = BTreeMap::from([(
        0,
        StateProofTrackingData {
            voters_commitment: vec![0xAB; 8],
            online_total_weight: 1_000,
            next_round: round + 256,
        },
    )]);

    let mut outer = app_call(42, "outer", &["a"]);
    outer
        .apply_data
        .eval_delta
        .inner_txns
        .push(app_call(42, "inner", &["b"]));

    let mut record = BlockRecord::default();
    record.header.round = round;
    record.header.state_proof_tracking = Some(tracking.clone());
    record.delta.header.state_proof_tracking = Some(tracking);
    record.delta.tx_leases = Some(BTreeMap::from([(
        TxLease {
            sender: [42; 32],
            lease: [1; 32],
        },
        round + 10,
    )]));
    record.payset = vec![outer, app_call(7, "seven", &["x"]), app_call(42, "last", &["c"])];
    record
}
