//! # Simulated remote peer.
//!
//! [`DummyRunner`] is an in-memory [`PeerRunner`] that plays the remote side of a
//! connection without any wire encoding or key handling.
//!
//! ## Behavior
//! ```text
//! connect(peer)      → open connection, queue the remote's `init`
//! send(type, fields) → normalize fields, queue the remote's answer (if any)
//! expect(type)       → first queued inbound message of `type`, once its delay elapsed
//! disconnect()       → drop connection and every queued inbound message
//! ```
//!
//! Simulated answers:
//! - `init` → `init` (only if the remote has not sent its own `init` yet)
//! - `ping` → `pong` with `num_pong_bytes` ignored bytes (none if `>= 65532`)
//! - `open_channel` → `accept_channel`
//! - `funding_created` → `funding_signed`
//! - `shutdown` → `shutdown`
//! - `closing_signed` → `closing_signed`

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::{self, Instant};
use tracing::{debug, trace};

use crate::error::PeerError;

use super::features::encode_features;
use super::peer::{Fields, PeerIdentity, PeerRunner};

/// Pongs are only sent for `num_pong_bytes` below this limit.
const MAX_PONG_BYTES: u64 = 65532;

/// `byteslen` is a u16 on the wire.
const MAX_PING_BYTES: u64 = u16::MAX as u64;

/// Settings of the simulated peer.
#[derive(Clone, Debug)]
pub struct DummyRunnerConfig {
    /// Feature bits reported for `features(global = true, ..)`.
    pub global_bits: BTreeSet<u32>,
    /// Feature bits reported for `features(global = false, ..)`.
    pub local_bits: BTreeSet<u32>,
    /// Delay before a simulated inbound message becomes available.
    pub response_delay: Duration,
    /// Message types the simulated peer refuses to send (sending them fails).
    pub rejected: HashSet<String>,
}

impl Default for DummyRunnerConfig {
    /// - no global bits, local bits `{1, 7}`
    /// - `response_delay = 0`
    /// - nothing rejected
    fn default() -> Self {
        Self {
            global_bits: BTreeSet::new(),
            local_bits: BTreeSet::from([1, 7]),
            response_delay: Duration::ZERO,
            rejected: HashSet::new(),
        }
    }
}

/// Queued inbound message.
struct Inbound {
    msg_type: String,
    fields: Fields,
    ready_at: Instant,
}

/// Live connection state.
struct Connection {
    peer: PeerIdentity,
    inbound: VecDeque<Inbound>,
    remote_init_sent: bool,
}

/// In-memory simulated peer.
pub struct DummyRunner {
    cfg: DummyRunnerConfig,
    running: bool,
    conn: Option<Connection>,
}

impl DummyRunner {
    /// Creates a stopped runner with the given settings.
    pub fn new(cfg: DummyRunnerConfig) -> Self {
        Self {
            cfg,
            running: false,
            conn: None,
        }
    }

    /// Sets the delay before simulated answers become available.
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.cfg.response_delay = delay;
        self
    }

    /// Makes sending `msg_type` fail.
    pub fn rejecting(mut self, msg_type: impl Into<String>) -> Self {
        self.cfg.rejected.insert(msg_type.into());
        self
    }

    fn ensure_running(&self) -> Result<(), PeerError> {
        if self.running {
            Ok(())
        } else {
            Err(PeerError::failed("runner not started"))
        }
    }

    fn remote_init(&self) -> Fields {
        let mut f = Fields::new();
        f.insert("globalfeatures".into(), json!(self.features(true, &[])));
        f.insert("features".into(), json!(self.features(false, &[])));
        f
    }

    fn queue(&mut self, msg_type: &str, fields: Fields) {
        let ready_at = Instant::now() + self.cfg.response_delay;
        if let Some(conn) = self.conn.as_mut() {
            trace!(peer = %conn.peer, msg_type, "queued simulated inbound message");
            conn.inbound.push_back(Inbound {
                msg_type: msg_type.to_string(),
                fields,
                ready_at,
            });
        }
    }

    /// Computes the simulated remote answer to an outbound message.
    fn answer(&self, msg_type: &str, sent: &Fields) -> Option<(&'static str, Fields)> {
        let channel_id = || {
            sent.get("channel_id")
                .or_else(|| sent.get("temporary_channel_id"))
                .cloned()
                .unwrap_or_else(|| json!(zero_hex(32)))
        };
        let mut f = Fields::new();
        match msg_type {
            "init" => {
                let conn = self.conn.as_ref()?;
                if conn.remote_init_sent {
                    return None;
                }
                Some(("init", self.remote_init()))
            }
            "ping" => {
                let n = sent.get("num_pong_bytes").and_then(Value::as_u64).unwrap_or(0);
                if n >= MAX_PONG_BYTES {
                    return None;
                }
                f.insert("ignored".into(), json!(zero_hex(n as usize)));
                Some(("pong", f))
            }
            "open_channel" => {
                f.insert("temporary_channel_id".into(), channel_id());
                Some(("accept_channel", f))
            }
            "funding_created" => {
                f.insert("channel_id".into(), channel_id());
                Some(("funding_signed", f))
            }
            "shutdown" => {
                f.insert("channel_id".into(), channel_id());
                Some(("shutdown", f))
            }
            "closing_signed" => {
                f.insert("channel_id".into(), channel_id());
                if let Some(fee) = sent.get("fee_satoshis") {
                    f.insert("fee_satoshis".into(), fee.clone());
                }
                Some(("closing_signed", f))
            }
            _ => None,
        }
    }
}

impl Default for DummyRunner {
    fn default() -> Self {
        Self::new(DummyRunnerConfig::default())
    }
}

/// Normalizes outbound fields the way the simulated transport would transmit them.
fn normalize(msg_type: &str, mut fields: Fields) -> Result<Fields, PeerError> {
    match msg_type {
        "init" => {
            fields.entry("globalfeatures").or_insert_with(|| json!(""));
            fields.entry("features").or_insert_with(|| json!(""));
        }
        "ping" => {
            let len = match fields.get("byteslen") {
                None => 0,
                Some(v) => v
                    .as_u64()
                    .filter(|n| *n <= MAX_PING_BYTES)
                    .ok_or_else(|| {
                        PeerError::failed(format!(
                            "ping byteslen must be an integer in 0..={MAX_PING_BYTES}, got {v}"
                        ))
                    })?,
            };
            fields
                .entry("ignored")
                .or_insert_with(|| json!(zero_hex(len as usize)));
        }
        _ => {}
    }
    Ok(fields)
}

fn zero_hex(bytes: usize) -> String {
    "00".repeat(bytes)
}

#[async_trait]
impl PeerRunner for DummyRunner {
    fn name(&self) -> &str {
        "dummy"
    }

    async fn start(&mut self) -> Result<(), PeerError> {
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), PeerError> {
        self.running = false;
        self.conn = None;
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), PeerError> {
        self.running = false;
        self.conn = None;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    async fn connect(&mut self, peer: &PeerIdentity) -> Result<(), PeerError> {
        self.ensure_running()?;
        if self.conn.as_ref().is_some_and(|c| &c.peer == peer) {
            return Ok(());
        }
        debug!(%peer, "simulated connect");
        self.conn = Some(Connection {
            peer: peer.clone(),
            inbound: VecDeque::new(),
            remote_init_sent: false,
        });
        let init = self.remote_init();
        self.queue("init", init);
        if let Some(conn) = self.conn.as_mut() {
            conn.remote_init_sent = true;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), PeerError> {
        if let Some(conn) = self.conn.take() {
            debug!(peer = %conn.peer, dropped = conn.inbound.len(), "simulated disconnect");
        }
        Ok(())
    }

    async fn send(&mut self, msg_type: &str, fields: Fields) -> Result<Fields, PeerError> {
        self.ensure_running()?;
        if self.conn.is_none() {
            return Err(PeerError::NotConnected);
        }
        if self.cfg.rejected.contains(msg_type) {
            return Err(PeerError::failed(format!("peer rejected {msg_type}")));
        }

        let sent = normalize(msg_type, fields)?;
        if let Some((reply, reply_fields)) = self.answer(msg_type, &sent) {
            self.queue(reply, reply_fields);
        }
        Ok(sent)
    }

    async fn expect(&mut self, msg_type: &str) -> Result<Fields, PeerError> {
        self.ensure_running()?;
        let Some(conn) = self.conn.as_mut() else {
            return Err(PeerError::NotConnected);
        };

        let Some(pos) = conn.inbound.iter().position(|m| m.msg_type == msg_type) else {
            // The simulated peer only speaks when spoken to: nothing else will arrive.
            return std::future::pending().await;
        };
        time::sleep_until(conn.inbound[pos].ready_at).await;
        let msg = conn
            .inbound
            .remove(pos)
            .ok_or_else(|| PeerError::failed("inbound queue changed while waiting"))?;
        Ok(msg.fields)
    }

    fn features(&self, global: bool, additional: &[u32]) -> String {
        let base = if global {
            &self.cfg.global_bits
        } else {
            &self.cfg.local_bits
        };
        encode_features(base.iter().copied().chain(additional.iter().copied()))
    }

    fn connected_peer(&self) -> Option<&PeerIdentity> {
        self.conn.as_ref().map(|c| &c.peer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn started() -> DummyRunner {
        let mut r = DummyRunner::default();
        r.start().await.unwrap();
        r
    }

    #[tokio::test]
    async fn test_connect_queues_remote_init() {
        let mut r = started().await;
        r.connect(&"03".into()).await.unwrap();

        let init = r.expect("init").await.unwrap();
        assert_eq!(init["features"], "82");
        assert_eq!(init["globalfeatures"], "");
        assert_eq!(r.connected_peer().map(PeerIdentity::as_str), Some("03"));
    }

    #[tokio::test]
    async fn test_ping_answered_with_pong() {
        let mut r = started().await;
        r.connect(&"03".into()).await.unwrap();

        let mut ping = Fields::new();
        ping.insert("num_pong_bytes".into(), json!(4));
        ping.insert("byteslen".into(), json!(2));
        let sent = r.send("ping", ping).await.unwrap();
        assert_eq!(sent["ignored"], "0000");

        let pong = r.expect("pong").await.unwrap();
        assert_eq!(pong["ignored"], "00000000");
    }

    #[tokio::test]
    async fn test_ping_byteslen_beyond_u16_is_rejected() {
        let mut r = started().await;
        r.connect(&"03".into()).await.unwrap();

        for bad in [json!(u64::MAX), json!(65536), json!(-1), json!("16")] {
            let mut ping = Fields::new();
            ping.insert("byteslen".into(), bad);
            assert!(matches!(
                r.send("ping", ping).await,
                Err(PeerError::Failed { .. })
            ));
        }

        let mut ping = Fields::new();
        ping.insert("byteslen".into(), json!(65535));
        let sent = r.send("ping", ping).await.unwrap();
        assert_eq!(sent["ignored"].as_str().map(str::len), Some(2 * 65535));
    }

    #[tokio::test]
    async fn test_init_not_answered_twice() {
        let mut r = started().await;
        r.connect(&"03".into()).await.unwrap();
        r.expect("init").await.unwrap();

        let sent = r.send("init", Fields::new()).await.unwrap();
        assert_eq!(sent["globalfeatures"], "");

        let waited = time::timeout(Duration::from_millis(20), r.expect("init")).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_reconnect_same_peer_is_noop() {
        let mut r = started().await;
        r.connect(&"03".into()).await.unwrap();
        r.connect(&"03".into()).await.unwrap();
        r.expect("init").await.unwrap();

        let waited = time::timeout(Duration::from_millis(20), r.expect("init")).await;
        assert!(waited.is_err(), "second connect must not queue another init");
    }

    #[tokio::test]
    async fn test_send_requires_connection_and_running() {
        let mut r = DummyRunner::default();
        assert!(r.send("ping", Fields::new()).await.is_err());

        r.start().await.unwrap();
        assert_eq!(
            r.send("ping", Fields::new()).await,
            Err(PeerError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_rejected_type_fails() {
        let mut r = DummyRunner::default().rejecting("shutdown");
        r.start().await.unwrap();
        r.connect(&"02".into()).await.unwrap();
        assert!(matches!(
            r.send("shutdown", Fields::new()).await,
            Err(PeerError::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn test_disconnect_drops_inbound() {
        let mut r = started().await;
        r.connect(&"03".into()).await.unwrap();
        r.disconnect().await.unwrap();
        assert!(r.connected_peer().is_none());
        assert_eq!(r.expect("init").await, Err(PeerError::NotConnected));
    }

    #[test]
    fn test_features_with_additional_bits() {
        let r = DummyRunner::default();
        assert_eq!(r.features(true, &[]), "");
        assert_eq!(r.features(true, &[99]), encode_features([99]));
        assert_eq!(r.features(false, &[9]), "0282");
    }
}
