//! # Logging subscriber.
//!
//! [`LogWriter`] writes every event to `tracing` in a compact, human-readable form.
//!
//! ## Output format
//! ```text
//! INFO peervisor::subscribers::log: [connect] seq=seq_03_1700000000000 step=1 dir=out data={"connprivkey":"03"}
//! INFO peervisor::subscribers::log: [expect] seq=seq_03_1700000000000 step=2 dir=in data={"msgtype":"init",...}
//! WARN peervisor::subscribers::log: [error] seq=seq_03_1700000000000 step=2 data={"error":"...","kind":"timeout"}
//! INFO peervisor::subscribers::log: [sequence-complete] seq=seq_03_1700000000000 total_steps=7
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Logs every published event through `tracing`.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let seq = e.sequence_id.as_deref().unwrap_or("-");
        let step = e.step.unwrap_or(0);
        match e.kind {
            EventKind::Connect => {
                info!("[connect] seq={seq} step={step} dir={:?} data={}", e.direction, e.data);
            }
            EventKind::Disconnect => {
                info!("[disconnect] seq={seq} step={step}");
            }
            EventKind::Msg => {
                info!("[msg] seq={seq} step={step} dir={:?} data={}", e.direction, e.data);
            }
            EventKind::ExpectMsg => {
                info!("[expect] seq={seq} step={step} dir={:?} data={}", e.direction, e.data);
            }
            EventKind::Error => {
                warn!("[error] seq={seq} step={step} data={}", e.data);
            }
            EventKind::SequenceComplete => {
                info!(
                    "[sequence-complete] seq={seq} total_steps={}",
                    e.total_steps.unwrap_or(0)
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
