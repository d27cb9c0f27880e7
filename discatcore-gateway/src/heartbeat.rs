//! The heartbeat task: sends `{"op": 1, "d": sequence}` on `heartbeat_interval`,
//! jittering only the first sleep so many shards starting at once don't all
//! heartbeat in lockstep.
//!
//! Grounded on `original_source/discatcore/gateway/client.py`'s
//! `HeartbeatHandler.loop` (`delta *= random.uniform(0.0, 1.0)` on the first
//! iteration only, full `heartbeat_interval` thereafter).

use crate::{session::Session, socket::CommandSender};
use discatcore_model::gateway::payload::Heartbeat;
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;

/// Spawns the heartbeat task. The returned handle is meant to be
/// [`abort`](JoinHandle::abort)ed by the owning connection on close; the
/// resulting [`JoinError`](tokio::task::JoinError) is expected and should be
/// swallowed rather than treated as a failure.
pub fn spawn(session: Arc<Session>, sender: CommandSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut first = true;

        loop {
            let interval = Duration::from_millis(session.heartbeat_interval_millis());
            let sleep_for = if first {
                first = false;
                interval.mul_f64(rand::random::<f64>())
            } else {
                interval
            };

            tokio::time::sleep(sleep_for).await;

            let heartbeat = Heartbeat::new(session.sequence());
            if crate::socket::send_payload(&sender, &heartbeat).is_err() {
                // The receiving end went away with the connection; the
                // receive loop will drive the reconnect. Nothing left for
                // this task to do but stop.
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::spawn;
    use crate::{session::Session, socket};
    use std::{sync::Arc, time::Duration};
    use tokio_tungstenite::tungstenite::Message;

    #[tokio::test(start_paused = true)]
    async fn sends_a_heartbeat_after_the_jittered_first_interval() {
        let session = Arc::new(Session::new());
        session.set_heartbeat_interval_millis(1_000);
        session.set_sequence(42);

        let (sender, mut receiver) = socket::channel();
        let handle = spawn(session, sender);

        tokio::time::advance(Duration::from_secs(2)).await;

        let sent = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("a heartbeat should have been sent")
            .unwrap();

        let Message::Text(text) = sent else {
            panic!("expected a text frame");
        };
        assert!(text.contains("\"op\":1"));
        assert!(text.contains("42"));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stops_once_the_receiver_is_dropped() {
        let session = Arc::new(Session::new());
        session.set_heartbeat_interval_millis(1_000);

        let (sender, receiver) = socket::channel();
        drop(receiver);
        let handle = spawn(session, sender);

        tokio::time::advance(Duration::from_secs(2)).await;
        handle.await.unwrap();
    }
}
