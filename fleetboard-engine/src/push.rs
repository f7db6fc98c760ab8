use log::{debug, info, warn};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tokio::task::JoinHandle;

use crate::config::MqttConf;
use crate::models::StatusPush;
use crate::store::StatusStore;

/// Decode failures at the push boundary. A bad delivery is dropped and the
/// previous canonical state stays in place.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("push JSON invalid: {0}")]
    Decode(#[from] serde_json::Error),
}

pub fn decode_push(payload: &[u8]) -> Result<StatusPush, PushError> {
    let text = String::from_utf8(payload.to_vec())?;
    Ok(serde_json::from_str::<StatusPush>(&text)?)
}

/// Live subscription of one view to the backend's status topic. Dropping
/// the handle aborts the listener task, so navigating away from a view
/// releases its channel without any ambient connection left behind.
pub struct PushSubscription {
    topic: String,
    task: JoinHandle<()>,
}

impl PushSubscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Subscribes a store to the push channel. Every delivery is a
/// full-replacement candidate; the store decides whether it is a no-op.
/// Transport errors back off for 2s and retry, state stays last-known-good.
pub fn subscribe_status(cfg: &MqttConf, client_id: &str, store: StatusStore) -> PushSubscription {
    let topic = cfg.topic.clone();
    let host = cfg.host.clone();
    let port = cfg.port;
    let client_id = client_id.to_string();

    let task_topic = topic.clone();
    let task = tokio::spawn(async move {
        let mut opts = MqttOptions::new(&client_id, &host, port);
        opts.set_keep_alive(std::time::Duration::from_secs(15));
        let (client, mut eventloop) = AsyncClient::new(opts, 10);
        if let Err(e) = client.subscribe(&task_topic, QoS::AtLeastOnce).await {
            warn!("[push] subscribe to {task_topic} failed: {e:?}");
            return;
        }
        info!("[push] {client_id} subscribed to {task_topic}");

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(p))) if p.topic == task_topic => {
                    match decode_push(&p.payload) {
                        Ok(push) => {
                            if store.apply_push(push) {
                                debug!("[push] {client_id} accepted delivery");
                            } else {
                                debug!("[push] {client_id} suppressed identical delivery");
                            }
                        }
                        Err(e) => warn!("[push] {client_id} dropped bad payload: {e}"),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("[push] {client_id} MQTT error: {e:?}");
                    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                }
            }
        }
    });

    PushSubscription { topic, task }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_accepts_the_wire_shape() {
        let payload = br#"{
            "machines": [
                { "name": "A1", "results": { "ip": { "ip": "10.0.0.1", "alive": true, "ping": 4.0, "color": "green" } } }
            ],
            "ts": 1700000000000
        }"#;
        let push = decode_push(payload).unwrap();
        assert_eq!(push.machines.len(), 1);
        assert_eq!(push.ts, 1_700_000_000_000);
    }

    #[test]
    fn decode_rejects_malformed_payloads() {
        assert!(matches!(decode_push(b"not json"), Err(PushError::Decode(_))));
        assert!(matches!(decode_push(&[0xff, 0xfe]), Err(PushError::Utf8(_))));
        // shape mismatch is a decode error too, not a partial apply
        assert!(decode_push(br#"{"machines": 3, "ts": 1}"#).is_err());
    }

    #[test]
    fn decode_accepts_devkit_fixtures() {
        use fleetboard_devkit::{machine, network_status};

        let payload = network_status(
            vec![machine("A1").section("B").alive_ip("10.0.0.1", 4.0).build()],
            1_000,
        );
        let push = decode_push(payload.to_string().as_bytes()).unwrap();
        assert_eq!(push.machines[0].name, "A1");
        assert_eq!(push.machines[0].section.as_deref(), Some("B"));
    }

    #[test]
    fn replayed_wire_payload_is_idempotent() {
        use fleetboard_devkit::{machine, network_status};

        let store = StatusStore::new();
        let fleet = vec![machine("A1").alive_ip("10.0.0.1", 4.0).build()];

        let first = network_status(fleet.clone(), 1_000);
        assert!(store.apply_push(decode_push(first.to_string().as_bytes()).unwrap()));
        let stamp = store.last_updated();

        // identical content with a fresh backend timestamp: no-op end to end
        let replay = network_status(fleet, 2_000);
        assert!(!store.apply_push(decode_push(replay.to_string().as_bytes()).unwrap()));
        assert_eq!(store.last_updated(), stamp);
    }

    #[tokio::test]
    async fn dropped_subscription_aborts_the_listener() {
        let cfg = MqttConf { host: "localhost".into(), port: 1883, topic: "network-status".into() };
        let sub = subscribe_status(&cfg, "fleetboard-test", StatusStore::new());
        assert_eq!(sub.topic(), "network-status");
        // dropping must not hang even though no broker is reachable
        drop(sub);
    }
}
