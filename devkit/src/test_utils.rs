/*!
Test harness for board views

Makes view tests short to write:
- automatic push-channel stub setup
- one-call status deliveries built from fixtures
- assertions over the traffic a view produced
*/

use crate::fixtures::network_status;
use crate::push_stub::MockPushClient;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Full harness: a stubbed push channel plus expectation bookkeeping.
pub struct TestHarness {
    pub push_client: MockPushClient,
    expectations: Vec<Expectation>,
}

#[derive(Debug)]
struct Expectation {
    topic: String,
    expected_count: usize,
}

impl TestHarness {
    pub fn new() -> Self {
        env_logger::try_init().ok();
        Self {
            push_client: MockPushClient::new(),
            expectations: Vec::new(),
        }
    }

    /// Expect exactly N messages published on a topic by the end of the test.
    pub fn expect_messages(&mut self, topic: &str, count: usize) -> &mut Self {
        self.expectations.push(Expectation {
            topic: topic.to_string(),
            expected_count: count,
        });
        self
    }

    /// Simulates one full-status delivery built from machine fixtures.
    pub async fn send_status(&self, machines: Vec<Value>, ts: i64) -> Result<()> {
        let payload = network_status(machines, ts);
        self.push_client
            .simulate_incoming("network-status", serde_json::to_vec(&payload)?)
            .await?;
        log::info!("sent status delivery with ts {}", ts);
        Ok(())
    }

    /// Same as send_status, stamped with the current time.
    pub async fn send_status_now(&self, machines: Vec<Value>) -> Result<()> {
        self.send_status(machines, crate::fixtures::now_ms()).await
    }

    /// Polls until a message shows up on a topic or the timeout elapses.
    pub async fn wait_for_message(&self, topic: &str, timeout_ms: u64) -> Result<Option<Value>> {
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(timeout_ms) {
            if let Some(msg) = self.push_client.get_last_json_message::<Value>(topic)? {
                return Ok(Some(msg));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        log::warn!("timeout waiting for message on {}", topic);
        Ok(None)
    }

    /// Checks every registered expectation against the recorded traffic.
    pub fn verify_expectations(&self) -> Result<()> {
        for expectation in &self.expectations {
            let actual = self.push_client.find_messages_by_topic(&expectation.topic).len();
            if actual != expectation.expected_count {
                anyhow::bail!(
                    "expectation failed for topic '{}': expected {} messages, got {}",
                    expectation.topic,
                    expectation.expected_count,
                    actual
                );
            }
        }
        Ok(())
    }

    /// Asserts that a specific payload was published on a topic.
    pub fn assert_message_sent(&self, topic: &str, expected_payload: &Value) -> Result<()> {
        for msg in self.push_client.find_messages_by_topic(topic) {
            let payload: Value = serde_json::from_slice(&msg.payload)?;
            if payload == *expected_payload {
                return Ok(());
            }
        }
        anyhow::bail!("expected message not found on topic: {}", topic);
    }

    /// Stats over the collected traffic.
    pub fn get_stats(&self) -> TestStats {
        let messages = self.push_client.get_published_messages();
        let mut topic_counts = HashMap::new();
        for msg in &messages {
            *topic_counts.entry(msg.topic.clone()).or_insert(0) += 1;
        }
        TestStats {
            total_messages: messages.len(),
            topic_counts,
            subscriptions: self.push_client.get_subscriptions(),
        }
    }

    /// Resets the harness for the next test.
    pub fn reset(&mut self) {
        self.push_client.clear();
        self.expectations.clear();
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct TestStats {
    pub total_messages: usize,
    pub topic_counts: HashMap<String, usize>,
    pub subscriptions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::machine;
    use rumqttc::QoS;

    #[tokio::test]
    async fn harness_tracks_expectations() {
        let mut harness = TestHarness::new();
        harness.expect_messages("board/ack", 1);

        let payload = serde_json::json!({ "ok": true });
        harness
            .push_client
            .publish("board/ack", QoS::AtLeastOnce, false, serde_json::to_vec(&payload).unwrap())
            .await
            .unwrap();

        harness.verify_expectations().unwrap();
        harness.assert_message_sent("board/ack", &payload).unwrap();
        assert_eq!(harness.get_stats().total_messages, 1);
    }

    #[tokio::test]
    async fn send_status_reaches_a_receiver() {
        let harness = TestHarness::new();
        let mut receiver = harness.push_client.setup_receiver();

        harness
            .send_status(vec![machine("A1").alive_ip("10.0.0.1", 4.0).build()], 42)
            .await
            .unwrap();

        let delivered = receiver.recv().await.unwrap();
        let value: Value = serde_json::from_slice(&delivered.payload).unwrap();
        assert_eq!(value["ts"], 42);
    }

    #[tokio::test]
    async fn reset_clears_traffic_and_expectations() {
        let mut harness = TestHarness::new();
        harness.expect_messages("board/ack", 5);
        harness
            .push_client
            .publish("board/ack", QoS::AtLeastOnce, false, b"x".to_vec())
            .await
            .unwrap();

        harness.reset();
        assert_eq!(harness.get_stats().total_messages, 0);
        harness.verify_expectations().unwrap();
    }
}
