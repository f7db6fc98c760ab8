/*!
Fixture builders for the machine wire shape

Produces payloads exactly as the probe backend emits them, so tests exercise
the same decode path as production traffic.
*/

use serde_json::{json, Map, Value};

/// Starts a machine fixture. Attributes and probe results are optional,
/// like on the wire.
pub fn machine(name: &str) -> MachineFixture {
    MachineFixture {
        name: name.to_string(),
        attrs: Map::new(),
        results: Map::new(),
    }
}

#[derive(Debug, Clone)]
pub struct MachineFixture {
    name: String,
    attrs: Map<String, Value>,
    results: Map<String, Value>,
}

impl MachineFixture {
    pub fn uplink(mut self, value: &str) -> Self {
        self.attrs.insert("uplink".into(), json!(value));
        self
    }

    pub fn source_switch(mut self, value: &str) -> Self {
        self.attrs.insert("source_switch".into(), json!(value));
        self
    }

    pub fn column(mut self, value: &str) -> Self {
        self.attrs.insert("column".into(), json!(value));
        self
    }

    pub fn bay(mut self, value: &str) -> Self {
        self.attrs.insert("bay".into(), json!(value));
        self
    }

    pub fn section(mut self, value: &str) -> Self {
        self.attrs.insert("section".into(), json!(value));
        self
    }

    /// One probe result; `kind` is `ip`, `gateway` or `kiosk_pc`.
    pub fn probe(mut self, kind: &str, ip: &str, alive: bool, ping: Option<f64>, color: &str) -> Self {
        let mut result = Map::new();
        result.insert("ip".into(), json!(ip));
        result.insert("alive".into(), json!(alive));
        if let Some(ms) = ping {
            result.insert("ping".into(), json!(ms));
        }
        result.insert("color".into(), json!(color));
        self.results.insert(kind.to_string(), Value::Object(result));
        self
    }

    /// Shorthand for a healthy primary-IP probe.
    pub fn alive_ip(self, ip: &str, ping: f64) -> Self {
        self.probe("ip", ip, true, Some(ping), "green")
    }

    pub fn build(self) -> Value {
        let mut machine = Map::new();
        machine.insert("name".into(), json!(self.name));
        for (key, value) in self.attrs {
            machine.insert(key, value);
        }
        machine.insert("results".into(), Value::Object(self.results));
        Value::Object(machine)
    }
}

/// Full-status delivery as broadcast on the push channel.
pub fn network_status(machines: Vec<Value>, ts: i64) -> Value {
    json!({ "machines": machines, "ts": ts })
}

/// Envelope of `GET /api/machines`.
pub fn machines_envelope(machines: Vec<Value>) -> Value {
    json!({ "data": { "machines": machines } })
}

/// Millisecond timestamp for deliveries stamped "now", the unit the backend
/// uses for `ts`.
pub fn now_ms() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
