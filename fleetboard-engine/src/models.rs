use serde::{Deserialize, Serialize};

use crate::classify::classify;

/// Tri-state reachability classification. On the wire the backend speaks in
/// dot colors (`green` / `orange` / `red`), so the serde names keep that
/// contract intact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthClass {
    #[serde(rename = "green")]
    Healthy,
    #[serde(rename = "orange")]
    Warning,
    #[serde(rename = "red")]
    Offline,
}

/// One of the three addresses probed per machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Ip,
    Gateway,
    KioskPc,
}

impl TargetKind {
    pub const ALL: [TargetKind; 3] = [TargetKind::Ip, TargetKind::Gateway, TargetKind::KioskPc];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Ip => "ip",
            TargetKind::Gateway => "gateway",
            TargetKind::KioskPc => "kiosk_pc",
        }
    }
}

/// Outcome of one reachability check. Replaced wholesale on every delivery,
/// never patched in place. `ping` is only present when the target answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub ip: String,
    pub alive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<HealthClass>,
}

impl ProbeResult {
    /// Backend-computed class, falling back to local classification for
    /// payloads that omit `color`.
    pub fn health(&self) -> HealthClass {
        self.color.unwrap_or_else(|| classify(self.alive, self.ping))
    }

    /// Presentation summary: `10.0.0.1 (4 ms)` when alive, `DOWN` otherwise.
    pub fn summary(&self) -> String {
        if self.alive {
            match self.ping {
                Some(ms) => format!("{} ({} ms)", self.ip, ms),
                None => format!("{} (no ping)", self.ip),
            }
        } else {
            "DOWN".to_string()
        }
    }
}

/// Probe results keyed by target kind. An absent entry means "no data yet",
/// which is distinct from "checked and unreachable".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<ProbeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<ProbeResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kiosk_pc: Option<ProbeResult>,
}

impl ProbeResults {
    pub fn get(&self, kind: TargetKind) -> Option<&ProbeResult> {
        match kind {
            TargetKind::Ip => self.ip.as_ref(),
            TargetKind::Gateway => self.gateway.as_ref(),
            TargetKind::KioskPc => self.kiosk_pc.as_ref(),
        }
    }
}

/// One machine of the fleet. Identity key is the name, compared
/// case-insensitively. Inventory attributes are opaque strings maintained
/// elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uplink: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_switch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bay: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default)]
    pub results: ProbeResults,
}

impl Machine {
    pub fn probe(&self, kind: TargetKind) -> Option<&ProbeResult> {
        self.results.get(kind)
    }

    /// Address of a probe target, when the backend reported one.
    pub fn probe_ip(&self, kind: TargetKind) -> Option<&str> {
        self.probe(kind).map(|r| r.ip.as_str())
    }

    /// Roll-up for the sections view: class of the first probe target with
    /// data, Offline when nothing has been checked yet.
    pub fn overall_health(&self) -> HealthClass {
        TargetKind::ALL
            .iter()
            .find_map(|kind| self.probe(*kind).map(|r| r.health()))
            .unwrap_or(HealthClass::Offline)
    }
}

/// Full-replacement delivery on the push channel. `ts` is unix epoch
/// milliseconds stamped by the backend's own polling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPush {
    pub machines: Vec<Machine>,
    pub ts: i64,
}

/// Envelope of the bulk endpoint: `GET /api/machines`.
#[derive(Debug, Deserialize)]
pub struct MachinesEnvelope {
    pub data: MachinesData,
}

#[derive(Debug, Deserialize)]
pub struct MachinesData {
    pub machines: Vec<Machine>,
}
