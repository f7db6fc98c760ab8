/*!
# Fleetboard DevKit - Stubs and fixtures for board development

Library for developing and testing against the probe backend's interfaces
without running one:
- Push-channel stub recording traffic and simulating deliveries
- Fixture builders for machines and wire payloads
- Test harness wiring both together
*/

pub mod fixtures;
pub mod push_stub;
pub mod test_utils;

pub use fixtures::{machine, machines_envelope, network_status};
pub use push_stub::MockPushClient;
pub use test_utils::TestHarness;
