use crate::models::HealthClass;

/// Latency at or below this is Healthy.
pub const HEALTHY_MAX_MS: f64 = 10.0;
/// Latency above HEALTHY_MAX_MS and at or below this is Warning.
pub const WARNING_MAX_MS: f64 = 100.0;

/// Maps one probe outcome to its health class.
///
/// The three latency bands partition all non-negative values with no gap or
/// overlap: exactly 10 ms is still Healthy, exactly 100 ms is still Warning.
/// Anything that cannot be classified (dead target, missing or NaN latency)
/// is Offline.
pub fn classify(alive: bool, ping: Option<f64>) -> HealthClass {
    if !alive {
        return HealthClass::Offline;
    }
    let Some(ms) = ping else {
        return HealthClass::Offline;
    };
    if ms <= HEALTHY_MAX_MS {
        HealthClass::Healthy
    } else if ms <= WARNING_MAX_MS {
        HealthClass::Warning
    } else {
        HealthClass::Offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries_are_exact() {
        assert_eq!(classify(true, Some(10.0)), HealthClass::Healthy);
        assert_eq!(classify(true, Some(10.0001)), HealthClass::Warning);
        assert_eq!(classify(true, Some(100.0)), HealthClass::Warning);
        assert_eq!(classify(true, Some(100.0001)), HealthClass::Offline);
    }

    #[test]
    fn dead_target_is_offline_regardless_of_latency() {
        assert_eq!(classify(false, Some(1.0)), HealthClass::Offline);
        assert_eq!(classify(false, None), HealthClass::Offline);
    }

    #[test]
    fn missing_or_malformed_latency_is_offline() {
        assert_eq!(classify(true, None), HealthClass::Offline);
        assert_eq!(classify(true, Some(f64::NAN)), HealthClass::Offline);
    }

    #[test]
    fn zero_latency_is_healthy() {
        assert_eq!(classify(true, Some(0.0)), HealthClass::Healthy);
    }
}
