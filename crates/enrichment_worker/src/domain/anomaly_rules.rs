use crate::domain::RecordResult;
use common::domain::{AnomalyFinding, AnomalyKind, DomainError, Severity, TelemetryEvent};

/// Vibration limit; not configurable
pub const VIBRATION_HIGH_THRESHOLD: f64 = 4.0;

/// High temperatures above this escalate from warning to critical,
/// independently of the configured high-temperature threshold
pub const CRITICAL_TEMPERATURE: f64 = 90.0;

/// Evaluates anomaly rules against a decoded record
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait AnomalyDetector: Send + Sync {
    /// Findings in rule order; empty when nothing is violated
    fn evaluate(&self, event: &TelemetryEvent) -> RecordResult<Vec<AnomalyFinding>>;
}

/// Configurable outer thresholds for the rule engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyThresholds {
    pub temperature_high: f64,
    pub temperature_low: f64,
    pub humidity_high: f64,
}

impl Default for AnomalyThresholds {
    fn default() -> Self {
        Self {
            temperature_high: 85.0,
            temperature_low: 5.0,
            humidity_high: 90.0,
        }
    }
}

impl AnomalyThresholds {
    pub fn validate(&self) -> Result<(), DomainError> {
        for (name, value) in [
            ("temperature_high", self.temperature_high),
            ("temperature_low", self.temperature_low),
            ("humidity_high", self.humidity_high),
        ] {
            if !value.is_finite() {
                return Err(DomainError::InvalidConfiguration(format!(
                    "{} threshold must be a finite number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Fixed-table threshold rules
///
/// | field       | violation                 | severity                           |
/// |-------------|---------------------------|------------------------------------|
/// | temperature | `> temperature_high`      | critical above 90.0, else warning  |
/// | temperature | `< temperature_low`       | warning                            |
/// | humidity    | `> humidity_high`         | warning                            |
/// | vibration   | `> 4.0`                   | critical                           |
///
/// A rule whose field is absent is skipped. Rules are independent, so one
/// record can violate several of them.
#[derive(Debug, Clone, Default)]
pub struct ThresholdRuleEngine {
    thresholds: AnomalyThresholds,
}

impl ThresholdRuleEngine {
    pub fn new(thresholds: AnomalyThresholds) -> Self {
        Self { thresholds }
    }
}

impl AnomalyDetector for ThresholdRuleEngine {
    fn evaluate(&self, event: &TelemetryEvent) -> RecordResult<Vec<AnomalyFinding>> {
        let t = &self.thresholds;
        let mut findings = Vec::new();

        if let Some(temperature) = event.temperature() {
            if temperature > t.temperature_high {
                let severity = if temperature > CRITICAL_TEMPERATURE {
                    Severity::Critical
                } else {
                    Severity::Warning
                };
                findings.push(AnomalyFinding {
                    kind: AnomalyKind::HighTemperature,
                    value: temperature,
                    threshold: t.temperature_high,
                    severity,
                });
            }

            if temperature < t.temperature_low {
                findings.push(AnomalyFinding {
                    kind: AnomalyKind::LowTemperature,
                    value: temperature,
                    threshold: t.temperature_low,
                    severity: Severity::Warning,
                });
            }
        }

        if let Some(humidity) = event.humidity() {
            if humidity > t.humidity_high {
                findings.push(AnomalyFinding {
                    kind: AnomalyKind::HighHumidity,
                    value: humidity,
                    threshold: t.humidity_high,
                    severity: Severity::Warning,
                });
            }
        }

        if let Some(vibration) = event.vibration() {
            if vibration > VIBRATION_HIGH_THRESHOLD {
                findings.push(AnomalyFinding {
                    kind: AnomalyKind::HighVibration,
                    value: vibration,
                    threshold: VIBRATION_HIGH_THRESHOLD,
                    severity: Severity::Critical,
                });
            }
        }

        Ok(findings)
    }
}
