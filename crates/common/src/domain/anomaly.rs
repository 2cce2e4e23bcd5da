use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

/// Which threshold rule produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    HighTemperature,
    LowTemperature,
    HighHumidity,
    HighVibration,
}

/// One threshold violation found on a telemetry record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyFinding {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
}

impl AnomalyFinding {
    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finding_wire_shape() {
        let finding = AnomalyFinding {
            kind: AnomalyKind::HighTemperature,
            value: 95.0,
            threshold: 85.0,
            severity: Severity::Critical,
        };

        assert_eq!(
            serde_json::to_value(&finding).unwrap(),
            json!({
                "type": "high_temperature",
                "value": 95.0,
                "threshold": 85.0,
                "severity": "critical"
            })
        );
        assert!(finding.is_critical());
    }
}
