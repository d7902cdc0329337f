//! Wire format of the live telemetry stream.
//!
//! Every published snapshot becomes one JSON object written without a
//! delimiter; readers treat the socket as a stream of concatenated JSON values.

use serde::{Deserialize, Serialize};

use crate::analysis::Levels;

/// One telemetry message
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    /// Unix time (seconds) of the segment
    pub ts: u64,
    pub values: TelemetryValues,
}

/// Levels in dB, rounded to one decimal place
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryValues {
    #[serde(rename = "LAeq")]
    pub laeq: f64,
    #[serde(rename = "LAFmin")]
    pub lafmin: f64,
    #[serde(rename = "LAE")]
    pub lae: f64,
    #[serde(rename = "LAFmax")]
    pub lafmax: f64,
    #[serde(rename = "LApeak")]
    pub lapeak: f64,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl From<&Levels> for TelemetryMessage {
    fn from(levels: &Levels) -> Self {
        Self {
            ts: levels.timestamp,
            values: TelemetryValues {
                laeq: round1(levels.laeq),
                lafmin: round1(levels.lafmin),
                lae: round1(levels.lae),
                lafmax: round1(levels.lafmax),
                lapeak: round1(levels.lapeak),
            },
        }
    }
}

impl TelemetryMessage {
    /// Serialized bytes as written to each client
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_layout() {
        let levels = Levels {
            segment: 12,
            timestamp: 1_700_000_123,
            laeq: 55.04,
            lafmin: 40.96,
            lae: 50.0,
            lafmax: 61.25,
            lapeak: -6.0206,
        };
        let message = TelemetryMessage::from(&levels);
        let value: serde_json::Value =
            serde_json::from_slice(&message.to_bytes().unwrap()).unwrap();

        assert_eq!(value["ts"], 1_700_000_123u64);
        assert_eq!(value["values"]["LAeq"], 55.0);
        assert_eq!(value["values"]["LAFmin"], 41.0);
        assert_eq!(value["values"]["LAFmax"], 61.3);
        assert_eq!(value["values"]["LApeak"], -6.0);
        assert!(value.get("segment").is_none());
    }

    #[test]
    fn test_no_trailing_delimiter() {
        let levels = Levels {
            segment: 0,
            timestamp: 1,
            laeq: 1.0,
            lafmin: 1.0,
            lae: 1.0,
            lafmax: 1.0,
            lapeak: 1.0,
        };
        let bytes = TelemetryMessage::from(&levels).to_bytes().unwrap();
        assert_eq!(bytes.last(), Some(&b'}'));
    }
}
