//! Per-request metric collection and exposition rendering.

use std::fmt::Write;

use crate::config::{SnmpConfig, TargetConfig};
use crate::reading::parse_reading;
use crate::walker::{RawLeaf, SnmpWalker, WalkError};

/// Static shape of an exposed metric.
#[derive(Debug, Clone, Copy)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

/// The one metric this exporter serves.
pub const TEMPERATURE_DESC: MetricDesc = MetricDesc {
    name: "wut_temperature",
    help: "Temperature reading from WUT sensor",
    labels: &["room", "sensor"],
};

/// One gauge sample produced by a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Lowercased room name.
    pub room: String,
    /// 1-based decimal of the sensor's walk position.
    pub sensor: String,
    pub value: f32,
}

impl Sample {
    fn label_values(&self) -> [&str; 2] {
        [&self.room, &self.sensor]
    }
}

/// Pull-based collector contract: describe the metric shape, and on demand
/// produce the samples for one target. Instances are request-scoped and
/// stateless across invocations.
#[allow(async_fn_in_trait)]
pub trait Collector {
    fn describe(&self) -> &'static MetricDesc;

    /// Run the collection pipeline. A failure anywhere upstream
    /// short-circuits; an `Err` never carries partial samples.
    async fn collect(&self) -> Result<Vec<Sample>, WalkError>;
}

/// Collector for one resolved target, built fresh per scrape.
pub struct TemperatureCollector {
    room: String,
    walker: SnmpWalker,
}

impl TemperatureCollector {
    pub fn new(target: &TargetConfig, community: &str, snmp: &SnmpConfig) -> Self {
        Self {
            room: target.room.clone(),
            walker: SnmpWalker::new(target, community, snmp),
        }
    }
}

impl Collector for TemperatureCollector {
    fn describe(&self) -> &'static MetricDesc {
        &TEMPERATURE_DESC
    }

    async fn collect(&self) -> Result<Vec<Sample>, WalkError> {
        let address = self.walker.address.clone();
        let room = self.room.clone();

        let leaves = self
            .walker
            .walk(|attempt| {
                tracing::warn!(address = %address, room = %room, attempt, "SNMP retry");
            })
            .await?;

        Ok(samples_from_leaves(&self.room, &leaves))
    }
}

/// Turn walked leaves into samples.
///
/// The sensor index is the leaf's original walk position (1-based), not its
/// position among the parseable values: a skipped leaf still consumes its
/// slot, so sensors keep their physical identity across polls.
pub fn samples_from_leaves(room: &str, leaves: &[RawLeaf]) -> Vec<Sample> {
    leaves
        .iter()
        .filter_map(|leaf| {
            parse_reading(leaf).map(|value| Sample {
                room: room.to_lowercase(),
                sensor: (leaf.position + 1).to_string(),
                value,
            })
        })
        .collect()
}

/// Request-scoped registry of collectors.
///
/// Never shared between scrapes: each request builds its own, gathers once,
/// and drops it with the response.
pub struct Registry<C> {
    collectors: Vec<C>,
}

impl<C: Collector> Registry<C> {
    pub fn new() -> Self {
        Self {
            collectors: Vec::new(),
        }
    }

    pub fn register(&mut self, collector: C) {
        self.collectors.push(collector);
    }

    /// Collect every registered collector and render the Prometheus text
    /// exposition. The first failing collector aborts the gather.
    pub async fn gather(&self) -> Result<String, WalkError> {
        let mut output = String::new();

        for collector in &self.collectors {
            let desc = collector.describe();
            let samples = collector.collect().await?;

            // A healthy walk with no connected probes renders an empty body.
            if samples.is_empty() {
                continue;
            }

            writeln!(output, "# HELP {} {}", desc.name, desc.help).ok();
            writeln!(output, "# TYPE {} gauge", desc.name).ok();

            for sample in &samples {
                let labels: Vec<String> = desc
                    .labels
                    .iter()
                    .zip(sample.label_values())
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
                    .collect();

                writeln!(
                    output,
                    "{}{{{}}} {}",
                    desc.name,
                    labels.join(","),
                    format_value(sample.value)
                )
                .ok();
            }
        }

        Ok(output)
    }
}

impl<C: Collector> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f32) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::LeafValue;

    fn leaves(values: &[&str]) -> Vec<RawLeaf> {
        values
            .iter()
            .enumerate()
            .map(|(position, v)| RawLeaf {
                position,
                value: LeafValue::Text(v.to_string()),
            })
            .collect()
    }

    #[test]
    fn test_skipped_leaf_keeps_its_slot() {
        let samples = samples_from_leaves("Server Room", &leaves(&["21.5", "--", "19,8"]));

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].sensor, "1");
        assert_eq!(samples[0].value, 21.5);
        assert_eq!(samples[1].sensor, "3");
        assert_eq!(samples[1].value, 19.8);
        assert!(!samples.iter().any(|s| s.sensor == "2"));
    }

    #[test]
    fn test_room_is_lowercased() {
        let samples = samples_from_leaves("Server Room", &leaves(&["20"]));
        assert_eq!(samples[0].room, "server room");
    }

    #[test]
    fn test_all_leaves_unparseable() {
        let samples = samples_from_leaves("lab", &leaves(&["--", "bad", ""]));
        assert!(samples.is_empty());
    }

    struct StubCollector {
        samples: Vec<Sample>,
        fail: bool,
    }

    impl Collector for StubCollector {
        fn describe(&self) -> &'static MetricDesc {
            &TEMPERATURE_DESC
        }

        async fn collect(&self) -> Result<Vec<Sample>, WalkError> {
            if self.fail {
                return Err(WalkError::Timeout {
                    address: "10.0.0.5:161".to_string(),
                    attempts: 3,
                });
            }
            Ok(self.samples.clone())
        }
    }

    #[tokio::test]
    async fn test_gather_renders_exposition() {
        let mut registry = Registry::new();
        registry.register(StubCollector {
            samples: vec![
                Sample {
                    room: "lab".to_string(),
                    sensor: "1".to_string(),
                    value: 21.5,
                },
                Sample {
                    room: "lab".to_string(),
                    sensor: "3".to_string(),
                    value: -4.0,
                },
            ],
            fail: false,
        });

        let body = registry.gather().await.unwrap();

        assert!(body.contains("# HELP wut_temperature Temperature reading from WUT sensor"));
        assert!(body.contains("# TYPE wut_temperature gauge"));
        assert!(body.contains("wut_temperature{room=\"lab\",sensor=\"1\"} 21.5"));
        assert!(body.contains("wut_temperature{room=\"lab\",sensor=\"3\"} -4"));
    }

    #[tokio::test]
    async fn test_gather_empty_walk_renders_empty_body() {
        let mut registry = Registry::new();
        registry.register(StubCollector {
            samples: vec![],
            fail: false,
        });

        assert_eq!(registry.gather().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_gather_short_circuits_on_failure() {
        let mut registry = Registry::new();
        registry.register(StubCollector {
            samples: vec![],
            fail: true,
        });

        let err = registry.gather().await.unwrap_err();
        assert!(matches!(err, WalkError::Timeout { .. }));
    }

    #[test]
    fn test_escape_label_value() {
        assert_eq!(escape_label_value("simple"), "simple");
        assert_eq!(escape_label_value("with\"quote"), "with\\\"quote");
        assert_eq!(escape_label_value("with\\backslash"), "with\\\\backslash");
        assert_eq!(escape_label_value("with\nnewline"), "with\\nnewline");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(3.5), "3.5");
        assert_eq!(format_value(f32::NAN), "NaN");
        assert_eq!(format_value(f32::INFINITY), "+Inf");
    }
}
