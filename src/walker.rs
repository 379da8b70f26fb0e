//! SNMP subtree walk against a single device.

use std::time::Duration;

use anyhow::{Result, anyhow};
use snmp2::{AsyncSession, Oid, Value};
use thiserror::Error;
use tokio::time::timeout;

use crate::config::{SnmpConfig, TargetConfig};

/// Errors from a subtree walk. No partial leaf sequence survives any of
/// these; a failed walk yields nothing.
#[derive(Debug, Error)]
pub enum WalkError {
    #[error("Cannot reach agent {address}: {reason}")]
    Unreachable { address: String, reason: String },

    #[error("Agent {address} timed out after {attempts} attempts")]
    Timeout { address: String, attempts: u32 },

    #[error("Walk of agent {address} failed: {reason}")]
    Protocol { address: String, reason: String },
}

/// One element of a walk response, in device-assigned order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawLeaf {
    /// 0-based position within the walked subtree.
    pub position: usize,
    pub value: LeafValue,
}

/// Wire value of a leaf, resolved once at the walker boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    Text(String),
    Bytes(Vec<u8>),
}

/// Parse an OID string (e.g., "1.3.6.1.4.1.5040.1.2.6.1.3.1.1") into an
/// snmp2::Oid.
pub fn parse_oid(oid_str: &str) -> Result<Oid<'static>> {
    oid_str
        .parse::<Oid>()
        .map_err(|e| anyhow!("Failed to parse OID '{}': {:?}", oid_str, e))
        .map(|oid| oid.to_owned())
}

/// Walker for one device's sensor value subtree.
///
/// SNMPv1 only: the W&T thermometers speak nothing newer, and v1 has no
/// GETBULK, so the walk is one GETNEXT round trip per leaf. The session's
/// UDP socket is owned by the `AsyncSession` value and closed when it drops,
/// on every exit path including cancellation of the scrape.
pub struct SnmpWalker {
    /// Agent address including port (e.g., "192.168.1.20:161").
    pub address: String,
    pub community: Vec<u8>,
    pub oid_root: String,
    /// Transport timeout per round-trip attempt.
    pub timeout: Duration,
    /// Attempts per round trip before the walk fails.
    pub retries: u32,
}

impl SnmpWalker {
    /// Create a walker for one resolved target.
    pub fn new(target: &TargetConfig, community: &str, snmp: &SnmpConfig) -> Self {
        Self {
            address: format!("{}:{}", target.address, snmp.port),
            community: community.as_bytes().to_vec(),
            oid_root: snmp.oid_root.clone(),
            timeout: Duration::from_secs(snmp.timeout_secs),
            retries: snmp.retries,
        }
    }

    /// Walk the configured subtree, preserving device response order.
    ///
    /// `on_retry` is invoked with the attempt number each time a round trip
    /// times out and another attempt remains; only exhaustion of the retry
    /// budget surfaces as an error.
    pub async fn walk(&self, on_retry: impl Fn(u32)) -> Result<Vec<RawLeaf>, WalkError> {
        let subtree = parse_oid(&self.oid_root).map_err(|e| WalkError::Protocol {
            address: self.address.clone(),
            reason: format!("{e:?}"),
        })?;

        let mut session = AsyncSession::new_v1(&self.address, &self.community, 0)
            .await
            .map_err(|e| WalkError::Unreachable {
                address: self.address.clone(),
                reason: format!("{e:?}"),
            })?;

        let mut leaves = Vec::new();
        let mut current_oid = subtree.clone();

        loop {
            let Some((resp_oid, value)) =
                self.getnext_with_retry(&mut session, &current_oid, &on_retry)
                    .await?
            else {
                break;
            };

            // Left the subtree: the walk is complete.
            if !resp_oid.starts_with(&subtree) {
                break;
            }

            leaves.push(RawLeaf {
                position: leaves.len(),
                value,
            });

            current_oid = resp_oid;
        }

        Ok(leaves)
    }

    /// One GETNEXT round trip, retried on timeout up to the budget.
    ///
    /// Returns `None` when the agent reports the end of its MIB view.
    async fn getnext_with_retry(
        &self,
        session: &mut AsyncSession,
        oid: &Oid<'_>,
        on_retry: &impl Fn(u32),
    ) -> Result<Option<(Oid<'static>, LeafValue)>, WalkError> {
        for attempt in 1..=self.retries {
            match timeout(self.timeout, session.getnext(oid)).await {
                Ok(Ok(response)) => {
                    let Some((resp_oid, value)) = response.varbinds.into_iter().next() else {
                        return Ok(None);
                    };

                    if matches!(value, Value::EndOfMibView) {
                        return Ok(None);
                    }

                    return Ok(Some((resp_oid.to_owned(), leaf_value(&value))));
                }
                Ok(Err(e)) => {
                    return Err(WalkError::Protocol {
                        address: self.address.clone(),
                        reason: format!("{e:?}"),
                    });
                }
                Err(_) => {
                    if attempt < self.retries {
                        on_retry(attempt);
                    }
                }
            }
        }

        Err(WalkError::Timeout {
            address: self.address.clone(),
            attempts: self.retries,
        })
    }
}

/// Convert an SNMP value into a leaf value.
///
/// The sensor table is string-typed; any other varbind type keeps its slot
/// in the walk order but carries no parseable text.
fn leaf_value(value: &Value) -> LeafValue {
    match value {
        Value::OctetString(s) => match String::from_utf8(s.to_vec()) {
            Ok(text)
                if text
                    .chars()
                    .all(|c| !c.is_control() || c == '\n' || c == '\t') =>
            {
                LeafValue::Text(text)
            }
            _ => LeafValue::Bytes(s.to_vec()),
        },
        _ => LeafValue::Text(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_parse_oid() {
        let oid = parse_oid("1.3.6.1.4.1.5040.1.2.6.1.3.1.1").unwrap();
        assert_eq!(oid.to_id_string(), "1.3.6.1.4.1.5040.1.2.6.1.3.1.1");
    }

    #[test]
    fn test_parse_oid_rejects_garbage() {
        assert!(parse_oid("not-an-oid").is_err());
        assert!(parse_oid("").is_err());
    }

    #[tokio::test]
    async fn test_silent_agent_exhausts_retries() {
        // A bound socket that never answers: every attempt times out.
        let agent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = agent.local_addr().unwrap().port();

        let walker = SnmpWalker {
            address: format!("127.0.0.1:{port}"),
            community: b"public".to_vec(),
            oid_root: "1.3.6.1.4.1.5040.1.2.6.1.3.1.1".to_string(),
            timeout: Duration::from_millis(50),
            retries: 3,
        };

        let retries_seen = AtomicU32::new(0);
        let err = walker
            .walk(|_| {
                retries_seen.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WalkError::Timeout { attempts: 3, .. }));
        // Retries between attempts, not after the last one.
        assert_eq!(retries_seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_leaf_value_text() {
        let value = Value::OctetString(b"21.5");
        assert_eq!(leaf_value(&value), LeafValue::Text("21.5".to_string()));
    }

    #[test]
    fn test_leaf_value_non_utf8_bytes() {
        let value = Value::OctetString(&[0xff, 0xfe, 0x00]);
        assert_eq!(
            leaf_value(&value),
            LeafValue::Bytes(vec![0xff, 0xfe, 0x00])
        );
    }

    #[test]
    fn test_leaf_value_non_string_keeps_slot() {
        let value = Value::Integer(42);
        assert_eq!(leaf_value(&value), LeafValue::Text(String::new()));
    }
}
