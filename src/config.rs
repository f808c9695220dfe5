//! Build-time node configuration.
//!
//! `NODE_ID` and `NODE_LOCATION` are read from the environment when the
//! firmware is compiled, e.g. `NODE_ID=kitchen_02 cargo build --features esp32c6`.

use thiserror::Error;

pub const DEFAULT_NODE_ID: &str = "node_01";
pub const DEFAULT_LOCATION: &str = "Living Room";
pub const DEFAULT_INTERVAL_MS: u32 = 30_000;
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Longest node id or location label, in bytes. Keeps every record inside
/// [`crate::protocol::RECORD_CAPACITY`] even when every byte needs escaping.
pub const MAX_LABEL_LEN: usize = 32;

/// How long the node task sleeps between two ticks.
pub const POLL_PERIOD_MS: u64 = 10;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("label must not be empty")]
    EmptyLabel,
    #[error("label longer than 32 bytes")]
    LabelTooLong,
    #[error("label contains a control character")]
    ControlCharacter,
    #[error("sampling interval must be non-zero")]
    ZeroInterval,
}

/// Identity and timing of one node. Fixed for the lifetime of the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeIdentity {
    pub node_id: &'static str,
    pub location: &'static str,
    pub interval_ms: u32,
    pub baud_rate: u32,
}

const fn check_label(label: &str) -> Result<(), ConfigError> {
    if label.is_empty() {
        return Err(ConfigError::EmptyLabel);
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(ConfigError::LabelTooLong);
    }
    let bytes = label.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] < 0x20 || bytes[i] == 0x7f {
            return Err(ConfigError::ControlCharacter);
        }
        i += 1;
    }
    Ok(())
}

impl NodeIdentity {
    /// Identity baked in at compile time.
    pub const BUILD: NodeIdentity = {
        let identity = NodeIdentity {
            node_id: match option_env!("NODE_ID") {
                Some(id) => id,
                None => DEFAULT_NODE_ID,
            },
            location: match option_env!("NODE_LOCATION") {
                Some(location) => location,
                None => DEFAULT_LOCATION,
            },
            interval_ms: DEFAULT_INTERVAL_MS,
            baud_rate: DEFAULT_BAUD_RATE,
        };
        assert!(
            identity.validate().is_ok(),
            "NODE_ID and NODE_LOCATION must be 1..=32 printable bytes"
        );
        identity
    };

    pub fn new(
        node_id: &'static str,
        location: &'static str,
        interval_ms: u32,
        baud_rate: u32,
    ) -> Result<Self, ConfigError> {
        let identity = NodeIdentity {
            node_id,
            location,
            interval_ms,
            baud_rate,
        };
        identity.validate()?;
        Ok(identity)
    }

    pub const fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = check_label(self.node_id) {
            return Err(e);
        }
        if let Err(e) = check_label(self.location) {
            return Err(e);
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_identity_is_valid() {
        let identity = NodeIdentity::BUILD;
        assert!(identity.validate().is_ok());
        assert_eq!(identity.interval_ms, DEFAULT_INTERVAL_MS);
        assert_eq!(identity.baud_rate, 115_200);
    }

    #[test]
    fn new_rejects_bad_labels() {
        assert_eq!(
            NodeIdentity::new("", "Lab", 1_000, 9_600),
            Err(ConfigError::EmptyLabel)
        );
        assert_eq!(
            NodeIdentity::new("n1", "a location label that is far too long", 1_000, 9_600),
            Err(ConfigError::LabelTooLong)
        );
        assert_eq!(
            NodeIdentity::new("n1", "Lab\n", 1_000, 9_600),
            Err(ConfigError::ControlCharacter)
        );
        assert_eq!(
            NodeIdentity::new("n1", "Lab", 0, 9_600),
            Err(ConfigError::ZeroInterval)
        );
    }

    #[test]
    fn new_accepts_limits() {
        let label = "abcdefghijklmnopqrstuvwxyz012345";
        assert_eq!(label.len(), MAX_LABEL_LEN);
        let identity = NodeIdentity::new(label, label, 1, 9_600).unwrap();
        assert_eq!(identity.node_id, label);
    }
}
