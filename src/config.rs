//! Marshaling limits.
//!
//! Both ends of a transport should use the same limits. They can be loaded
//! from JSON so the originator and the receiver share one file:
//!
//! ```
//! use txnwire::MarshalConfig;
//!
//! let config = MarshalConfig::from_json(r#"{"max_sg_fragments": 128}"#).unwrap();
//! assert_eq!(config.max_sg_fragments, 128);
//! assert_eq!(config.max_transaction_size, txnwire::protocol::DEFAULT_MAX_TRANSACTION_SIZE);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, TxnWireError};
use crate::protocol::{DEFAULT_MAX_SG_FRAGMENTS, DEFAULT_MAX_TRANSACTION_SIZE, HEADER_SIZE};

/// Limits applied by the serializer, unpacker, merge and stream framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarshalConfig {
    /// Upper bound on SG fragments before a list counts as unterminated.
    pub max_sg_fragments: usize,
    /// Upper bound on the serialized size of one transaction.
    pub max_transaction_size: usize,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            max_sg_fragments: DEFAULT_MAX_SG_FRAGMENTS,
            max_transaction_size: DEFAULT_MAX_TRANSACTION_SIZE,
        }
    }
}

impl MarshalConfig {
    /// Parse and validate a JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reject limits that would make every transaction invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_sg_fragments == 0 {
            return Err(TxnWireError::Protocol(
                "max_sg_fragments must be at least 1".to_string(),
            ));
        }
        if self.max_transaction_size < HEADER_SIZE {
            return Err(TxnWireError::Protocol(format!(
                "max_transaction_size must be at least the {}-byte header",
                HEADER_SIZE
            )));
        }
        Ok(())
    }
}
