use crate::error::{Error, Result};
use crate::node::MAX_BITOFF;

/// Configuration for a [`PatriciaTree`](crate::PatriciaTree).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Run [`PatriciaTree::check`](crate::PatriciaTree::check) after every
    /// insert and remove.
    pub self_check: bool,
    /// Longest key, in bits. Inserts that would branch at or past this bit,
    /// or masks longer than it, are refused.
    pub max_key_bits: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            self_check: false,
            max_key_bits: MAX_BITOFF,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.max_key_bits == 0 {
            return Err(Error::InvalidConfig("max_key_bits must be non-zero".into()));
        }
        if self.max_key_bits > MAX_BITOFF {
            return Err(Error::InvalidConfig(format!(
                "max_key_bits {} exceeds the {} bits a branch offset can hold",
                self.max_key_bits, MAX_BITOFF
            )));
        }
        Ok(())
    }
}
