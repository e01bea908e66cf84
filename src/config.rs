// Runtime tunables: the operand/call stack ceilings, the garbage
// collector's allocation threshold, and the instruction budget a running
// program is allowed before the VM gives up. Grounded on the teacher's own
// `serde::Deserialize`-derived config tree (declare the shape, derive the
// parser, fall back to sane defaults for anything a TOML file omits)
// rather than the dashboard-specific `Screen`/`Gauge`/`Style` shapes that
// tree actually held.

use serde::{Deserialize, Serialize};

use crate::vm::VmLimits;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub max_operand_depth: usize,
    pub max_call_depth: usize,
    pub gc_threshold: usize,
    pub max_instructions: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        let limits = VmLimits::default();
        RunConfig {
            max_operand_depth: limits.max_operand_depth,
            max_call_depth: limits.max_call_depth,
            gc_threshold: limits.gc_threshold,
            max_instructions: limits.max_instructions,
        }
    }
}

impl RunConfig {
    pub fn to_limits(self) -> VmLimits {
        VmLimits {
            max_operand_depth: self.max_operand_depth,
            max_call_depth: self.max_call_depth,
            gc_threshold: self.gc_threshold,
            max_instructions: self.max_instructions,
        }
    }

    /// Parses a TOML document, filling in defaults for any field the
    /// document doesn't mention (`#[serde(default)]` on the struct).
    pub fn from_toml(text: &str) -> Result<RunConfig, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_vm_limits_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.max_operand_depth, 1000);
        assert_eq!(config.max_call_depth, 100);
    }

    #[test]
    fn partial_toml_document_fills_in_the_rest_with_defaults() {
        let config = RunConfig::from_toml("max_call_depth = 50\n").unwrap();
        assert_eq!(config.max_call_depth, 50);
        assert_eq!(config.max_operand_depth, RunConfig::default().max_operand_depth);
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let config = RunConfig::from_toml("").unwrap();
        assert_eq!(config, RunConfig::default());
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        assert!(RunConfig::from_toml("not_a_real_field = 1\n").is_err());
    }
}
