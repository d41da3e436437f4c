//! Maps an interaction's action kind to its numeric weight.

use crate::config::WeightsConfig;
use crate::error::{EventRankError, EventRankResult};
use crate::types::ActionKind;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Static action-kind to weight mapping. Kinds absent from the mapping
/// resolve to 0.
#[derive(Debug, Clone)]
pub struct WeightResolver {
    weights: HashMap<ActionKind, f64>,
}

impl WeightResolver {
    /// Build a resolver from configuration, rejecting weights outside `[0, 1]`.
    pub fn from_config(config: &WeightsConfig) -> EventRankResult<Self> {
        Self::from_pairs([
            (ActionKind::View, config.view),
            (ActionKind::Register, config.register),
            (ActionKind::Like, config.like),
        ])
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (ActionKind, f64)>) -> EventRankResult<Self> {
        let mut weights = HashMap::new();
        for (kind, weight) in pairs {
            if !(0.0..=1.0).contains(&weight) {
                warn!(action = %kind, weight = weight, "Rejecting out-of-range action weight");
                return Err(EventRankError::Config(format!(
                    "weight for {kind} must be within [0, 1], got {weight}"
                )));
            }
            if kind != ActionKind::Unknown && weight > 0.0 {
                weights.insert(kind, weight);
            } else {
                debug!(action = %kind, "Action kind disabled, interactions will be discarded");
            }
        }
        Ok(Self { weights })
    }

    pub fn resolve(&self, kind: ActionKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }
}

impl Default for WeightResolver {
    fn default() -> Self {
        let config = WeightsConfig::default();
        Self {
            weights: HashMap::from([
                (ActionKind::View, config.view),
                (ActionKind::Register, config.register),
                (ActionKind::Like, config.like),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let resolver = WeightResolver::default();
        assert_eq!(resolver.resolve(ActionKind::View), 0.4);
        assert_eq!(resolver.resolve(ActionKind::Register), 0.8);
        assert_eq!(resolver.resolve(ActionKind::Like), 1.0);
        assert_eq!(resolver.resolve(ActionKind::Unknown), 0.0);
    }

    #[test]
    fn test_zero_weight_is_absent() {
        let resolver = WeightResolver::from_config(&WeightsConfig {
            view: 0.0,
            register: 0.5,
            like: 1.0,
        })
        .unwrap();
        assert_eq!(resolver.resolve(ActionKind::View), 0.0);
        assert_eq!(resolver.resolve(ActionKind::Register), 0.5);
    }

    #[test]
    fn test_out_of_range_weight_rejected() {
        let result = WeightResolver::from_config(&WeightsConfig {
            view: 0.4,
            register: 1.5,
            like: 1.0,
        });
        assert!(matches!(result, Err(EventRankError::Config(_))));

        let result = WeightResolver::from_pairs([(ActionKind::Like, -0.1)]);
        assert!(result.is_err());
    }
}
