//! Mock transport settings.

use serde::{Deserialize, Serialize};

/// Source of the samples produced by `read` when nothing is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplePattern {
    /// Record counter plus channel index, wrapping at the channel's bit width.
    #[default]
    Ramp,
    /// `constant_value` in every slot.
    Constant,
    /// Seeded pseudo-random values.
    Noise,
}

/// Behavior of a [`MockBackend`](crate::MockBackend).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Whether trigger get/set are available.
    pub supports_triggers: bool,
    /// Sample source used by `read`.
    pub pattern: SamplePattern,
    /// Value used by [`SamplePattern::Constant`].
    pub constant_value: i64,
    /// Channel indices that hardware can only stream together. Requesting any member
    /// of a group grants the whole group.
    pub channel_groups: Vec<Vec<usize>>,
    /// Seed for [`SamplePattern::Noise`]; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            supports_triggers: true,
            pattern: SamplePattern::Ramp,
            constant_value: 0,
            channel_groups: Vec::new(),
            seed: None,
        }
    }
}
