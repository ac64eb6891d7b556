use std::io::{Error, ErrorKind, Result};

use serde::{Deserialize, Serialize};

/// Exclusive upper bound on the per-bucket displacement search.
///
/// Displacements are persisted as `u16`, so the bound can never exceed `1 << 16`.
pub const MAX_DISPLACEMENT: u32 = 1 << 16;

/// Bucket-count multipliers tried in order, one build round each.
pub const DEFAULT_BUCKET_MULTIPLIERS: [f64; 3] = [1.0, 1.5, 2.0];

/// Retry policy for perfect hash construction.
///
/// Each entry of `bucket_multipliers` is one round: the round uses
/// `max(N, ceil(N * multiplier))` buckets for `N` keys. A round fails as soon
/// as one bucket finds no collision-free displacement below
/// `max_displacement`, and the next round starts from scratch.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SphBuildConfig {
    /// Bucket count multipliers, one build round per entry.
    pub bucket_multipliers: Vec<f64>,
    /// Exclusive upper bound on the displacement searched for each bucket.
    pub max_displacement: u32,
}

impl Default for SphBuildConfig {
    fn default() -> Self {
        SphBuildConfig {
            bucket_multipliers: DEFAULT_BUCKET_MULTIPLIERS.to_vec(),
            max_displacement: MAX_DISPLACEMENT,
        }
    }
}

impl SphBuildConfig {
    /// Checks that the policy describes a terminating search whose results
    /// fit the persisted format.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_multipliers.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "At least one bucket multiplier is required",
            ));
        }
        if let Some(m) = self
            .bucket_multipliers
            .iter()
            .find(|m| !m.is_finite() || **m < 1.0)
        {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("Bucket multiplier must be a finite value >= 1.0, got {m}"),
            ));
        }
        if self.max_displacement == 0 || self.max_displacement > MAX_DISPLACEMENT {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "Max displacement must be in 1..={MAX_DISPLACEMENT}, got {}",
                    self.max_displacement
                ),
            ));
        }
        Ok(())
    }

    /// Bucket count for each round, given `num_keys` keys.
    ///
    /// Never less than `num_keys`.
    pub fn bucket_counts(&self, num_keys: usize) -> Vec<usize> {
        self.bucket_multipliers
            .iter()
            .map(|m| ((num_keys as f64 * m).ceil() as usize).max(num_keys))
            .collect()
    }
}
