use serde::{Deserialize, Serialize};

/// The settings for feature extraction, matching and registration.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherSettings {
    /// The detector response threshold used for akaze
    #[serde(default = "default_akaze_threshold")]
    pub akaze_threshold: f64,
    /// The maximum number of features kept per image (strongest responses first)
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    /// A match is kept only if its distance is below this ratio of the second best distance
    #[serde(default = "default_lowes_ratio")]
    pub lowes_ratio: f32,
    /// The minimum number of matches for an entry to be recognized
    #[serde(default = "default_min_match_count")]
    pub min_match_count: usize,
    /// The reprojection error in pixels below which a match is a consensus inlier
    #[serde(default = "default_consensus_threshold")]
    pub consensus_threshold: f64,
    /// The seed of the random number generator driving sample consensus
    #[serde(default = "default_consensus_seed")]
    pub consensus_seed: u64,
    /// The histogram clip limit of adaptive equalization
    #[serde(default = "default_clahe_clip_limit")]
    pub clahe_clip_limit: f32,
    /// The number of equalization tiles horizontally and vertically
    #[serde(default = "default_clahe_tile_grid")]
    pub clahe_tile_grid: [u32; 2],
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            akaze_threshold: default_akaze_threshold(),
            max_features: default_max_features(),
            lowes_ratio: default_lowes_ratio(),
            min_match_count: default_min_match_count(),
            consensus_threshold: default_consensus_threshold(),
            consensus_seed: default_consensus_seed(),
            clahe_clip_limit: default_clahe_clip_limit(),
            clahe_tile_grid: default_clahe_tile_grid(),
        }
    }
}

fn default_akaze_threshold() -> f64 {
    0.001
}

fn default_max_features() -> usize {
    1000
}

fn default_lowes_ratio() -> f32 {
    0.7
}

fn default_min_match_count() -> usize {
    10
}

fn default_consensus_threshold() -> f64 {
    5.0
}

fn default_consensus_seed() -> u64 {
    0
}

fn default_clahe_clip_limit() -> f32 {
    2.0
}

fn default_clahe_tile_grid() -> [u32; 2] {
    [2, 2]
}
