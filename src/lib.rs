//! Tree Drops - chat-driven falling drops that settle as tree ornaments
//!
//! Core modules:
//! - `sim`: Deterministic simulation (spatial index, integration, collisions)
//! - `persistence`: Ornament records and their storage backends
//! - `settings`: Data-driven physics tuning
//! - `scene`: Host-side glue tying the simulation to ornament storage
//! - `platform`: Browser bindings

pub mod persistence;
pub mod platform;
pub mod scene;
pub mod settings;
pub mod sim;

pub use scene::Scene;
pub use settings::Settings;

/// Simulation configuration constants (defaults for [`Settings`])
pub mod consts {
    /// Baseline frame duration the velocities are expressed against (60 Hz)
    pub const BASELINE_FRAME_MS: f32 = 1000.0 / 60.0;
    /// Largest time scale a single frame may apply (60 Hz / 20 Hz)
    pub const MAX_DT_SCALE: f32 = 3.0;

    /// Downward acceleration per baseline frame
    pub const GRAVITY: f32 = 0.2;
    /// Fraction of excess speed kept per baseline frame above `max_fall_speed`
    pub const AIR_DAMPING: f32 = 0.9;
    /// Range for the per-drop randomized fall speed cap
    pub const MIN_FALL_SPEED: f32 = 4.0;
    pub const MAX_FALL_SPEED: f32 = 7.0;

    /// Spawn defaults
    pub const SPAWN_Y: f32 = -100.0;
    pub const SPAWN_MAX_VX: f32 = 4.0;
    pub const SPAWN_MIN_VY: f32 = 2.0;
    pub const SPAWN_MAX_VY: f32 = 7.0;

    /// How far the guard bands reach past each world edge
    pub const SAFETY_MARGIN: f32 = 1000.0;
    /// Distance above the world top where the runaway band starts
    pub const RUNAWAY_OFFSET: f32 = 300.0;
    /// Delay before a source may spawn again after its drop is removed (ms)
    pub const SOURCE_RELEASE_DELAY_MS: f64 = 30_000.0;

    /// Fraction of vertical speed shed per frame while on the tree slope
    pub const TREE_DAMPING: f32 = 0.15;
    /// How much the slope damping weakens toward the tree edges
    pub const TREE_EDGE_SLIP: f32 = 1.5;
    /// Vertical speed below which a drop on the slope settles
    pub const SETTLE_THRESHOLD: f32 = 0.5;
    /// Size multiplier applied when a drop becomes an ornament
    pub const ORNAMENT_SHRINK: f32 = 0.8;

    /// Effective mass multiplier for the lower drop of a colliding pair
    pub const LOWER_MASS_BIAS: f32 = 4.0;
    /// Separating push at full overlap, per baseline frame
    pub const OUT_THRUST: f32 = 2.0;
    /// Window in which a pair only receives out-thrust (ms)
    pub const PAIR_COOLDOWN_MS: f64 = 100.0;
    /// Interval between pair cooldown pruning passes (ms)
    pub const COOLDOWN_PRUNE_INTERVAL_MS: f64 = 20_000.0;

    /// Quadtree leaf capacity before splitting
    pub const QUADTREE_SPLIT_THRESHOLD: usize = 4;
    /// Maximum quadtree depth
    pub const QUADTREE_MAX_DEPTH: u32 = 8;

    /// Default RNG seed
    pub const DEFAULT_SEED: u64 = 0x7EE5_D20B;
}

/// Convert real elapsed milliseconds to the clamped baseline-frame scale
#[inline]
pub fn dt_scale(elapsed_ms: f32) -> f32 {
    (elapsed_ms / consts::BASELINE_FRAME_MS).clamp(0.0, consts::MAX_DT_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dt_scale_baseline() {
        assert!((dt_scale(consts::BASELINE_FRAME_MS) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_dt_scale_clamps_stalled_frames() {
        assert_eq!(dt_scale(5_000.0), consts::MAX_DT_SCALE);
        assert_eq!(dt_scale(-3.0), 0.0);
    }
}
