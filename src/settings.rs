//! Physics tuning and preferences
//!
//! Persisted separately from the ornament list in LocalStorage. Any field
//! missing from the stored document falls back to its default.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Simulation tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seed for spawn placement randomness
    pub seed: u64,

    // === Integration ===
    pub gravity: f32,
    /// Fraction of the excess over `max_fall_speed` kept each baseline frame
    pub air_damping: f32,
    pub min_fall_speed: f32,
    pub max_fall_speed: f32,

    // === Spawning ===
    pub spawn_y: f32,
    pub spawn_max_vx: f32,
    pub spawn_min_vy: f32,
    pub spawn_max_vy: f32,

    // === Boundaries ===
    pub safety_margin: f32,
    pub runaway_offset: f32,
    pub source_release_delay_ms: f64,

    // === Tree contact ===
    pub tree_damping: f32,
    pub tree_edge_slip: f32,
    pub settle_threshold: f32,
    pub ornament_shrink: f32,

    // === Drop-drop collisions ===
    pub lower_mass_bias: f32,
    pub out_thrust: f32,
    pub pair_cooldown_ms: f64,
    pub cooldown_prune_interval_ms: f64,

    // === Spatial index ===
    pub quadtree_split_threshold: usize,
    pub quadtree_max_depth: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,

            gravity: GRAVITY,
            air_damping: AIR_DAMPING,
            min_fall_speed: MIN_FALL_SPEED,
            max_fall_speed: MAX_FALL_SPEED,

            spawn_y: SPAWN_Y,
            spawn_max_vx: SPAWN_MAX_VX,
            spawn_min_vy: SPAWN_MIN_VY,
            spawn_max_vy: SPAWN_MAX_VY,

            safety_margin: SAFETY_MARGIN,
            runaway_offset: RUNAWAY_OFFSET,
            source_release_delay_ms: SOURCE_RELEASE_DELAY_MS,

            tree_damping: TREE_DAMPING,
            tree_edge_slip: TREE_EDGE_SLIP,
            settle_threshold: SETTLE_THRESHOLD,
            ornament_shrink: ORNAMENT_SHRINK,

            lower_mass_bias: LOWER_MASS_BIAS,
            out_thrust: OUT_THRUST,
            pair_cooldown_ms: PAIR_COOLDOWN_MS,
            cooldown_prune_interval_ms: COOLDOWN_PRUNE_INTERVAL_MS,

            quadtree_split_threshold: QUADTREE_SPLIT_THRESHOLD,
            quadtree_max_depth: QUADTREE_MAX_DEPTH,
        }
    }
}

impl Settings {
    /// LocalStorage key
    #[allow(dead_code)]
    const STORAGE_KEY: &'static str = "tree_drops_settings";

    /// Parse a (possibly partial) JSON settings document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Settings>(json).map(Settings::sanitized)
    }

    /// Serialize the full settings document, as written to storage
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Clamp values that would break the simulation
    pub fn sanitized(mut self) -> Self {
        self.quadtree_split_threshold = self.quadtree_split_threshold.max(1);
        if !(self.ornament_shrink > 0.0 && self.ornament_shrink <= 1.0) {
            self.ornament_shrink = ORNAMENT_SHRINK;
        }
        self.air_damping = self.air_damping.clamp(0.0, 1.0);
        self.tree_damping = self.tree_damping.clamp(0.0, 1.0);
        self.tree_edge_slip = self.tree_edge_slip.max(0.0);
        self.lower_mass_bias = self.lower_mass_bias.max(1.0);
        if self.min_fall_speed > self.max_fall_speed {
            std::mem::swap(&mut self.min_fall_speed, &mut self.max_fall_speed);
        }
        if self.spawn_min_vy > self.spawn_max_vy {
            std::mem::swap(&mut self.spawn_min_vy, &mut self.spawn_max_vy);
        }
        self.spawn_max_vx = self.spawn_max_vx.abs();
        self
    }

    /// Load settings from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(settings) => {
                        log::info!("Loaded settings from LocalStorage");
                        return settings;
                    }
                    Err(e) => log::warn!("Ignoring stored settings: {}", e),
                }
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Save settings to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            match self.to_json() {
                Ok(json) => {
                    let _ = storage.set_item(Self::STORAGE_KEY, &json);
                    log::info!("Settings saved");
                }
                Err(e) => log::error!("Failed to encode settings: {}", e),
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saved_document_loads_back() {
        let settings = Settings {
            gravity: 0.35,
            pair_cooldown_ms: 250.0,
            seed: 99,
            ..Settings::default()
        };
        let loaded = Settings::from_json(&settings.to_json().unwrap()).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = Settings::from_json(r#"{ "gravity": 0.5, "seed": 7 }"#).unwrap();
        assert_eq!(settings.gravity, 0.5);
        assert_eq!(settings.seed, 7);
        assert_eq!(settings.ornament_shrink, ORNAMENT_SHRINK);
        assert_eq!(settings.quadtree_split_threshold, QUADTREE_SPLIT_THRESHOLD);
    }

    #[test]
    fn test_sanitize_fixes_degenerate_values() {
        let settings = Settings {
            quadtree_split_threshold: 0,
            ornament_shrink: 2.0,
            min_fall_speed: 9.0,
            max_fall_speed: 3.0,
            ..Settings::default()
        }
        .sanitized();

        assert_eq!(settings.quadtree_split_threshold, 1);
        assert_eq!(settings.ornament_shrink, ORNAMENT_SHRINK);
        assert_eq!(settings.min_fall_speed, 3.0);
        assert_eq!(settings.max_fall_speed, 9.0);
    }

    #[test]
    fn test_garbage_json_is_an_error() {
        assert!(Settings::from_json("not json").is_err());
    }
}
