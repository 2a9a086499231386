//! JavaScript bindings
//!
//! The page calls `frame(elapsedMs)` from `requestAnimationFrame` and applies
//! the returned render notifications to its sprite elements.

use wasm_bindgen::prelude::*;

use crate::persistence::LocalStorageStore;
use crate::settings::Settings;
use crate::sim::{Rect, SpawnRequest};
use crate::Scene;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

fn obstacle_rect(x: f32, y: f32, width: f32, height: f32) -> Option<Rect> {
    let rect = Rect::from_origin_size(glam::Vec2::new(x, y), glam::Vec2::new(width, height));
    (!rect.is_empty()).then_some(rect)
}

#[wasm_bindgen]
pub struct WebScene {
    scene: Scene,
}

#[wasm_bindgen]
impl WebScene {
    /// World size plus the tree's bounding rectangle in page pixels
    #[wasm_bindgen(constructor)]
    pub fn new(
        width: f32,
        height: f32,
        tree_x: f32,
        tree_y: f32,
        tree_width: f32,
        tree_height: f32,
    ) -> WebScene {
        let mut settings = Settings::load();
        settings.seed ^= js_sys::Date::now() as u64;
        let scene = Scene::new(
            settings,
            width,
            height,
            obstacle_rect(tree_x, tree_y, tree_width, tree_height),
            Box::new(LocalStorageStore::default()),
        );
        log::info!("Scene ready with {} ornaments", scene.world().ornament_count());
        WebScene { scene }
    }

    pub fn spawn(&mut self, source_id: &str, sprite_ref: &str, is_avatar_style: bool) {
        let mut request = SpawnRequest::new(source_id, sprite_ref);
        request.is_avatar_style = is_avatar_style;
        self.scene.spawn(request);
    }

    /// Report a sprite's rendered size
    ///
    /// Pass the size as drawn. Settled ornaments are already shown shrunk,
    /// so only a restored ornament's first measurement gets the shrink applied.
    pub fn measure(&mut self, id: u32, width: f32, height: f32) {
        self.scene.measure(id, width, height);
    }

    pub fn clear(&mut self) {
        self.scene.clear();
    }

    pub fn resize(
        &mut self,
        width: f32,
        height: f32,
        tree_x: f32,
        tree_y: f32,
        tree_width: f32,
        tree_height: f32,
    ) {
        self.scene.resize(
            width,
            height,
            obstacle_rect(tree_x, tree_y, tree_width, tree_height),
        );
    }

    /// Step the simulation; returns the frame report as JSON
    pub fn frame(&mut self, elapsed_ms: f32) -> String {
        let report = self.scene.frame(elapsed_ms);
        match serde_json::to_string(&report) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to encode frame report: {}", e);
                String::from("{\"renders\":[],\"collisions\":0}")
            }
        }
    }

    /// Store a (possibly partial) settings document for the next page load.
    /// Returns false if the document does not parse.
    #[wasm_bindgen(js_name = saveSettings)]
    pub fn save_settings(&self, json: &str) -> bool {
        match Settings::from_json(json) {
            Ok(settings) => {
                settings.save();
                true
            }
            Err(e) => {
                log::warn!("Rejected settings document: {}", e);
                false
            }
        }
    }

    /// Sprite reference and style for an entity, for newly spawned elements
    #[wasm_bindgen(js_name = spriteOf)]
    pub fn sprite_of(&self, id: u32) -> Option<String> {
        self.scene.world().entity(id).map(|e| e.sprite_ref.clone())
    }
}
