//! Host-side scene: a world plus the storage its ornaments persist to
//!
//! The simulation never touches storage itself. The scene restores saved
//! ornaments at startup and writes the ornament snapshot whenever a frame
//! reports that the set changed.

use glam::Vec2;

use crate::persistence::OrnamentStore;
use crate::settings::Settings;
use crate::sim::{EntityId, FrameReport, Rect, SpawnRequest, World, tick};

pub struct Scene {
    world: World,
    store: Box<dyn OrnamentStore>,
}

impl Scene {
    /// Build a world and restore whatever ornaments `store` holds
    pub fn new(
        settings: Settings,
        width: f32,
        height: f32,
        obstacle: Option<Rect>,
        store: Box<dyn OrnamentStore>,
    ) -> Self {
        let mut world = World::new(settings, width, height, obstacle);
        let records = store.load();
        if !records.is_empty() {
            world.restore_ornaments(&records);
        }
        Self { world, store }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn spawn(&mut self, request: SpawnRequest) {
        self.world.spawn(request);
    }

    pub fn measure(&mut self, id: EntityId, width: f32, height: f32) {
        self.world.measure(id, Vec2::new(width, height));
    }

    pub fn clear(&mut self) {
        self.world.clear_ornaments();
    }

    pub fn resize(&mut self, width: f32, height: f32, obstacle: Option<Rect>) {
        self.world.resize(width, height, obstacle);
    }

    /// Step the world and persist ornament changes
    pub fn frame(&mut self, elapsed_ms: f32) -> FrameReport {
        let report = tick(&mut self.world, elapsed_ms);
        if let Some(records) = &report.ornaments {
            self.store.save(records);
            log::debug!("Persisted {} ornaments", records.len());
        }
        report
    }

    /// Stored records, as the next session would load them
    pub fn stored_ornaments(&self) -> Vec<crate::persistence::OrnamentRecord> {
        self.store.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::BASELINE_FRAME_MS;
    use crate::persistence::MemoryStore;

    #[test]
    fn test_restores_stored_ornaments() {
        let store = MemoryStore::with_document(
            r#"[{"position":{"x":120,"y":400},"spriteRef":"a.png"},{"bogus":1}]"#,
        );
        let scene = Scene::new(Settings::default(), 800.0, 600.0, None, Box::new(store));
        assert_eq!(scene.world().ornament_count(), 1);
        let ornament = scene.world().entities().next().unwrap();
        assert_eq!(ornament.center, Vec2::new(120.0, 400.0));
        assert_eq!(ornament.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_clear_empties_storage() {
        let store = MemoryStore::with_document(
            r#"[{"position":{"x":120,"y":400},"spriteRef":"a.png"}]"#,
        );
        let mut scene = Scene::new(Settings::default(), 800.0, 600.0, None, Box::new(store));
        scene.clear();
        let report = scene.frame(BASELINE_FRAME_MS);

        assert_eq!(report.ornaments, Some(Vec::new()));
        assert!(scene.stored_ornaments().is_empty());
        assert_eq!(scene.world().entity_count(), 0);
    }
}
