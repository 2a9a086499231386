//! Tree Drops entry point
//!
//! The browser build is driven from JavaScript through `platform::web`. The
//! native binary runs a headless burst of drops and reports where they ended.

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use glam::Vec2;
    use tree_drops::consts::BASELINE_FRAME_MS;
    use tree_drops::persistence::MemoryStore;
    use tree_drops::sim::{EntityState, Rect, SpawnRequest};
    use tree_drops::{Scene, Settings};

    env_logger::init();
    log::info!("Tree Drops (native) starting...");

    let (width, height) = (1280.0, 720.0);
    let tree = Rect::new(Vec2::new(440.0, 220.0), Vec2::new(840.0, 720.0));
    let mut scene = Scene::new(
        Settings::load(),
        width,
        height,
        Some(tree),
        Box::new(MemoryStore::new()),
    );

    for i in 0..50 {
        scene.spawn(SpawnRequest::new(format!("viewer{i}"), "images/snowflake-1.svg"));
    }

    let mut removed = 0usize;
    let mut collisions = 0usize;
    for frame in 0..3_600 {
        let report = scene.frame(BASELINE_FRAME_MS);
        collisions += report.collisions;

        // Stand-in for the renderer: every new sprite measures 48x48
        for note in &report.renders {
            match note.state {
                EntityState::Falling if note.size == Vec2::ZERO => {
                    scene.measure(note.id, 48.0, 48.0);
                }
                EntityState::Removed => removed += 1,
                _ => {}
            }
        }

        if frame % 600 == 0 {
            log::info!(
                "frame {}: {} live, {} ornaments",
                frame,
                scene.world().entity_count(),
                scene.world().ornament_count()
            );
        }
    }

    println!(
        "{} ornaments on the tree, {} drops removed, {} collisions resolved",
        scene.world().ornament_count(),
        removed,
        collisions
    );
    println!("{} ornaments persisted", scene.stored_ornaments().len());
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is platform::web::init, this is just to satisfy the compiler
}
