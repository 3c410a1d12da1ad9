pub mod combat;
mod config;
pub mod entities;
pub mod persistence;
pub mod telemetry;
pub mod world;

pub use combat::context::CombatContext;
pub use combat::definitions::CombatLibrary;
pub use combat::engine::{Combat, FormulaType};
pub use combat::legality::ReturnValue;
pub use combat::rules::{CombatRules, WorldType};
pub use persistence::file_loader::{FileLoader, FileLoaderError, NodeId};
pub use persistence::prop_stream::{PropStream, PropWriteStream};
pub use persistence::world_store::{WorldLoadReport, WorldStore};
pub use world::area::{AreaCache, AreaCombat};
pub use world::dispatcher::{Dispatcher, Task};
pub use world::state::WorldState;

use std::sync::{mpsc, Arc};
use std::time::Duration;
use world::item_types::ItemTypeRegistry;
use world::map::Map;

const AREA_CACHE_CAPACITY: usize = 64;
const SAVE_CHECK_FILE: &str = "world.check.bin";

pub fn run(args: &[String]) -> Result<(), String> {
    let config = config::AppConfig::from_args(args)?;
    let log_path = telemetry::logging::init(&config.root)?;
    let rules = config.load_rules()?;

    let items_path = config.items_path();
    let types = if items_path.is_file() {
        ItemTypeRegistry::load(&items_path)?
    } else {
        tracing::warn!(path = %items_path.display(), "no item types, using defaults");
        ItemTypeRegistry::new()
    };
    let types = Arc::new(types);

    let mut areas = AreaCache::new(AREA_CACHE_CAPACITY);
    let combat_path = config.combat_path();
    let library = if combat_path.is_file() {
        CombatLibrary::load(&combat_path, &mut areas)?
    } else {
        CombatLibrary::new()
    };

    let store = WorldStore::from_root(&config.root);
    let (map, report) = if store.exists() {
        store.load(Arc::clone(&types), true)?
    } else {
        (Map::new(Arc::clone(&types)), WorldLoadReport::default())
    };
    for err in &report.errors {
        eprintln!("tibia-core: world load {}", err);
    }

    println!("tibia-core: data scan");
    println!("- root: {}", config.root.display());
    println!("- log: {}", log_path.display());
    println!(
        "- rules: world_type={:?}, pvp_damage={}%, min_pvp_level={}",
        rules.world_type, rules.pvp_damage, rules.min_pvp_level
    );
    println!("- item types: {}", types.len());
    println!(
        "- combats: {} ({} distinct areas)",
        library.len(),
        areas.len()
    );
    for name in library.names() {
        println!("  - {}", name);
    }
    if store.exists() {
        println!(
            "- world: tiles={}, items={}, skipped={}, errors={}",
            report.tiles,
            report.items,
            report.skipped_nodes,
            report.errors.len()
        );
    } else {
        println!("- world: missing {}", store.path().display());
    }

    let saved = save_round_trip(&config.root, map, Arc::clone(&types))?;
    println!("- save check: {} tiles written and read back", saved);
    tracing::info!(combats = library.len(), tiles = report.tiles, "data scan done");
    Ok(())
}

/// Saves the map from the dispatcher thread and reads the copy back.
fn save_round_trip(
    root: &std::path::Path,
    map: Map,
    types: Arc<ItemTypeRegistry>,
) -> Result<usize, String> {
    let check = WorldStore::new(root.join(SAVE_CHECK_FILE));
    let mut dispatcher = Dispatcher::new();
    dispatcher.start();

    let (tx, rx) = mpsc::channel();
    let writer = check.clone();
    let queued = dispatcher.add_task(
        Task::new(move || {
            let _ = tx.send(writer.save(&map));
        }),
        false,
    );
    if !queued {
        return Err("dispatcher refused the save task".to_string());
    }
    let written = rx
        .recv_timeout(Duration::from_secs(30))
        .map_err(|err| format!("save task did not report: {}", err))??;
    dispatcher.stop();
    dispatcher.shutdown();

    let (_, report) = check.load(types, false)?;
    if report.tiles != written {
        return Err(format!(
            "save check mismatch: wrote {} tiles, read {}",
            written, report.tiles
        ));
    }
    Ok(written)
}
