use crate::entities::item::{AttrReadOutcome, Item};
use crate::persistence::file_loader::{FileLoader, FileLoaderError, NodeId};
use crate::persistence::prop_stream::PropWriteStream;
use crate::world::item_types::ItemTypeRegistry;
use crate::world::map::{Map, Tile, TileFlags};
use crate::world::position::Position;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const WORLD_FILE: &str = "world.bin";

pub const NODE_WORLD: u8 = 0;
pub const NODE_TILE: u8 = 1;
pub const NODE_ITEM: u8 = 2;

const WORLD_FORMAT: u16 = 1;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorldLoadReport {
    pub tiles: usize,
    pub items: usize,
    pub skipped_nodes: usize,
    pub errors: Vec<String>,
}

/// Tiles and their items on a node file:
/// world root, then one node per tile, then one node per item.
#[derive(Debug, Clone)]
pub struct WorldStore {
    path: PathBuf,
}

impl WorldStore {
    pub fn from_root(root: &Path) -> Self {
        Self {
            path: root.join(WORLD_FILE),
        }
    }

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Writes every non-placeholder tile; returns the number written.
    pub fn save(&self, map: &Map) -> Result<usize, String> {
        let mut tiles: Vec<&Tile> = map.tiles().filter(|tile| !tile.is_static).collect();
        tiles.sort_by_key(|tile| (tile.position.z, tile.position.y, tile.position.x));

        let fail = |err: FileLoaderError| format!("world save failed for {}: {}", self.path.display(), err);
        let mut loader = FileLoader::open(&self.path, true, false).map_err(fail)?;
        let types = map.item_types();

        loader.start_node(NODE_WORLD).map_err(fail)?;
        let mut header = PropWriteStream::new();
        header.add_u16(WORLD_FORMAT);
        header.add_u32(tiles.len() as u32);
        loader.set_props(header.as_slice()).map_err(fail)?;

        for tile in &tiles {
            loader.start_node(NODE_TILE).map_err(fail)?;
            let mut props = PropWriteStream::new();
            props.add_u16(tile.position.x);
            props.add_u16(tile.position.y);
            props.add_u8(tile.position.z);
            props.add_u32(tile.flags.bits());
            loader.set_props(props.as_slice()).map_err(fail)?;

            for item in &tile.items {
                loader.start_node(NODE_ITEM).map_err(fail)?;
                let mut props = PropWriteStream::new();
                item.serialize(types, &mut props);
                loader.set_props(props.as_slice()).map_err(fail)?;
                loader.end_node().map_err(fail)?;
            }
            loader.end_node().map_err(fail)?;
        }

        loader.end_node().map_err(fail)?;
        loader.finish().map_err(fail)?;
        tracing::info!(path = %self.path.display(), tiles = tiles.len(), "world saved");
        Ok(tiles.len())
    }

    /// Reads the world back. Malformed tiles and items are skipped and
    /// listed in the report; a broken file or root fails the whole load.
    pub fn load(
        &self,
        types: Arc<ItemTypeRegistry>,
        caching: bool,
    ) -> Result<(Map, WorldLoadReport), String> {
        let mut loader = FileLoader::open(&self.path, false, caching)
            .map_err(|err| format!("world load failed for {}: {}", self.path.display(), err))?;
        let root = loader
            .root()
            .ok_or_else(|| format!("world file {} has no root", self.path.display()))?;
        if loader.node_type(root) != Some(NODE_WORLD) {
            return Err(format!(
                "world file {} has root type {:?}",
                self.path.display(),
                loader.node_type(root)
            ));
        }
        let declared = {
            let mut header = loader
                .props_stream(root)
                .map_err(|err| format!("world header read failed: {}", err))?;
            let format = header.get_u16();
            if format != Some(WORLD_FORMAT) {
                return Err(format!("unsupported world format {:?}", format));
            }
            header.get_u32().unwrap_or(0) as usize
        };

        let mut map = Map::new(Arc::clone(&types));
        let mut report = WorldLoadReport::default();
        let tile_nodes: Vec<NodeId> = loader.children(root).collect();
        for node in tile_nodes {
            if loader.node_type(node) != Some(NODE_TILE) {
                report.skipped_nodes += 1;
                continue;
            }
            match read_tile(&mut loader, &types, node, &mut report) {
                Ok(tile) => {
                    report.tiles += 1;
                    map.set_tile(tile);
                }
                Err(err) => {
                    report.skipped_nodes += 1;
                    report.errors.push(err);
                }
            }
        }

        if report.tiles != declared {
            tracing::warn!(declared, loaded = report.tiles, "world tile count mismatch");
        }
        tracing::info!(
            path = %self.path.display(),
            tiles = report.tiles,
            items = report.items,
            skipped = report.skipped_nodes,
            "world loaded"
        );
        Ok((map, report))
    }
}

fn read_tile(
    loader: &mut FileLoader,
    types: &ItemTypeRegistry,
    node: NodeId,
    report: &mut WorldLoadReport,
) -> Result<Tile, String> {
    let (position, flags) = {
        let mut props = loader
            .props_stream(node)
            .map_err(|err| format!("tile props read failed: {}", err))?;
        let x = props.get_u16();
        let y = props.get_u16();
        let z = props.get_u8();
        let flags = props.get_u32();
        match (x, y, z, flags) {
            (Some(x), Some(y), Some(z), Some(flags)) => (Position::new(x, y, z), flags),
            _ => return Err("tile props truncated".to_string()),
        }
    };

    let mut tile = Tile::new(position);
    tile.flags = TileFlags::from_bits_truncate(flags);

    let item_nodes: Vec<NodeId> = loader.children(node).collect();
    for item_node in item_nodes {
        if loader.node_type(item_node) != Some(NODE_ITEM) {
            report.skipped_nodes += 1;
            continue;
        }
        let parsed = {
            let mut props = loader
                .props_stream(item_node)
                .map_err(|err| format!("item props read failed at {:?}: {}", position, err))?;
            Item::create_from_stream(types, &mut props)
        };
        match parsed {
            Ok((item, AttrReadOutcome::Complete)) => {
                report.items += 1;
                tile.items.push(item);
            }
            Ok((item, AttrReadOutcome::ContainerFollows(count))) => {
                let nested = loader.children(item_node).count();
                tracing::warn!(
                    x = position.x,
                    y = position.y,
                    z = position.z,
                    declared = count,
                    nested,
                    "container contents are not kept"
                );
                report.items += 1;
                report.skipped_nodes += nested;
                tile.items.push(item);
            }
            Err(err) => {
                report.skipped_nodes += 1;
                report
                    .errors
                    .push(format!("item at {:?}: {}", position, err));
            }
        }
    }
    Ok(tile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::item_attributes::DecayState;
    use crate::world::item_types::ItemType;
    use tempfile::TempDir;

    const COINS: u16 = 0x0FFE;
    const SIGN: u16 = 1850;
    const TORCH: u16 = 2051;

    fn registry() -> Arc<ItemTypeRegistry> {
        let mut types = ItemTypeRegistry::new();
        types
            .insert(ItemType {
                id: COINS,
                stackable: true,
                ..ItemType::default()
            })
            .expect("coins");
        types
            .insert(ItemType {
                id: SIGN,
                moveable: false,
                ..ItemType::default()
            })
            .expect("sign");
        types
            .insert(ItemType {
                id: TORCH,
                decay_to: Some(2050),
                decay_time_secs: 600,
                ..ItemType::default()
            })
            .expect("torch");
        Arc::new(types)
    }

    fn lcg_next(state: &mut u64) -> u32 {
        *state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (*state >> 33) as u32
    }

    fn sample_map(types: &Arc<ItemTypeRegistry>) -> Map {
        let mut map = Map::new(Arc::clone(types));
        let mut temple = Tile::new(Position::new(0xFEFD, 0xFFFE, 7));
        temple.flags = TileFlags::PROTECTION_ZONE | TileFlags::NO_LOGOUT;
        let mut sign = Item::new(types, SIGN, 0);
        sign.attributes_mut().set_text("Welcome \u{fe}\u{ff}");
        sign.attributes_mut().set_writer("gm");
        temple.items.push(sign);
        temple.items.push(Item::new(types, COINS, 0xFE));
        map.set_tile(temple);

        let mut field = Tile::new(Position::new(100, 253, 6));
        let mut torch = Item::new(types, TORCH, 0);
        torch.attributes_mut().set_decaying(DecayState::True);
        field.items.push(torch);
        map.set_tile(field);

        map.set_tile(Tile::placeholder(Position::new(5, 5, 7)));
        map
    }

    #[test]
    fn saved_world_reads_back() {
        let dir = TempDir::new().expect("tempdir");
        let types = registry();
        let store = WorldStore::from_root(dir.path());
        assert!(!store.exists());

        let map = sample_map(&types);
        assert_eq!(store.save(&map).expect("save"), 2);
        assert!(store.exists());

        for caching in [false, true] {
            let (loaded, report) = store.load(Arc::clone(&types), caching).expect("load");
            assert_eq!(report.tiles, 2);
            assert_eq!(report.items, 3);
            assert_eq!(report.skipped_nodes, 0);
            assert!(report.errors.is_empty());
            assert_eq!(loaded.tile_count(), 2);
            assert!(loaded.tile(Position::new(5, 5, 7)).is_none());

            let temple = loaded.tile(Position::new(0xFEFD, 0xFFFE, 7)).expect("temple");
            assert_eq!(temple.flags, TileFlags::PROTECTION_ZONE | TileFlags::NO_LOGOUT);
            assert_eq!(temple.items[0].attributes().text(), "Welcome \u{fe}\u{ff}");
            assert_eq!(temple.items[0].attributes().writer(), "gm");
            assert_eq!(temple.items[1].item_count(), 0xFE);

            let field = loaded.tile(Position::new(100, 253, 6)).expect("field");
            assert_eq!(field.items[0].attributes().decaying(), DecayState::Pending);
        }
    }

    #[test]
    fn many_random_tiles_survive() {
        let dir = TempDir::new().expect("tempdir");
        let types = registry();
        let mut map = Map::new(Arc::clone(&types));
        let mut state = 0xC0FFEE_u64;
        for _ in 0..300 {
            let position = Position::new(
                (lcg_next(&mut state) % 0xFFFF) as u16,
                (lcg_next(&mut state) % 0xFFFF) as u16,
                (lcg_next(&mut state) % 16) as u8,
            );
            let mut tile = Tile::new(position);
            tile.flags = TileFlags::from_bits_truncate(lcg_next(&mut state));
            for _ in 0..lcg_next(&mut state) % 4 {
                let count = (lcg_next(&mut state) % 100 + 1) as u16;
                tile.items.push(Item::new(&types, COINS, count));
            }
            map.set_tile(tile);
        }

        let store = WorldStore::new(dir.path().join("random.bin"));
        let written = store.save(&map).expect("save");
        assert_eq!(written, map.tile_count());
        let (loaded, report) = store.load(Arc::clone(&types), true).expect("load");
        assert_eq!(report.tiles, written);
        for tile in map.tiles() {
            let other = loaded.tile(tile.position).expect("tile");
            assert_eq!(other.flags, tile.flags);
            assert_eq!(other.items, tile.items);
        }
    }

    #[test]
    fn broken_files_are_rejected() {
        let dir = TempDir::new().expect("tempdir");
        let types = registry();
        let store = WorldStore::new(dir.path().join("missing.bin"));
        assert!(store.load(Arc::clone(&types), false).is_err());

        let wrong_root = dir.path().join("wrong.bin");
        let mut loader = FileLoader::open(&wrong_root, true, false).expect("create");
        loader.start_node(NODE_TILE).expect("start");
        loader.end_node().expect("end");
        loader.finish().expect("finish");
        assert!(WorldStore::new(&wrong_root).load(Arc::clone(&types), false).is_err());

        let garbage = dir.path().join("garbage.bin");
        std::fs::write(&garbage, [0, 0, 0, 0, 0xFE, 0, 1, 2]).expect("write");
        assert!(WorldStore::new(&garbage).load(types, false).is_err());
    }

    #[test]
    fn bad_items_are_reported_not_fatal() {
        let dir = TempDir::new().expect("tempdir");
        let types = registry();
        let path = dir.path().join("bad_item.bin");
        let mut loader = FileLoader::open(&path, true, false).expect("create");
        loader.start_node(NODE_WORLD).expect("root");
        let mut header = PropWriteStream::new();
        header.add_u16(WORLD_FORMAT);
        header.add_u32(1);
        loader.set_props(header.as_slice()).expect("header");
        loader.start_node(NODE_TILE).expect("tile");
        let mut props = PropWriteStream::new();
        props.add_u16(10);
        props.add_u16(20);
        props.add_u8(7);
        props.add_u32(0);
        loader.set_props(props.as_slice()).expect("tile props");
        loader.start_node(NODE_ITEM).expect("item");
        let mut item = PropWriteStream::new();
        item.add_u16(SIGN);
        item.add_u8(99);
        loader.set_props(item.as_slice()).expect("item props");
        loader.end_node().expect("item end");
        loader.end_node().expect("tile end");
        loader.end_node().expect("root end");
        loader.finish().expect("finish");

        let (map, report) = WorldStore::new(&path).load(types, false).expect("load");
        assert_eq!(report.tiles, 1);
        assert_eq!(report.items, 0);
        assert_eq!(report.skipped_nodes, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(map.tile(Position::new(10, 20, 7)).expect("tile").items.is_empty());
    }
}
