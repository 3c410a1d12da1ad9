use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemGroup {
    #[default]
    None,
    Ground,
    Container,
    Weapon,
    Ammunition,
    Armor,
    Charges,
    Teleport,
    MagicField,
    Writeable,
    Key,
    Splash,
    Fluid,
    Door,
    Depot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponType {
    #[default]
    None,
    Sword,
    Club,
    Axe,
    Shield,
    Distance,
    Wand,
    Ammo,
}

/// Static properties shared by every instance of an item id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemType {
    pub id: u16,
    pub name: String,
    pub group: ItemGroup,
    pub stackable: bool,
    pub moveable: bool,
    pub charges: u32,
    pub decay_to: Option<u16>,
    pub decay_time_secs: u32,
    pub stop_time: bool,
    pub block_projectile: bool,
    pub floor_change: bool,
    pub weapon_type: WeaponType,
    pub attack: i32,
}

impl Default for ItemType {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            group: ItemGroup::None,
            stackable: false,
            moveable: true,
            charges: 0,
            decay_to: None,
            decay_time_secs: 0,
            stop_time: false,
            block_projectile: false,
            floor_change: false,
            weapon_type: WeaponType::None,
            attack: 0,
        }
    }
}

impl ItemType {
    pub fn is_fluid_container(&self) -> bool {
        self.group == ItemGroup::Fluid
    }

    pub fn is_splash(&self) -> bool {
        self.group == ItemGroup::Splash
    }

    pub fn is_teleport(&self) -> bool {
        self.group == ItemGroup::Teleport
    }

    pub fn has_charges(&self) -> bool {
        self.charges != 0
    }

    pub fn decay_millis(&self) -> i32 {
        (self.decay_time_secs.min(i32::MAX as u32 / 1000) * 1000) as i32
    }
}

#[derive(Debug, Default, Deserialize)]
struct ItemTypeFile {
    #[serde(default)]
    items: Vec<ItemType>,
}

/// Read-only item type table, built once and passed by reference.
#[derive(Debug, Default, Clone)]
pub struct ItemTypeRegistry {
    types: HashMap<u16, ItemType>,
    fallback: ItemType,
}

impl ItemTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u16) -> Option<&ItemType> {
        self.types.get(&id)
    }

    /// Unknown ids resolve to a blank moveable type.
    pub fn get_or_default(&self, id: u16) -> &ItemType {
        self.types.get(&id).unwrap_or(&self.fallback)
    }

    pub fn insert(&mut self, item: ItemType) -> Result<(), String> {
        if self.types.contains_key(&item.id) {
            return Err(format!("item type {} already exists", item.id));
        }
        self.types.insert(item.id, item);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, String> {
        let file: ItemTypeFile =
            serde_yaml::from_str(text).map_err(|err| format!("item types parse failed: {}", err))?;
        let mut registry = Self::new();
        for item in file.items {
            registry.insert(item)?;
        }
        Ok(registry)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| format!("read {} failed: {}", path.display(), err))?;
        Self::from_yaml_str(&text)
    }
}
