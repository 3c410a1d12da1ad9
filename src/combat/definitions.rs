use crate::combat::conditions::{Condition, ConditionKind};
use crate::combat::damage::CombatType;
use crate::combat::engine::{Combat, FormulaType};
use crate::combat::params::CombatParam;
use crate::world::area::{AreaCache, AreaShape};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
struct CombatFile {
    #[serde(default)]
    combats: Vec<CombatDefinition>,
}

/// One named combat as authored in `combat.yml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CombatDefinition {
    pub name: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub formula: Option<FormulaDefinition>,
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub area: Option<AreaDefinition>,
    #[serde(default)]
    pub ext_area: Option<GridDefinition>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Flag(bool),
    Number(u32),
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormulaDefinition {
    #[serde(rename = "type")]
    pub kind: FormulaType,
    #[serde(default)]
    pub mina: f64,
    #[serde(default)]
    pub minb: f64,
    #[serde(default)]
    pub maxa: f64,
    #[serde(default)]
    pub maxb: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GridDefinition {
    pub rows: usize,
    pub tokens: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaDefinition {
    Grid(GridDefinition),
    Beam {
        length: u32,
        #[serde(default)]
        spread: u32,
    },
    Radius(u8),
}

impl CombatDefinition {
    fn shape(&self) -> Result<Option<AreaShape>, String> {
        let shape = match (&self.area, &self.ext_area) {
            (None, None) => return Ok(None),
            (None, Some(_)) => {
                return Err(format!("combat {}: ext_area without area", self.name));
            }
            (Some(AreaDefinition::Grid(grid)), ext) => AreaShape::Grid {
                rows: grid.rows,
                tokens: grid.tokens.clone(),
                ext_rows: ext.as_ref().map(|ext| ext.rows).unwrap_or(0),
                ext_tokens: ext.as_ref().map(|ext| ext.tokens.clone()).unwrap_or_default(),
            },
            (Some(_), Some(_)) => {
                return Err(format!(
                    "combat {}: ext_area only applies to grid areas",
                    self.name
                ));
            }
            (Some(AreaDefinition::Beam { length, spread }), None) => AreaShape::Beam {
                length: *length,
                spread: *spread,
            },
            (Some(AreaDefinition::Radius(radius)), None) => AreaShape::Radius(*radius),
        };
        Ok(Some(shape))
    }

    /// Builds the combat, sharing its footprint through `cache`.
    pub fn build(&self, cache: &mut AreaCache) -> Result<Combat, String> {
        let mut combat = Combat::new();
        for (key, value) in &self.params {
            let param = CombatParam::from_name(key)
                .ok_or_else(|| format!("combat {}: unknown param {}", self.name, key))?;
            let raw = resolve_value(param, value)
                .map_err(|err| format!("combat {}: {}", self.name, err))?;
            if !combat.set(param, raw) {
                return Err(format!(
                    "combat {}: invalid value {} for {}",
                    self.name, raw, key
                ));
            }
        }

        if let Some(formula) = self.formula {
            combat.set_player_combat_values(
                formula.kind,
                formula.mina,
                formula.minb,
                formula.maxa,
                formula.maxb,
            );
        }

        if let Some(shape) = self.shape()? {
            let area = cache
                .get_or_build(&shape)
                .map_err(|err| format!("combat {}: area: {}", self.name, err))?;
            combat.set_area(area);
        }

        for condition in &self.conditions {
            combat.set_condition(condition.clone());
        }
        Ok(combat)
    }
}

fn named<T: DeserializeOwned>(name: &str) -> Result<T, String> {
    serde_yaml::from_value(serde_yaml::Value::String(name.to_string()))
        .map_err(|err| format!("unknown name {}: {}", name, err))
}

fn resolve_value(param: CombatParam, value: &ParamValue) -> Result<u32, String> {
    match value {
        ParamValue::Flag(flag) => Ok(u32::from(*flag)),
        ParamValue::Number(number) => Ok(*number),
        ParamValue::Name(name) => match param {
            CombatParam::CombatType => named::<CombatType>(name).map(CombatType::mask),
            CombatParam::Dispel => named::<ConditionKind>(name).map(ConditionKind::mask),
            _ => Err(format!("{:?} takes a number, got {}", param, name)),
        },
    }
}

/// Named combats loaded from YAML.
#[derive(Debug, Default)]
pub struct CombatLibrary {
    combats: BTreeMap<String, Combat>,
}

impl CombatLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml_str(text: &str, cache: &mut AreaCache) -> Result<Self, String> {
        let file: CombatFile = serde_yaml::from_str(text)
            .map_err(|err| format!("combat definitions parse failed: {}", err))?;
        let mut library = Self::new();
        for definition in &file.combats {
            library.insert(definition, cache)?;
        }
        Ok(library)
    }

    pub fn load(path: &Path, cache: &mut AreaCache) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| format!("read {} failed: {}", path.display(), err))?;
        let library = Self::from_yaml_str(&text, cache)?;
        tracing::info!(
            path = %path.display(),
            combats = library.len(),
            areas = cache.len(),
            "combat definitions loaded"
        );
        Ok(library)
    }

    pub fn insert(&mut self, definition: &CombatDefinition, cache: &mut AreaCache) -> Result<(), String> {
        if self.combats.contains_key(&definition.name) {
            return Err(format!("duplicate combat {}", definition.name));
        }
        let combat = definition.build(cache)?;
        self.combats.insert(definition.name.clone(), combat);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Combat> {
        self.combats.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.combats.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.combats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const BOOK: &str = r#"
combats:
  - name: great_fireball
    params:
      combat_type: fire
      effect: 7
      distance_effect: 4
      create_item: 1492
    formula: { type: level_magic, mina: -1.2, minb: 0, maxa: -2.0, maxb: 0 }
    area: { radius: 4 }
  - name: explosion
    params:
      type: 1
      blocked_by_armor: true
    area: { radius: 4 }
  - name: cure_poison
    params:
      aggressive: false
      dispel: poison
  - name: fire_wave
    params:
      combat_type: fire
    area: { beam: { length: 5, spread: 3 } }
  - name: berserk
    params:
      combat_type: physical
    area:
      grid:
        rows: 3
        tokens: [1, 1, 1, 1, 3, 1, 1, 1, 1]
    ext_area:
      rows: 2
      tokens: [1, 1, 1, 2]
    conditions:
      - { kind: paralyze, ticks: 3000 }
"#;

    #[test]
    fn library_builds_every_entry() {
        let mut cache = AreaCache::new(8);
        let library = CombatLibrary::from_yaml_str(BOOK, &mut cache).expect("library");
        assert_eq!(library.len(), 5);
        assert_eq!(
            library.names().collect::<Vec<_>>(),
            vec!["berserk", "cure_poison", "explosion", "fire_wave", "great_fireball"]
        );

        let fireball = library.get("great_fireball").expect("fireball");
        assert_eq!(fireball.params().combat_type, CombatType::Fire);
        assert_eq!(fireball.params().impact_effect, 7);
        assert_eq!(fireball.params().item_id, 1492);
        assert_eq!(fireball.formula(), FormulaType::LevelMagic);

        let explosion = library.get("explosion").expect("explosion");
        assert_eq!(explosion.params().combat_type, CombatType::Physical);
        assert!(explosion.params().blocked_by_armor);

        let cure = library.get("cure_poison").expect("cure");
        assert!(!cure.params().aggressive);
        assert_eq!(cure.params().dispel_type, Some(ConditionKind::Poison));
        assert!(!cure.has_area());

        let berserk = library.get("berserk").expect("berserk");
        assert!(berserk.area().expect("area").has_ext_area());
        assert_eq!(berserk.params().conditions.len(), 1);
        assert_eq!(berserk.params().conditions[0].kind, ConditionKind::Paralyze);
    }

    #[test]
    fn equal_shapes_share_one_area() {
        let mut cache = AreaCache::new(8);
        let library = CombatLibrary::from_yaml_str(BOOK, &mut cache).expect("library");
        let fireball = library.get("great_fireball").and_then(Combat::area).expect("area");
        let explosion = library.get("explosion").and_then(Combat::area).expect("area");
        assert!(Arc::ptr_eq(fireball, explosion));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 3);
    }

    #[test]
    fn bad_entries_are_rejected() {
        let mut cache = AreaCache::new(4);
        let cases = [
            ("combats:\n  - name: a\n    params: { speed: 3 }\n", "unknown param speed"),
            ("combats:\n  - name: a\n    params: { combat_type: lava }\n", "unknown name lava"),
            ("combats:\n  - name: a\n    params: { combat_type: 3 }\n", "invalid value 3"),
            ("combats:\n  - name: a\n    params: { effect: big }\n", "takes a number"),
            (
                "combats:\n  - name: a\n    area: { radius: 2 }\n    ext_area: { rows: 1, tokens: [3] }\n",
                "ext_area only applies to grid areas",
            ),
            (
                "combats:\n  - name: a\n    ext_area: { rows: 1, tokens: [3] }\n",
                "ext_area without area",
            ),
            (
                "combats:\n  - name: a\n    area: { grid: { rows: 2, tokens: [1, 1, 3] } }\n",
                "cannot be split",
            ),
            (
                "combats:\n  - name: a\n    area: { grid: { rows: 1, tokens: [1, 4, 3] } }\n",
                "unknown area token 4",
            ),
            ("combats:\n  - name: a\n  - name: a\n", "duplicate combat a"),
        ];
        for (case, reason) in cases {
            let err = CombatLibrary::from_yaml_str(case, &mut cache).expect_err(case);
            assert!(err.contains(reason), "{:?} rejected for: {}", case, err);
        }
        let empty = CombatLibrary::from_yaml_str("{}", &mut cache).expect("empty");
        assert!(empty.is_empty());
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("combat.yml");
        std::fs::write(&path, BOOK).expect("write");
        let mut cache = AreaCache::new(8);
        let library = CombatLibrary::load(&path, &mut cache).expect("load");
        assert_eq!(library.len(), 5);
        assert!(CombatLibrary::load(&dir.path().join("missing.yml"), &mut cache).is_err());
    }
}
