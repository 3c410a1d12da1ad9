use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldType {
    NoPvp,
    #[default]
    Pvp,
    /// Only guild enemies may fight, and only inside PvP zones.
    OptionalPvp,
    PvpEnforced,
}

/// World-wide combat configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatRules {
    pub world_type: WorldType,
    /// Percentage of player-versus-player damage that gets through.
    pub pvp_damage: i32,
    pub pvp_damage_at_black_skulls: i32,
    pub min_pvp_level: u32,
    pub min_pvp_level_applies_to_summons: bool,
    pub can_pass_through: bool,
    pub in_fight_duration_ms: u32,
    pub remove_weapon_charges: bool,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            world_type: WorldType::Pvp,
            pvp_damage: 50,
            pvp_damage_at_black_skulls: 10,
            min_pvp_level: 0,
            min_pvp_level_applies_to_summons: false,
            can_pass_through: false,
            in_fight_duration_ms: 60_000,
            remove_weapon_charges: true,
        }
    }
}

impl CombatRules {
    pub fn from_yaml_str(text: &str) -> Result<Self, String> {
        serde_yaml::from_str(text).map_err(|err| format!("combat rules parse failed: {}", err))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| format!("read {} failed: {}", path.display(), err))?;
        Self::from_yaml_str(&text)
    }

    pub fn is_optional_pvp(&self) -> bool {
        self.world_type == WorldType::OptionalPvp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let rules = CombatRules::from_yaml_str("world_type: optional_pvp\nmin_pvp_level: 30\n")
            .expect("rules");
        assert!(rules.is_optional_pvp());
        assert_eq!(rules.min_pvp_level, 30);
        assert_eq!(rules.pvp_damage, 50);
        assert!(rules.remove_weapon_charges);
    }

    #[test]
    fn unknown_world_type_is_an_error() {
        let err = CombatRules::from_yaml_str("world_type: chaos\n").unwrap_err();
        assert!(err.contains("combat rules parse failed"));
    }
}
