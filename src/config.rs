use crate::combat::rules::CombatRules;
use std::path::{Path, PathBuf};

pub const RULES_FILE: &str = "rules.yml";
pub const ITEMS_FILE: &str = "items.yml";
pub const COMBAT_FILE: &str = "combat.yml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub root: PathBuf,
    /// Explicit rules file; `None` means `root/rules.yml` when it exists.
    pub rules_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let env_rules = std::env::var("TIBIA_RULES").ok();
        Self::from_parts(args, env_rules.as_deref())
    }

    fn from_parts(args: &[String], env_rules: Option<&str>) -> Result<Self, String> {
        if args.len() < 2 {
            return Err("usage: tibia-core <data-root> [rules.yml]".to_string());
        }

        let root = Path::new(&args[1]).to_path_buf();
        let rules_path = if args.len() > 2 {
            Some(PathBuf::from(&args[2]))
        } else {
            env_rules
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        };
        Ok(Self { root, rules_path })
    }

    pub fn items_path(&self) -> PathBuf {
        self.root.join(ITEMS_FILE)
    }

    pub fn combat_path(&self) -> PathBuf {
        self.root.join(COMBAT_FILE)
    }

    /// Loads the combat rules. A missing default file yields the defaults;
    /// a missing explicit file is an error.
    pub fn load_rules(&self) -> Result<CombatRules, String> {
        match &self.rules_path {
            Some(path) => CombatRules::load(path),
            None => {
                let path = self.root.join(RULES_FILE);
                if path.is_file() {
                    CombatRules::load(&path)
                } else {
                    Ok(CombatRules::default())
                }
            }
        }
    }
}
