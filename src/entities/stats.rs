use crate::combat::damage::CombatType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub health: i32,
    pub max_health: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub resistances: DamageResistances,
}

impl Stats {
    pub fn new(max_health: i32, max_mana: i32) -> Self {
        Self {
            health: max_health,
            max_health,
            mana: max_mana,
            max_mana,
            resistances: DamageResistances::default(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    /// Applies a signed health change after resistances and returns the
    /// change that actually landed.
    pub fn change_health(&mut self, combat_type: CombatType, change: i32) -> i32 {
        let change = if change < 0 {
            -self.resistances.apply(combat_type, change.saturating_neg())
        } else {
            change
        };
        let before = self.health;
        self.health = before.saturating_add(change).clamp(0, self.max_health.max(0));
        self.health - before
    }

    pub fn change_mana(&mut self, change: i32) -> i32 {
        let before = self.mana;
        self.mana = before.saturating_add(change).clamp(0, self.max_mana.max(0));
        self.mana - before
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResistances {
    percents: [i16; CombatType::COUNT],
}

impl DamageResistances {
    pub fn from_array(values: [i16; CombatType::COUNT]) -> Self {
        Self { percents: values }
    }

    pub fn set(&mut self, combat_type: CombatType, percent: i16) {
        if let Some(index) = combat_type.index() {
            self.percents[index] = percent;
        }
    }

    pub fn apply(&self, combat_type: CombatType, amount: i32) -> i32 {
        let Some(index) = combat_type.index() else {
            return amount;
        };
        let percent = i64::from(self.percents[index].clamp(-100, 100));
        let base = i64::from(amount);
        let adjusted = base - (base * percent / 100);
        adjusted.clamp(0, i64::from(i32::MAX)) as i32
    }
}

impl Default for DamageResistances {
    fn default() -> Self {
        Self {
            percents: [0; CombatType::COUNT],
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new(150, 0)
    }
}
