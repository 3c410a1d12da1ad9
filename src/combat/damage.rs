use rand::Rng;
use serde::{Deserialize, Serialize};

/// Combat types as bit masks, matching the values stored in definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatType {
    #[default]
    None,
    Physical,
    Energy,
    Earth,
    Fire,
    Undefined,
    LifeDrain,
    ManaDrain,
    Healing,
    Drown,
    Ice,
    Holy,
    Death,
}

impl CombatType {
    /// Number of types that carry a resistance slot (everything but `None`).
    pub const COUNT: usize = 12;

    pub const ALL: [CombatType; 13] = [
        CombatType::None,
        CombatType::Physical,
        CombatType::Energy,
        CombatType::Earth,
        CombatType::Fire,
        CombatType::Undefined,
        CombatType::LifeDrain,
        CombatType::ManaDrain,
        CombatType::Healing,
        CombatType::Drown,
        CombatType::Ice,
        CombatType::Holy,
        CombatType::Death,
    ];

    pub fn from_mask(mask: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.mask() == mask)
    }

    pub fn mask(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Physical => 1,
            Self::Energy => 1 << 1,
            Self::Earth => 1 << 2,
            Self::Fire => 1 << 3,
            Self::Undefined => 1 << 4,
            Self::LifeDrain => 1 << 5,
            Self::ManaDrain => 1 << 6,
            Self::Healing => 1 << 7,
            Self::Drown => 1 << 8,
            Self::Ice => 1 << 9,
            Self::Holy => 1 << 10,
            Self::Death => 1 << 11,
        }
    }

    pub fn index(self) -> Option<usize> {
        match self {
            Self::None => None,
            other => Some(other.mask().trailing_zeros() as usize),
        }
    }
}

/// Normally distributed value in `[min, max]`, mean at the midpoint.
///
/// Box-Muller sample with mean 0.5 and deviation 0.25, clamped to the unit
/// interval and then scaled onto the range.
pub fn roll_normal<R: Rng + ?Sized>(rng: &mut R, min: i32, max: i32) -> i32 {
    let (low, high) = if min <= max { (min, max) } else { (max, min) };
    if low == high {
        return low;
    }

    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    let unit = (0.5 + 0.25 * z).clamp(0.0, 1.0);

    let span = f64::from(high) - f64::from(low);
    let value = f64::from(low) + (span * unit).round();
    value.clamp(f64::from(low), f64::from(high)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn masks_roundtrip_and_index_densely() {
        let mut seen = [false; CombatType::COUNT];
        for kind in CombatType::ALL {
            assert_eq!(CombatType::from_mask(kind.mask()), Some(kind));
            if let Some(index) = kind.index() {
                assert!(!seen[index]);
                seen[index] = true;
            }
        }
        assert!(seen.iter().all(|slot| *slot));
        assert_eq!(CombatType::from_mask(3), None);
    }

    #[test]
    fn roll_stays_in_range_and_centers() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut total = 0i64;
        for _ in 0..4000 {
            let value = roll_normal(&mut rng, -200, -100);
            assert!((-200..=-100).contains(&value));
            total += i64::from(value);
        }
        let mean = total / 4000;
        assert!((-160..=-140).contains(&mean), "mean {}", mean);
    }

    #[test]
    fn roll_accepts_reversed_and_degenerate_ranges() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        assert_eq!(roll_normal(&mut rng, 5, 5), 5);
        for _ in 0..100 {
            let value = roll_normal(&mut rng, 10, -10);
            assert!((-10..=10).contains(&value));
        }
    }
}
