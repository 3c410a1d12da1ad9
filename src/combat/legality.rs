use crate::combat::context::{
    creature_zone, is_player_summon, player_in_charge, player_master, CombatContext,
};
use crate::combat::rules::CombatRules;
use crate::entities::creature::{Creature, PlayerFlags, Skull};
use crate::world::map::{Tile, TileFlags, ZoneType};

/// Outcome of a legality check; anything but `NoError` skips the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnValue {
    NoError,
    NotEnoughRoom,
    YouMayNotAttackThisPerson,
    YouMayNotAttackThisCreature,
    YouMayNotAttackAPersonInProtectionZone,
    YouMayNotAttackAPersonWhileInProtectionZone,
    ActionNotPermittedInProtectionZone,
    ActionNotPermittedInANonPvpZone,
    TurnSecureModeToAttackUnmarkedPlayers,
    FirstGoUpstairs,
    FirstGoDownstairs,
}

impl ReturnValue {
    pub fn is_ok(self) -> bool {
        self == ReturnValue::NoError
    }

    pub fn message(self) -> &'static str {
        match self {
            ReturnValue::NoError => "",
            ReturnValue::NotEnoughRoom => "There is not enough room.",
            ReturnValue::YouMayNotAttackThisPerson => "You may not attack this person.",
            ReturnValue::YouMayNotAttackThisCreature => "You may not attack this creature.",
            ReturnValue::YouMayNotAttackAPersonInProtectionZone => {
                "You may not attack a person in a protection zone."
            }
            ReturnValue::YouMayNotAttackAPersonWhileInProtectionZone => {
                "You may not attack a person while you are in a protection zone."
            }
            ReturnValue::ActionNotPermittedInProtectionZone => {
                "This action is not permitted in a protection zone."
            }
            ReturnValue::ActionNotPermittedInANonPvpZone => {
                "This action is not permitted in a non-pvp zone."
            }
            ReturnValue::TurnSecureModeToAttackUnmarkedPlayers => {
                "Turn secure mode off if you really want to attack unmarked players."
            }
            ReturnValue::FirstGoUpstairs => "First go upstairs.",
            ReturnValue::FirstGoDownstairs => "First go downstairs.",
        }
    }
}

fn refusal(target: &Creature) -> ReturnValue {
    if target.is_player() {
        ReturnValue::YouMayNotAttackThisPerson
    } else {
        ReturnValue::YouMayNotAttackThisCreature
    }
}

/// A fight involving a player, directly or through a summon.
pub fn is_player_combat<C: CombatContext + ?Sized>(ctx: &C, target: &Creature) -> bool {
    player_in_charge(ctx, target).is_some()
}

pub fn is_in_pvp_zone<C: CombatContext + ?Sized>(
    ctx: &C,
    attacker: &Creature,
    target: &Creature,
) -> bool {
    creature_zone(ctx, attacker) == ZoneType::Pvp && creature_zone(ctx, target) == ZoneType::Pvp
}

/// Whether a player may pick `target` as an attack target.
pub fn can_target_creature<C: CombatContext + ?Sized>(
    ctx: &C,
    player: &Creature,
    target: &Creature,
) -> ReturnValue {
    if player.id == target.id {
        return ReturnValue::YouMayNotAttackThisPerson;
    }

    if !player.has_flag(PlayerFlags::IGNORE_PROTECTION_ZONE) {
        if creature_zone(ctx, player) == ZoneType::Protection {
            return ReturnValue::YouMayNotAttackAPersonWhileInProtectionZone;
        }
        if creature_zone(ctx, target) == ZoneType::Protection {
            return ReturnValue::YouMayNotAttackAPersonInProtectionZone;
        }
        if is_player_combat(ctx, target) {
            if creature_zone(ctx, player) == ZoneType::NoPvp {
                return ReturnValue::ActionNotPermittedInANonPvpZone;
            }
            if creature_zone(ctx, target) == ZoneType::NoPvp {
                return ReturnValue::YouMayNotAttackAPersonInProtectionZone;
            }
        }
    }

    if player.has_flag(PlayerFlags::CANNOT_USE_COMBAT) || !target.attackable {
        return refusal(target);
    }

    if target.is_player() {
        if player.safe_mode {
            if player.is_partner(target)
                || player.is_war_partner(target)
                || player.is_guild_enemy(target)
            {
                return can_do_combat(ctx, Some(player), target);
            }
            if target.skull == Skull::None && !is_in_pvp_zone(ctx, player, target) {
                return ReturnValue::TurnSecureModeToAttackUnmarkedPlayers;
            }
        } else if player.skull == Skull::Black
            && target.skull == Skull::None
            && !target.has_attacked(player)
        {
            return ReturnValue::YouMayNotAttackThisPerson;
        }
    }

    can_do_combat(ctx, Some(player), target)
}

/// Whether a combat may touch `tile`.
pub fn can_do_combat_on_tile<C: CombatContext + ?Sized>(
    ctx: &C,
    caster: Option<&Creature>,
    tile: &Tile,
    aggressive: bool,
) -> ReturnValue {
    let types = ctx.item_types();
    if tile.blocks_projectile(types) || tile.has_floor_change(types) || tile.has_teleport(types) {
        return ReturnValue::NotEnoughRoom;
    }

    if let Some(caster) = caster {
        if caster.position.z < tile.position.z {
            return ReturnValue::FirstGoDownstairs;
        }
        if caster.position.z > tile.position.z {
            return ReturnValue::FirstGoUpstairs;
        }
        if caster.has_flag(PlayerFlags::IGNORE_PROTECTION_ZONE) {
            return ReturnValue::NoError;
        }
    }

    if aggressive && tile.flags.contains(TileFlags::PROTECTION_ZONE) {
        return ReturnValue::ActionNotPermittedInProtectionZone;
    }

    ReturnValue::NoError
}

/// A kill that earns the attacker a skull.
pub fn is_unjust_kill<C: CombatContext + ?Sized>(
    ctx: &C,
    attacker: &Creature,
    target: &Creature,
) -> bool {
    let attacker_player = if attacker.is_player() {
        Some(attacker)
    } else {
        player_master(ctx, attacker)
    };
    let Some(attacker_player) = attacker_player else {
        return false;
    };
    if !target.is_player() || target.id == attacker_player.id {
        return false;
    }

    !(attacker_player.has_flag(PlayerFlags::NOT_GAIN_IN_FIGHT)
        || attacker_player.is_partner(target)
        || attacker_player.is_war_partner(target)
        || attacker_player.is_guild_enemy(target)
        || is_in_pvp_zone(ctx, attacker_player, target)
        || target.has_attacked(attacker_player)
        || target.skull != Skull::None)
}

/// World-type and level restrictions between two players. A walk check
/// asks whether the attacker may walk through the target instead.
pub fn check_pvp_extra_restrictions<C: CombatContext + ?Sized>(
    ctx: &C,
    attacker: &Creature,
    target: &Creature,
    walk_check: bool,
) -> ReturnValue {
    let rules = ctx.rules();
    let target_player = if rules.min_pvp_level_applies_to_summons {
        player_in_charge(ctx, target)
    } else {
        Some(target).filter(|target| target.is_player())
    };
    let (Some(target_player), Some(attacker_player)) =
        (target_player, player_in_charge(ctx, attacker))
    else {
        return ReturnValue::NoError;
    };

    let mut stop_attack = false;
    if rules.is_optional_pvp() {
        if !target_player.is_guild_enemy(attacker_player)
            || (!walk_check && !is_in_pvp_zone(ctx, attacker, target))
        {
            stop_attack = true;
        }
        if walk_check && !rules.can_pass_through {
            stop_attack = true;
        }
    } else if !walk_check || rules.can_pass_through {
        stop_attack = below_pvp_level(rules, attacker_player, target_player, walk_check);
    }

    if stop_attack {
        return refusal(target);
    }
    ReturnValue::NoError
}

fn below_pvp_level(
    rules: &CombatRules,
    attacker: &Creature,
    target: &Creature,
    walk_check: bool,
) -> bool {
    let floor = rules.min_pvp_level;
    if walk_check {
        attacker.level >= floor && target.level < floor
    } else {
        attacker.level < floor || target.level < floor
    }
}

/// Whether `attacker` may hurt `target`; no attacker means environment
/// damage, which is always allowed.
pub fn can_do_combat<C: CombatContext + ?Sized>(
    ctx: &C,
    attacker: Option<&Creature>,
    target: &Creature,
) -> ReturnValue {
    let Some(attacker) = attacker else {
        return ReturnValue::NoError;
    };

    if target.is_player() {
        if target.has_flag(PlayerFlags::CANNOT_BE_ATTACKED) {
            return ReturnValue::YouMayNotAttackThisPerson;
        }

        if attacker.is_player() {
            if attacker.has_flag(PlayerFlags::CANNOT_ATTACK_PLAYER)
                || attacker.is_attack_locked_against(target)
            {
                return ReturnValue::YouMayNotAttackThisPerson;
            }

            if attacker.skull == Skull::Black
                && !attacker.is_guild_enemy(target)
                && !attacker.is_partner(target)
                && !attacker.is_war_partner(target)
                && target.skull == Skull::None
                && !target.has_attacked(attacker)
            {
                return ReturnValue::YouMayNotAttackThisPerson;
            }
        }

        if let Some(master) = player_master(ctx, attacker) {
            if master.has_flag(PlayerFlags::CANNOT_ATTACK_PLAYER) {
                return ReturnValue::YouMayNotAttackThisPerson;
            }
        }
    } else if target.is_monster() && attacker.has_flag(PlayerFlags::CANNOT_ATTACK_MONSTER) {
        return ReturnValue::YouMayNotAttackThisCreature;
    }

    if attacker.is_player() || is_player_summon(ctx, attacker) {
        let target_in_no_pvp = ctx
            .tile(target.position)
            .map(|tile| tile.flags.contains(TileFlags::NO_PVP_ZONE))
            .unwrap_or(false);
        if target.is_player() && target_in_no_pvp {
            return ReturnValue::ActionNotPermittedInANonPvpZone;
        }
        return check_pvp_extra_restrictions(ctx, attacker, target, false);
    }

    ReturnValue::NoError
}

/// Scales a negative change between two distinct players down to the
/// configured percentage.
pub fn do_pvp_damage_reduction(rules: &CombatRules, change: i32, target: &Creature) -> i32 {
    if change >= 0 {
        return change;
    }
    let percent = if target.skull == Skull::Black {
        rules.pvp_damage_at_black_skulls
    } else {
        rules.pvp_damage
    };
    let factor = i64::from(percent.max(0));
    (i64::from(change) * factor / 100) as i32
}

pub fn check_pvp(
    rules: &CombatRules,
    attacker: Option<&Creature>,
    target: &Creature,
    change: i32,
) -> i32 {
    match attacker {
        Some(attacker) if attacker.is_player() && target.is_player() && attacker.id != target.id => {
            do_pvp_damage_reduction(rules, change, target)
        }
        _ => change,
    }
}
