//! Character progression math: soft-capped stat gains, trait modifiers,
//! skill XP, and mana bookkeeping.

use world_schema::{
    CharacterSheet, CoreStat, ManaPool, SkillProgress, STAT_HARD_CAP, STAT_SOFT_CAP,
};

/// Product of the character's trait multipliers for a stat.
pub fn trait_stat_multiplier(sheet: &CharacterSheet, stat: CoreStat) -> f32 {
    sheet
        .traits
        .iter()
        .map(|t| t.stat_multiplier(stat))
        .product()
}

/// Product of the character's trait multipliers for skill XP.
pub fn trait_skill_multiplier(sheet: &CharacterSheet) -> f32 {
    sheet.traits.iter().map(|t| t.skill_multiplier()).product()
}

/// Soft-capped stat increment law.
///
/// `gain = delta * multiplier / (1 + (v / S)^2)`; the new value is clamped
/// into `[0, HARD_CAP]`. Above the soft cap gains decay quadratically; at
/// the hard cap they vanish entirely.
pub fn stat_gain(current: i32, raw_delta: f32, multiplier: f32) -> i32 {
    let damped = raw_delta * multiplier
        / (1.0 + (current as f32 / STAT_SOFT_CAP as f32).powi(2));
    let next = current + damped.round() as i32;
    next.clamp(0, STAT_HARD_CAP)
}

/// Apply a raw stat delta through the character's traits and the soft-cap
/// law, returning the value actually reached.
pub fn apply_stat_gain(sheet: &mut CharacterSheet, stat: CoreStat, raw_delta: f32) -> i32 {
    let multiplier = trait_stat_multiplier(sheet, stat);
    let next = stat_gain(sheet.stat(stat), raw_delta, multiplier);
    sheet.stats.insert(stat, next);
    next
}

/// Award skill XP scaled by the character's trait skill multiplier.
/// Returns the effective XP credited.
pub fn award_skill_xp(sheet: &mut CharacterSheet, skill: &str, raw_xp: u64) -> u64 {
    let effective = (raw_xp as f32 * trait_skill_multiplier(sheet)).round() as u64;
    let entry = sheet
        .skills
        .entry(skill.to_owned())
        .or_insert(SkillProgress { xp: 0 });
    entry.xp += effective;
    effective
}

/// Spend mana; succeeds iff the pool holds at least `cost`.
pub fn spend_mana(sheet: &mut CharacterSheet, cost: u32) -> bool {
    if sheet.mana.current >= cost {
        sheet.mana.current -= cost;
        true
    } else {
        false
    }
}

/// Regenerate one step of mana, clamped at the derived maximum.
pub fn regen_mana(sheet: &mut CharacterSheet) {
    let max = sheet.max_mana();
    let regen = sheet.mana_regen();
    sheet.mana = ManaPool {
        current: (sheet.mana.current + regen).min(max),
        max,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_schema::{CharacterTrait, CraftingProficiency};

    #[test]
    fn gains_decay_above_the_soft_cap() {
        let low = stat_gain(10, 10.0, 1.0);
        let mid = stat_gain(50, 10.0, 1.0);
        let high = stat_gain(90, 10.0, 1.0);
        assert_eq!(low, 20, "well below the soft cap the full delta lands");
        assert_eq!(mid, 55, "at the soft cap gains halve");
        assert!(high - 90 < 5, "far above the soft cap gains shrink hard");
    }

    #[test]
    fn hard_cap_is_absolute() {
        assert_eq!(stat_gain(100, 50.0, 2.0), 100);
        assert_eq!(stat_gain(99, 50.0, 2.0), 100);
        assert_eq!(stat_gain(0, -10.0, 1.0), 0);
    }

    #[test]
    fn traits_scale_stat_and_skill_gains() {
        let mut sheet = CharacterSheet::new("alia", "Alia");
        sheet.traits.insert(CharacterTrait::IronMuscles);
        sheet.traits.insert(CharacterTrait::QuickLearner);

        assert_eq!(trait_stat_multiplier(&sheet, CoreStat::Strength), 1.25);
        assert_eq!(trait_stat_multiplier(&sheet, CoreStat::Agility), 1.0);
        assert_eq!(trait_skill_multiplier(&sheet), 1.2);

        let credited = award_skill_xp(&mut sheet, "smithing", 100);
        assert_eq!(credited, 120);
        assert_eq!(sheet.skill_xp("smithing"), 120);
        assert_eq!(sheet.skill_tier("smithing"), CraftingProficiency::Apprentice);
    }

    #[test]
    fn mana_spend_and_regen_respect_bounds() {
        let mut sheet = CharacterSheet::new("alia", "Alia");
        // INT 10 -> max_mana 30, regen 2.
        assert_eq!(sheet.max_mana(), 30);
        assert_eq!(sheet.mana_regen(), 2);

        assert!(spend_mana(&mut sheet, 25));
        assert_eq!(sheet.mana.current, 5);
        assert!(!spend_mana(&mut sheet, 6));
        assert_eq!(sheet.mana.current, 5);

        for _ in 0..20 {
            regen_mana(&mut sheet);
        }
        assert_eq!(sheet.mana.current, sheet.max_mana());
    }
}
