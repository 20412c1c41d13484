//! Typed preconditions: role constraints, group relations, rank bounds,
//! standing and supply triggers.

use std::collections::BTreeSet;
use std::str::FromStr;

use clan_state::{
    AgeBracket, Cat, Clan, ClanStanding, OutsiderStanding, Rank, RankCategory, RelationshipAxis,
    SkillRequirement, SupplyLevel,
};

use crate::error::ContentError;
use crate::template::raw::RawRoleConstraint;

/// Parses every value except the `"any"` wildcard. An empty result means
/// "no restriction".
pub(crate) fn parse_set<T>(field: &str, values: &[String]) -> Result<BTreeSet<T>, ContentError>
where
    T: FromStr + Ord,
{
    values
        .iter()
        .filter(|v| !v.eq_ignore_ascii_case("any"))
        .map(|v| v.parse::<T>().map_err(|_| ContentError::field(field, v.as_str())))
        .collect()
}

pub(crate) fn parse_list<T: FromStr>(field: &str, values: &[String]) -> Result<Vec<T>, ContentError> {
    values
        .iter()
        .map(|v| v.parse::<T>().map_err(|_| ContentError::field(field, v.as_str())))
        .collect()
}

/// A relationship shape between two cats, written like `"mates"`,
/// `"mentor/app"` or `"romantic_30"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationRule {
    Siblings,
    Mates,
    /// Every other cat is the primary's mate
    MatesWithPrimary,
    NotMates,
    /// Primary is the secondary's parent
    ParentChild,
    ChildParent,
    /// Primary is the secondary's mentor
    MentorApp,
    AppMentor,
    /// Axis value at or above `min`
    Threshold { axis: RelationshipAxis, min: u8 },
}

impl FromStr for RelationRule {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rule = match s.trim().to_lowercase().as_str() {
            "siblings" => RelationRule::Siblings,
            "mates" => RelationRule::Mates,
            "mates_with_pl" | "mates_with_mc" => RelationRule::MatesWithPrimary,
            "not_mates" => RelationRule::NotMates,
            "parent/child" => RelationRule::ParentChild,
            "child/parent" => RelationRule::ChildParent,
            "mentor/app" => RelationRule::MentorApp,
            "app/mentor" => RelationRule::AppMentor,
            other => {
                let (axis, min) = other
                    .rsplit_once('_')
                    .ok_or_else(|| ContentError::field("relationship", s))?;
                let axis = axis
                    .parse::<RelationshipAxis>()
                    .map_err(|_| ContentError::field("relationship", s))?;
                let min = min
                    .parse::<u8>()
                    .map_err(|_| ContentError::field("relationship", s))?;
                RelationRule::Threshold { axis, min }
            }
        };
        Ok(rule)
    }
}

impl RelationRule {
    /// Whether `a` (the constrained cat) stands in this relation to `b`.
    pub fn holds(self, a: &Cat, b: &Cat, clan: &Clan) -> bool {
        match self {
            RelationRule::Siblings => a.is_sibling_of(b),
            RelationRule::Mates | RelationRule::MatesWithPrimary => a.is_mate_of(b),
            RelationRule::NotMates => !a.is_mate_of(b) && !b.is_mate_of(a),
            RelationRule::ParentChild => a.is_parent_of(b),
            RelationRule::ChildParent => b.is_parent_of(a),
            RelationRule::MentorApp => a.is_mentor_of(b),
            RelationRule::AppMentor => b.is_mentor_of(a),
            RelationRule::Threshold { axis, min } => clan.relationships.value(&a.id, &b.id, axis) >= min,
        }
    }

    /// True for rules that relate the primary to the secondary specifically.
    pub fn is_directional(self) -> bool {
        matches!(
            self,
            RelationRule::MatesWithPrimary
                | RelationRule::ParentChild
                | RelationRule::ChildParent
                | RelationRule::MentorApp
                | RelationRule::AppMentor
        )
    }

    /// Checks the rule across a whole group.
    ///
    /// Directional rules use `pair` when both primary and secondary are
    /// bound; otherwise they pass if any ordered pair in the group fits.
    /// Every rule needs at least two cats.
    pub fn holds_for_group(self, group: &[&Cat], pair: Option<(&Cat, &Cat)>, clan: &Clan) -> bool {
        if group.len() < 2 {
            return false;
        }
        match self {
            RelationRule::MatesWithPrimary => match pair {
                Some((primary, _)) => group
                    .iter()
                    .filter(|c| c.id != primary.id)
                    .all(|c| primary.is_mate_of(c)),
                None => group
                    .iter()
                    .any(|p| group.iter().filter(|c| c.id != p.id).all(|c| p.is_mate_of(c))),
            },
            rule if rule.is_directional() => match pair {
                Some((primary, secondary)) => rule.holds(primary, secondary, clan),
                None => ordered_pairs(group).any(|(a, b)| rule.holds(a, b, clan)),
            },
            rule => ordered_pairs(group).all(|(a, b)| rule.holds(a, b, clan)),
        }
    }
}

fn ordered_pairs<'a>(group: &'a [&'a Cat]) -> impl Iterator<Item = (&'a Cat, &'a Cat)> + 'a {
    group.iter().flat_map(move |a| {
        group
            .iter()
            .filter(move |b| b.id != a.id)
            .map(move |b| (*a, *b))
    })
}

/// Constraints on the cat filling one role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleConstraint {
    pub age: BTreeSet<AgeBracket>,
    pub status: BTreeSet<Rank>,
    pub skills: Vec<SkillRequirement>,
    pub not_skills: Vec<SkillRequirement>,
    pub traits: BTreeSet<String>,
    pub not_traits: BTreeSet<String>,
    pub backstory: BTreeSet<String>,
    /// Relation this cat must hold to the other named role
    pub relationship_status: Vec<RelationRule>,
    /// Cat must already carry one of these injuries
    pub injuries: BTreeSet<String>,
    pub dies: bool,
}

impl RoleConstraint {
    pub fn from_raw(raw: &RawRoleConstraint) -> Result<Self, ContentError> {
        Ok(Self {
            age: parse_set("age", &raw.age)?,
            status: parse_set("status", &raw.status)?,
            skills: parse_list("skill", &raw.skill)?,
            not_skills: parse_list("not_skill", &raw.not_skill)?,
            traits: raw.traits.iter().cloned().collect(),
            not_traits: raw.not_trait.iter().cloned().collect(),
            backstory: raw
                .backstory
                .iter()
                .filter(|b| !b.eq_ignore_ascii_case("any"))
                .cloned()
                .collect(),
            relationship_status: parse_list("relationship_status", &raw.relationship_status)?,
            injuries: raw.injury.iter().cloned().collect(),
            dies: raw.dies,
        })
    }

    /// Number of declared fields, used by the weight bonus.
    pub fn field_count(&self) -> u32 {
        [
            !self.age.is_empty(),
            !self.status.is_empty(),
            !self.skills.is_empty(),
            !self.not_skills.is_empty(),
            !self.traits.is_empty(),
            !self.not_traits.is_empty(),
            !self.backstory.is_empty(),
            !self.relationship_status.is_empty(),
            !self.injuries.is_empty(),
        ]
        .iter()
        .filter(|declared| **declared)
        .count() as u32
    }

    /// Checks everything that depends on the cat alone. Whether the cat
    /// is still active is up to the caller's candidate pool.
    pub fn accepts(&self, cat: &Cat) -> bool {
        if !self.age.is_empty() && !self.age.contains(&cat.age()) {
            return false;
        }
        if !self.status.is_empty() && !self.status.contains(&cat.rank) {
            return false;
        }
        if !self.skills.is_empty() && cat.skills.hits(&self.skills) == 0 {
            return false;
        }
        if cat.skills.hits(&self.not_skills) > 0 {
            return false;
        }
        if !self.traits.is_empty() && !self.traits.contains(cat.trait_name()) {
            return false;
        }
        if self.not_traits.contains(cat.trait_name()) {
            return false;
        }
        if !self.backstory.is_empty() && !self.backstory.contains(&cat.backstory) {
            return false;
        }
        if !self.injuries.is_empty() && !self.injuries.iter().any(|i| cat.has_injury(i)) {
            return false;
        }
        true
    }

    /// Checks the relationship-status prerequisites against a partner.
    /// Passes when none are declared; fails when some are but there is no partner.
    pub fn accepts_partner(&self, cat: &Cat, partner: Option<&Cat>, clan: &Clan) -> bool {
        if self.relationship_status.is_empty() {
            return true;
        }
        match partner {
            Some(other) => self
                .relationship_status
                .iter()
                .all(|rule| rule.holds(cat, other, clan)),
            None => false,
        }
    }
}

/// Bound on how many cats of a rank category are in the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankBound {
    pub category: RankCategory,
    pub min: u32,
    pub max: u32,
}

impl RankBound {
    pub fn allows(&self, group: &[&Cat]) -> bool {
        let count = group
            .iter()
            .filter(|c| self.category.contains(c.rank))
            .count() as u32;
        count >= self.min && count <= self.max
    }
}

/// Which supply a trigger or adjustment refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupplyKind {
    Freshkill,
    /// Judged on the best-stocked herb
    AnyHerb,
    /// Judged on the worst-stocked herb; adjustments hit every herb
    AllHerb,
    Herb(String),
}

impl FromStr for SupplyKind {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim() {
            "" => return Err(ContentError::field("supplies.type", s)),
            "freshkill" => SupplyKind::Freshkill,
            "any_herb" => SupplyKind::AnyHerb,
            "all_herb" => SupplyKind::AllHerb,
            herb => SupplyKind::Herb(herb.to_string()),
        };
        Ok(kind)
    }
}

/// A supply must be at one of these levels for the template to fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyTrigger {
    pub kind: SupplyKind,
    pub levels: BTreeSet<SupplyLevel>,
}

pub(crate) fn parse_supply_level(value: &str) -> Result<SupplyLevel, ContentError> {
    match value.trim().to_lowercase().as_str() {
        "low" => Ok(SupplyLevel::Low),
        "adequate" => Ok(SupplyLevel::Adequate),
        "full" => Ok(SupplyLevel::Full),
        "excess" => Ok(SupplyLevel::Excess),
        _ => Err(ContentError::field("supplies.trigger", value)),
    }
}

pub(crate) fn parse_outsider_standing(value: &str) -> Result<OutsiderStanding, ContentError> {
    match value.trim().to_lowercase().as_str() {
        "hostile" => Ok(OutsiderStanding::Hostile),
        "neutral" => Ok(OutsiderStanding::Neutral),
        "welcoming" => Ok(OutsiderStanding::Welcoming),
        _ => Err(ContentError::field("outsider.current_rep", value)),
    }
}

pub(crate) fn parse_clan_standing(value: &str) -> Result<ClanStanding, ContentError> {
    match value.trim().to_lowercase().as_str() {
        "hostile" => Ok(ClanStanding::Hostile),
        "neutral" => Ok(ClanStanding::Neutral),
        "ally" => Ok(ClanStanding::Ally),
        _ => Err(ContentError::field("other_clan.current_rep", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clan_state::fixtures::sample_clan;
    use clan_state::CatId;

    fn cat<'a>(clan: &'a Clan, id: &str) -> &'a Cat {
        clan.cat(&CatId::from(id)).unwrap()
    }

    #[test]
    fn test_relation_rule_parse() {
        assert_eq!("mentor/app".parse::<RelationRule>().unwrap(), RelationRule::MentorApp);
        assert_eq!(
            "romantic_30".parse::<RelationRule>().unwrap(),
            RelationRule::Threshold {
                axis: RelationshipAxis::Romantic,
                min: 30
            }
        );
        assert!("romantic".parse::<RelationRule>().is_err());
        assert!("friends_forever".parse::<RelationRule>().is_err());
    }

    #[test]
    fn test_role_constraint_accepts() {
        let clan = sample_clan();
        let raw = RawRoleConstraint {
            status: vec!["warrior".to_string(), "deputy".to_string()],
            skill: vec!["HUNTER,1".to_string()],
            ..Default::default()
        };
        let constraint = RoleConstraint::from_raw(&raw).unwrap();

        assert!(constraint.accepts(cat(&clan, "c4")));
        assert!(!constraint.accepts(cat(&clan, "c2")));
        assert!(!constraint.accepts(cat(&clan, "c1")));
        assert_eq!(constraint.field_count(), 2);
    }

    #[test]
    fn test_any_is_wildcard() {
        let raw = RawRoleConstraint {
            age: vec!["any".to_string()],
            ..Default::default()
        };
        let constraint = RoleConstraint::from_raw(&raw).unwrap();
        assert!(constraint.age.is_empty());
        assert_eq!(constraint.field_count(), 0);
    }

    #[test]
    fn test_unknown_rank_is_content_error() {
        let raw = RawRoleConstraint {
            status: vec!["emperor".to_string()],
            ..Default::default()
        };
        assert!(RoleConstraint::from_raw(&raw).is_err());
    }

    #[test]
    fn test_relationship_status_needs_partner() {
        let clan = sample_clan();
        let raw = RawRoleConstraint {
            relationship_status: vec!["mates".to_string()],
            ..Default::default()
        };
        let constraint = RoleConstraint::from_raw(&raw).unwrap();

        assert!(constraint.accepts_partner(cat(&clan, "c2"), Some(cat(&clan, "c3")), &clan));
        assert!(!constraint.accepts_partner(cat(&clan, "c2"), Some(cat(&clan, "c4")), &clan));
        assert!(!constraint.accepts_partner(cat(&clan, "c2"), None, &clan));
    }

    #[test]
    fn test_group_relations() {
        let clan = sample_clan();
        let mates = vec![cat(&clan, "c2"), cat(&clan, "c3")];
        let mixed = vec![cat(&clan, "c2"), cat(&clan, "c3"), cat(&clan, "c4")];

        assert!(RelationRule::Mates.holds_for_group(&mates, None, &clan));
        assert!(!RelationRule::Mates.holds_for_group(&mixed, None, &clan));
        assert!(RelationRule::NotMates.holds_for_group(&[cat(&clan, "c1"), cat(&clan, "c4")], None, &clan));

        let mentor_pair = vec![cat(&clan, "c4"), cat(&clan, "c5")];
        assert!(RelationRule::MentorApp.holds_for_group(&mentor_pair, None, &clan));
        assert!(!RelationRule::MentorApp.holds_for_group(
            &mentor_pair,
            Some((cat(&clan, "c5"), cat(&clan, "c4"))),
            &clan
        ));
        assert!(!RelationRule::Siblings.holds_for_group(&[cat(&clan, "c5")], None, &clan));
    }

    #[test]
    fn test_rank_bound() {
        let clan = sample_clan();
        let group = vec![cat(&clan, "c4"), cat(&clan, "c5")];
        let bound = RankBound {
            category: RankCategory::AllApprentices,
            min: 1,
            max: 6,
        };
        assert!(bound.allows(&group));
        assert!(!bound.allows(&group[..1]));
    }
}
