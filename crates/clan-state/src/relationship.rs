//! Directed relationship graph between cats.
//!
//! Each edge holds seven affinity axes in the range 0-100. Edges are
//! directed: how Sootfur feels about Ashpaw is stored separately from how
//! Ashpaw feels about Sootfur.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::cat::CatId;
use crate::error::ParseError;

/// Upper bound for every relationship axis.
pub const MAX_AXIS_VALUE: u8 = 100;

/// One dimension of how a cat feels about another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipAxis {
    Romantic,
    Platonic,
    Dislike,
    #[serde(alias = "respect")]
    Admiration,
    #[serde(alias = "comfort")]
    Comfortable,
    #[serde(alias = "jealous")]
    Jealousy,
    Trust,
}

impl RelationshipAxis {
    pub fn all() -> &'static [RelationshipAxis] {
        &[
            RelationshipAxis::Romantic,
            RelationshipAxis::Platonic,
            RelationshipAxis::Dislike,
            RelationshipAxis::Admiration,
            RelationshipAxis::Comfortable,
            RelationshipAxis::Jealousy,
            RelationshipAxis::Trust,
        ]
    }

    /// Dislike and jealousy pull cats apart; everything else draws them together.
    pub fn is_negative(self) -> bool {
        matches!(self, RelationshipAxis::Dislike | RelationshipAxis::Jealousy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipAxis::Romantic => "romantic",
            RelationshipAxis::Platonic => "platonic",
            RelationshipAxis::Dislike => "dislike",
            RelationshipAxis::Admiration => "admiration",
            RelationshipAxis::Comfortable => "comfortable",
            RelationshipAxis::Jealousy => "jealousy",
            RelationshipAxis::Trust => "trust",
        }
    }
}

impl fmt::Display for RelationshipAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipAxis {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "romantic" => Ok(RelationshipAxis::Romantic),
            "platonic" => Ok(RelationshipAxis::Platonic),
            "dislike" => Ok(RelationshipAxis::Dislike),
            "admiration" | "respect" => Ok(RelationshipAxis::Admiration),
            "comfortable" | "comfort" => Ok(RelationshipAxis::Comfortable),
            "jealousy" | "jealous" => Ok(RelationshipAxis::Jealousy),
            "trust" => Ok(RelationshipAxis::Trust),
            _ => Err(ParseError::InvalidAxis(s.to_string())),
        }
    }
}

/// How one cat feels about another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub romantic: u8,
    #[serde(default)]
    pub platonic: u8,
    #[serde(default)]
    pub dislike: u8,
    #[serde(default)]
    pub admiration: u8,
    #[serde(default)]
    pub comfortable: u8,
    #[serde(default)]
    pub jealousy: u8,
    #[serde(default)]
    pub trust: u8,
}

impl Relationship {
    pub fn get(&self, axis: RelationshipAxis) -> u8 {
        match axis {
            RelationshipAxis::Romantic => self.romantic,
            RelationshipAxis::Platonic => self.platonic,
            RelationshipAxis::Dislike => self.dislike,
            RelationshipAxis::Admiration => self.admiration,
            RelationshipAxis::Comfortable => self.comfortable,
            RelationshipAxis::Jealousy => self.jealousy,
            RelationshipAxis::Trust => self.trust,
        }
    }

    fn slot(&mut self, axis: RelationshipAxis) -> &mut u8 {
        match axis {
            RelationshipAxis::Romantic => &mut self.romantic,
            RelationshipAxis::Platonic => &mut self.platonic,
            RelationshipAxis::Dislike => &mut self.dislike,
            RelationshipAxis::Admiration => &mut self.admiration,
            RelationshipAxis::Comfortable => &mut self.comfortable,
            RelationshipAxis::Jealousy => &mut self.jealousy,
            RelationshipAxis::Trust => &mut self.trust,
        }
    }

    pub fn set(&mut self, axis: RelationshipAxis, value: u8) {
        *self.slot(axis) = value.min(MAX_AXIS_VALUE);
    }

    /// Adds `delta` to an axis, clamped to 0-100. Returns the new value.
    pub fn adjust(&mut self, axis: RelationshipAxis, delta: i32) -> u8 {
        let slot = self.slot(axis);
        let next = (*slot as i32 + delta).clamp(0, MAX_AXIS_VALUE as i32) as u8;
        *slot = next;
        next
    }

    pub fn with(mut self, axis: RelationshipAxis, value: u8) -> Self {
        self.set(axis, value);
        self
    }
}

/// All directed relationships in the clan: from -> to -> values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipGraph {
    edges: BTreeMap<CatId, BTreeMap<CatId, Relationship>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, from: &CatId, to: &CatId) -> Option<&Relationship> {
        self.edges.get(from).and_then(|targets| targets.get(to))
    }

    /// Reads one axis; missing edges read as zero.
    pub fn value(&self, from: &CatId, to: &CatId, axis: RelationshipAxis) -> u8 {
        self.get(from, to).map(|r| r.get(axis)).unwrap_or(0)
    }

    /// Returns the edge, creating a neutral one if absent.
    pub fn ensure(&mut self, from: &CatId, to: &CatId) -> &mut Relationship {
        self.edges
            .entry(from.clone())
            .or_default()
            .entry(to.clone())
            .or_default()
    }

    pub fn insert(&mut self, from: &CatId, to: &CatId, relationship: Relationship) {
        *self.ensure(from, to) = relationship;
    }

    /// Adjusts one axis on the directed edge `from -> to`.
    pub fn adjust(&mut self, from: &CatId, to: &CatId, axis: RelationshipAxis, delta: i32) -> u8 {
        self.ensure(from, to).adjust(axis, delta)
    }

    /// All cats `from` has an edge towards.
    pub fn targets(&self, from: &CatId) -> impl Iterator<Item = (&CatId, &Relationship)> {
        self.edges.get(from).into_iter().flat_map(|targets| targets.iter())
    }

    /// All cats holding an edge towards `to`.
    pub fn holders_towards<'a>(&'a self, to: &'a CatId) -> impl Iterator<Item = (&'a CatId, &'a Relationship)> + 'a {
        self.edges
            .iter()
            .filter_map(move |(from, targets)| targets.get(to).map(|rel| (from, rel)))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|t| t.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjust_clamps() {
        let mut rel = Relationship::default();
        assert_eq!(rel.adjust(RelationshipAxis::Trust, 150), 100);
        assert_eq!(rel.adjust(RelationshipAxis::Trust, -300), 0);
        assert_eq!(rel.adjust(RelationshipAxis::Dislike, 15), 15);
    }

    #[test]
    fn test_graph_is_directed() {
        let a = CatId::from("a");
        let b = CatId::from("b");
        let mut graph = RelationshipGraph::new();

        graph.adjust(&a, &b, RelationshipAxis::Romantic, 30);

        assert_eq!(graph.value(&a, &b, RelationshipAxis::Romantic), 30);
        assert_eq!(graph.value(&b, &a, RelationshipAxis::Romantic), 0);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_holders_towards() {
        let a = CatId::from("a");
        let b = CatId::from("b");
        let c = CatId::from("c");
        let mut graph = RelationshipGraph::new();
        graph.adjust(&a, &c, RelationshipAxis::Platonic, 10);
        graph.adjust(&b, &c, RelationshipAxis::Platonic, 20);
        graph.adjust(&c, &a, RelationshipAxis::Platonic, 5);

        let holders: Vec<&CatId> = graph.holders_towards(&c).map(|(id, _)| id).collect();
        assert_eq!(holders, vec![&a, &b]);
    }

    #[test]
    fn test_axis_aliases() {
        assert_eq!(
            "respect".parse::<RelationshipAxis>().unwrap(),
            RelationshipAxis::Admiration
        );
        let parsed: RelationshipAxis = serde_json::from_str(r#""jealous""#).unwrap();
        assert_eq!(parsed, RelationshipAxis::Jealousy);
        assert!(RelationshipAxis::Dislike.is_negative());
        assert!(!RelationshipAxis::Trust.is_negative());
    }

    #[test]
    fn test_graph_serialization_roundtrip() {
        let mut graph = RelationshipGraph::new();
        graph.adjust(&CatId::from("a"), &CatId::from("b"), RelationshipAxis::Trust, 40);

        let json = serde_json::to_string(&graph).unwrap();
        let parsed: RelationshipGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(
            parsed.value(&CatId::from("a"), &CatId::from("b"), RelationshipAxis::Trust),
            40
        );
    }
}
