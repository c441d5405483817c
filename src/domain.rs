//! Domain models for stated-choice experiments: attributes, coded and
//! decoded options, choice-set pairs, and the per-session plan.

use serde::{Deserialize, Serialize};

/// 1-based rank of a level within its attribute's ordering. 1 is the best
/// level; the worst equals the attribute's level count.
pub type LevelCode = u8;

/// One option as level codes, one per attribute, in attribute order.
pub type CodedOption = Vec<LevelCode>;

/// An attribute with its levels ordered from best to worst.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Attribute {
  pub name: String,
  pub levels: Vec<String>,
}

/// A choice set of two distinct coded options. `first` always precedes
/// `second` in enumeration order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CodedPair {
  pub first: CodedOption,
  pub second: CodedOption,
}

/// Positional comparison of a pair at one attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttributeComparison {
  pub equal: bool,
  /// The first option carries the strictly lower code, i.e. the strictly
  /// better level.
  pub first_better: bool,
}

/// A level decoded back to its label, paired with its attribute's name.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AttributeLevel {
  pub attribute: String,
  pub level: String,
}

/// A decoded option: attribute/label pairs in attribute declaration order.
pub type DecodedOption = Vec<AttributeLevel>;

/// A choice set with both options decoded.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DecodedPair {
  pub first: DecodedOption,
  pub second: DecodedOption,
}

/// A decoded option tagged with its 1-based position within its set, so the
/// display layer labels options consistently across rounds.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct IndexedOption {
  pub position: usize,
  pub levels: DecodedOption,
}

/// Both options of a set in position order.
pub type IndexedPair = Vec<IndexedOption>;

/// Everything one session presents, computed once at session creation and
/// immutable afterwards. The three sequences are parallel: entry `r` holds
/// round `r + 1` in coded, decoded, and position-tagged form. Every
/// participant of the session reads the same plan.
#[derive(Clone, Debug)]
pub struct SessionPlan {
  pub attributes: Vec<String>,
  pub coded: Vec<CodedPair>,
  pub decoded: Vec<DecodedPair>,
  pub indexed: Vec<IndexedPair>,
}

impl SessionPlan {
  pub fn num_rounds(&self) -> usize {
    self.coded.len()
  }
}

/// One participant's record for one round: the permanent experiment log.
/// Created when the round is first served, the choice filled in on
/// submission, never deleted. The coded data is kept as serialized text so
/// the log stays readable even if the design later changes.
#[derive(Clone, Debug, Serialize)]
pub struct RoundRecord {
  pub round: usize,
  pub attributes: String,
  pub option1: String,
  pub option2: String,
  /// Label of the selected option, or "None" when the none option was taken.
  pub choice: Option<String>,
  pub served_ms: u64,
  pub answered_ms: Option<u64>,
}
