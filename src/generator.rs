//! Choice-set construction: the once-per-session pipeline that turns an
//! attribute/level design into the rounds a session presents.
//!
//! Flow:
//! 1) Enumerate every coded option (Cartesian product of level ranks).
//! 2) Enumerate every unordered pair of options.
//! 3) Keep only informative pairs: one attribute fixed, the other two
//!    traded off, one in favor of each option.
//! 4) Refuse designs whose informative pool is smaller than num_rounds.
//! 5) Sample num_rounds pairs without replacement; sample order is the
//!    session's round order.
//! 6) Decode level codes back to labels and tag each option with its
//!    1-based position in the set.
//!
//! Everything here is pure given the RNG; the stage-5 draw is the only
//! place randomness enters.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

use crate::domain::{
  Attribute, AttributeComparison, AttributeLevel, CodedOption, CodedPair, DecodedOption,
  DecodedPair, IndexedOption, IndexedPair, LevelCode, SessionPlan,
};
use crate::errors::ExperimentError;

/// Rank of `label` within `attr`, 1 = best. This is the code -> label
/// mapping run backwards; decoding never invents labels, so a decoded
/// level always recodes to its original rank.
#[allow(dead_code)]
pub fn encode_level(attr: &Attribute, label: &str) -> Option<LevelCode> {
  attr
    .levels
    .iter()
    .position(|l| l == label)
    .map(|i| (i + 1) as LevelCode)
}

/// Label for a 1-based level code. Codes outside `[1, levels.len()]` cannot
/// come out of `enumerate_options` on a validated design.
pub fn decode_level(attr: &Attribute, code: LevelCode) -> &str {
  &attr.levels[usize::from(code) - 1]
}

/// Every coded option of the design: the Cartesian product of each
/// attribute's code range, nested iteration in attribute order.
pub fn enumerate_options(design: &[Attribute]) -> Vec<CodedOption> {
  let mut options: Vec<CodedOption> = vec![Vec::new()];
  for attr in design {
    let mut next = Vec::with_capacity(options.len() * attr.levels.len());
    for stem in &options {
      for code in 1..=attr.levels.len() as LevelCode {
        let mut option = stem.clone();
        option.push(code);
        next.push(option);
      }
    }
    options = next;
  }
  options
}

/// All size-2 combinations of `options`, in lexicographic order over the
/// input. No self-pairing, no repeats. The ordering is deterministic so a
/// fixed RNG seed reproduces the same sample.
pub fn enumerate_pairs(options: &[CodedOption]) -> Vec<CodedPair> {
  let n = options.len();
  let mut pairs = Vec::with_capacity(n * n.saturating_sub(1) / 2);
  for i in 0..n {
    for j in i + 1..n {
      pairs.push(CodedPair {
        first: options[i].clone(),
        second: options[j].clone(),
      });
    }
  }
  pairs
}

/// Positional comparison of the two options of a pair, one record per
/// attribute.
pub fn compare(pair: &CodedPair) -> Vec<AttributeComparison> {
  pair
    .first
    .iter()
    .zip(pair.second.iter())
    .map(|(a, b)| AttributeComparison {
      equal: a == b,
      first_better: a < b,
    })
    .collect()
}

/// A pair is informative when exactly one attribute is held fixed and
/// exactly one strictly favors the first option. With three attributes the
/// remaining one then strictly favors the second, so the set is a clean
/// trade-off. Dominated pairs, where every differing attribute favors the
/// same option, fail the second count.
pub fn is_informative(comparisons: &[AttributeComparison]) -> bool {
  let equal = comparisons.iter().filter(|c| c.equal).count();
  let first_better = comparisons.iter().filter(|c| c.first_better).count();
  equal == 1 && first_better == 1
}

/// Classify every candidate pair and keep the informative ones.
pub fn informative_pairs(pairs: Vec<CodedPair>) -> Vec<CodedPair> {
  pairs
    .into_iter()
    .filter(|pair| is_informative(&compare(pair)))
    .collect()
}

/// Refuse configurations that ask for more rounds than the informative pool
/// holds, then draw exactly `num_rounds` distinct pairs uniformly without
/// replacement. The order of the returned sample is the session's round
/// order; nothing downstream reshuffles it.
pub fn sample_rounds(
  pool: &[CodedPair],
  num_rounds: usize,
  rng: &mut impl Rng,
) -> Result<Vec<CodedPair>, ExperimentError> {
  if pool.len() < num_rounds {
    return Err(ExperimentError::PoolTooSmall {
      requested: num_rounds,
      available: pool.len(),
    });
  }
  if pool.len() < num_rounds * 2 {
    warn!(
      target: "choice_sets",
      pool = pool.len(),
      num_rounds,
      "Informative pool barely exceeds the round count; consider a richer design or fewer rounds"
    );
  }

  // choose_multiple leaves the selection order unspecified; shuffle so the
  // round order is as uniformly random as the draw itself.
  let mut sample: Vec<CodedPair> = pool.choose_multiple(rng, num_rounds).cloned().collect();
  sample.shuffle(rng);
  Ok(sample)
}

/// Map one coded option back to attribute/label text, in declaration order.
pub fn decode_option(design: &[Attribute], option: &CodedOption) -> DecodedOption {
  design
    .iter()
    .zip(option.iter())
    .map(|(attr, &code)| AttributeLevel {
      attribute: attr.name.clone(),
      level: decode_level(attr, code).to_string(),
    })
    .collect()
}

fn decode_pair(design: &[Attribute], pair: &CodedPair) -> DecodedPair {
  DecodedPair {
    first: decode_option(design, &pair.first),
    second: decode_option(design, &pair.second),
  }
}

fn index_pair(pair: &DecodedPair) -> IndexedPair {
  vec![
    IndexedOption {
      position: 1,
      levels: pair.first.clone(),
    },
    IndexedOption {
      position: 2,
      levels: pair.second.clone(),
    },
  ]
}

/// The whole pipeline, run exactly once per session.
pub fn build_session_plan(
  design: &[Attribute],
  num_rounds: usize,
  rng: &mut impl Rng,
) -> Result<SessionPlan, ExperimentError> {
  let options = enumerate_options(design);
  let candidates = enumerate_pairs(&options);
  let candidate_count = candidates.len();
  let pool = informative_pairs(candidates);
  info!(
    target: "choice_sets",
    options = options.len(),
    candidate_pairs = candidate_count,
    informative = pool.len(),
    "Constructed informative choice-set pool; num_rounds cannot exceed the pool size"
  );

  let coded = sample_rounds(&pool, num_rounds, rng)?;

  let decoded: Vec<DecodedPair> = coded.iter().map(|pair| decode_pair(design, pair)).collect();
  let indexed: Vec<IndexedPair> = decoded.iter().map(index_pair).collect();
  info!(
    target: "choice_sets",
    sampled = coded.len(),
    sample = %serde_json::to_string(&indexed).unwrap_or_default(),
    "Final sample of choice sets for session"
  );

  Ok(SessionPlan {
    attributes: design.iter().map(|attr| attr.name.clone()).collect(),
    coded,
    decoded,
    indexed,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ExperimentConfig;
  use rand::rngs::StdRng;
  use rand::SeedableRng;
  use std::collections::HashSet;

  // The stock used-car design: 2 x 2 x 3 levels.
  fn car_design() -> Vec<Attribute> {
    ExperimentConfig::default().attributes
  }

  fn car_pool() -> Vec<CodedPair> {
    informative_pairs(enumerate_pairs(&enumerate_options(&car_design())))
  }

  #[test]
  fn option_count_is_product_of_level_counts() {
    let options = enumerate_options(&car_design());
    assert_eq!(options.len(), 2 * 2 * 3);
    // Nested iteration in attribute order: the all-best option comes first,
    // the all-worst last.
    assert_eq!(options[0], vec![1, 1, 1]);
    assert_eq!(options[11], vec![2, 2, 3]);
  }

  #[test]
  fn pair_count_is_n_choose_2() {
    let options = enumerate_options(&car_design());
    assert_eq!(enumerate_pairs(&options).len(), 66);
  }

  #[test]
  fn informative_pool_keeps_only_single_tradeoffs() {
    let pool = car_pool();
    assert_eq!(pool.len(), 15);
    for pair in &pool {
      let cmp = compare(pair);
      assert_eq!(cmp.iter().filter(|c| c.equal).count(), 1, "pair: {pair:?}");
      assert_eq!(
        cmp.iter().filter(|c| c.first_better).count(),
        1,
        "pair: {pair:?}"
      );
    }
  }

  #[test]
  fn filtering_is_deterministic_and_idempotent() {
    let pairs = enumerate_pairs(&enumerate_options(&car_design()));
    let once = informative_pairs(pairs.clone());
    assert_eq!(once, informative_pairs(pairs));
    assert_eq!(once, informative_pairs(once.clone()));
  }

  #[test]
  fn tradeoffs_kept_dominance_and_double_gains_dropped() {
    let pool = car_pool();

    // (Nuovo, Sì, €100) vs (Usato, Sì, €50): Garanzia fixed, Condizione
    // favors the first option, Prezzo the second.
    let tradeoff = CodedPair {
      first: vec![1, 1, 2],
      second: vec![2, 1, 1],
    };
    assert!(pool.contains(&tradeoff));

    // (Nuovo, Sì, €50) vs (Usato, Sì, €100): both differences favor the
    // first option, so nothing is traded off.
    let dominated = CodedPair {
      first: vec![1, 1, 1],
      second: vec![2, 1, 2],
    };
    assert!(!pool.contains(&dominated));

    // (Nuovo, Sì, €50) vs (Nuovo, No, €100): Condizione fixed but two
    // attributes favor the first option.
    let double_gain = CodedPair {
      first: vec![1, 1, 1],
      second: vec![1, 2, 2],
    };
    assert!(!pool.contains(&double_gain));
  }

  #[test]
  fn sample_is_distinct_and_exactly_num_rounds() {
    let pool = car_pool();
    let mut rng = StdRng::seed_from_u64(7);
    let sample = sample_rounds(&pool, 6, &mut rng).expect("sample");
    assert_eq!(sample.len(), 6);
    let unique: HashSet<&CodedPair> = sample.iter().collect();
    assert_eq!(unique.len(), 6);
  }

  #[test]
  fn same_seed_reproduces_the_same_round_order() {
    let pool = car_pool();
    let a = sample_rounds(&pool, 6, &mut StdRng::seed_from_u64(42)).expect("sample");
    let b = sample_rounds(&pool, 6, &mut StdRng::seed_from_u64(42)).expect("sample");
    assert_eq!(a, b);
  }

  #[test]
  fn oversized_round_count_is_fatal_and_names_both_sizes() {
    let pool = car_pool();
    let err = sample_rounds(&pool, 100, &mut StdRng::seed_from_u64(1)).unwrap_err();
    let msg = err.to_string();
    assert!(
      msg.contains("100") && msg.contains("15"),
      "operator cannot fix the config from: {msg}"
    );
  }

  #[test]
  fn decoding_round_trips_through_encode_level() {
    let design = car_design();
    let plan = build_session_plan(&design, 6, &mut StdRng::seed_from_u64(3)).expect("plan");
    for (pair, decoded) in plan.coded.iter().zip(plan.decoded.iter()) {
      for (codes, option) in [(&pair.first, &decoded.first), (&pair.second, &decoded.second)] {
        let recoded: Vec<LevelCode> = option
          .iter()
          .zip(design.iter())
          .map(|(al, attr)| {
            assert_eq!(al.attribute, attr.name);
            encode_level(attr, &al.level).expect("label belongs to the attribute")
          })
          .collect();
        assert_eq!(&recoded, codes);
      }
    }
  }

  #[test]
  fn indexed_sets_tag_positions_one_and_two() {
    let plan = build_session_plan(&car_design(), 6, &mut StdRng::seed_from_u64(9)).expect("plan");
    assert_eq!(plan.indexed.len(), plan.num_rounds());
    for (indexed, decoded) in plan.indexed.iter().zip(plan.decoded.iter()) {
      assert_eq!(indexed.len(), 2);
      assert_eq!(indexed[0].position, 1);
      assert_eq!(indexed[1].position, 2);
      assert_eq!(indexed[0].levels, decoded.first);
      assert_eq!(indexed[1].levels, decoded.second);
    }
  }
}
