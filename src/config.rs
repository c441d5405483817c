//! Loading the experiment configuration (design + session settings) from TOML.
//!
//! See `ExperimentConfig` for the expected schema. Without a config file the
//! server runs the compiled-in default design.

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Attribute, LevelCode};
use crate::errors::ExperimentError;

/// The construction algorithm supports exactly this many attributes.
pub const SUPPORTED_ATTRIBUTES: usize = 3;

/// Choice sets are pairs. The setting exists in TOML so a value this release
/// cannot honor fails loudly instead of silently producing pairs.
pub const OPTIONS_PER_SET: usize = 2;

/// Experiment configuration accepted in TOML.
///
/// `attributes` lists each attribute with its levels ordered best to worst;
/// `num_rounds` is the number of choice sets presented per session.
#[derive(Clone, Debug, Deserialize)]
pub struct ExperimentConfig {
  #[serde(default = "default_num_rounds")]
  pub num_rounds: usize,
  #[serde(default = "default_options_per_set")]
  pub options_per_set: usize,
  /// Offer a "None" choice next to the generated pair. Presentation-layer
  /// only; the generator never materializes a third option.
  #[serde(default = "default_none_option")]
  pub none_option: bool,
  #[serde(default = "default_attributes")]
  pub attributes: Vec<Attribute>,
}

fn default_num_rounds() -> usize {
  6
}

fn default_options_per_set() -> usize {
  OPTIONS_PER_SET
}

fn default_none_option() -> bool {
  true
}

/// The stock used-car design the module shipped with.
fn default_attributes() -> Vec<Attribute> {
  vec![
    Attribute {
      name: "Condizione".into(),
      levels: vec!["Nuovo".into(), "Usato".into()],
    },
    Attribute {
      name: "Garanzia".into(),
      levels: vec!["Sì".into(), "No".into()],
    },
    Attribute {
      name: "Prezzo".into(),
      levels: vec!["€50".into(), "€100".into(), "€150".into()],
    },
  ]
}

impl Default for ExperimentConfig {
  fn default() -> Self {
    Self {
      num_rounds: default_num_rounds(),
      options_per_set: default_options_per_set(),
      none_option: default_none_option(),
      attributes: default_attributes(),
    }
  }
}

impl ExperimentConfig {
  /// Check the design's shape. The generator assumes a validated design, so
  /// violations are fatal at startup rather than a degraded mode.
  pub fn validate(&self) -> Result<(), ExperimentError> {
    if self.num_rounds == 0 {
      return Err(ExperimentError::InvalidDesign(
        "num_rounds must be at least 1".into(),
      ));
    }
    if self.options_per_set != OPTIONS_PER_SET {
      return Err(ExperimentError::InvalidDesign(format!(
        "options_per_set must be {OPTIONS_PER_SET}, got {}",
        self.options_per_set
      )));
    }
    if self.attributes.len() != SUPPORTED_ATTRIBUTES {
      return Err(ExperimentError::InvalidDesign(format!(
        "exactly {SUPPORTED_ATTRIBUTES} attributes are supported, got {}",
        self.attributes.len()
      )));
    }
    for attr in &self.attributes {
      if attr.levels.len() < 2 {
        return Err(ExperimentError::InvalidDesign(format!(
          "attribute '{}' needs at least 2 levels, ordered best to worst",
          attr.name
        )));
      }
      // Level codes are u8 ranks.
      if attr.levels.len() > usize::from(LevelCode::MAX) {
        return Err(ExperimentError::InvalidDesign(format!(
          "attribute '{}' has more than {} levels",
          attr.name,
          LevelCode::MAX
        )));
      }
      for (i, level) in attr.levels.iter().enumerate() {
        // Duplicate labels would break the decode/encode round-trip.
        if attr.levels[..i].contains(level) {
          return Err(ExperimentError::InvalidDesign(format!(
            "attribute '{}' repeats level '{}'",
            attr.name, level
          )));
        }
      }
    }
    Ok(())
  }
}

/// Attempt to load `ExperimentConfig` from EXPERIMENT_CONFIG_PATH. On any
/// parsing/IO error, returns None and the caller falls back to defaults.
pub fn load_experiment_config_from_env() -> Option<ExperimentConfig> {
  let path = std::env::var("EXPERIMENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<ExperimentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "scelta_backend", %path, "Loaded experiment config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "scelta_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "scelta_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_design_is_valid() {
    ExperimentConfig::default().validate().expect("stock design");
  }

  #[test]
  fn toml_overrides_and_defaults_compose() {
    let cfg: ExperimentConfig = toml::from_str(
      r#"
        num_rounds = 4

        [[attributes]]
        name = "Shipping"
        levels = ["Free", "Paid"]

        [[attributes]]
        name = "Rating"
        levels = ["5 stars", "4 stars", "3 stars"]

        [[attributes]]
        name = "Price"
        levels = ["$10", "$20"]
      "#,
    )
    .expect("parse");
    assert_eq!(cfg.num_rounds, 4);
    assert_eq!(cfg.options_per_set, OPTIONS_PER_SET);
    assert!(cfg.none_option);
    assert_eq!(cfg.attributes.len(), 3);
    cfg.validate().expect("valid");
  }

  #[test]
  fn bad_shapes_are_rejected() {
    let mut cfg = ExperimentConfig::default();
    cfg.num_rounds = 0;
    assert!(cfg.validate().is_err());

    let mut cfg = ExperimentConfig::default();
    cfg.options_per_set = 3;
    assert!(cfg.validate().is_err());

    let mut cfg = ExperimentConfig::default();
    cfg.attributes.pop();
    assert!(cfg.validate().is_err());

    let mut cfg = ExperimentConfig::default();
    cfg.attributes[0].levels = vec!["solo".into()];
    assert!(cfg.validate().is_err());

    let mut cfg = ExperimentConfig::default();
    cfg.attributes[2].levels = vec!["€50".into(), "€50".into()];
    assert!(cfg.validate().is_err());
  }
}
