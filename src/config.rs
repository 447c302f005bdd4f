use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const APP_NAME: &str = "homofix";

/// Constants of the plausibility formula.
///
/// The defaults are calibrated against `Config::threshold`; changing any of
/// them shifts every score and the threshold has to move with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParams {
    /// Additive smoothing shared by every order.
    pub alpha: f64,
    /// Per-order discount applied when backing off below the maximum order.
    pub backoff_base: f64,
    /// Per-order discount applied to tokens unseen at every order.
    pub oov_base: f64,
    pub shift: f64,
    pub scale: f64,
    pub length_bonus_scale: f64,
    /// Returned for sentences with no scorable characters.
    pub unscorable: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            alpha: 1e-4,
            backoff_base: 0.01,
            oov_base: 0.1,
            shift: 15.0,
            scale: 10.0,
            length_bonus_scale: 100.0,
            unscorable: -999.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gram_store_path: PathBuf,
    pub confusion_path: PathBuf,
    pub max_order: usize,
    /// Sentences scoring at least this are left alone.
    ///
    /// The 193.0 default was calibrated on scores that discount every
    /// back-off by `backoff_base^(N - order)`, with `N` the full model order.
    /// This scorer discounts from the order reachable at each position, so
    /// the first `N - 1` tokens score higher and short sentences land above
    /// that calibration. Recalibrate on a held-out set when changing it.
    pub threshold: f64,
    pub max_passes: usize,
    pub max_window: usize,
    pub socket_path: PathBuf,
    pub max_request_bytes: usize,
    pub scoring: ScoringParams,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            gram_store_path: data_dir.join("ngram.bin"),
            confusion_path: data_dir.join("token_dict.json"),
            max_order: 3,
            threshold: 193.0,
            max_passes: 3,
            max_window: 3,
            socket_path: PathBuf::from("/tmp/corrector.sock"),
            max_request_bytes: 2048,
            scoring: ScoringParams::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, confy::ConfyError> {
        match confy::load(APP_NAME, Some("config")) {
            Ok(config) => Ok(config),
            Err(err) => {
                log::warn!("Failed to load config, using defaults: {err}");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, Some("config"), self)
    }
}

/// `<data dir>/homofix`, or the working directory when no data dir is known.
fn default_data_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(mut path) => {
            path.push(APP_NAME);
            path
        }
        None => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scoring_constants() {
        let params = ScoringParams::default();
        assert_eq!(params.alpha, 1e-4);
        assert_eq!(params.backoff_base, 0.01);
        assert_eq!(params.oov_base, 0.1);
        assert_eq!(params.unscorable, -999.0);
    }

    #[test]
    fn test_default_search_settings() {
        let config = Config::default();
        assert_eq!(config.threshold, 193.0);
        assert_eq!(config.max_order, 3);
        assert_eq!(config.max_passes, 3);
        assert_eq!(config.max_request_bytes, 2048);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{ "threshold": 150.0 }"#).unwrap();
        assert_eq!(config.threshold, 150.0);
        assert_eq!(config.max_order, 3);
        assert_eq!(config.max_window, 3);
        assert_eq!(config.scoring, ScoringParams::default());
    }
}
