use log::{error, warn};
use once_cell::sync::OnceCell;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_derive::Deserialize;
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::engine::entry::Symbol;

static INSTANCE: OnceCell<Mutex<RuntimeConfig>> = OnceCell::new();

pub fn instance() -> &'static Mutex<RuntimeConfig> {
    INSTANCE.get_or_init(|| Mutex::new(RuntimeConfig::new()))
}

/// Snapshot of the global instance
pub fn current() -> RuntimeConfig {
    match instance().lock() {
        Ok(config) => config.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// When a freshly placed order gets its match attempt
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// On the caller's thread right after the placement commits
    #[default]
    Inline,
    /// On a background worker fed through a channel
    Queued,
    /// Only through explicit match calls and sweeps
    Off,
}

/// A demo account created when the daemon starts
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SeedAccount {
    pub usd_balance: Decimal,
    /// Keyed by ticker, case-insensitive
    #[serde(default)]
    pub assets: BTreeMap<String, Decimal>,
}

impl SeedAccount {
    pub fn holdings(&self) -> Result<Vec<(Symbol, Decimal)>, String> {
        self.assets
            .iter()
            .map(|(ticker, amount)| {
                let symbol = ticker.parse::<Symbol>().map_err(|e| e.to_string())?;
                if *amount <= Decimal::ZERO {
                    return Err(format!("seed amount for {} must be positive", symbol));
                }
                Ok((symbol, *amount))
            })
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub commission_rate: Decimal,
    pub max_decimal_places: u32,
    pub dispatch: DispatchMode,
    pub sweep_on_start: bool,
    /// 0 disables the periodic sweep
    pub sweep_interval_secs: u64,
    pub metrics_addr: String,
    pub seed_accounts: Vec<SeedAccount>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        RuntimeConfig {
            commission_rate: dec!(0.015),
            max_decimal_places: 8,
            dispatch: DispatchMode::Inline,
            sweep_on_start: false,
            sweep_interval_secs: 0,
            metrics_addr: "0.0.0.0:4010".to_string(),
            seed_accounts: Vec::new(),
        }
    }

    /// Parses and validates a TOML document
    pub fn parse(contents: &str) -> Result<Self, String> {
        let config: RuntimeConfig = toml::from_str(contents).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.commission_rate < Decimal::ZERO || self.commission_rate >= Decimal::ONE {
            return Err(format!(
                "commission_rate must be in [0, 1), got {}",
                self.commission_rate
            ));
        }
        for seed in &self.seed_accounts {
            if seed.usd_balance < Decimal::ZERO {
                return Err(format!("seed usd_balance must not be negative, got {}", seed.usd_balance));
            }
            seed.holdings()?;
        }
        Ok(())
    }

    /// Loads `path`, falling back to defaults when the file cannot be read or
    /// is invalid. The loaded values become the global instance.
    pub fn from_toml(path: &str) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "Something went wrong reading the runtime config file, {:?}",
                    e
                );
                return RuntimeConfig::new();
            }
        };
        let config = match RuntimeConfig::parse(&contents) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "Something went wrong parsing the runtime config file, {}",
                    e
                );
                return RuntimeConfig::new();
            }
        };
        match instance().lock() {
            Ok(mut global) => global.clone_from(&config),
            Err(e) => error!("runtime config instance poisoned: {}", e),
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::parse("").unwrap();
        assert_eq!(config, RuntimeConfig::new());
        assert_eq!(config.commission_rate, dec!(0.015));
        assert_eq!(config.dispatch, DispatchMode::Inline);
    }

    #[test]
    fn test_parse_full() {
        let config = RuntimeConfig::parse(
            r#"
commission_rate = "0.002"
max_decimal_places = 4
dispatch = "queued"
sweep_on_start = true
sweep_interval_secs = 30
metrics_addr = "127.0.0.1:9100"

[[seed_accounts]]
usd_balance = "100000"
assets = { BTC = "2", eth = "10" }
"#,
        )
        .unwrap();
        assert_eq!(config.commission_rate, dec!(0.002));
        assert_eq!(config.max_decimal_places, 4);
        assert_eq!(config.dispatch, DispatchMode::Queued);
        assert!(config.sweep_on_start);
        assert_eq!(config.sweep_interval_secs, 30);
        assert_eq!(config.seed_accounts.len(), 1);
        assert_eq!(
            config.seed_accounts[0].holdings().unwrap(),
            vec![(Symbol::BTC, dec!(2)), (Symbol::ETH, dec!(10))]
        );
    }

    #[test]
    fn test_rejects_bad_commission() {
        assert!(RuntimeConfig::parse(r#"commission_rate = "1""#).is_err());
        assert!(RuntimeConfig::parse(r#"commission_rate = "-0.1""#).is_err());
        assert!(RuntimeConfig::parse(r#"dispatch = "later""#).is_err());
        let unknown_asset = r#"
[[seed_accounts]]
usd_balance = "10"
assets = { DOGE = "1" }
"#;
        assert!(RuntimeConfig::parse(unknown_asset).is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "dispatch = \"off\"\nmax_decimal_places = 2").unwrap();
        let config = RuntimeConfig::from_toml(file.path().to_str().unwrap());
        assert_eq!(config.dispatch, DispatchMode::Off);
        assert_eq!(config.max_decimal_places, 2);
        assert_eq!(current(), config);
    }

    #[test]
    fn test_from_toml_fallbacks() {
        let config = RuntimeConfig::from_toml("/nonexistent/exchange.toml");
        assert_eq!(config, RuntimeConfig::new());

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "commission_rate = \"2\"").unwrap();
        let config = RuntimeConfig::from_toml(file.path().to_str().unwrap());
        assert_eq!(config, RuntimeConfig::new());
    }
}
