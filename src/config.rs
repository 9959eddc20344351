use config::{Config, ConfigError, Environment, File, FileFormat};
use ethers::types::Address;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

use crate::domain::TimeInForce;
use crate::error::{HypercopyError, Result};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub venue: VenueConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    pub traders: TradersConfig,
    #[serde(default)]
    pub symbols: SymbolsConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    /// Base URL; `/info` and `/exchange` are appended
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Worst-price bound for flattening orders, as a fraction of mid (0.20 = 20%)
    #[serde(default = "default_close_slippage")]
    pub close_slippage: Decimal,
    /// Worst-price bound for triggered stop/target executions
    #[serde(default = "default_trigger_slippage")]
    pub trigger_slippage: Decimal,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            request_timeout_ms: default_request_timeout_ms(),
            close_slippage: default_close_slippage(),
            trigger_slippage: default_trigger_slippage(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    /// Dollar loss accepted if the stop is hit
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade_usd: Decimal,
    /// Venue minimum order value
    #[serde(default = "default_min_notional")]
    pub min_order_notional_usd: Decimal,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            risk_per_trade_usd: default_risk_per_trade(),
            min_order_notional_usd: default_min_notional(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_entry_tif")]
    pub entry_time_in_force: TimeInForce,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            entry_time_in_force: default_entry_tif(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradersConfig {
    /// Traders whose signals are executed
    pub follow: Vec<String>,
    /// Trader name -> credential slot (`HYPERLIQUID_*_{slot}`)
    #[serde(default)]
    pub subaccounts: HashMap<String, u32>,
}

impl TradersConfig {
    /// Credential slot for `trader`, matched case-insensitively
    pub fn slot_for(&self, trader: &str) -> Option<u32> {
        self.subaccounts
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trader))
            .map(|(_, slot)| *slot)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SymbolsConfig {
    /// External symbol -> venue symbol
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Player invoked with the sound file path
    #[serde(default = "default_sound_command")]
    pub command: String,
    #[serde(default = "default_sound_dir")]
    pub sound_dir: PathBuf,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_sound_command(),
            sound_dir: default_sound_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Directory for daily-rolling log files; console only when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

fn default_api_url() -> String {
    crate::venue::DEFAULT_API_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_close_slippage() -> Decimal {
    Decimal::new(20, 2)
}

fn default_trigger_slippage() -> Decimal {
    Decimal::new(10, 2)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_risk_per_trade() -> Decimal {
    Decimal::ONE
}

fn default_min_notional() -> Decimal {
    Decimal::TEN
}

fn default_entry_tif() -> TimeInForce {
    TimeInForce::Gtc
}

fn default_sound_command() -> String {
    "afplay".to_string()
}

fn default_sound_dir() -> PathBuf {
    PathBuf::from("/System/Library/Sounds")
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Credential triple for one followed trader, read from the environment
pub struct TraderCredentials {
    pub trader: String,
    pub slot: u32,
    pub owner_address: Address,
    pub private_key: Zeroizing<String>,
    pub subaccount_address: Address,
}

impl std::fmt::Debug for TraderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraderCredentials")
            .field("trader", &self.trader)
            .field("slot", &self.slot)
            .field("owner_address", &self.owner_address)
            .field("subaccount_address", &self.subaccount_address)
            .finish_non_exhaustive()
    }
}

fn parse_address(trader: &str, field: &str, raw: &str) -> Result<Address> {
    raw.trim().parse::<Address>().map_err(|e| {
        HypercopyError::Wallet(format!(
            "{} for trader {} is not an address: {}",
            field, trader, e
        ))
    })
}

impl AppConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("HYPERCOPY_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (HYPERCOPY_VENUE__API_URL, etc.)
            .add_source(
                Environment::with_prefix("HYPERCOPY")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Parse configuration from TOML text, without environment overrides
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Resolve every followed trader's credential triple from the process environment
    pub fn credentials(&self) -> Result<Vec<TraderCredentials>> {
        self.credentials_from(|name| std::env::var(name).ok())
    }

    /// Resolve credentials through `lookup`. Fails on the first followed
    /// trader with a missing slot mapping or a missing/empty value.
    pub fn credentials_from<F>(&self, lookup: F) -> Result<Vec<TraderCredentials>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let fetch = |trader: &str, name: String| -> Result<Zeroizing<String>> {
            match lookup(&name) {
                Some(value) if !value.trim().is_empty() => Ok(Zeroizing::new(value)),
                _ => Err(HypercopyError::CredentialMissing {
                    trader: trader.to_string(),
                    field: name,
                }),
            }
        };

        self.traders
            .follow
            .iter()
            .map(|trader| {
                let slot = self.traders.slot_for(trader).ok_or_else(|| {
                    HypercopyError::CredentialMissing {
                        trader: trader.clone(),
                        field: format!("traders.subaccounts.{}", trader),
                    }
                })?;

                let owner_field = format!("HYPERLIQUID_ACCOUNT_ADDRESS_{}", slot);
                let key_field = format!("HYPERLIQUID_PRIVATE_KEY_{}", slot);
                let sub_field = format!("HYPERLIQUID_SUBACCOUNT_{}", slot);

                let owner = fetch(trader, owner_field.clone())?;
                let private_key = fetch(trader, key_field)?;
                let sub = fetch(trader, sub_field.clone())?;

                Ok(TraderCredentials {
                    trader: trader.clone(),
                    slot,
                    owner_address: parse_address(trader, &owner_field, &owner)?,
                    private_key,
                    subaccount_address: parse_address(trader, &sub_field, &sub)?,
                })
            })
            .collect()
    }
}
