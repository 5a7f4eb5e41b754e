use std::{fmt, path::PathBuf, str::FromStr};

use anyhow::{bail, Context, Result};

use crate::yolink::{models::DeviceType, DEFAULT_API_URL, DEFAULT_TOKEN_URL};

#[derive(Debug, Clone)]
pub struct Config {
    /// JSON file holding the YoLink user id/key and database credentials
    pub credentials_path: PathBuf,
    pub yolink_token_url: String,
    pub yolink_api_url: String,
    /// Device types whose state is polled and saved
    pub poll_types: PollTypes,
    /// Seconds between sweeps; 0 runs a single sweep and exits
    pub poll_interval_secs: u64,
    pub temperature_unit: TemperatureUnit,
    pub sink: SinkKind,
    /// CSV output directory
    pub data_dir: PathBuf,
    /// Prefix of the database fields in the credential file
    pub db_profile: String,
    pub db_schema: String,
    pub db_reset_on_start: bool,
    /// Overrides the connection built from the credential file
    pub database_url: Option<String>,
    pub response_dump_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_owned());

        Ok(Self {
            credentials_path: optional("YOLINK_CREDENTIALS_PATH", "./credentials.json").into(),
            yolink_token_url: optional("YOLINK_TOKEN_URL", DEFAULT_TOKEN_URL),
            yolink_api_url: optional("YOLINK_API_URL", DEFAULT_API_URL),
            poll_types: optional("YOLINK_POLL_TYPES", "THSensor")
                .parse()
                .context("YOLINK_POLL_TYPES must be 'all' or a comma-separated list of device types")?,
            poll_interval_secs: optional("POLL_INTERVAL_SECS", "0")
                .parse()
                .context("POLL_INTERVAL_SECS must be a non-negative integer")?,
            temperature_unit: optional("TEMPERATURE_UNIT", "celsius")
                .parse()
                .context("TEMPERATURE_UNIT must be 'celsius' or 'fahrenheit'")?,
            sink: optional("SINK", "csv")
                .parse()
                .context("SINK must be 'csv' or 'postgres'")?,
            data_dir: optional("DATA_DIR", "data").into(),
            db_profile: optional("DB_PROFILE", "dev"),
            db_schema: optional("DB_SCHEMA", "yolink"),
            db_reset_on_start: parse_bool(&optional("DB_RESET_ON_START", "false"))
                .context("DB_RESET_ON_START must be true or false")?,
            database_url: var("DATABASE_URL").filter(|s| !s.is_empty()),
            response_dump_dir: var("RESPONSE_DUMP_DIR")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        })
    }
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => bail!("invalid boolean: {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// PollTypes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTypes {
    All,
    Only(Vec<DeviceType>),
}

impl PollTypes {
    pub fn includes(&self, device_type: &DeviceType) -> bool {
        match self {
            PollTypes::All => true,
            PollTypes::Only(types) => types.contains(device_type),
        }
    }
}

impl FromStr for PollTypes {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(PollTypes::All);
        }

        let types = s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(DeviceType::from_str)
            .collect::<Result<Vec<_>>>()?;

        if types.is_empty() {
            bail!("no device types given");
        }
        Ok(PollTypes::Only(types))
    }
}

// ---------------------------------------------------------------------------
// TemperatureUnit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Convert a Celsius reading into this unit.
    pub fn convert_celsius(self, celsius: f64) -> f64 {
        match self {
            TemperatureUnit::Celsius => celsius,
            TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "celsius" | "c" => Ok(TemperatureUnit::Celsius),
            "fahrenheit" | "f" => Ok(TemperatureUnit::Fahrenheit),
            other => bail!("unknown temperature unit: {other:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// SinkKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Csv,
    Postgres,
}

impl FromStr for SinkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(SinkKind::Csv),
            "postgres" | "postgresql" => Ok(SinkKind::Postgres),
            other => bail!("unknown sink: {other:?}"),
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SinkKind::Csv => "csv",
            SinkKind::Postgres => "postgres",
        })
    }
}
