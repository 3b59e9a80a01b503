//! Configuration snapshot for discovery, caching, preloading and pagination
//!
//! Configuration is read once per instance and never re-read. Bad values are
//! never fatal: they are replaced by the documented default and a warning is
//! logged.

use crate::KeyqlError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default number of items sampled per table
pub const DEFAULT_SAMPLE_SIZE: usize = 1000;
pub const MIN_SAMPLE_SIZE: usize = 1;
pub const MAX_SAMPLE_SIZE: usize = 10_000;

/// Target items per scan segment when sampling randomly
pub const ITEMS_PER_SEGMENT: usize = 100;
/// Upper bound on total segments accepted by the store's parallel scan
pub const MAX_TOTAL_SEGMENTS: u32 = 4096;

/// HINTS mode samples `sample_size / HINTS_SAMPLE_DIVISOR` items...
pub const HINTS_SAMPLE_DIVISOR: usize = 10;
/// ...but never more than this
pub const HINTS_SAMPLE_CAP: usize = 100;

pub const DEFAULT_SCHEMA_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_PRELOAD_INTERVAL: Duration = Duration::from_secs(3600);
pub const DEFAULT_PRELOAD_BATCH_SIZE: usize = 10;
pub const DEFAULT_DISCOVERY_CONCURRENCY: usize = 4;
/// Upper bound on concurrent table discoveries
pub const MAX_DISCOVERY_CONCURRENCY: usize = 1024;
/// Longest accepted TTL or interval; longer values fall back to the default
pub const MAX_CONFIG_DURATION: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);
pub const DEFAULT_OFFSET_CACHE_MAX_SIZE: usize = 100;
pub const DEFAULT_OFFSET_CACHE_INTERVAL: u64 = 100;
pub const DEFAULT_OFFSET_CACHE_TTL: Duration = Duration::from_secs(3600);

fn normalize_enum_token(s: &str) -> String {
    s.trim().to_ascii_uppercase().replace(['-', ' '], "_")
}

/// How column types are inferred for a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscoveryMode {
    /// Pick a mode per table from its status and indexes
    #[default]
    Auto,
    /// Key attributes plus a light sample
    Hints,
    /// Full sample at the configured size
    Sampling,
    /// Key attributes only, no sampling
    Disabled,
}

impl DiscoveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMode::Auto => "AUTO",
            DiscoveryMode::Hints => "HINTS",
            DiscoveryMode::Sampling => "SAMPLING",
            DiscoveryMode::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscoveryMode {
    type Err = KeyqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_enum_token(s).as_str() {
            "AUTO" => Ok(DiscoveryMode::Auto),
            "HINTS" => Ok(DiscoveryMode::Hints),
            "SAMPLING" => Ok(DiscoveryMode::Sampling),
            "DISABLED" => Ok(DiscoveryMode::Disabled),
            other => Err(KeyqlError::Configuration(format!(
                "unknown discovery mode '{}'",
                other
            ))),
        }
    }
}

/// How the sampling engine picks rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SampleStrategy {
    /// Scan one randomly chosen segment
    #[default]
    Random,
    /// Scan from the start of the table
    Sequential,
    /// Same as `Sequential`; recency needs a timestamp attribute the store does not guarantee
    Recent,
}

impl SampleStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleStrategy::Random => "RANDOM",
            SampleStrategy::Sequential => "SEQUENTIAL",
            SampleStrategy::Recent => "RECENT",
        }
    }
}

impl fmt::Display for SampleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SampleStrategy {
    type Err = KeyqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_enum_token(s).as_str() {
            "RANDOM" => Ok(SampleStrategy::Random),
            "SEQUENTIAL" => Ok(SampleStrategy::Sequential),
            "RECENT" => Ok(SampleStrategy::Recent),
            other => Err(KeyqlError::Configuration(format!(
                "unknown sample strategy '{}'",
                other
            ))),
        }
    }
}

/// When and which tables are warmed ahead of demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreloadStrategy {
    Startup,
    PatternBased,
    Scheduled,
    Reactive,
    #[default]
    None,
}

impl PreloadStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreloadStrategy::Startup => "STARTUP",
            PreloadStrategy::PatternBased => "PATTERN_BASED",
            PreloadStrategy::Scheduled => "SCHEDULED",
            PreloadStrategy::Reactive => "REACTIVE",
            PreloadStrategy::None => "NONE",
        }
    }
}

impl fmt::Display for PreloadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreloadStrategy {
    type Err = KeyqlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_enum_token(s).as_str() {
            "STARTUP" => Ok(PreloadStrategy::Startup),
            "PATTERN_BASED" | "PATTERNBASED" => Ok(PreloadStrategy::PatternBased),
            "SCHEDULED" => Ok(PreloadStrategy::Scheduled),
            "REACTIVE" => Ok(PreloadStrategy::Reactive),
            "NONE" => Ok(PreloadStrategy::None),
            other => Err(KeyqlError::Configuration(format!(
                "unknown preload strategy '{}'",
                other
            ))),
        }
    }
}

/// Sample sizing used by AUTO mode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoModeTuning {
    /// Fraction of the configured sample size for tables without secondary indexes
    pub base_ratio: f64,
    /// Fraction of the configured sample size for tables with secondary indexes
    pub indexed_ratio: f64,
    /// Cap applied to the indexed sample size
    pub indexed_cap: usize,
}

impl Default for AutoModeTuning {
    fn default() -> Self {
        Self {
            base_ratio: 0.5,
            indexed_ratio: 0.75,
            indexed_cap: 750,
        }
    }
}

impl AutoModeTuning {
    /// Effective AUTO sample size for a ready table
    pub fn sample_size(&self, configured: usize, has_secondary_indexes: bool) -> usize {
        let size = if has_secondary_indexes {
            ((configured as f64 * self.indexed_ratio) as usize).min(self.indexed_cap)
        } else {
            (configured as f64 * self.base_ratio) as usize
        };
        size.clamp(MIN_SAMPLE_SIZE, MAX_SAMPLE_SIZE)
    }
}

/// Sample size used by HINTS mode for a configured sample size
pub fn hints_sample_size(configured: usize) -> usize {
    (configured / HINTS_SAMPLE_DIVISOR).clamp(MIN_SAMPLE_SIZE, HINTS_SAMPLE_CAP)
}

/// Schema discovery settings
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    pub mode: DiscoveryMode,
    pub sample_size: usize,
    pub sample_strategy: SampleStrategy,
    pub auto_tuning: AutoModeTuning,
    /// Maximum tables discovered concurrently by the orchestrator
    pub max_concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            mode: DiscoveryMode::default(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            sample_strategy: SampleStrategy::default(),
            auto_tuning: AutoModeTuning::default(),
            max_concurrency: DEFAULT_DISCOVERY_CONCURRENCY,
        }
    }
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: DiscoveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the sample size, clamped to the supported range
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size.clamp(MIN_SAMPLE_SIZE, MAX_SAMPLE_SIZE);
        self
    }

    pub fn with_sample_strategy(mut self, strategy: SampleStrategy) -> Self {
        self.sample_strategy = strategy;
        self
    }

    pub fn with_auto_tuning(mut self, tuning: AutoModeTuning) -> Self {
        self.auto_tuning = tuning;
        self
    }

    /// Set the discovery fan-out, clamped to `[1, MAX_DISCOVERY_CONCURRENCY]`
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = clamp_concurrency(max_concurrency);
        self
    }
}

/// Schema cache settings
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaCacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: DEFAULT_SCHEMA_CACHE_TTL,
        }
    }
}

impl SchemaCacheConfig {
    pub fn new(ttl: Duration) -> Self {
        Self { enabled: true, ttl }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Preloading settings
#[derive(Debug, Clone, PartialEq)]
pub struct PreloadConfig {
    pub strategy: PreloadStrategy,
    pub startup_tables: Vec<String>,
    pub scheduled_interval: Duration,
    pub max_batch_size: usize,
    pub pattern_recognition: bool,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            strategy: PreloadStrategy::default(),
            startup_tables: Vec::new(),
            scheduled_interval: DEFAULT_PRELOAD_INTERVAL,
            max_batch_size: DEFAULT_PRELOAD_BATCH_SIZE,
            pattern_recognition: true,
        }
    }
}

impl PreloadConfig {
    pub fn new(strategy: PreloadStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    pub fn with_startup_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.startup_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scheduled_interval(mut self, interval: Duration) -> Self {
        self.scheduled_interval = interval;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    pub fn with_pattern_recognition(mut self, enabled: bool) -> Self {
        self.pattern_recognition = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.strategy != PreloadStrategy::None
    }
}

/// Offset-to-continuation-token cache settings
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetCacheConfig {
    pub enabled: bool,
    /// Maximum checkpoints kept per query pattern
    pub max_size: usize,
    /// Checkpoints are only taken at multiples of this offset
    pub interval: u64,
    pub ttl: Duration,
}

impl Default for OffsetCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: DEFAULT_OFFSET_CACHE_MAX_SIZE,
            interval: DEFAULT_OFFSET_CACHE_INTERVAL,
            ttl: DEFAULT_OFFSET_CACHE_TTL,
        }
    }
}

impl OffsetCacheConfig {
    pub fn new(max_size: usize, interval: u64, ttl: Duration) -> Self {
        Self {
            enabled: true,
            max_size: max_size.max(1),
            interval: interval.max(1),
            ttl,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn ttl_millis(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

/// Complete configuration snapshot for one keyql instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyqlConfig {
    pub discovery: DiscoveryConfig,
    pub schema_cache: SchemaCacheConfig,
    pub preload: PreloadConfig,
    pub offset_cache: OffsetCacheConfig,
}

impl KeyqlConfig {
    /// Build a snapshot from connection-style properties.
    ///
    /// Keys are matched case-insensitively. Unknown keys are ignored and
    /// invalid values fall back to their defaults with a warning.
    pub fn from_properties(properties: &HashMap<String, String>) -> Self {
        let props: HashMap<String, &str> = properties
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
            .collect();
        let get = |key: &str| props.get(&key.to_ascii_lowercase()).copied();

        let mut config = KeyqlConfig::default();

        if let Some(raw) = get("schemaDiscovery") {
            config.discovery.mode = parse_enum_or_default("schemaDiscovery", raw);
        }
        if let Some(raw) = get("sampleSize") {
            config.discovery.sample_size = parse_sample_size(raw);
        }
        if let Some(raw) = get("sampleStrategy") {
            config.discovery.sample_strategy = parse_enum_or_default("sampleStrategy", raw);
        }
        if let Some(raw) = get("discoveryConcurrency") {
            config.discovery.max_concurrency = clamp_concurrency(parse_positive_or_default(
                "discoveryConcurrency",
                raw,
                DEFAULT_DISCOVERY_CONCURRENCY,
            ));
        }

        if let Some(raw) = get("schemaCache") {
            config.schema_cache.enabled = parse_bool_or_default("schemaCache", raw, true);
        }
        if let Some(raw) = get("schemaCacheTTL") {
            config.schema_cache.ttl =
                parse_seconds_or_default("schemaCacheTTL", raw, DEFAULT_SCHEMA_CACHE_TTL);
        }

        if let Some(raw) = get("preloadStrategy") {
            config.preload.strategy = parse_enum_or_default("preloadStrategy", raw);
        }
        if let Some(raw) = get("preloadStartupTables") {
            config.preload.startup_tables = parse_table_list(raw);
        }
        if let Some(raw) = get("preloadScheduledInterval") {
            config.preload.scheduled_interval = parse_seconds_or_default(
                "preloadScheduledInterval",
                raw,
                DEFAULT_PRELOAD_INTERVAL,
            );
        }
        if let Some(raw) = get("preloadMaxBatchSize") {
            config.preload.max_batch_size =
                parse_positive_or_default("preloadMaxBatchSize", raw, DEFAULT_PRELOAD_BATCH_SIZE);
        }
        if let Some(raw) = get("preloadPatternRecognition") {
            config.preload.pattern_recognition =
                parse_bool_or_default("preloadPatternRecognition", raw, true);
        }

        if let Some(raw) = get("offsetCacheEnabled") {
            config.offset_cache.enabled = parse_bool_or_default("offsetCacheEnabled", raw, true);
        }
        if let Some(raw) = get("offsetCacheMaxSize") {
            config.offset_cache.max_size =
                parse_positive_or_default("offsetCacheMaxSize", raw, DEFAULT_OFFSET_CACHE_MAX_SIZE);
        }
        if let Some(raw) = get("offsetCacheInterval") {
            config.offset_cache.interval = parse_positive_or_default(
                "offsetCacheInterval",
                raw,
                DEFAULT_OFFSET_CACHE_INTERVAL as usize,
            ) as u64;
        }
        if let Some(raw) = get("offsetCacheTTL") {
            config.offset_cache.ttl =
                parse_seconds_or_default("offsetCacheTTL", raw, DEFAULT_OFFSET_CACHE_TTL);
        }

        config
    }

    /// Build a snapshot from a TOML document.
    ///
    /// Keys are the same as for [`KeyqlConfig::from_properties`] and may sit
    /// at the top level or inside one level of tables. A document that fails
    /// to parse yields the default snapshot.
    pub fn from_toml_str(source: &str) -> Self {
        match source.parse::<toml::Table>() {
            Ok(table) => {
                let mut properties = HashMap::new();
                flatten_toml(&table, &mut properties);
                Self::from_properties(&properties)
            }
            Err(e) => {
                tracing::warn!(error = %e, "invalid keyql configuration document, using defaults");
                Self::default()
            }
        }
    }
}

fn flatten_toml(table: &toml::Table, out: &mut HashMap<String, String>) {
    for (key, value) in table {
        match value {
            toml::Value::Table(nested) => flatten_toml(nested, out),
            toml::Value::String(s) => {
                out.insert(key.clone(), s.clone());
            }
            toml::Value::Array(items) => {
                let joined = items
                    .iter()
                    .map(|v| match v {
                        toml::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                out.insert(key.clone(), joined);
            }
            other => {
                out.insert(key.clone(), other.to_string());
            }
        }
    }
}

/// Parse a sample size, clamping to `[MIN_SAMPLE_SIZE, MAX_SAMPLE_SIZE]`.
///
/// Unparsable input yields [`DEFAULT_SAMPLE_SIZE`].
pub fn parse_sample_size(raw: &str) -> usize {
    match raw.trim().parse::<i64>() {
        Ok(n) => {
            let clamped = n.clamp(MIN_SAMPLE_SIZE as i64, MAX_SAMPLE_SIZE as i64) as usize;
            if clamped as i64 != n {
                tracing::warn!(requested = n, effective = clamped, "sample size out of range, clamped");
            }
            clamped
        }
        Err(_) => {
            tracing::warn!(
                value = %raw,
                default = DEFAULT_SAMPLE_SIZE,
                "invalid sample size, using default"
            );
            DEFAULT_SAMPLE_SIZE
        }
    }
}

fn parse_enum_or_default<T>(key: &str, raw: &str) -> T
where
    T: FromStr<Err = KeyqlError> + Default + fmt::Display,
{
    raw.parse::<T>().unwrap_or_else(|e| {
        let default = T::default();
        tracing::warn!(key, value = %raw, default = %default, error = %e, "invalid configuration value, using default");
        default
    })
}

fn parse_bool_or_default(key: &str, raw: &str, default: bool) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => true,
        "false" | "no" | "off" | "0" => false,
        _ => {
            tracing::warn!(key, value = %raw, default, "invalid boolean, using default");
            default
        }
    }
}

fn parse_positive_or_default(key: &str, raw: &str, default: usize) -> usize {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => n,
        _ => {
            tracing::warn!(key, value = %raw, default, "expected a positive integer, using default");
            default
        }
    }
}

/// Clamp a discovery fan-out to `[1, MAX_DISCOVERY_CONCURRENCY]`
pub fn clamp_concurrency(requested: usize) -> usize {
    let clamped = requested.clamp(1, MAX_DISCOVERY_CONCURRENCY);
    if clamped != requested {
        tracing::warn!(requested, effective = clamped, "discovery concurrency out of range, clamped");
    }
    clamped
}

fn parse_seconds_or_default(key: &str, raw: &str, default: Duration) -> Duration {
    match raw.trim().parse::<i64>() {
        Ok(n) if n > MAX_CONFIG_DURATION.as_secs() as i64 => {
            tracing::warn!(key, value = %raw, default_secs = default.as_secs(), "duration too long, using default");
            default
        }
        Ok(n) if n >= 0 => Duration::from_secs(n as u64),
        // Negative TTLs are honoured as "never valid" by the caches
        Ok(_) => Duration::ZERO,
        Err(_) => {
            tracing::warn!(key, value = %raw, default_secs = default.as_secs(), "invalid duration, using default");
            default
        }
    }
}

fn parse_table_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
