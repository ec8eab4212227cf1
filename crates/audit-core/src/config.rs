//! Engine configuration
//!
//! [`AuditConfig`] bundles everything a deployment tunes: report layout,
//! sheet limits, filter policy, job budget and scheduler window. Every field
//! has a default, so an empty TOML document is a valid configuration.
//!
//! ```toml
//! filter = "groups-only"
//!
//! [layout]
//! page_size = 25
//! permissions = ["Read", "Write"]
//!
//! [sheet]
//! max_rows = 100
//!
//! [job]
//! timeout_secs = 60
//! ```

use crate::error::ConfigError;
use crate::filter::FilterPolicy;
use crate::report::BANNER_WIDTH;
use crate::settings::ReportLayoutSettings;
use audit_sheet::{GridMode, SheetLimits, VirtualGrid, MAX_COLS_PER_SHEET, MAX_ROWS_PER_SHEET};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Report layout
    pub layout: ReportLayoutSettings,
    /// Artifact sheet limits
    pub sheet: SheetConfig,
    /// Principal filter
    pub filter: FilterPolicy,
    /// Per-job budget
    pub job: JobConfig,
    /// Hosting scheduler
    pub scheduler: SchedulerConfig,
}

impl AuditConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// - `ConfigError::Parse` for malformed TOML or unknown keys
    /// - any validation error from [`validate`](Self::validate)
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - as [`from_toml_str`](Self::from_toml_str)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Check all sections
    ///
    /// # Errors
    /// - layout errors from [`ReportLayoutSettings::validate`]
    /// - `ConfigError::Limits` for zero sheet limits
    /// - `ConfigError::SheetTooNarrow` if the banner row does not fit a sheet
    /// - `ConfigError::TooManyColumns` if a row cannot fit a single sheet
    /// - job and scheduler errors from [`JobConfig::validate`] and
    ///   [`SchedulerConfig::validate`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        self.scheduler.validate()?;
        self.job.validate(&self.scheduler)?;
        let limits = self.sheet.limits()?;
        if limits.max_cols < BANNER_WIDTH {
            return Err(ConfigError::SheetTooNarrow {
                max_cols: limits.max_cols,
                required: BANNER_WIDTH,
            });
        }
        let columns = self.layout.columns().len();
        if self.sheet.grid_mode == GridMode::SingleSheet && columns > limits.max_cols {
            return Err(ConfigError::TooManyColumns {
                columns,
                max_cols: limits.max_cols,
            });
        }
        Ok(())
    }

    /// Validated sheet limits
    ///
    /// # Errors
    /// - `ConfigError::Limits` for zero limits
    pub fn sheet_limits(&self) -> Result<SheetLimits, ConfigError> {
        self.sheet.limits()
    }

    /// Grid for the configured limits and mode
    ///
    /// # Errors
    /// - `ConfigError::Limits` for zero limits
    pub fn grid(&self) -> Result<VirtualGrid, ConfigError> {
        Ok(VirtualGrid::new(self.sheet.limits()?, self.sheet.grid_mode))
    }
}

/// Sheet limits section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetConfig {
    /// Columns per sheet
    pub max_cols: usize,
    /// Rows per sheet
    pub max_rows: usize,
    /// Column overflow handling
    pub grid_mode: GridMode,
}

impl SheetConfig {
    /// Validated limits
    ///
    /// # Errors
    /// - `ConfigError::Limits` if either value is zero
    pub fn limits(&self) -> Result<SheetLimits, ConfigError> {
        Ok(SheetLimits::new(self.max_cols, self.max_rows)?)
    }
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            max_cols: MAX_COLS_PER_SHEET,
            max_rows: MAX_ROWS_PER_SHEET,
            grid_mode: GridMode::default(),
        }
    }
}

/// Job budget section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    /// Requested processing budget in seconds
    pub timeout_secs: u64,
    /// Time kept back from the scheduler window, in milliseconds
    pub safety_margin_ms: u64,
}

impl JobConfig {
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[inline]
    #[must_use]
    pub fn safety_margin(&self) -> Duration {
        Duration::from_millis(self.safety_margin_ms)
    }

    /// Check the margin leaves processing time inside `scheduler`'s window
    ///
    /// # Errors
    /// - `ConfigError::ZeroSafetyMargin` if the margin is zero
    /// - `ConfigError::MarginExceedsWindow` if the margin is not below the window
    pub fn validate(&self, scheduler: &SchedulerConfig) -> Result<(), ConfigError> {
        if self.safety_margin_ms == 0 {
            return Err(ConfigError::ZeroSafetyMargin);
        }
        let window = scheduler.transaction_timeout();
        if self.safety_margin() >= window {
            return Err(ConfigError::MarginExceedsWindow {
                margin_ms: self.safety_margin_ms,
                window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            });
        }
        Ok(())
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            safety_margin_ms: 5_000,
        }
    }
}

/// Scheduler section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Transactional window granted to each job, in seconds
    pub transaction_timeout_secs: u64,
    /// Jobs allowed to run at once
    pub max_concurrent: usize,
}

impl SchedulerConfig {
    #[inline]
    #[must_use]
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_secs(self.transaction_timeout_secs)
    }

    /// # Errors
    /// - `ConfigError::NoConcurrency` if `max_concurrent` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::NoConcurrency);
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            transaction_timeout_secs: 600,
            max_concurrent: 4,
        }
    }
}
