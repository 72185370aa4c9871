//! Run configuration and its resolution from flags and environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::landing::LandingStrategy;
use crate::types::{parse_url, TidError, TidResult};

pub const DEFAULT_HOME_URL: &str = "https://x.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_OUTPUT_FILE: &str = "x_tid_state.json";
pub const DEFAULT_SAMPLE_METHOD: &str = "GET";
pub const DEFAULT_SAMPLE_URL: &str =
    "https://x.com/i/api/graphql/1VOOyvKkiI3FMmkeDNxM9A/UserByScreenName";

/// Environment variable naming the generator helper command.
pub const GENERATOR_ENV: &str = "XTID_GENERATOR";
/// Environment variable overriding the landing URL.
pub const HOME_URL_ENV: &str = "XTID_HOME_URL";
/// Environment variable overriding the output file.
pub const OUTPUT_ENV: &str = "XTID_OUTPUT";

/// Everything one dump run needs, apart from the generator itself.
#[derive(Debug, Clone)]
pub struct DumpConfig {
    /// Landing page to fetch.
    pub home_url: String,
    /// Timeout applied to every HTTP request.
    pub timeout: Duration,
    /// File the export record is written to.
    pub output: PathBuf,
    /// Method of the example request.
    pub sample_method: String,
    /// URL of the example request; only its path reaches the generator.
    pub sample_url: String,
    pub landing: LandingStrategy,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            home_url: DEFAULT_HOME_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            output: PathBuf::from(DEFAULT_OUTPUT_FILE),
            sample_method: DEFAULT_SAMPLE_METHOD.to_string(),
            sample_url: DEFAULT_SAMPLE_URL.to_string(),
            landing: LandingStrategy::Direct,
        }
    }
}

impl DumpConfig {
    /// Path component of the example request URL.
    pub fn sample_path(&self) -> TidResult<String> {
        Ok(parse_url(&self.sample_url)?.path().to_string())
    }

    /// Reject settings that would fail later in the run.
    pub fn validate(&self) -> TidResult<()> {
        parse_url(&self.home_url)?;
        self.sample_path()?;
        if self.timeout.is_zero() {
            return Err(TidError::Config("timeout must be greater than zero".to_string()));
        }
        if self.sample_method.trim().is_empty() {
            return Err(TidError::Config("sample method is empty".to_string()));
        }
        Ok(())
    }
}

/// Resolve the generator helper command: explicit flag, then `XTID_GENERATOR`.
pub fn resolve_generator_command(explicit: Option<&str>) -> TidResult<String> {
    resolve_generator_with(explicit, std::env::var(GENERATOR_ENV).ok())
}

fn resolve_generator_with(explicit: Option<&str>, env: Option<String>) -> TidResult<String> {
    explicit
        .map(str::to_string)
        .or(env)
        .filter(|cmd| !cmd.trim().is_empty())
        .ok_or_else(|| {
            TidError::Config(format!(
                "no transaction generator configured; pass --generator or set {GENERATOR_ENV}"
            ))
        })
}

/// Resolve the landing URL: explicit flag, then `XTID_HOME_URL`, then the default.
pub fn resolve_home_url(explicit: Option<&str>) -> String {
    resolve_home_url_with(explicit, std::env::var(HOME_URL_ENV).ok())
}

/// [`resolve_home_url`] with the `XTID_HOME_URL` value supplied by the caller.
pub fn resolve_home_url_with(explicit: Option<&str>, env: Option<String>) -> String {
    resolve_or_default(explicit, env, DEFAULT_HOME_URL)
}

/// Resolve the output file: explicit flag, then `XTID_OUTPUT`, then the default.
pub fn resolve_output_path(explicit: Option<&str>) -> PathBuf {
    resolve_output_path_with(explicit, std::env::var(OUTPUT_ENV).ok())
}

/// [`resolve_output_path`] with the `XTID_OUTPUT` value supplied by the caller.
pub fn resolve_output_path_with(explicit: Option<&str>, env: Option<String>) -> PathBuf {
    PathBuf::from(resolve_or_default(explicit, env, DEFAULT_OUTPUT_FILE))
}

fn resolve_or_default(explicit: Option<&str>, env: Option<String>, default: &str) -> String {
    if let Some(value) = explicit {
        return value.to_string();
    }
    env.filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}
