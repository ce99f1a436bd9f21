//! Configuration types for the extraction pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Provider credentials are not part of this
//! struct: the OCR client and the language model are constructed separately
//! and handed to [`crate::Pipeline::new`].

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// File extensions picked up by a batch run.
pub const DEFAULT_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

/// Configuration for the analysis → correction → extraction pipeline.
///
/// # Example
/// ```rust
/// use scan2csv::{PipelineConfig, RetryPolicy};
///
/// let config = PipelineConfig::builder()
///     .extraction_max_tokens(1500)
///     .retry_policy(RetryPolicy::default().max_attempts(3))
///     .build()
///     .unwrap();
/// assert_eq!(config.retry.max_attempts, 3);
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Response budget for each per-page correction call. Default: 800.
    pub correction_max_tokens: usize,

    /// Response budget for the extraction call. Default: 2000.
    ///
    /// A 150-field schema serialised as JSON needs roughly 1 500 tokens.
    pub extraction_max_tokens: usize,

    /// Sampling temperature for both model calls. Default: 0.1.
    pub temperature: f32,

    /// Retry policy for the extraction call.
    pub retry: RetryPolicy,

    /// Custom correction prompt. If None, uses the built-in one.
    pub correction_prompt: Option<String>,

    /// Skip the correction pass and extract from raw OCR text. Default: false.
    pub skip_correction: bool,

    /// File extensions (lowercase, without the dot) a batch run processes.
    pub extensions: Vec<String>,

    /// Descend into subdirectories during a batch run. Default: true.
    pub recursive: bool,

    /// Optional progress callback for batch runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            correction_max_tokens: 800,
            extraction_max_tokens: 2000,
            temperature: 0.1,
            retry: RetryPolicy::default(),
            correction_prompt: None,
            skip_correction: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            recursive: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("correction_max_tokens", &self.correction_max_tokens)
            .field("extraction_max_tokens", &self.extraction_max_tokens)
            .field("temperature", &self.temperature)
            .field("retry", &self.retry)
            .field("skip_correction", &self.skip_correction)
            .field("extensions", &self.extensions)
            .field("recursive", &self.recursive)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn BatchProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// True if `ext` (any case, no dot) is on the allow-list.
    pub fn accepts_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn correction_max_tokens(mut self, n: usize) -> Self {
        self.config.correction_max_tokens = n;
        self
    }

    pub fn extraction_max_tokens(mut self, n: usize) -> Self {
        self.config.extraction_max_tokens = n;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn correction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.correction_prompt = Some(prompt.into());
        self
    }

    pub fn skip_correction(mut self, v: bool) -> Self {
        self.config.skip_correction = v;
        self
    }

    pub fn extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn recursive(mut self, v: bool) -> Self {
        self.config.recursive = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.retry.max_attempts == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_attempts must be ≥ 1".into(),
            ));
        }
        if c.correction_max_tokens == 0 || c.extraction_max_tokens == 0 {
            return Err(PipelineError::InvalidConfig(
                "token budgets must be ≥ 1".into(),
            ));
        }
        if c.extensions.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one file extension is required".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Retry policy ─────────────────────────────────────────────────────────

/// Why a single extraction attempt did not produce a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The provider call failed outright (the "null response" case).
    NoResponse(String),
    /// The provider answered with an empty completion.
    EmptyResponse,
    /// The completion was not a JSON object.
    Unparseable(String),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::NoResponse(e) => write!(f, "no response: {e}"),
            AttemptFailure::EmptyResponse => f.write_str("empty response"),
            AttemptFailure::Unparseable(e) => write!(f, "unparseable response: {e}"),
        }
    }
}

/// Delay between extraction attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backoff {
    /// Retry immediately. (default)
    #[default]
    None,
    /// Wait the same number of milliseconds before every retry.
    Fixed(u64),
    /// Wait `base_ms * 2^(retry - 1)` milliseconds: 500 → 1 000 → 2 000 …
    Exponential { base_ms: u64 },
}

impl Backoff {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(ms) => Duration::from_millis(ms),
            Backoff::Exponential { base_ms } => {
                let factor = 2u64.saturating_pow(retry.saturating_sub(1));
                Duration::from_millis(base_ms.saturating_mul(factor))
            }
        }
    }
}

/// Predicate deciding whether a failed attempt is worth repeating.
pub type RetryPredicate = Arc<dyn Fn(&AttemptFailure) -> bool + Send + Sync>;

/// Bounded retry for the extraction call.
///
/// The default repeats the identical request up to 5 times in total with no
/// delay and retries every kind of failure.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first. Default: 5.
    pub max_attempts: u32,
    pub backoff: Backoff,
    retry_if: Option<RetryPredicate>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Backoff::None,
            retry_if: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("retry_if", &self.retry_if.as_ref().map(|_| "<predicate>"))
            .finish()
    }
}

impl RetryPolicy {
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AttemptFailure) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Some(Arc::new(predicate));
        self
    }

    /// Whether another attempt should follow `failure`, given that
    /// `attempts_made` calls have been issued so far.
    pub fn should_retry(&self, failure: &AttemptFailure, attempts_made: u32) -> bool {
        if attempts_made >= self.max_attempts {
            return false;
        }
        match &self.retry_if {
            Some(pred) => pred(failure),
            None => true,
        }
    }
}
