//! Token and cost accounting value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

// ============================================================================
// Token Count
// ============================================================================

/// A count of tokens.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenCount(u64);

impl TokenCount {
    /// Creates a new TokenCount.
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    /// Returns the raw count.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Formats with K/M suffixes for large numbers.
    pub fn format(&self) -> String {
        if self.0 < 1_000 {
            format!("{}", self.0)
        } else if self.0 < 10_000 {
            format!("{:.1}K", self.0 as f64 / 1_000.0)
        } else if self.0 < 1_000_000 {
            format!("{}K", self.0 / 1_000)
        } else {
            format!("{:.1}M", self.0 as f64 / 1_000_000.0)
        }
    }
}

impl Add for TokenCount {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl From<u64> for TokenCount {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl fmt::Display for TokenCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

// ============================================================================
// Money
// ============================================================================

/// Spend in USD, kept in whole microdollars so per-session sums stay exact.
///
/// Serialized as a plain dollar float, which is what agents report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Money(i64);

impl Money {
    pub fn from_usd(dollars: f64) -> Self {
        Self((dollars * 1_000_000.0).round() as i64)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Cents for normal amounts, four decimals below one cent.
    pub fn format(&self) -> String {
        let dollars = f64::from(*self);
        if self.0 > 0 && self.0 < 10_000 {
            format!("${dollars:.4}")
        } else {
            format!("${dollars:.2}")
        }
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl From<f64> for Money {
    fn from(dollars: f64) -> Self {
        Self::from_usd(dollars)
    }
}

impl From<Money> for f64 {
    fn from(money: Money) -> Self {
        money.0 as f64 / 1_000_000.0
    }
}

// ============================================================================
// Token Metrics Snapshot
// ============================================================================

/// Token and cost snapshot reported by an agent process.
///
/// Each `TokenUsage` event replaces the session's snapshot wholesale; the
/// numbers are cumulative on the agent's side.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TokenMetrics {
    /// Input tokens sent in the current context window
    pub input_tokens: TokenCount,
    /// Output tokens generated
    pub output_tokens: TokenCount,
    /// Tokens served from the prompt cache
    #[serde(default)]
    pub cache_read_tokens: TokenCount,
    /// Model context window size (0 when unknown)
    #[serde(default)]
    pub context_window: u32,
    /// Total spend so far
    #[serde(default)]
    pub total_cost: Money,
}

impl TokenMetrics {
    /// Tokens occupying the context window.
    pub fn context_tokens(&self) -> TokenCount {
        self.input_tokens + self.cache_read_tokens
    }

    /// Percentage of the context window in use (0.0 to 100.0).
    ///
    /// Returns 0.0 when the window size is unknown.
    pub fn usage_percentage(&self) -> f64 {
        if self.context_window == 0 {
            return 0.0;
        }
        let usage = self.context_tokens().as_u64() as f64 / f64::from(self.context_window);
        (usage * 100.0).min(100.0)
    }

    /// Formats for a status line, e.g. "12K in / 3.4K out $0.35".
    pub fn format_compact(&self) -> String {
        let mut out = format!(
            "{} in / {} out",
            self.context_tokens().format(),
            self.output_tokens.format()
        );
        if !self.total_cost.is_zero() {
            out.push(' ');
            out.push_str(&self.total_cost.format());
        }
        if self.context_window > 0 {
            out.push_str(&format!(" ({:.0}%)", self.usage_percentage()));
        }
        out
    }
}
