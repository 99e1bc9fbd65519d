// crates/core/src/usage.rs
//! Token usage against a plan's per-window limit.

use crate::error::ConfigError;
use crate::types::SessionWindow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

/// Subscription plan, which fixes the token limit per 5-hour window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Plan {
    #[default]
    Pro,
    Max5,
    Max20,
    Custom(u64),
}

impl Plan {
    pub fn token_limit(&self) -> u64 {
        match self {
            Plan::Pro => 19_000,
            Plan::Max5 => 88_000,
            Plan::Max20 => 220_000,
            Plan::Custom(n) => *n,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Pro => write!(f, "pro"),
            Plan::Max5 => write!(f, "max5"),
            Plan::Max20 => write!(f, "max20"),
            Plan::Custom(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for Plan {
    type Err = ConfigError;

    /// Accepts `pro`, `max5`, `max20` (case-insensitive) or a bare token count.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "pro" => Ok(Plan::Pro),
            "max5" | "max-5" => Ok(Plan::Max5),
            "max20" | "max-20" => Ok(Plan::Max20),
            other => other
                .parse::<u64>()
                .ok()
                .filter(|n| *n > 0)
                .map(Plan::Custom)
                .ok_or_else(|| ConfigError::UnknownPlan(s.to_string())),
        }
    }
}

/// Token usage in the current window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../bindings/"))]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    #[ts(type = "number")]
    pub used: u64,
    #[ts(type = "number")]
    pub limit: u64,
    #[ts(type = "number")]
    pub available: u64,
    pub usage_percent: f64,
    pub rate_per_minute: f64,
    #[ts(type = "number | null")]
    pub window_start: Option<i64>,
    #[ts(type = "number | null")]
    pub window_end: Option<i64>,
    #[ts(type = "number | null")]
    pub reset_time: Option<i64>,
    #[ts(type = "number")]
    pub active_sessions: u64,
    pub is_window_active: bool,
}

/// Compute usage from the latest window at `now` (unix seconds).
///
/// A window that ended at or before `now` no longer counts: usage is zero and
/// no bounds are reported.
pub fn compute_usage(
    limit: u64,
    latest_window: Option<&SessionWindow>,
    active_sessions: u64,
    now: i64,
) -> TokenUsage {
    let current = latest_window.filter(|w| w.window_end > now);

    let Some(window) = current else {
        return TokenUsage {
            used: 0,
            limit,
            available: limit,
            usage_percent: 0.0,
            rate_per_minute: 0.0,
            window_start: None,
            window_end: None,
            reset_time: None,
            active_sessions,
            is_window_active: false,
        };
    };

    let used = window.total_tokens.max(0) as u64;
    let usage_percent = if limit == 0 {
        0.0
    } else {
        used as f64 / limit as f64 * 100.0
    };

    let elapsed_secs = (now.min(window.window_end) - window.window_start).max(60);
    let rate_per_minute = used as f64 / (elapsed_secs as f64 / 60.0);

    TokenUsage {
        used,
        limit,
        available: limit.saturating_sub(used),
        usage_percent,
        rate_per_minute,
        window_start: Some(window.window_start),
        window_end: Some(window.window_end),
        reset_time: Some(window.reset_time),
        active_sessions,
        is_window_active: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WINDOW_SECONDS;

    fn window(start: i64, total: i64) -> SessionWindow {
        SessionWindow {
            id: 1,
            window_start: start,
            window_end: start + WINDOW_SECONDS,
            reset_time: start + WINDOW_SECONDS,
            total_input_tokens: total / 2,
            total_output_tokens: total - total / 2,
            total_tokens: total,
            message_count: 3,
            session_count: 1,
            is_active: true,
        }
    }

    #[test]
    fn test_usage_within_window() {
        let w = window(1_000, 1_500);
        let usage = compute_usage(19_000, Some(&w), 2, 1_000 + 600);
        assert_eq!(usage.used, 1_500);
        assert_eq!(usage.available, 17_500);
        assert_eq!(usage.rate_per_minute, 150.0);
        assert!((usage.usage_percent - 7.894736).abs() < 1e-4);
        assert_eq!(usage.window_start, Some(1_000));
        assert_eq!(usage.reset_time, Some(1_000 + WINDOW_SECONDS));
        assert_eq!(usage.active_sessions, 2);
        assert!(usage.is_window_active);
    }

    #[test]
    fn test_usage_over_limit_saturates() {
        let w = window(0, 30_000);
        let usage = compute_usage(19_000, Some(&w), 1, 100);
        assert_eq!(usage.available, 0);
        assert!(usage.usage_percent > 100.0);
    }

    #[test]
    fn test_rate_elapsed_clamped_to_one_minute() {
        let w = window(1_000, 120);
        let usage = compute_usage(19_000, Some(&w), 1, 1_000);
        assert_eq!(usage.rate_per_minute, 120.0);
    }

    #[test]
    fn test_expired_window_counts_nothing() {
        let w = window(0, 5_000);
        let usage = compute_usage(88_000, Some(&w), 0, WINDOW_SECONDS);
        assert_eq!(usage.used, 0);
        assert_eq!(usage.available, 88_000);
        assert_eq!(usage.window_start, None);
        assert!(!usage.is_window_active);
    }

    #[test]
    fn test_no_window() {
        let usage = compute_usage(220_000, None, 0, 42);
        assert_eq!(usage.used, 0);
        assert_eq!(usage.limit, 220_000);
        assert_eq!(usage.rate_per_minute, 0.0);
    }

    #[test]
    fn test_plan_from_str() {
        assert_eq!("pro".parse::<Plan>(), Ok(Plan::Pro));
        assert_eq!("MAX5".parse::<Plan>(), Ok(Plan::Max5));
        assert_eq!("max20".parse::<Plan>(), Ok(Plan::Max20));
        assert_eq!("50000".parse::<Plan>(), Ok(Plan::Custom(50_000)));
        assert_eq!(
            "enterprise".parse::<Plan>(),
            Err(ConfigError::UnknownPlan("enterprise".to_string()))
        );
        assert!("0".parse::<Plan>().is_err());
        assert_eq!(Plan::Max5.to_string(), "max5");
        assert_eq!(Plan::Custom(7).token_limit(), 7);
    }
}
