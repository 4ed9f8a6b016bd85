//! Session configuration and timezone resolution.

use std::collections::HashMap;
use std::time::Duration;

use chrono_tz::Tz;
use tracing::warn;

use crate::deadline::Deadline;
use crate::error::{DriverError, Result};

pub const OPT_SESSION_TIMEZONE: &str = "session_timezone";
pub const OPT_INCLUDE_CUSTOMER_DETAIL: &str = "include_customer_detail_in_reason";
pub const OPT_SERVER_QUERY_TIMEOUT_MS: &str = "server_query_timeout_ms";
pub const OPT_LOCAL_ENFORCEMENT_SLACK_MS: &str = "local_enforcement_slack_ms";

/// Recognized session options, validated once at construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// IANA zone name used to detect framework-injected calendars.
    pub session_timezone: Option<String>,
    /// Include DETAIL/HINT/QUERY sections in the short error rendering.
    pub include_customer_detail_in_reason: bool,
    /// Server-side query timeout; 0 means infinite.
    pub server_query_timeout_ms: u32,
    /// Slack added to the server timeout to form the local deadline.
    pub local_enforcement_slack_ms: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timezone: None,
            include_customer_detail_in_reason: true,
            server_query_timeout_ms: 0,
            local_enforcement_slack_ms: 5000,
        }
    }
}

impl SessionConfig {
    /// Parses the recognized options from a string map. Unknown keys are
    /// ignored; malformed values are configuration errors.
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(zone) = options.get(OPT_SESSION_TIMEZONE)
            && !zone.is_empty()
        {
            config.session_timezone = Some(zone.clone());
        }
        if let Some(value) = options.get(OPT_INCLUDE_CUSTOMER_DETAIL) {
            config.include_customer_detail_in_reason = parse_bool(OPT_INCLUDE_CUSTOMER_DETAIL, value)?;
        }
        if let Some(value) = options.get(OPT_SERVER_QUERY_TIMEOUT_MS) {
            config.server_query_timeout_ms = parse_u32(OPT_SERVER_QUERY_TIMEOUT_MS, value)?;
        }
        if let Some(value) = options.get(OPT_LOCAL_ENFORCEMENT_SLACK_MS) {
            config.local_enforcement_slack_ms = parse_u32(OPT_LOCAL_ENFORCEMENT_SLACK_MS, value)?;
        }
        Ok(config)
    }

    /// The session timezone, falling back to the platform default when the
    /// option is absent, empty, or not a known IANA name.
    pub fn resolve_session_timezone(&self) -> Tz {
        match self.session_timezone.as_deref() {
            None | Some("") => platform_timezone(),
            Some(name) => match name.parse::<Tz>() {
                Ok(tz) => tz,
                Err(_) => {
                    warn!("unknown session timezone {name:?}, using platform default");
                    platform_timezone()
                }
            },
        }
    }

    /// Local deadline for a query: server timeout plus enforcement slack.
    /// An infinite server timeout yields a practically unbounded deadline.
    pub fn local_deadline(&self) -> Deadline {
        if self.server_query_timeout_ms == 0 {
            Deadline::after(Duration::ZERO)
        } else {
            Deadline::after(Duration::from_millis(
                u64::from(self.server_query_timeout_ms)
                    + u64::from(self.local_enforcement_slack_ms),
            ))
        }
    }
}

/// The host's zone as an IANA name, or UTC when it cannot be determined.
pub fn platform_timezone() -> Tz {
    iana_time_zone::get_timezone()
        .ok()
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .map_err(|_| DriverError::Configuration(format!("{key} expects true/false, got {value:?}")))
}

fn parse_u32(key: &str, value: &str) -> Result<u32> {
    value
        .parse::<u32>()
        .map_err(|_| DriverError::Configuration(format!("{key} expects an integer, got {value:?}")))
}
