use chrono::FixedOffset;
use servicedesk_calendar::CalendarConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Minimum spacing between manual calendar syncs per user (default: `300`).
    pub sync_cooldown_secs: u64,
    /// Offset in which appointment dates/times and busy-block dates are read.
    pub schedule_offset: FixedOffset,
    /// Calendar integration settings.
    pub calendar: CalendarConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `HOST`                        | `0.0.0.0`               |
    /// | `PORT`                        | `3000`                  |
    /// | `CORS_ORIGINS`                | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`        | `30`                    |
    /// | `CALENDAR_SYNC_COOLDOWN_SECS` | `300`                   |
    /// | `SCHEDULE_UTC_OFFSET`         | `+00:00`                |
    ///
    /// Calendar variables are documented on [`CalendarConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let sync_cooldown_secs: u64 = std::env::var("CALENDAR_SYNC_COOLDOWN_SECS")
            .unwrap_or_else(|_| "300".into())
            .parse()
            .expect("CALENDAR_SYNC_COOLDOWN_SECS must be a valid u64");

        let schedule_offset = parse_utc_offset(
            &std::env::var("SCHEDULE_UTC_OFFSET").unwrap_or_else(|_| "+00:00".into()),
        )
        .expect("SCHEDULE_UTC_OFFSET must look like +07:00 or -05:30");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            sync_cooldown_secs,
            schedule_offset,
            calendar: CalendarConfig::from_env(),
        }
    }
}

/// Parse `Z`, `UTC`, or a signed `HH:MM` offset.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0);
    }
    raw.parse::<FixedOffset>().ok()
}
