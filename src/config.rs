use crate::error::ConfigError;

use std::fs;
use std::time::Duration;

/// Acquisition order for `SessionPool::acquire`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
    Fifo,
    Lifo,
}

/// Transport security for the connection to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslType {
    None,
    Ssl,
    Tls,
}

/// 5250 screen size families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenSize {
    Size24x80,
    Size27x132,
}

impl ScreenSize {
    pub fn rows(self) -> u16 {
        match self {
            ScreenSize::Size24x80 => 24,
            ScreenSize::Size27x132 => 27,
        }
    }

    pub fn cols(self) -> u16 {
        match self {
            ScreenSize::Size24x80 => 80,
            ScreenSize::Size27x132 => 132,
        }
    }
}

/// Per-session configuration, captured immutably at `connect()`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub device_name: String,
    pub screen_size: ScreenSize,
    pub ccsid: u16,
    pub ssl_type: SslType,
    pub proxy_host: Option<String>,
    pub proxy_port: Option<u16>,
    pub queue_policy: QueuePolicy,
    pub keypad_enabled: bool,
    pub connect_timeout_ms: u64,
    pub read_timeout_ms: u64,
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 23,
            device_name: String::new(),
            screen_size: ScreenSize::Size24x80,
            ccsid: 37,
            ssl_type: SslType::None,
            proxy_host: None,
            proxy_port: None,
            queue_policy: QueuePolicy::Fifo,
            keypad_enabled: true,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 30_000,
            max_sessions: 1,
        }
    }
}

impl SessionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Validate the device name: empty (auto-assign) or 1-10 uppercase
    /// alphanumeric characters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.device_name.is_empty() {
            let len = self.device_name.len();
            let valid_chars = self
                .device_name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
            if len > 10 || !valid_chars {
                return Err(ConfigError::OutOfRange(
                    "device_name".to_string(),
                    "must be 1-10 uppercase alphanumeric characters, or empty".to_string(),
                ));
            }
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::OutOfRange(
                "max_sessions".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pool-wide configuration, shared across the sessions a `SessionPool`
/// manages.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_sessions: usize,
    pub queue_policy: QueuePolicy,
    pub default_connect_timeout_ms: u64,
    pub default_read_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_sessions: 4,
            queue_policy: QueuePolicy::Fifo,
            default_connect_timeout_ms: 5_000,
            default_read_timeout_ms: 30_000,
        }
    }
}

impl EngineConfig {
    /// Build a [`SessionConfig`] template from this engine config's
    /// timeouts and pool-wide defaults.
    pub fn session_template(&self) -> SessionConfig {
        SessionConfig {
            queue_policy: self.queue_policy,
            connect_timeout_ms: self.default_connect_timeout_ms,
            read_timeout_ms: self.default_read_timeout_ms,
            max_sessions: self.max_sessions,
            ..SessionConfig::default()
        }
    }

    pub fn load_from_file(path: &str) -> Result<(Self, SessionConfig), ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidValue("path".to_string(), e.to_string()))?;
        Self::parse(&content)
    }

    fn parse(content: &str) -> Result<(Self, SessionConfig), ConfigError> {
        let mut engine = Self::default();
        let mut session = SessionConfig::default();
        let mut current_section = String::new();

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                current_section = line[1..line.len() - 1].to_string();
                continue;
            }

            if let Some(eq_pos) = line.find('=') {
                let key = line[..eq_pos].trim();
                let value = line[eq_pos + 1..].trim().trim_matches('"');

                match current_section.as_str() {
                    "engine" => parse_engine_key(&mut engine, key, value)?,
                    "session" => parse_session_key(&mut session, key, value)?,
                    _ => return Err(ConfigError::UnknownSection(current_section.clone())),
                }
            }
        }

        Ok((engine, session))
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), value.to_string()))
}

fn parse_queue_policy(key: &str, value: &str) -> Result<QueuePolicy, ConfigError> {
    match value {
        "fifo" => Ok(QueuePolicy::Fifo),
        "lifo" => Ok(QueuePolicy::Lifo),
        _ => Err(ConfigError::InvalidValue(key.to_string(), value.to_string())),
    }
}

fn parse_engine_key(engine: &mut EngineConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "max_sessions" => engine.max_sessions = parse_usize(key, value)?,
        "queue_policy" => engine.queue_policy = parse_queue_policy(key, value)?,
        "default_connect_timeout_ms" => engine.default_connect_timeout_ms = parse_u64(key, value)?,
        "default_read_timeout_ms" => engine.default_read_timeout_ms = parse_u64(key, value)?,
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    }
    Ok(())
}

fn parse_session_key(session: &mut SessionConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "host" => session.host = value.to_string(),
        "port" => session.port = parse_u16(key, value)?,
        "device_name" => session.device_name = value.to_string(),
        "screen_size" => {
            session.screen_size = match value {
                "24x80" => ScreenSize::Size24x80,
                "27x132" => ScreenSize::Size27x132,
                _ => return Err(ConfigError::InvalidValue(key.to_string(), value.to_string())),
            };
        }
        "ccsid" => session.ccsid = parse_u16(key, value)?,
        "ssl_type" => {
            session.ssl_type = match value {
                "none" => SslType::None,
                "ssl" => SslType::Ssl,
                "tls" => SslType::Tls,
                _ => return Err(ConfigError::InvalidValue(key.to_string(), value.to_string())),
            };
        }
        "proxy_host" => {
            session.proxy_host = if value.is_empty() { None } else { Some(value.to_string()) };
        }
        "proxy_port" => {
            session.proxy_port = if value.is_empty() { None } else { Some(parse_u16(key, value)?) };
        }
        "queue_policy" => session.queue_policy = parse_queue_policy(key, value)?,
        "keypad_enabled" => session.keypad_enabled = parse_bool(key, value)?,
        "connect_timeout_ms" => session.connect_timeout_ms = parse_u64(key, value)?,
        "read_timeout_ms" => session.read_timeout_ms = parse_u64(key, value)?,
        "max_sessions" => session.max_sessions = parse_usize(key, value)?,
        _ => return Err(ConfigError::UnknownKey(key.to_string())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_session_config_matches_spec_defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.port, 23);
        assert_eq!(cfg.ccsid, 37);
        assert_eq!(cfg.screen_size, ScreenSize::Size24x80);
        assert_eq!(cfg.queue_policy, QueuePolicy::Fifo);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn overlong_device_name_is_rejected() {
        let mut cfg = SessionConfig::default();
        cfg.device_name = "TOOLONGDEVICENAME".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn lowercase_device_name_is_rejected() {
        let mut cfg = SessionConfig::default();
        cfg.device_name = "dev001".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_key_value_config_text() {
        let text = r#"
[engine]
max_sessions = 8
queue_policy = "lifo"

[session]
host = "as400.example.com"
port = 992
device_name = "DEV001"
screen_size = "27x132"
ccsid = 500
ssl_type = "tls"
"#;
        let (engine, session) = EngineConfig::parse(text).unwrap();
        assert_eq!(engine.max_sessions, 8);
        assert_eq!(engine.queue_policy, QueuePolicy::Lifo);
        assert_eq!(session.host, "as400.example.com");
        assert_eq!(session.port, 992);
        assert_eq!(session.screen_size, ScreenSize::Size27x132);
        assert_eq!(session.ssl_type, SslType::Tls);
    }

    #[test]
    fn unknown_key_is_a_config_error() {
        let text = "[session]\nbogus = 1\n";
        assert!(matches!(
            EngineConfig::parse(text),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn unknown_section_is_a_config_error() {
        let text = "[nonsense]\nfoo = 1\n";
        assert!(matches!(
            EngineConfig::parse(text),
            Err(ConfigError::UnknownSection(_))
        ));
    }
}
