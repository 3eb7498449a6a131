use serde::Deserialize;

/// Top-level server configuration, loaded from `quiznight.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub limits: LimitsConfig,
    pub rooms: RoomsConfig,
    pub generator: GeneratorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            limits: LimitsConfig::default(),
            rooms: RoomsConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Maximum concurrent WebSocket connections per IP address.
    pub max_ws_per_ip: usize,
    /// Per-connection token-bucket rate (messages per second).
    pub ws_rate_limit_per_sec: f64,
    pub player_message_buffer: usize,
    pub max_chat_message_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            max_ws_per_ip: 10,
            ws_rate_limit_per_sec: 50.0,
            player_message_buffer: 256,
            max_chat_message_len: 1024,
        }
    }
}

/// Room lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub idle_timeout_secs: u64,
    pub idle_check_interval_secs: u64,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 3600,
            idle_check_interval_secs: 60,
        }
    }
}

/// External question-generator configuration. When `endpoint` is unset the
/// server falls back to the built-in fixed question set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl GeneratorConfig {
    pub fn timeout_secs_or_default(&self) -> u64 {
        self.timeout_secs.unwrap_or(20)
    }
}

impl ServerConfig {
    /// Validate configuration, logging warnings for issues.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }

        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_ws_per_ip == 0 {
            tracing::error!("limits.max_ws_per_ip must be > 0");
            std::process::exit(1);
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            tracing::error!("limits.ws_rate_limit_per_sec must be > 0");
            std::process::exit(1);
        }
        if self.limits.player_message_buffer == 0 {
            tracing::error!("limits.player_message_buffer must be > 0");
            std::process::exit(1);
        }

        if self.rooms.idle_timeout_secs == 0 {
            tracing::error!("rooms.idle_timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.rooms.idle_check_interval_secs == 0 {
            tracing::error!("rooms.idle_check_interval_secs must be > 0");
            std::process::exit(1);
        }

        if let Some(timeout) = self.generator.timeout_secs
            && timeout == 0
        {
            tracing::error!("generator.timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.generator.api_key.is_some() {
            tracing::warn!(
                "generator.api_key is set in config file; prefer the QUIZNIGHT_GENERATOR_KEY env var"
            );
        }
    }

    /// Load config from `quiznight.toml` if it exists, then apply env var
    /// overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("quiznight.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from quiznight.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse quiznight.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No quiznight.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("QUIZNIGHT_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(endpoint) = std::env::var("QUIZNIGHT_GENERATOR_URL")
            && !endpoint.is_empty()
        {
            config.generator.endpoint = Some(endpoint);
        }
        if let Ok(key) = std::env::var("QUIZNIGHT_GENERATOR_KEY")
            && !key.is_empty()
        {
            config.generator.api_key = Some(key);
        }
        if let Ok(val) = std::env::var("QUIZNIGHT_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("QUIZNIGHT_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }
        if let Ok(val) = std::env::var("QUIZNIGHT_ROOM_IDLE_TIMEOUT")
            && let Ok(n) = val.parse::<u64>()
        {
            config.rooms.idle_timeout_secs = n;
        }

        config
    }
}
