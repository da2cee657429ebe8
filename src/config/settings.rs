use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub pusher: PusherConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub occupancy: OccupancyConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Credentials and endpoint of the Pusher Channels app.
#[derive(Debug, Clone, Deserialize)]
pub struct PusherConfig {
    pub app_id: String,
    pub key: String,
    pub secret: String,
    #[serde(default = "default_cluster")]
    pub cluster: String,
    /// Full base URL overriding `https://api-{cluster}.pusher.com`
    #[serde(default)]
    pub host: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Silently drop every delivery
    #[serde(default)]
    pub disabled: bool,
    /// Only deliver to channels the occupancy cache reports as occupied
    #[serde(default)]
    pub webhook_optimisation_enabled: bool,
    /// File name looked up in each of `backend_dirs`
    #[serde(default = "default_backends_file")]
    pub backends_file: String,
    #[serde(default = "default_backend_dirs")]
    pub backend_dirs: Vec<String>,
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default = "default_true")]
    pub push_creations: bool,
    #[serde(default = "default_true")]
    pub push_updates: bool,
    #[serde(default = "default_true")]
    pub push_deletions: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OccupancyConfig {
    /// "memory" or "redis"
    #[serde(default = "default_occupancy_backend")]
    pub backend: String,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_redis_prefix")]
    pub redis_prefix: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cluster() -> String {
    "mt1".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_backends_file() -> String {
    "pusher_backends.toml".to_string()
}

fn default_backend_dirs() -> Vec<String> {
    vec!["config".to_string()]
}

fn default_provider() -> String {
    "pusher".to_string()
}

fn default_true() -> bool {
    true
}

fn default_occupancy_backend() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_prefix() -> String {
    "model-pusher:occupied".to_string()
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port())?
            .set_default("pusher.cluster", default_cluster())?
            .set_default("dispatch.disabled", false)?
            .set_default("dispatch.webhook_optimisation_enabled", false)?
            .set_default("occupancy.backend", default_occupancy_backend())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // MODEL_PUSHER__PUSHER__APP_ID, MODEL_PUSHER__DISPATCH__DISABLED, ...
            .add_source(
                Environment::with_prefix("MODEL_PUSHER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("dispatch.backend_dirs"),
            );

        builder.build()?.try_deserialize()
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl PusherConfig {
    /// Base URL of the Channels HTTP API.
    pub fn base_url(&self) -> String {
        match &self.host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!("https://api-{}.pusher.com", self.cluster),
        }
    }
}

impl Default for PusherConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            key: String::new(),
            secret: String::new(),
            cluster: default_cluster(),
            host: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            webhook_optimisation_enabled: false,
            backends_file: default_backends_file(),
            backend_dirs: default_backend_dirs(),
            default_provider: default_provider(),
            push_creations: true,
            push_updates: true,
            push_deletions: true,
        }
    }
}

impl Default for OccupancyConfig {
    fn default() -> Self {
        Self {
            backend: default_occupancy_backend(),
            redis_url: default_redis_url(),
            redis_prefix: default_redis_prefix(),
        }
    }
}
