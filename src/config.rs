use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "geodoc", about = "A map portal for geotagged documents")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Email of the administrator account ensured at startup
    #[arg(long)]
    pub admin_email: Option<String>,

    /// Password of the administrator account ensured at startup
    #[arg(long, env = "GEODOC_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub geocoder: GeocoderConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

/// Uploaded files live under `<public_dir>/uploads/...` and are served
/// from `/uploads/...`.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub public_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub secure_cookie: bool,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "geodoc_session".to_string(),
            session_hours: 720,
            secure_cookie: false,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.sphere.gistda.or.th".to_string(),
            api_key: None,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref email) = cli.admin_email {
            config.auth.admin_email = Some(email.clone());
        }
        if let Some(ref password) = cli.admin_password {
            config.auth.admin_password = Some(password.clone());
        }

        if config.geocoder.api_key.is_none() {
            config.geocoder.api_key = std::env::var("GISTDA_API_KEY").ok();
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("geodoc.db"));
        }
        if config.storage.public_dir.is_none() {
            config.storage.public_dir = Some(data_dir.join("public"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".geodoc")
        })
    }

    /// Config rooted at `data_dir` with every path resolved, for tests and
    /// embedding.
    pub fn for_data_dir(data_dir: &std::path::Path) -> Self {
        let mut config = Config::default();
        config.database.path = Some(data_dir.join("geodoc.db"));
        config.storage.public_dir = Some(data_dir.join("public"));
        config
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("geodoc.db"))
    }

    pub fn public_dir(&self) -> PathBuf {
        self.storage
            .public_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("public"))
    }
}
