use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub connectors: ConnectorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/siphon.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Bearer token sent with every request when set. `SIPHON_API_TOKEN`
    /// in the environment takes precedence.
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            api_token: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("siphon/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConnectorsConfig {
    #[serde(default)]
    pub posts: PostsConfig,
    #[serde(default)]
    pub nvd: NvdConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostsConfig {
    #[serde(default = "default_posts_base_url")]
    pub base_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_posts_delay_ms")]
    pub rate_limit_delay_ms: u64,
    /// JSONPlaceholder returns everything in one response; the page loop
    /// exits after the first page when this is false.
    #[serde(default)]
    pub paginates: bool,
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self {
            base_url: default_posts_base_url(),
            page_size: default_page_size(),
            rate_limit_delay_ms: default_posts_delay_ms(),
            paginates: false,
        }
    }
}

fn default_posts_base_url() -> String {
    "https://jsonplaceholder.typicode.com".to_string()
}
fn default_page_size() -> usize {
    20
}
fn default_posts_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct NvdConfig {
    #[serde(default = "default_nvd_base_url")]
    pub base_url: String,
    #[serde(default = "default_results_per_page")]
    pub results_per_page: usize,
    #[serde(default = "default_nvd_delay_ms")]
    pub rate_limit_delay_ms: u64,
    /// Publication lookback window, also used for the `is_recent` flag.
    #[serde(default = "default_window_days")]
    pub window_days: i64,
}

impl Default for NvdConfig {
    fn default() -> Self {
        Self {
            base_url: default_nvd_base_url(),
            results_per_page: default_results_per_page(),
            rate_limit_delay_ms: default_nvd_delay_ms(),
            window_days: default_window_days(),
        }
    }
}

fn default_nvd_base_url() -> String {
    "https://services.nvd.nist.gov/rest/json/cves/2.0".to_string()
}
fn default_results_per_page() -> usize {
    200
}
fn default_nvd_delay_ms() -> u64 {
    6000
}
fn default_window_days() -> i64 {
    30
}

/// Load configuration from a TOML file. A missing file is not an error —
/// every field has a default, so the pipeline runs out of the box.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    // Environment overrides
    if let Ok(db_path) = std::env::var("SIPHON_DB_PATH") {
        config.db.path = PathBuf::from(db_path);
    }
    if let Ok(token) = std::env::var("SIPHON_API_TOKEN") {
        config.http.api_token = Some(token);
    }

    if config.connectors.posts.page_size == 0 {
        anyhow::bail!("connectors.posts.page_size must be > 0");
    }
    if config.connectors.nvd.results_per_page == 0 {
        anyhow::bail!("connectors.nvd.results_per_page must be > 0");
    }
    if config.connectors.nvd.window_days < 1 {
        anyhow::bail!("connectors.nvd.window_days must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_file_missing() {
        let config = load_config(Path::new("/nonexistent/siphon.toml")).unwrap();
        assert_eq!(config.connectors.posts.page_size, 20);
        assert_eq!(config.connectors.nvd.window_days, 30);
        assert!(!config.connectors.posts.paginates);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [connectors.posts]
            base_url = "http://localhost:9000"
            "#,
        )
        .unwrap();
        assert_eq!(config.connectors.posts.base_url, "http://localhost:9000");
        assert_eq!(config.connectors.posts.page_size, 20);
        assert_eq!(config.connectors.nvd.results_per_page, 200);
    }
}
