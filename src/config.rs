use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

pub const DEFAULT_TEMPLATE_PATH: &str = "resources/Line Protection Calculation Sheet Template.xlsm";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 30 * 1024 * 1024;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// `None` disables submission persistence
    pub db_url: Option<String>,
    pub app_name: String,
    pub deployment: String,
    pub template_path: String,
    pub bind_addr: String,
    pub cors_origin: String,
    pub max_upload_bytes: usize,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok(); // Load from .env file if available

        // Either a full DB_URL or the individual parts; without both the
        // service runs without recording submissions
        let db_url = env::var("DB_URL").ok().or_else(|| {
            let user = env::var("DB_USER").ok()?;
            let password = env::var("DB_PASSWORD").ok()?;
            let host = env::var("DB_HOST").ok()?;
            let name = env::var("DB_NAME").ok()?;
            Some(format!(
                "{}://{user}:{password}@{host}:{}/{name}",
                var_or("DB_PREFIX", "postgresql"),
                var_or("DB_PORT", "5432"),
            ))
        });

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Config {
            app_name: var_or("APP_NAME", "line-protection-api"),
            deployment: var_or("DEPLOYMENT", "local"),
            template_path: var_or("TEMPLATE_PATH", DEFAULT_TEMPLATE_PATH),
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
            cors_origin: var_or("CORS_ORIGIN", "http://localhost:8080"),
            max_upload_bytes,
            db_url,
        }
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            app_name: "line-protection-api-test".to_string(),
            deployment: "test".to_string(),
            template_path: DEFAULT_TEMPLATE_PATH.to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            cors_origin: "http://localhost:8080".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            db_url: None,
        }
    }
}
