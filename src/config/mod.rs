//! # 配置管理模块
//!
//! 处理应用配置加载、环境变量覆盖和验证

mod app_config;
mod database;

pub use app_config::{AppConfig, AuthConfig, ServerConfig};
pub use database::DatabaseConfig;

use crate::error::{RbacError, Result};
use crate::{
    linfo,
    logging::{LogComponent, LogStage},
};
use std::env;
use std::path::{Path, PathBuf};

/// 默认配置文件路径：`config/config.{RUST_ENV}.toml`
#[must_use]
pub fn default_config_path() -> PathBuf {
    let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    PathBuf::from(format!("config/config.{env}.toml"))
}

/// 加载配置文件，应用环境变量覆盖并校验
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_file = path.map_or_else(default_config_path, Path::to_path_buf);

    if !config_file.exists() {
        return Err(RbacError::config(format!(
            "配置文件不存在: {}",
            config_file.display()
        )));
    }

    let config_content = std::fs::read_to_string(&config_file).map_err(|e| {
        RbacError::config_with_source(format!("读取配置文件失败: {}", config_file.display()), e)
    })?;

    let mut config = parse_config(&config_content)?;
    apply_overrides(&mut config, |key| env::var(key).ok());
    config.validate()?;

    linfo!(
        "system",
        LogStage::Configuration,
        LogComponent::Config,
        "config_loaded",
        &format!("配置加载完成: {}", config_file.display())
    );

    Ok(config)
}

/// 解析 TOML 配置文本
pub fn parse_config(content: &str) -> Result<AppConfig> {
    Ok(toml::from_str(content)?)
}

/// 用外部来源（通常是环境变量）覆盖敏感配置项
pub fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup("JWT_ACCESS_SECRET") {
        config.auth.access_secret = secret;
    }
    if let Some(secret) = lookup("JWT_REFRESH_SECRET") {
        config.auth.refresh_secret = secret;
    }
    if let Some(url) = lookup("DATABASE_URL") {
        config.database.url = url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    const SAMPLE: &str = r#"
[server]
bind_address = "0.0.0.0"
port = 9090
api_prefix = "/api"

[database]
url = "sqlite::memory:"
max_connections = 5
connect_timeout = 10
acquire_timeout = 10

[auth]
access_secret = "access-secret"
refresh_secret = "refresh-secret"
access_expires_in = 900
refresh_expires_in = 604800
bcrypt_cost = 10
"#;

    #[test]
    fn test_parse_and_validate_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.server.listen_addr(), "0.0.0.0:9090");
        assert_eq!(config.auth.access_expires_in, 900);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_equal_secrets_rejected() {
        let mut config = parse_config(SAMPLE).unwrap();
        config.auth.refresh_secret = config.auth.access_secret.clone();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, RbacError::Config { .. }));
    }

    #[test]
    fn test_env_overrides_applied() {
        let mut config = parse_config(SAMPLE).unwrap();
        let env: HashMap<&str, &str> = [
            ("JWT_ACCESS_SECRET", "from-env-a"),
            ("DATABASE_URL", "sqlite://./other.db"),
        ]
        .into_iter()
        .collect();

        apply_overrides(&mut config, |key| env.get(key).map(ToString::to_string));

        assert_eq!(config.auth.access_secret, "from-env-a");
        assert_eq!(config.auth.refresh_secret, "refresh-secret");
        assert_eq!(config.database.url, "sqlite://./other.db");
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_config(Some(Path::new("/nonexistent/config.toml"))).unwrap_err();
        assert!(err.to_string().contains("配置文件不存在"));
    }
}
