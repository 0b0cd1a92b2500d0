//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 服务监听地址与 CORS
//! - 请求限流
//! - 广播分发
//! - 输入长度限制与默认设置
//!
//! 加载顺序：内置默认值 -> 可选配置文件（`APP_CONFIG_FILE`）-> `APP_` 前缀的环境变量，
//! 嵌套字段用 `__` 分隔，例如 `APP_RATE_LIMIT__MAX_REQUESTS=60`。

use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// 服务配置
    #[validate(nested)]
    pub server: ServerConfig,
    /// 限流配置
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,
    /// 广播器配置
    #[validate(nested)]
    pub broadcast: BroadcastConfig,
    /// 输入限制
    #[validate(nested)]
    pub limits: LimitsConfig,
    /// 应用设置的初始值
    #[validate(nested)]
    pub settings: SettingsConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// 限流配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// 每个窗口内每个来源允许的请求数
    #[validate(range(min = 1))]
    pub max_requests: u32,
    #[validate(range(min = 1))]
    pub window_secs: u64,
    /// 过期配额的清理间隔
    #[validate(range(min = 1))]
    pub sweep_interval_secs: u64,
}

/// 广播器配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BroadcastConfig {
    #[validate(range(min = 1, max = 1000))]
    pub batch_size: usize,
    /// 每个订阅者可排队的帧数
    #[validate(range(min = 1))]
    pub subscriber_buffer: usize,
    #[validate(range(min = 1))]
    pub write_timeout_ms: u64,
    /// SSE 保活注释的间隔
    #[validate(range(min = 1))]
    pub keep_alive_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LimitsConfig {
    #[validate(range(min = 1))]
    pub message_max_chars: usize,
    #[validate(range(min = 1))]
    pub title_max_chars: usize,
    #[validate(range(min = 1))]
    pub max_clicks_per_request: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SettingsConfig {
    #[validate(length(min = 1))]
    pub default_title: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 3001,
                cors_origins: vec!["*".into()],
            },
            rate_limit: RateLimitConfig {
                max_requests: 120,
                window_secs: 60,
                sweep_interval_secs: 60,
            },
            broadcast: BroadcastConfig {
                batch_size: 10,
                subscriber_buffer: 64,
                write_timeout_ms: 1000,
                keep_alive_secs: 30,
            },
            limits: LimitsConfig {
                message_max_chars: 120,
                title_max_chars: 50,
                max_clicks_per_request: 100,
            },
            settings: SettingsConfig {
                default_title: "안녕하세요".into(),
            },
        }
    }
}

impl AppConfig {
    /// 按 默认值 -> 配置文件 -> 环境变量 的顺序加载并校验
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            figment = if path.ends_with(".yml") || path.ends_with(".yaml") {
                figment.merge(Yaml::file(path))
            } else if path.ends_with(".json") {
                figment.merge(Json::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }

        Self::from_figment(figment.merge(Env::prefixed("APP_").split("__")))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl BroadcastConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}
