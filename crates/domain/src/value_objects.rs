use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{DomainError, DomainResult};

/// 统一的时间戳类型，序列化为 RFC 3339 字符串。
pub type Timestamp = DateTime<Utc>;

/// 默认的气球样式。
pub const DEFAULT_BALLOON_TYPE: &str = "balloon1";

/// "听懂了" 按钮固定使用的样式名。
pub const UNDERSTAND_BALLOON_TYPE: &str = "understand";

/// 观众会话标识，由客户端自行生成，服务端视为不透明字符串。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// 只有缺失或空字符串视为校验失败，其余内容原样保留。
    pub fn new(raw: Option<&str>) -> DomainResult<Self> {
        match raw {
            Some(value) if !value.is_empty() => Ok(Self(value.to_string())),
            _ => Err(DomainError::validation_error(
                "sessionId",
                "sessionId is required",
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 气球样式。缺失时回退到默认样式，不做拒绝。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BalloonType(String);

impl BalloonType {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(value) if !value.is_empty() => Self(value.to_string()),
            _ => Self::default(),
        }
    }

    pub fn understand() -> Self {
        Self(UNDERSTAND_BALLOON_TYPE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BalloonType {
    fn default() -> Self {
        Self(DEFAULT_BALLOON_TYPE.to_string())
    }
}

impl fmt::Display for BalloonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 一次请求内的点击次数，始终落在 `1..=max`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClickCount(u32);

impl ClickCount {
    /// 宽松解析：接受整数、整数值浮点数以及数字字符串；
    /// 其余输入或小于 1 的值按 1 处理，超过上限的值截断到上限。
    pub fn coerce(raw: Option<&Value>, max: u32) -> Self {
        let parsed = match raw {
            Some(Value::Number(number)) => number.as_u64().or_else(|| {
                number
                    .as_f64()
                    .filter(|value| value.fract() == 0.0 && *value >= 1.0)
                    .map(|value| value as u64)
            }),
            Some(Value::String(text)) => text.trim().parse::<u64>().ok(),
            _ => None,
        };

        let max = u64::from(max.max(1));
        let count = parsed.filter(|n| *n >= 1).unwrap_or(1).min(max);
        Self(count as u32)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// 观众发送的文字消息（已去除首尾空白）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageText(String);

impl MessageText {
    /// 长度按字符计算，且针对去除空白之前的原始输入。
    pub fn new(raw: Option<&str>, max_chars: usize) -> DomainResult<Self> {
        bounded_text("message", raw, max_chars).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// 页面标题。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Title(String);

impl Title {
    pub fn new(raw: Option<&str>, max_chars: usize) -> DomainResult<Self> {
        bounded_text("title", raw, max_chars).map(Self)
    }

    /// 配置中的默认标题不经过校验。
    pub fn from_default(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn bounded_text(field: &str, raw: Option<&str>, max_chars: usize) -> DomainResult<String> {
    let raw = raw.ok_or_else(|| DomainError::validation_error(field, format!("{field} is required")))?;

    if raw.chars().count() > max_chars {
        return Err(DomainError::validation_error(
            field,
            format!("{field} must be at most {max_chars} characters"),
        ));
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation_error(
            field,
            format!("{field} is required"),
        ));
    }

    Ok(trimmed.to_string())
}
