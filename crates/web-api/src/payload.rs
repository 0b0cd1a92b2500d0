//! 宽松的请求体解析
//!
//! 请求体无法解析时按空对象处理：点击接口全部取默认值，
//! 需要校验的接口随后返回 400。

use axum::body::Bytes;
use serde_json::Value;

pub(crate) struct LenientBody(Value);

impl LenientBody {
    pub(crate) fn parse(bytes: &Bytes) -> Self {
        let value = serde_json::from_slice::<Value>(bytes)
            .ok()
            .filter(Value::is_object)
            .unwrap_or_else(|| Value::Object(Default::default()));
        Self(value)
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    /// 只接受字符串，其他类型视为缺失
    pub(crate) fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// 会话 ID 也接受数字，统一转成字符串
    pub(crate) fn id_string(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }
}
