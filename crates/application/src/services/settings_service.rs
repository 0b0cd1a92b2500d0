use std::sync::{PoisonError, RwLock};

use domain::{AppSettings, Title};

use crate::error::ApplicationError;

/// 单一的可变标题设置，由管理页更新、观众页轮询读取，不做广播
pub struct SettingsService {
    title: RwLock<Title>,
    title_max_chars: usize,
}

impl SettingsService {
    pub fn new(default_title: impl Into<String>, title_max_chars: usize) -> Self {
        Self {
            title: RwLock::new(Title::from_default(default_title)),
            title_max_chars,
        }
    }

    pub fn current(&self) -> AppSettings {
        let title = self
            .title
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        AppSettings { title }
    }

    pub fn update_title(&self, title: Option<&str>) -> Result<AppSettings, ApplicationError> {
        let title = Title::new(title, self.title_max_chars)?;

        *self.title.write().unwrap_or_else(PoisonError::into_inner) = title.clone();
        tracing::info!(title = title.as_str(), "settings updated");

        Ok(AppSettings { title })
    }
}
