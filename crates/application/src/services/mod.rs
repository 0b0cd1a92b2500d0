mod reaction_service;
mod settings_service;

pub use reaction_service::{
    BalloonClickRequest, ClickReceipt, ReactionLimits, ReactionService, UnderstandClickRequest,
};
pub use settings_service::SettingsService;
