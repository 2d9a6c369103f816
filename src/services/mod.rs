pub mod discord;
pub mod event_manager;
pub mod localization;
pub mod logger;
pub mod settings;
pub mod storage;
