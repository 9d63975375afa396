pub mod rate_limit;
pub mod reputation;
pub mod security;
pub mod settings;
pub mod storage;

pub use settings::Settings;
