pub mod settings;

pub use settings::{HubConfig, Settings};
