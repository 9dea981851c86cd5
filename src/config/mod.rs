//! Settings file loading and repository/pattern configuration.

mod settings;

pub use settings::{
    load_or_create_settings, CollectionMode, CollectorSettings, RepoPatterns, ServerSettings,
    TimeGranularity,
};
