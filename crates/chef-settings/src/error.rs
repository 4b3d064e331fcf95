//! Error types for chef-settings

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Configuration conflict at '{path}': cannot merge {incoming} into {existing}")]
    ConfigurationConflict {
        path: String,
        existing: &'static str,
        incoming: &'static str,
    },

    #[error("Invalid run list at '{path}': expected a list of strings")]
    RunListShape { path: String },
}
