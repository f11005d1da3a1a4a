//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every library error a subcommand can hit, so that
//! `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: eikonal_core::ConfigError,
    },

    /// Opening, reading or flushing the store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: eikonal_store::StoreError,
    },

    /// Loading the travel-time archive failed.
    #[error("archive error: {source}")]
    Archive {
        /// The underlying archive error.
        #[from]
        source: eikonal_core::ArchiveError,
    },

    /// Study region attributes could not be written or read.
    #[error("dataset error: {source}")]
    Dataset {
        /// The underlying dataset error.
        #[from]
        source: eikonal_core::DatasetError,
    },

    /// A run could not be opened.
    #[error("run error: {source}")]
    Run {
        /// The underlying run error.
        #[from]
        source: eikonal_core::RunError,
    },

    /// The per-event pipeline failed.
    #[error("pipeline error: {source}")]
    Pipeline {
        /// The underlying pipeline error.
        #[from]
        source: eikonal_core::PipelineError,
    },

    /// Stacking failed.
    #[error("stacking error: {source}")]
    Stack {
        /// The underlying stacking error.
        #[from]
        source: eikonal_core::StackError,
    },
}
