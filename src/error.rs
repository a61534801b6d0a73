use thiserror::Error;

/// Why a playlist could not be produced.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Nothing was played in this period inside the lookback window.
    #[error("no listening history for period '{period}' in the lookback window")]
    InsufficientHistory { period: String },

    /// Seeds existed, but exclusions, rating floors and recency removed everything.
    #[error("all {seeds} seed(s) for period '{period}' were removed by filtering")]
    InsufficientAfterFiltering { period: String, seeds: usize },

    #[error(transparent)]
    Library(#[from] anyhow::Error),
}

impl GenerateError {
    /// Empty-result errors are expected on quiet periods and are not failures of
    /// the tool itself.
    #[must_use]
    pub fn is_empty_result(&self) -> bool {
        matches!(
            self,
            Self::InsufficientHistory { .. } | Self::InsufficientAfterFiltering { .. }
        )
    }
}
