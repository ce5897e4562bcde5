/// Crate result alias.
pub type StoryreelResult<T> = Result<T, StoryreelError>;

/// Pipeline stage an error is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fetching or decoding per-scene images and narration.
    AssetResolution,
    /// Building the master audio track or its container.
    Synthesis,
    /// Rendering frames or stills.
    Composition,
    /// Transcoding, muxing or validating the output artifact.
    Mux,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::AssetResolution => "asset resolution",
            Stage::Synthesis => "synthesis",
            Stage::Composition => "composition",
            Stage::Mux => "mux",
        })
    }
}

/// Errors surfaced to callers.
///
/// Transient upstream failures never appear here: the resolver absorbs them into fallbacks.
#[derive(thiserror::Error, Debug)]
pub enum StoryreelError {
    /// Invalid script, configuration or API usage.
    #[error("validation error: {0}")]
    Validation(String),

    /// Asset resolution failed in a way that cannot degrade to a fallback.
    #[error("asset resolution error: {0}")]
    AssetResolution(String),

    /// Master audio synthesis or serialization failed.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Frame or still rendering failed.
    #[error("composition error: {0}")]
    Composition(String),

    /// Transcoder, mux or artifact validation failed.
    #[error("mux error: {0}")]
    Mux(String),

    /// A scene has no materialized still at encode time.
    #[error("composition error: missing still for scene '{scene}'")]
    MissingStill {
        /// Scene id.
        scene: String,
    },

    /// The master audio payload is absent or empty at encode time.
    #[error("synthesis error: missing audio payload: {0}")]
    MissingAudio(String),

    /// Work was cancelled by the caller.
    #[error("cancelled")]
    Cancelled,

    /// Unclassified error with source chain.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl StoryreelError {
    /// Build a [`StoryreelError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`StoryreelError::AssetResolution`].
    pub fn asset(msg: impl Into<String>) -> Self {
        Self::AssetResolution(msg.into())
    }

    /// Build a [`StoryreelError::Synthesis`].
    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    /// Build a [`StoryreelError::Composition`].
    pub fn composition(msg: impl Into<String>) -> Self {
        Self::Composition(msg.into())
    }

    /// Build a [`StoryreelError::Mux`].
    pub fn mux(msg: impl Into<String>) -> Self {
        Self::Mux(msg.into())
    }

    /// The stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::AssetResolution(_) => Some(Stage::AssetResolution),
            Self::Synthesis(_) | Self::MissingAudio(_) => Some(Stage::Synthesis),
            Self::Composition(_) | Self::MissingStill { .. } => Some(Stage::Composition),
            Self::Mux(_) => Some(Stage::Mux),
            Self::Validation(_) | Self::Cancelled | Self::Other(_) => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
