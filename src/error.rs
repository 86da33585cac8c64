use thiserror::Error;

/// Errors from loading a map dump into the road graph.
#[derive(Error, Debug)]
pub enum MapError {
    #[error("failed to read map dump: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse map dump: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("map dump contained no usable roads")]
    NoRoads,
}
