#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("No snapshot has been received yet")]
    NoCurrentState,

    #[error("Comparison needs at least 2 captured snapshots, have {available}")]
    InsufficientHistory { available: usize },
}
