use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Producer error: {0}")]
    Producer(String),

    #[error("Producer timed out")]
    ProducerTimeout,

    #[error("No producers succeeded for {0}")]
    NoProducersSucceeded(String),

    #[error("Analysis capacity exhausted, try again later")]
    AdmissionRejected,

    #[error("Market data fetch failed: {0}")]
    DataFetch(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
