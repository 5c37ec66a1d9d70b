pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("The {index} index is unavailable: {message}")]
	IndexUnavailable { index: &'static str, message: String },
	#[error("The {stage} stage timed out after {elapsed_ms} ms.")]
	Timeout { stage: &'static str, elapsed_ms: u64 },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("The query was cancelled.")]
	Cancelled,
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<medrag_providers::Error> for Error {
	fn from(err: medrag_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<medrag_storage::Error> for Error {
	fn from(err: medrag_storage::Error) -> Self {
		match err {
			medrag_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}
