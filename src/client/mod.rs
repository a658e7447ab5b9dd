pub mod backend;
pub mod error;
pub mod http;

pub use backend::{Ack, TaskBackend};
pub use error::{ApiError, ApiOp};
pub use http::DeepSearchClient;
