pub mod backends;
pub mod provider;
pub mod retry;
pub mod throttle;
pub mod types;

pub use backends::GeminiBackend;
pub use provider::{BackendError, ChatBackend, ChatSession};
pub use retry::{MAX_RETRIES, RetryPolicy, extract_retry_delay, is_rate_limit};
pub use throttle::{MIN_REQUEST_INTERVAL, RequestGate};
pub use types::{GenerationConfig, Message, Role, Transcript};
