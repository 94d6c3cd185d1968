pub mod retry;

pub use retry::{retry_on_transient, wait_for_shutdown, IsTransient, RetryPolicy, RetryResult};
