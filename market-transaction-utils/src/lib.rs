pub mod error;
pub mod pack;
pub mod priority_fee;
pub mod retry;
pub mod sender;

pub use error::Error;
pub use retry::RetryPolicy;
pub use sender::{send_and_confirm, SendConfig, SendTransaction};
