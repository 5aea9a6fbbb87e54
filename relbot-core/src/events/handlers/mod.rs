//! One handler per supported event type

mod create;
mod pull_request;
mod push;
mod review;

pub use create::CreateHandler;
pub use pull_request::{cleanup_bump_branch, PullRequestHandler};
pub use push::PushHandler;
pub use review::ReviewHandler;
