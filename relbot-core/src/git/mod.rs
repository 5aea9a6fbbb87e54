//! Git operations for relbot
//!
//! Local branch and history work goes through git2; clone, fetch and push
//! go through the git CLI.

pub mod remote;
mod repo;

pub use repo::GitRepo;
