//! Clone, fetch and push through the git CLI
//!
//! Network operations shell out to `git` so they pick up the host's
//! transport configuration. The token is embedded in the clone URL and is
//! redacted from every error message.

use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::{Error, Result};

/// Authenticated HTTPS clone URL for a GitHub repository
pub fn clone_url(full_name: &str, token: &str) -> Result<String> {
    let mut url = url::Url::parse(&format!("https://github.com/{}.git", full_name))
        .map_err(|e| Error::Config(format!("Invalid repository name {}: {}", full_name, e)))?;

    if !token.is_empty() {
        url.set_username("x-access-token")
            .and_then(|_| url.set_password(Some(token)))
            .map_err(|_| Error::Config(format!("Cannot add credentials to {}", full_name)))?;
    }

    Ok(url.to_string())
}

/// Replace every occurrence of `secret` in `text`
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        text.to_string()
    } else {
        text.replace(secret, "***")
    }
}

/// Run `git` with `args` in `dir`, failing on a non-zero exit
fn run_git(dir: &Path, args: &[&str], token: &str) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .map_err(|e| Error::Git(format!("Failed to run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Git(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            redact(stderr.trim(), token)
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Clone `full_name` into `target` unless a clone is already there
///
/// Returns `true` when a fresh clone was made.
pub fn ensure_clone(full_name: &str, target: &Path, token: &str) -> Result<bool> {
    if target.join(".git").exists() {
        return Ok(false);
    }

    let parent = target
        .parent()
        .ok_or_else(|| Error::Git(format!("Invalid clone path {}", target.display())))?;
    std::fs::create_dir_all(parent)
        .map_err(|e| Error::Git(format!("Failed to create {}: {}", parent.display(), e)))?;

    let url = clone_url(full_name, token)?;
    let target_str = target
        .to_str()
        .ok_or_else(|| Error::Git(format!("Non-UTF-8 clone path {}", target.display())))?;

    info!(repo = %full_name, path = %target.display(), "Cloning repository");
    run_git(parent, &["clone", &url, target_str], token)?;

    Ok(true)
}

/// Fetch branches and tags, then hard-reset `branch` to its remote state
pub fn sync_branch(repo_path: &Path, branch: &str, token: &str) -> Result<()> {
    debug!(path = %repo_path.display(), branch = %branch, "Syncing clone");

    run_git(repo_path, &["fetch", "--prune", "--tags", "--force", "origin"], token)?;
    run_git(repo_path, &["checkout", branch], token)?;
    run_git(repo_path, &["reset", "--hard", &format!("origin/{}", branch)], token)?;

    Ok(())
}

/// Force-push a local branch to origin
pub fn push_branch(repo_path: &Path, branch: &str, token: &str) -> Result<()> {
    info!(path = %repo_path.display(), branch = %branch, "Pushing branch");
    run_git(
        repo_path,
        &["push", "--force", "origin", &format!("{0}:{0}", branch)],
        token,
    )?;
    Ok(())
}
