//! GitHub API client using octocrab

use crate::{Error, Result};
use octocrab::params::repos::Reference;
use octocrab::Octocrab;
use tracing::{debug, info};

/// GitHub API client for one repository
#[derive(Clone)]
pub struct GitHubClient {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Create a client for `owner/repo` authenticated with `token`
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: &str) -> Result<Self> {
        let owner = owner.into();
        let repo = repo.into();

        if token.is_empty() {
            return Err(Error::Auth(
                "GitHub token not found. Set api_key in the config file \
                 or the GITHUB_TOKEN environment variable"
                    .to_string(),
            ));
        }

        let client = Octocrab::builder()
            .personal_token(token.to_string())
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        debug!(owner = %owner, repo = %repo, "Created GitHub client");

        Ok(Self {
            client,
            owner,
            repo,
        })
    }

    /// Create a client from a repository name or URL
    ///
    /// Supports formats:
    /// - owner/repo
    /// - https://github.com/owner/repo
    /// - git@github.com:owner/repo.git
    pub fn from_url(url: &str, token: &str) -> Result<Self> {
        let (owner, repo) = parse_github_url(url)?;
        Self::new(owner, repo, token)
    }

    /// Get the repository owner
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Publish a release for an existing tag
    ///
    /// A release that already exists for the tag is left alone, so a
    /// redelivered tag event can carry on with the later release steps.
    pub async fn create_release(&self, tag: &str, name: &str, body: &str) -> Result<()> {
        let result = self
            .client
            .repos(&self.owner, &self.repo)
            .releases()
            .create(tag)
            .name(name)
            .body(body)
            .send()
            .await
            .map_err(Error::Api);

        match result {
            Ok(release) => {
                info!(
                    owner = %self.owner,
                    repo = %self.repo,
                    tag = %tag,
                    url = %release.html_url,
                    "Published release"
                );
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                info!(tag = %tag, "Release already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Create `refs/heads/<branch>` pointing at `sha`
    ///
    /// A branch that already exists is left alone.
    pub async fn create_branch(&self, branch: &str, sha: &str) -> Result<()> {
        let result = self
            .client
            .repos(&self.owner, &self.repo)
            .create_ref(&Reference::Branch(branch.to_string()), sha)
            .await
            .map_err(Error::Api);

        match result {
            Ok(_) => {
                info!(owner = %self.owner, repo = %self.repo, branch = %branch, sha = %sha, "Created branch");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                info!(branch = %branch, "Branch already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Delete `refs/heads/<branch>` through the API
    pub async fn delete_branch(&self, branch: &str) -> Result<()> {
        let route = format!(
            "/repos/{}/{}/git/refs/heads/{}",
            self.owner, self.repo, branch
        );
        let response = self.client._delete(route, None::<&()>).await?;
        octocrab::map_github_error(response).await?;

        info!(owner = %self.owner, repo = %self.repo, branch = %branch, "Deleted branch");
        Ok(())
    }

    /// Number of the open pull request whose head is `branch`, if any
    pub async fn find_open_pull(&self, branch: &str) -> Result<Option<u64>> {
        let page = self
            .client
            .pulls(&self.owner, &self.repo)
            .list()
            .state(octocrab::params::State::Open)
            .head(format!("{}:{}", self.owner, branch))
            .send()
            .await?;

        Ok(page.items.first().map(|pr| pr.number))
    }

    /// Open a pull request from `head` onto `base`
    pub async fn create_pull(&self, title: &str, head: &str, base: &str, body: &str) -> Result<u64> {
        let pr = self
            .client
            .pulls(&self.owner, &self.repo)
            .create(title, head, base)
            .body(body)
            .send()
            .await?;

        info!(number = pr.number, head = %head, base = %base, "Opened pull request");
        Ok(pr.number)
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// Parse a GitHub URL into owner and repo
pub fn parse_github_url(url: &str) -> Result<(String, String)> {
    if !url.contains(':') && !url.contains('/') {
        return Err(Error::Parse(format!(
            "Invalid repository format: {}. Expected owner/repo",
            url
        )));
    }

    if !url.contains("://") && !url.contains('@') {
        // Simple owner/repo format
        let parts: Vec<&str> = url.split('/').collect();
        if parts.len() == 2 && parts.iter().all(|p| !p.is_empty()) {
            return Ok((
                parts[0].to_string(),
                parts[1].trim_end_matches(".git").to_string(),
            ));
        }
        return Err(Error::Parse(format!(
            "Invalid repository format: {}. Expected owner/repo",
            url
        )));
    }

    if url.starts_with("https://") || url.starts_with("http://") {
        let url = url::Url::parse(url).map_err(|e| Error::Parse(e.to_string()))?;
        let path = url.path().trim_start_matches('/').trim_end_matches(".git");
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() >= 2 {
            return Ok((parts[0].to_string(), parts[1].to_string()));
        }
        return Err(Error::Parse(format!("Invalid GitHub URL path: {}", path)));
    }

    if url.starts_with("git@") {
        if let Some(path) = url.split(':').nth(1) {
            let path = path.trim_end_matches(".git");
            let parts: Vec<&str> = path.split('/').collect();
            if parts.len() >= 2 {
                return Ok((parts[0].to_string(), parts[1].to_string()));
            }
        }
        return Err(Error::Parse(format!("Invalid SSH URL: {}", url)));
    }

    Err(Error::Parse(format!("Unrecognized URL format: {}", url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand() {
        let (owner, repo) = parse_github_url("org/meta").unwrap();
        assert_eq!(owner, "org");
        assert_eq!(repo, "meta");
    }

    #[test]
    fn test_parse_https_url() {
        let (owner, repo) = parse_github_url("https://github.com/org/meta.git").unwrap();
        assert_eq!(owner, "org");
        assert_eq!(repo, "meta");
    }

    #[test]
    fn test_parse_ssh_url() {
        let (owner, repo) = parse_github_url("git@github.com:org/meta.git").unwrap();
        assert_eq!(owner, "org");
        assert_eq!(repo, "meta");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_github_url("meta").is_err());
        assert!(parse_github_url("org/").is_err());
        assert!(parse_github_url("a/b/c").is_err());
    }

    #[tokio::test]
    async fn test_empty_token_is_rejected() {
        let err = GitHubClient::new("org", "meta", "").unwrap_err();
        assert!(matches!(err, Error::Auth(_)));

        let client = GitHubClient::from_url("org/meta", "token").unwrap();
        assert_eq!(client.owner(), "org");
        assert_eq!(client.repo(), "meta");
        assert!(format!("{:?}", client).contains("org"));
    }
}
