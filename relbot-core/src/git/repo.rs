//! Local clone operations backed by git2

use std::path::{Path, PathBuf};

use git2::{build::CheckoutBuilder, BranchType, DescribeFormatOptions, DescribeOptions, Repository};

use crate::{Error, Result};

/// A local clone with the branch and history operations relbot needs
pub struct GitRepo {
    /// The underlying git2 repository
    repo: Repository,
    /// Path to the repository root
    root: PathBuf,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl GitRepo {
    /// Open the clone rooted at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let repo = Repository::open(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::Git(format!("No clone at {}", path.display()))
            } else {
                Error::Git(format!("Failed to open {}: {}", path.display(), e.message()))
            }
        })?;

        let root = repo
            .workdir()
            .ok_or_else(|| Error::Git("Bare repositories are not supported".to_string()))?
            .to_path_buf();

        Ok(Self { repo, root })
    }

    /// Get the repository root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the default branch name
    ///
    /// Follows `origin/HEAD` when the clone has it, then looks for main and
    /// master on origin and locally.
    pub fn default_branch(&self) -> Result<String> {
        if let Ok(origin_head) = self.repo.find_reference("refs/remotes/origin/HEAD") {
            if let Some(target) = origin_head.symbolic_target() {
                if let Some(name) = target.strip_prefix("refs/remotes/origin/") {
                    return Ok(name.to_string());
                }
            }
        }

        for candidate in [
            "refs/remotes/origin/main",
            "refs/remotes/origin/master",
            "refs/heads/main",
            "refs/heads/master",
        ] {
            if self.repo.find_reference(candidate).is_ok() {
                let name = candidate.rsplit('/').next().unwrap_or("main");
                return Ok(name.to_string());
            }
        }

        Err(Error::Git(format!(
            "Could not determine default branch of {}",
            self.root.display()
        )))
    }

    /// Check out a local branch, creating it from `origin/<name>` if needed
    ///
    /// Uses a safe checkout: local modifications that would be overwritten
    /// make this fail rather than being discarded.
    pub fn checkout_branch(&self, name: &str) -> Result<()> {
        let branch = match self.repo.find_branch(name, BranchType::Local) {
            Ok(branch) => branch,
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                let remote = self
                    .repo
                    .find_branch(&format!("origin/{}", name), BranchType::Remote)
                    .map_err(|_| Error::Git(format!("Branch '{}' not found", name)))?;
                let commit = remote.get().peel_to_commit()?;
                let mut local = self.repo.branch(name, &commit, false)?;
                local.set_upstream(Some(&format!("origin/{}", name)))?;
                local
            }
            Err(e) => return Err(e.into()),
        };

        let refname = branch
            .get()
            .name()
            .ok_or_else(|| Error::Git(format!("Branch '{}' has a non-UTF-8 name", name)))?
            .to_string();
        let target = branch.get().peel(git2::ObjectType::Commit)?;

        self.repo
            .checkout_tree(&target, Some(CheckoutBuilder::new().safe()))
            .map_err(|e| Error::Git(format!("Checkout of '{}' failed: {}", name, e.message())))?;
        self.repo.set_head(&refname)?;

        Ok(())
    }

    /// Create (or reset) `name` and check it out
    ///
    /// Starts from `origin/<name>` when the remote already has the branch,
    /// otherwise from the current HEAD.
    pub fn start_branch(&self, name: &str) -> Result<()> {
        let base = match self
            .repo
            .find_branch(&format!("origin/{}", name), BranchType::Remote)
        {
            Ok(remote) => remote.get().peel_to_commit()?,
            Err(_) => self.repo.head()?.peel_to_commit()?,
        };
        self.repo.branch(name, &base, true)?;
        self.checkout_branch(name)
    }

    /// Delete a local branch
    ///
    /// Fails if the branch does not exist or is currently checked out.
    pub fn delete_local_branch(&self, name: &str) -> Result<()> {
        let mut branch = self
            .repo
            .find_branch(name, BranchType::Local)
            .map_err(|_| Error::Git(format!("Local branch '{}' not found", name)))?;

        branch
            .delete()
            .map_err(|e| Error::Git(format!("Failed to delete branch '{}': {}", name, e.message())))
    }

    /// List all local branches
    pub fn list_local_branches(&self) -> Result<Vec<String>> {
        let mut branches = Vec::new();

        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name().ok().flatten() {
                branches.push(name.to_string());
            }
        }

        Ok(branches)
    }

    /// Resolve a revision (tag, branch, sha) to a commit id
    pub fn resolve_commit(&self, rev: &str) -> Result<String> {
        let commit = self
            .repo
            .revparse_single(rev)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| Error::Git(format!("Revision '{}' not found", rev)))?;
        Ok(commit.id().to_string())
    }

    /// The nearest tag reachable from the parent of `tag`, if any
    pub fn previous_tag(&self, tag: &str) -> Result<Option<String>> {
        let commit = self
            .repo
            .revparse_single(tag)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| Error::Git(format!("Tag '{}' not found", tag)))?;

        let parent = match commit.parent(0) {
            Ok(parent) => parent,
            Err(_) => return Ok(None),
        };

        let mut options = DescribeOptions::new();
        options.describe_tags();
        let described = match parent.as_object().describe(&options) {
            Ok(d) => d,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut format = DescribeFormatOptions::new();
        format.abbreviated_size(0);
        Ok(Some(described.format(Some(&format))?))
    }

    /// First lines of the commit messages in `from..to`, newest first
    ///
    /// With no `from`, walks the whole history of `to`.
    pub fn commit_subjects(&self, from: Option<&str>, to: &str) -> Result<Vec<String>> {
        let mut walk = self.repo.revwalk()?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL)?;
        walk.push(self.repo.revparse_single(to)?.peel_to_commit()?.id())?;
        if let Some(from) = from {
            walk.hide(self.repo.revparse_single(from)?.peel_to_commit()?.id())?;
        }

        let mut subjects = Vec::new();
        for oid in walk {
            let commit = self.repo.find_commit(oid?)?;
            subjects.push(commit.summary().unwrap_or_default().to_string());
        }
        Ok(subjects)
    }

    /// Stage everything and commit it on HEAD
    pub fn commit_all(&self, message: &str) -> Result<String> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree = self.repo.find_tree(index.write_tree()?)?;
        let parent = self.repo.head()?.peel_to_commit()?;
        let signature = self
            .repo
            .signature()
            .or_else(|_| git2::Signature::now("relbot", "relbot@users.noreply.github.com"))?;

        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])?;
        Ok(oid.to_string())
    }

    /// Get access to the underlying git2 repository
    pub fn inner(&self) -> &Repository {
        &self.repo
    }
}
