//! Repository coordinates for source links.
//!
//! The GitHub link on each page needs `server/owner/repo` and a branch.
//! In a GitHub Actions run these come from the `GITHUB_*` variables (already
//! folded into [`GithubConfig`]); locally they are read from the git checkout
//! under the sync root. If neither source knows the repository, pages are
//! synced without a source callout.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;
use tracing::debug;

use notion_sync_core::links::RepoContext;

use crate::config::GithubConfig;

const DEFAULT_SERVER_URL: &str = "https://github.com";

/// Build the repository context, filling gaps from git.
pub fn resolve(github: &GithubConfig, repo_dir: &Path) -> Option<RepoContext> {
    let remote = || git_remote_url(repo_dir).ok().and_then(|url| parse_remote(&url));

    let (repository, server_url) = match (&github.repository, &github.server_url) {
        (Some(repo), Some(server)) => (repo.clone(), server.clone()),
        (Some(repo), None) => (
            repo.clone(),
            remote()
                .map(|(server, _)| server)
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string()),
        ),
        (None, server) => {
            let (remote_server, repo) = remote()?;
            (repo, server.clone().unwrap_or(remote_server))
        }
    };

    let branch = github
        .branch
        .clone()
        .or_else(|| git_branch(repo_dir).ok())
        .unwrap_or_else(|| "main".to_string());

    debug!(%repository, %branch, %server_url, "resolved repository context");
    Some(RepoContext {
        server_url,
        repository,
        branch,
    })
}

/// Commit the sync runs from: `GITHUB_SHA` if set, else `HEAD`.
pub fn resolve_commit(github: &GithubConfig, repo_dir: &Path) -> Option<String> {
    github
        .sha
        .clone()
        .or_else(|| git_head_sha(repo_dir).ok())
}

/// Split a remote URL into `(server_url, owner/repo)`.
///
/// Handles `git@host:owner/repo.git`, `ssh://git@host/owner/repo.git`, and
/// `https://host/owner/repo(.git)`.
pub fn parse_remote(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let (host, path) = if let Some(rest) = url.strip_prefix("git@") {
        rest.split_once(':')?
    } else if let Some(rest) = url.strip_prefix("ssh://") {
        let rest = rest.split_once('@').map(|(_, r)| r).unwrap_or(rest);
        rest.split_once('/')?
    } else if let Some(rest) = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
    {
        let rest = rest.split_once('@').map(|(_, r)| r).unwrap_or(rest);
        rest.split_once('/')?
    } else {
        return None;
    };

    let host = host.split(':').next().unwrap_or(host);
    let repo = path.trim_matches('/').trim_end_matches(".git");
    if host.is_empty() || !repo.contains('/') {
        return None;
    }
    Some((format!("https://{}", host), repo.to_string()))
}

fn git(repo_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .with_context(|| format!("Failed to execute 'git {}'. Is git installed?", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", args.join(" "), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn git_remote_url(repo_dir: &Path) -> Result<String> {
    git(repo_dir, &["remote", "get-url", "origin"])
}

fn git_branch(repo_dir: &Path) -> Result<String> {
    let branch = git(repo_dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    if branch == "HEAD" {
        bail!("detached HEAD has no branch name");
    }
    Ok(branch)
}

fn git_head_sha(repo_dir: &Path) -> Result<String> {
    git(repo_dir, &["rev-parse", "HEAD"])
}
