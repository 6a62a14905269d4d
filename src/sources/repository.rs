use anyhow::{Context, Result};
use git2::build::RepoBuilder;
use git2::{Cred, CredentialType, FetchOptions, RemoteCallbacks};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Give up after this many credential attempts instead of letting libgit2 retry forever
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// A repository cloned into a temporary directory.
///
/// The directory (and everything in it) is removed when this is dropped.
#[derive(Debug)]
pub struct ClonedRepository {
    root: PathBuf,
    _dir: TempDir,
}

impl ClonedRepository {
    /// Clone only the latest commit of `url` into a fresh temporary directory.
    pub fn clone_shallow(url: &str) -> Result<ClonedRepository> {
        let dir = tempfile::Builder::new()
            .prefix("md-book-")
            .tempdir()
            .with_context(|| "Failed to create temporary directory for clone")?;
        let root = dir.path().join("repo");

        log::info!("Cloning {url} into {}", root.display());

        let mut attempts = 0;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("authentication failed"));
            }

            if allowed.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(username.unwrap_or("git"));
            }
            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                if let Ok(config) = git2::Config::open_default() {
                    return Cred::credential_helper(&config, url, username);
                }
            }
            Cred::default()
        });

        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(callbacks);
        fetch.depth(1);

        RepoBuilder::new()
            .fetch_options(fetch)
            .clone(url, &root)
            .with_context(|| format!("Failed to clone {url}"))?;

        Ok(ClonedRepository { root, _dir: dir })
    }

    /// Where the working tree was checked out.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
