//! In-memory collaborators and archive builders for unit tests

use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::download::Downloader;
use crate::error::{PullError, Result};
use crate::git::{CloneOptions, ClonedRepository, GitClient};
use crate::github::{Release, ReleaseClient};
use crate::helm::{OciReference, RegistryClient};

/// Build a tar.gz holding `files` at the given paths
pub fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Build a tar.gz with a single entry whose name skips the builder's path checks
pub fn tar_gz_raw(name: &str, content: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_old();
    header.as_old_mut().name[..name.len()].copy_from_slice(name.as_bytes());
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    builder.append(&header, content.as_bytes()).unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

/// Build a zip holding `files` at the given paths
pub fn zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (path, content) in files {
        writer
            .start_file(*path, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Serves fixed bodies by URL and records every request
#[derive(Default)]
pub struct FakeDownloader {
    bodies: HashMap<String, Vec<u8>>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn download(
        &self,
        cancel: &CancellationToken,
        url: &str,
        local_path: &Path,
    ) -> Result<u64> {
        if cancel.is_cancelled() {
            return Err(PullError::Cancelled);
        }
        self.requests.lock().unwrap().push(url.to_string());
        let body = self.bodies.get(url).ok_or_else(|| PullError::HttpError {
            status: 404,
            message: format!("Request to {} failed", url),
        })?;
        if let Some(parent) = local_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(local_path, body)?;
        Ok(body.len() as u64)
    }
}

/// Writes a fixed tree on clone and records what was asked of it
#[derive(Default)]
pub struct FakeGitClient {
    files: Vec<(String, String)>,
    head: String,
    fail_checkout: bool,
    pub clones: Mutex<Vec<CloneOptions>>,
    pub checkouts: Arc<Mutex<Vec<(String, bool)>>>,
}

impl FakeGitClient {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
            head: "0000000000000000000000000000000000000001".to_string(),
            ..Default::default()
        }
    }

    pub fn with_head(mut self, head: &str) -> Self {
        self.head = head.to_string();
        self
    }

    pub fn failing_checkout(mut self) -> Self {
        self.fail_checkout = true;
        self
    }

    pub fn clone_requests(&self) -> Vec<CloneOptions> {
        self.clones.lock().unwrap().clone()
    }

    pub fn checkout_calls(&self) -> Vec<(String, bool)> {
        self.checkouts.lock().unwrap().clone()
    }
}

struct FakeRepository {
    head: String,
    fail_checkout: bool,
    checkouts: Arc<Mutex<Vec<(String, bool)>>>,
}

impl ClonedRepository for FakeRepository {
    fn checkout(&self, commit: &str, force: bool) -> Result<()> {
        self.checkouts
            .lock()
            .unwrap()
            .push((commit.to_string(), force));
        if self.fail_checkout {
            return Err(PullError::Git {
                message: format!("object not found - no match for id ({})", commit),
            });
        }
        Ok(())
    }

    fn head_commit(&self) -> Result<String> {
        Ok(self.head.clone())
    }
}

#[async_trait]
impl GitClient for FakeGitClient {
    async fn clone_repo(
        &self,
        cancel: &CancellationToken,
        directory: &Path,
        options: &CloneOptions,
    ) -> Result<Box<dyn ClonedRepository>> {
        if cancel.is_cancelled() {
            return Err(PullError::Cancelled);
        }
        self.clones.lock().unwrap().push(options.clone());
        std::fs::create_dir_all(directory.join(".git"))?;
        std::fs::write(directory.join(".git/HEAD"), "ref: refs/heads/main\n")?;
        for (path, content) in &self.files {
            let target = directory.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, content)?;
        }
        Ok(Box::new(FakeRepository {
            head: self.head.clone(),
            fail_checkout: self.fail_checkout,
            checkouts: Arc::clone(&self.checkouts),
        }))
    }
}

/// Answers every release query with the same release
pub struct FakeReleaseClient {
    release: Release,
    pub queries: Mutex<Vec<String>>,
}

impl FakeReleaseClient {
    pub fn new(release: Release) -> Self {
        Self {
            release,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queried(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReleaseClient for FakeReleaseClient {
    async fn get_release_by_tag(
        &self,
        _cancel: &CancellationToken,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<Release> {
        self.queries
            .lock()
            .unwrap()
            .push(format!("{}/{}@{}", owner, repo, tag));
        Ok(self.release.clone())
    }

    async fn get_latest_release(
        &self,
        _cancel: &CancellationToken,
        owner: &str,
        repo: &str,
    ) -> Result<Release> {
        self.queries
            .lock()
            .unwrap()
            .push(format!("{}/{}@latest", owner, repo));
        Ok(self.release.clone())
    }
}

/// Registry holding one chart under several tags
pub struct FakeRegistryClient {
    tags: Vec<String>,
    chart: Vec<u8>,
    pub pulls: Mutex<Vec<String>>,
}

impl FakeRegistryClient {
    pub fn new(tags: &[&str], chart: Vec<u8>) -> Self {
        Self {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            chart,
            pulls: Mutex::new(Vec::new()),
        }
    }

    pub fn pulled(&self) -> Vec<String> {
        self.pulls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RegistryClient for FakeRegistryClient {
    async fn pull_chart(
        &self,
        _cancel: &CancellationToken,
        reference: &OciReference,
        version: &str,
    ) -> Result<Vec<u8>> {
        self.pulls
            .lock()
            .unwrap()
            .push(format!("{}:{}", reference, version));
        Ok(self.chart.clone())
    }

    async fn list_tags(
        &self,
        _cancel: &CancellationToken,
        _reference: &OciReference,
    ) -> Result<Vec<String>> {
        Ok(self.tags.clone())
    }
}
