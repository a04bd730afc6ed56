//! End-to-end pulls through the dispatcher against local HTTP servers and repositories

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use solas_pull::jsonnet::{JSONNET_FILE, JsonnetFile, LOCK_FILE};
use solas_pull::{
    Artifact, CancellationToken, ErrorKind, Git2Client, GitClient, GitHubClient, HttpDownloader,
    JsonnetBundler, PullError, PullMethod, Puller, Strategy,
};

fn tar_gz(files: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

fn zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, content) in files {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

async fn serve(server: &MockServer, at: &str, body: Vec<u8>) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

fn http_puller(server: &MockServer) -> Puller {
    Puller::builder()
        .downloader(Arc::new(HttpDownloader::public().unwrap()))
        .release_client(Arc::new(GitHubClient::new(server.uri(), None).unwrap()))
        .build()
}

#[tokio::test]
async fn http_archive_is_flattened_into_destination() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/releases/tool-1.2.0.tar.gz",
        tar_gz(&[("tool-1.2.0/bin/tool", "#!/bin/sh\n"), ("tool-1.2.0/LICENSE", "MIT")]),
    )
    .await;
    let temp = TempDir::new().unwrap();

    let artifact = Artifact::new("tool", temp.path())
        .with_url(format!("{}/releases/tool-1.2.0.tar.gz", server.uri()))
        .with_version("1.2.0");
    let result = http_puller(&server)
        .pull(&CancellationToken::new(), PullMethod::HttpArchive, &artifact)
        .await
        .unwrap();

    assert_eq!(result.directory, temp.path().join("tool"));
    assert_eq!(result.version, "1.2.0");
    assert!(temp.path().join("tool/tool").is_file());
    assert!(temp.path().join("tool/LICENSE").is_file());
}

#[tokio::test]
async fn non_archive_url_is_rejected_without_download() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    let artifact = Artifact::new("tool", temp.path())
        .with_url(format!("{}/releases/tool.exe", server.uri()));
    let err = http_puller(&server)
        .pull(&CancellationToken::new(), PullMethod::HttpArchive, &artifact)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("not a compressed file"));
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(!temp.path().join("tool").exists());
}

#[tokio::test]
async fn existing_destination_is_left_untouched() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    std::fs::create_dir(temp.path().join("tool")).unwrap();
    std::fs::write(temp.path().join("tool/keep.txt"), "mine").unwrap();

    let artifact = Artifact::new("tool", temp.path())
        .with_url(format!("{}/tool.tgz", server.uri()));
    let err = http_puller(&server)
        .pull(&CancellationToken::new(), PullMethod::HttpArchive, &artifact)
        .await
        .unwrap_err();

    assert!(matches!(err, PullError::DestinationExists { .. }));
    assert_eq!(
        std::fs::read_to_string(temp.path().join("tool/keep.txt")).unwrap(),
        "mine"
    );
}

#[tokio::test]
async fn failed_download_leaves_nothing_behind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();

    let artifact = Artifact::new("missing", temp.path())
        .with_url(format!("{}/missing.zip", server.uri()));
    let err = http_puller(&server)
        .pull(&CancellationToken::new(), PullMethod::HttpArchive, &artifact)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Remote);
    assert!(err.to_string().starts_with("downloading archive: "));
    assert!(!temp.path().join("missing").exists());
}

#[tokio::test]
async fn github_release_prefers_zip_asset() {
    let server = MockServer::start().await;
    let release = serde_json::json!({
        "name": "v0.5.0",
        "tag_name": "v0.5.0",
        "assets": [
            {
                "name": "kubeconform-v0.5.0.tar.gz",
                "browser_download_url": format!("{}/dl/kubeconform-v0.5.0.tar.gz", server.uri())
            },
            {
                "name": "kubeconform-v0.5.0.zip",
                "browser_download_url": format!("{}/dl/kubeconform-v0.5.0.zip", server.uri())
            }
        ]
    });
    Mock::given(method("GET"))
        .and(path("/repos/yannh/kubeconform/releases/tags/v0.5.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(release))
        .mount(&server)
        .await;
    serve(
        &server,
        "/dl/kubeconform-v0.5.0.zip",
        zip(&[("kubeconform", "zip build")]),
    )
    .await;
    let temp = TempDir::new().unwrap();

    let artifact = Artifact::new("kubeconform", temp.path())
        .with_repository("yannh/kubeconform")
        .with_version("v0.5.0")
        .with_asset_name("kubeconform-v0.5.0");
    let result = http_puller(&server)
        .pull(&CancellationToken::new(), PullMethod::GithubRelease, &artifact)
        .await
        .unwrap();

    assert_eq!(result.directory, temp.path().join("kubeconform"));
    assert_eq!(result.version, "v0.5.0");
    assert_eq!(
        std::fs::read_to_string(temp.path().join("kubeconform/kubeconform")).unwrap(),
        "zip build"
    );
}

#[tokio::test]
async fn helm_chart_from_http_repository() {
    let server = MockServer::start().await;
    let index = "apiVersion: v1\nentries:\n  web:\n    - name: web\n      version: 1.4.0\n      urls: [charts/web-1.4.0.tgz]\n";
    serve(&server, "/stable/index.yaml", index.as_bytes().to_vec()).await;
    serve(
        &server,
        "/stable/charts/web-1.4.0.tgz",
        tar_gz(&[
            ("web/Chart.yaml", "apiVersion: v2\nname: web\nversion: 1.4.0\n"),
            ("web/templates/service.yaml", "kind: Service\n"),
        ]),
    )
    .await;
    let temp = TempDir::new().unwrap();

    let artifact = Artifact::new("web", temp.path())
        .with_repository(format!("{}/stable", server.uri()));
    let result = http_puller(&server)
        .pull(&CancellationToken::new(), PullMethod::HelmChart, &artifact)
        .await
        .unwrap();

    assert_eq!(result.version, "1.4.0");
    // Charts keep their layout
    assert!(temp.path().join("web/templates/service.yaml").is_file());
}

fn commit_all(repo: &git2::Repository, files: &[(&str, &str)]) -> String {
    let workdir = repo.workdir().unwrap().to_path_buf();
    let mut index = repo.index().unwrap();
    for (name, content) in files {
        let file = workdir.join(name);
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, content).unwrap();
        index.add_path(Path::new(name)).unwrap();
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let signature = git2::Signature::now("Solas Test", "test@example.com").unwrap();
    let parents: Vec<git2::Commit> = repo
        .head()
        .ok()
        .map(|h| h.peel_to_commit().unwrap())
        .into_iter()
        .collect();
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, "commit", &tree, &parent_refs)
        .unwrap()
        .to_string()
}

fn init_origin(path: &Path) -> git2::Repository {
    let mut options = git2::RepositoryInitOptions::new();
    options.initial_head("main");
    git2::Repository::init_opts(path, &options).unwrap()
}

#[tokio::test]
async fn git_branch_checkout_drops_history() {
    let temp = TempDir::new().unwrap();
    let origin = init_origin(&temp.path().join("origin"));
    commit_all(&origin, &[("README.md", "hello"), ("lib/main.libsonnet", "{}")]);

    let puller = Puller::builder().git_client(Arc::new(Git2Client::new())).build();
    let artifact = Artifact::new("repo", temp.path().join("out"))
        .with_url(temp.path().join("origin").to_string_lossy())
        .with_branch("main");
    let result = puller
        .pull(&CancellationToken::new(), PullMethod::Git, &artifact)
        .await
        .unwrap();

    assert_eq!(result.version, "latest");
    assert!(result.directory.join("README.md").is_file());
    assert!(!result.directory.join(".git").exists());
}

#[tokio::test]
async fn cancelled_pull_does_not_start() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let artifact = Artifact::new("tool", temp.path())
        .with_url(format!("{}/tool.tgz", server.uri()));
    let err = http_puller(&server)
        .pull(&cancel, PullMethod::HttpArchive, &artifact)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn jsonnet_vendor_from_git_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let origin = init_origin(&temp.path().join("origin"));
    let head = commit_all(&origin, &[("main.libsonnet", "{ a: 1 }")]);

    let project = temp.path().join("project");
    std::fs::create_dir(&project).unwrap();
    std::fs::write(
        project.join(JSONNET_FILE),
        "{\n  \"version\": 1,\n  \"dependencies\": [],\n  \"legacyImports\": false\n}\n",
    )
    .unwrap();

    let remote = format!("https://git.example.com/team/libs.git@{}", head);
    let bundler = JsonnetBundler::new().with_client(Arc::new(LocalMirror {
        origin: temp.path().join("origin"),
    }));
    let artifact = Artifact::new("libs", &project).with_url(remote);

    let result = bundler
        .pull(&CancellationToken::new(), &artifact)
        .await
        .unwrap();
    assert_eq!(result.version, head);
    assert!(project.join("vendor/git.example.com/team/libs/main.libsonnet").is_file());

    let lock = std::fs::read(project.join(LOCK_FILE)).unwrap();
    let locked: JsonnetFile = serde_json::from_slice(&lock).unwrap();
    assert_eq!(locked.dependencies[0].version, head);

    bundler
        .pull(&CancellationToken::new(), &artifact)
        .await
        .unwrap();
    assert_eq!(std::fs::read(project.join(LOCK_FILE)).unwrap(), lock);
}

/// Clones a local repository whatever remote is asked for
struct LocalMirror {
    origin: std::path::PathBuf,
}

#[async_trait::async_trait]
impl GitClient for LocalMirror {
    async fn clone_repo(
        &self,
        cancel: &CancellationToken,
        directory: &Path,
        options: &solas_pull::git::CloneOptions,
    ) -> solas_pull::Result<Box<dyn solas_pull::git::ClonedRepository>> {
        let local = solas_pull::git::CloneOptions {
            url: self.origin.to_string_lossy().into_owned(),
            ..options.clone()
        };
        Git2Client::new().clone_repo(cancel, directory, &local).await
    }
}
