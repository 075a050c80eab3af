//! GitHub repository as a static image host.
//!
//! Files are written with the contents API and served from
//! `content_prefix` (typically `raw.githubusercontent.com`). Re-uploading a
//! path overwrites it: the existing blob sha is looked up first.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use super::http::{build_client, check_status, read_json, send_with_retry};
use super::{CollaboratorError, FileUpload, ImageHost, Result, UploadReport};
use crate::config::{GithubSettings, TimeoutConfig};
use crate::rate_limit::RateLimiter;

const SERVICE: &str = "github";
const ACCEPT: &str = "application/vnd.github+json";
const UPLOAD_RETRIES: u32 = 3;

#[derive(Debug, Deserialize)]
struct ContentEntry {
    sha: String,
}

/// Join non-empty path segments with `/`, percent-encoding each.
fn encoded_path<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    segments
        .into_iter()
        .flat_map(|s| s.split('/'))
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Image host writing into one GitHub repository branch.
pub struct GithubImageHost {
    settings: GithubSettings,
    owner: String,
    repo: String,
    client: reqwest::Client,
    health_client: reqwest::Client,
    limiter: RateLimiter,
}

impl std::fmt::Debug for GithubImageHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubImageHost")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("branch", &self.settings.branch)
            .finish()
    }
}

impl GithubImageHost {
    pub fn new(settings: GithubSettings, timeouts: &TimeoutConfig) -> Result<Self> {
        let (owner, repo) = settings.owner_repo().ok_or_else(|| {
            CollaboratorError::request(
                SERVICE,
                format!("repository `{}` is not owner/repo", settings.repository),
            )
        })?;
        Ok(Self {
            limiter: RateLimiter::per_minute("github", settings.uploads_per_minute),
            client: build_client(SERVICE, Duration::from_secs(timeouts.request_timeout_secs))?,
            health_client: build_client(SERVICE, Duration::from_secs(timeouts.health_timeout_secs))?,
            owner,
            repo,
            settings,
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}{path}", self.settings.api_base_url.trim_end_matches('/'))
    }

    /// Contents API URL for a path inside the repository.
    fn contents_url(&self, repo_path: &str) -> String {
        self.api(&format!(
            "/repos/{}/{}/contents/{repo_path}",
            self.owner, self.repo
        ))
    }

    /// Repository path for a file in a run folder.
    pub fn repo_path(&self, remote_folder: &str, file_name: &str) -> String {
        encoded_path([self.settings.remote_root.as_str(), remote_folder, file_name])
    }

    async fn existing_sha(&self, repo_path: &str) -> Result<Option<String>> {
        self.limiter.acquire().await;
        let url = self.contents_url(repo_path);
        let response = self
            .client
            .get(&url)
            .query(&[("ref", self.settings.branch.as_str())])
            .bearer_auth(&self.settings.token)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, &e))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(SERVICE, response).await?;
        let entry: ContentEntry = read_json(SERVICE, response).await?;
        Ok(Some(entry.sha))
    }

    /// Create or overwrite one file.
    pub async fn put_file(&self, repo_path: &str, bytes: &[u8]) -> Result<()> {
        let sha = self.existing_sha(repo_path).await?;
        let mut body = serde_json::json!({
            "message": format!("Upload {repo_path}"),
            "content": BASE64.encode(bytes),
            "branch": self.settings.branch,
        });
        if let (Some(sha), Some(obj)) = (sha, body.as_object_mut()) {
            obj.insert("sha".into(), serde_json::Value::String(sha));
        }

        let url = self.contents_url(repo_path);
        send_with_retry(SERVICE, UPLOAD_RETRIES, Some(&self.limiter), || {
            self.client
                .put(&url)
                .bearer_auth(&self.settings.token)
                .header(reqwest::header::ACCEPT, ACCEPT)
                .json(&body)
        })
        .await?;
        tracing::debug!(path = repo_path, "file uploaded");
        Ok(())
    }
}

#[async_trait]
impl ImageHost for GithubImageHost {
    async fn upload_dir(&self, local_dir: &Path, remote_folder: &str) -> Result<UploadReport> {
        let entries = std::fs::read_dir(local_dir).map_err(|e| {
            CollaboratorError::request(SERVICE, format!("cannot read {}: {e}", local_dir.display()))
        })?;
        let mut files: Vec<_> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        let mut report = UploadReport::default();
        for path in files {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let outcome = match tokio::fs::read(&path).await {
                Ok(bytes) => self
                    .put_file(&self.repo_path(remote_folder, &file_name), &bytes)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(format!("read failed: {e}")),
            };
            if let Err(error) = &outcome {
                tracing::warn!(file = %file_name, %error, "image upload failed");
            }
            report.files.push(FileUpload {
                file_name,
                error: outcome.err(),
            });
        }

        tracing::info!(
            folder = remote_folder,
            uploaded = report.uploaded(),
            total = report.files.len(),
            "run folder uploaded"
        );
        Ok(report)
    }

    /// Served from the same repository path [`GithubImageHost::repo_path`]
    /// writes to.
    fn public_url(&self, remote_folder: &str, file_name: &str) -> String {
        format!(
            "{}/{}",
            self.settings.content_prefix.trim_end_matches('/'),
            self.repo_path(remote_folder, file_name)
        )
    }

    async fn status(&self) -> Result<()> {
        let response = self
            .health_client
            .get(self.api(&format!("/repos/{}/{}", self.owner, self.repo)))
            .bearer_auth(&self.settings.token)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .send()
            .await
            .map_err(|e| CollaboratorError::from_reqwest(SERVICE, &e))?;
        check_status(SERVICE, response).await.map(|_| ())
    }
}
