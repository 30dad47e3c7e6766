//! Model file resolution — local directory or Hub download with a disk cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use ijwi_core::types::ServiceConfig;

use crate::error::LoadError;

pub const CONFIG_FILE: &str = "config.json";
pub const VOCAB_FILE: &str = "vocab.json";
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest silence tolerated between bytes of a response.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Paths of everything needed to build a voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub vocab: PathBuf,
    pub tokenizer_config: Option<PathBuf>,
    pub onnx: PathBuf,
}

/// Where a model name points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Local(PathBuf),
    Hub { repo: String, revision: String },
}

impl ModelSource {
    pub fn from_config(config: &ServiceConfig) -> Self {
        let path = Path::new(&config.model_name);
        if path.is_dir() {
            Self::Local(path.to_path_buf())
        } else {
            Self::Hub {
                repo: config.model_name.clone(),
                revision: config.model_revision.clone(),
            }
        }
    }
}

/// Download URL of one file in a Hub repo.
pub fn file_url(endpoint: &str, repo: &str, revision: &str, file: &str) -> String {
    format!("{endpoint}/{repo}/resolve/{revision}/{file}")
}

/// Cache directory for one repo revision (`org/name` → `org--name/rev`).
pub fn cache_dir(root: &Path, repo: &str, revision: &str) -> PathBuf {
    root.join(repo.replace('/', "--")).join(revision)
}

/// Locate (downloading if needed) every file the model needs.
pub async fn resolve(config: &ServiceConfig) -> Result<ModelFiles, LoadError> {
    match ModelSource::from_config(config) {
        ModelSource::Local(dir) => resolve_local(&dir, &config.onnx_file),
        ModelSource::Hub { repo, revision } => {
            let fetcher = HubFetcher::new(config, &repo, &revision)?;
            Ok(ModelFiles {
                config: fetcher.fetch(CONFIG_FILE).await?,
                vocab: fetcher.fetch(VOCAB_FILE).await?,
                tokenizer_config: fetcher.fetch_optional(TOKENIZER_CONFIG_FILE).await?,
                onnx: fetcher.fetch(&config.onnx_file).await?,
            })
        }
    }
}

/// Resolve files inside a local model directory.
pub fn resolve_local(dir: &Path, onnx_file: &str) -> Result<ModelFiles, LoadError> {
    let require = |name: &str| {
        let path = dir.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(LoadError::Io {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
                path,
            })
        }
    };
    let tokenizer_config = dir.join(TOKENIZER_CONFIG_FILE);

    Ok(ModelFiles {
        config: require(CONFIG_FILE)?,
        vocab: require(VOCAB_FILE)?,
        tokenizer_config: tokenizer_config.is_file().then_some(tokenizer_config),
        onnx: require(onnx_file)?,
    })
}

struct HubFetcher<'a> {
    client: reqwest::Client,
    endpoint: &'a str,
    repo: &'a str,
    revision: &'a str,
    dir: PathBuf,
}

impl<'a> HubFetcher<'a> {
    fn new(config: &'a ServiceConfig, repo: &'a str, revision: &'a str) -> Result<Self, LoadError> {
        Self::with_read_timeout(config, repo, revision, READ_TIMEOUT)
    }

    fn with_read_timeout(
        config: &'a ServiceConfig,
        repo: &'a str,
        revision: &'a str,
        read_timeout: Duration,
    ) -> Result<Self, LoadError> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Some(token) = &config.hub_token {
            if let Ok(value) = format!("Bearer {token}").parse() {
                headers.insert(reqwest::header::AUTHORIZATION, value);
            }
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(read_timeout)
            .build()
            .map_err(|source| LoadError::Http {
                url: config.hub_endpoint.clone(),
                source,
            })?;

        Ok(Self {
            client,
            endpoint: &config.hub_endpoint,
            repo,
            revision,
            dir: cache_dir(&config.cache_dir, repo, revision),
        })
    }

    async fn fetch(&self, file: &str) -> Result<PathBuf, LoadError> {
        match self.download(file).await? {
            Some(path) => Ok(path),
            None => Err(LoadError::HttpStatus {
                url: file_url(self.endpoint, self.repo, self.revision, file),
                status: 404,
            }),
        }
    }

    async fn fetch_optional(&self, file: &str) -> Result<Option<PathBuf>, LoadError> {
        self.download(file).await
    }

    /// Download one file into the cache. `Ok(None)` means the repo does not
    /// have it.
    async fn download(&self, file: &str) -> Result<Option<PathBuf>, LoadError> {
        let dest = self.dir.join(file);
        if dest.is_file() {
            debug!(file, "using cached model file");
            return Ok(Some(dest));
        }

        let parent = dest.parent().unwrap_or(&self.dir).to_path_buf();
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|source| LoadError::Io {
                path: parent.clone(),
                source,
            })?;

        let url = file_url(self.endpoint, self.repo, self.revision, file);
        info!(%url, "downloading model file");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| LoadError::Http {
                url: url.clone(),
                source,
            })?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(LoadError::HttpStatus {
                url,
                status: resp.status().as_u16(),
            });
        }

        let total = resp.content_length();
        let partial = dest.with_file_name(format!(
            "{}.partial",
            dest.file_name().and_then(|n| n.to_str()).unwrap_or(file)
        ));
        let io_err = |source| LoadError::Io {
            path: partial.clone(),
            source,
        };

        let mut out = tokio::fs::File::create(&partial).await.map_err(io_err)?;
        let mut bytes_done: u64 = 0;
        let mut last_logged_pct = 0u64;
        let mut stream = resp.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| LoadError::Http {
                url: url.clone(),
                source,
            })?;
            out.write_all(&chunk).await.map_err(io_err)?;

            bytes_done += chunk.len() as u64;
            if let Some(total) = total.filter(|&t| t > 0) {
                let pct = bytes_done * 100 / total;
                if pct >= last_logged_pct + 10 {
                    last_logged_pct = pct;
                    debug!(file, pct, bytes_done, total, "download progress");
                }
            }
        }

        out.flush().await.map_err(io_err)?;
        drop(out);

        tokio::fs::rename(&partial, &dest)
            .await
            .map_err(|source| LoadError::Io {
                path: dest.clone(),
                source,
            })?;

        info!(file, bytes = bytes_done, "model file downloaded");
        Ok(Some(dest))
    }
}
