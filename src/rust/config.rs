//! Process configuration: command-line flags with environment fallbacks.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::classifier::DEFAULT_MAX_SEQUENCE_LENGTH;
use crate::model_manager::{ModelManager, ModelSource, DEFAULT_MODEL_ID};
use crate::runtime::RuntimeConfig;
use crate::service::ModelLocation;

pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_PREFIX: &str = "/api";

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Multi-label emotion analysis API", long_about = None)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "EMOTION_API_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path prefix all routes are mounted under
    #[arg(long, env = "EMOTION_API_PREFIX", default_value = DEFAULT_PREFIX)]
    pub prefix: String,

    /// Pretrained model repository on the hub
    #[arg(long, env = "EMOTION_MODEL_ID", default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    /// Repository revision (branch, tag or commit)
    #[arg(long, env = "EMOTION_MODEL_REVISION", default_value = "main")]
    pub revision: String,

    /// Path of the ONNX export inside the repository
    #[arg(long, env = "EMOTION_MODEL_FILE", default_value = "onnx/model.onnx")]
    pub model_file: String,

    /// Expected SHA-256 of the ONNX file
    #[arg(long, env = "EMOTION_MODEL_SHA256")]
    pub model_sha256: Option<String>,

    /// Load model.onnx, tokenizer.json and config.json from this directory instead of downloading
    #[arg(long, env = "EMOTION_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    /// Cache root for downloaded artifacts
    #[arg(long, env = "EMOTION_API_CACHE")]
    pub cache_dir: Option<PathBuf>,

    /// Maximum tokens per input; longer text is truncated
    #[arg(long, default_value_t = DEFAULT_MAX_SEQUENCE_LENGTH)]
    pub max_sequence_length: usize,

    /// ONNX Runtime inter-op threads (0 = runtime default)
    #[arg(long, env = "EMOTION_INTER_THREADS", default_value_t = 0)]
    pub inter_threads: usize,

    /// ONNX Runtime intra-op threads (0 = runtime default)
    #[arg(long, env = "EMOTION_INTRA_THREADS", default_value_t = 0)]
    pub intra_threads: usize,

    /// Force a fresh download of the model files
    #[arg(short, long)]
    pub fresh: bool,

    /// Load the model at startup instead of on the first request
    #[arg(long)]
    pub warmup: bool,
}

impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Route prefix with a leading slash and no trailing slash; `""` mounts at the root.
    pub fn route_prefix(&self) -> String {
        let trimmed = self.prefix.trim().trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }

    pub fn model_source(&self) -> ModelSource {
        let mut source = ModelSource::new(&self.model_id);
        source.revision = self.revision.clone();
        source.model_file = self.model_file.clone();
        source.model_sha256 = self.model_sha256.clone();
        source
    }

    pub fn model_manager(&self) -> io::Result<ModelManager> {
        match &self.cache_dir {
            Some(dir) => ModelManager::new(dir.join("models")),
            None => ModelManager::new_default(),
        }
    }

    pub fn model_location(&self) -> io::Result<ModelLocation> {
        Ok(match &self.model_dir {
            Some(dir) => ModelLocation::Local(dir.clone()),
            None => ModelLocation::Hub {
                manager: self.model_manager()?,
                source: self.model_source(),
            },
        })
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig::default().with_threads(self.inter_threads, self.intra_threads)
    }

    /// Name reported by the health endpoint.
    pub fn model_name(&self) -> String {
        match &self.model_dir {
            Some(dir) => dir.display().to_string(),
            None => self.model_id.clone(),
        }
    }
}
