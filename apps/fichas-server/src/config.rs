//! Configuration management for Fichas Server

use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub records: RecordsConfig,
    pub ocr: OcrConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub mode: StorageMode,
    /// Remote upload endpoint (used when `mode` is `api`)
    pub upload_url: String,
    /// Bucket hint forwarded to the upload endpoint
    pub upload_bucket: Option<String>,
    pub s3: S3Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Multipart POST to a remote upload API
    Api,
    /// Direct put into an S3-compatible bucket
    S3,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: Option<String>,
    /// Public base URL; when absent, presigned URLs are returned
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordsConfig {
    pub create_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub providers: Vec<String>,
    pub language: String,
    pub tesseract_path: PathBuf,
    pub tessdata_dir: PathBuf,
    pub tessdata_url: String,
    pub ollama_url: String,
    pub ollama_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub ocr_batch_size: usize,
    pub band_jpeg_quality: u8,
    pub storage_format: StorageFormat,
    pub storage_quality: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    Jpeg,
    Webp,
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Default tessdata location under the user's local data directory
pub fn default_tessdata_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fichas")
        .join("tessdata")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3100,
            },
            storage: StorageConfig {
                mode: StorageMode::Api,
                upload_url: "http://localhost:3000/api/minio/upload".to_string(),
                upload_bucket: None,
                s3: S3Config {
                    endpoint: "http://localhost:9000".to_string(),
                    bucket: "fichas".to_string(),
                    access_key: "admin".to_string(),
                    secret_key: "password123".to_string(),
                    region: Some("us-east-1".to_string()),
                    public_url: None,
                },
            },
            records: RecordsConfig {
                create_url: "http://localhost:3000/api/fichas".to_string(),
            },
            ocr: OcrConfig {
                providers: vec!["tesseract".to_string()],
                language: "por".to_string(),
                tesseract_path: PathBuf::from("tesseract"),
                tessdata_dir: default_tessdata_dir(),
                tessdata_url: "https://github.com/tesseract-ocr/tessdata/raw/main".to_string(),
                ollama_url: "http://localhost:11434".to_string(),
                ollama_model: "llava".to_string(),
            },
            pipeline: PipelineConfig {
                ocr_batch_size: 5,
                band_jpeg_quality: 92,
                storage_format: StorageFormat::Jpeg,
                storage_quality: 80,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let mode = match env::var("STORAGE_MODE").unwrap_or_else(|_| "api".to_string()).as_str() {
            "api" => StorageMode::Api,
            "s3" | "minio" => StorageMode::S3,
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_MODE",
                    value: other.to_string(),
                })
            }
        };

        // Credentials are only mandatory when writing to the bucket directly
        let s3 = if mode == StorageMode::S3 {
            S3Config {
                endpoint: required("S3_ENDPOINT")?,
                bucket: required("S3_BUCKET")?,
                access_key: required("S3_ACCESS_KEY")?,
                secret_key: required("S3_SECRET_KEY")?,
                region: env::var("S3_REGION").ok(),
                public_url: env::var("S3_PUBLIC_URL").ok(),
            }
        } else {
            defaults.storage.s3
        };

        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_or("SERVER_PORT", defaults.server.port)?,
            },
            storage: StorageConfig {
                mode,
                upload_url: env::var("UPLOAD_API_URL").unwrap_or(defaults.storage.upload_url),
                upload_bucket: env::var("UPLOAD_BUCKET").ok(),
                s3,
            },
            records: RecordsConfig {
                create_url: env::var("RECORDS_API_URL").unwrap_or(defaults.records.create_url),
            },
            ocr: OcrConfig {
                providers: env::var("OCR_PROVIDERS")
                    .map(|v| parse_list(&v))
                    .unwrap_or(defaults.ocr.providers),
                language: env::var("OCR_LANGUAGE").unwrap_or(defaults.ocr.language),
                tesseract_path: env::var("TESSERACT_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.ocr.tesseract_path),
                tessdata_dir: env::var("TESSDATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.ocr.tessdata_dir),
                tessdata_url: env::var("TESSDATA_URL").unwrap_or(defaults.ocr.tessdata_url),
                ollama_url: env::var("OLLAMA_URL").unwrap_or(defaults.ocr.ollama_url),
                ollama_model: env::var("OLLAMA_MODEL").unwrap_or(defaults.ocr.ollama_model),
            },
            pipeline: PipelineConfig {
                ocr_batch_size: parse_or("OCR_BATCH_SIZE", defaults.pipeline.ocr_batch_size)?.max(1),
                band_jpeg_quality: parse_quality("BAND_JPEG_QUALITY", defaults.pipeline.band_jpeg_quality)?,
                storage_format: match env::var("STORAGE_FORMAT").ok().as_deref() {
                    None | Some("jpeg") | Some("jpg") => StorageFormat::Jpeg,
                    Some("webp") => StorageFormat::Webp,
                    Some(other) => {
                        return Err(ConfigError::Invalid {
                            key: "STORAGE_FORMAT",
                            value: other.to_string(),
                        })
                    }
                },
                storage_quality: parse_quality("STORAGE_QUALITY", defaults.pipeline.storage_quality)?,
            },
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

fn parse_quality(key: &'static str, default: u8) -> Result<u8, ConfigError> {
    let quality: u8 = parse_or(key, default)?;
    if quality == 0 || quality > 100 {
        return Err(ConfigError::Invalid {
            key,
            value: quality.to_string(),
        });
    }
    Ok(quality)
}

/// Split a comma-separated list, dropping blanks
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
