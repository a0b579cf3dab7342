use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::ServiceStatus;

const DEFAULT_ADDR: &str = "0.0.0.0:5000";
// Matches the generated KBase clients' 30 minute default.
const DEFAULT_NJS_TIMEOUT_SECS: u64 = 30 * 60;
const DEFAULT_VERSION: &str = "0.0.1";
const DEFAULT_GIT_URL: &str = "https://github.com/briehl/narrative_job_mock.git";
const DEFAULT_GIT_COMMIT_HASH: &str = "f65ab0bdfcce7980fdc48cb5b1b46e8bd48f54cd";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub njs: NjsConfig,
    pub service: ServiceInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NjsConfig {
    pub url: String,
    pub timeout_secs: u64,
}

/// What the `status` method reports about this deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub version: String,
    pub git_url: String,
    pub git_commit_hash: String,
}

impl ServiceInfo {
    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            state: "OK".to_string(),
            message: String::new(),
            version: self.version.clone(),
            git_url: self.git_url.clone(),
            git_commit_hash: self.git_commit_hash.clone(),
        }
    }
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            git_url: DEFAULT_GIT_URL.to_string(),
            git_commit_hash: DEFAULT_GIT_COMMIT_HASH.to_string(),
        }
    }
}

impl Config {
    /// Reads the environment (and a `.env` file if present) without
    /// validating, so command line overrides can be applied first.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Config {
            server: ServerConfig {
                addr: std::env::var("SERVER_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string()),
            },
            njs: NjsConfig {
                url: std::env::var("NJSW_URL").unwrap_or_default(),
                timeout_secs: std::env::var("NJS_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_NJS_TIMEOUT_SECS),
            },
            service: ServiceInfo {
                version: std::env::var("SERVICE_VERSION")
                    .unwrap_or_else(|_| DEFAULT_VERSION.to_string()),
                git_url: std::env::var("GIT_URL").unwrap_or_else(|_| DEFAULT_GIT_URL.to_string()),
                git_commit_hash: std::env::var("GIT_COMMIT_HASH")
                    .unwrap_or_else(|_| DEFAULT_GIT_COMMIT_HASH.to_string()),
            },
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.njs.url.is_empty() {
            return Err(crate::Error::Config(
                "NJSW_URL must be set to the Narrative Job Service endpoint".to_string(),
            ));
        }

        let url = Url::parse(&self.njs.url)
            .map_err(|e| crate::Error::Config(format!("NJSW_URL is not a valid url: {}", e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(crate::Error::Config(format!(
                "NJSW_URL must use http or https, got {}",
                url.scheme()
            )));
        }

        if self.njs.timeout_secs == 0 {
            return Err(crate::Error::Config(
                "NJS_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                addr: DEFAULT_ADDR.to_string(),
            },
            njs: NjsConfig {
                url: "https://ci.kbase.us/services/njs_wrapper".to_string(),
                timeout_secs: DEFAULT_NJS_TIMEOUT_SECS,
            },
            service: ServiceInfo::default(),
        }
    }
}
