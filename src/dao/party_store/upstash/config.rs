use super::error::{UpstashDaoError, UpstashResult};

/// Runtime configuration describing how to reach the Upstash REST endpoint.
#[derive(Debug, Clone)]
pub struct UpstashConfig {
    pub base_url: String,
    pub token: String,
}

impl UpstashConfig {
    /// Construct a configuration from an explicit endpoint and bearer token.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> UpstashResult<Self> {
        let base_url = std::env::var("UPSTASH_REDIS_REST_URL").map_err(|_| {
            UpstashDaoError::MissingEnvVar {
                var: "UPSTASH_REDIS_REST_URL",
            }
        })?;
        let token = std::env::var("UPSTASH_REDIS_REST_TOKEN").map_err(|_| {
            UpstashDaoError::MissingEnvVar {
                var: "UPSTASH_REDIS_REST_TOKEN",
            }
        })?;

        Ok(Self::new(base_url, token))
    }
}
