//! Process configuration, loaded once from the environment. Uses plain
//! env-var helper functions rather than a config-file deserializer.

use std::collections::HashMap;
use std::env;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub redis_url: String,
    pub bind_host: String,
    pub bind_port: u16,
    pub jwt_signing_key: Vec<u8>,
    pub csrf_signing_key: Vec<u8>,
    pub active_encryption_key_version: String,
    pub encryption_keys: HashMap<String, [u8; 32]>,
    pub llm_api_key: String,
    pub llm_model: String,
    pub embedding_api_key: String,
    pub embedding_model: String,
    pub session_soft_delete_grace_days: i64,
    pub purge_worker_interval_secs: u64,
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::internal(format!("missing required env var {name}")))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let database_url = required("DATABASE_URL")?;
        let redis_url = optional("REDIS_URL", "redis://127.0.0.1:6379");
        let bind_host = optional("PAZPAZ_HOST", "0.0.0.0");
        let bind_port: u16 = optional("PAZPAZ_PORT", "8000")
            .parse()
            .map_err(|_| Error::internal("invalid PAZPAZ_PORT"))?;

        let jwt_signing_key = required("JWT_SIGNING_KEY")?.into_bytes();
        let csrf_signing_key = required("CSRF_SIGNING_KEY")?.into_bytes();

        let active_encryption_key_version = required("ACTIVE_ENCRYPTION_KEY_VERSION")?;
        let encryption_keys = load_encryption_keys()?;
        if !encryption_keys.contains_key(&active_encryption_key_version) {
            return Err(Error::internal(format!(
                "ACTIVE_ENCRYPTION_KEY_VERSION {active_encryption_key_version} has no matching key"
            )));
        }

        let llm_api_key = optional("LLM_API_KEY", "");
        let llm_model = optional("LLM_MODEL", "command-r");
        let embedding_api_key = optional("EMBEDDING_API_KEY", "");
        let embedding_model = optional("EMBEDDING_MODEL", "embed-multilingual-v3.0");

        let session_soft_delete_grace_days = optional("SESSION_SOFT_DELETE_GRACE_DAYS", "30")
            .parse()
            .unwrap_or(30);
        let purge_worker_interval_secs = optional("PURGE_WORKER_INTERVAL_SECS", "3600")
            .parse()
            .unwrap_or(3600);

        Ok(Self {
            database_url,
            redis_url,
            bind_host,
            bind_port,
            jwt_signing_key,
            csrf_signing_key,
            active_encryption_key_version,
            encryption_keys,
            llm_api_key,
            llm_model,
            embedding_api_key,
            embedding_model,
            session_soft_delete_grace_days,
            purge_worker_interval_secs,
        })
    }
}

/// Keys are supplied as `ENCRYPTION_KEY_<VERSION>=<base64 32-byte key>`, e.g.
/// `ENCRYPTION_KEY_V1=...`. Versions are the `vN` prefixes written on disk
///; the env-var suffix is upper-cased by convention
/// (`ENCRYPTION_KEY_V1` -> key version `v1`).
fn load_encryption_keys() -> Result<HashMap<String, [u8; 32]>> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let mut keys = HashMap::new();
    for (name, value) in env::vars() {
        let Some(suffix) = name.strip_prefix("ENCRYPTION_KEY_") else {
            continue;
        };
        let version = suffix.to_lowercase();
        let decoded = STANDARD
            .decode(value)
            .map_err(|_| Error::internal(format!("{name} is not valid base64")))?;
        let key: [u8; 32] = decoded
            .try_into()
            .map_err(|_| Error::internal(format!("{name} must decode to exactly 32 bytes")))?;
        keys.insert(version, key);
    }

    if keys.is_empty() {
        return Err(Error::internal("no ENCRYPTION_KEY_<VERSION> variables set"));
    }

    Ok(keys)
}
