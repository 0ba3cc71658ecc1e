use std::path::{Path, PathBuf};
use std::time::Duration;

use cosio_sign::Credentials;
use cosio_verify::FingerprintKind;
use figment::Figment;
use figment::providers::{Env, Format, Json, Toml};
use serde::Deserialize;

use crate::core::{backup_host, default_host, retry_delay};
use crate::error::{CosError, Result};

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// Largest part number the service accepts.
pub const MAX_PART_NUMBER: u32 = 10_000;

const POOL_SIZE_RANGE: (usize, usize) = (1, 10);
const SLICE_SIZE_RANGE: (u64, u64) = (4 * KIB, 20 * MIB);
const MAX_PART_SIZE: u64 = 5 * GIB;

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// `base * (n + 1)`
    #[default]
    Linear,
    /// `base * 2^n`
    Exponential,
}

/// Per-request retry budget and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one. Total attempts = 1 + max_retries.
    pub max_retries: u32,
    pub base_delay:  Duration,
    pub max_delay:   Duration,
    pub backoff:     Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay:  Duration::from_millis(100),
            max_delay:   Duration::from_secs(10),
            backoff:     Backoff::Linear,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0 = the first retry).
    pub fn delay(&self, retry: u32) -> Duration {
        let delay = match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(retry.saturating_add(1)),
            Backoff::Exponential => retry_delay(retry, self.base_delay),
        };
        delay.min(self.max_delay)
    }
}

/// Switch to the backup domain when the default one looks unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainPolicy {
    pub fail_over: bool,
    /// A fixed destination domain replaces the default one and disables fail-over.
    pub fixed_host: Option<String>,
}

/// Client configuration.
///
/// Missing keys take their defaults; a TOML or JSON file is layered under
/// `COS_*` environment variables. File keys may use either the field names below or
/// the legacy SDK names (`AccessKey`, `UploadPartSize`, ...).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CosConfig {
    #[serde(alias = "AppID")]
    pub app_id: u64,
    #[serde(alias = "AccessKey", alias = "SecretId")]
    pub secret_id: String,
    #[serde(alias = "SecretKey")]
    pub secret_key: String,
    #[serde(alias = "TmpToken")]
    pub session_token: Option<String>,
    #[serde(alias = "Region")]
    pub region: String,
    /// Custom domain used instead of `<bucket>.cos.<region>.myqcloud.com`.
    #[serde(alias = "DestDomain")]
    pub dest_domain: Option<String>,
    pub use_https: bool,
    pub verify_cert: bool,
    /// PEM bundle trusted in addition to the system roots.
    pub ca_location: Option<PathBuf>,

    #[serde(alias = "SignExpiredTime")]
    pub sign_expire_secs: u64,
    #[serde(alias = "ConnectTimeoutInms")]
    pub connect_timeout_ms: u64,
    #[serde(alias = "ReceiveTimeoutInms")]
    pub recv_timeout_ms: u64,

    #[serde(alias = "UploadPartSize")]
    pub upload_part_size: u64,
    #[serde(alias = "UploadCopyPartSize")]
    pub upload_copy_part_size: u64,
    #[serde(alias = "UploadThreadPoolSize")]
    pub upload_pool_size: usize,
    #[serde(alias = "down_thread_pool_max_size")]
    pub download_pool_size: usize,
    #[serde(alias = "down_slice_size")]
    pub download_slice_size: u64,
    /// Same-region copies up to this size use a single server-side copy.
    pub copy_threshold: u64,

    pub max_retries: u32,
    pub retry_interval_ms: u64,
    pub backoff: Backoff,
    pub retry_change_domain: bool,

    /// Probe for an interrupted session before starting a multipart upload.
    pub resumable_upload: bool,
    /// Fingerprint parts with CRC64; MD5 against the ETag otherwise.
    pub check_crc64: bool,
}

impl Default for CosConfig {
    fn default() -> Self {
        Self {
            app_id: 0,
            secret_id: String::new(),
            secret_key: String::new(),
            session_token: None,
            region: String::new(),
            dest_domain: None,
            use_https: true,
            verify_cert: true,
            ca_location: None,
            sign_expire_secs: 60,
            connect_timeout_ms: 5_000,
            recv_timeout_ms: 5_000,
            upload_part_size: 10 * MIB,
            upload_copy_part_size: 20 * MIB,
            upload_pool_size: 5,
            download_pool_size: 10,
            download_slice_size: 4 * MIB,
            copy_threshold: 5 * GIB,
            max_retries: 3,
            retry_interval_ms: 100,
            backoff: Backoff::Linear,
            retry_change_domain: false,
            resumable_upload: true,
            check_crc64: true,
        }
    }
}

impl CosConfig {
    pub fn new(secret_id: impl Into<String>, secret_key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
            secret_key: secret_key.into(),
            region: region.into(),
            ..Self::default()
        }
    }

    /// Load from a `.toml` or `.json` file layered over defaults and `COS_*` variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CosError::Configuration(format!("config file not found: {}", path.display())));
        }
        let figment = Figment::new();
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => figment.merge(Json::file(path)),
            Some("toml") => figment.merge(Toml::file(path)),
            _ => {
                return Err(CosError::Configuration(format!(
                    "unsupported config format: {}",
                    path.display()
                )));
            }
        };
        Self::extract(figment.merge(Env::prefixed("COS_")))
    }

    /// Load from defaults and `COS_*` variables only.
    pub fn from_env() -> Result<Self> {
        Self::extract(Figment::new().merge(Env::prefixed("COS_")))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.normalized()
    }

    /// Clamp pool and slice sizes into their supported ranges and reject
    /// values that can never work.
    pub fn normalized(mut self) -> Result<Self> {
        self.upload_pool_size = self.upload_pool_size.clamp(POOL_SIZE_RANGE.0, POOL_SIZE_RANGE.1);
        self.download_pool_size = self.download_pool_size.clamp(POOL_SIZE_RANGE.0, POOL_SIZE_RANGE.1);
        self.download_slice_size = self.download_slice_size.clamp(SLICE_SIZE_RANGE.0, SLICE_SIZE_RANGE.1);
        validate_part_size("upload_part_size", self.upload_part_size)?;
        validate_part_size("upload_copy_part_size", self.upload_copy_part_size)?;
        self.session_token = self.session_token.filter(|t| !t.is_empty());
        self.dest_domain = self.dest_domain.filter(|d| !d.is_empty());
        Ok(self)
    }

    pub fn credentials(&self) -> Credentials {
        let credentials = Credentials::new(&self.secret_id, &self.secret_key);
        match &self.session_token {
            Some(token) => credentials.with_session_token(token),
            None => credentials,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_interval_ms),
            backoff: self.backoff,
            ..RetryPolicy::default()
        }
    }

    pub fn domain_policy(&self) -> DomainPolicy {
        DomainPolicy {
            fail_over:  self.retry_change_domain,
            fixed_host: self.dest_domain.clone(),
        }
    }

    pub fn connect_timeout(&self) -> Duration { Duration::from_millis(self.connect_timeout_ms) }

    pub fn recv_timeout(&self) -> Duration { Duration::from_millis(self.recv_timeout_ms) }

    pub fn sign_expire(&self) -> Duration { Duration::from_secs(self.sign_expire_secs) }

    pub fn fingerprint_kind(&self) -> FingerprintKind {
        if self.check_crc64 { FingerprintKind::Crc64 } else { FingerprintKind::Md5 }
    }

    /// Default domain of a bucket in the configured region.
    pub fn host(&self, bucket: &str) -> String { default_host(self.app_id, &self.region, bucket) }

    /// Default domain of a bucket in another region.
    pub fn host_in(&self, region: &str, bucket: &str) -> String { default_host(self.app_id, region, bucket) }

    /// Backup-domain form of [`CosConfig::host`].
    pub fn backup_host(&self, bucket: &str) -> String { backup_host(&self.host(bucket)) }

    pub fn scheme(&self) -> &'static str {
        if self.use_https { "https" } else { "http" }
    }
}

fn validate_part_size(field: &str, size: u64) -> Result<()> {
    if size == 0 || size > MAX_PART_SIZE {
        return Err(CosError::Configuration(format!(
            "{field} must be within 1..={MAX_PART_SIZE} bytes, got {size}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CosConfig::default();
        assert_eq!(config.upload_part_size, 10 * MIB);
        assert_eq!(config.upload_copy_part_size, 20 * MIB);
        assert_eq!(config.upload_pool_size, 5);
        assert_eq!(config.download_pool_size, 10);
        assert_eq!(config.download_slice_size, 4 * MIB);
        assert_eq!(config.sign_expire_secs, 60);
        assert_eq!(config.recv_timeout(), Duration::from_millis(5_000));
        assert_eq!(config.retry_policy().max_retries, 3);
        assert_eq!(config.fingerprint_kind(), FingerprintKind::Crc64);
    }

    #[test]
    fn test_normalize_clamps_pools_and_slices() {
        let config = CosConfig {
            upload_pool_size: 0,
            download_pool_size: 64,
            download_slice_size: 1,
            ..CosConfig::default()
        }
        .normalized()
        .unwrap();
        assert_eq!(config.upload_pool_size, 1);
        assert_eq!(config.download_pool_size, 10);
        assert_eq!(config.download_slice_size, 4 * KIB);

        let config = CosConfig { download_slice_size: GIB, ..CosConfig::default() }.normalized().unwrap();
        assert_eq!(config.download_slice_size, 20 * MIB);
    }

    #[test]
    fn test_normalize_rejects_zero_part_size() {
        let err = CosConfig { upload_part_size: 0, ..CosConfig::default() }.normalized().unwrap_err();
        assert!(matches!(err, CosError::Configuration(_)));
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(300));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = RetryPolicy { backoff: Backoff::Exponential, ..RetryPolicy::default() };
        assert_eq!(policy.delay(2), Duration::from_millis(400));
        assert_eq!(policy.delay(30), policy.max_delay);
    }

    #[test]
    fn test_load_legacy_json_keys() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"AppID": 1250000000, "AccessKey": "ak", "SecretKey": "sk", "Region": "ap-guangzhou",
                "UploadPartSize": 2097152, "UploadThreadPoolSize": 32, "down_slice_size": 1048576}}"#
        )
        .unwrap();

        let config = CosConfig::load(file.path()).unwrap();
        assert_eq!(config.app_id, 1_250_000_000);
        assert_eq!(config.secret_id, "ak");
        assert_eq!(config.region, "ap-guangzhou");
        assert_eq!(config.upload_part_size, 2 * MIB);
        assert_eq!(config.upload_pool_size, 10);
        assert_eq!(config.download_slice_size, MIB);
    }

    #[test]
    fn test_load_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "secret_id = \"ak\"\nsecret_key = \"sk\"\nregion = \"ap-beijing\"\nbackoff = \"exponential\"\nretry_change_domain = true").unwrap();

        let config = CosConfig::load(file.path()).unwrap();
        assert_eq!(config.backoff, Backoff::Exponential);
        assert!(config.domain_policy().fail_over);
        assert_eq!(config.credentials(), Credentials::new("ak", "sk"));
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(matches!(CosConfig::load(file.path()), Err(CosError::Configuration(_))));
    }

    #[test]
    fn test_dest_domain_fixes_host() {
        let config = CosConfig {
            dest_domain: Some("static.example.com".into()),
            retry_change_domain: true,
            ..CosConfig::default()
        };
        let policy = config.domain_policy();
        assert_eq!(policy.fixed_host.as_deref(), Some("static.example.com"));
    }
}
