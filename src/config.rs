use std::path::PathBuf;
use std::time::Duration;

use crate::alicloud::{AlicloudError, AliyunClient, Credentials, DEFAULT_REGION};
use crate::reconcile::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, PollPolicy, ProviderContext};

const STATE_DIR: &str = "alirecon";
const STATE_FILE: &str = "state.json";

/// Everything needed to reach the vendor and persist state.
#[derive(Clone, Default)]
pub struct ProviderConfig {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub security_token: Option<String>,
    pub region: Option<String>,
    /// Gateway base URL. Defaults to the regional production endpoint.
    pub endpoint: Option<String>,
    pub poll_interval: Option<Duration>,
    pub timeout: Option<Duration>,
    pub state_file: Option<PathBuf>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |s: &Option<String>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("ProviderConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &redacted(&self.secret_key))
            .field("security_token", &redacted(&self.security_token))
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .field("state_file", &self.state_file)
            .finish()
    }
}

/// `<data dir>/alirecon/state.json`, or the working directory when no data dir exists.
pub fn default_state_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(STATE_DIR).join(STATE_FILE))
        .unwrap_or_else(|| PathBuf::from(STATE_FILE))
}

impl ProviderConfig {
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_file.clone().unwrap_or_else(default_state_path)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::fixed(
            self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            self.timeout.unwrap_or(DEFAULT_POLL_TIMEOUT),
        )
    }

    /// Missing keys are not rejected here; the first vendor call reports them.
    pub fn credentials(&self) -> Credentials {
        let credentials = Credentials::new(
            self.access_key.clone().unwrap_or_default(),
            self.secret_key.clone().unwrap_or_default(),
        );
        match &self.security_token {
            Some(token) => credentials.with_security_token(token.clone()),
            None => credentials,
        }
    }

    pub fn client(&self) -> Result<AliyunClient, AlicloudError> {
        match &self.endpoint {
            Some(endpoint) => {
                AliyunClient::with_base_url(self.credentials(), self.region(), endpoint.clone())
            }
            None => AliyunClient::new(self.credentials(), self.region()),
        }
    }

    pub fn context(&self) -> Result<ProviderContext, AlicloudError> {
        Ok(ProviderContext::new(self.client()?).with_poll(self.poll_policy()))
    }
}
