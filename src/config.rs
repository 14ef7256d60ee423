/// Environment variable holding the backend base URL.
pub const API_URL_VAR: &str = "LINGUA_API_URL";

pub const LOCAL_API_URL: &str = "http://localhost:3000";

pub const CHAT_MESSAGE_PATH: &str = "/api/chat/message";
pub const TTS_PATH: &str = "/api/tts";

/// Where the backend is expected to live when nothing is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Development: talk to a backend on this machine.
    Local,
    /// Deployed: the backend is reachable on the same origin, so URLs stay
    /// relative and the hosting rewrite routes them.
    Deployed,
}

impl Environment {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Environment::Local => LOCAL_API_URL,
            Environment::Deployed => "",
        }
    }

    /// `Local` for debug builds, `Deployed` for release builds.
    pub fn from_build() -> Self {
        if cfg!(debug_assertions) {
            Environment::Local
        } else {
            Environment::Deployed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into() }
    }

    /// Picks the first non-blank of `explicit`, then `from_env`, then the
    /// environment default.
    pub fn resolve(
        explicit: Option<&str>,
        from_env: Option<&str>,
        environment: Environment,
    ) -> Self {
        let base_url = [explicit, from_env]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|url| !url.is_empty())
            .unwrap_or(environment.default_base_url());
        tracing::info!(
            "Using API URL: {}",
            if base_url.is_empty() { "relative path" } else { base_url }
        );
        Self::new(base_url)
    }

    pub fn chat_message_url(&self) -> String {
        construct_api_url(&self.base_url, CHAT_MESSAGE_PATH)
    }

    pub fn tts_url(&self) -> String {
        construct_api_url(&self.base_url, TTS_PATH)
    }
}

/// Joins a base URL and a path with exactly one `/` between them.
pub fn construct_api_url(base_url: &str, path: &str) -> String {
    let base = base_url.strip_suffix('/').unwrap_or(base_url);
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{base}/{path}")
}
