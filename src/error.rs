/// Errores de una consulta de precio a un proveedor externo.
///
/// All variants are transient from the process point of view: the cache
/// turns every one of them into a `stale` or `unavailable` lookup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchError {
    #[error("Unknown token: {0}")]
    UnknownToken(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Upstream returned HTTP {0}")]
    Upstream(u16),
    #[error("Malformed price response: {0}")]
    Parse(String),
    #[error("Client-side rate limit exhausted")]
    RateLimited,
}

impl FetchError {
    /// Short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::UnknownToken(_) => "unknown_token",
            FetchError::Network(_) => "network",
            FetchError::Upstream(_) => "upstream",
            FetchError::Parse(_) => "parse",
            FetchError::RateLimited => "rate_limited",
        }
    }
}

/// Errores al construir proveedores o caches desde la configuración
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Invalid price endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("Invalid header value for {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("HTTP client could not be built: {0}")]
    HttpClient(#[from] reqwest::Error),
}
