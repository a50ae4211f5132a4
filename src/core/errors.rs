/// Crate-wide error taxonomy.
///
/// Per-document failures (`Fetch`, `UnsupportedFormat`, `Extraction`) are
/// recovered locally by the agent and surface as response warnings; the
/// remaining variants abort the request.
///
/// `Display`/`Error`/`From` are implemented by hand because the
/// `Extraction::source` field is a display-only `String` (mandated by the
/// spec), which `thiserror` would otherwise treat as an error source.
#[derive(Debug)]
pub enum ForecastError {
    Fetch { url: String, reason: String },

    UnsupportedFormat { url: String, detail: String },

    Extraction { source: String, reason: String },

    Embedding(String),

    NoDocumentsAvailable(String),

    Generation(String),

    MalformedOutput(String),

    Index(String),

    Config(String),

    Io(std::io::Error),

    Http(reqwest::Error),

    Json(serde_json::Error),
}

impl std::fmt::Display for ForecastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ForecastError::Fetch { url, reason } => {
                write!(f, "fetch failed for {url}: {reason}")
            }
            ForecastError::UnsupportedFormat { url, detail } => {
                write!(f, "unsupported document format at {url}: {detail}")
            }
            ForecastError::Extraction { source, reason } => {
                write!(f, "no extractable text in {source}: {reason}")
            }
            ForecastError::Embedding(msg) => write!(f, "embedding failed: {msg}"),
            ForecastError::NoDocumentsAvailable(msg) => {
                write!(f, "no documents available: {msg}")
            }
            ForecastError::Generation(msg) => write!(f, "generation failed: {msg}"),
            ForecastError::MalformedOutput(msg) => {
                write!(f, "malformed model output: {msg}")
            }
            ForecastError::Index(msg) => write!(f, "index error: {msg}"),
            ForecastError::Config(msg) => write!(f, "configuration error: {msg}"),
            ForecastError::Io(err) => write!(f, "io error: {err}"),
            ForecastError::Http(err) => write!(f, "http error: {err}"),
            ForecastError::Json(err) => write!(f, "serialization error: {err}"),
        }
    }
}

impl std::error::Error for ForecastError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ForecastError::Io(err) => Some(err),
            ForecastError::Http(err) => Some(err),
            ForecastError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ForecastError {
    fn from(err: std::io::Error) -> Self {
        ForecastError::Io(err)
    }
}

impl From<reqwest::Error> for ForecastError {
    fn from(err: reqwest::Error) -> Self {
        ForecastError::Http(err)
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Json(err)
    }
}

impl ForecastError {
    pub fn fetch<E: std::fmt::Display>(url: &str, err: E) -> Self {
        ForecastError::Fetch {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn extraction<E: std::fmt::Display>(source: &str, err: E) -> Self {
        ForecastError::Extraction {
            source: source.to_string(),
            reason: err.to_string(),
        }
    }

    /// True for errors the pipeline recovers from by dropping the
    /// offending document and continuing with the survivors.
    pub fn is_per_document(&self) -> bool {
        matches!(
            self,
            ForecastError::Fetch { .. }
                | ForecastError::UnsupportedFormat { .. }
                | ForecastError::Extraction { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
