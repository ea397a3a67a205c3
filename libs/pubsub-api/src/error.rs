/// Category of a backend error. Lets callers tell a rejected request
/// from a transport failure without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid request parameters (bad endpoint, malformed identifier).
    Config,
    /// Transport or network failure.
    Io,
    /// Payload or response could not be encoded/decoded.
    Format,
    /// Referenced topic, subscription or token does not exist.
    NotFound,
    /// Anything else reported by the backend.
    Logic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::NotFound => f.write_str("not_found"),
            ErrorKind::Logic => f.write_str("logic"),
        }
    }
}

/// Ошибка, возвращаемая backend'ом pub/sub.
///
/// Передаётся вызывающему как есть: без retry, без переклассификации.
/// `Clone` нужен, чтобы одну и ту же ошибку создания topic'а можно было
/// отдать каждому ожидающему.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendError {
    kind: ErrorKind,
    message: String,
}

impl BackendError {
    /// Generic logic error (default kind).
    pub fn new(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logic, message: msg.into() }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Config, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn format_err(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Format, message: msg.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::NotFound, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prepend context, keeping the kind.
    pub fn with_context(self, ctx: impl std::fmt::Display) -> Self {
        Self { kind: self.kind, message: format!("{ctx}: {}", self.message) }
    }
}

impl std::fmt::Debug for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for BackendError {}

impl From<String> for BackendError {
    fn from(s: String) -> Self { Self { kind: ErrorKind::Logic, message: s } }
}

impl From<&str> for BackendError {
    fn from(s: &str) -> Self { Self { kind: ErrorKind::Logic, message: s.to_string() } }
}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self { Self { kind: ErrorKind::Io, message: e.to_string() } }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self { Self { kind: ErrorKind::Format, message: e.to_string() } }
}
