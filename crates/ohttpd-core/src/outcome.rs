//! Terminal classification of a parse + resolve attempt.

/// Produced by the parser/resolver pair, consumed by the response builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Request not complete yet; keep reading.
    Incomplete,
    /// Syntax error, unsupported method/version, or a directory target.
    MalformedRequest,
    /// No such file under the document root.
    ResourceMissing,
    /// File exists but is not world-readable.
    Forbidden,
    /// File is mapped and ready to send.
    FileReady,
    /// Open or map failed after the file was found.
    ServerError,
}
