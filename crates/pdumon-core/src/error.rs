//! Error types for address construction, metric transport, and configuration.

use thiserror::Error;

use crate::topology::MetricKind;

/// Why a single identifier in an otherwise successful batch has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Unresolvable {
    /// The agent does not implement the object.
    #[error("noSuchObject")]
    NoSuchObject,
    /// The object exists but this instance is not instantiated.
    #[error("noSuchInstance")]
    NoSuchInstance,
    /// The identifier is past the end of the agent's MIB view.
    #[error("endOfMibView")]
    EndOfMibView,
    /// The value arrived but is not a number.
    #[error("non-numeric value")]
    NotNumeric,
    /// The response carried fewer values than were requested.
    #[error("missing from response")]
    Missing,
}

/// Failure of a whole batch request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response before the deadline.
    #[error("timeout")]
    Timeout,

    /// Socket-level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The response could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The agent rejected the request as a whole.
    #[error("agent error-status {status} at varbind {index}")]
    AgentError { status: i64, index: i64 },

    /// The source is shut down and will not answer.
    #[error("source closed")]
    Closed,
}

/// Fatal startup error. Nothing runs until these are resolved.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An address is not a well-formed dotted OID.
    #[error("malformed address for {point}: {address}")]
    MalformedAddress { point: String, address: String },

    /// Two coordinates produced the same address.
    #[error("duplicate address {address} for {first} and {second}")]
    DuplicateAddress {
        address: String,
        first: String,
        second: String,
    },

    /// A metric group does not have the number of points the topology implies.
    #[error("{kind} has {actual} addresses, expected {expected}")]
    TopologyMismatch {
        kind: MetricKind,
        expected: usize,
        actual: usize,
    },

    /// Config file could not be read.
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON for `CollectorConfig`.
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A config value is out of range or unparsable.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
