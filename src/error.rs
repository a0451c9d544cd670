//! Error taxonomy for the joint/link model and both solvers.

/// Errors produced by this crate's public API.
#[derive(Debug, thiserror::Error)]
pub enum KinematicError {
    /// Unrecognized joint type, negative length, or an empty link list where
    /// one is required.
    #[error("malformed joint: {0}")]
    MalformedJoint(String),
    /// `set_inputs`/`set_data` referenced a key outside the originally
    /// declared set, or the system otherwise rejects the edit.
    #[error("unsupported edit: {0}")]
    UnsupportedEdit(String),
    /// Triangulation's sweep terminated with some joints unsolved. Not
    /// raised by `t_config` itself (it never fails -- see its `status`
    /// output); higher-level helpers that choose to promote a partial
    /// result into an error use this variant.
    #[error("under-determined: {0}")]
    UnderDetermined(String),
    /// The numerical minimizer failed to converge.
    #[error("solver did not converge")]
    NoSolution,
    /// Equality or ordering was requested for an unsupported relation.
    #[error("invalid comparison: {0}")]
    InvalidCompare(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = KinematicError> = std::result::Result<T, E>;
