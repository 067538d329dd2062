use core::fmt;

/// Result codes returned to the host USB stack.
///
/// Any value other than [`NotFound`](DfuError::NotFound) returned from a
/// control request handler means the control pipe must be stalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DfuError {
    /// Request, descriptor or interface does not belong to this function.
    /// Other handlers may process it.
    NotFound,
    /// The interface is already claimed by this function.
    AlreadyClaimed,
    /// Another interface is already claimed by this function.
    NoResource,
    /// Device has progressed past the stage where the function may be installed.
    Denied,
    /// Operation is not implemented.
    UnsupportedOp,
    /// Request is invalid in the current state, or malformed.
    InvalidArgument,
}

impl fmt::Display for DfuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DfuError::NotFound => write!(f, "not found"),
            DfuError::AlreadyClaimed => write!(f, "interface already claimed"),
            DfuError::NoResource => write!(f, "another interface is already claimed"),
            DfuError::Denied => write!(f, "device is already configured"),
            DfuError::UnsupportedOp => write!(f, "unsupported operation"),
            DfuError::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}
