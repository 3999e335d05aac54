//! Error types for IIO operations.
//!
//! Every fallible operation in the core returns an [`IioError`]. Each variant maps to a
//! distinguishable negative error code via [`IioError::code`], which is what transports and
//! daemon-side consumers exchange on the wire. [`IioError::from_code`] performs the reverse
//! mapping so a backend can surface a raw transport code unchanged.

use thiserror::Error;

/// Result type alias for IIO operations.
pub type Result<T> = std::result::Result<T, IioError>;

/// Raw errno values used by the code mapping.
pub mod errno {
    /// Bad file descriptor (no open session).
    pub const EBADF: i32 = 9;
    /// Generic I/O error.
    pub const EIO: i32 = 5;
    /// Device or resource busy.
    pub const EBUSY: i32 = 16;
    /// Invalid argument.
    pub const EINVAL: i32 = 22;
    /// Function not implemented.
    pub const ENOSYS: i32 = 38;
    /// Illegal byte sequence (unparseable numeric text).
    pub const EILSEQ: i32 = 84;
}

/// Errors that can occur when working with IIO contexts, devices and buffers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IioError {
    /// Bad mask bit, empty mask, unknown attribute name, malformed topology.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was rejected.
        message: String,
    },

    /// Capability absent in the bound backend (e.g. no hardware trigger).
    #[error("Operation not supported: {message}")]
    NotSupported {
        /// Operation that is missing.
        message: String,
    },

    /// Transport failure reported by the backend.
    #[error("I/O error (errno {errno}): {message}")]
    Io {
        /// Positive errno reported by the transport.
        errno: i32,
        /// Transport detail.
        message: String,
    },

    /// Numeric text failed to parse.
    #[error("Invalid numeric format: '{input}'")]
    InvalidFormat {
        /// Offending text.
        input: String,
    },

    /// Buffer operation attempted without an open streaming session.
    #[error("No open streaming session: {message}")]
    NotOpen {
        /// Operation that needed a session.
        message: String,
    },

    /// A streaming session is already open on the device.
    #[error("Device '{device}' is busy: a buffer is open")]
    Busy {
        /// Device id.
        device: String,
    },

    /// A sample callback stopped processing with a negative status.
    #[error("Sample callback aborted with status {status}")]
    Aborted {
        /// Negative status returned to the caller.
        status: i32,
    },
}

impl IioError {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a not supported error.
    pub fn not_supported(message: impl Into<String>) -> Self {
        Self::NotSupported {
            message: message.into(),
        }
    }

    /// Create a generic I/O error (`EIO`).
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            errno: errno::EIO,
            message: message.into(),
        }
    }

    /// Create an I/O error carrying a specific transport errno.
    ///
    /// The sign of `errno` is ignored; zero becomes `EIO`.
    pub fn io_errno(errno: i32, message: impl Into<String>) -> Self {
        let errno = match errno.saturating_abs() {
            0 => errno::EIO,
            e => e,
        };
        Self::Io {
            errno,
            message: message.into(),
        }
    }

    /// Create an abort error from a callback status.
    ///
    /// Non-negative statuses do not signal an abort and become `-EINVAL`.
    pub fn aborted(status: i32) -> Self {
        Self::Aborted {
            status: if status < 0 { status } else { -errno::EINVAL },
        }
    }

    /// Create an invalid format error for the given input text.
    pub fn invalid_format(input: impl Into<String>) -> Self {
        Self::InvalidFormat {
            input: input.into(),
        }
    }

    /// Create a not open error.
    pub fn not_open(message: impl Into<String>) -> Self {
        Self::NotOpen {
            message: message.into(),
        }
    }

    /// Negative error code for this error.
    ///
    /// Codes are distinct per kind and always negative. `Io` reports its own errno so
    /// transport failures such as `ETIMEDOUT` pass through unchanged; `Aborted` reports the
    /// callback's status when it is negative.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. } => -errno::EINVAL,
            Self::NotSupported { .. } => -errno::ENOSYS,
            Self::Io { errno, .. } => match errno.saturating_abs() {
                0 => -errno::EIO,
                e => -e,
            },
            Self::InvalidFormat { .. } => -errno::EILSEQ,
            Self::NotOpen { .. } => -errno::EBADF,
            Self::Busy { .. } => -errno::EBUSY,
            Self::Aborted { status } if *status < 0 => *status,
            Self::Aborted { .. } => -errno::EINVAL,
        }
    }

    /// Map a negative status code back to an error kind.
    ///
    /// Unknown codes are treated as transport errors carrying that errno. A non-negative
    /// code is not an error status and maps to `InvalidArgument`.
    pub fn from_code(code: i32) -> Self {
        if code >= 0 {
            return Self::invalid_argument(format!("status {} is not an error code", code));
        }
        match code.saturating_neg() {
            errno::EINVAL => Self::invalid_argument("invalid argument"),
            errno::ENOSYS => Self::not_supported("operation not supported"),
            errno::EILSEQ => Self::invalid_format(""),
            errno::EBADF => Self::not_open("no open streaming session"),
            errno::EBUSY => Self::Busy {
                device: String::new(),
            },
            other => Self::io_errno(other, format!("transport error {}", code)),
        }
    }

    /// Check if this is an invalid argument error.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Check if the bound backend lacks the requested capability.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported { .. })
    }

    /// Check if this is a "no open session" error.
    pub fn is_not_open(&self) -> bool {
        matches!(self, Self::NotOpen { .. })
    }
}

impl From<std::io::Error> for IioError {
    fn from(err: std::io::Error) -> Self {
        let errno = err.raw_os_error().unwrap_or(errno::EIO);
        Self::io_errno(errno, err.to_string())
    }
}
