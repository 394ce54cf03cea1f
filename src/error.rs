use thiserror::Error;

use crate::diagnostics::ReconstructionFailure;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into two tiers. Most variants describe a *hard failure* of a single
/// reconstruction attempt: a member that the host runtime does not provide, a refused
/// access, or a host invocation that threw. The driver treats those like a soft failure
/// for the affected call site (the bytecode is left untouched) and forwards them to the
/// event log. Only the input-level invariant violations are fatal to a whole run, see
/// [`Error::is_fatal`].
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - Corrupted descriptor or inconsistent instruction tree
/// - [`Error::DuplicateClass`] - Two inputs declare the same class (fatal)
/// - [`Error::FieldAlreadyResolved`] - A field value was resolved twice (fatal)
/// - [`Error::Codec`] - The classfile codec failed to read or write a class
///
/// ## Host Runtime Errors
/// - [`Error::ClassNotFound`] - A type could not be resolved by name
/// - [`Error::MemberNotFound`] - A field or method is absent from the host runtime
/// - [`Error::AccessDenied`] - The host runtime refused access to a member
/// - [`Error::InvocationFailed`] - A host invocation threw
///
/// ## Reconstruction Errors
/// - [`Error::Reconstruction`] - A root cause wrapped with its bytecode context chain
/// - [`Error::RecursionLimit`] - The backward walk nested too deeply
///
/// # Examples
///
/// ```rust
/// use classfold::Error;
///
/// let err = Error::ClassNotFound("com/example/Missing".to_string());
/// assert!(!err.is_fatal());
///
/// let err = Error::DuplicateClass("com/example/Twice".to_string());
/// assert!(err.is_fatal());
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged and could not be interpreted.
    ///
    /// Raised for unparsable type descriptors or instruction trees that violate
    /// their own structure. The error includes the source location where the
    /// malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// Two inputs of one run declare the same class.
    ///
    /// Class identities key every per-run table, so a duplicate makes the
    /// whole run ambiguous. Fatal.
    #[error("Duplicate input class - {0}")]
    DuplicateClass(String),

    /// A field that already carries a resolved constant was resolved again.
    ///
    /// Resolved values are single-assignment; a second assignment means the
    /// driver lost track of its own state. Fatal.
    #[error("Field value already resolved - {0}")]
    FieldAlreadyResolved(String),

    /// The classfile codec failed to read or write a class.
    #[error("Codec error - {0}")]
    Codec(String),

    /// A type could not be resolved by name through the configured class loader.
    #[error("Class not found - {0}")]
    ClassNotFound(String),

    /// A field or method required for reconstruction is absent from the host runtime.
    #[error("Member not found - {0}")]
    MemberNotFound(String),

    /// The host runtime refused access to a member.
    #[error("Access denied - {0}")]
    AccessDenied(String),

    /// Invoking a member on the host runtime threw.
    ///
    /// # Fields
    ///
    /// * `member` - The member that was invoked
    /// * `message` - The failure reported by the host, usually the exception text
    #[error("Invocation of {member} failed: {message}")]
    InvocationFailed {
        /// The member that was invoked
        member: String,
        /// The failure reported by the host
        message: String,
    },

    /// A hard reconstruction failure with its chain of bytecode context frames.
    #[error("{0}")]
    Reconstruction(Box<ReconstructionFailure>),

    /// Recursion limit reached.
    ///
    /// The backward walk recurses once per operand; expression trees nested
    /// deeper than the limit are refused rather than risking a stack overflow.
    ///
    /// The associated value shows the recursion limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns `true` if this error must abort the whole run.
    ///
    /// Everything else is scoped to a single call site or field store and is
    /// handled by leaving that site unmodified.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::DuplicateClass(_) | Error::FieldAlreadyResolved(_) | Error::Codec(_) => true,
            Error::Reconstruction(failure) => failure.root().is_fatal(),
            _ => false,
        }
    }

    /// Shorthand for an [`Error::InvocationFailed`] raised by a host member.
    pub fn invocation(member: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvocationFailed {
            member: member.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_macro_records_location() {
        let err = malformed_error!("bad descriptor {}", "Lfoo");
        match err {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad descriptor Lfoo");
                assert!(file.ends_with("error.rs"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::DuplicateClass("a/B".into()).is_fatal());
        assert!(Error::FieldAlreadyResolved("a/B.x".into()).is_fatal());
        assert!(!Error::MemberNotFound("a/B.x".into()).is_fatal());
        assert!(!Error::RecursionLimit(8).is_fatal());
        assert!(!Error::invocation("a/B.f()I", "boom").is_fatal());
    }
}
