//! Chained context for hard reconstruction failures.
//!
//! A hard failure starts as a plain [`Error`] (a missing member, a host call
//! that threw) deep inside the backward walk. Each level it passes on the way
//! out adds a [`FailureFrame`] describing what it was doing there, so the
//! driver can report the whole chain together with the root cause.

use std::fmt;

use crate::{classfile::Opcode, registry::MemberKey, Error, Result};

/// Where in the input a frame was added.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BytecodeLocation {
    /// Internal name of the class being scanned
    pub class: String,
    /// Name of the method being scanned
    pub method: String,
    /// Descriptor of the method being scanned
    pub descriptor: String,
    /// Source line of the instruction, if the class has line numbers
    pub line: Option<u32>,
}

impl BytecodeLocation {
    /// Creates a location without line information.
    pub fn new(
        class: impl Into<String>,
        method: impl Into<String>,
        descriptor: impl Into<String>,
    ) -> Self {
        BytecodeLocation {
            class: class.into(),
            method: method.into(),
            descriptor: descriptor.into(),
            line: None,
        }
    }

    /// Copy of this location at a given line.
    #[must_use]
    pub fn at_line(&self, line: Option<u32>) -> Self {
        BytecodeLocation {
            line,
            ..self.clone()
        }
    }
}

impl fmt::Display for BytecodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.class, self.method, self.descriptor)?;
        match self.line {
            Some(line) => write!(f, ":{line}"),
            None => f.write_str(":?"),
        }
    }
}

/// What the walk was doing when the failure passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Reconstructing the argument with this index of a call
    Argument(usize),
    /// Reconstructing an operand of an operator
    Operator(Opcode),
    /// Reading a field
    FieldAccess(MemberKey),
    /// Invoking a method
    MethodAccess(MemberKey),
    /// Reconstructing the receiver of an instance access
    InstanceAccess,
    /// Reconstructing an element of an array literal
    ArrayElement(usize),
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Argument(index) => write!(f, "argument #{index}"),
            FrameKind::Operator(opcode) => write!(f, "operand of {opcode}"),
            FrameKind::FieldAccess(key) => write!(f, "field access {key}"),
            FrameKind::MethodAccess(key) => write!(f, "method access {key}"),
            FrameKind::InstanceAccess => f.write_str("instance access"),
            FrameKind::ArrayElement(index) => write!(f, "array element [{index}]"),
        }
    }
}

/// One level of context around a hard failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureFrame {
    /// What was being reconstructed
    pub kind: FrameKind,
    /// Where
    pub location: BytecodeLocation,
}

/// A root cause with the frames it passed through, innermost first.
#[derive(Debug)]
pub struct ReconstructionFailure {
    root: Error,
    frames: Vec<FailureFrame>,
}

impl ReconstructionFailure {
    /// The error that started the failure.
    #[must_use]
    pub fn root(&self) -> &Error {
        &self.root
    }

    /// Context frames, innermost first.
    #[must_use]
    pub fn frames(&self) -> &[FailureFrame] {
        &self.frames
    }

    /// The outermost location, where the driver started the attempt.
    #[must_use]
    pub fn outermost(&self) -> Option<&BytecodeLocation> {
        self.frames.last().map(|frame| &frame.location)
    }
}

impl fmt::Display for ReconstructionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for frame in &self.frames {
            write!(f, "\n    while reconstructing {} at {}", frame.kind, frame.location)?;
        }
        Ok(())
    }
}

impl Error {
    /// Adds a context frame, wrapping the error into
    /// [`Error::Reconstruction`] the first time.
    #[must_use]
    pub fn with_frame(self, frame: FailureFrame) -> Error {
        match self {
            Error::Reconstruction(mut failure) => {
                failure.frames.push(frame);
                Error::Reconstruction(failure)
            }
            root => Error::Reconstruction(Box::new(ReconstructionFailure {
                root,
                frames: vec![frame],
            })),
        }
    }

    /// The root cause, looking through context frames.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Reconstruction(failure) => failure.root(),
            other => other,
        }
    }
}

/// Adds failure frames to results.
pub trait FailureContext<T> {
    /// Adds a frame to the error, if any. The location is only cloned on the
    /// error path.
    ///
    /// # Errors
    ///
    /// Returns the original error wrapped with the new frame.
    fn frame(self, kind: FrameKind, location: &BytecodeLocation) -> Result<T>;
}

impl<T> FailureContext<T> for Result<T> {
    fn frame(self, kind: FrameKind, location: &BytecodeLocation) -> Result<T> {
        self.map_err(|err| {
            err.with_frame(FailureFrame {
                kind,
                location: location.clone(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(line: u32) -> BytecodeLocation {
        BytecodeLocation::new("a/B", "<clinit>", "()V").at_line(Some(line))
    }

    #[test]
    fn test_frames_chain_innermost_first() {
        let result: Result<()> = Err(Error::MemberNotFound("a/C.f()I".into()));
        let err = result
            .frame(FrameKind::Argument(1), &location(3))
            .frame(FrameKind::Operator(Opcode::Iadd), &location(4))
            .unwrap_err();

        let Error::Reconstruction(failure) = &err else {
            panic!("expected a reconstruction failure, got {err:?}");
        };
        assert_eq!(failure.frames().len(), 2);
        assert_eq!(failure.frames()[0].kind, FrameKind::Argument(1));
        assert_eq!(failure.outermost().and_then(|l| l.line), Some(4));
        assert!(matches!(err.root_cause(), Error::MemberNotFound(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_display_lists_chain() {
        let err = Error::AccessDenied("a/C.secret".into())
            .with_frame(FailureFrame {
                kind: FrameKind::InstanceAccess,
                location: location(9),
            });
        let text = err.to_string();
        assert!(text.starts_with("Access denied - a/C.secret"));
        assert!(text.contains("while reconstructing instance access at a/B.<clinit>()V:9"));
    }
}
