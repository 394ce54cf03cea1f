//! The immutable context a reconstruction runs under.

use std::{fmt, sync::Arc};

use crate::{classfile::Type, diagnostics::BytecodeLocation, runtime::ClassLoader};

/// What the caller of a reconstruction expects, and where it happens.
///
/// Contexts are never mutated. Every adjustment (a different expected type
/// for an operand, another source line) produces a new context; the shared
/// parts are reference counted so that is cheap.
#[derive(Clone)]
pub struct ReconstructionContext {
    receiver_type: Option<Type>,
    location: Arc<BytecodeLocation>,
    force: bool,
    loader: Option<Arc<dyn ClassLoader>>,
    depth: usize,
}

impl ReconstructionContext {
    /// A context for scanning code at `location`, with no expected type.
    #[must_use]
    pub fn new(location: BytecodeLocation) -> Self {
        ReconstructionContext {
            receiver_type: None,
            location: Arc::new(location),
            force: false,
            loader: None,
            depth: 0,
        }
    }

    /// The type the caller expects the value to have, if known.
    ///
    /// It decides the width of `int` literals (`iconst_1` is a `boolean`
    /// where a `Z` is expected) and the component type of reference arrays.
    #[must_use]
    pub fn receiver_type(&self) -> Option<&Type> {
        self.receiver_type.as_ref()
    }

    /// Where the scanned code lives.
    #[must_use]
    pub fn location(&self) -> &BytecodeLocation {
        &self.location
    }

    /// Whether unrestricted host access is allowed.
    #[must_use]
    pub fn is_forced(&self) -> bool {
        self.force
    }

    /// The configured class loader.
    #[must_use]
    pub fn loader(&self) -> Option<&dyn ClassLoader> {
        self.loader.as_deref()
    }

    /// Nesting depth of the backward walk.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Same context, different expected type.
    #[must_use]
    pub fn with_receiver_type(&self, receiver_type: Option<Type>) -> Self {
        ReconstructionContext {
            receiver_type,
            ..self.clone()
        }
    }

    /// Same context, with force mode switched.
    #[must_use]
    pub fn with_force(&self, force: bool) -> Self {
        ReconstructionContext {
            force,
            ..self.clone()
        }
    }

    /// Same context, with a class loader.
    #[must_use]
    pub fn with_loader(&self, loader: Option<Arc<dyn ClassLoader>>) -> Self {
        ReconstructionContext {
            loader,
            ..self.clone()
        }
    }

    /// Same context at another source line.
    #[must_use]
    pub fn at_line(&self, line: Option<u32>) -> Self {
        if self.location.line == line {
            return self.clone();
        }
        ReconstructionContext {
            location: Arc::new(self.location.at_line(line)),
            ..self.clone()
        }
    }

    /// Context for an operand, one level deeper.
    pub(crate) fn operand(&self, receiver_type: Option<Type>) -> Self {
        ReconstructionContext {
            receiver_type,
            depth: self.depth + 1,
            ..self.clone()
        }
    }
}

impl fmt::Debug for ReconstructionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconstructionContext")
            .field("receiver_type", &self.receiver_type)
            .field("location", &self.location)
            .field("force", &self.force)
            .field("loader", &self.loader.is_some())
            .field("depth", &self.depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjustments_leave_original_untouched() {
        let ctx = ReconstructionContext::new(BytecodeLocation::new("a/B", "<clinit>", "()V"));
        let forced = ctx.with_force(true).with_receiver_type(Some(Type::Int));
        assert!(!ctx.is_forced());
        assert!(ctx.receiver_type().is_none());
        assert!(forced.is_forced());
        assert_eq!(forced.receiver_type(), Some(&Type::Int));

        let operand = forced.operand(None);
        assert_eq!(operand.depth(), 1);
        assert!(operand.is_forced());
        assert_eq!(forced.at_line(Some(7)).location().line, Some(7));
        assert_eq!(forced.location().line, None);
    }
}
