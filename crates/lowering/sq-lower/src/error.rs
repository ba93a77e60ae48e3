//! Lowering errors

use sq_ir::TypeError;
use sq_span::FileSpan;

/// Errors raised while lowering a statement tree
///
/// Lowering stops at the first error. Every variant carries the position
/// of the statement that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LowerError {
    /// Name not bound, or a global used without a `global` declaration
    #[error("name '{name}' is not defined")]
    UnboundIdentifier {
        /// Unresolved name
        name: String,
        /// Statement position
        span: FileSpan,
    },

    /// Assignment to something other than a name or attribute
    #[error("invalid assignment target")]
    InvalidAssignment {
        /// Statement position
        span: FileSpan,
    },

    /// `del` of something other than a bound variable
    #[error("cannot delete non-variable")]
    InvalidDeletion {
        /// Statement position
        span: FileSpan,
    },

    /// Loop variable that is not a bare name
    #[error("loop variable must be a plain name")]
    InvalidForTarget {
        /// Statement position
        span: FileSpan,
    },

    /// `return` at module level
    #[error("'return' outside function")]
    ReturnOutsideFunction {
        /// Statement position
        span: FileSpan,
    },

    /// `yield` at module level
    #[error("'yield' outside function")]
    YieldOutsideFunction {
        /// Statement position
        span: FileSpan,
    },

    /// `prefetch` at module level
    #[error("'prefetch' outside function")]
    PrefetchOutsideFunction {
        /// Statement position
        span: FileSpan,
    },

    /// `prefetch` of something other than `collection[index]`
    #[error("prefetch needs an index expression")]
    PrefetchShape {
        /// Statement position
        span: FileSpan,
    },

    /// Parameter name used twice
    #[error("argument '{name}' already specified")]
    DuplicateArgument {
        /// Repeated name
        name: String,
        /// Statement position
        span: FileSpan,
    },

    /// Parameter without a default after one with a default
    #[error("argument '{name}' has no default value")]
    MissingDefault {
        /// Offending parameter
        name: String,
        /// Statement position
        span: FileSpan,
    },

    /// Malformed value-type declaration
    #[error("{message}")]
    ValueType {
        /// What is wrong with the declaration
        message: String,
        /// Statement position
        span: FileSpan,
    },

    /// Generic argument count does not match the declared arity
    #[error("expected {expected} generic argument(s), found {found}")]
    GenericArity {
        /// Declared arity
        expected: usize,
        /// Supplied count
        found: usize,
        /// Statement position
        span: FileSpan,
    },

    /// Generic argument list that is not made of names
    #[error("invalid generic variable")]
    InvalidGeneric {
        /// Statement position
        span: FileSpan,
    },

    /// Type expression that does not denote a type
    #[error("'{name}' is not a type")]
    NotAType {
        /// Offending name or expression
        name: String,
        /// Statement position
        span: FileSpan,
    },

    /// Statement form that this stage does not lower
    #[error("{construct} is not implemented")]
    NotImplemented {
        /// Statement form
        construct: &'static str,
        /// Statement position
        span: FileSpan,
    },

    /// Type failure reported by expression lowering or the type registry
    #[error("{message}")]
    Type {
        /// Description
        message: String,
        /// Statement position
        span: FileSpan,
    },
}

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`LowerError::UnboundIdentifier`]
    UnboundIdentifier,
    /// See [`LowerError::InvalidAssignment`]
    InvalidAssignment,
    /// See [`LowerError::InvalidDeletion`]
    InvalidDeletion,
    /// See [`LowerError::InvalidForTarget`]
    InvalidForTarget,
    /// See [`LowerError::ReturnOutsideFunction`]
    ReturnOutsideFunction,
    /// See [`LowerError::YieldOutsideFunction`]
    YieldOutsideFunction,
    /// See [`LowerError::PrefetchOutsideFunction`]
    PrefetchOutsideFunction,
    /// See [`LowerError::PrefetchShape`]
    PrefetchShape,
    /// See [`LowerError::DuplicateArgument`]
    DuplicateArgument,
    /// See [`LowerError::MissingDefault`]
    MissingDefault,
    /// See [`LowerError::ValueType`]
    ValueType,
    /// See [`LowerError::GenericArity`]
    GenericArity,
    /// See [`LowerError::InvalidGeneric`]
    InvalidGeneric,
    /// See [`LowerError::NotAType`]
    NotAType,
    /// See [`LowerError::NotImplemented`]
    NotImplemented,
    /// See [`LowerError::Type`]
    Type,
}

impl LowerError {
    /// Category of the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnboundIdentifier { .. } => ErrorKind::UnboundIdentifier,
            Self::InvalidAssignment { .. } => ErrorKind::InvalidAssignment,
            Self::InvalidDeletion { .. } => ErrorKind::InvalidDeletion,
            Self::InvalidForTarget { .. } => ErrorKind::InvalidForTarget,
            Self::ReturnOutsideFunction { .. } => ErrorKind::ReturnOutsideFunction,
            Self::YieldOutsideFunction { .. } => ErrorKind::YieldOutsideFunction,
            Self::PrefetchOutsideFunction { .. } => ErrorKind::PrefetchOutsideFunction,
            Self::PrefetchShape { .. } => ErrorKind::PrefetchShape,
            Self::DuplicateArgument { .. } => ErrorKind::DuplicateArgument,
            Self::MissingDefault { .. } => ErrorKind::MissingDefault,
            Self::ValueType { .. } => ErrorKind::ValueType,
            Self::GenericArity { .. } => ErrorKind::GenericArity,
            Self::InvalidGeneric { .. } => ErrorKind::InvalidGeneric,
            Self::NotAType { .. } => ErrorKind::NotAType,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
            Self::Type { .. } => ErrorKind::Type,
        }
    }

    /// Position of the triggering statement
    pub fn span(&self) -> FileSpan {
        *self.span_ref()
    }

    /// Re-anchor the error at `span`
    #[must_use]
    pub fn with_span(mut self, span: FileSpan) -> Self {
        *self.span_mut() = span;
        self
    }

    /// Convert a type-registry failure raised at `span`
    pub fn from_type(error: TypeError, span: FileSpan) -> Self {
        match error {
            TypeError::GenericArity { expected, found } => Self::GenericArity {
                expected,
                found,
                span,
            },
            other => Self::Type {
                message: other.to_string(),
                span,
            },
        }
    }

    fn span_ref(&self) -> &FileSpan {
        match self {
            Self::UnboundIdentifier { span, .. }
            | Self::InvalidAssignment { span }
            | Self::InvalidDeletion { span }
            | Self::InvalidForTarget { span }
            | Self::ReturnOutsideFunction { span }
            | Self::YieldOutsideFunction { span }
            | Self::PrefetchOutsideFunction { span }
            | Self::PrefetchShape { span }
            | Self::DuplicateArgument { span, .. }
            | Self::MissingDefault { span, .. }
            | Self::ValueType { span, .. }
            | Self::GenericArity { span, .. }
            | Self::InvalidGeneric { span }
            | Self::NotAType { span, .. }
            | Self::NotImplemented { span, .. }
            | Self::Type { span, .. } => span,
        }
    }

    fn span_mut(&mut self) -> &mut FileSpan {
        match self {
            Self::UnboundIdentifier { span, .. }
            | Self::InvalidAssignment { span }
            | Self::InvalidDeletion { span }
            | Self::InvalidForTarget { span }
            | Self::ReturnOutsideFunction { span }
            | Self::YieldOutsideFunction { span }
            | Self::PrefetchOutsideFunction { span }
            | Self::PrefetchShape { span }
            | Self::DuplicateArgument { span, .. }
            | Self::MissingDefault { span, .. }
            | Self::ValueType { span, .. }
            | Self::GenericArity { span, .. }
            | Self::InvalidGeneric { span }
            | Self::NotAType { span, .. }
            | Self::NotImplemented { span, .. }
            | Self::Type { span, .. } => span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sq_span::{FileId, Span};

    #[test]
    fn test_with_span_reanchors() {
        let inner = FileSpan::new(FileId(0), Span::new(4, 5));
        let outer = FileSpan::new(FileId(0), Span::new(0, 9).at(3, 1));
        let error = LowerError::UnboundIdentifier {
            name: "x".to_owned(),
            span: inner,
        }
        .with_span(outer);
        assert_eq!(error.span(), outer);
        assert_eq!(error.kind(), ErrorKind::UnboundIdentifier);
    }

    #[test]
    fn test_type_error_arity_maps_to_generic_arity() {
        let error = LowerError::from_type(
            TypeError::GenericArity {
                expected: 1,
                found: 2,
            },
            FileSpan::default(),
        );
        assert_eq!(error.kind(), ErrorKind::GenericArity);
        assert_eq!(error.to_string(), "expected 1 generic argument(s), found 2");
    }
}
