//! Error types for the dependency injection container.

use std::fmt;

use thiserror::Error;

/// Dependency injection errors
///
/// Structural errors (`Unresolvable`, `Circular`, `AmbiguousConstructor`,
/// `CaptiveDependency`) are detected once, when the call site for a service
/// is first built, and the same error is returned to every later request for
/// that service.
///
/// # Examples
///
/// ```rust
/// use callsite_di::{DiError, ServiceCollection, Resolver};
///
/// let provider = ServiceCollection::new().build();
/// match provider.get::<String>() {
///     Err(DiError::NotFound(type_name)) => {
///         assert_eq!(type_name, "alloc::string::String");
///     }
///     _ => unreachable!(),
/// }
/// ```
///
/// ```rust
/// use callsite_di::DiError;
///
/// let circular = DiError::Circular(vec!["ServiceA", "ServiceB", "ServiceA"]);
/// assert_eq!(circular.to_string(), "Circular dependency: ServiceA -> ServiceB -> ServiceA");
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// Service not registered
    #[error("Service not found: {0}")]
    NotFound(&'static str),

    /// A required constructor parameter has no registration
    #[error("Unable to resolve {service} while activating {required_by} (chain: {})", .chain.join(" -> "))]
    Unresolvable {
        service: &'static str,
        required_by: &'static str,
        chain: Vec<&'static str>,
    },

    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<&'static str>),

    /// More than one constructor with the same, maximal number of resolvable parameters
    #[error("Ambiguous constructors on {implementation}: several take {arity} resolvable parameters")]
    AmbiguousConstructor {
        implementation: &'static str,
        arity: usize,
    },

    /// Implementation type declares no constructor
    #[error("No constructor declared for {0}")]
    NoConstructor(&'static str),

    /// A singleton (transitively) depends on a scoped service
    #[error("Cannot consume scoped service {scoped} from singleton {singleton} (chain: {})", .chain.join(" -> "))]
    CaptiveDependency {
        singleton: &'static str,
        scoped: &'static str,
        chain: Vec<&'static str>,
    },

    /// A scoped service was requested from the root provider
    #[error("Cannot resolve {service} from the root provider because it requires scoped service {scoped}")]
    ScopedFromRoot {
        service: &'static str,
        scoped: &'static str,
    },

    /// Resolution attempted on a scope that was torn down
    #[error("Scope disposed while resolving {0}")]
    ScopeDisposed(&'static str),

    /// One or more tracked instances failed to release
    #[error("Disposal failed for {} instance(s): {}", .0.len(), DisplayFailures(.0))]
    Disposal(Vec<DisposalFailure>),

    /// Several errors found while validating a container at build time
    #[error("Container validation failed with {} error(s): {}", .0.len(), DisplayErrors(.0))]
    Validation(Vec<DiError>),

    /// Type downcast failed
    #[error("Type mismatch for: {0}")]
    TypeMismatch(&'static str),

    /// Maximum recursion depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),

    /// A factory reported a failure of its own
    #[error("Factory for {service} failed: {message}")]
    Factory {
        service: &'static str,
        message: String,
    },
}

impl DiError {
    /// Wraps an arbitrary error raised inside a factory.
    pub fn factory<E: fmt::Display>(service: &'static str, error: E) -> Self {
        DiError::Factory {
            service,
            message: error.to_string(),
        }
    }
}

/// A single release failure collected during scope teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposalFailure {
    /// Service whose instance failed to release
    pub service: &'static str,
    /// Error or panic message reported by the release hook
    pub message: String,
}

impl fmt::Display for DisposalFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.service, self.message)
    }
}

struct DisplayFailures<'a>(&'a [DisposalFailure]);

impl fmt::Display for DisplayFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

struct DisplayErrors<'a>(&'a [DiError]);

impl fmt::Display for DisplayErrors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

/// Result type for DI operations
///
/// # Examples
///
/// ```rust
/// use callsite_di::{DiResult, DiError};
///
/// fn failing_operation() -> DiResult<()> {
///     Err(DiError::NotFound("some_service"))
/// }
///
/// assert!(failing_operation().is_err());
/// ```
pub type DiResult<T> = Result<T, DiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_render_with_arrows() {
        let error = DiError::Unresolvable {
            service: "Database",
            required_by: "Repository",
            chain: vec!["Handler", "Repository"],
        };
        assert_eq!(
            error.to_string(),
            "Unable to resolve Database while activating Repository (chain: Handler -> Repository)"
        );

        let captive = DiError::CaptiveDependency {
            singleton: "Cache",
            scoped: "Session",
            chain: vec!["Cache", "Session"],
        };
        assert!(captive.to_string().ends_with("(chain: Cache -> Session)"));
    }

    #[test]
    fn aggregates_list_every_entry() {
        let disposal = DiError::Disposal(vec![
            DisposalFailure { service: "A", message: "closed twice".into() },
            DisposalFailure { service: "B", message: "panicked: boom".into() },
        ]);
        assert_eq!(
            disposal.to_string(),
            "Disposal failed for 2 instance(s): A: closed twice; B: panicked: boom"
        );

        let validation = DiError::Validation(vec![DiError::NotFound("A"), DiError::NoConstructor("B")]);
        assert_eq!(
            validation.to_string(),
            "Container validation failed with 2 error(s): Service not found: A; No constructor declared for B"
        );
    }

    #[test]
    fn factory_errors_keep_their_message() {
        let error = DiError::factory("Client", std::io::Error::new(std::io::ErrorKind::Other, "refused"));
        assert!(matches!(&error, DiError::Factory { service: "Client", message } if message == "refused"));
    }
}
