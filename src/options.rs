//! Options applied when a provider is built.

/// How realized accessors are promoted from the interpreter to compiled form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum CompilationMode {
    /// Compile on a background worker; resolution never waits for it.
    #[default]
    Background,
    /// Compile on the resolving thread once the threshold is reached.
    Inline,
    /// Always interpret.
    Disabled,
}

/// Root provider options.
///
/// # Examples
///
/// ```rust
/// use callsite_di::{CompilationMode, ProviderOptions, ServiceCollection};
///
/// let options = ProviderOptions::default()
///     .validate_on_build(true)
///     .compilation(CompilationMode::Inline);
///
/// let provider = ServiceCollection::new().build_with(options).unwrap();
/// assert_eq!(provider.options().compilation, CompilationMode::Inline);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ProviderOptions {
    /// Reject captive dependencies and scoped resolution from the root.
    pub validate_scopes: bool,
    /// Build and validate every registered service while building the provider.
    pub validate_on_build: bool,
    /// Track every runtime resolution on a thread-local chain so
    /// factory-driven cycles fail instead of overflowing the stack.
    pub call_chain_diagnostics: bool,
    /// Accessor promotion strategy.
    pub compilation: CompilationMode,
    /// Resolution count at which an accessor is promoted.
    pub compile_threshold: u32,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            validate_scopes: true,
            validate_on_build: false,
            call_chain_diagnostics: true,
            compilation: CompilationMode::Background,
            compile_threshold: 2,
        }
    }
}

impl ProviderOptions {
    pub fn validate_scopes(mut self, enabled: bool) -> Self {
        self.validate_scopes = enabled;
        self
    }

    pub fn validate_on_build(mut self, enabled: bool) -> Self {
        self.validate_on_build = enabled;
        self
    }

    pub fn call_chain_diagnostics(mut self, enabled: bool) -> Self {
        self.call_chain_diagnostics = enabled;
        self
    }

    pub fn compilation(mut self, mode: CompilationMode) -> Self {
        self.compilation = mode;
        self
    }

    /// Values below 1 are treated as 1.
    pub fn compile_threshold(mut self, threshold: u32) -> Self {
        self.compile_threshold = threshold.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let options = ProviderOptions::default();
        assert!(options.validate_scopes);
        assert!(!options.validate_on_build);
        assert!(options.call_chain_diagnostics);
        assert_eq!(options.compilation, CompilationMode::Background);
        assert_eq!(options.compile_threshold, 2);
    }

    #[test]
    fn threshold_never_drops_to_zero() {
        assert_eq!(ProviderOptions::default().compile_threshold(0).compile_threshold, 1);
    }
}
