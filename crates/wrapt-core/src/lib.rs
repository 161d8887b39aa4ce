//! # Wrapt Core
//!
//! Transparent object proxies and binding-aware function wrappers:
//! - Delegating proxies that forward every operation to a wrapped value
//! - Function wrappers that re-derive function, classmethod or staticmethod
//!   binding at lookup time and hand the right receiver to an interceptor
//! - Weak function proxies that track a bound method's receiver
//! - Lazy proxies that build their wrapped value on first access
//!
//! Proxies are exercised against a small host object model ([`host`]) that
//! implements the [`Object`] protocol: functions, methods, classes and
//! instances.

#![warn(clippy::all)]

pub mod descriptor;
pub mod errors;
pub mod host;
pub mod lazy;
pub mod object;
pub mod proxy;
pub mod value;
pub mod weak;
pub mod wrapper;

// Re-export commonly used types
pub use descriptor::{Binding, HostResolver, Resolver};
pub use errors::{Result, WraptError};
pub use host::{BoundMethod, Class, ClassMethod, FinalizerToken, Finalizers, Function, Instance, StaticMethod, WeakRef};
pub use lazy::LazyProxy;
pub use object::{Object, ObjectRef};
pub use proxy::{partial, CallableProxy, ObjectProxy, PartialCallableProxy, Proxy};
pub use value::{BinaryOp, Kwargs, UnaryOp, Value};
pub use weak::WeakFunctionProxy;
pub use wrapper::{interceptor, BoundFunctionWrapper, Enabled, FunctionWrapper, Interceptor, WrapperOptions};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the tracing filter directive
pub const LOG_ENV: &str = "WRAPT_LOG";

/// Environment variable enabling debug tracing
pub const DEBUG_ENV: &str = "WRAPT_DEBUG";

/// Runtime configuration for logging
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WraptConfig {
    /// `EnvFilter` directive, e.g. `wrapt_core=info`
    pub log_directive: String,
    /// Trace bind and dispatch decisions
    pub debug: bool,
}

impl Default for WraptConfig {
    fn default() -> Self {
        Self {
            log_directive: "wrapt_core=info".to_string(),
            debug: false,
        }
    }
}

impl WraptConfig {
    /// Defaults overridden by `WRAPT_LOG` and `WRAPT_DEBUG`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(directive) = std::env::var(LOG_ENV) {
            if !directive.trim().is_empty() {
                config.log_directive = directive;
            }
        }
        if let Ok(debug) = std::env::var(DEBUG_ENV) {
            config.debug = parse_flag(&debug);
        }
        config
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Initialize tracing from the environment
pub fn init_tracing() -> Result<()> {
    init_tracing_with(&WraptConfig::from_env())
}

/// Install a fmt subscriber filtered by `config`
pub fn init_tracing_with(config: &WraptConfig) -> Result<()> {
    let mut filter = tracing_subscriber::EnvFilter::try_new(&config.log_directive)
        .map_err(anyhow::Error::from)?;
    if config.debug {
        let directive = "wrapt_core=trace"
            .parse::<tracing_subscriber::filter::Directive>()
            .map_err(anyhow::Error::from)?;
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = WraptConfig::default();
        assert_eq!(config.log_directive, "wrapt_core=info");
        assert!(!config.debug);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag(" TRUE "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_invalid_directive_is_an_error() {
        let config = WraptConfig {
            log_directive: "wrapt_core=[".to_string(),
            debug: false,
        };
        assert!(init_tracing_with(&config).is_err());
    }
}
