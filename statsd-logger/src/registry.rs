//! Per-name stat logger cache, and the process-wide registry.

use std::{collections::HashMap, fmt, sync::Arc};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::error;

use crate::{
    backend::BackendProvider,
    facade::StatsLogger,
    implementation::{FacadeConstructor, Implementations, DEFAULT_IMPLEMENTATION},
    log_backend::LogBackendProvider,
};

const ENV_IMPLEMENTATION: &str = "STATSD_LOGGER_IMPL";

static GLOBAL_REGISTRY: OnceCell<LoggerRegistry> = OnceCell::new();

/// Errors that could occur while building a registry.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The selected implementation has not been registered.
    #[error("unknown stats logger implementation '{id}' (known: {known})")]
    UnknownImplementation {
        /// The identifier that was selected.
        id: String,

        /// The registered identifiers, comma-separated.
        known: String,
    },
}

/// Error returned when a process-wide registry has already been installed.
///
/// Carries the registry that was rejected.
#[derive(Debug, Error)]
#[error("a global stats logger registry is already installed")]
pub struct SetRegistryError(LoggerRegistry);

impl SetRegistryError {
    /// Returns the registry that could not be installed.
    pub fn into_inner(self) -> LoggerRegistry {
        self.0
    }
}

/// Builder for a [`LoggerRegistry`].
#[derive(Debug)]
pub struct RegistryBuilder {
    implementation: String,
    implementations: Implementations,
}

impl RegistryBuilder {
    /// Creates a builder that selects the implementation named by `STATSD_LOGGER_IMPL`, or the default implementation
    /// when it is unset or empty.
    pub fn from_env() -> Self {
        let mut builder = Self::default();
        if let Some(id) = std::env::var(ENV_IMPLEMENTATION).ok().filter(|id| !id.trim().is_empty()) {
            builder.implementation = id.trim().to_string();
        }
        builder
    }

    /// Selects the implementation used to construct stat loggers.
    ///
    /// Defaults to `default`.
    #[must_use]
    pub fn with_implementation<I>(mut self, id: I) -> Self
    where
        I: Into<String>,
    {
        self.implementation = id.into();
        self
    }

    /// Registers an additional implementation under `id`, replacing any implementation with the same identifier.
    #[must_use]
    pub fn register_implementation<I>(mut self, id: I, constructor: FacadeConstructor) -> Self
    where
        I: Into<String>,
    {
        self.implementations.register(id, constructor);
        self
    }

    /// Builds the registry, handing out backend loggers from `provider`.
    ///
    /// # Errors
    ///
    /// If the selected implementation has not been registered, an error is returned.
    pub fn build<P>(self, provider: P) -> Result<LoggerRegistry, ConfigError>
    where
        P: BackendProvider + 'static,
    {
        let constructor = self.implementations.get(&self.implementation).ok_or_else(|| {
            ConfigError::UnknownImplementation {
                id: self.implementation.clone(),
                known: self.implementations.ids().join(", "),
            }
        })?;

        Ok(LoggerRegistry {
            provider: Arc::new(provider),
            constructor,
            implementation: self.implementation,
            loggers: RwLock::new(HashMap::new()),
        })
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        RegistryBuilder {
            implementation: DEFAULT_IMPLEMENTATION.to_string(),
            implementations: Implementations::builtin(),
        }
    }
}

/// Hands out one shared stat logger per name.
///
/// Loggers are created lazily, the first time a name is asked for, and are kept for the lifetime of the registry.
/// When several threads ask for a new name at the same time, each may construct a logger, but only the first one
/// published is ever returned.
pub struct LoggerRegistry {
    provider: Arc<dyn BackendProvider>,
    constructor: FacadeConstructor,
    implementation: String,
    loggers: RwLock<HashMap<String, Arc<StatsLogger>>>,
}

impl LoggerRegistry {
    /// Creates a builder for configuring a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Creates a registry using the default implementation.
    pub fn new<P>(provider: P) -> Self
    where
        P: BackendProvider + 'static,
    {
        LoggerRegistry {
            provider: Arc::new(provider),
            constructor: StatsLogger::new,
            implementation: DEFAULT_IMPLEMENTATION.to_string(),
            loggers: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the stat logger for `name`, creating it if necessary.
    pub fn get_logger(&self, name: &str) -> Arc<StatsLogger> {
        if let Some(logger) = self.loggers.read().get(name) {
            return Arc::clone(logger);
        }

        // Constructed outside the lock; a racing thread may publish first, in which case this one is discarded.
        let candidate = Arc::new((self.constructor)(self.provider.backend(name)));
        let mut loggers = self.loggers.write();
        Arc::clone(loggers.entry(name.to_string()).or_insert(candidate))
    }

    /// Returns the stat logger named after the type `T`.
    ///
    /// The name is the fully-qualified type name, with `::` path separators replaced by `.`.
    pub fn get_logger_for<T>(&self) -> Arc<StatsLogger>
    where
        T: ?Sized,
    {
        self.get_logger(&type_logger_name::<T>())
    }

    /// Returns the identifier of the implementation this registry constructs loggers with.
    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    /// Returns the number of loggers created so far.
    pub fn len(&self) -> usize {
        self.loggers.read().len()
    }

    /// Returns `true` if no logger has been created yet.
    pub fn is_empty(&self) -> bool {
        self.loggers.read().is_empty()
    }
}

impl fmt::Debug for LoggerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggerRegistry")
            .field("implementation", &self.implementation)
            .field("loggers", &self.len())
            .finish_non_exhaustive()
    }
}

pub(crate) fn type_logger_name<T>() -> String
where
    T: ?Sized,
{
    std::any::type_name::<T>().replace("::", ".")
}

/// Installs the process-wide registry.
///
/// # Errors
///
/// If a process-wide registry has already been installed, or one was already created by a call to
/// [`global_registry`], an error carrying `registry` is returned.
pub fn set_global_registry(registry: LoggerRegistry) -> Result<(), SetRegistryError> {
    GLOBAL_REGISTRY.set(registry).map_err(SetRegistryError)
}

/// Returns the process-wide registry, creating it if none has been installed.
///
/// A created registry forwards to the `log` crate, and uses the implementation selected by `STATSD_LOGGER_IMPL`.
///
/// # Errors
///
/// If no registry has been installed and `STATSD_LOGGER_IMPL` names an unknown implementation, an error is
/// returned. Nothing is installed in that case, so a later call tries again.
pub fn try_global_registry() -> Result<&'static LoggerRegistry, ConfigError> {
    GLOBAL_REGISTRY.get_or_try_init(|| {
        RegistryBuilder::from_env().build(LogBackendProvider).map_err(|e| {
            error!(error = %e, "Failed to create the global stats logger registry.");
            e
        })
    })
}

/// Returns the process-wide registry, creating it if none has been installed.
///
/// See [`try_global_registry`] for the fallible version.
///
/// # Panics
///
/// If no registry has been installed and `STATSD_LOGGER_IMPL` names an unknown implementation, this panics.
pub fn global_registry() -> &'static LoggerRegistry {
    match try_global_registry() {
        Ok(registry) => registry,
        Err(e) => panic!("invalid {ENV_IMPLEMENTATION}: {e}"),
    }
}

/// Returns the stat logger for `name` from the process-wide registry.
///
/// # Panics
///
/// Panics under the same conditions as [`global_registry`].
pub fn get_logger(name: &str) -> Arc<StatsLogger> {
    global_registry().get_logger(name)
}

/// Returns the stat logger named after the type `T` from the process-wide registry.
///
/// # Panics
///
/// Panics under the same conditions as [`global_registry`].
pub fn get_logger_for<T>() -> Arc<StatsLogger>
where
    T: ?Sized,
{
    global_registry().get_logger_for::<T>()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{type_logger_name, ConfigError, LoggerRegistry, RegistryBuilder};
    use crate::{
        backend::BackendLogger,
        facade::{StatArgsFormat, StatsLogger},
        log_backend::LogBackendProvider,
    };

    struct Widget;

    fn custom(backend: Arc<dyn BackendLogger>) -> StatsLogger {
        StatsLogger::with_format(backend, StatArgsFormat)
    }

    #[test]
    fn caches_one_logger_per_name() {
        let registry = LoggerRegistry::new(LogBackendProvider);
        assert!(registry.is_empty());

        let first = registry.get_logger("app.requests");
        let second = registry.get_logger("app.requests");
        let other = registry.get_logger("app.errors");

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(first.name(), "app.requests");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn type_names_use_dots() {
        let name = type_logger_name::<Widget>();
        assert!(name.ends_with("registry.tests.Widget"), "{name}");
        assert!(!name.contains("::"));

        let registry = LoggerRegistry::new(LogBackendProvider);
        assert!(Arc::ptr_eq(&registry.get_logger_for::<Widget>(), &registry.get_logger(&name)));
    }

    #[test]
    fn unknown_implementation_fails() {
        let result = RegistryBuilder::default().with_implementation("org.example.Missing").build(LogBackendProvider);
        match result {
            Err(ConfigError::UnknownImplementation { id, known }) => {
                assert_eq!(id, "org.example.Missing");
                assert_eq!(known, "console, default");
            }
            Ok(_) => panic!("expected an unknown implementation error"),
        }
    }

    #[test]
    fn registered_implementation_is_selectable() {
        let registry = LoggerRegistry::builder()
            .register_implementation("custom", custom)
            .with_implementation("custom")
            .build(LogBackendProvider)
            .unwrap();
        assert_eq!(registry.implementation(), "custom");

        let console = LoggerRegistry::builder().with_implementation("console").build(LogBackendProvider).unwrap();
        assert_eq!(console.implementation(), "console");
    }
}
