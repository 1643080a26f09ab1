use std::{collections::HashMap, fmt, sync::Arc};

use crate::{
    backend::BackendLogger,
    facade::{ConsoleFormat, StatsLogger},
};

/// Identifier of the built-in implementation that uses [`StatArgsFormat`][crate::StatArgsFormat].
pub const DEFAULT_IMPLEMENTATION: &str = "default";

/// Identifier of the built-in implementation that uses [`ConsoleFormat`].
pub const CONSOLE_IMPLEMENTATION: &str = "console";

/// Builds a stat logger over a backend logger.
///
/// Constructors must not have side effects: a registry may call one more than once for the same name, and only keep
/// one of the results.
pub type FacadeConstructor = fn(Arc<dyn BackendLogger>) -> StatsLogger;

/// Stat logger implementations, by identifier.
#[derive(Clone)]
pub struct Implementations {
    constructors: HashMap<String, FacadeConstructor>,
}

impl Implementations {
    /// Creates a set holding only the built-in implementations.
    pub fn builtin() -> Self {
        let mut constructors = HashMap::new();
        constructors.insert(DEFAULT_IMPLEMENTATION.to_string(), default_facade as FacadeConstructor);
        constructors.insert(CONSOLE_IMPLEMENTATION.to_string(), console_facade as FacadeConstructor);
        Implementations { constructors }
    }

    /// Registers an implementation, returning the constructor it replaced, if any.
    pub fn register<I>(&mut self, id: I, constructor: FacadeConstructor) -> Option<FacadeConstructor>
    where
        I: Into<String>,
    {
        self.constructors.insert(id.into(), constructor)
    }

    /// Returns the constructor registered under `id`.
    pub fn get(&self, id: &str) -> Option<FacadeConstructor> {
        self.constructors.get(id).copied()
    }

    /// Returns every registered identifier, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for Implementations {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for Implementations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.ids()).finish()
    }
}

fn default_facade(backend: Arc<dyn BackendLogger>) -> StatsLogger {
    StatsLogger::new(backend)
}

fn console_facade(backend: Arc<dyn BackendLogger>) -> StatsLogger {
    StatsLogger::with_format(backend, ConsoleFormat)
}
