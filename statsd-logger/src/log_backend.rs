//! Backend that forwards stat calls to the `log` crate.

use std::sync::Arc;

use log::{
    kv::{self, Key, ToValue, Value, VisitSource},
    Metadata, Record,
};

use crate::backend::{ArgValue, BackendLogger, BackendProvider, Level, LogCall};

/// A backend logger that forwards calls to whichever logger is installed in the `log` crate.
///
/// Records are logged with the logger name as their target, the call message (if any) as their text, and the marker
/// and arguments as structured key/values. The marker, if present, is logged under the `marker` key.
#[derive(Clone, Debug)]
pub struct LogBackend {
    name: String,
}

impl LogBackend {
    /// Creates a backend logger for `name`.
    pub fn new<N>(name: N) -> Self
    where
        N: Into<String>,
    {
        LogBackend { name: name.into() }
    }
}

impl BackendLogger for LogBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self, level: Level) -> bool {
        level <= log::max_level()
            && log::logger().enabled(&Metadata::builder().level(level).target(&self.name).build())
    }

    fn log(&self, level: Level, call: LogCall) -> bool {
        let message = call.message.as_deref().unwrap_or_default();
        let source = CallSource(&call);

        log::logger().log(
            &Record::builder()
                .args(format_args!("{message}"))
                .level(level)
                .target(&self.name)
                .key_values(&source)
                .build(),
        );
        true
    }
}

/// Hands out [`LogBackend`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogBackendProvider;

impl BackendProvider for LogBackendProvider {
    fn backend(&self, name: &str) -> Arc<dyn BackendLogger> {
        Arc::new(LogBackend::new(name))
    }
}

struct CallSource<'a>(&'a LogCall);

impl kv::Source for CallSource<'_> {
    fn visit<'kvs>(&'kvs self, visitor: &mut dyn VisitSource<'kvs>) -> Result<(), kv::Error> {
        if let Some(marker) = self.0.marker {
            visitor.visit_pair(Key::from_str("marker"), Value::from(marker))?;
        }
        for arg in &self.0.args {
            visitor.visit_pair(Key::from_str(arg.name), arg.value.to_value())?;
        }
        Ok(())
    }
}

impl ToValue for ArgValue {
    fn to_value(&self) -> Value<'_> {
        match self {
            ArgValue::Kind(kind) => Value::from(kind.as_str()),
            ArgValue::Int(value) => Value::from(*value),
            ArgValue::Float(value) => Value::from(*value),
            ArgValue::Text(value) => Value::from(value.as_str()),
        }
    }
}
