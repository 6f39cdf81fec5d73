use http::Extensions;
use std::future::Future;
use std::sync::Arc;
use tokio::task::futures::TaskLocalFuture;

tokio::task_local! {
    static CURRENT: LogContext;
}

/// Immutable, request-scoped bag of values consulted by handlers.
///
/// Values are keyed by type, so a module can keep its entries private by
/// using a type nobody else can name. Cloning is cheap and deriving a new
/// context never changes the original.
#[derive(Clone, Debug, Default)]
pub struct LogContext {
    values: Arc<Extensions>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a new context that also carries `value`, replacing any
    /// previous value of the same type.
    pub fn with_value<T>(&self, value: T) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        let mut values = (*self.values).clone();
        values.insert(value);
        LogContext {
            values: Arc::new(values),
        }
    }

    pub fn value<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.values.get::<T>()
    }

    /// The context made ambient by [`LogContext::scope`] or
    /// [`LogContext::sync_scope`], or an empty one outside of any scope.
    pub fn current() -> Self {
        CURRENT.try_with(LogContext::clone).unwrap_or_default()
    }

    /// Run `fut` with this context ambient for every poll.
    pub fn scope<F>(self, fut: F) -> TaskLocalFuture<LogContext, F>
    where
        F: Future,
    {
        CURRENT.scope(self, fut)
    }

    /// Run `f` with this context ambient.
    pub fn sync_scope<R>(self, f: impl FnOnce() -> R) -> R {
        CURRENT.sync_scope(self, f)
    }
}
