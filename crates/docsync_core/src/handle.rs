//! Resolve-on-first-use store handles.

use crate::error::{BackendError, BackendResult};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

type Provider<T> = Box<dyn Fn() -> BackendResult<Arc<T>> + Send + Sync>;

/// A store handle that is either supplied up front or opened on first use.
///
/// A deferred handle calls its provider the first time [`LazyHandle::get`]
/// is called and caches the result. A failed attempt caches nothing, so the
/// next call tries again. A backend that is constructed but never exercised
/// never opens a connection.
///
/// # Example
///
/// ```rust
/// use docsync_core::LazyHandle;
/// use std::sync::Arc;
///
/// let handle: LazyHandle<str> = LazyHandle::deferred(|| Ok(Arc::from("conn")));
/// assert!(!handle.is_resolved());
/// assert_eq!(&*handle.get().unwrap(), "conn");
/// assert!(handle.is_resolved());
/// ```
pub struct LazyHandle<T: ?Sized> {
    slot: RwLock<Option<Arc<T>>>,
    provider: Option<Provider<T>>,
}

impl<T: ?Sized> LazyHandle<T> {
    /// Wraps an already-open handle.
    pub fn resolved(handle: Arc<T>) -> Self {
        Self {
            slot: RwLock::new(Some(handle)),
            provider: None,
        }
    }

    /// Defers opening to `provider`.
    pub fn deferred<F>(provider: F) -> Self
    where
        F: Fn() -> BackendResult<Arc<T>> + Send + Sync + 'static,
    {
        Self {
            slot: RwLock::new(None),
            provider: Some(Box::new(provider)),
        }
    }

    /// Returns the handle, opening it if needed.
    ///
    /// # Errors
    ///
    /// Returns the provider's error, or
    /// [`BackendError::DependencyUnavailable`] if there is nothing to resolve.
    pub fn get(&self) -> BackendResult<Arc<T>> {
        if let Some(handle) = self.slot.read().as_ref() {
            return Ok(handle.clone());
        }

        let mut slot = self.slot.write();
        if let Some(handle) = slot.as_ref() {
            return Ok(handle.clone());
        }
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| BackendError::dependency_unavailable("no handle and no provider"))?;
        let handle = provider()?;
        *slot = Some(handle.clone());
        Ok(handle)
    }

    /// Returns true once the handle has been opened.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.slot.read().is_some()
    }
}

impl<T: ?Sized> fmt::Debug for LazyHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyHandle")
            .field("resolved", &self.is_resolved())
            .field("deferred", &self.provider.is_some())
            .finish()
    }
}
