//! LIFO resource scope.
//!
//! A [`ResourceScope`] owns everything acquired during a lifecycle (temporary
//! directories, running node processes, deferred callbacks) and releases it
//! in exactly the reverse order of acquisition. Closing is idempotent and is
//! also performed on `Drop`, so resources are reclaimed on every exit path.
//! A closed scope is single-use: further acquisitions are rejected.

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

/// Something a [`ResourceScope`] can own and later release exactly once.
pub trait ScopedResource: Send {
    /// Human-readable label used in logs and error context.
    fn label(&self) -> String;

    /// Release the resource. Consumes it so release cannot happen twice.
    fn release(self: Box<Self>) -> Result<()>;
}

impl ScopedResource for tempfile::TempDir {
    fn label(&self) -> String {
        format!("temporary directory {}", self.path().display())
    }

    fn release(self: Box<Self>) -> Result<()> {
        let path = self.path().to_path_buf();
        (*self)
            .close()
            .with_context(|| format!("Failed to remove temporary directory {}", path.display()))
    }
}

/// Callback registered with [`ResourceScope::defer`].
struct Deferred<F> {
    label: String,
    callback: F,
}

impl<F> ScopedResource for Deferred<F>
where
    F: FnOnce() -> Result<()> + Send,
{
    fn label(&self) -> String {
        self.label.clone()
    }

    fn release(self: Box<Self>) -> Result<()> {
        (self.callback)()
    }
}

/// Ordered stack of acquired resources with guaranteed unwind on close.
#[derive(Default)]
pub struct ResourceScope {
    resources: Vec<Box<dyn ScopedResource>>,
    closed: bool,
}

impl std::fmt::Debug for ResourceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<String> = self.resources.iter().map(|r| r.label()).collect();
        f.debug_struct("ResourceScope")
            .field("resources", &labels)
            .field("closed", &self.closed)
            .finish()
    }
}

impl ResourceScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `resource`; it is released when the scope closes.
    ///
    /// Fails if the scope has already been closed. In that case the resource
    /// is dropped immediately, which runs its own `Drop` cleanup.
    pub fn push<R: ScopedResource + 'static>(&mut self, resource: R) -> Result<()> {
        self.push_boxed(Box::new(resource))
    }

    pub fn push_boxed(&mut self, resource: Box<dyn ScopedResource>) -> Result<()> {
        if self.closed {
            bail!(
                "resource scope is closed; cannot acquire {}",
                resource.label()
            );
        }
        debug!(resource = %resource.label(), depth = self.resources.len() + 1, "acquired");
        self.resources.push(resource);
        Ok(())
    }

    /// Register a callback to run when the scope closes.
    pub fn defer<F>(&mut self, label: impl Into<String>, callback: F) -> Result<()>
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.push(Deferred {
            label: label.into(),
            callback,
        })
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release every held resource, most recently acquired first.
    ///
    /// A failing release does not stop the unwind; the first failure is
    /// returned after all resources have been attempted. Closing an already
    /// closed scope is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_error: Option<anyhow::Error> = None;
        while let Some(resource) = self.resources.pop() {
            let label = resource.label();
            match resource.release() {
                Ok(()) => debug!(resource = %label, "released"),
                Err(error) => {
                    warn!(resource = %label, error = %format!("{error:#}"), "release failed");
                    if first_error.is_none() {
                        first_error = Some(error.context(format!("Failed to release {label}")));
                    }
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Drop for ResourceScope {
    fn drop(&mut self) {
        // Failures were already logged per resource.
        let _ = self.close();
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
