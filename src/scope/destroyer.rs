//! Destroy callbacks for scoped objects.

use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

/// Tears down an object when the scope owning it ends.
///
/// Errors and panics are logged and swallowed so one broken object cannot
/// stop its siblings from being destroyed.
pub trait Destroyer<T>: Send + Sync {
    fn destroy(&self, object_id: &str, object: &T) -> anyhow::Result<()>;
}

impl<T, F> Destroyer<T> for F
where
    F: Fn(&str, &T) -> anyhow::Result<()> + Send + Sync,
{
    fn destroy(&self, object_id: &str, object: &T) -> anyhow::Result<()> {
        self(object_id, object)
    }
}

/// Destroyer for objects that need no teardown beyond being dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropOnly;

impl<T> Destroyer<T> for DropOnly {
    fn destroy(&self, _object_id: &str, _object: &T) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Runs `destroyer` on one object, returning false if it failed.
pub(crate) fn destroy_quietly<T>(destroyer: &dyn Destroyer<T>, object_id: &str, object: &T) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| destroyer.destroy(object_id, object))) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!(object_id, error = %err, "Destroy callback failed");
            false
        }
        Err(_) => {
            warn!(object_id, "Destroy callback panicked");
            false
        }
    }
}
