//! RAII guard around one checked-out pool item.

use std::ops::{Deref, DerefMut};
use std::sync::Weak;

use crate::assistant::Assistant;
use crate::pool::Shared;

/// Heap slot a handle carries its value in. Empty slots are recycled by the
/// pool's shell bag.
pub(crate) struct Shell<T> {
    pub(crate) value: Option<T>,
}

impl<T> Default for Shell<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

/// What happens to a handle's shell when it is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retention {
    /// Short-lived use: the shell goes back to the pool for reuse.
    #[default]
    Temporary,
    /// Long-lived use: the shell is freed instead of recycled.
    Retained,
}

/// A checked-out item. Dropping (or [`dispose`](Self::dispose)-ing) the
/// handle returns the item to its pool exactly once.
///
/// Release consumes the handle, so there is no way to touch the item after
/// it went back. If the pool itself has been dropped in the meantime, the
/// item is dropped instead.
pub struct PoolHandle<T, S, A: Assistant<T, S>> {
    shell: Option<Box<Shell<T>>>,
    pool: Weak<Shared<T, S, A>>,
    retention: Retention,
}

impl<T, S, A: Assistant<T, S>> PoolHandle<T, S, A> {
    pub(crate) fn new(shell: Box<Shell<T>>, pool: Weak<Shared<T, S, A>>) -> Self {
        Self {
            shell: Some(shell),
            pool,
            retention: Retention::Temporary,
        }
    }

    fn value(&self) -> &T {
        match self.shell.as_deref().and_then(|s| s.value.as_ref()) {
            Some(value) => value,
            None => unreachable!("pool handle holds no value"),
        }
    }

    fn value_mut(&mut self) -> &mut T {
        match self.shell.as_deref_mut().and_then(|s| s.value.as_mut()) {
            Some(value) => value,
            None => unreachable!("pool handle holds no value"),
        }
    }

    /// Mark the handle as long-lived: on release its shell is freed rather
    /// than recycled. The item still returns to the pool.
    pub fn retain(&mut self) {
        self.retention = Retention::Retained;
    }

    /// Current retention mode.
    pub fn retention(&self) -> Retention {
        self.retention
    }

    /// Whether the shell will be recycled on release.
    pub fn is_temporary(&self) -> bool {
        self.retention == Retention::Temporary
    }

    /// Release now. Equivalent to dropping the handle.
    pub fn dispose(self) {
        drop(self);
    }

    /// Take the item out of the pool for good. Nothing is returned to the
    /// idle bag; the empty shell is still recycled.
    pub fn into_inner(mut self) -> T {
        let Some(mut shell) = self.shell.take() else {
            unreachable!("pool handle holds no shell");
        };
        let Some(value) = shell.value.take() else {
            unreachable!("pool handle holds no value");
        };
        if let Some(pool) = self.pool.upgrade() {
            pool.detach(shell);
        }
        value
    }
}

impl<T, S, A: Assistant<T, S>> Deref for PoolHandle<T, S, A> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value()
    }
}

impl<T, S, A: Assistant<T, S>> DerefMut for PoolHandle<T, S, A> {
    fn deref_mut(&mut self) -> &mut T {
        self.value_mut()
    }
}

impl<T, S, A: Assistant<T, S>> AsRef<T> for PoolHandle<T, S, A> {
    fn as_ref(&self) -> &T {
        self.value()
    }
}

impl<T, S, A: Assistant<T, S>> AsMut<T> for PoolHandle<T, S, A> {
    fn as_mut(&mut self) -> &mut T {
        self.value_mut()
    }
}

impl<T, S, A: Assistant<T, S>> Drop for PoolHandle<T, S, A> {
    fn drop(&mut self) {
        let Some(shell) = self.shell.take() else {
            return;
        };
        match self.pool.upgrade() {
            Some(pool) => pool.release(shell, self.retention),
            None => drop(shell),
        }
    }
}

impl<T: std::fmt::Debug, S, A: Assistant<T, S>> std::fmt::Debug for PoolHandle<T, S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle")
            .field("value", self.value())
            .field("retention", &self.retention)
            .finish()
    }
}
