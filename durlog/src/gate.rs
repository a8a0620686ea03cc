//! Exclusion gate around the pending batch and the file append.

/// Holding the gate longer than this is reported in debug builds; it usually
/// means the disk is stalling inside `sync_all`.
#[cfg(debug_assertions)]
pub const GATE_HOLD_WARNING: std::time::Duration = std::time::Duration::from_secs(1);

pub struct Gate<T: ?Sized> {
    inner: std::sync::Mutex<T>,
}

#[cfg(debug_assertions)]
struct DropTracker {
    acquired: std::time::Instant,
    caller: &'static std::panic::Location<'static>,
}

#[cfg(debug_assertions)]
impl DropTracker {
    fn new(caller: &'static std::panic::Location<'static>) -> Self {
        Self {
            acquired: std::time::Instant::now(),
            caller,
        }
    }
    #[inline(never)]
    fn report_overheld_if_needed(&self) {
        let held = self.acquired.elapsed();
        if held < GATE_HOLD_WARNING {
            return;
        }
        crate::diag!(
            "flush gate held for {:.3}s (acquired at {}:{})",
            held.as_secs_f32(),
            self.caller.file(),
            self.caller.line()
        );
    }
}

pub struct GateGuard<'a, T: ?Sized + 'a> {
    inner: std::sync::MutexGuard<'a, T>,
    #[cfg(debug_assertions)]
    tracker: DropTracker,
}

impl<T> Gate<T> {
    pub const fn new(t: T) -> Gate<T> {
        Gate {
            inner: std::sync::Mutex::new(t),
        }
    }
}

impl<T: ?Sized> Gate<T> {
    /// Waits for the gate. A poisoned gate is recovered: the guarded batch is
    /// only ever mutated by complete push or clear operations.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn lock(&self) -> GateGuard<'_, T> {
        let inner = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        GateGuard {
            inner,
            #[cfg(debug_assertions)]
            tracker: DropTracker::new(std::panic::Location::caller()),
        }
    }

    /// Takes the gate only if nobody holds it.
    #[cfg_attr(debug_assertions, track_caller)]
    pub fn try_lock(&self) -> Option<GateGuard<'_, T>> {
        let inner = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(std::sync::TryLockError::WouldBlock) => return None,
        };
        Some(GateGuard {
            inner,
            #[cfg(debug_assertions)]
            tracker: DropTracker::new(std::panic::Location::caller()),
        })
    }
}

impl<T: ?Sized> std::ops::Deref for GateGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: ?Sized> std::ops::DerefMut for GateGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

#[cfg(debug_assertions)]
impl<'a, T: ?Sized + 'a> Drop for GateGuard<'a, T> {
    fn drop(&mut self) {
        self.tracker.report_overheld_if_needed();
    }
}
