use std::cell::RefCell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use log::warn;

use crate::constants::LOG_TARGET;

/// Función de limpieza devuelta por hooks y efectos.
pub type Cleanup = Box<dyn FnOnce()>;

/// Hook de transición (entrada o salida). Se ejecuta como mucho una vez.
pub type TransitionHook = Box<dyn FnOnce() -> HookOutcome>;

/// Resultado de un hook de transición.
#[derive(Default)]
pub enum HookOutcome {
    #[default]
    None,
    Cleanup(Cleanup),
    Deferred(DeferredCleanup),
}

impl HookOutcome {
    pub fn cleanup<F>(f: F) -> Self
        where F: FnOnce() + 'static
    {
        HookOutcome::Cleanup(Box::new(f))
    }
}

impl From<()> for HookOutcome {
    fn from(_: ()) -> Self {
        HookOutcome::None
    }
}

impl From<DeferredCleanup> for HookOutcome {
    fn from(d: DeferredCleanup) -> Self {
        HookOutcome::Deferred(d)
    }
}

impl fmt::Debug for HookOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookOutcome::None => f.write_str("None"),
            HookOutcome::Cleanup(_) => f.write_str("Cleanup(..)"),
            HookOutcome::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

pub(crate) type Settlement = Result<Option<Cleanup>, String>;
type Continuation = Box<dyn FnOnce(Settlement)>;

#[derive(Default)]
struct DeferredCell {
    settled: Option<Settlement>,
    continuation: Option<Continuation>,
}

/// Cleanup que llegará más tarde. Es la contraparte del runtime de un
/// [`CleanupResolver`]; ambos se crean con [`deferred`].
pub struct DeferredCleanup {
    cell: Rc<RefCell<DeferredCell>>,
}

/// Extremo productor de un cleanup diferido. Se consume al resolver o
/// rechazar, por lo que sólo puede asentarse una vez; si se descarta sin
/// asentarse el cleanup nunca llega.
pub struct CleanupResolver {
    cell: Rc<RefCell<DeferredCell>>,
}

/// Crea un par (cleanup diferido, resolver) de un solo uso.
pub fn deferred() -> (DeferredCleanup, CleanupResolver) {
    let cell = Rc::new(RefCell::new(DeferredCell::default()));
    (DeferredCleanup { cell: cell.clone() }, CleanupResolver { cell })
}

impl DeferredCleanup {
    /// Registra la continuación. Si el valor ya estaba asentado se invoca
    /// de inmediato.
    pub(crate) fn on_settle<F>(self, k: F)
        where F: FnOnce(Settlement) + 'static
    {
        let ready = self.cell.borrow_mut().settled.take();
        match ready {
            Some(value) => k(value),
            None => self.cell.borrow_mut().continuation = Some(Box::new(k)),
        }
    }
}

impl CleanupResolver {
    pub fn resolve(self, cleanup: Option<Cleanup>) {
        self.settle(Ok(cleanup));
    }

    pub fn resolve_with<F>(self, f: F)
        where F: FnOnce() + 'static
    {
        self.settle(Ok(Some(Box::new(f))));
    }

    pub fn reject(self, reason: impl Into<String>) {
        self.settle(Err(reason.into()));
    }

    fn settle(self, value: Settlement) {
        let continuation = self.cell.borrow_mut().continuation.take();
        match continuation {
            Some(k) => k(value),
            None => self.cell.borrow_mut().settled = Some(value),
        }
    }
}

/// Ejecuta un cleanup sin dejar escapar un pánico.
pub(crate) fn run_cleanup(cleanup: Cleanup) {
    if catch_unwind(AssertUnwindSafe(cleanup)).is_err() {
        warn!(target: LOG_TARGET, "cleanup panicked; ignoring");
    }
}

/// Cleanups devueltos por los hooks de salida, ejecutados al volver con
/// `back()` al step. Una vez marcados como ejecutados, cualquier cleanup
/// que llegue tarde se ejecuta en el acto.
#[derive(Default)]
pub(crate) struct OutCleanups {
    pending: Vec<Cleanup>,
    executed: bool,
}

pub(crate) type SharedOutCleanups = Rc<RefCell<OutCleanups>>;

impl OutCleanups {
    pub(crate) fn shared() -> SharedOutCleanups {
        Rc::new(RefCell::new(OutCleanups::default()))
    }

    pub(crate) fn push_or_run(this: &SharedOutCleanups, cleanup: Cleanup) {
        let run_now = {
            let mut guard = this.borrow_mut();
            if guard.executed {
                Some(cleanup)
            } else {
                guard.pending.push(cleanup);
                None
            }
        };
        if let Some(c) = run_now {
            run_cleanup(c);
        }
    }

    pub(crate) fn run_all(this: &SharedOutCleanups) {
        let pending = {
            let mut guard = this.borrow_mut();
            guard.executed = true;
            std::mem::take(&mut guard.pending)
        };
        for c in pending {
            run_cleanup(c);
        }
    }
}
