use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde_json::Value;

use super::{ReactiveStore, StoreListener, Unsubscribe};

#[derive(Default)]
struct StoreInner {
    state: RefCell<Value>,
    listeners: RefCell<Vec<(u64, StoreListener)>>,
    next_id: Cell<u64>,
}

/// Store en memoria. Los clones comparten el mismo estado.
///
/// Los listeners se invocan de forma síncrona después de reemplazar el
/// estado y sin ningún préstamo interno activo, de modo que pueden leer o
/// volver a escribir el store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Rc<StoreInner>,
}

impl InMemoryStore {
    pub fn new(initial: Value) -> Self {
        let store = Self::default();
        store.inner.state.replace(initial);
        store
    }

    /// Aplica `f` sobre el estado actual y publica el resultado.
    pub fn update<F>(&self, f: F)
        where F: FnOnce(&Value) -> Value
    {
        let next = f(&self.inner.state.borrow());
        self.set_state(next);
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
         .field("state", &self.inner.state.borrow())
         .field("listeners", &self.listener_count())
         .finish()
    }
}

impl ReactiveStore for InMemoryStore {
    fn get_state(&self) -> Value {
        self.inner.state.borrow().clone()
    }

    fn set_state(&self, value: Value) {
        self.inner.state.replace(value);
        let listeners: Vec<StoreListener> = self.inner.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener();
        }
    }

    fn subscribe(&self, listener: StoreListener) -> Unsubscribe {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.listeners.borrow_mut().push((id, listener));
        let weak: Weak<StoreInner> = Rc::downgrade(&self.inner);
        Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
            }
        })
    }
}
