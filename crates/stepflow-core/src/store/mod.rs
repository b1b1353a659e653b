//! Store reactivo asociado a un step y trait ReactiveStore.

mod memory;

pub use memory::InMemoryStore;

use std::rc::Rc;

use serde_json::Value;

/// Función que cancela una suscripción.
pub type Unsubscribe = Box<dyn FnOnce()>;

/// Listener notificado tras cada `set_state`.
pub type StoreListener = Rc<dyn Fn()>;

/// Contrato mínimo que el runtime usa del store de un step: leer el
/// snapshot, reemplazarlo y suscribirse a cambios.
pub trait ReactiveStore {
    fn get_state(&self) -> Value;

    fn set_state(&self, value: Value);

    fn subscribe(&self, listener: StoreListener) -> Unsubscribe;
}

pub type SharedStore = Rc<dyn ReactiveStore>;
