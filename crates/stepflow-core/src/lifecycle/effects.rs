//! Efectos posicionales con diffing de dependencias.
//!
//! Reglas por posición en cada rebuild del mismo nodo:
//! - sin `deps`: se re-ejecuta siempre;
//! - `deps` vacío: sólo si no existía entrada previa en esa posición;
//! - `deps` no vacío: si algún elemento difiere del rebuild anterior.
//!
//! Antes de re-ejecutar se corre el cleanup previo. Las posiciones que
//! desaparecen ejecutan su cleanup y se descartan.

use serde_json::Value;

use super::cleanup::{run_cleanup, Cleanup};

/// Lista de dependencias. Se compara elemento a elemento por igualdad de
/// valor, no por identidad: un `json!({})` recreado en cada build es igual
/// al anterior y no vuelve a ejecutar el efecto. Para forzar la
/// re-ejecución hay que cambiar el contenido (p. ej. un contador).
pub type DependencyList = Vec<Value>;

pub type EffectFn = Box<dyn FnOnce() -> Option<Cleanup>>;

/// Efecto registrado durante un build.
pub struct EffectDef {
    pub run: EffectFn,
    pub deps: Option<DependencyList>,
}

/// Efecto vivo en el contexto: sus dependencias y su cleanup pendiente.
#[derive(Default)]
pub struct EffectEntry {
    pub deps: Option<DependencyList>,
    pub cleanup: Option<Cleanup>,
}

fn shallow_equal(prev: Option<&DependencyList>, next: &DependencyList) -> bool {
    match prev {
        Some(p) => p.len() == next.len() && p.iter().zip(next).all(|(a, b)| a == b),
        None => false,
    }
}

fn should_run(prev: Option<&EffectEntry>, deps: Option<&DependencyList>) -> bool {
    match deps {
        None => true,
        Some(d) if d.is_empty() => prev.is_none(),
        Some(d) => !shallow_equal(prev.and_then(|p| p.deps.as_ref()), d),
    }
}

/// Ejecuta todos los efectos de un build inicial.
pub(crate) fn initial_effects(defs: Vec<EffectDef>) -> Vec<EffectEntry> {
    defs.into_iter()
        .map(|def| {
            let cleanup = (def.run)();
            EffectEntry { deps: def.deps, cleanup }
        })
        .collect()
}

/// Reconciliación tras un rebuild.
pub(crate) fn reconcile_effects(prev: Vec<EffectEntry>, defs: Vec<EffectDef>) -> Vec<EffectEntry> {
    let mut prev = prev.into_iter().map(Some).collect::<Vec<_>>();
    let mut next = Vec::with_capacity(defs.len());
    let def_count = defs.len();
    for (i, def) in defs.into_iter().enumerate() {
        let previous = prev.get_mut(i).and_then(Option::take);
        if should_run(previous.as_ref(), def.deps.as_ref()) {
            if let Some(cleanup) = previous.and_then(|p| p.cleanup) {
                run_cleanup(cleanup);
            }
            let cleanup = (def.run)();
            next.push(EffectEntry { deps: def.deps, cleanup });
        } else {
            let cleanup = previous.and_then(|p| p.cleanup);
            next.push(EffectEntry { deps: def.deps, cleanup });
        }
    }
    // posiciones que ya no existen
    for stale in prev.into_iter().skip(def_count).flatten() {
        if let Some(cleanup) = stale.cleanup {
            run_cleanup(cleanup);
        }
    }
    next
}

/// Ejecuta los cleanups de todos los efectos vivos, en orden de posición.
pub(crate) fn run_effect_cleanups(effects: Vec<EffectEntry>) {
    for cleanup in effects.into_iter().filter_map(|e| e.cleanup) {
        run_cleanup(cleanup);
    }
}
