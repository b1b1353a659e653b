//! Modelo de steps.
//!
//! Un `StepKind` describe un tipo de step: validadores opcionales de input,
//! output y config, una fábrica opcional de store y la función `build` que
//! produce la API del step activo. Un `StepInstance` es una ocurrencia
//! concreta con nombre (`id = kind + "_" + name`) creada por la fábrica del
//! kind; su config se valida y su store se crea en ese momento.

mod args;
mod definition;
mod instance;

pub use args::{BuildArgs, Next};
pub use definition::{BuildFn, StepKind, StepKindBuilder, StoreFactory};
pub use instance::StepInstance;
