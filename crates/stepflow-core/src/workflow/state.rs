use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lifecycle::SharedOutCleanups;
use crate::step::StepInstance;

/// Estado de transición publicado a los suscriptores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionStatus {
    NotStarted,
    TransitionIn,
    Ready,
    TransitionOut,
}

impl fmt::Display for TransitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransitionStatus::NotStarted => "notStarted",
            TransitionStatus::TransitionIn => "transitionIn",
            TransitionStatus::Ready => "ready",
            TransitionStatus::TransitionOut => "transitionOut",
        };
        f.write_str(label)
    }
}

/// Proyección observable del step activo.
///
/// `state` es la API devuelta por `build`; no existe todavía mientras el
/// step está en `TransitionIn`.
#[derive(Clone)]
pub enum CurrentStep<S> {
    NotStarted,
    Started {
        status: TransitionStatus,
        kind: String,
        name: String,
        state: Option<S>,
    },
}

impl<S> CurrentStep<S> {
    pub fn status(&self) -> TransitionStatus {
        match self {
            CurrentStep::NotStarted => TransitionStatus::NotStarted,
            CurrentStep::Started { status, .. } => *status,
        }
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            CurrentStep::NotStarted => None,
            CurrentStep::Started { kind, .. } => Some(kind),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            CurrentStep::NotStarted => None,
            CurrentStep::Started { name, .. } => Some(name),
        }
    }

    pub fn state(&self) -> Option<&S> {
        match self {
            CurrentStep::NotStarted => None,
            CurrentStep::Started { state, .. } => state.as_ref(),
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, CurrentStep::Started { .. })
    }
}

impl<S> fmt::Debug for CurrentStep<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentStep::NotStarted => f.write_str("NotStarted"),
            CurrentStep::Started { status, kind, name, state } => f.debug_struct("Started")
                                                                   .field("status", status)
                                                                   .field("kind", kind)
                                                                   .field("name", name)
                                                                   .field("has_state", &state.is_some())
                                                                   .finish(),
        }
    }
}

/// Nodo abandonado, con el input con el que se entró y los cleanups de
/// salida que se ejecutarán al volver con `back()`.
pub(crate) struct HistoryEntry<S> {
    pub node: StepInstance<S>,
    pub input: Value,
    pub out_cleanups: SharedOutCleanups,
}

impl<S> Clone for HistoryEntry<S> {
    fn clone(&self) -> Self {
        Self { node: self.node.clone(),
               input: self.input.clone(),
               out_cleanups: self.out_cleanups.clone() }
    }
}
