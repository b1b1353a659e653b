//! Protocolo de transición: entrada, salida, rebuild por store y avance
//! por edges.

use std::rc::Rc;

use log::{debug, error, warn};
use serde_json::Value;

use super::core::Workflow;
use super::state::{CurrentStep, HistoryEntry, TransitionStatus};
use crate::constants::LOG_TARGET;
use crate::edge::EdgeDecision;
use crate::errors::{SchemaRole, WorkflowError};
use crate::lifecycle::{initial_effects, reconcile_effects, run_cleanup, run_effect_cleanups, HookOutcome, OutCleanups,
                       SharedOutCleanups, TransitionHook, WorkflowContext};
use crate::step::{BuildArgs, Next, StepInstance};

impl<S: Clone + 'static> Workflow<S> {
    /// Publica el estado actual a los suscriptores, sin préstamos activos.
    pub(crate) fn notify(&self) {
        let (kind, name, status, subscribers) = {
            let rt = self.runtime.borrow();
            let CurrentStep::Started { status, kind, name, .. } = &rt.current_step else {
                return;
            };
            let subscribers: Vec<_> = rt.subscribers.iter().map(|(_, s)| s.clone()).collect();
            (kind.clone(), name.clone(), *status, subscribers)
        };
        for subscriber in subscribers {
            subscriber(&kind, &name, status);
        }
    }

    fn publish(&self, node: &StepInstance<S>, status: TransitionStatus, state: Option<S>) {
        self.runtime.borrow_mut().current_step = CurrentStep::Started { status,
                                                                        kind: node.kind().to_string(),
                                                                        name: node.name().to_string(),
                                                                        state };
        self.notify();
    }

    fn build_args(&self, node: &StepInstance<S>, input: Value, version: u64, rebuild: bool) -> BuildArgs<S> {
        let next = Next::new(Rc::downgrade(&self.runtime), node.id().to_string(), version);
        BuildArgs::new(node.name().to_string(), input, node.config().cloned(), node.store(), next, rebuild)
    }

    /// Entra en `node`. Con `back` se ejecutan antes los cleanups de salida
    /// que el nodo dejó pendientes la última vez que se abandonó.
    pub(crate) fn transition_into(&self,
                                  node: StepInstance<S>,
                                  input: Value,
                                  back: Option<SharedOutCleanups>)
                                  -> Result<(), WorkflowError> {
        self.runtime.borrow_mut().current = Some(node.clone());
        self.publish(&node, TransitionStatus::TransitionIn, None);
        debug!(target: LOG_TARGET, "transition:in node={} back={}", node.id(), back.is_some());

        if let Some(bucket) = back {
            OutCleanups::run_all(&bucket);
        }

        let version = {
            let mut rt = self.runtime.borrow_mut();
            rt.version_counter += 1;
            rt.version_counter
        };
        let args = self.build_args(&node, input.clone(), version, false);
        let state = (node.build_fn())(&args)?;
        let registrations = args.into_registrations();

        self.runtime.borrow_mut().context =
            Some(WorkflowContext::new(version, input, registrations.in_hooks, registrations.out_hooks));
        self.run_in_hooks(version);

        let effects = initial_effects(registrations.effects);
        if !self.attach(version, |ctx| ctx.effects = effects) {
            // un hook de entrada ya abandonó el nodo
            return Ok(());
        }

        if let Some(store) = node.store() {
            let weak = Rc::downgrade(&self.runtime);
            let node_id = node.id().to_string();
            let unsubscribe = store.subscribe(Rc::new(move || {
                                                 if let Some(runtime) = weak.upgrade() {
                                                     Workflow::from_shared(runtime).rebuild(&node_id, version);
                                                 }
                                             }));
            let mut pending = Some(unsubscribe);
            self.attach(version, |ctx| ctx.store_unsub = pending.take());
            if let Some(unsubscribe) = pending {
                unsubscribe();
            }
        }

        if self.runtime.borrow().is_live(version) {
            self.publish(&node, TransitionStatus::Ready, Some(state));
        }
        Ok(())
    }

    /// Aplica `f` al contexto si sigue siendo la generación `version`.
    fn attach<F>(&self, version: u64, f: F) -> bool
        where F: FnOnce(&mut WorkflowContext)
    {
        let mut rt = self.runtime.borrow_mut();
        match rt.context.as_mut() {
            Some(ctx) if ctx.version == version => {
                f(ctx);
                true
            }
            _ => false,
        }
    }

    fn run_in_hooks(&self, version: u64) {
        let hooks: Vec<TransitionHook> = {
            let mut rt = self.runtime.borrow_mut();
            match rt.context.as_mut() {
                Some(ctx) if !ctx.has_run_in => {
                    ctx.has_run_in = true;
                    std::mem::take(&mut ctx.in_hooks)
                }
                _ => return,
            }
        };
        for (index, hook) in hooks.into_iter().enumerate() {
            match hook() {
                HookOutcome::None => {}
                HookOutcome::Cleanup(cleanup) => {
                    let mut pending = Some(cleanup);
                    self.attach(version, |ctx| ctx.in_cleanups.extend(pending.take()));
                    if let Some(cleanup) = pending {
                        run_cleanup(cleanup);
                    }
                }
                HookOutcome::Deferred(deferred) => {
                    let weak = Rc::downgrade(&self.runtime);
                    deferred.on_settle(move |settlement| match settlement {
                                Ok(Some(cleanup)) => {
                                    let stale = match weak.upgrade() {
                                        Some(runtime) => {
                                            let mut rt = runtime.borrow_mut();
                                            match rt.context.as_mut() {
                                                Some(ctx) if ctx.version == version => {
                                                    ctx.in_cleanups.push(cleanup);
                                                    None
                                                }
                                                _ => Some(cleanup),
                                            }
                                        }
                                        None => Some(cleanup),
                                    };
                                    if let Some(cleanup) = stale {
                                        run_cleanup(cleanup);
                                    }
                                }
                                Ok(None) => {}
                                Err(reason) => {
                                    warn!(target: LOG_TARGET, "transitionIn hook #{index} rejected: {reason}");
                                }
                            });
                }
            }
        }
    }

    /// Secuencia de salida del nodo activo. Devuelve el input con el que se
    /// entró y los cleanups de salida para un futuro `back()`.
    pub(crate) fn exit_sequence(&self) -> Option<(Value, SharedOutCleanups)> {
        let (ctx, node, state) = {
            let mut rt = self.runtime.borrow_mut();
            let ctx = rt.context.take()?;
            let node = rt.current.clone()?;
            (ctx, node, rt.current_step.state().cloned())
        };
        self.publish(&node, TransitionStatus::TransitionOut, state);
        debug!(target: LOG_TARGET, "transition:out node={}", node.id());

        let WorkflowContext { out_hooks, effects, in_cleanups, store_unsub, current_input, .. } = ctx;
        let bucket = OutCleanups::shared();
        for (index, hook) in out_hooks.into_iter().enumerate() {
            match hook() {
                HookOutcome::None => {}
                HookOutcome::Cleanup(cleanup) => OutCleanups::push_or_run(&bucket, cleanup),
                HookOutcome::Deferred(deferred) => {
                    let bucket = bucket.clone();
                    deferred.on_settle(move |settlement| match settlement {
                                Ok(Some(cleanup)) => OutCleanups::push_or_run(&bucket, cleanup),
                                Ok(None) => {}
                                Err(reason) => {
                                    warn!(target: LOG_TARGET, "transitionOut hook #{index} rejected: {reason}");
                                }
                            });
                }
            }
        }
        run_effect_cleanups(effects);
        for cleanup in in_cleanups {
            run_cleanup(cleanup);
        }
        if let Some(unsubscribe) = store_unsub {
            unsubscribe();
        }
        Some((current_input, bucket))
    }

    /// Sale del nodo activo sin guardarlo en el historial: nadie volverá a
    /// él con `back()`, así que sus cleanups de salida corren ya y los que
    /// lleguen tarde, al resolverse.
    pub(crate) fn discard_exit(&self) {
        if let Some((_, bucket)) = self.exit_sequence() {
            OutCleanups::run_all(&bucket);
        }
    }

    /// Vacía el historial ejecutando los cleanups de salida pendientes.
    pub(crate) fn discard_history(&self) {
        let dropped = std::mem::take(&mut self.runtime.borrow_mut().history);
        for entry in dropped {
            OutCleanups::run_all(&entry.out_cleanups);
        }
    }

    /// Rebuild del nodo activo tras un cambio de su store. Reutiliza el
    /// contexto: no re-ejecuta hooks de entrada, reemplaza los de salida y
    /// reconcilia efectos.
    pub(crate) fn rebuild(&self, node_id: &str, version: u64) {
        let (node, input) = {
            let rt = self.runtime.borrow();
            match (rt.current.as_ref(), rt.context.as_ref()) {
                (Some(node), Some(ctx)) if node.id() == node_id && ctx.version == version => {
                    (node.clone(), ctx.current_input.clone())
                }
                _ => return,
            }
        };
        debug!(target: LOG_TARGET, "rebuild node={node_id} version={version}");

        let args = self.build_args(&node, input, version, true);
        let state = match (node.build_fn())(&args) {
            Ok(state) => state,
            Err(e) => {
                error!(target: LOG_TARGET, "rebuild failed node={node_id}: {e}");
                return;
            }
        };
        let registrations = args.into_registrations();

        let mut out_hooks = Some(registrations.out_hooks);
        let mut previous = None;
        let live = self.attach(version, |ctx| {
                           ctx.out_hooks = out_hooks.take().unwrap_or_default();
                           previous = Some(std::mem::take(&mut ctx.effects));
                       });
        if !live {
            return;
        }
        let effects = reconcile_effects(previous.unwrap_or_default(), registrations.effects);
        let mut pending = Some(effects);
        self.attach(version, |ctx| ctx.effects = pending.take().unwrap_or_default());
        if let Some(orphaned) = pending {
            run_effect_cleanups(orphaned);
            return;
        }
        self.publish(&node, TransitionStatus::Ready, Some(state));
    }

    /// `next(output)` del nodo `node_id` en la generación `version`.
    pub(crate) fn advance(&self, node_id: &str, version: u64, output: Value) -> Result<(), WorkflowError> {
        let (node, edges, handoff) = {
            let rt = self.runtime.borrow();
            let node = rt.current
                         .as_ref()
                         .filter(|n| n.id() == node_id && rt.is_live(version))
                         .cloned()
                         .ok_or_else(|| WorkflowError::StaleStep(node_id.to_string()))?;
            let edges: Vec<_> = rt.edges.iter().filter(|e| e.from_id() == node_id).cloned().collect();
            let handoff = rt.handoff.as_ref().filter(|h| h.from == node_id).map(|h| h.forward.clone());
            (node, edges, handoff)
        };
        let output = node.validate(SchemaRole::Output, output)?;
        if edges.is_empty() && handoff.is_none() {
            return Err(WorkflowError::NoNextStep(node_id.to_string()));
        }

        let mut selected = None;
        for edge in &edges {
            if let EdgeDecision::Allow(next_input) = edge.validate(&output)? {
                selected = Some((edge.to_id().to_string(), next_input));
                break;
            }
        }
        let Some((target_id, next_input)) = selected else {
            return match handoff {
                Some(forward) => {
                    debug!(target: LOG_TARGET, "handoff from={node_id}");
                    forward(output)
                }
                None => Err(WorkflowError::TransitionBlocked(node_id.to_string())),
            };
        };
        let target = self.runtime
                         .borrow()
                         .nodes
                         .get(&target_id)
                         .cloned()
                         .ok_or_else(|| WorkflowError::UnregisteredEndpoint { endpoint: "to",
                                                                              id: target_id.clone() })?;
        let next_input = target.validate(SchemaRole::Input, next_input)?;

        debug!(target: LOG_TARGET, "next from={node_id} to={target_id}");
        if let Some((input, out_cleanups)) = self.exit_sequence() {
            self.runtime.borrow_mut().history.push(HistoryEntry { node, input, out_cleanups });
        }
        self.transition_into(target, next_input, None)
    }
}
