//! Orchestrator: routes every incoming payload through all matching flows.
//!
//! Dispatch runs each flow whose processor claims the payload, in
//! registration order and without short-circuiting. Faults are recovered
//! locally and re-dispatched as error payloads; payloads nobody claims are
//! re-dispatched as unknown-command payloads. Both fallback cycles reuse the
//! original context and never nest a cycle of a kind already on their
//! lineage, so dispatch always terminates.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::actions::Action;
use crate::context::Context;
use crate::error::{Error, FlowError};
use crate::formatters::{Formatter, interpolate};
use crate::listeners::{Listener, ListenerCallback};
use crate::pipeline::flow::{ErrorFlow, Flow, FlowTable};
use crate::pipeline::types::{Incoming, Payload};

/// Command reported in unknown-command payloads when the original was not a
/// message.
pub const UNKNOWN_COMMAND: &str = "unknown";

/// What happened to one dispatched payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// At least one flow claimed the payload.
    pub handled: bool,
    /// Number of flows that claimed the payload.
    pub matched: usize,
    /// Number of matching flows that faulted.
    pub faulted: usize,
    /// Fallback cycles dispatched on behalf of this payload, nested ones
    /// included.
    pub fallbacks: usize,
}

/// Sentinel kinds active in the ancestry of a fallback cycle.
#[derive(Debug, Clone, Copy, Default)]
struct Lineage {
    error: bool,
    unknown: bool,
}

impl Lineage {
    fn with_error(self) -> Self {
        Self {
            error: true,
            ..self
        }
    }

    fn with_unknown(self) -> Self {
        Self {
            unknown: true,
            ..self
        }
    }
}

/// The dispatch engine, shared between the orchestrator and its listener.
pub struct Dispatcher {
    flows: Arc<FlowTable>,
    error_flow: ErrorFlow,
}

impl Dispatcher {
    /// Build the flow table and hand every processor a weak handle to it.
    pub fn new(flows: Vec<Flow>, error_flow: ErrorFlow) -> Self {
        let flows = Arc::new(FlowTable::new(flows));
        for flow in flows.flows() {
            flow.processor.attach(Arc::downgrade(&flows));
        }
        Self { flows, error_flow }
    }

    pub fn flows(&self) -> &Arc<FlowTable> {
        &self.flows
    }

    /// Dispatch a payload delivered by a listener.
    pub async fn handle(&self, incoming: Incoming) -> DispatchOutcome {
        let ctx = Context::new(incoming.clone());
        let span = info_span!(
            "dispatch",
            dispatch_id = %ctx.dispatch_id,
            kind = incoming.kind()
        );
        let outcome = self
            .dispatch(incoming, ctx, Lineage::default())
            .instrument(span.clone())
            .await;
        span.in_scope(|| {
            debug!(
                handled = outcome.handled,
                matched = outcome.matched,
                faulted = outcome.faulted,
                fallbacks = outcome.fallbacks,
                "Dispatch complete"
            )
        });
        outcome
    }

    fn dispatch<'a>(
        &'a self,
        incoming: Incoming,
        ctx: Context,
        lineage: Lineage,
    ) -> BoxFuture<'a, DispatchOutcome> {
        async move {
            let mut outcome = DispatchOutcome::default();

            for flow in self.flows.flows() {
                if !flow.processor.can_process(&incoming).await {
                    continue;
                }
                outcome.matched += 1;
                debug!(flow = flow.name(), kind = incoming.kind(), "Flow matched");

                let Err(err) = self.run_flow(flow, ctx.clone(), incoming.clone()).await else {
                    continue;
                };
                outcome.faulted += 1;

                if !incoming.is_error() && !lineage.error {
                    warn!(
                        flow = flow.name(),
                        error = %err,
                        "Flow failed, dispatching error payload"
                    );
                    let fault = Incoming::error(err.to_string(), err.trace());
                    let child = self
                        .dispatch(fault, ctx.clone(), lineage.with_error())
                        .await;
                    outcome.fallbacks += 1 + child.fallbacks;
                } else {
                    error!(
                        flow = flow.name(),
                        kind = incoming.kind(),
                        error = %err,
                        "Flow failed while handling a fallback payload"
                    );
                    self.report(&ctx, Incoming::error(err.to_string(), err.trace()))
                        .await;
                }
            }

            outcome.handled = outcome.matched > 0;
            if outcome.handled {
                return outcome;
            }

            if !incoming.is_unknown_command() && !lineage.unknown {
                let command = ctx.incoming.text().unwrap_or(UNKNOWN_COMMAND).to_string();
                info!(
                    command = %command,
                    kind = incoming.kind(),
                    "No flow matched, dispatching unknown command"
                );
                let child = self
                    .dispatch(
                        Incoming::unknown_command(command),
                        ctx.clone(),
                        lineage.with_unknown(),
                    )
                    .await;
                outcome.fallbacks += 1 + child.fallbacks;
            } else {
                warn!(kind = incoming.kind(), "Unresolvable payload");
                self.report(&ctx, incoming).await;
            }
            outcome
        }
        .boxed()
    }

    async fn run_flow(
        &self,
        flow: &Flow,
        ctx: Context,
        incoming: Incoming,
    ) -> Result<(), FlowError> {
        let processor = &flow.processor;
        let payload = guard(
            "Processor",
            processor.name(),
            processor.process(ctx.clone(), incoming),
        )
        .await?;
        run_stages(&flow.formatters, &flow.actions, ctx, payload).await
    }

    /// Push a sentinel nobody resolved through the error flow.
    async fn report(&self, ctx: &Context, sentinel: Incoming) {
        let template = if sentinel.is_error() {
            &self.error_flow.error_message
        } else {
            &self.error_flow.unknown_command_message
        };
        let payload = Payload::Incoming(sentinel);
        let message = interpolate(template, ctx, &payload).unwrap_or_else(|e| {
            debug!(error = %e, "Error flow message did not render, using payload text");
            payload.to_string()
        });

        let result = run_stages(
            &self.error_flow.formatters,
            &self.error_flow.actions,
            ctx.clone(),
            Payload::Text(message),
        )
        .await;
        if let Err(err) = result {
            error!(error = %err, trace = %err.trace(), "Error flow failed");
        }
    }
}

/// Formatters in order, then all actions concurrently.
async fn run_stages(
    formatters: &[Arc<dyn Formatter>],
    actions: &[Arc<dyn Action>],
    ctx: Context,
    mut payload: Payload,
) -> Result<(), FlowError> {
    for formatter in formatters {
        payload = guard(
            "Formatter",
            formatter.name(),
            formatter.format(ctx.clone(), payload),
        )
        .await?;
    }

    let results = join_all(actions.iter().map(|action| {
        guard(
            "Action",
            action.name(),
            action.execute(ctx.clone(), payload.clone()),
        )
    }))
    .await;

    let total = results.len();
    let mut failures = Vec::new();
    for (action, result) in actions.iter().zip(results) {
        if let Err(err) = result {
            warn!(action = action.name(), error = %err, "Action failed");
            failures.push(err);
        }
    }
    let failed = failures.len();
    match failures.into_iter().next() {
        Some(first) => Err(FlowError::Actions {
            failed,
            total,
            first: Box::new(first),
        }),
        None => Ok(()),
    }
}

/// Await a plugin call, turning a panic into a flow fault.
async fn guard<T>(
    stage: &'static str,
    name: &str,
    call: impl Future<Output = Result<T, FlowError>>,
) -> Result<T, FlowError> {
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(FlowError::Panicked {
            stage,
            name: name.to_string(),
            message: panic_message(panic.as_ref()),
        }),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ── Orchestrator ────────────────────────────────────────────────────

/// Binds a listener to a set of flows.
pub struct Orchestrator {
    listener: Box<dyn Listener>,
    dispatcher: Arc<Dispatcher>,
}

impl Orchestrator {
    /// Register `flows` in order with the default error flow.
    pub fn new(listener: Box<dyn Listener>, flows: Vec<Flow>) -> Self {
        Self {
            listener,
            dispatcher: Arc::new(Dispatcher::new(flows, ErrorFlow::default())),
        }
    }

    pub fn with_error_flow(mut self, error_flow: ErrorFlow) -> Self {
        let flows = self.dispatcher.flows.clone();
        self.dispatcher = Arc::new(Dispatcher { flows, error_flow });
        self
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// Dispatch one payload without going through the listener.
    pub async fn handle(&self, incoming: Incoming) -> DispatchOutcome {
        self.dispatcher.handle(incoming).await
    }

    /// Install the dispatcher on the listener and run until it stops.
    pub async fn run(self) -> Result<(), Error> {
        let Self {
            mut listener,
            dispatcher,
        } = self;

        let callback_dispatcher = dispatcher.clone();
        listener.set_callback(ListenerCallback::new(move |incoming| {
            let dispatcher = callback_dispatcher.clone();
            async move {
                dispatcher.handle(incoming).await;
            }
        }));

        info!(
            listener = listener.name(),
            flows = dispatcher.flows.len(),
            "Orchestrator listening"
        );
        listener.start().await?;
        info!(listener = listener.name(), "Listener stopped");
        Ok(())
    }
}
