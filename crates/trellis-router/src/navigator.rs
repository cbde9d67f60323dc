//! Async navigation driver
//!
//! [`Navigator::spawn`] moves a [`Router`] onto a single tokio task. Every
//! request (navigate, transition, dispatch, snapshot) travels over a bounded
//! command channel and is processed strictly one at a time, so at most one
//! transition is ever in flight.
//!
//! After a command, pending follow-ups get their scheduler turn: the task
//! yields once, picks up any commands that arrived in the meantime (these
//! supersede the follow-ups through the generation counter), then runs
//! whatever is still current.

use crate::error::{Result, RouterError};
use crate::events::DispatchOutcome;
use crate::router::{Router, TransitionReport};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use trellis_core::{EventContext, StackSnapshot, TransitionRequest};

/// Capacity of the report broadcast channel
const REPORT_CAPACITY: usize = 256;

enum Command {
    Transition {
        request: TransitionRequest,
        reply: oneshot::Sender<Result<TransitionReport>>,
    },
    Dispatch {
        event: String,
        context: EventContext,
        reply: oneshot::Sender<Result<DispatchOutcome>>,
    },
    Snapshot {
        reply: oneshot::Sender<StackSnapshot>,
    },
    Settle {
        reply: oneshot::Sender<Result<Vec<TransitionReport>>>,
    },
}

/// Handle to a router running on its own task
#[derive(Clone)]
pub struct Navigator {
    commands: mpsc::Sender<Command>,
    reports: broadcast::Sender<TransitionReport>,
}

impl Navigator {
    /// Start the driver task
    ///
    /// The task ends, handing the router back, once every `Navigator`
    /// clone has been dropped.
    pub fn spawn(router: Router) -> (Self, JoinHandle<Router>) {
        let (commands, rx) = mpsc::channel(router.config().queue_capacity.max(1));
        let (reports, _) = broadcast::channel(REPORT_CAPACITY);

        let handle = tokio::spawn(run(router, rx, reports.clone()));
        (Self { commands, reports }, handle)
    }

    /// Receive every committed transition, follow-ups included
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionReport> {
        self.reports.subscribe()
    }

    pub async fn navigate(&self, path: &str) -> Result<TransitionReport> {
        self.transition(TransitionRequest::to_path(path)).await
    }

    pub async fn transition_to(&self, name: &str, context: Option<Value>) -> Result<TransitionReport> {
        self.transition(TransitionRequest::to_state(name).with_context(context))
            .await
    }

    pub async fn transition(&self, request: TransitionRequest) -> Result<TransitionReport> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Transition { request, reply }).await?;
        rx.await.map_err(|_| RouterError::NavigatorClosed)?
    }

    pub async fn dispatch(&self, event: &str, context: EventContext) -> Result<bool> {
        Ok(self.dispatch_event(event, context).await?.handled)
    }

    pub async fn dispatch_event(&self, event: &str, context: EventContext) -> Result<DispatchOutcome> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Dispatch {
            event: event.to_string(),
            context,
            reply,
        })
        .await?;
        rx.await.map_err(|_| RouterError::NavigatorClosed)?
    }

    pub async fn snapshot(&self) -> Result<StackSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| RouterError::NavigatorClosed)
    }

    /// Wait until earlier commands and their follow-ups are done
    pub async fn settle(&self) -> Result<Vec<TransitionReport>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Settle { reply }).await?;
        rx.await.map_err(|_| RouterError::NavigatorClosed)?
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RouterError::NavigatorClosed)
    }
}

async fn run(
    mut router: Router,
    mut rx: mpsc::Receiver<Command>,
    reports: broadcast::Sender<TransitionReport>,
) -> Router {
    info!(router = %router.config().name, "navigator started");

    while let Some(command) = rx.recv().await {
        handle(&mut router, command, &reports);

        let mut turns = 0;
        while router.has_pending() && turns < router.config().max_settle_turns {
            tokio::task::yield_now().await;
            while let Ok(command) = rx.try_recv() {
                handle(&mut router, command, &reports);
            }
            publish(&reports, router.run_pending());
            turns += 1;
        }
        if router.has_pending() {
            let dropped = router.clear_pending();
            warn!(turns, dropped, "follow-ups did not settle; dropping them");
        }
    }

    info!(router = %router.config().name, "navigator stopped");
    router
}

fn handle(router: &mut Router, command: Command, reports: &broadcast::Sender<TransitionReport>) {
    match command {
        Command::Transition { request, reply } => {
            let result = router.transition(request);
            if let Ok(report) = &result {
                publish(reports, vec![report.clone()]);
            }
            let _ = reply.send(result);
        }
        Command::Dispatch {
            event,
            context,
            reply,
        } => {
            let result = router.dispatch_event(&event, context);
            if let Ok(outcome) = &result {
                publish(reports, outcome.reports.clone());
            }
            let _ = reply.send(result);
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(router.snapshot());
        }
        Command::Settle { reply } => {
            let result = router.settle();
            if let Ok(done) = &result {
                publish(reports, done.clone());
            }
            let _ = reply.send(result);
        }
    }
}

fn publish(reports: &broadcast::Sender<TransitionReport>, done: Vec<TransitionReport>) {
    for report in done {
        debug!(generation = report.generation, stack = %report.stack, "publishing report");
        // No subscribers is fine.
        let _ = reports.send(report);
    }
}
