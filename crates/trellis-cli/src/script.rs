//! Navigation scripts
//!
//! A script is a list of steps given on the command line:
//! - `/main/hosts` navigates to a URL path
//! - `@hostDetails.metrics=c6401` transitions to a named state, with an
//!   optional JSON context
//! - `!gotoEditUser={"userName":"admin"}` dispatches an event, with an
//!   optional JSON payload
//! - `!showChart=horizon_chart#mainChartsController:horizon_chart` also
//!   names the view the event came from, as `#owner:id`
//!
//! Values that are not valid JSON are taken as plain strings, so
//! `@hostDetails=c6401` and `@hostDetails="c6401"` are the same step.

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use trellis_core::{EventContext, ViewRef};

/// One step of a navigation script
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Navigate {
        path: String,
    },
    Transition {
        state: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<Value>,
    },
    Dispatch {
        event: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        view: Option<ViewRef>,
    },
}

impl Step {
    /// Event context for a dispatch step
    pub fn event_context(&self) -> Option<EventContext> {
        let Step::Dispatch { payload, view, .. } = self else {
            return None;
        };
        let mut context = EventContext::new();
        if let Some(payload) = payload {
            context = context.with_payload(payload.clone());
        }
        if let Some(view) = view {
            context = context.with_view(view.owner.clone(), view.id.clone());
        }
        Some(context)
    }
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with('/') {
            return Ok(Step::Navigate {
                path: s.to_string(),
            });
        }

        if let Some(rest) = s.strip_prefix('@') {
            let (state, context) = split_value(rest);
            if state.is_empty() {
                bail!("step '{}' names no state", s);
            }
            return Ok(Step::Transition {
                state: state.to_string(),
                context,
            });
        }

        if let Some(rest) = s.strip_prefix('!') {
            let (rest, view) = split_view(rest);
            let (event, payload) = split_value(rest);
            if event.is_empty() {
                bail!("step '{}' names no event", s);
            }
            return Ok(Step::Dispatch {
                event: event.to_string(),
                payload,
                view,
            });
        }

        bail!(
            "unrecognized step '{}' (expected /path, @state[=json] or !event[=json])",
            s
        )
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Navigate { path } => write!(f, "{}", path),
            Step::Transition { state, context } => {
                write!(f, "@{}", state)?;
                if let Some(context) = context {
                    write!(f, "={}", context)?;
                }
                Ok(())
            }
            Step::Dispatch {
                event,
                payload,
                view,
            } => {
                write!(f, "!{}", event)?;
                if let Some(payload) = payload {
                    write!(f, "={}", payload)?;
                }
                if let Some(view) = view {
                    write!(f, "#{}:{}", view.owner, view.id)?;
                }
                Ok(())
            }
        }
    }
}

/// Parse every step, failing on the first bad one
pub fn parse_steps<S: AsRef<str>>(steps: &[S]) -> Result<Vec<Step>> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            step.as_ref()
                .parse()
                .map_err(|e: anyhow::Error| e.context(format!("step {}", i + 1)))
        })
        .collect()
}

/// Split a trailing `#owner:id` view reference off a dispatch step
///
/// A `#` that is not followed by two plain names stays part of the value.
fn split_view(s: &str) -> (&str, Option<ViewRef>) {
    let plain = |name: &str| {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    };
    let Some((head, view)) = s.rsplit_once('#') else {
        return (s, None);
    };
    match view.split_once(':') {
        Some((owner, id)) if plain(owner) && plain(id) => (
            head,
            Some(ViewRef {
                owner: owner.to_string(),
                id: id.to_string(),
            }),
        ),
        _ => (s, None),
    }
}

fn split_value(s: &str) -> (&str, Option<Value>) {
    match s.split_once('=') {
        Some((name, raw)) => (name.trim(), Some(parse_value(raw))),
        None => (s.trim(), None),
    }
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
