//! Trellis Router
//!
//! The runtime half of trellis:
//! - Runs transitions against the active state stack ([`Router`])
//! - Bubbles named events from the leaf state to the root ([`EventBubbler`])
//! - Schedules deferred follow-up transitions by generation ([`Scheduler`])
//! - Drives a router from async code on a single task ([`Navigator`])
//!
//! # Example
//!
//! ```no_run
//! use trellis_core::{ControllerRegistry, RouteNode, RouteTree};
//! use trellis_router::Router;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let tree = RouteTree::build(
//!     RouteNode::root("root")
//!         .child(RouteNode::new("hosts", "/hosts").connect_outlet("mainController", "mainHost")),
//! )?;
//! let mut controllers = ControllerRegistry::new();
//! controllers.ensure_basic("mainController");
//!
//! let mut router = Router::new(tree, controllers);
//! router.navigate("/hosts")?;
//! router.settle()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod navigator;
pub mod router;
pub mod scheduler;

pub use error::{Result, RouterError};
pub use events::{DispatchOutcome, EventBubbler};
pub use navigator::Navigator;
pub use router::{Phase, Router, RouterConfig, TransitionReport};
pub use scheduler::{ScheduledTransition, Scheduler};
