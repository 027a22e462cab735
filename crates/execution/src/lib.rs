//! Execution layer - clocks, cancellation, join barriers and the three
//! dispatch shapes: sequential countdowns, timed event fan-out and
//! independent task groups.

#![warn(missing_docs)]

pub mod clock;
pub mod cancel;
pub mod barrier;
pub mod observer;
pub mod worker;
pub mod config;
pub mod scheduler;
pub mod countdown;
pub mod fanout;
pub mod group;

mod deadline;

pub use clock::{wait, Clock, SystemClock, VirtualClock};
pub use cancel::CancelToken;
pub use barrier::{Arrival, JoinBarrier};
pub use observer::{ChannelObserver, NoopObserver, Observer, TracingObserver};
pub use worker::WorkerContext;
pub use config::EngineConfig;
pub use scheduler::GroupState;
pub use countdown::{Countdown, CountdownBuilder, CountdownHandle, CountdownState};
pub use fanout::{EventGroup, EventGroupBuilder};
pub use group::{FnTask, NamedTask, Task, TaskGroup};
