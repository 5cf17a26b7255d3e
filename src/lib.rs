//! # Cold, push-based reactive streams
//!
//! This crate provides publishers of zero, one or many values that do
//! nothing until subscribed, a small set of composable operators, and a
//! subscription protocol with cancellation and demand.
//!
//! ## Core Concepts
//!
//! - **Publisher**: A cold description of a sequence; each subscription runs it anew
//! - **Single**: Marker for publishers emitting at most one value
//! - **Subscriber**: Receives `on_next*` followed by at most one `on_error` or `on_complete`
//! - **Subscription**: Cancels the run and carries demand from subscriber to publisher
//! - **Scheduler**: Runs delayed work for time-based stages
//!
//! ## Example
//!
//! ```rust
//! use fluxweld::prelude::*;
//!
//! let words = just("Mono m1")
//!     .flat_map_many(|data| just_many(data.split(' ').collect::<Vec<_>>()))
//!     .map(|word| word.to_uppercase());
//!
//! let sink = CollectSubscriber::new();
//! words.subscribe_with(sink.clone());
//! assert_eq!(sink.values(), vec!["MONO".to_string(), "M1".to_string()]);
//! assert!(sink.is_completed());
//! ```

pub mod error;
pub mod operators;
pub mod scheduler;
pub mod signal;
pub mod sinks;
pub mod sources;
pub mod stream;
pub mod subscription;
pub mod traits;

// Re-export commonly used items
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::operators::{zip2, zip3, zip_all};
    pub use crate::scheduler::{Scheduler, TokioScheduler, VirtualScheduler};
    pub use crate::signal::Signal;
    pub use crate::sinks::{CollectSubscriber, LambdaSubscriber};
    pub use crate::sources::{empty, error, from_fn, from_iter, just, just_many, range};
    pub use crate::stream::SignalStream;
    pub use crate::subscription::{SubscribeConfig, Subscription, UNBOUNDED};
    pub use crate::traits::{Publisher, PublisherExt, Single, SingleExt, Subscriber};
}

// Re-export main error type
pub use error::{Error, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
