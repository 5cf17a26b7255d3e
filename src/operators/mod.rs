//! Operator stages.
//!
//! Every stage wraps its upstream publisher and, on attach, subscribes to it
//! through a child of the downstream subscription, so cancelling downstream
//! reaches every stage above it.

mod concat;
mod delay;
mod flat_map;
mod log;
mod map;
mod zip;

pub use concat::{ConcatWith, Then};
pub use delay::{DelayElements, DEFAULT_DELAY_BUFFER};
pub use flat_map::FlatMap;
pub use log::{DoOnNext, Log};
pub use map::{Filter, Map, TryMap};
pub use zip::{zip2, zip3, zip_all, Zip2, Zip3, ZipAll};
