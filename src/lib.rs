//! Backpressure-correct bridges between two async stream disciplines: the
//! push model, where a source emits as soon as it likes and demand signaling
//! is advisory, and the pull model in the Reactive Streams mold, where
//! nothing flows without explicit numeric demand.
//!
//! Crossing from push to pull, the bridge enforces the strict protocol on
//! behalf of the wrapped source: demand is tracked per subscriber, protocol
//! breaches become terminal [`ProtocolError`]s and cut the link. Crossing
//! from pull to push, subscriber demand is translated into producer requests
//! through a serializing demand gate, and the pull side's strictness is kept:
//! a consumer that never requests sees nothing.
//!
//! ```
//! use rx_bridge::prelude::*;
//!
//! // a demand-aware push source, viewed as a pull-model publisher
//! let publisher = from_iter::<_, StreamError<()>>(vec![1, 2, 3]).into_publisher();
//!
//! // ... and back again as a push source
//! let seen = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
//! let sink = seen.clone();
//! let handle = publisher
//!   .into_observable()
//!   .subscribe(FnObserver::new(move |v: i32| sink.lock().unwrap().push(v)));
//!
//! handle.request(2);
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
//! handle.request(1);
//! assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
//! ```
//!
//! One caveat carries over from the push model: a hot source that emits past
//! outstanding demand cannot be throttled retroactively. The bridge detects
//! the overrun, detaches the source and fails the subscriber with
//! [`ProtocolError::MissingDemand`] rather than buffering unboundedly. Put a
//! [`SubjectProcessor`] in between when buffering is the behavior you want.
//!
//! [`ProtocolError`]: error::ProtocolError
//! [`ProtocolError::MissingDemand`]: error::ProtocolError::MissingDemand
//! [`SubjectProcessor`]: adapter::SubjectProcessor

pub mod adapter;
pub mod completable;
pub mod error;
pub mod observable;
pub mod observer;
pub mod prelude;
pub mod producer;
pub mod single;
pub mod streams;
pub mod subject;
pub mod testing;

pub use prelude::*;
