//! Push-model surface: `Observable`, the request-aware `Producer` hook and
//! the concrete `PushSubscriber` consumer handle.
//!
//! A push source starts emitting once subscribed. Demand signaling is
//! advisory: a source that installs a [`Producer`] becomes demand-aware,
//! a source that never does emits eagerly ("hot").

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex,
};

use smallvec::SmallVec;

use crate::{observer::Observer, streams::UNBOUNDED};

mod create;
mod from_iter;
pub use create::*;
pub use from_iter::*;

/// Request-aware producer hook installed by demand-aware sources.
pub trait Producer: Send + Sync {
  /// Ask the source to emit up to `n` more items. Within the push model
  /// `n == 0` is a legal no-op probe, not a violation.
  fn request(&self, n: u64);
}

/// Handle to deregister a stream before it has delivered a terminal signal.
pub trait SubscriptionLike {
  fn unsubscribe(&mut self);

  fn is_closed(&self) -> bool;
}

/// A source of push-model events.
pub trait Observable<Item, Err> {
  /// Attach `subscriber` and start the source.
  fn actual_subscribe(&self, subscriber: PushSubscriber<Item, Err>);
}

/// Consumer-side convenience over [`Observable`].
pub trait ObservableExt<Item, Err>: Observable<Item, Err> {
  /// Subscribe `observer` and return the subscriber handle, which can be
  /// used to request demand from demand-aware sources and to unsubscribe.
  fn subscribe<O>(&self, observer: O) -> PushSubscriber<Item, Err>
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let subscriber = PushSubscriber::new(observer);
    self.actual_subscribe(subscriber.clone());
    subscriber
  }
}

impl<T, Item, Err> ObservableExt<Item, Err> for T where T: Observable<Item, Err> {}

/// One consumer's attachment to a push source.
///
/// Cloneable handle over shared state: the boxed observer, the closed flag
/// (terminal delivered or unsubscribed, set exactly once), demand bookkeeping
/// and a teardown list. Demand requested before a producer is installed is
/// accumulated and flushed on installation; a consumer that never requested
/// gets `UNBOUNDED` flushed instead, while an accumulated zero acts as a
/// pure start probe and flushes nothing.
pub struct PushSubscriber<Item, Err> {
  core: Arc<Core<Item, Err>>,
}

impl<Item, Err> Clone for PushSubscriber<Item, Err> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

struct Core<Item, Err> {
  closed: AtomicBool,
  observer: Mutex<Option<Box<dyn Observer<Item, Err> + Send>>>,
  demand: Mutex<Demand>,
  teardowns: Mutex<SmallVec<[Box<dyn SubscriptionLike + Send>; 1]>>,
}

struct Demand {
  producer: Option<Arc<dyn Producer>>,
  /// Demand accumulated before a producer arrives; `None` means the consumer
  /// never requested at all.
  requested: Option<u64>,
}

impl<Item, Err> PushSubscriber<Item, Err> {
  pub fn new<O>(observer: O) -> Self
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    Self {
      core: Arc::new(Core {
        closed: AtomicBool::new(false),
        observer: Mutex::new(Some(Box::new(observer))),
        demand: Mutex::new(Demand { producer: None, requested: None }),
        teardowns: Mutex::new(SmallVec::new()),
      }),
    }
  }

  /// Deliver an item. Silently dropped once closed.
  ///
  /// The observer is taken out of its slot for the duration of the call, so
  /// the lock is never held while user code runs; a reentrant `unsubscribe`
  /// or terminal from inside `next` latches `closed` and the observer is
  /// simply not put back.
  pub fn next(&self, value: Item) {
    if self.is_closed() {
      return;
    }
    let observer = self.core.observer.lock().unwrap().take();
    if let Some(mut o) = observer {
      o.next(value);
      if !self.is_closed() {
        *self.core.observer.lock().unwrap() = Some(o);
      }
    }
  }

  /// Deliver the error terminal. At most one terminal signal ever fires.
  pub fn error(&self, err: Err) {
    if self.core.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    let observer = self.core.observer.lock().unwrap().take();
    if let Some(mut o) = observer {
      o.error(err);
    }
    self.finish();
  }

  /// Deliver the completion terminal. At most one terminal signal ever fires.
  pub fn complete(&self) {
    if self.core.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    let observer = self.core.observer.lock().unwrap().take();
    if let Some(mut o) = observer {
      o.complete();
    }
    self.finish();
  }

  /// Detach without a terminal signal. Idempotent.
  pub fn unsubscribe(&self) {
    if self.core.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    drop(self.core.observer.lock().unwrap().take());
    self.finish();
  }

  pub fn is_closed(&self) -> bool { self.core.closed.load(Ordering::Acquire) }

  /// Signal demand. Forwarded to the producer when one is installed,
  /// accumulated (saturating) otherwise.
  pub fn request(&self, n: u64) {
    if self.is_closed() {
      return;
    }
    let producer = {
      let mut demand = self.core.demand.lock().unwrap();
      match demand.producer.clone() {
        Some(p) => Some(p),
        None => {
          let cur = demand.requested.unwrap_or(0);
          demand.requested = Some(cur.saturating_add(n));
          None
        }
      }
    };
    if let Some(p) = producer {
      p.request(n);
    }
  }

  /// Install the source's producer hook and flush accumulated demand.
  pub fn set_producer(&self, producer: Arc<dyn Producer>) {
    if self.is_closed() {
      return;
    }
    let flush = {
      let mut demand = self.core.demand.lock().unwrap();
      demand.producer = Some(producer.clone());
      demand.requested.take()
    };
    match flush {
      // never requested: emit without bound, rx style
      None => producer.request(UNBOUNDED),
      // zero-demand probe: start side effects happened, emit nothing
      Some(0) => {}
      Some(n) => producer.request(n),
    }
  }

  /// Attach a resource released when this subscriber terminates or
  /// unsubscribes. Attached after the fact, it is released immediately.
  pub fn add<S>(&self, subscription: S)
  where
    S: SubscriptionLike + Send + 'static,
  {
    let mut subscription = subscription;
    let mut teardowns = self.core.teardowns.lock().unwrap();
    if self.is_closed() {
      drop(teardowns);
      subscription.unsubscribe();
    } else {
      teardowns.push(Box::new(subscription));
    }
  }

  fn finish(&self) {
    self.core.demand.lock().unwrap().producer = None;
    let mut teardowns = std::mem::take(&mut *self.core.teardowns.lock().unwrap());
    for teardown in teardowns.iter_mut() {
      teardown.unsubscribe();
    }
  }
}

impl<Item, Err> Observer<Item, Err> for PushSubscriber<Item, Err> {
  #[inline]
  fn next(&mut self, value: Item) { PushSubscriber::next(self, value) }

  #[inline]
  fn error(&mut self, err: Err) { PushSubscriber::error(self, err) }

  #[inline]
  fn complete(&mut self) { PushSubscriber::complete(self) }
}

impl<Item, Err> SubscriptionLike for PushSubscriber<Item, Err> {
  #[inline]
  fn unsubscribe(&mut self) { PushSubscriber::unsubscribe(self) }

  #[inline]
  fn is_closed(&self) -> bool { PushSubscriber::is_closed(self) }
}
