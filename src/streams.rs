//! Pull-model surface, Reactive Streams style.
//!
//! A strict protocol: nothing is emitted until the subscriber issues explicit
//! numeric demand, cancellation is idempotent, and exactly one terminal
//! signal is ever delivered, never overlapping with `on_next`.
//!
//! [`SubscriberRef`] is the delivery vehicle the bridge hands signals to. It
//! carries identity (a subscriber handle may be attached to a given publisher
//! at most once) and serializes emissions through a non-reentrant drain, so
//! that racing or reentrant producer callbacks never overlap inside the
//! subscriber.

use std::{
  collections::VecDeque,
  sync::{Arc, Mutex},
};

use crate::observer::Observer;

/// Demand sentinel: effectively unlimited, never decremented.
pub const UNBOUNDED: u64 = u64::MAX;

/// The demand/cancellation channel handed to a subscriber on attachment.
pub trait Subscription: Send + Sync {
  /// Authorize up to `n` more items. `n == 0` is a protocol violation and
  /// yields a terminal `NonPositiveRequest` error (negative amounts are
  /// unrepresentable).
  fn request(&self, n: u64);

  /// Stop all future signals. Idempotent, best-effort: one emission already
  /// past its demand check may still arrive.
  fn cancel(&self);
}

/// Consumer of a pull-model stream.
pub trait Subscriber<Item, Err> {
  /// Always the first signal; no other signal may precede it.
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>);

  fn on_next(&mut self, item: Item);

  fn on_error(&mut self, err: Err);

  fn on_complete(&mut self);
}

/// A source obeying the pull-model protocol.
pub trait Publisher<Item, Err> {
  fn subscribe(&self, subscriber: SubscriberRef<Item, Err>);
}

enum Signal<Item, Err> {
  Next(Item),
  Error(Err),
  Complete,
}

struct DrainState<Item, Err> {
  /// Some caller is currently delivering; later signals queue behind it.
  emitting: bool,
  /// Terminal delivered (or being delivered); everything after is dropped.
  done: bool,
  queue: VecDeque<Signal<Item, Err>>,
}

struct RefCore<Item, Err> {
  drain: Mutex<DrainState<Item, Err>>,
  /// Only ever locked by the drain owner, so delivery is single-writer and
  /// the lock is never re-entered.
  target: Mutex<Box<dyn Subscriber<Item, Err> + Send>>,
}

/// Shared handle around a pull-model subscriber.
///
/// Cloning the handle preserves identity: a publisher uses [`ptr_eq`] to
/// enforce the at-most-one-subscription rule. All emissions are funneled
/// through a serializing drain loop: the first caller becomes the emitting
/// worker, concurrent and reentrant callers enqueue and return. This is the
/// emission mirror of the demand tracker's request drain.
///
/// [`ptr_eq`]: SubscriberRef::ptr_eq
pub struct SubscriberRef<Item, Err> {
  core: Arc<RefCore<Item, Err>>,
}

impl<Item, Err> Clone for SubscriberRef<Item, Err> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<Item, Err> SubscriberRef<Item, Err> {
  pub fn new<S>(subscriber: S) -> Self
  where
    S: Subscriber<Item, Err> + Send + 'static,
  {
    Self {
      core: Arc::new(RefCore {
        drain: Mutex::new(DrainState { emitting: false, done: false, queue: VecDeque::new() }),
        target: Mutex::new(Box::new(subscriber)),
      }),
    }
  }

  /// Identity comparison: two handles naming the same subscriber.
  pub fn ptr_eq(&self, other: &Self) -> bool { Arc::ptr_eq(&self.core, &other.core) }

  /// Deliver `on_subscribe` directly. By protocol this precedes any emission,
  /// so it bypasses the drain.
  pub fn on_subscribe(&self, subscription: Arc<dyn Subscription>) {
    self.core.target.lock().unwrap().on_subscribe(subscription);
  }

  pub fn on_next(&self, item: Item) { self.emit(Signal::Next(item)) }

  pub fn on_error(&self, err: Err) { self.emit(Signal::Error(err)) }

  pub fn on_complete(&self) { self.emit(Signal::Complete) }

  fn emit(&self, signal: Signal<Item, Err>) {
    let mut signal = {
      let mut drain = self.core.drain.lock().unwrap();
      if drain.done {
        return;
      }
      if drain.emitting {
        drain.queue.push_back(signal);
        return;
      }
      drain.emitting = true;
      signal
    };
    loop {
      let terminal = !matches!(signal, Signal::Next(_));
      if terminal {
        // latch before delivering so nothing can follow the terminal
        let mut drain = self.core.drain.lock().unwrap();
        drain.done = true;
        drain.queue.clear();
      }
      {
        let mut target = self.core.target.lock().unwrap();
        match signal {
          Signal::Next(item) => target.on_next(item),
          Signal::Error(err) => target.on_error(err),
          Signal::Complete => target.on_complete(),
        }
      }
      if terminal {
        return;
      }
      let mut drain = self.core.drain.lock().unwrap();
      if drain.done {
        return;
      }
      match drain.queue.pop_front() {
        Some(next) => signal = next,
        None => {
          drain.emitting = false;
          return;
        }
      }
    }
  }
}

/// A pull-model subscriber can stand in wherever a push observer is needed:
/// signals map one to one. Used by the round-trip paths in tests.
impl<Item, Err> Observer<Item, Err> for SubscriberRef<Item, Err> {
  fn next(&mut self, value: Item) { self.on_next(value) }

  fn error(&mut self, err: Err) { self.on_error(err) }

  fn complete(&mut self) { self.on_complete() }
}
