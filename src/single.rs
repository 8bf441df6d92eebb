//! Zero-or-one push model: a source resolving to exactly one value or an
//! error.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex,
};

use smallvec::SmallVec;

use crate::observable::SubscriptionLike;

/// Consumer of a single-value source.
pub trait SingleObserver<Item, Err> {
  fn on_success(&mut self, value: Item);

  fn on_error(&mut self, err: Err);
}

/// A source resolving to one value or an error.
pub trait Single<Item, Err> {
  fn actual_subscribe(&self, subscriber: SingleSubscriber<Item, Err>);
}

pub trait SingleExt<Item, Err>: Single<Item, Err> {
  fn subscribe<O>(&self, observer: O) -> SingleSubscriber<Item, Err>
  where
    O: SingleObserver<Item, Err> + Send + 'static,
  {
    let subscriber = SingleSubscriber::new(observer);
    self.actual_subscribe(subscriber.clone());
    subscriber
  }
}

impl<T, Item, Err> SingleExt<Item, Err> for T where T: Single<Item, Err> {}

/// One consumer's attachment to a single-value source. The terminal signal
/// (`on_success` or `on_error`) fires at most once; unsubscribing discards
/// the observer and releases attached resources.
pub struct SingleSubscriber<Item, Err> {
  core: Arc<Core<Item, Err>>,
}

impl<Item, Err> Clone for SingleSubscriber<Item, Err> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

struct Core<Item, Err> {
  closed: AtomicBool,
  observer: Mutex<Option<Box<dyn SingleObserver<Item, Err> + Send>>>,
  teardowns: Mutex<SmallVec<[Box<dyn SubscriptionLike + Send>; 1]>>,
}

impl<Item, Err> SingleSubscriber<Item, Err> {
  pub fn new<O>(observer: O) -> Self
  where
    O: SingleObserver<Item, Err> + Send + 'static,
  {
    Self {
      core: Arc::new(Core {
        closed: AtomicBool::new(false),
        observer: Mutex::new(Some(Box::new(observer))),
        teardowns: Mutex::new(SmallVec::new()),
      }),
    }
  }

  pub fn on_success(&self, value: Item) {
    if self.core.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    let observer = self.core.observer.lock().unwrap().take();
    if let Some(mut o) = observer {
      o.on_success(value);
    }
    self.finish();
  }

  pub fn on_error(&self, err: Err) {
    if self.core.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    let observer = self.core.observer.lock().unwrap().take();
    if let Some(mut o) = observer {
      o.on_error(err);
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

  /// Attach a resource released on termination or unsubscription.
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
    let mut teardowns = std::mem::take(&mut *self.core.teardowns.lock().unwrap());
    for teardown in teardowns.iter_mut() {
      teardown.unsubscribe();
    }
  }
}

impl<Item, Err> SubscriptionLike for SingleSubscriber<Item, Err> {
  #[inline]
  fn unsubscribe(&mut self) { SingleSubscriber::unsubscribe(self) }

  #[inline]
  fn is_closed(&self) -> bool { SingleSubscriber::is_closed(self) }
}

/// Source resolving to a clone of `value`.
pub fn just<Item: Clone>(value: Item) -> Just<Item> { Just { value } }

pub struct Just<Item> {
  value: Item,
}

impl<Item: Clone, Err> Single<Item, Err> for Just<Item> {
  fn actual_subscribe(&self, subscriber: SingleSubscriber<Item, Err>) {
    subscriber.on_success(self.value.clone())
  }
}

/// Source failing with a clone of `err`.
pub fn error<Err: Clone>(err: Err) -> Fail<Err> { Fail { err } }

pub struct Fail<Err> {
  err: Err,
}

impl<Item, Err: Clone> Single<Item, Err> for Fail<Err> {
  fn actual_subscribe(&self, subscriber: SingleSubscriber<Item, Err>) {
    subscriber.on_error(self.err.clone())
  }
}

/// Source driven by a closure receiving the subscriber handle.
pub fn create<Item, Err, F>(on_subscribe: F) -> CreateSingle<F>
where
  F: Fn(SingleSubscriber<Item, Err>),
{
  CreateSingle { on_subscribe }
}

pub struct CreateSingle<F> {
  on_subscribe: F,
}

impl<Item, Err, F> Single<Item, Err> for CreateSingle<F>
where
  F: Fn(SingleSubscriber<Item, Err>),
{
  fn actual_subscribe(&self, subscriber: SingleSubscriber<Item, Err>) {
    (self.on_subscribe)(subscriber)
  }
}
