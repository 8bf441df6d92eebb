//! Terminal-only push model: a source signalling completion or an error,
//! never a value.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex,
};

use smallvec::SmallVec;

use crate::observable::SubscriptionLike;

/// Consumer of a valueless source.
pub trait CompletableObserver<Err> {
  fn on_complete(&mut self);

  fn on_error(&mut self, err: Err);
}

/// A source that finishes or fails without emitting values.
pub trait Completable<Err> {
  fn actual_subscribe(&self, subscriber: CompletableSubscriber<Err>);
}

pub trait CompletableExt<Err>: Completable<Err> {
  fn subscribe<O>(&self, observer: O) -> CompletableSubscriber<Err>
  where
    O: CompletableObserver<Err> + Send + 'static,
  {
    let subscriber = CompletableSubscriber::new(observer);
    self.actual_subscribe(subscriber.clone());
    subscriber
  }
}

impl<T, Err> CompletableExt<Err> for T where T: Completable<Err> {}

/// One consumer's attachment to a valueless source. Terminal signals fire
/// at most once.
pub struct CompletableSubscriber<Err> {
  core: Arc<Core<Err>>,
}

impl<Err> Clone for CompletableSubscriber<Err> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

struct Core<Err> {
  closed: AtomicBool,
  observer: Mutex<Option<Box<dyn CompletableObserver<Err> + Send>>>,
  teardowns: Mutex<SmallVec<[Box<dyn SubscriptionLike + Send>; 1]>>,
}

impl<Err> CompletableSubscriber<Err> {
  pub fn new<O>(observer: O) -> Self
  where
    O: CompletableObserver<Err> + Send + 'static,
  {
    Self {
      core: Arc::new(Core {
        closed: AtomicBool::new(false),
        observer: Mutex::new(Some(Box::new(observer))),
        teardowns: Mutex::new(SmallVec::new()),
      }),
    }
  }

  pub fn on_complete(&self) {
    if self.core.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    let observer = self.core.observer.lock().unwrap().take();
    if let Some(mut o) = observer {
      o.on_complete();
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

impl<Err> SubscriptionLike for CompletableSubscriber<Err> {
  #[inline]
  fn unsubscribe(&mut self) { CompletableSubscriber::unsubscribe(self) }

  #[inline]
  fn is_closed(&self) -> bool { CompletableSubscriber::is_closed(self) }
}

/// Source completing immediately.
pub fn complete() -> Complete { Complete }

pub struct Complete;

impl<Err> Completable<Err> for Complete {
  fn actual_subscribe(&self, subscriber: CompletableSubscriber<Err>) {
    subscriber.on_complete()
  }
}

/// Source failing with a clone of `err`.
pub fn error<Err: Clone>(err: Err) -> Fail<Err> { Fail { err } }

pub struct Fail<Err> {
  err: Err,
}

impl<Err: Clone> Completable<Err> for Fail<Err> {
  fn actual_subscribe(&self, subscriber: CompletableSubscriber<Err>) {
    subscriber.on_error(self.err.clone())
  }
}

/// Source driven by a closure receiving the subscriber handle.
pub fn create<Err, F>(on_subscribe: F) -> CreateCompletable<F>
where
  F: Fn(CompletableSubscriber<Err>),
{
  CreateCompletable { on_subscribe }
}

pub struct CreateCompletable<F> {
  on_subscribe: F,
}

impl<Err, F> Completable<Err> for CreateCompletable<F>
where
  F: Fn(CompletableSubscriber<Err>),
{
  fn actual_subscribe(&self, subscriber: CompletableSubscriber<Err>) {
    (self.on_subscribe)(subscriber)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::testing::TestCompletableObserver;

  #[test]
  fn terminal_fires_once() {
    let observer = TestCompletableObserver::<&str>::new();
    let subscriber = CompletableSubscriber::new(observer.clone());
    subscriber.on_complete();
    subscriber.on_error("late");
    assert!(observer.is_complete());
    assert_eq!(observer.error(), None);
  }

  #[test]
  fn complete_and_error_sources() {
    let observer = TestCompletableObserver::<&str>::new();
    complete().subscribe(observer.clone());
    assert!(observer.is_complete());

    let observer = TestCompletableObserver::<&str>::new();
    error("no").subscribe(observer.clone());
    assert_eq!(observer.error(), Some("no"));
  }
}
