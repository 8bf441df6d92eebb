//! Hand-rolled sources: `create`, `empty` and `throw`.

use crate::observable::{Observable, PushSubscriber};

/// Source driven by a closure that receives the subscriber handle.
///
/// The closure may emit eagerly (hot source) or install a producer to become
/// demand-aware. It runs once per subscription.
pub fn create<Item, Err, F>(on_subscribe: F) -> Create<F>
where
  F: Fn(PushSubscriber<Item, Err>),
{
  Create { on_subscribe }
}

pub struct Create<F> {
  on_subscribe: F,
}

impl<Item, Err, F> Observable<Item, Err> for Create<F>
where
  F: Fn(PushSubscriber<Item, Err>),
{
  fn actual_subscribe(&self, subscriber: PushSubscriber<Item, Err>) {
    (self.on_subscribe)(subscriber)
  }
}

/// Source that completes immediately without emitting.
pub fn empty() -> Empty { Empty }

pub struct Empty;

impl<Item, Err> Observable<Item, Err> for Empty {
  fn actual_subscribe(&self, subscriber: PushSubscriber<Item, Err>) { subscriber.complete() }
}

/// Source that fails immediately with a clone of `err`.
pub fn throw<Err: Clone>(err: Err) -> ThrowErr<Err> { ThrowErr { err } }

pub struct ThrowErr<Err> {
  err: Err,
}

impl<Item, Err: Clone> Observable<Item, Err> for ThrowErr<Err> {
  fn actual_subscribe(&self, subscriber: PushSubscriber<Item, Err>) {
    subscriber.error(self.err.clone())
  }
}
