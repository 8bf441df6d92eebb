//! Bridging between terminal-only sources and pull-model publishers.

use std::marker::PhantomData;
use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use once_cell::sync::OnceCell;

use crate::adapter::CancelLink;
use crate::completable::{Completable, CompletableObserver, CompletableSubscriber};
use crate::streams::{Publisher, Subscriber, SubscriberRef, Subscription, UNBOUNDED};

/// Terminal-only facade over a pull-model publisher: items are requested,
/// drained and dropped, only the terminal signal survives.
pub struct PublisherAsCompletable<P, Item> {
  publisher: P,
  _item: PhantomData<fn() -> Item>,
}

impl<P, Item> PublisherAsCompletable<P, Item> {
  pub fn new(publisher: P) -> Self { Self { publisher, _item: PhantomData } }
}

impl<P, Item, Err> Completable<Err> for PublisherAsCompletable<P, Item>
where
  P: Publisher<Item, Err>,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn actual_subscribe(&self, subscriber: CompletableSubscriber<Err>) {
    self.publisher.subscribe(SubscriberRef::new(IgnoreItems {
      subscriber,
      _item: PhantomData::<fn() -> Item>,
    }));
  }
}

struct IgnoreItems<Item, Err> {
  subscriber: CompletableSubscriber<Err>,
  _item: PhantomData<fn() -> Item>,
}

impl<Item, Err> Subscriber<Item, Err> for IgnoreItems<Item, Err> {
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.subscriber.add(CancelLink::new(subscription.clone()));
    subscription.request(UNBOUNDED);
  }

  fn on_next(&mut self, _item: Item) {}

  fn on_error(&mut self, err: Err) { self.subscriber.on_error(err) }

  fn on_complete(&mut self) { self.subscriber.on_complete() }
}

/// Pull-model facade over a terminal-only source.
///
/// Nothing will ever be emitted, so demand is accepted and ignored: the
/// terminal signal needs no credit under the pull protocol.
pub struct CompletableAsPublisher<C, Err> {
  completable: C,
  _err: PhantomData<fn() -> Err>,
}

impl<C, Err> CompletableAsPublisher<C, Err> {
  pub fn new(completable: C) -> Self { Self { completable, _err: PhantomData } }
}

impl<C, Item, Err> Publisher<Item, Err> for CompletableAsPublisher<C, Err>
where
  C: Completable<Err>,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn subscribe(&self, subscriber: SubscriberRef<Item, Err>) {
    let link = Arc::new(NoValueSubscription {
      upstream: OnceCell::new(),
      cancelled: AtomicBool::new(false),
    });
    subscriber.on_subscribe(link.clone());

    let up = CompletableSubscriber::new(ForwardTerminal { downstream: subscriber });
    let _ = link.upstream.set(up.clone());
    if link.cancelled.load(Ordering::Acquire) {
      up.unsubscribe();
    }
    self.completable.actual_subscribe(up);
  }
}

struct NoValueSubscription<Err> {
  upstream: OnceCell<CompletableSubscriber<Err>>,
  cancelled: AtomicBool,
}

impl<Err: Send> Subscription for NoValueSubscription<Err> {
  fn request(&self, _n: u64) {}

  fn cancel(&self) {
    if !self.cancelled.swap(true, Ordering::AcqRel) {
      if let Some(up) = self.upstream.get() {
        up.unsubscribe();
      }
    }
  }
}

struct ForwardTerminal<Item, Err> {
  downstream: SubscriberRef<Item, Err>,
}

impl<Item, Err> CompletableObserver<Err> for ForwardTerminal<Item, Err> {
  fn on_complete(&mut self) { self.downstream.on_complete() }

  fn on_error(&mut self, err: Err) { self.downstream.on_error(err) }
}

#[cfg(test)]
mod test {
  use std::sync::Mutex;

  use super::*;
  use crate::adapter::{CompletableIntoPublisher, IntoPublisher, PublisherExt};
  use crate::completable::{self, CompletableExt};
  use crate::error::StreamError;
  use crate::observable;
  use crate::testing::{TestCompletableObserver, TestSubscriber};

  type E = StreamError<&'static str>;

  #[test]
  fn items_are_drained_and_dropped() {
    let publisher = observable::from_iter::<_, E>(vec![1, 2, 3]).into_publisher();
    let observer = TestCompletableObserver::new();
    publisher.into_completable().subscribe(observer.clone());
    assert!(observer.is_complete());
    assert_eq!(observer.error(), None);
  }

  #[test]
  fn source_error_survives() {
    let publisher = observable::throw(StreamError::Source("down")).into_publisher();
    let observer = TestCompletableObserver::new();
    PublisherAsCompletable::<_, i32>::new(publisher).subscribe(observer.clone());
    assert_eq!(observer.error(), Some(StreamError::Source("down")));
    assert!(!observer.is_complete());
  }

  #[test]
  fn terminal_needs_no_demand() {
    let publisher: CompletableAsPublisher<_, E> = completable::complete().into_publisher();
    let subscriber = TestSubscriber::<i32, E>::new();
    publisher.subscribe(subscriber.subscriber_ref());
    assert!(subscriber.has_subscription());
    assert!(subscriber.is_complete());
  }

  #[test]
  fn cancel_before_resolution_unsubscribes_upstream() {
    let slot: Arc<Mutex<Option<CompletableSubscriber<E>>>> = Arc::new(Mutex::new(None));
    let publisher = completable::create({
      let slot = slot.clone();
      move |s| *slot.lock().unwrap() = Some(s)
    })
    .into_publisher();
    let subscriber = TestSubscriber::<i32, E>::new();
    publisher.subscribe(subscriber.subscriber_ref());
    subscriber.cancel();

    let pending = slot.lock().unwrap().take().unwrap();
    assert!(pending.is_closed());
    pending.on_complete();
    assert!(!subscriber.is_terminated());
  }
}
