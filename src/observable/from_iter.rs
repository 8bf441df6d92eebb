//! Demand-aware iterator source.
//!
//! Installs a producer that walks the iterator only as far as the consumer
//! has requested, with a non-reentrant emit loop: demand arriving while a
//! drain is active (including reentrantly from the observer itself) is
//! folded into the running drain instead of recursing.

use std::sync::{
  atomic::{AtomicU64, Ordering},
  Arc, Mutex,
};

use crate::{
  observable::{Observable, Producer, PushSubscriber},
  producer::add_request,
  streams::UNBOUNDED,
};

/// Turn any cloneable iterable into a demand-aware source. Each subscription
/// walks a fresh iterator.
pub fn from_iter<I, Err>(it: I) -> FromIter<I, Err>
where
  I: IntoIterator + Clone,
{
  FromIter { it, _err: std::marker::PhantomData }
}

pub struct FromIter<I, Err> {
  it: I,
  _err: std::marker::PhantomData<fn() -> Err>,
}

impl<I, Item, Err> Observable<Item, Err> for FromIter<I, Err>
where
  I: IntoIterator<Item = Item> + Clone,
  I::IntoIter: Send + 'static,
  Item: Send + 'static,
  Err: 'static,
{
  fn actual_subscribe(&self, subscriber: PushSubscriber<Item, Err>) {
    let producer = Arc::new(IterProducer {
      iter: Mutex::new(self.it.clone().into_iter().peekable()),
      requested: AtomicU64::new(0),
      subscriber: subscriber.clone(),
    });
    subscriber.set_producer(producer);
  }
}

struct IterProducer<It: Iterator, Item, Err> {
  iter: Mutex<std::iter::Peekable<It>>,
  requested: AtomicU64,
  subscriber: PushSubscriber<Item, Err>,
}

impl<It, Item, Err> Producer for IterProducer<It, Item, Err>
where
  It: Iterator<Item = Item> + Send,
  Item: Send,
{
  fn request(&self, n: u64) {
    if n == 0 {
      return;
    }
    if add_request(&self.requested, n) != 0 {
      // an active drain owns emission and will observe the new total
      return;
    }
    let mut credit = self.requested.load(Ordering::Acquire);
    loop {
      let mut produced = 0;
      while produced < credit {
        if self.subscriber.is_closed() {
          return;
        }
        let (item, exhausted) = {
          let mut iter = self.iter.lock().unwrap();
          let item = iter.next();
          (item, iter.peek().is_none())
        };
        match item {
          Some(value) => {
            self.subscriber.next(value);
            produced += 1;
            if exhausted {
              self.subscriber.complete();
              return;
            }
          }
          None => {
            self.subscriber.complete();
            return;
          }
        }
      }
      credit = consume(&self.requested, produced);
      if credit == 0 {
        return;
      }
    }
  }
}

/// Deduct delivered items from outstanding demand; `UNBOUNDED` never drains.
/// Returns the demand remaining.
fn consume(requested: &AtomicU64, n: u64) -> u64 {
  let mut cur = requested.load(Ordering::Relaxed);
  loop {
    if cur == UNBOUNDED {
      return UNBOUNDED;
    }
    let next = cur - n;
    match requested.compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Relaxed) {
      Ok(_) => return next,
      Err(seen) => cur = seen,
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::{observable::ObservableExt, testing::TestObserver};

  /// Requesting zero before the producer is installed starts the source
  /// paused instead of with the unbounded default.
  fn subscribe_paused<Item: Clone + Send + 'static>(
    source: &FromIter<Vec<Item>, ()>,
    observer: TestObserver<Item, ()>,
  ) -> PushSubscriber<Item, ()> {
    let subscriber = PushSubscriber::new(observer);
    subscriber.request(0);
    source.actual_subscribe(subscriber.clone());
    subscriber
  }

  #[test]
  fn emits_only_requested_amounts() {
    let observer = TestObserver::<i32, ()>::new();
    let source = from_iter(vec![1, 2, 3]);
    let handle = subscribe_paused(&source, observer.clone());
    assert!(observer.items().is_empty());

    handle.request(1);
    assert_eq!(observer.items(), vec![1]);

    handle.request(2);
    assert_eq!(observer.items(), vec![1, 2, 3]);
    assert!(observer.is_complete());
  }

  #[test]
  fn unbounded_request_drains_everything() {
    let observer = TestObserver::<i32, ()>::new();
    let handle = from_iter(0..5).subscribe(observer.clone());
    handle.request(UNBOUNDED);
    assert_eq!(observer.items(), vec![0, 1, 2, 3, 4]);
    assert!(observer.is_complete());
  }

  #[test]
  fn overdraw_completes_without_panic() {
    let observer = TestObserver::<i32, ()>::new();
    let source = from_iter(vec![7]);
    let handle = subscribe_paused(&source, observer.clone());
    handle.request(10);
    assert_eq!(observer.items(), vec![7]);
    assert!(observer.is_complete());
  }

  #[test]
  fn unsubscribed_consumer_stops_the_drain() {
    let observer = TestObserver::<i32, ()>::new();
    let source = from_iter((0..1000).collect::<Vec<_>>());
    let handle = subscribe_paused(&source, observer.clone());
    handle.request(1);
    handle.unsubscribe();
    handle.request(100);
    assert_eq!(observer.items(), vec![0]);
    assert!(!observer.is_complete());
  }

  #[test]
  fn each_subscription_gets_a_fresh_iterator() {
    let source = from_iter(vec![1, 2]);
    for _ in 0..2 {
      let observer = TestObserver::<i32, ()>::new();
      let handle = source.subscribe(observer.clone());
      handle.request(UNBOUNDED);
      assert_eq!(observer.items(), vec![1, 2]);
    }
  }
}
