//! Pull-model publisher viewed as a push source.

use std::sync::Arc;

use crate::observable::{Observable, PushSubscriber};
use crate::producer::SyncProducer;
use crate::streams::{Publisher, Subscriber, SubscriberRef, Subscription};

/// Push facade over a pull-model publisher.
///
/// The publisher's subscription is wrapped in a [`SyncProducer`] and
/// installed as the consumer's producer, so push-side `request` calls become
/// pull-side demand. The strict protocol carries over: a consumer that never
/// requests sees nothing, it does not get the usual unbounded default.
pub struct PublisherAsObservable<P> {
  publisher: P,
}

impl<P> PublisherAsObservable<P> {
  pub fn new(publisher: P) -> Self { Self { publisher } }
}

impl<P, Item, Err> Observable<Item, Err> for PublisherAsObservable<P>
where
  P: Publisher<Item, Err>,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn actual_subscribe(&self, subscriber: PushSubscriber<Item, Err>) {
    // accumulate zero demand up front, so producer installation flushes only
    // what the consumer explicitly asked for
    subscriber.request(0);
    let bridge = SubscriberRef::new(PushBridge { subscriber, started: false });
    self.publisher.subscribe(bridge);
  }
}

struct PushBridge<Item, Err> {
  subscriber: PushSubscriber<Item, Err>,
  started: bool,
}

impl<Item, Err> Subscriber<Item, Err> for PushBridge<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    if self.started {
      subscription.cancel();
      return;
    }
    self.started = true;
    let producer = Arc::new(SyncProducer::new(subscription));
    self.subscriber.add(producer.clone());
    self.subscriber.set_producer(producer);
  }

  fn on_next(&mut self, item: Item) { self.subscriber.next(item) }

  fn on_error(&mut self, err: Err) { self.subscriber.error(err) }

  fn on_complete(&mut self) { self.subscriber.complete() }
}

#[cfg(test)]
mod test {
  use crate::adapter::{IntoPublisher, PublisherExt};
  use crate::error::StreamError;
  use crate::observable::{self, ObservableExt};
  use crate::testing::TestObserver;

  type E = StreamError<&'static str>;

  #[test]
  fn demand_flows_through_to_the_publisher() {
    let publisher = observable::from_iter::<_, E>(vec![1, 2, 3]).into_publisher();
    let observer = TestObserver::new();
    let handle = publisher.into_observable().subscribe(observer.clone());
    assert!(observer.items().is_empty());

    handle.request(2);
    assert_eq!(observer.items(), vec![1, 2]);

    handle.request(1);
    assert_eq!(observer.items(), vec![1, 2, 3]);
    assert!(observer.is_complete());
  }

  #[test]
  fn never_requesting_sees_nothing() {
    let publisher = observable::from_iter::<_, E>(vec![1, 2, 3]).into_publisher();
    let observer = TestObserver::new();
    publisher.into_observable().subscribe(observer.clone());
    assert!(observer.items().is_empty());
    assert!(!observer.is_complete());
  }

  #[test]
  fn unsubscribing_cancels_the_publisher_side() {
    let publisher = observable::from_iter::<_, E>(1..=100).into_publisher();
    let observer = TestObserver::new();
    let handle = publisher.into_observable().subscribe(observer.clone());
    handle.request(3);
    handle.unsubscribe();
    handle.request(10);
    assert_eq!(observer.items(), vec![1, 2, 3]);
    assert!(!observer.is_terminated());
  }
}
