//! End-to-end bridging: push sources crossing into the pull protocol and
//! back, single- and multi-threaded.

use std::sync::Arc;
use std::thread;

use rx_bridge::prelude::*;
use rx_bridge::testing::{TestObserver, TestSubscriber, TestSubscription};

type E = StreamError<&'static str>;

/// Push to pull and back to push, driven by a demand-aware source.
fn round_trip_complete(n: usize) {
  let items: Vec<i32> = (0..n as i32).collect();
  let publisher = from_iter::<_, E>(items.clone()).into_publisher();
  let observer = TestObserver::new();
  let handle = publisher.into_observable().subscribe(observer.clone());

  handle.request(UNBOUNDED);
  assert_eq!(observer.items(), items);
  assert!(observer.is_complete());
  assert_eq!(observer.error(), None);
}

/// Push to pull and back, with a hot subject feeding items and then failing.
fn round_trip_error(n: usize) {
  let subject = Subject::<i32, E>::new();
  let observer = TestObserver::new();
  let handle = subject
    .clone()
    .into_publisher()
    .into_observable()
    .subscribe(observer.clone());
  handle.request(UNBOUNDED);

  let items: Vec<i32> = (0..n as i32).collect();
  for &i in &items {
    subject.next(i);
  }
  subject.error(StreamError::Source("boom"));

  assert_eq!(observer.items(), items);
  assert_eq!(observer.error(), Some(StreamError::Source("boom")));
  assert!(!observer.is_complete());
}

#[test]
fn round_trips_preserve_items_and_terminals() {
  for n in [0, 1, 3, 100] {
    round_trip_complete(n);
    round_trip_error(n);
  }
}

/// Pull to push and back to pull: the publisher surface on both ends, with
/// the push model crossed in the middle.
#[test]
fn pull_push_pull_round_trip_preserves_items_and_demand() {
  for n in [0usize, 1, 3, 100] {
    let items: Vec<i32> = (0..n as i32).collect();
    let publisher = from_iter::<_, E>(items.clone())
      .into_publisher()
      .into_observable()
      .into_publisher();
    let subscriber = TestSubscriber::new();
    publisher.subscribe(subscriber.subscriber_ref());
    assert!(subscriber.received().is_empty());

    subscriber.request(UNBOUNDED);
    assert_eq!(subscriber.received(), items);
    assert!(subscriber.is_complete());
  }

  // error terminal crosses both directions without demand
  let publisher = throw(StreamError::Source("wire down"))
    .into_publisher()
    .into_observable()
    .into_publisher();
  let subscriber = TestSubscriber::<i32, E>::new();
  publisher.subscribe(subscriber.subscriber_ref());
  assert_eq!(subscriber.error(), Some(StreamError::Source("wire down")));
}

#[test]
fn round_trip_without_demand_stays_silent() {
  let publisher = from_iter::<_, E>(vec![1, 2, 3]).into_publisher();
  let observer = TestObserver::new();
  publisher.into_observable().subscribe(observer.clone());
  assert!(observer.items().is_empty());
  assert!(!observer.is_terminated());
}

#[test]
fn stepwise_demand_crosses_both_bridges() {
  let publisher = from_iter::<_, E>(vec![1, 2, 3]).into_publisher();
  let observer = TestObserver::new();
  let handle = publisher.into_observable().subscribe(observer.clone());

  handle.request(1);
  assert_eq!(observer.items(), vec![1]);
  handle.request(2);
  assert_eq!(observer.items(), vec![1, 2, 3]);
  assert!(observer.is_complete());
}

#[test]
fn cancelling_detaches_from_the_subject() {
  let subject = Subject::<i32, E>::new();
  let publisher = subject.clone().into_publisher();
  let subscriber = TestSubscriber::new();
  publisher.subscribe(subscriber.subscriber_ref());
  assert!(subject.has_observers());

  subscriber.cancel();
  assert!(!subject.has_observers());

  subject.next(1);
  assert!(subscriber.received().is_empty());
  assert!(!subscriber.is_terminated());
}

#[test]
fn hot_subject_respects_downstream_demand_checks() {
  let subject = Subject::<i32, E>::new();
  let subscriber = TestSubscriber::new();
  subject.clone().into_publisher().subscribe(subscriber.subscriber_ref());

  subscriber.request(2);
  subject.next(1);
  subject.next(2);
  // third emission overruns the demand and severs the link
  subject.next(3);

  assert_eq!(subscriber.received(), vec![1, 2]);
  assert_eq!(
    subscriber.error(),
    Some(StreamError::Protocol(ProtocolError::MissingDemand))
  );
  assert!(!subject.has_observers());
}

#[test]
fn concurrent_requests_are_serialized_by_the_demand_gate() {
  let upstream = TestSubscription::new();
  let producer = Arc::new(SyncProducer::new(upstream.clone()));

  let threads: Vec<_> = (0..8)
    .map(|_| {
      let producer = producer.clone();
      thread::spawn(move || {
        for _ in 0..100 {
          producer.request(3);
        }
      })
    })
    .collect();
  for t in threads {
    t.join().unwrap();
  }

  assert_eq!(upstream.total_requested(), 8 * 100 * 3);
  assert!(!upstream.is_cancelled());
}

#[test]
fn producer_thread_and_consumer_thread_meet_in_the_processor() {
  let processor = SubjectProcessor::<i32, E>::new();
  let subscriber = TestSubscriber::new();
  processor.subscribe(subscriber.subscriber_ref());

  let feeder = {
    let mut feed = processor.clone();
    thread::spawn(move || {
      for i in 0..200 {
        feed.on_next(i);
      }
      feed.on_complete();
    })
  };

  subscriber.request(UNBOUNDED);
  subscriber.wait_for_terminal();
  feeder.join().unwrap();

  assert_eq!(subscriber.received(), (0..200).collect::<Vec<_>>());
  assert!(subscriber.is_complete());
}

#[test]
fn chunked_demand_from_another_thread_drains_in_order() {
  let processor = SubjectProcessor::<i32, E>::new();
  let subscriber = TestSubscriber::new();
  processor.subscribe(subscriber.subscriber_ref());

  let mut feed = processor.clone();
  for i in 0..100 {
    feed.on_next(i);
  }
  feed.on_complete();

  let requester = {
    let subscriber = subscriber.clone();
    thread::spawn(move || {
      for _ in 0..20 {
        subscriber.request(5);
      }
    })
  };
  requester.join().unwrap();
  subscriber.wait_for_terminal();

  assert_eq!(subscriber.received(), (0..100).collect::<Vec<_>>());
  assert!(subscriber.is_complete());
}

#[test]
fn error_state_publisher_still_hands_out_a_subscription_first() {
  let publisher = throw(StreamError::Source("down")).into_publisher();
  let subscriber = TestSubscriber::<i32, E>::new();
  publisher.subscribe(subscriber.subscriber_ref());

  assert!(subscriber.has_subscription());
  assert_eq!(subscriber.error(), Some(StreamError::Source("down")));
  assert!(subscriber.received().is_empty());
  assert!(!subscriber.is_complete());
}

#[test]
fn cancelling_while_a_thread_feeds_stops_cleanly() {
  let processor = SubjectProcessor::<i32, E>::new();
  let subscriber = TestSubscriber::new();
  processor.subscribe(subscriber.subscriber_ref());
  subscriber.request(UNBOUNDED);

  let feeder = {
    let mut feed = processor.clone();
    thread::spawn(move || {
      for i in 0..1000 {
        feed.on_next(i);
      }
      feed.on_complete();
    })
  };
  subscriber.wait_for_items(1);
  subscriber.cancel();
  feeder.join().unwrap();

  // whatever arrived before cancellation landed is a clean ordered prefix
  let received = subscriber.received();
  assert!(!received.is_empty());
  assert_eq!(received, (0..received.len() as i32).collect::<Vec<_>>());
}

#[test]
fn two_stage_pipeline_single_to_stream_and_back() {
  // single -> publisher -> single
  let publisher = rx_bridge::single::just(11).into_publisher();
  let single = publisher.into_single();
  let observer = rx_bridge::testing::TestSingleObserver::<i32, E>::new();
  single.subscribe(observer.clone());
  assert_eq!(observer.value(), Some(11));

  // completable -> publisher -> completable
  let publisher: CompletableAsPublisher<_, E> =
    rx_bridge::completable::complete().into_publisher();
  let completable = PublisherAsCompletable::<_, i32>::new(publisher);
  let observer = rx_bridge::testing::TestCompletableObserver::<E>::new();
  completable.subscribe(observer.clone());
  assert!(observer.is_complete());
}
