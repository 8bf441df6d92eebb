//! Push source viewed as a pull-model publisher, with demand enforcement.

use std::sync::{
  atomic::{AtomicBool, AtomicU64, Ordering},
  Arc, Mutex,
};

use once_cell::sync::OnceCell;

use crate::error::ProtocolError;
use crate::observable::{Observable, PushSubscriber};
use crate::observer::Observer;
use crate::producer::add_request;
use crate::streams::{Publisher, SubscriberRef, Subscription, UNBOUNDED};

type Registry<Item, Err> = Arc<Mutex<Vec<SubscriberRef<Item, Err>>>>;

/// Pull-model facade over a push source.
///
/// Each `subscribe` attaches one fresh push subscription and gates its
/// emissions behind the subscriber's explicit demand. A demand-aware source
/// sees the demand through the producer channel and throttles itself; a hot
/// source that emits past zero demand breaches the protocol and is cut off
/// with a terminal [`ProtocolError::MissingDemand`].
pub struct ObservableAsPublisher<Src, Item, Err> {
  source: Src,
  subscribers: Registry<Item, Err>,
}

impl<Src, Item, Err> ObservableAsPublisher<Src, Item, Err> {
  pub fn new(source: Src) -> Self {
    Self { source, subscribers: Arc::new(Mutex::new(vec![])) }
  }
}

impl<Src, Item, Err> Publisher<Item, Err> for ObservableAsPublisher<Src, Item, Err>
where
  Src: Observable<Item, Err>,
  Item: Send + 'static,
  Err: From<ProtocolError> + Send + 'static,
{
  fn subscribe(&self, subscriber: SubscriberRef<Item, Err>) {
    {
      let mut registry = self.subscribers.lock().unwrap();
      if registry.iter().any(|s| s.ptr_eq(&subscriber)) {
        drop(registry);
        log::debug!("rejecting duplicate subscription attempt");
        subscriber.on_error(ProtocolError::DuplicateSubscription.into());
        return;
      }
      registry.push(subscriber.clone());
    }

    let state = Arc::new(ChildState {
      done: AtomicBool::new(false),
      requested: AtomicU64::new(0),
      requested_any: AtomicBool::new(false),
    });
    let upstream: Arc<OnceCell<PushSubscriber<Item, Err>>> = Arc::new(OnceCell::new());

    let push = PushSubscriber::new(ChildObserver {
      downstream: subscriber.clone(),
      state: state.clone(),
      registry: self.subscribers.clone(),
      upstream: upstream.clone(),
    });
    let _ = upstream.set(push.clone());

    subscriber.on_subscribe(Arc::new(ChildSubscription {
      downstream: subscriber.clone(),
      state: state.clone(),
      registry: self.subscribers.clone(),
      push: push.clone(),
    }));

    // Consumers that issued no demand inside `on_subscribe` still get the
    // source started, with zero initial credit rather than unbounded.
    if !state.requested_any.load(Ordering::Acquire) {
      push.request(0);
    }
    self.source.actual_subscribe(push);
  }
}

struct ChildState {
  /// Terminated, cancelled or cut off; set exactly once.
  done: AtomicBool,
  requested: AtomicU64,
  requested_any: AtomicBool,
}

impl ChildState {
  /// First caller wins the right to deliver the terminal outcome.
  fn finish(&self) -> bool { !self.done.swap(true, Ordering::AcqRel) }
}

fn deregister<Item, Err>(registry: &Registry<Item, Err>, subscriber: &SubscriberRef<Item, Err>) {
  registry.lock().unwrap().retain(|s| !s.ptr_eq(subscriber));
}

/// Receives the push source's signals and forwards them under demand.
struct ChildObserver<Item, Err> {
  downstream: SubscriberRef<Item, Err>,
  state: Arc<ChildState>,
  registry: Registry<Item, Err>,
  upstream: Arc<OnceCell<PushSubscriber<Item, Err>>>,
}

impl<Item, Err> ChildObserver<Item, Err> {
  /// Consume one unit of demand, or report that none is outstanding.
  fn claim_credit(&self) -> bool {
    let requested = &self.state.requested;
    let mut cur = requested.load(Ordering::Acquire);
    loop {
      if cur == UNBOUNDED {
        return true;
      }
      if cur == 0 {
        return false;
      }
      match requested.compare_exchange_weak(cur, cur - 1, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => return true,
        Err(seen) => cur = seen,
      }
    }
  }
}

impl<Item, Err> Observer<Item, Err> for ChildObserver<Item, Err>
where
  Err: From<ProtocolError>,
{
  fn next(&mut self, value: Item) {
    if self.state.done.load(Ordering::Acquire) {
      return;
    }
    if self.claim_credit() {
      self.downstream.on_next(value);
      return;
    }
    if self.state.finish() {
      log::warn!("push source emitted past outstanding demand; detaching it");
      deregister(&self.registry, &self.downstream);
      self.downstream.on_error(ProtocolError::MissingDemand.into());
      if let Some(push) = self.upstream.get() {
        push.unsubscribe();
      }
    }
  }

  fn error(&mut self, err: Err) {
    if self.state.finish() {
      deregister(&self.registry, &self.downstream);
      self.downstream.on_error(err);
    }
  }

  fn complete(&mut self) {
    if self.state.finish() {
      deregister(&self.registry, &self.downstream);
      self.downstream.on_complete();
    }
  }
}

/// The subscriber's demand/cancel channel into the push source.
struct ChildSubscription<Item, Err> {
  downstream: SubscriberRef<Item, Err>,
  state: Arc<ChildState>,
  registry: Registry<Item, Err>,
  push: PushSubscriber<Item, Err>,
}

impl<Item, Err> Subscription for ChildSubscription<Item, Err>
where
  Item: Send,
  Err: From<ProtocolError> + Send,
{
  fn request(&self, n: u64) {
    if n == 0 {
      if self.state.finish() {
        deregister(&self.registry, &self.downstream);
        self.push.unsubscribe();
        self.downstream.on_error(ProtocolError::NonPositiveRequest.into());
      }
      return;
    }
    self.state.requested_any.store(true, Ordering::Release);
    add_request(&self.state.requested, n);
    self.push.request(n);
  }

  fn cancel(&self) {
    if self.state.finish() {
      deregister(&self.registry, &self.downstream);
      self.push.unsubscribe();
    }
  }
}
