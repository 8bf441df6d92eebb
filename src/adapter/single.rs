//! Bridging between single-value sources and pull-model publishers.

use std::marker::PhantomData;
use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex,
};

use once_cell::sync::OnceCell;

use crate::adapter::CancelLink;
use crate::error::ProtocolError;
use crate::single::{Single, SingleObserver, SingleSubscriber};
use crate::streams::{Publisher, Subscriber, SubscriberRef, Subscription, UNBOUNDED};

/// Single-value facade over a pull-model publisher.
///
/// Requests everything up front and keeps the first item. A stream that
/// completes empty resolves to [`ProtocolError::Empty`], a second item is
/// [`ProtocolError::TooManyValues`] and cancels the rest of the stream.
pub struct PublisherAsSingle<P> {
  publisher: P,
}

impl<P> PublisherAsSingle<P> {
  pub fn new(publisher: P) -> Self { Self { publisher } }
}

impl<P, Item, Err> Single<Item, Err> for PublisherAsSingle<P>
where
  P: Publisher<Item, Err>,
  Item: Send + 'static,
  Err: From<ProtocolError> + Send + 'static,
{
  fn actual_subscribe(&self, subscriber: SingleSubscriber<Item, Err>) {
    self.publisher.subscribe(SubscriberRef::new(SingleCollector {
      subscriber,
      value: None,
      done: false,
    }));
  }
}

struct SingleCollector<Item, Err> {
  subscriber: SingleSubscriber<Item, Err>,
  value: Option<Item>,
  done: bool,
}

impl<Item, Err> Subscriber<Item, Err> for SingleCollector<Item, Err>
where
  Item: Send + 'static,
  Err: From<ProtocolError> + Send + 'static,
{
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    self.subscriber.add(CancelLink::new(subscription.clone()));
    subscription.request(UNBOUNDED);
  }

  fn on_next(&mut self, item: Item) {
    if self.done {
      return;
    }
    if self.value.is_some() {
      self.done = true;
      self.value = None;
      // unsubscribing releases the CancelLink, which cancels upstream
      self.subscriber.on_error(ProtocolError::TooManyValues.into());
      return;
    }
    self.value = Some(item);
  }

  fn on_error(&mut self, err: Err) {
    if self.done {
      return;
    }
    self.done = true;
    self.value = None;
    self.subscriber.on_error(err);
  }

  fn on_complete(&mut self) {
    if self.done {
      return;
    }
    self.done = true;
    match self.value.take() {
      Some(value) => self.subscriber.on_success(value),
      None => self.subscriber.on_error(ProtocolError::Empty.into()),
    }
  }
}

/// Pull-model facade over a single-value source.
///
/// The one item is held back until the subscriber signals demand; value
/// arrival and the first request race freely, whichever comes second
/// triggers emission.
pub struct SingleAsPublisher<S, Err> {
  single: S,
  _err: PhantomData<fn() -> Err>,
}

impl<S, Err> SingleAsPublisher<S, Err> {
  pub fn new(single: S) -> Self { Self { single, _err: PhantomData } }
}

impl<S, Item, Err> Publisher<Item, Err> for SingleAsPublisher<S, Err>
where
  S: Single<Item, Err>,
  Item: Send + 'static,
  Err: From<ProtocolError> + Send + 'static,
{
  fn subscribe(&self, subscriber: SubscriberRef<Item, Err>) {
    let emission = Arc::new(SingleEmission {
      state: Mutex::new(EmissionState { phase: Phase::NoRequestNoValue, value: None }),
      cancelled: AtomicBool::new(false),
      upstream: OnceCell::new(),
      downstream: subscriber.clone(),
    });
    subscriber.on_subscribe(emission.clone());

    let up = SingleSubscriber::new(EmissionObserver { emission: emission.clone() });
    let _ = emission.upstream.set(up.clone());
    if emission.cancelled.load(Ordering::Acquire) {
      // cancelled between on_subscribe and now
      up.unsubscribe();
    }
    self.single.actual_subscribe(up);
  }
}

#[derive(PartialEq)]
enum Phase {
  NoRequestNoValue,
  NoRequestHasValue,
  HasRequestNoValue,
  Done,
}

struct EmissionState<Item> {
  phase: Phase,
  value: Option<Item>,
}

struct SingleEmission<Item, Err> {
  state: Mutex<EmissionState<Item>>,
  cancelled: AtomicBool,
  upstream: OnceCell<SingleSubscriber<Item, Err>>,
  downstream: SubscriberRef<Item, Err>,
}

impl<Item, Err> SingleEmission<Item, Err> {
  fn emit(&self, value: Item) {
    self.downstream.on_next(value);
    self.downstream.on_complete();
  }

  fn shut_down(&self) {
    self.cancelled.store(true, Ordering::Release);
    if let Some(up) = self.upstream.get() {
      up.unsubscribe();
    }
  }
}

impl<Item, Err> Subscription for SingleEmission<Item, Err>
where
  Item: Send,
  Err: From<ProtocolError> + Send,
{
  fn request(&self, n: u64) {
    if n == 0 {
      let violated = {
        let mut state = self.state.lock().unwrap();
        let violated = state.phase != Phase::Done;
        state.phase = Phase::Done;
        state.value = None;
        violated
      };
      if violated {
        self.shut_down();
        self.downstream.on_error(ProtocolError::NonPositiveRequest.into());
      }
      return;
    }
    let ready = {
      let mut state = self.state.lock().unwrap();
      match state.phase {
        Phase::NoRequestNoValue => {
          state.phase = Phase::HasRequestNoValue;
          None
        }
        Phase::NoRequestHasValue => {
          state.phase = Phase::Done;
          state.value.take()
        }
        Phase::HasRequestNoValue | Phase::Done => None,
      }
    };
    if let Some(value) = ready {
      self.emit(value);
    }
  }

  fn cancel(&self) {
    {
      let mut state = self.state.lock().unwrap();
      state.phase = Phase::Done;
      state.value = None;
    }
    self.shut_down();
  }
}

struct EmissionObserver<Item, Err> {
  emission: Arc<SingleEmission<Item, Err>>,
}

impl<Item, Err> SingleObserver<Item, Err> for EmissionObserver<Item, Err>
where
  Item: Send,
  Err: From<ProtocolError> + Send,
{
  fn on_success(&mut self, value: Item) {
    let ready = {
      let mut state = self.emission.state.lock().unwrap();
      match state.phase {
        Phase::NoRequestNoValue => {
          state.phase = Phase::NoRequestHasValue;
          state.value = Some(value);
          None
        }
        Phase::HasRequestNoValue => {
          state.phase = Phase::Done;
          Some(value)
        }
        Phase::NoRequestHasValue | Phase::Done => None,
      }
    };
    if let Some(value) = ready {
      self.emission.emit(value);
    }
  }

  fn on_error(&mut self, err: Err) {
    let live = {
      let mut state = self.emission.state.lock().unwrap();
      let live = state.phase != Phase::Done;
      state.phase = Phase::Done;
      state.value = None;
      live
    };
    if live {
      self.emission.downstream.on_error(err);
    }
  }
}
