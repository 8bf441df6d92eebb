//! Pull-model processor backed by a [`Subject`]: one upstream subscription
//! fanned out to any number of downstream subscribers.
//!
//! The subject multicasts eagerly, so each downstream subscriber gets its
//! own buffering stage that holds items until that subscriber's demand
//! covers them. Upstream demand is unbounded while at least one subscriber
//! is attached; when the last one leaves the upstream subscription is
//! cancelled.

use std::collections::VecDeque;
use std::sync::{
  atomic::{AtomicBool, AtomicI64, Ordering},
  Arc, Mutex,
};

use once_cell::sync::OnceCell;

use crate::error::ProtocolError;
use crate::observable::{Observable, PushSubscriber};
use crate::observer::Observer;
use crate::streams::{Publisher, Subscriber, SubscriberRef, Subscription, UNBOUNDED};
use crate::subject::{Subject, Terminal};

type Registry<Item, Err> = Arc<Mutex<Vec<SubscriberRef<Item, Err>>>>;

/// A [`Subject`] wearing both pull-model hats: feed it as a subscriber,
/// consume it as a publisher.
///
/// Never attached upstream it still works as a standalone hot publisher;
/// attached, it requests unbounded demand and relies on the per-subscriber
/// buffers for flow control downstream.
pub struct SubjectProcessor<Item, Err> {
  subject: Subject<Item, Err>,
  /// Live downstream count; `-1` until the first subscriber ever attaches.
  active: Arc<AtomicI64>,
  upstream: Arc<OnceCell<Arc<dyn Subscription>>>,
  subscribers: Registry<Item, Err>,
}

impl<Item, Err> Clone for SubjectProcessor<Item, Err> {
  fn clone(&self) -> Self {
    Self {
      subject: self.subject.clone(),
      active: self.active.clone(),
      upstream: self.upstream.clone(),
      subscribers: self.subscribers.clone(),
    }
  }
}

impl<Item, Err> Default for SubjectProcessor<Item, Err> {
  fn default() -> Self { Self::new() }
}

impl<Item, Err> SubjectProcessor<Item, Err> {
  pub fn new() -> Self {
    Self {
      subject: Subject::new(),
      active: Arc::new(AtomicI64::new(-1)),
      upstream: Arc::new(OnceCell::new()),
      subscribers: Arc::new(Mutex::new(vec![])),
    }
  }

  pub fn subscriber_count(&self) -> usize { self.subscribers.lock().unwrap().len() }
}

impl<Item, Err> Subscriber<Item, Err> for SubjectProcessor<Item, Err>
where
  Item: Clone,
  Err: Clone,
{
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    if self.upstream.set(subscription.clone()).is_err() {
      subscription.cancel();
      return;
    }
    if self.active.load(Ordering::Acquire) == 0 {
      // every downstream already left before we attached
      subscription.cancel();
      return;
    }
    subscription.request(UNBOUNDED);
  }

  fn on_next(&mut self, item: Item) { self.subject.next(item) }

  fn on_error(&mut self, err: Err) { self.subject.error(err) }

  fn on_complete(&mut self) { self.subject.complete() }
}

impl<Item, Err> Publisher<Item, Err> for SubjectProcessor<Item, Err>
where
  Item: Clone + Send + 'static,
  Err: Clone + From<ProtocolError> + Send + 'static,
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
    if self
      .active
      .compare_exchange(-1, 1, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      self.active.fetch_add(1, Ordering::AcqRel);
    }

    let fan = Arc::new(FanOut {
      downstream: subscriber.clone(),
      queue: Mutex::new(FanOutQueue {
        buffer: VecDeque::new(),
        requested: 0,
        emitting: false,
        terminal: None,
        finished: false,
      }),
      push: OnceCell::new(),
      registry: self.subscribers.clone(),
      active: self.active.clone(),
      upstream: self.upstream.clone(),
      detached: AtomicBool::new(false),
    });
    let push = PushSubscriber::new(FanOutObserver { fan: fan.clone() });
    let _ = fan.push.set(push.clone());

    subscriber.on_subscribe(fan);
    self.subject.actual_subscribe(push);
  }
}

/// Per-subscriber buffering stage between the eager subject and one
/// demand-driven downstream.
struct FanOut<Item, Err> {
  downstream: SubscriberRef<Item, Err>,
  queue: Mutex<FanOutQueue<Item, Err>>,
  push: OnceCell<PushSubscriber<Item, Err>>,
  registry: Registry<Item, Err>,
  active: Arc<AtomicI64>,
  upstream: Arc<OnceCell<Arc<dyn Subscription>>>,
  detached: AtomicBool,
}

struct FanOutQueue<Item, Err> {
  buffer: VecDeque<Item>,
  requested: u64,
  /// Some caller owns the drain loop; others enqueue and leave.
  emitting: bool,
  terminal: Option<Terminal<Err>>,
  /// Cancelled or terminal delivered; everything after is dropped.
  finished: bool,
}

enum Step<Item, Err> {
  Deliver(Item),
  Finish(Terminal<Err>),
  Idle,
}

impl<Item, Err> FanOut<Item, Err> {
  fn push_item(&self, item: Item) {
    {
      let mut q = self.queue.lock().unwrap();
      if q.finished || q.terminal.is_some() {
        return;
      }
      q.buffer.push_back(item);
    }
    self.drain();
  }

  fn push_terminal(&self, terminal: Terminal<Err>) {
    {
      let mut q = self.queue.lock().unwrap();
      if q.finished || q.terminal.is_some() {
        return;
      }
      q.terminal = Some(terminal);
    }
    self.drain();
  }

  fn drain(&self) {
    {
      let mut q = self.queue.lock().unwrap();
      if q.emitting {
        return;
      }
      q.emitting = true;
    }
    loop {
      let step = {
        let mut q = self.queue.lock().unwrap();
        if q.finished {
          // terminal latch; `emitting` stays set
          Step::Idle
        } else if q.requested > 0 {
          if let Some(item) = q.buffer.pop_front() {
            if q.requested != UNBOUNDED {
              q.requested -= 1;
            }
            Step::Deliver(item)
          } else if let Some(terminal) = q.terminal.take() {
            q.finished = true;
            Step::Finish(terminal)
          } else {
            q.emitting = false;
            Step::Idle
          }
        } else if q.buffer.is_empty() {
          if let Some(terminal) = q.terminal.take() {
            q.finished = true;
            Step::Finish(terminal)
          } else {
            q.emitting = false;
            Step::Idle
          }
        } else {
          q.emitting = false;
          Step::Idle
        }
      };
      match step {
        Step::Deliver(item) => self.downstream.on_next(item),
        Step::Finish(terminal) => {
          match terminal {
            Terminal::Completed => self.downstream.on_complete(),
            Terminal::Errored(err) => self.downstream.on_error(err),
          }
          self.detach();
          return;
        }
        Step::Idle => return,
      }
    }
  }

  /// Remove this stage from the processor; the last one out cancels the
  /// upstream subscription.
  fn detach(&self) {
    if self.detached.swap(true, Ordering::AcqRel) {
      return;
    }
    self.registry.lock().unwrap().retain(|s| !s.ptr_eq(&self.downstream));
    if let Some(push) = self.push.get() {
      push.unsubscribe();
    }
    if self.active.fetch_sub(1, Ordering::AcqRel) == 1 {
      if let Some(upstream) = self.upstream.get() {
        upstream.cancel();
      }
    }
  }
}

impl<Item, Err> Subscription for FanOut<Item, Err>
where
  Item: Send,
  Err: From<ProtocolError> + Send,
{
  fn request(&self, n: u64) {
    if n == 0 {
      {
        let mut q = self.queue.lock().unwrap();
        if q.finished {
          return;
        }
        q.finished = true;
        q.buffer.clear();
        q.terminal = None;
      }
      self.downstream.on_error(ProtocolError::NonPositiveRequest.into());
      self.detach();
      return;
    }
    {
      let mut q = self.queue.lock().unwrap();
      if q.finished {
        return;
      }
      q.requested = if n == UNBOUNDED { UNBOUNDED } else { q.requested.saturating_add(n) };
    }
    self.drain();
  }

  fn cancel(&self) {
    {
      let mut q = self.queue.lock().unwrap();
      if q.finished {
        return;
      }
      q.finished = true;
      q.buffer.clear();
      q.terminal = None;
    }
    self.detach();
  }
}

struct FanOutObserver<Item, Err> {
  fan: Arc<FanOut<Item, Err>>,
}

impl<Item, Err> Observer<Item, Err> for FanOutObserver<Item, Err> {
  fn next(&mut self, value: Item) { self.fan.push_item(value) }

  fn error(&mut self, err: Err) { self.fan.push_terminal(Terminal::Errored(err)) }

  fn complete(&mut self) { self.fan.push_terminal(Terminal::Completed) }
}
