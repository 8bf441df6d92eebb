//! Recording observers and subscribers for exercising push and pull sources
//! in tests. Public so downstream crates can reuse them the same way.

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::completable::CompletableObserver;
use crate::observer::Observer;
use crate::single::SingleObserver;
use crate::streams::{Subscriber, SubscriberRef, Subscription};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Push-side observer recording every signal it receives.
pub struct TestObserver<Item, Err> {
  state: Arc<Mutex<ObserverState<Item, Err>>>,
}

struct ObserverState<Item, Err> {
  items: Vec<Item>,
  error: Option<Err>,
  complete: bool,
}

impl<Item, Err> Clone for TestObserver<Item, Err> {
  fn clone(&self) -> Self { Self { state: self.state.clone() } }
}

impl<Item, Err> Default for TestObserver<Item, Err> {
  fn default() -> Self { Self::new() }
}

impl<Item, Err> TestObserver<Item, Err> {
  pub fn new() -> Self {
    Self {
      state: Arc::new(Mutex::new(ObserverState {
        items: vec![],
        error: None,
        complete: false,
      })),
    }
  }

  pub fn items(&self) -> Vec<Item>
  where
    Item: Clone,
  {
    self.state.lock().unwrap().items.clone()
  }

  pub fn item_count(&self) -> usize { self.state.lock().unwrap().items.len() }

  pub fn error(&self) -> Option<Err>
  where
    Err: Clone,
  {
    self.state.lock().unwrap().error.clone()
  }

  pub fn is_complete(&self) -> bool { self.state.lock().unwrap().complete }

  pub fn is_terminated(&self) -> bool {
    let state = self.state.lock().unwrap();
    state.complete || state.error.is_some()
  }
}

impl<Item, Err> Observer<Item, Err> for TestObserver<Item, Err> {
  fn next(&mut self, value: Item) {
    self.state.lock().unwrap().items.push(value);
  }

  fn error(&mut self, err: Err) {
    self.state.lock().unwrap().error = Some(err);
  }

  fn complete(&mut self) {
    self.state.lock().unwrap().complete = true;
  }
}

/// Pull-side subscriber recording signals and exposing manual demand
/// control. Carries one [`SubscriberRef`] for its whole lifetime so a second
/// `subscribe` with the same instance is seen as a duplicate.
pub struct TestSubscriber<Item, Err> {
  shared: Arc<SubscriberShared<Item, Err>>,
  subscriber_ref: SubscriberRef<Item, Err>,
}

struct SubscriberShared<Item, Err> {
  state: Mutex<SubscriberState<Item, Err>>,
  signalled: Condvar,
}

struct SubscriberState<Item, Err> {
  received: Vec<Item>,
  error: Option<Err>,
  complete: bool,
  subscription: Option<Arc<dyn Subscription>>,
}

impl<Item, Err> Clone for TestSubscriber<Item, Err> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
      subscriber_ref: self.subscriber_ref.clone(),
    }
  }
}

struct Recorder<Item, Err> {
  shared: Arc<SubscriberShared<Item, Err>>,
}

impl<Item, Err> Subscriber<Item, Err> for Recorder<Item, Err>
where
  Item: Send,
  Err: Send,
{
  fn on_subscribe(&mut self, subscription: Arc<dyn Subscription>) {
    let mut state = self.shared.state.lock().unwrap();
    state.subscription = Some(subscription);
    self.shared.signalled.notify_all();
  }

  fn on_next(&mut self, value: Item) {
    let mut state = self.shared.state.lock().unwrap();
    state.received.push(value);
    self.shared.signalled.notify_all();
  }

  fn on_error(&mut self, err: Err) {
    let mut state = self.shared.state.lock().unwrap();
    state.error = Some(err);
    self.shared.signalled.notify_all();
  }

  fn on_complete(&mut self) {
    let mut state = self.shared.state.lock().unwrap();
    state.complete = true;
    self.shared.signalled.notify_all();
  }
}

impl<Item, Err> Default for TestSubscriber<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn default() -> Self { Self::new() }
}

impl<Item, Err> TestSubscriber<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  pub fn new() -> Self {
    let shared = Arc::new(SubscriberShared {
      state: Mutex::new(SubscriberState {
        received: vec![],
        error: None,
        complete: false,
        subscription: None,
      }),
      signalled: Condvar::new(),
    });
    let subscriber_ref = SubscriberRef::new(Recorder { shared: shared.clone() });
    Self { shared, subscriber_ref }
  }

  /// The handle to hand to [`Publisher::subscribe`].
  ///
  /// [`Publisher::subscribe`]: crate::streams::Publisher::subscribe
  pub fn subscriber_ref(&self) -> SubscriberRef<Item, Err> {
    self.subscriber_ref.clone()
  }

  pub fn received(&self) -> Vec<Item>
  where
    Item: Clone,
  {
    self.shared.state.lock().unwrap().received.clone()
  }

  pub fn received_count(&self) -> usize {
    self.shared.state.lock().unwrap().received.len()
  }

  pub fn error(&self) -> Option<Err>
  where
    Err: Clone,
  {
    self.shared.state.lock().unwrap().error.clone()
  }

  pub fn is_complete(&self) -> bool { self.shared.state.lock().unwrap().complete }

  pub fn is_terminated(&self) -> bool {
    let state = self.shared.state.lock().unwrap();
    state.complete || state.error.is_some()
  }

  pub fn has_subscription(&self) -> bool {
    self.shared.state.lock().unwrap().subscription.is_some()
  }

  /// Request `n` more values from the received subscription.
  ///
  /// # Panics
  ///
  /// Panics if `on_subscribe` has not been delivered yet.
  pub fn request(&self, n: u64) {
    let subscription = self
      .shared
      .state
      .lock()
      .unwrap()
      .subscription
      .clone()
      .expect("request before on_subscribe");
    subscription.request(n);
  }

  /// Cancel the received subscription, if any.
  pub fn cancel(&self) {
    let subscription = self.shared.state.lock().unwrap().subscription.clone();
    if let Some(s) = subscription {
      s.cancel();
    }
  }

  /// Block until at least `n` values have arrived.
  ///
  /// # Panics
  ///
  /// Panics after five seconds without progress.
  pub fn wait_for_items(&self, n: usize) {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    let mut state = self.shared.state.lock().unwrap();
    while state.received.len() < n {
      let remaining = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or_else(|| panic!("timed out waiting for {n} items"));
      let (next, timeout) = self.shared.signalled.wait_timeout(state, remaining).unwrap();
      state = next;
      if timeout.timed_out() && state.received.len() < n {
        panic!("timed out waiting for {n} items, got {}", state.received.len());
      }
    }
  }

  /// Block until `on_complete` or `on_error` has arrived.
  ///
  /// # Panics
  ///
  /// Panics after five seconds without a terminal signal.
  pub fn wait_for_terminal(&self) {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    let mut state = self.shared.state.lock().unwrap();
    while !state.complete && state.error.is_none() {
      let remaining = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or_else(|| panic!("timed out waiting for a terminal signal"));
      let (next, timeout) = self.shared.signalled.wait_timeout(state, remaining).unwrap();
      state = next;
      if timeout.timed_out() && !state.complete && state.error.is_none() {
        panic!("timed out waiting for a terminal signal");
      }
    }
  }
}

/// Subscription recording the demand and cancellation it receives.
#[derive(Default)]
pub struct TestSubscription {
  state: Mutex<TestSubscriptionState>,
}

#[derive(Default)]
struct TestSubscriptionState {
  requests: Vec<u64>,
  cancels: usize,
}

impl TestSubscription {
  pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

  pub fn requests(&self) -> Vec<u64> { self.state.lock().unwrap().requests.clone() }

  pub fn total_requested(&self) -> u64 {
    self.state.lock().unwrap().requests.iter().copied().sum()
  }

  pub fn is_cancelled(&self) -> bool { self.cancel_count() > 0 }

  /// How many times `cancel` was called, for asserting it fired exactly once.
  pub fn cancel_count(&self) -> usize { self.state.lock().unwrap().cancels }
}

impl Subscription for TestSubscription {
  fn request(&self, n: u64) {
    self.state.lock().unwrap().requests.push(n);
  }

  fn cancel(&self) {
    self.state.lock().unwrap().cancels += 1;
  }
}

/// Single-value observer recording its terminal signal.
pub struct TestSingleObserver<Item, Err> {
  state: Arc<Mutex<(Option<Item>, Option<Err>)>>,
}

impl<Item, Err> Clone for TestSingleObserver<Item, Err> {
  fn clone(&self) -> Self { Self { state: self.state.clone() } }
}

impl<Item, Err> Default for TestSingleObserver<Item, Err> {
  fn default() -> Self { Self::new() }
}

impl<Item, Err> TestSingleObserver<Item, Err> {
  pub fn new() -> Self { Self { state: Arc::new(Mutex::new((None, None))) } }

  pub fn value(&self) -> Option<Item>
  where
    Item: Clone,
  {
    self.state.lock().unwrap().0.clone()
  }

  pub fn error(&self) -> Option<Err>
  where
    Err: Clone,
  {
    self.state.lock().unwrap().1.clone()
  }
}

impl<Item, Err> SingleObserver<Item, Err> for TestSingleObserver<Item, Err> {
  fn on_success(&mut self, value: Item) {
    self.state.lock().unwrap().0 = Some(value);
  }

  fn on_error(&mut self, err: Err) {
    self.state.lock().unwrap().1 = Some(err);
  }
}

/// Valueless observer recording its terminal signal.
pub struct TestCompletableObserver<Err> {
  state: Arc<Mutex<(bool, Option<Err>)>>,
}

impl<Err> Clone for TestCompletableObserver<Err> {
  fn clone(&self) -> Self { Self { state: self.state.clone() } }
}

impl<Err> Default for TestCompletableObserver<Err> {
  fn default() -> Self { Self::new() }
}

impl<Err> TestCompletableObserver<Err> {
  pub fn new() -> Self { Self { state: Arc::new(Mutex::new((false, None))) } }

  pub fn is_complete(&self) -> bool { self.state.lock().unwrap().0 }

  pub fn error(&self) -> Option<Err>
  where
    Err: Clone,
  {
    self.state.lock().unwrap().1.clone()
  }
}

impl<Err> CompletableObserver<Err> for TestCompletableObserver<Err> {
  fn on_complete(&mut self) {
    self.state.lock().unwrap().0 = true;
  }

  fn on_error(&mut self, err: Err) {
    self.state.lock().unwrap().1 = Some(err);
  }
}
