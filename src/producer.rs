//! Demand tracker: serializes concurrent `request` calls into a single
//! non-reentrant drain feeding one upstream subscription.
//!
//! The first positive request becomes the emitting worker and forwards
//! immediately; requests arriving while it drains are enqueued and forwarded
//! by the worker, never recursing into the upstream. Cancellation during a
//! drain is recorded as a sentinel consumed by the worker in place of any
//! remaining demand.

use std::sync::{
  atomic::{AtomicBool, AtomicU64, Ordering},
  Arc, Mutex,
};

use smallvec::SmallVec;

use crate::{
  observable::{Producer, SubscriptionLike},
  streams::{Subscription, UNBOUNDED},
};

/// Queue entry standing for "cancel instead of requesting more".
const CANCEL: u64 = 0;

/// Serializing demand gate in front of one pull-model [`Subscription`].
///
/// Implements [`Producer`] so a push-model consumer can drive pull-model
/// demand, and [`SubscriptionLike`] (through `Arc`) so it can sit in a
/// subscriber's teardown list.
pub struct SyncProducer {
  subscription: Arc<dyn Subscription>,
  unsubscribed: AtomicBool,
  state: Mutex<DrainQueue>,
}

struct DrainQueue {
  emitting: bool,
  pending: SmallVec<[u64; 4]>,
}

impl SyncProducer {
  pub fn new(subscription: Arc<dyn Subscription>) -> Self {
    Self {
      subscription,
      unsubscribed: AtomicBool::new(false),
      state: Mutex::new(DrainQueue { emitting: false, pending: SmallVec::new() }),
    }
  }

  /// Forward `n` of demand upstream, serialized against concurrent callers.
  /// Zero is ignored: inside the push model it is the legal start probe.
  pub fn request(&self, n: u64) {
    if n == 0 || self.unsubscribed.load(Ordering::Acquire) {
      return;
    }
    {
      let mut state = self.state.lock().unwrap();
      if self.unsubscribed.load(Ordering::Acquire) {
        return;
      }
      if state.emitting {
        state.pending.push(n);
        return;
      }
      state.emitting = true;
    }
    self.subscription.request(n);
    loop {
      let batch = {
        let mut state = self.state.lock().unwrap();
        if state.pending.is_empty() {
          state.emitting = false;
          return;
        }
        std::mem::take(&mut state.pending)
      };
      for n in batch {
        if n == CANCEL {
          // terminal state; `emitting` intentionally stays set
          self.unsubscribed.store(true, Ordering::Release);
          self.subscription.cancel();
          return;
        }
        self.subscription.request(n);
      }
    }
  }

  /// Cancel the upstream subscription. If a drain is in progress the
  /// cancellation replaces all pending demand and is honored by the worker.
  pub fn unsubscribe(&self) {
    if self.unsubscribed.load(Ordering::Acquire) {
      return;
    }
    {
      let mut state = self.state.lock().unwrap();
      if self.unsubscribed.load(Ordering::Acquire) {
        return;
      }
      if state.emitting {
        state.pending.clear();
        state.pending.push(CANCEL);
        return;
      }
      state.emitting = true;
    }
    self.unsubscribed.store(true, Ordering::Release);
    self.subscription.cancel();
  }

  pub fn is_unsubscribed(&self) -> bool { self.unsubscribed.load(Ordering::Acquire) }
}

impl Producer for SyncProducer {
  #[inline]
  fn request(&self, n: u64) { SyncProducer::request(self, n) }
}

impl SubscriptionLike for Arc<SyncProducer> {
  #[inline]
  fn unsubscribe(&mut self) { SyncProducer::unsubscribe(self) }

  #[inline]
  fn is_closed(&self) -> bool { self.is_unsubscribed() }
}

/// Saturating demand accumulation; `UNBOUNDED` is sticky. Returns the
/// previous value.
pub(crate) fn add_request(requested: &AtomicU64, n: u64) -> u64 {
  let mut cur = requested.load(Ordering::Relaxed);
  loop {
    if cur == UNBOUNDED {
      return UNBOUNDED;
    }
    let next = cur.saturating_add(n);
    match requested.compare_exchange_weak(cur, next, Ordering::AcqRel, Ordering::Relaxed) {
      Ok(prev) => return prev,
      Err(seen) => cur = seen,
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  enum Call {
    Request(u64),
    Cancel,
  }

  #[derive(Default)]
  struct UpstreamLog {
    calls: Mutex<Vec<Call>>,
  }

  impl UpstreamLog {
    fn requests(&self) -> Vec<u64> {
      self
        .calls
        .lock()
        .unwrap()
        .iter()
        .filter_map(|c| match c {
          Call::Request(n) => Some(*n),
          Call::Cancel => None,
        })
        .collect()
    }

    fn cancels(&self) -> usize {
      self.calls.lock().unwrap().iter().filter(|c| matches!(c, Call::Cancel)).count()
    }
  }

  impl Subscription for UpstreamLog {
    fn request(&self, n: u64) { self.calls.lock().unwrap().push(Call::Request(n)) }

    fn cancel(&self) { self.calls.lock().unwrap().push(Call::Cancel) }
  }

  /// Upstream whose `request` re-enters the producer, the situation the
  /// drain exists to flatten.
  struct ReentrantUpstream {
    log: Arc<UpstreamLog>,
    producer: Mutex<Option<Arc<SyncProducer>>>,
  }

  impl Subscription for ReentrantUpstream {
    fn request(&self, n: u64) {
      self.log.calls.lock().unwrap().push(Call::Request(n));
      if n == 1 {
        if let Some(p) = self.producer.lock().unwrap().as_ref() {
          p.request(10);
        }
      }
    }

    fn cancel(&self) { self.log.calls.lock().unwrap().push(Call::Cancel) }
  }

  #[test]
  fn forwards_and_ignores_zero() {
    let log = Arc::new(UpstreamLog::default());
    let producer = SyncProducer::new(log.clone());
    producer.request(0);
    producer.request(4);
    assert_eq!(log.requests(), vec![4]);
  }

  #[test]
  fn reentrant_request_is_queued_and_flattened() {
    let log = Arc::new(UpstreamLog::default());
    let upstream = Arc::new(ReentrantUpstream { log: log.clone(), producer: Mutex::new(None) });
    let producer = Arc::new(SyncProducer::new(upstream.clone()));
    *upstream.producer.lock().unwrap() = Some(producer.clone());

    producer.request(1);
    // the nested request(10) must arrive after the outer call returned
    assert_eq!(log.requests(), vec![1, 10]);
  }

  #[test]
  fn cancel_during_drain_overrides_pending_demand() {
    let log = Arc::new(UpstreamLog::default());
    struct CancellingUpstream {
      log: Arc<UpstreamLog>,
      producer: Mutex<Option<Arc<SyncProducer>>>,
    }
    impl Subscription for CancellingUpstream {
      fn request(&self, n: u64) {
        self.log.calls.lock().unwrap().push(Call::Request(n));
        if let Some(p) = self.producer.lock().unwrap().take() {
          p.request(99); // queued...
          SyncProducer::unsubscribe(&p); // ...then discarded by the cancel sentinel
        }
      }

      fn cancel(&self) { self.log.calls.lock().unwrap().push(Call::Cancel) }
    }

    let upstream = Arc::new(CancellingUpstream { log: log.clone(), producer: Mutex::new(None) });
    let producer = Arc::new(SyncProducer::new(upstream.clone()));
    *upstream.producer.lock().unwrap() = Some(producer.clone());

    producer.request(1);
    assert_eq!(log.requests(), vec![1]);
    assert_eq!(log.cancels(), 1);
    assert!(producer.is_unsubscribed());

    // post-cancel demand goes nowhere
    producer.request(5);
    assert_eq!(log.requests(), vec![1]);
  }

  #[test]
  fn unsubscribe_outside_drain_cancels_once() {
    let log = Arc::new(UpstreamLog::default());
    let producer = SyncProducer::new(log.clone());
    producer.unsubscribe();
    producer.unsubscribe();
    assert_eq!(log.cancels(), 1);
  }

  #[test]
  fn add_request_saturates_and_pins_unbounded() {
    let requested = AtomicU64::new(0);
    assert_eq!(add_request(&requested, 3), 0);
    assert_eq!(add_request(&requested, UNBOUNDED), 3);
    assert_eq!(requested.load(Ordering::Relaxed), UNBOUNDED);
    // sticky once unbounded
    assert_eq!(add_request(&requested, 1), UNBOUNDED);
    assert_eq!(requested.load(Ordering::Relaxed), UNBOUNDED);
  }
}
