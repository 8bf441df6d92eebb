//! Push-model consumer trait.
//!
//! The three callbacks mirror the usual rx shape: any number of `next` calls,
//! then at most one of `error`/`complete`. Serialization of the calls is the
//! emitter's duty; see `PushSubscriber` and `SubscriberRef`.

/// Consumer of a push-model stream.
pub trait Observer<Item, Err> {
  fn next(&mut self, value: Item);
  fn error(&mut self, err: Err);
  fn complete(&mut self);
}

/// Closure adapter: the closure handles `next`, terminal signals are dropped.
///
/// ```
/// use rx_bridge::prelude::*;
///
/// let mut sum = 0;
/// {
///   let mut obs = FnObserver::<_, ()>::new(|v: i32| sum += v);
///   obs.next(1);
///   obs.next(2);
///   obs.complete();
/// }
/// assert_eq!(sum, 3);
/// ```
pub struct FnObserver<F, Err> {
  f: F,
  _marker: std::marker::PhantomData<fn(Err)>,
}

impl<F, Err> FnObserver<F, Err> {
  pub fn new(f: F) -> Self { Self { f, _marker: std::marker::PhantomData } }
}

impl<F, Item, Err> Observer<Item, Err> for FnObserver<F, Err>
where
  F: FnMut(Item),
{
  #[inline]
  fn next(&mut self, value: Item) { (self.f)(value) }

  fn error(&mut self, _err: Err) {}

  fn complete(&mut self) {}
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn closure_observer_collects() {
    let mut collected = vec![];
    {
      let mut obs = FnObserver::<_, ()>::new(|v| collected.push(v));
      obs.next(1);
      obs.next(2);
      obs.error(());
    }
    assert_eq!(collected, vec![1, 2]);
  }
}
