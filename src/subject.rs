//! Hot multicasting: a `Subject` is both an observer fed from outside and an
//! observable fanning every signal out to its current subscribers.

use std::sync::{Arc, Mutex, Weak};

use crate::observable::{Observable, PushSubscriber, SubscriptionLike};
use crate::observer::Observer;

/// Terminal state a stream settled into.
#[derive(Clone)]
pub(crate) enum Terminal<Err> {
  Completed,
  Errored(Err),
}

/// Hot source multicasting pushed signals to all current subscribers.
///
/// Subscribers attaching after the subject terminated get the terminal
/// signal replayed immediately. Items are delivered eagerly with no
/// buffering, so demand signalled by subscribers is not consulted here.
pub struct Subject<Item, Err> {
  core: Arc<Mutex<SubjectState<Item, Err>>>,
}

impl<Item, Err> Clone for Subject<Item, Err> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<Item, Err> Default for Subject<Item, Err> {
  fn default() -> Self { Self::new() }
}

struct SubjectState<Item, Err> {
  observers: Vec<(usize, PushSubscriber<Item, Err>)>,
  terminal: Option<Terminal<Err>>,
  next_id: usize,
}

impl<Item, Err> Subject<Item, Err> {
  pub fn new() -> Self {
    Self {
      core: Arc::new(Mutex::new(SubjectState {
        observers: vec![],
        terminal: None,
        next_id: 0,
      })),
    }
  }

  /// Multicast `value` to every live subscriber.
  pub fn next(&self, value: Item)
  where
    Item: Clone,
  {
    let targets: Vec<_> = {
      let mut state = self.core.lock().unwrap();
      if state.terminal.is_some() {
        return;
      }
      state.observers.retain(|(_, s)| !s.is_closed());
      state.observers.iter().map(|(_, s)| s.clone()).collect()
    };
    for target in targets {
      target.next(value.clone());
    }
  }

  /// Terminate with `err`. Later signals are dropped.
  pub fn error(&self, err: Err)
  where
    Err: Clone,
  {
    let targets = {
      let mut state = self.core.lock().unwrap();
      if state.terminal.is_some() {
        return;
      }
      state.terminal = Some(Terminal::Errored(err.clone()));
      std::mem::take(&mut state.observers)
    };
    for (_, target) in targets {
      target.error(err.clone());
    }
  }

  /// Terminate normally. Later signals are dropped.
  pub fn complete(&self) {
    let targets = {
      let mut state = self.core.lock().unwrap();
      if state.terminal.is_some() {
        return;
      }
      state.terminal = Some(Terminal::Completed);
      std::mem::take(&mut state.observers)
    };
    for (_, target) in targets {
      target.complete();
    }
  }

  /// Whether any live subscriber is attached right now. Reflects
  /// unsubscription immediately.
  pub fn has_observers(&self) -> bool { self.observer_count() > 0 }

  pub fn observer_count(&self) -> usize {
    let mut state = self.core.lock().unwrap();
    state.observers.retain(|(_, s)| !s.is_closed());
    state.observers.len()
  }
}

impl<Item, Err> Observable<Item, Err> for Subject<Item, Err>
where
  Item: 'static,
  Err: Clone + Send + 'static,
{
  fn actual_subscribe(&self, subscriber: PushSubscriber<Item, Err>) {
    let replay = {
      let mut state = self.core.lock().unwrap();
      match &state.terminal {
        Some(terminal) => Some(terminal.clone()),
        None => {
          if !subscriber.is_closed() {
            let id = state.next_id;
            state.next_id += 1;
            state.observers.push((id, subscriber.clone()));
            subscriber.add(Detach { core: Arc::downgrade(&self.core), id });
          }
          None
        }
      }
    };
    match replay {
      Some(Terminal::Completed) => subscriber.complete(),
      Some(Terminal::Errored(err)) => subscriber.error(err),
      None => {}
    }
  }
}

impl<Item, Err> Observer<Item, Err> for Subject<Item, Err>
where
  Item: Clone,
  Err: Clone,
{
  fn next(&mut self, value: Item) { Subject::next(self, value) }

  fn error(&mut self, err: Err) { Subject::error(self, err) }

  fn complete(&mut self) { Subject::complete(self) }
}

/// Drops one registration when its subscriber goes away, so
/// `has_observers` does not lag behind unsubscription.
struct Detach<Item, Err> {
  core: Weak<Mutex<SubjectState<Item, Err>>>,
  id: usize,
}

impl<Item, Err> SubscriptionLike for Detach<Item, Err> {
  fn unsubscribe(&mut self) {
    if let Some(core) = self.core.upgrade() {
      core.lock().unwrap().observers.retain(|(id, _)| *id != self.id);
    }
  }

  fn is_closed(&self) -> bool { self.core.upgrade().is_none() }
}
