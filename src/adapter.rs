//! Conversions between the push model and the pull model.
//!
//! Each direction is its own submodule; this module ties them together with
//! conversion extension traits so any push source can be viewed as a
//! pull-model publisher and back.
//!
//! Going push to pull, demand is enforced: the publisher wrappers track
//! outstanding demand per subscriber and turn every protocol breach into a
//! terminal [`ProtocolError`](crate::error::ProtocolError). Going pull to
//! push, demand is translated: subscriber requests become producer requests
//! through the serializing demand gate.

use std::sync::Arc;

use crate::completable::Completable;
use crate::observable::{Observable, SubscriptionLike};
use crate::single::Single;
use crate::streams::{Publisher, Subscription};

mod completable;
mod observable;
mod processor;
mod publisher;
mod single;

pub use completable::{CompletableAsPublisher, PublisherAsCompletable};
pub use observable::PublisherAsObservable;
pub use processor::SubjectProcessor;
pub use publisher::ObservableAsPublisher;
pub use single::{PublisherAsSingle, SingleAsPublisher};

/// View any push source as a pull-model publisher.
pub trait IntoPublisher<Item, Err>: Observable<Item, Err> + Sized {
  fn into_publisher(self) -> ObservableAsPublisher<Self, Item, Err> {
    ObservableAsPublisher::new(self)
  }
}

impl<T, Item, Err> IntoPublisher<Item, Err> for T where T: Observable<Item, Err> {}

/// View any pull-model publisher as a push source, a single or a
/// terminal-only stream.
pub trait PublisherExt<Item, Err>: Publisher<Item, Err> + Sized {
  fn into_observable(self) -> PublisherAsObservable<Self> {
    PublisherAsObservable::new(self)
  }

  fn into_single(self) -> PublisherAsSingle<Self> { PublisherAsSingle::new(self) }

  fn into_completable(self) -> PublisherAsCompletable<Self, Item> {
    PublisherAsCompletable::new(self)
  }
}

impl<T, Item, Err> PublisherExt<Item, Err> for T where T: Publisher<Item, Err> {}

/// View a single-value source as a pull-model publisher.
///
/// The returned wrapper pins `Err` so sources generic over the error type
/// (`just`, say) still infer it from where the publisher ends up used.
pub trait SingleIntoPublisher<Item, Err>: Single<Item, Err> + Sized {
  fn into_publisher(self) -> SingleAsPublisher<Self, Err> { SingleAsPublisher::new(self) }
}

impl<T, Item, Err> SingleIntoPublisher<Item, Err> for T where T: Single<Item, Err> {}

/// View a terminal-only source as a pull-model publisher of any item type.
pub trait CompletableIntoPublisher<Err>: Completable<Err> + Sized {
  fn into_publisher(self) -> CompletableAsPublisher<Self, Err> {
    CompletableAsPublisher::new(self)
  }
}

impl<T, Err> CompletableIntoPublisher<Err> for T where T: Completable<Err> {}

/// Teardown cancelling a pull-model subscription when its owner goes away.
pub(crate) struct CancelLink {
  subscription: Arc<dyn Subscription>,
  cancelled: bool,
}

impl CancelLink {
  pub(crate) fn new(subscription: Arc<dyn Subscription>) -> Self {
    Self { subscription, cancelled: false }
  }
}

impl SubscriptionLike for CancelLink {
  fn unsubscribe(&mut self) {
    if !self.cancelled {
      self.cancelled = true;
      self.subscription.cancel();
    }
  }

  fn is_closed(&self) -> bool { self.cancelled }
}
