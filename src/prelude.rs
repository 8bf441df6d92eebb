//! Everything a typical user needs, in one import.

pub use crate::adapter::{
  CompletableAsPublisher, CompletableIntoPublisher, IntoPublisher, ObservableAsPublisher,
  PublisherAsCompletable, PublisherAsObservable, PublisherAsSingle, PublisherExt,
  SingleAsPublisher, SingleIntoPublisher, SubjectProcessor,
};
pub use crate::completable::{
  Completable, CompletableExt, CompletableObserver, CompletableSubscriber,
};
pub use crate::error::{ProtocolError, StreamError};
pub use crate::observable::{
  create, empty, from_iter, throw, Observable, ObservableExt, Producer, PushSubscriber,
  SubscriptionLike,
};
pub use crate::observer::{FnObserver, Observer};
pub use crate::producer::SyncProducer;
pub use crate::single::{Single, SingleExt, SingleObserver, SingleSubscriber};
pub use crate::streams::{
  Publisher, Subscriber, SubscriberRef, Subscription, UNBOUNDED,
};
pub use crate::subject::Subject;
