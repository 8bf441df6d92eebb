//! Error taxonomy of the bridge.
//!
//! Protocol violations are terminal: they are delivered through the pull
//! side's error channel and accompanied by cancellation of the link, never
//! retried. Upstream failures pass through verbatim as `Source`.

use thiserror::Error;

/// A violation of the pull-model protocol, detected by the bridge itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
  /// `Subscription::request` was called with zero demand (rule 3.9; negative
  /// amounts are unrepresentable with `u64`).
  #[error("request amount must be positive")]
  NonPositiveRequest,
  /// The same subscriber handle was subscribed to a publisher twice
  /// (rule 1.10).
  #[error("subscriber cannot subscribe more than once")]
  DuplicateSubscription,
  /// The wrapped push source emitted an item while outstanding demand was
  /// zero (rule 1.1). Fatal for the subscription; the source is detached.
  #[error("source emitted an item without outstanding demand")]
  MissingDemand,
  /// A single-value source completed without producing a value.
  #[error("source completed without emitting a value")]
  Empty,
  /// A single-value source emitted more than one value.
  #[error("source emitted more than one value")]
  TooManyValues,
}

/// Wire error of an adapted stream: either a protocol violation raised by the
/// bridge or a failure of the underlying source, passed through untouched.
///
/// Adapters are generic over any error type implementing
/// `From<ProtocolError>`; this enum is the ready-made choice when the source
/// error type does not absorb protocol violations itself.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StreamError<E> {
  #[error(transparent)]
  Protocol(#[from] ProtocolError),
  #[error("source failure")]
  Source(E),
}

impl<E> StreamError<E> {
  /// True for errors raised by the bridge rather than the source.
  pub fn is_protocol(&self) -> bool { matches!(self, StreamError::Protocol(_)) }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn protocol_error_converts_into_stream_error() {
    let err: StreamError<&str> = ProtocolError::MissingDemand.into();
    assert_eq!(err, StreamError::Protocol(ProtocolError::MissingDemand));
    assert!(err.is_protocol());
    assert!(!StreamError::Source("boom").is_protocol());
  }

  #[test]
  fn display_is_meaningful() {
    let msg = format!("{}", StreamError::<()>::from(ProtocolError::NonPositiveRequest));
    assert_eq!(msg, "request amount must be positive");
  }
}
