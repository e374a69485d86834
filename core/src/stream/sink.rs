// sluice/src/stream/sink.rs

//! Consumers for streams coming out of a control stage.

use crate::error::SinkError;

use async_trait::async_trait;
use futures::{Stream, StreamExt};

/// Drives a stream of `Result<T, E>` to a single outcome.
///
/// An `Err(reason)` element ends consumption with `SinkError::Aborted(reason)`.
#[async_trait]
pub trait Sink<T, E>: Send
where
  T: Send + 'static,
  E: Send + 'static,
{
  type Output: Send;

  async fn run<S>(self, stream: S) -> Result<Self::Output, SinkError<E>>
  where
    S: Stream<Item = Result<T, E>> + Send + 'static;
}

/// Keeps the last element; fails with `SinkError::Empty` if there was none.
#[derive(Debug, Clone, Copy, Default)]
pub struct Last;

#[async_trait]
impl<T, E> Sink<T, E> for Last
where
  T: Send + 'static,
  E: Send + 'static,
{
  type Output = T;

  async fn run<S>(self, stream: S) -> Result<T, SinkError<E>>
  where
    S: Stream<Item = Result<T, E>> + Send + 'static,
  {
    let mut stream = Box::pin(stream);
    let mut last = None;
    while let Some(item) = stream.next().await {
      last = Some(item.map_err(SinkError::Aborted)?);
    }
    last.ok_or(SinkError::Empty)
  }
}

/// Collects every element in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collect;

#[async_trait]
impl<T, E> Sink<T, E> for Collect
where
  T: Send + 'static,
  E: Send + 'static,
{
  type Output = Vec<T>;

  async fn run<S>(self, stream: S) -> Result<Vec<T>, SinkError<E>>
  where
    S: Stream<Item = Result<T, E>> + Send + 'static,
  {
    let mut stream = Box::pin(stream);
    let mut collected = Vec::new();
    while let Some(item) = stream.next().await {
      collected.push(item.map_err(SinkError::Aborted)?);
    }
    Ok(collected)
  }
}
