//! Lazy, cancellable enumeration results.

use crate::error::Result;
use futures::{Stream, TryStreamExt};
use std::ops::ControlFlow;
use std::pin::Pin;

/// One event of an enumeration.
///
/// A [`CountHint`](Self::CountHint), if any, arrives before the first
/// [`Item`](Self::Item). The hint is best-effort and may disagree with the
/// number of items actually delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent<T> {
    CountHint(u64),
    Item(T),
}

impl<T> ListEvent<T> {
    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Item(item) => Some(item),
            Self::CountHint(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ListEvent<U> {
        match self {
            Self::CountHint(count) => ListEvent::CountHint(count),
            Self::Item(item) => ListEvent::Item(f(item)),
        }
    }
}

/// A lazy listing. Dropping it cancels the enumeration; nothing further is
/// fetched and nothing is reported as a failure.
pub type Listing<'a, T> = Pin<Box<dyn Stream<Item = Result<ListEvent<T>>> + Send + 'a>>;

/// Drive a listing through a visitor until it ends or the visitor breaks.
///
/// Returns `true` if the listing was consumed to its end.
pub async fn visit<T>(mut listing: Listing<'_, T>, mut visitor: impl FnMut(ListEvent<T>) -> ControlFlow<()>) -> Result<bool> {
    while let Some(event) = listing.try_next().await? {
        if visitor(event).is_break() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Consume a whole listing, returning the count hint (if any) and the items.
pub async fn collect<T>(listing: Listing<'_, T>) -> Result<(Option<u64>, Vec<T>)> {
    let mut hint = None;
    let mut items = Vec::new();
    listing
        .try_for_each(|event| {
            match event {
                ListEvent::CountHint(count) => hint = Some(count),
                ListEvent::Item(item) => items.push(item),
            }
            futures::future::ready(Ok(()))
        })
        .await?;
    Ok((hint, items))
}

/// A listing of already-known items, with the item count as its hint.
pub fn from_items<'a, T: Send + 'a>(items: Vec<T>) -> Listing<'a, T> {
    let hint = std::iter::once(ListEvent::CountHint(items.len() as u64));
    let events = hint.chain(items.into_iter().map(ListEvent::Item)).map(Ok);
    Box::pin(futures::stream::iter(events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};

    #[tokio::test]
    async fn from_items_hints_first() {
        let events: Vec<_> = from_items(vec!["a", "b"]).try_collect().await.unwrap();
        assert_eq!(events, vec![ListEvent::CountHint(2), ListEvent::Item("a"), ListEvent::Item("b")]);
    }

    #[tokio::test]
    async fn collect_splits_hint_and_items() {
        let (hint, items) = collect(from_items(vec![1, 2, 3])).await.unwrap();
        assert_eq!(hint, Some(3));
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn visit_stops_on_break() {
        let mut seen = Vec::new();
        let complete = visit(from_items(vec![1, 2, 3]), |event| {
            if let ListEvent::Item(item) = event {
                seen.push(item);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })
        .await
        .unwrap();
        assert!(!complete);
        assert_eq!(seen, vec![1]);
    }

    #[tokio::test]
    async fn visit_stops_before_a_later_failure() {
        let events = vec![Ok(ListEvent::Item(1)), Err(Error::from(ErrorKind::Unavailable))];
        let listing: Listing<'_, i32> = Box::pin(futures::stream::iter(events));
        let mut seen = 0;
        let complete = visit(listing, |_| {
            seen += 1;
            ControlFlow::Break(())
        })
        .await
        .unwrap();
        assert!(!complete);
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn visit_propagates_failure() {
        let events: Vec<Result<ListEvent<i32>>> = vec![Err(Error::from(ErrorKind::Unavailable))];
        let err = visit(Box::pin(futures::stream::iter(events)), |_| ControlFlow::Continue(())).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Unavailable);
    }
}
