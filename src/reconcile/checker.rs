use std::future::Future;

use futures::stream::{self, Stream, TryStreamExt};

use super::{ProviderContext, Reconciler};
use crate::alicloud::Page;
use crate::error::{ReconcileError, Result};
use crate::resource::AttributeSet;

/// Post-apply and post-destroy verification for one resource type.
pub struct Checker<'a, R: ?Sized> {
    reconciler: &'a R,
    ctx: &'a ProviderContext,
}

impl<'a, R: Reconciler + ?Sized> Checker<'a, R> {
    pub fn new(reconciler: &'a R, ctx: &'a ProviderContext) -> Self {
        Self { reconciler, ctx }
    }

    /// Fresh snapshot of the entity, or `None` when the vendor reports it missing.
    pub async fn exists(&self, id: &str) -> Result<Option<AttributeSet>> {
        self.reconciler.read(self.ctx, id).await
    }

    pub async fn ensure_destroyed(&self, id: &str) -> Result<()> {
        match self.exists(id).await? {
            None => Ok(()),
            Some(_) => Err(ReconcileError::StillPresent {
                resource_type: self.reconciler.resource_type().to_string(),
                id: id.to_string(),
            }),
        }
    }

    pub async fn ensure_all_destroyed<'i>(&self, ids: impl IntoIterator<Item = &'i str>) -> Result<()> {
        for id in ids {
            self.ensure_destroyed(id).await?;
        }
        Ok(())
    }
}

/// Lazily walks a marker-paginated listing.
///
/// `fetch` receives `None` for the first page and the previous page's marker
/// afterwards. The stream ends after the first page without a marker. Every
/// call starts a fresh walk; nothing is remembered between calls.
pub fn list_all<T, E, F, Fut>(mut fetch: F) -> impl Stream<Item = Result<T, E>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    stream::try_unfold(Some(None::<String>), move |cursor| {
        let next = cursor.map(&mut fetch);
        async move {
            let Some(page) = next else {
                return Ok::<_, E>(None);
            };
            let page = page.await?;
            let following = page.next_marker.map(Some);
            Ok(Some((page.items, following)))
        }
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok::<T, E>)))
    .try_flatten()
}

pub async fn collect_all<T, E, F, Fut>(fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
{
    list_all(fetch).try_collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::cell::RefCell;

    fn paged(total: usize, page_size: usize) -> Vec<Page<usize>> {
        let items: Vec<usize> = (0..total).collect();
        let chunks: Vec<Vec<usize>> = items.chunks(page_size).map(<[usize]>::to_vec).collect();
        let count = chunks.len();
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let marker = if i + 1 < count {
                    Some(format!("m{}", i + 1))
                } else {
                    Some(String::new())
                };
                Page::new(chunk, marker)
            })
            .collect()
    }

    fn fetcher(
        pages: Vec<Page<usize>>,
        seen: &RefCell<Vec<Option<String>>>,
    ) -> impl FnMut(Option<String>) -> futures::future::Ready<Result<Page<usize>, String>> + '_ {
        move |marker| {
            seen.borrow_mut().push(marker.clone());
            let index = match marker {
                None => 0,
                Some(m) => m[1..].parse::<usize>().unwrap(),
            };
            futures::future::ready(
                pages
                    .get(index)
                    .cloned()
                    .ok_or_else(|| format!("no page {}", index)),
            )
        }
    }

    #[tokio::test]
    async fn test_visits_every_item_once_regardless_of_page_size() {
        for page_size in [1, 2, 3, 7, 10, 25] {
            let seen = RefCell::new(Vec::new());
            let items = collect_all(fetcher(paged(10, page_size), &seen))
                .await
                .unwrap();
            assert_eq!(items, (0..10).collect::<Vec<_>>(), "page size {}", page_size);
            assert_eq!(seen.borrow().len(), 10usize.div_ceil(page_size));
            assert_eq!(seen.borrow()[0], None);
        }
    }

    #[tokio::test]
    async fn test_single_empty_page() {
        let seen = RefCell::new(Vec::new());
        let items = collect_all(fetcher(vec![Page::last(vec![])], &seen))
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(seen.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_listing_is_lazy() {
        let seen = RefCell::new(Vec::new());
        let stream = list_all(fetcher(paged(6, 2), &seen));
        futures::pin_mut!(stream);

        assert_eq!(stream.next().await, Some(Ok(0)));
        assert_eq!(seen.borrow().len(), 1, "second page must not be fetched yet");
        assert_eq!(stream.next().await, Some(Ok(1)));
        assert_eq!(stream.next().await, Some(Ok(2)));
        assert_eq!(seen.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_each_call_restarts_pagination() {
        let seen = RefCell::new(Vec::new());
        let pages = paged(4, 2);
        let first = collect_all(fetcher(pages.clone(), &seen)).await.unwrap();
        let second = collect_all(fetcher(pages, &seen)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            *seen.borrow(),
            vec![None, Some("m1".to_string()), None, Some("m1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_page_error_ends_listing() {
        let seen = RefCell::new(Vec::new());
        let mut pages = paged(4, 2);
        pages.truncate(1);
        let result = collect_all(fetcher(pages, &seen)).await;
        assert_eq!(result, Err("no page 1".to_string()));
    }
}
