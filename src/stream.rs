//! Cursor-backed row and record streams.
//!
//! A stream owns the server cursor until it is exhausted, yields an error, is
//! closed, or is dropped. In every case the underlying driver stream is dropped
//! exactly once, which frees the cursor for the next command.

use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use futures_util::stream::{BoxStream, Stream, StreamExt};

use crate::error::SprocError;
use crate::mapping::{MapStrategy, Record};
use crate::results::{CustomDbRow, ResultSet};

/// Lazy, single-pass sequence of raw rows.
pub struct RowStream<'a> {
    columns: Arc<Vec<String>>,
    inner: Option<BoxStream<'a, Result<CustomDbRow, SprocError>>>,
}

impl<'a> RowStream<'a> {
    #[must_use]
    pub fn new(
        columns: Arc<Vec<String>>,
        inner: BoxStream<'a, Result<CustomDbRow, SprocError>>,
    ) -> Self {
        Self {
            columns,
            inner: Some(inner),
        }
    }

    /// Column names of the result set, empty if the server sent none.
    #[must_use]
    pub fn columns(&self) -> &Arc<Vec<String>> {
        &self.columns
    }

    /// True once the cursor has been released.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Release the cursor without reading the remaining rows.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.inner.take().is_some() {
            tracing::trace!(columns = self.columns.len(), "row cursor released");
        }
    }

    /// Drain the stream into a result set.
    ///
    /// # Errors
    ///
    /// Returns the first row error; the cursor is released either way.
    pub async fn collect_result_set(mut self) -> Result<ResultSet, SprocError> {
        let mut result_set = ResultSet::new(self.columns.as_ref().clone());
        while let Some(row) = self.next().await {
            result_set.add_row_values(row?.rows)?;
        }
        Ok(result_set)
    }
}

impl Stream for RowStream<'_> {
    type Item = Result<CustomDbRow, SprocError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        match ready!(inner.as_mut().poll_next(cx)) {
            Some(Ok(row)) => Poll::Ready(Some(Ok(row))),
            Some(Err(e)) => {
                this.release();
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.release();
                Poll::Ready(None)
            }
        }
    }
}

impl std::fmt::Debug for RowStream<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("columns", &self.columns)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Lazy, single-pass sequence of mapped records.
///
/// A row that fails to map releases the cursor before the error is yielded, so the
/// stream ends after it.
pub struct RecordStream<'a, T> {
    rows: RowStream<'a>,
    strategy: MapStrategy,
    _record: PhantomData<fn() -> T>,
}

impl<'a, T: Record> RecordStream<'a, T> {
    #[must_use]
    pub fn new(rows: RowStream<'a>, strategy: MapStrategy) -> Self {
        Self {
            rows,
            strategy,
            _record: PhantomData,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &Arc<Vec<String>> {
        self.rows.columns()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.rows.is_closed()
    }

    /// Release the cursor without reading the remaining rows.
    pub fn close(self) {
        self.rows.close();
    }
}

impl<T: Record> Stream for RecordStream<'_, T> {
    type Item = Result<T, SprocError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match ready!(this.rows.poll_next_unpin(cx)) {
            Some(Ok(row)) => {
                let mapped = this.strategy.map_row::<T>(&row);
                if mapped.is_err() {
                    this.rows.release();
                }
                Poll::Ready(Some(mapped))
            }
            Some(Err(e)) => Poll::Ready(Some(Err(e))),
            None => Poll::Ready(None),
        }
    }
}
