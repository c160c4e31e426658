//! The two external capabilities the ingestion loop depends on.
//!
//! [`TwitterClient`] and [`Storage`] implement them for production; tests
//! substitute in-memory fakes.

use std::future::Future;

use tidewatch_search::{SearchField, TwitterClient};
use tidewatch_shared::{MentionRecord, Result, SearchItem};
use tidewatch_storage::Storage;

/// Something that can run a bounded search.
pub trait MentionSource {
    /// Return at most one page of items matching `query`, in source order.
    fn search(
        &self,
        query: &str,
        max_results: u32,
    ) -> impl Future<Output = Result<Vec<SearchItem>>>;
}

/// Something that can look up and persist mentions by natural key.
pub trait MentionStore {
    /// Find an existing record for `external_id`.
    fn find_by_key(
        &self,
        external_id: &str,
    ) -> impl Future<Output = Result<Option<MentionRecord>>>;

    /// Insert `record` unless its key is already present. Returns `true` if
    /// a row was written.
    fn insert(&self, record: &MentionRecord) -> impl Future<Output = Result<bool>>;

    /// Release the underlying connection.
    fn close(self)
    where
        Self: Sized,
    {
    }
}

impl MentionSource for TwitterClient {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchItem>> {
        self.search_recent(query, max_results, &SearchField::INGEST)
            .await
    }
}

impl<T: MentionSource> MentionSource for &T {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<SearchItem>> {
        (**self).search(query, max_results).await
    }
}

impl MentionStore for Storage {
    async fn find_by_key(&self, external_id: &str) -> Result<Option<MentionRecord>> {
        self.find_mention(external_id).await
    }

    async fn insert(&self, record: &MentionRecord) -> Result<bool> {
        self.insert_mention(record).await
    }

    fn close(self) {
        Storage::close(self);
    }
}

/// Borrowed stores are never closed by the loop; the owner closes them.
impl<T: MentionStore> MentionStore for &T {
    async fn find_by_key(&self, external_id: &str) -> Result<Option<MentionRecord>> {
        (**self).find_by_key(external_id).await
    }

    async fn insert(&self, record: &MentionRecord) -> Result<bool> {
        (**self).insert(record).await
    }
}
