use std::collections::{BTreeMap, BTreeSet};

use connector_core::ConnectorError;
use connector_ragflow::RagflowClient;
use serde::Deserialize;
use tracing::{debug, warn};

/// Titles cited by a knowledge-retrieval result, grouped by the dataset id
/// the retrieval side reported. Each title appears once per group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CitedDocuments {
    groups: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Deserialize)]
struct RetrievalResult {
    result: Vec<RetrievalChunk>,
}

#[derive(Deserialize)]
struct RetrievalChunk {
    title: String,
    metadata: ChunkMetadata,
}

#[derive(Deserialize)]
struct ChunkMetadata {
    dataset_id: String,
}

impl CitedDocuments {
    /// Parses `{"result": [{"title": .., "metadata": {"dataset_id": ..}}, ..]}`.
    pub fn from_retrieval_json(raw: &str) -> Result<Self, ConnectorError> {
        let parsed: RetrievalResult = serde_json::from_str(raw)
            .map_err(|e| ConnectorError::Decode(format!("invalid retrieval result: {e}")))?;
        let mut cited = Self::default();
        for chunk in parsed.result {
            cited.insert(chunk.metadata.dataset_id, chunk.title);
        }
        Ok(cited)
    }

    pub fn insert(&mut self, dataset_id: impl Into<String>, title: impl Into<String>) {
        self.groups
            .entry(dataset_id.into())
            .or_default()
            .insert(title.into());
    }

    pub fn groups(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.groups
    }

    /// Number of (group, title) pairs.
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Document lookup by exact name within a dataset.
pub trait DocumentLookup {
    fn find_document_id(
        &self,
        dataset_id: &str,
        name: &str,
    ) -> Result<Option<String>, ConnectorError>;

    fn document_url(&self, dataset_id: &str, document_id: &str) -> String;
}

impl DocumentLookup for RagflowClient {
    fn find_document_id(
        &self,
        dataset_id: &str,
        name: &str,
    ) -> Result<Option<String>, ConnectorError> {
        RagflowClient::find_document_id(self, dataset_id, name)
    }

    fn document_url(&self, dataset_id: &str, document_id: &str) -> String {
        RagflowClient::document_url(self, dataset_id, document_id)
    }
}

/// Resolves every cited title to a document URL in `target_dataset_id`.
///
/// Each unique (group, title) pair is looked up once. The retrieval-side
/// dataset id is not mapped to a RAGFlow dataset; all lookups go to
/// `target_dataset_id`. Titles without a match are skipped.
pub fn resolve_document_links<L>(
    lookup: &L,
    target_dataset_id: &str,
    cited: &CitedDocuments,
) -> Result<Vec<String>, ConnectorError>
where
    L: DocumentLookup + ?Sized,
{
    let mut urls = Vec::with_capacity(cited.len());
    for (group, titles) in cited.groups() {
        for title in titles {
            match lookup.find_document_id(target_dataset_id, title)? {
                Some(document_id) => {
                    debug!(
                        event = "cite.resolved",
                        domain = "cite",
                        group = %group,
                        title = %title,
                        document_id = %document_id
                    );
                    urls.push(lookup.document_url(target_dataset_id, &document_id));
                }
                None => warn!(
                    event = "cite.unmatched",
                    domain = "cite",
                    group = %group,
                    dataset_id = target_dataset_id,
                    title = %title,
                    "cited title has no matching document"
                ),
            }
        }
    }
    Ok(urls)
}
