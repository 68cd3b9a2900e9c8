use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccumulatorError {
    #[error("failed to serialize document #{position}: {source}")]
    Serialize {
        position: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// A sealed bulk request body: newline-delimited `(directive, document)` pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkBatch {
    body: String,
    documents: usize,
}

impl BulkBatch {
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }

    /// Number of documents in the batch
    pub fn documents(&self) -> usize {
        self.documents
    }

    /// Serialized size in bytes
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Packs serialized records into size-bounded bulk batches.
///
/// Every record is written as an `{"index":{"_index":...}}` line followed by
/// the document line. Once the buffer grows past `threshold` bytes it is
/// sealed and handed back from `push`; `finish` seals whatever is left.
/// A record that fails to serialize leaves the buffer untouched.
pub struct BatchAccumulator {
    directive: String,
    threshold: usize,
    buffer: String,
    documents: usize,
    position: usize,
}

impl BatchAccumulator {
    pub fn new(index: &str, threshold: usize) -> Self {
        let mut directive = serde_json::json!({ "index": { "_index": index } }).to_string();
        directive.push('\n');

        Self {
            directive,
            threshold,
            buffer: String::new(),
            documents: 0,
            position: 0,
        }
    }

    /// Append one record, returning a sealed batch if the threshold was crossed
    pub fn push<R: Serialize + ?Sized>(
        &mut self,
        record: &R,
    ) -> Result<Option<BulkBatch>, AccumulatorError> {
        let document = serde_json::to_string(record).map_err(|source| {
            AccumulatorError::Serialize {
                position: self.position,
                source,
            }
        })?;
        self.position += 1;

        self.buffer.push_str(&self.directive);
        self.buffer.push_str(&document);
        self.buffer.push('\n');
        self.documents += 1;

        if self.buffer.len() > self.threshold {
            Ok(Some(self.seal()))
        } else {
            Ok(None)
        }
    }

    /// Seal the remaining buffer, if any
    pub fn finish(mut self) -> Option<BulkBatch> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.seal())
        }
    }

    /// Bytes buffered but not yet sealed
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    fn seal(&mut self) -> BulkBatch {
        BulkBatch {
            body: std::mem::take(&mut self.buffer),
            documents: std::mem::replace(&mut self.documents, 0),
        }
    }
}
