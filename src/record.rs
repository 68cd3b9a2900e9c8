use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("field '{0}' is required")]
    MissingField(&'static str),
}

/// A poem as held by the document store.
///
/// `id` is assigned by the store on insert and is never sent to the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub dataset: String,
    #[serde(default)]
    pub dataset_id: String,
    pub title: String,
    pub poem: String,
    #[serde(default)]
    pub poet: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub language: String,
}

/// Search index view of a poem, without the store id
#[derive(Debug, Serialize)]
pub struct SearchDocument<'a> {
    pub dataset: &'a str,
    pub dataset_id: &'a str,
    pub title: &'a str,
    pub poem: &'a str,
    pub poet: &'a str,
    pub tags: &'a [String],
    pub language: &'a str,
}

impl Poem {
    pub fn search_document(&self) -> SearchDocument<'_> {
        SearchDocument {
            dataset: &self.dataset,
            dataset_id: &self.dataset_id,
            title: &self.title,
            poem: &self.poem,
            poet: &self.poet,
            tags: &self.tags,
            language: &self.language,
        }
    }
}

/// Poem as submitted by API users and import files: tags arrive comma-separated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoemRequest {
    #[serde(default)]
    pub dataset: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub poem: String,
    #[serde(default)]
    pub poet: String,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub dataset_id: String,
}

impl PoemRequest {
    /// Validate required fields and convert into a [`Poem`]
    pub fn into_poem(self) -> Result<Poem, RecordError> {
        if self.title.trim().is_empty() {
            return Err(RecordError::MissingField("title"));
        }
        if self.poem.trim().is_empty() {
            return Err(RecordError::MissingField("poem"));
        }
        if self.language.trim().is_empty() {
            return Err(RecordError::MissingField("language"));
        }

        let tags = split_tags(&self.tags);

        Ok(Poem {
            id: None,
            dataset: self.dataset,
            dataset_id: self.dataset_id,
            title: self.title,
            poem: self.poem,
            poet: self.poet,
            tags,
            language: self.language,
        })
    }
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}
