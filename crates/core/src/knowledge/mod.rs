//! Read-only knowledge consulted by the answering handlers.

pub mod catalog;
pub mod dialogs;
pub mod topics;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::KnowledgeConfig;
use crate::domain::course::{CourseFacts, CourseTrack, FocusVocabulary};
use crate::domain::intent::IntentCategory;

pub use catalog::{CourseCatalog, CourseRecord, OneOrMany, MAX_RECOMMENDATIONS};
pub use dialogs::{DialogueExample, DialogueStore};
pub use topics::TopicStore;

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("could not read knowledge file `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse course catalog `{path}`: {source}")]
    ParseCatalog { path: PathBuf, source: serde_json::Error },
}

pub trait KnowledgeSource: Send + Sync {
    /// Stored dialogues close to `question`, closest first.
    fn dialogue_candidates(&self, question: &str, limit: usize) -> Vec<DialogueExample>;
    fn topic_section(&self, category: IntentCategory) -> Option<String>;
    /// Catalog entries matching the collected facts; the caller picks what to show.
    fn recommend_courses(&self, facts: &CourseFacts) -> Vec<CourseRecord>;
    fn focus_vocabulary(&self) -> FocusVocabulary;
}

#[derive(Clone, Debug)]
pub struct KnowledgeBase {
    dialogues: DialogueStore,
    topics: TopicStore,
    retraining: CourseCatalog,
    upskilling: CourseCatalog,
    vocabulary: FocusVocabulary,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::new(
            DialogueStore::default(),
            TopicStore::default(),
            CourseCatalog::empty(CourseTrack::Retraining),
            CourseCatalog::empty(CourseTrack::Upskilling),
        )
    }
}

fn read_file(path: &Path) -> Result<String, KnowledgeError> {
    fs::read_to_string(path).map_err(|source| KnowledgeError::Read { path: path.to_path_buf(), source })
}

fn read_catalog(track: CourseTrack, path: &Path) -> Result<CourseCatalog, KnowledgeError> {
    let raw = read_file(path)?;
    CourseCatalog::parse(track, &raw)
        .map_err(|source| KnowledgeError::ParseCatalog { path: path.to_path_buf(), source })
}

impl KnowledgeBase {
    pub fn new(
        dialogues: DialogueStore,
        topics: TopicStore,
        retraining: CourseCatalog,
        upskilling: CourseCatalog,
    ) -> Self {
        let mut vocabulary = FocusVocabulary::default();
        vocabulary.extend_with_keywords(retraining.profession_keywords());
        vocabulary.extend_with_keywords(upskilling.profession_keywords());
        Self { dialogues, topics, retraining, upskilling, vocabulary }
    }

    pub fn load(config: &KnowledgeConfig) -> Result<Self, KnowledgeError> {
        let dialogues = DialogueStore::parse(&read_file(&config.dialogs_path)?);
        let topics = TopicStore::parse(&read_file(&config.topics_path)?);
        let retraining = read_catalog(CourseTrack::Retraining, &config.retraining_catalog_path)?;
        let upskilling = read_catalog(CourseTrack::Upskilling, &config.upskilling_catalog_path)?;
        Ok(Self::new(dialogues, topics, retraining, upskilling))
    }

    pub fn dialogue_count(&self) -> usize {
        self.dialogues.len()
    }

    pub fn course_count(&self) -> usize {
        self.retraining.courses().len() + self.upskilling.courses().len()
    }
}

impl KnowledgeSource for KnowledgeBase {
    fn dialogue_candidates(&self, question: &str, limit: usize) -> Vec<DialogueExample> {
        self.dialogues.candidates(question, limit).into_iter().cloned().collect()
    }

    fn topic_section(&self, category: IntentCategory) -> Option<String> {
        self.topics.section(category).map(str::to_owned)
    }

    fn recommend_courses(&self, facts: &CourseFacts) -> Vec<CourseRecord> {
        let catalog = match facts.track {
            Some(CourseTrack::Retraining) => &self.retraining,
            Some(CourseTrack::Upskilling) => &self.upskilling,
            None => return Vec::new(),
        };
        catalog.recommend(facts).into_iter().cloned().collect()
    }

    fn focus_vocabulary(&self) -> FocusVocabulary {
        self.vocabulary.clone()
    }
}
