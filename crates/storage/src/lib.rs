#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    CompletionRepository, InMemoryRepository, MaterialRecord, NewSubjectRecord, NewTopicRecord,
    Storage, StorageError, SubjectRepository, TopicRepository,
};
