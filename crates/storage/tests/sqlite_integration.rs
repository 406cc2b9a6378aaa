use chrono::Duration;
use storage::repository::{
    CompletionRepository, MaterialRecord, NewSubjectRecord, NewTopicRecord, StorageError,
    SubjectRepository, TopicRepository,
};
use storage::sqlite::SqliteRepository;
use study_core::model::{CompletionRecord, SessionDuration, SubjectId};
use study_core::time::fixed_now;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    SqliteRepository::open(&url).await.expect("open")
}

#[tokio::test]
async fn sqlite_catalog_roundtrip() {
    let repo = connect("memdb_catalog").await;
    let now = fixed_now();

    let older = repo
        .insert_subject(NewSubjectRecord {
            name: "History".into(),
            description: Some("Modern era".into()),
            created_at: now,
        })
        .await
        .unwrap();
    let newer = repo
        .insert_subject(NewSubjectRecord {
            name: "Chemistry".into(),
            description: None,
            created_at: now + Duration::minutes(1),
        })
        .await
        .unwrap();

    let subjects = repo.list_subjects().await.unwrap();
    assert_eq!(subjects.len(), 2);
    assert_eq!(subjects[0].id(), newer);
    assert_eq!(subjects[1].description(), Some("Modern era"));

    let topic = repo
        .insert_topic(NewTopicRecord {
            subject_id: older,
            name: "Industrial revolution".into(),
            description: None,
            created_at: now,
        })
        .await
        .unwrap();

    let fetched = repo.get_topic(topic).await.unwrap().expect("topic");
    assert_eq!(fetched.subject_id(), older);
    assert!(!fetched.has_content());

    repo.attach_material(MaterialRecord {
        topic_id: topic,
        content: "Steam engines changed production.".into(),
        source_file: Some("notes.txt".into()),
        created_at: now,
    })
    .await
    .unwrap();

    let topics = repo.list_topics(older).await.unwrap();
    assert_eq!(topics.len(), 1);
    assert!(topics[0].has_content());
    assert!(repo.list_topics(newer).await.unwrap().is_empty());

    let material = repo.latest_material(topic).await.unwrap().expect("material");
    assert_eq!(material.content, "Steam engines changed production.");
}

#[tokio::test]
async fn sqlite_rejects_topic_for_missing_subject() {
    let repo = connect("memdb_missing_subject").await;
    let err = repo
        .insert_topic(NewTopicRecord {
            subject_id: SubjectId::new(404),
            name: "Ghost".into(),
            description: None,
            created_at: fixed_now(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_history_and_statistics() {
    let repo = connect("memdb_history").await;
    let now = fixed_now();
    let subject = repo
        .insert_subject(NewSubjectRecord {
            name: "Biology".into(),
            description: None,
            created_at: now,
        })
        .await
        .unwrap();
    let topic = repo
        .insert_topic(NewTopicRecord {
            subject_id: subject,
            name: "Cells".into(),
            description: None,
            created_at: now,
        })
        .await
        .unwrap();

    let perfect = CompletionRecord {
        topic_id: topic,
        duration: SessionDuration::Five,
        score: 3,
        total_questions: 3,
    };
    let poor = CompletionRecord {
        score: 0,
        duration: SessionDuration::Fifteen,
        ..perfect
    };
    repo.append_completion(&perfect, now).await.unwrap();
    let last = repo
        .append_completion(&poor, now + Duration::hours(2))
        .await
        .unwrap();

    let history = repo.history_for_subject(subject).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, last);
    assert_eq!(history[0].duration, SessionDuration::Fifteen);
    assert_eq!(history[0].subject_name, "Biology");
    assert_eq!(history[1].topic_name, "Cells");

    let stats = repo.topic_statistics(topic).await.unwrap();
    assert_eq!(stats.session_count, 2);
    assert_eq!(stats.avg_performance, Some(0.5));
    assert_eq!(stats.last_studied, Some(now + Duration::hours(2)));
}
