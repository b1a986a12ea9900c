use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lingo_core::model::{LearnerId, Level, LevelId, PronunciationItem, Quiz, UserProgress};
use lingo_core::pronunciation::{PracticeError, PracticeState, PronunciationFeedback};
use lingo_core::quiz::{QuizError, SubmitOutcome, Verdict};
use lingo_core::time::fixed_now;
use services::speech::{AudioClip, FixedScorer, SimulatedScorer};
use services::{
    AppConfig, AppServices, Clock, LevelService, PracticeService, PracticeServiceError,
    ProgressService, QuizLoopService, QuizServiceError, ScoringError,
};
use storage::repository::{
    InMemoryRepository, LevelRepository, ProgressPatch, ProgressRepository, StorageError,
};

fn level(id: u32, questions: usize) -> Level {
    Level {
        id: LevelId::new(id),
        title: format!("Level {id}"),
        quizzes: (0..questions)
            .map(|i| Quiz {
                options: vec!["right".into(), "wrong".into()],
                correct: "right".into(),
                audio: format!("q{i}"),
            })
            .collect(),
        pronunciations: vec![
            PronunciationItem {
                word: "你好".into(),
                pinyin: "nǐ hǎo".into(),
                translation: "hello".into(),
                tips: String::new(),
            },
            PronunciationItem {
                word: "谢谢".into(),
                pinyin: "xièxie".into(),
                translation: "thank you".into(),
                tips: String::new(),
            },
        ],
    }
}

struct Harness {
    repo: InMemoryRepository,
    progress: Arc<ProgressService>,
    quiz: QuizLoopService,
    practice: PracticeService,
}

async fn harness(progress_repo: Arc<dyn ProgressRepository>, repo: InMemoryRepository) -> Harness {
    for id in 1..=6 {
        repo.upsert_level(&level(id, 10)).await.unwrap();
    }
    let levels = Arc::new(LevelService::new(Arc::new(repo.clone())));
    let progress = Arc::new(ProgressService::new(Clock::fixed(fixed_now()), progress_repo));
    Harness {
        quiz: QuizLoopService::new(Arc::clone(&levels), Arc::clone(&progress)),
        practice: PracticeService::new(levels, Arc::clone(&progress), Arc::new(FixedScorer(80))),
        progress,
        repo,
    }
}

async fn in_memory_harness() -> Harness {
    let repo = InMemoryRepository::new();
    harness(Arc::new(repo.clone()), repo).await
}

async fn learner_at(h: &Harness, completed: u32) -> LearnerId {
    let learner = LearnerId::generate();
    h.progress.sign_up(learner).await.unwrap();
    for id in 1..=completed {
        h.progress
            .complete_level(learner, LevelId::new(id), None)
            .await
            .unwrap();
    }
    learner
}

#[tokio::test]
async fn finishing_the_gated_level_unlocks_the_next() {
    let h = in_memory_harness().await;
    let learner = learner_at(&h, 2).await;

    let mut attempt = h.quiz.start_quiz(learner, LevelId::new(3)).await.unwrap();
    let mut last = None;
    for i in 0..10 {
        attempt
            .select_answer(if i < 7 { "right" } else { "wrong" })
            .unwrap();
        last = Some(h.quiz.submit(&mut attempt).await.unwrap());
    }

    let last = last.unwrap();
    let SubmitOutcome::Completed(result) = last.outcome else {
        panic!("expected completion, got {:?}", last.outcome);
    };
    assert_eq!((result.score, result.total), (7, 10));
    assert_eq!(result.verdict(), Verdict::Pass);

    let report = last.completion.expect("completion persisted");
    assert_eq!(report.outcome.unlocked, Some(LevelId::new(4)));
    let stored = h.progress.load(learner).await.unwrap();
    assert_eq!(stored.current_level(), LevelId::new(4));
    assert_eq!(
        stored.completed_levels(),
        &BTreeSet::from([LevelId::new(1), LevelId::new(2), LevelId::new(3)])
    );
}

#[tokio::test]
async fn failing_score_still_completes_the_level() {
    let h = in_memory_harness().await;
    let learner = learner_at(&h, 0).await;

    let mut attempt = h.quiz.start_quiz(learner, LevelId::FIRST).await.unwrap();
    while !attempt.is_complete() {
        attempt.select_answer("wrong").unwrap();
        h.quiz.submit(&mut attempt).await.unwrap();
    }

    assert_eq!(attempt.result().unwrap().verdict(), Verdict::Effort);
    let stored = h.progress.load(learner).await.unwrap();
    assert_eq!(stored.current_level(), LevelId::new(2));
}

#[tokio::test]
async fn replaying_an_earlier_level_keeps_the_gate() {
    let h = in_memory_harness().await;
    let learner = learner_at(&h, 4).await;
    let before = h.progress.load(learner).await.unwrap();
    assert_eq!(before.current_level(), LevelId::new(5));

    let mut attempt = h.quiz.start_quiz(learner, LevelId::new(2)).await.unwrap();
    while !attempt.is_complete() {
        attempt.select_answer("wrong").unwrap();
        h.quiz.submit(&mut attempt).await.unwrap();
    }

    let report = attempt.completion().unwrap();
    assert!(report.outcome.is_noop());
    let after = h.progress.load(learner).await.unwrap();
    assert_eq!(after.current_level(), LevelId::new(5));
    assert_eq!(after.completed_levels(), before.completed_levels());
    assert_eq!(after.version(), before.version());
}

#[tokio::test]
async fn levels_above_the_gate_are_locked() {
    let h = in_memory_harness().await;
    let learner = learner_at(&h, 0).await;

    let err = h.quiz.start_quiz(learner, LevelId::new(2)).await.unwrap_err();
    assert!(matches!(
        err,
        QuizServiceError::Locked { level, current } if level == LevelId::new(2) && current == LevelId::FIRST
    ));

    let err = h
        .practice
        .start_practice(learner, LevelId::new(3))
        .await
        .unwrap_err();
    assert!(matches!(err, PracticeServiceError::Locked { .. }));
}

#[tokio::test]
async fn submit_without_selection_and_after_completion_are_rejected() {
    let h = in_memory_harness().await;
    h.repo.upsert_level(&level(1, 1)).await.unwrap();
    let learner = learner_at(&h, 0).await;

    let mut attempt = h.quiz.start_quiz(learner, LevelId::FIRST).await.unwrap();
    assert!(matches!(
        h.quiz.submit(&mut attempt).await.unwrap_err(),
        QuizServiceError::Quiz(QuizError::NoSelection)
    ));

    attempt.select_answer("right").unwrap();
    h.quiz.submit(&mut attempt).await.unwrap();
    assert!(matches!(
        h.quiz.submit(&mut attempt).await.unwrap_err(),
        QuizServiceError::Quiz(QuizError::Completed)
    ));
    assert!(attempt.select_answer("right").is_err());
}

#[tokio::test]
async fn level_without_quizzes_cannot_start() {
    let h = in_memory_harness().await;
    h.repo.upsert_level(&level(1, 0)).await.unwrap();
    let learner = learner_at(&h, 0).await;

    assert!(matches!(
        h.quiz.start_quiz(learner, LevelId::FIRST).await.unwrap_err(),
        QuizServiceError::Quiz(QuizError::Empty)
    ));
}

/// Fails the first `failures` patches with a connection error.
struct FlakyRepo {
    inner: InMemoryRepository,
    failures: AtomicU32,
    patches: AtomicU32,
}

#[async_trait]
impl ProgressRepository for FlakyRepo {
    async fn insert_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
        self.inner.insert_progress(progress).await
    }

    async fn get_progress(&self, learner: LearnerId) -> Result<Option<UserProgress>, StorageError> {
        self.inner.get_progress(learner).await
    }

    async fn apply_patch(
        &self,
        learner: LearnerId,
        expected_version: u64,
        patch: ProgressPatch,
    ) -> Result<UserProgress, StorageError> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StorageError::Connection("network unreachable".into()));
        }
        self.patches.fetch_add(1, Ordering::SeqCst);
        self.inner.apply_patch(learner, expected_version, patch).await
    }
}

#[tokio::test]
async fn failed_completion_write_can_be_finalized_once() {
    let repo = InMemoryRepository::new();
    let flaky = Arc::new(FlakyRepo {
        inner: repo.clone(),
        failures: AtomicU32::new(1),
        patches: AtomicU32::new(0),
    });
    let h = harness(flaky.clone(), repo).await;
    h.repo.upsert_level(&level(1, 2)).await.unwrap();
    let learner = learner_at(&h, 0).await;

    let mut attempt = h.quiz.start_quiz(learner, LevelId::FIRST).await.unwrap();
    attempt.select_answer("right").unwrap();
    h.quiz.submit(&mut attempt).await.unwrap();
    attempt.select_answer("right").unwrap();

    let err = h.quiz.submit(&mut attempt).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(attempt.is_complete());
    assert!(attempt.completion().is_none());

    let report = h.quiz.finalize_completion(&mut attempt).await.unwrap();
    assert_eq!(report.progress.current_level(), LevelId::new(2));
    assert!(report.new_badges.contains("perfect_quiz"));

    let again = h.quiz.finalize_completion(&mut attempt).await.unwrap();
    assert_eq!(again, report);
    assert_eq!(flaky.patches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn finalize_before_the_end_is_rejected() {
    let h = in_memory_harness().await;
    let learner = learner_at(&h, 0).await;
    let mut attempt = h.quiz.start_quiz(learner, LevelId::FIRST).await.unwrap();
    assert!(matches!(
        h.quiz.finalize_completion(&mut attempt).await.unwrap_err(),
        QuizServiceError::NotCompleted
    ));
}

#[tokio::test]
async fn practice_scores_through_the_injected_scorer() {
    let h = in_memory_harness().await;
    let learner = learner_at(&h, 0).await;
    let clip = AudioClip::new(vec![0; 16], "audio/wav");

    let mut session = h
        .practice
        .start_practice(learner, LevelId::FIRST)
        .await
        .unwrap();
    assert_eq!(session.current().unwrap().word, "你好");

    let attempt = h.practice.record(&session, &clip).await.unwrap();
    assert_eq!(attempt.score, 80);
    assert_eq!(attempt.feedback, PronunciationFeedback::Good);

    assert_eq!(session.next(), PracticeState::AtWord(1));
    assert_eq!(session.next(), PracticeState::Finished);
    assert!(matches!(
        h.practice.record(&session, &clip).await.unwrap_err(),
        PracticeServiceError::Practice(PracticeError::Finished)
    ));

    // Practice never touches progression.
    assert_eq!(
        h.progress.load(learner).await.unwrap().current_level(),
        LevelId::FIRST
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_scorer_times_out_as_retryable() {
    let h = in_memory_harness().await;
    let learner = learner_at(&h, 0).await;
    let practice = PracticeService::new(
        Arc::new(LevelService::new(Arc::new(h.repo.clone()))),
        Arc::clone(&h.progress),
        Arc::new(SimulatedScorer::with_delay(Duration::from_secs(60))),
    )
    .with_scoring_timeout(Duration::from_secs(1));

    let session = practice
        .start_practice(learner, LevelId::FIRST)
        .await
        .unwrap();
    let err = practice
        .record(&session, &AudioClip::new(vec![0; 16], "audio/wav"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PracticeServiceError::Scoring(ScoringError::Backend(_))
    ));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn app_services_run_the_bundled_curriculum() {
    let app = AppServices::in_memory(
        &AppConfig::default(),
        Clock::fixed(fixed_now()),
        Arc::new(FixedScorer(95)),
    )
    .unwrap();
    let seeded = app.levels().seed_levels().await.unwrap();
    assert!(seeded >= 2);

    let learner = LearnerId::generate();
    app.progress().sign_up(learner).await.unwrap();
    let visit = app.progress().record_visit(learner).await.unwrap();
    assert_eq!(visit.progress.streak(), 0);

    let quiz = app.quiz_loop();
    let mut attempt = quiz.start_quiz(learner, LevelId::FIRST).await.unwrap();
    while let Some(current) = attempt.current_quiz() {
        let correct = current.correct.clone();
        attempt.select_answer(correct).unwrap();
        quiz.submit(&mut attempt).await.unwrap();
    }

    let report = attempt.completion().unwrap();
    assert_eq!(
        report.new_badges,
        BTreeSet::from(["first_steps".to_string(), "perfect_quiz".to_string()])
    );
    assert_eq!(report.progress.current_level(), LevelId::new(2));

    let reset = app.progress().reset(learner).await.unwrap();
    assert_eq!(reset.current_level(), LevelId::FIRST);
    assert!(reset.achievements().is_empty());
}

#[tokio::test]
async fn sqlite_backed_services_persist_the_unlock() {
    let storage = storage::repository::Storage::sqlite(
        "sqlite:file:memdb_progression_flow?mode=memory&cache=shared",
    )
    .await
    .unwrap();
    let app = AppServices::from_storage(
        storage,
        &AppConfig::default(),
        Clock::fixed(fixed_now()),
        Arc::new(FixedScorer(70)),
    )
    .unwrap();
    app.levels().seed_levels().await.unwrap();

    let learner = LearnerId::generate();
    app.progress().sign_up(learner).await.unwrap();

    let quiz = app.quiz_loop();
    let mut attempt = quiz.start_quiz(learner, LevelId::FIRST).await.unwrap();
    while attempt.current_quiz().is_some() {
        let first = attempt.current_quiz().unwrap().options[0].clone();
        attempt.select_answer(first).unwrap();
        quiz.submit(&mut attempt).await.unwrap();
    }

    let stored = app.progress().load(learner).await.unwrap();
    assert_eq!(stored.current_level(), LevelId::new(2));
    assert!(stored.has_completed(LevelId::FIRST));
    assert!(stored.achievements().contains("first_steps"));

    let session = app
        .practice()
        .start_practice(learner, LevelId::new(2))
        .await
        .unwrap();
    let attempt = app
        .practice()
        .record(&session, &AudioClip::new(vec![1], "audio/wav"))
        .await
        .unwrap();
    assert_eq!(attempt.feedback, PronunciationFeedback::KeepPracticing);
}
