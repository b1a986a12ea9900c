use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use lingo_core::achievements::Badge;
use lingo_core::model::{LearnerId, LevelId, UserProgress};
use lingo_core::progression::can_open;
use lingo_core::pronunciation::PracticeState;
use lingo_core::quiz::{SubmitOutcome, Verdict};
use lingo_core::streak::StreakChange;
use services::speech::{AudioClip, AudioPlayer, Narrator, SpeechSynthesizer};
use services::{AppConfig, AppServices, ChatTurn, Clock, SpeechError};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ulingo", version, about = "Mandarin lessons with streaks, quizzes and pronunciation practice")]
struct Cli {
    /// SQLite database URL
    #[arg(long, global = true, env = "ULINGO_DB_URL")]
    db: Option<String>,

    /// Learner id returned by `signup`
    #[arg(long, global = true, env = "ULINGO_LEARNER")]
    learner: Option<LearnerId>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the bundled starter levels
    Seed,
    /// Create a new learner
    Signup,
    /// Record today's visit and update the streak
    Visit,
    /// Show streak, level and badges
    Status,
    /// List levels and whether they are open
    Levels,
    /// Take a level's quiz
    Quiz {
        #[arg(long)]
        level: u32,
    },
    /// Practice a level's pronunciation words
    Practice {
        #[arg(long)]
        level: u32,
    },
    /// Reset progress to signup defaults
    Reset,
    /// Synthesize speech for some text into an audio file
    Say {
        text: String,
        #[arg(long, default_value = "speech.mp3")]
        out: PathBuf,
    },
    /// Chat with the tutor
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("invalid ULINGO_* configuration")?;
    if let Some(db) = cli.db {
        config = config.with_db_url(normalize_sqlite_url(&db));
    }
    prepare_sqlite_file(&config.db_url)?;

    let app = AppServices::new_sqlite(&config, Clock::default())
        .await
        .with_context(|| format!("failed to open {}", config.db_url))?;

    match cli.command {
        Command::Seed => {
            let count = app.levels().seed_levels().await?;
            println!("seeded {count} levels");
        }
        Command::Signup => {
            let learner = LearnerId::generate();
            app.progress().sign_up(learner).await?;
            println!("{learner}");
            println!("export ULINGO_LEARNER={learner}");
        }
        Command::Visit => visit(&app, require_learner(cli.learner)?).await?,
        Command::Status => {
            let progress = app.progress().load(require_learner(cli.learner)?).await?;
            print_status(&progress);
        }
        Command::Levels => levels(&app, cli.learner).await?,
        Command::Quiz { level } => {
            quiz(&app, require_learner(cli.learner)?, LevelId::new(level)).await?;
        }
        Command::Practice { level } => {
            practice(&app, require_learner(cli.learner)?, LevelId::new(level)).await?;
        }
        Command::Reset => {
            let progress = app.progress().reset(require_learner(cli.learner)?).await?;
            print_status(&progress);
        }
        Command::Say { text, out } => {
            let synthesizer: Arc<dyn SpeechSynthesizer> = app.speech();
            let narrator = Narrator::new(synthesizer, FileSink { path: out.clone() });
            let clip = narrator.say(&text).await?;
            println!("wrote {} bytes of {} to {}", clip.bytes.len(), clip.mime, out.display());
        }
        Command::Chat => chat(&app).await?,
    }
    Ok(())
}

fn require_learner(learner: Option<LearnerId>) -> Result<LearnerId> {
    learner.context("no learner: pass --learner or set ULINGO_LEARNER (see `ulingo signup`)")
}

async fn visit(app: &AppServices, learner: LearnerId) -> Result<()> {
    let report = app.progress().record_visit(learner).await?;
    match report.change {
        StreakChange::Extended => println!("streak extended to {}", report.progress.streak()),
        StreakChange::Reset => println!("streak restarted at 1"),
        StreakChange::Unchanged => println!("already counted today"),
        StreakChange::ClockSkew => println!("clock looks off; streak left alone"),
    }
    print_badges(&report.new_badges);
    print_status(&report.progress);
    Ok(())
}

async fn levels(app: &AppServices, learner: Option<LearnerId>) -> Result<()> {
    let progress = match learner {
        Some(learner) => Some(app.progress().load(learner).await?),
        None => None,
    };
    for level in app.levels().list_levels().await? {
        let mark = match &progress {
            Some(p) if p.has_completed(level.id) => "done",
            Some(p) if can_open(p, level.id) => "open",
            Some(_) => "locked",
            None => "",
        };
        println!(
            "{:>3}  {:<24} {:>2} quizzes {:>2} words  {mark}",
            level.id,
            level.title,
            level.quizzes.len(),
            level.pronunciations.len()
        );
    }
    Ok(())
}

async fn quiz(app: &AppServices, learner: LearnerId, level: LevelId) -> Result<()> {
    let quiz = app.quiz_loop();
    let mut attempt = quiz.start_quiz(learner, level).await?;
    let mut input = stdin_lines();

    while let Some(current) = attempt.current_quiz().cloned() {
        let progress = attempt.session().progress();
        println!();
        println!("[{}/{}] {}", progress.answered + 1, progress.total, current.audio);
        for (i, option) in current.options.iter().enumerate() {
            println!("  {}) {option}", i + 1);
        }
        if current.options.is_empty() {
            println!("  (no options available, type your answer)");
        }

        let Some(line) = prompt(&mut input, "answer> ").await? else {
            println!("quiz abandoned");
            return Ok(());
        };
        let choice = match line.parse::<usize>() {
            Ok(n) if (1..=current.options.len()).contains(&n) => current.options[n - 1].clone(),
            _ => line,
        };
        if let Err(e) = attempt.select_answer(choice) {
            println!("{e}");
            continue;
        }

        match quiz.submit(&mut attempt).await {
            Ok(result) => {
                if let SubmitOutcome::Completed(score) = result.outcome {
                    let headline = match score.verdict() {
                        Verdict::Pass => "well done",
                        Verdict::Effort => "good effort, keep going",
                    };
                    println!();
                    println!("{headline}: {}/{}", score.score, score.total);
                }
            }
            Err(e) if e.is_retryable() && attempt.is_complete() => {
                println!("could not save your result ({e}), retrying");
                quiz.finalize_completion(&mut attempt).await?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(report) = attempt.completion() {
        if let Some(unlocked) = report.outcome.unlocked {
            println!("level {unlocked} unlocked");
        }
        print_badges(&report.new_badges);
    }
    Ok(())
}

async fn practice(app: &AppServices, learner: LearnerId, level: LevelId) -> Result<()> {
    let practice = app.practice();
    let mut session = practice.start_practice(learner, level).await?;
    let mut input = stdin_lines();
    println!("commands: r <audio file> | n | p | q");

    loop {
        let PracticeState::AtWord(index) = session.state() else {
            println!("all {} words practiced", session.len());
            return Ok(());
        };
        let Some(item) = session.current() else {
            return Ok(());
        };
        println!();
        println!("[{}/{}] {}  {}  {}", index + 1, session.len(), item.word, item.pinyin, item.translation);
        if !item.tips.is_empty() {
            println!("  tip: {}", item.tips);
        }

        let Some(line) = prompt(&mut input, "practice> ").await? else {
            return Ok(());
        };
        match line.split_once(' ').map_or((line.as_str(), ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("r", path) if !path.is_empty() => {
                let bytes = tokio::fs::read(path)
                    .await
                    .with_context(|| format!("cannot read recording {path}"))?;
                let clip = AudioClip::new(bytes, "audio/wav");
                match practice.record(&session, &clip).await {
                    Ok(attempt) => println!("{} ({})", attempt.feedback.message(), attempt.score),
                    Err(e) => println!("{e}"),
                }
            }
            ("n", _) => {
                session.next();
            }
            ("p", _) => {
                session.previous();
            }
            ("q", _) => return Ok(()),
            _ => println!("commands: r <audio file> | n | p | q"),
        }
    }
}

async fn chat(app: &AppServices) -> Result<()> {
    let tutor = app.tutor_chat();
    if !tutor.enabled() {
        bail!("tutor chat is disabled; set ULINGO_CHAT_API_KEY");
    }
    let mut input = stdin_lines();
    let mut history = Vec::new();
    while let Some(line) = prompt(&mut input, "you> ").await? {
        if line.is_empty() {
            continue;
        }
        history.push(ChatTurn::user(line));
        match tutor.reply(&history).await {
            Ok(reply) => {
                println!("tutor> {reply}");
                history.push(ChatTurn::assistant(reply));
            }
            Err(e) => {
                // Drop the unanswered turn so it can be retyped.
                history.pop();
                println!("{e}");
            }
        }
    }
    Ok(())
}

fn print_status(progress: &UserProgress) {
    println!("learner:   {}", progress.learner_id());
    println!("streak:    {} day(s)", progress.streak());
    println!("level:     {}", progress.current_level());
    let completed: Vec<String> = progress
        .completed_levels()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("completed: {}", completed.join(", "));
    let badges: Vec<&str> = progress
        .achievements()
        .iter()
        .map(|id| Badge::from_id(id).map_or(id.as_str(), |badge| badge.title()))
        .collect();
    println!("badges:    {}", badges.join(", "));
}

fn print_badges(badges: &std::collections::BTreeSet<String>) {
    for id in badges {
        let title = Badge::from_id(id).map_or(id.as_str(), |badge| badge.title());
        println!("badge earned: {title}");
    }
}

fn stdin_lines() -> Lines<BufReader<Stdin>> {
    BufReader::new(tokio::io::stdin()).lines()
}

async fn prompt(input: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<Option<String>> {
    use std::io::Write;
    print!("{label}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?.map(|line| line.trim().to_string()))
}

/// Writes synthesized audio to a file instead of a sound device.
struct FileSink {
    path: PathBuf,
}

impl AudioPlayer for FileSink {
    fn play(&self, clip: &AudioClip) -> Result<(), SpeechError> {
        std::fs::write(&self.path, &clip.bytes).map_err(|e| SpeechError::Playback(e.to_string()))
    }

    fn stop(&self) {}
}

fn normalize_sqlite_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed == "sqlite::memory:" || trimmed.starts_with("sqlite://") {
        return trimmed.to_string();
    }
    let path = Path::new(trimmed.strip_prefix("sqlite:").unwrap_or(trimmed));
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

/// sqlx does not create missing database files, so touch it first.
fn prepare_sqlite_file(db_url: &str) -> Result<()> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        bail!("unsupported database URL: {db_url}");
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        bail!("database URL has no path: {db_url}");
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        info!(path = %path.display(), "created database file");
    }
    Ok(())
}
