//! Showcase - talent competition operator CLI
//!
//! The `showcase` command drives the results engine and the services that
//! feed it.
//!
//! ## Commands
//!
//! - `init`: prepare the database schema and media directory
//! - `submit`: upload a performance for a round
//! - `review`: approve or reject a pending performance
//! - `score`: record a judge's marks
//! - `vote`: record an audience vote
//! - `aggregate`: compute (and store) round standings
//! - `results`: show stored standings for a round
//! - `contestants`: list contestants who performed in a round
//! - `round`: create and update rounds, open and book performance slots
//! - `register`: register a contestant profile

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use showcase_core::{
    obs, CancelHandle, ContestantService, EngineConfig, PerformanceDraft, PerformanceService,
    ResultsEngine, ReviewDecision, RoundService, ScoringService, VotingService,
};
use showcase_state::fakes::{
    MemoryContestantRegistry, MemoryMediaStore, MemoryPerformanceRegistry, MemoryRoundRegistry,
    MemoryRoundResultStore, MemoryScoreStore, MemorySlotStore, MemoryVoteStore,
};
use showcase_state::{
    ContestantProfile, ContestantRegistry, FsMediaStore, MediaStore, MediaType, NewContestant,
    NewRound, PerformanceId, PerformanceRegistry, RankedEntry, RoundId, RoundRecord,
    RoundRegistry, RoundResultRecord, RoundResultStore, RoundStatus, RoundUpdate, ScoreCriteria,
    ScoreStore, SlotStore, SlotWindow, SurrealHandle, VoteStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Instrument, Level};

#[derive(Parser)]
#[command(name = "showcase")]
#[command(author = "Showcase Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Talent showcase results engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Use throwaway in-memory storage instead of the configured database
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Media storage directory [default: $SHOWCASE_MEDIA_DIR or .showcase/media]
    #[arg(long, global = true)]
    media_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and media directory
    Init,

    /// Submit a performance for a round
    Submit {
        /// Contestant submitting the performance
        #[arg(short, long)]
        contestant: String,

        /// Round the performance belongs to
        #[arg(short, long)]
        round: String,

        /// Media file to upload
        #[arg(short, long)]
        file: PathBuf,

        /// Song title
        #[arg(short, long)]
        title: String,

        /// Original artist
        #[arg(short, long)]
        artist: String,

        /// Kind of media
        #[arg(long, value_enum, default_value = "audio")]
        media_type: MediaKind,

        /// Optional performance slot
        #[arg(long)]
        slot: Option<String>,
    },

    /// Approve or reject a pending performance
    Review {
        /// Performance to review
        performance: String,

        #[arg(short, long, value_enum)]
        decision: DecisionArg,

        /// Reviewer notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Record a judge's score for a performance
    Score {
        /// Performance being scored
        performance: String,

        /// Judge identifier
        #[arg(short, long)]
        judge: String,

        #[arg(long)]
        pitch: f64,

        #[arg(long)]
        tone: f64,

        #[arg(long)]
        stage_presence: f64,

        /// Overall mark (default: mean of pitch, tone and stage presence)
        #[arg(long)]
        overall: Option<f64>,

        #[arg(short, long)]
        comments: Option<String>,
    },

    /// Record an audience vote
    Vote {
        /// Performance being voted for
        performance: String,

        /// Voter identifier
        #[arg(long)]
        voter: String,
    },

    /// Compute round standings and store them as a new result version
    Aggregate {
        /// Round to aggregate
        round: String,

        /// Compute standings without storing them
        #[arg(long)]
        dry_run: bool,

        /// Print the result as JSON
        #[arg(long)]
        json_output: bool,
    },

    /// Show stored standings for a round
    Results {
        /// Round to show
        round: String,

        /// Show every stored version, newest first
        #[arg(long)]
        history: bool,

        /// Print the result as JSON
        #[arg(long)]
        json_output: bool,
    },

    /// List contestants who performed in a round
    Contestants {
        /// Round to inspect
        round: String,
    },

    /// Manage rounds and their performance slots
    Round {
        #[command(subcommand)]
        action: RoundAction,
    },

    /// Register a contestant profile
    Register {
        /// Account the contestant signs in with
        #[arg(long)]
        user: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// Preferred song or genre (repeatable)
        #[arg(long = "song")]
        songs: Vec<String>,

        #[arg(long)]
        bio: Option<String>,
    },
}

#[derive(Subcommand)]
enum RoundAction {
    /// Create a round
    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// Start of the round (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// End of the round (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,

        #[arg(long, default_value_t = 20)]
        max_contestants: u32,

        /// Judge on the panel (repeatable)
        #[arg(long = "judge")]
        judges: Vec<String>,

        /// Accept audience votes
        #[arg(long)]
        voting: bool,

        #[arg(long)]
        voting_start: Option<DateTime<Utc>>,

        #[arg(long)]
        voting_end: Option<DateTime<Utc>>,

        #[arg(long, default_value = "operator")]
        created_by: String,
    },

    /// Show a round
    Show { round: String },

    /// Change a round's status or voting window
    Update {
        round: String,

        #[arg(long, value_enum)]
        status: Option<RoundStatusArg>,

        /// Turn audience voting on or off
        #[arg(long)]
        voting: Option<bool>,

        #[arg(long)]
        voting_start: Option<DateTime<Utc>>,

        #[arg(long)]
        voting_end: Option<DateTime<Utc>>,
    },

    /// Open performance slots
    AddSlots {
        round: String,

        /// Slot start time (RFC 3339, repeatable)
        #[arg(long = "at", required = true)]
        starts: Vec<DateTime<Utc>>,

        /// Slot length in minutes
        #[arg(long, default_value_t = 15)]
        minutes: i64,
    },

    /// List available slots
    Slots { round: String },

    /// Book a slot for a contestant
    Book {
        slot: String,

        #[arg(long)]
        contestant: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoundStatusArg {
    Upcoming,
    Active,
    Completed,
}

impl From<RoundStatusArg> for RoundStatus {
    fn from(arg: RoundStatusArg) -> Self {
        match arg {
            RoundStatusArg::Upcoming => RoundStatus::Upcoming,
            RoundStatusArg::Active => RoundStatus::Active,
            RoundStatusArg::Completed => RoundStatus::Completed,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MediaKind {
    Audio,
    Video,
}

impl From<MediaKind> for MediaType {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Audio => MediaType::Audio,
            MediaKind::Video => MediaType::Video,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum DecisionArg {
    Approve,
    Reject,
}

impl From<DecisionArg> for ReviewDecision {
    fn from(arg: DecisionArg) -> Self {
        match arg {
            DecisionArg::Approve => ReviewDecision::Approve,
            DecisionArg::Reject => ReviewDecision::Reject,
        }
    }
}

/// Store handles shared by every command.
struct Stores {
    performances: Arc<dyn PerformanceRegistry>,
    scores: Arc<dyn ScoreStore>,
    votes: Arc<dyn VoteStore>,
    results: Arc<dyn RoundResultStore>,
    rounds: Arc<dyn RoundRegistry>,
    slots: Arc<dyn SlotStore>,
    contestants: Arc<dyn ContestantRegistry>,
    media: Arc<dyn MediaStore>,
    media_root: Option<PathBuf>,
}

impl Stores {
    fn ephemeral() -> Self {
        Self {
            performances: Arc::new(MemoryPerformanceRegistry::new()),
            scores: Arc::new(MemoryScoreStore::new()),
            votes: Arc::new(MemoryVoteStore::new()),
            results: Arc::new(MemoryRoundResultStore::new()),
            rounds: Arc::new(MemoryRoundRegistry::new()),
            slots: Arc::new(MemorySlotStore::new()),
            contestants: Arc::new(MemoryContestantRegistry::new()),
            media: Arc::new(MemoryMediaStore::new()),
            media_root: None,
        }
    }

    async fn connect(media_dir: Option<&Path>) -> Result<Self> {
        let handle = SurrealHandle::setup_from_env()
            .await
            .context("Failed to connect to showcase database")?;
        let media = open_media(media_dir)?;
        Ok(Self {
            performances: Arc::new(handle.clone()),
            scores: Arc::new(handle.clone()),
            votes: Arc::new(handle.clone()),
            results: Arc::new(handle.clone()),
            rounds: Arc::new(handle.clone()),
            slots: Arc::new(handle.clone()),
            contestants: Arc::new(handle),
            media_root: Some(media.root().to_path_buf()),
            media: Arc::new(media),
        })
    }

    fn engine(&self, config: EngineConfig) -> ResultsEngine {
        ResultsEngine::new(
            Arc::clone(&self.performances),
            Arc::clone(&self.scores),
            Arc::clone(&self.votes),
            Arc::clone(&self.results),
        )
        .with_config(config)
    }

    fn performance_service(&self) -> PerformanceService {
        PerformanceService::new(Arc::clone(&self.performances), Arc::clone(&self.media))
    }

    fn scoring_service(&self) -> ScoringService {
        ScoringService::new(Arc::clone(&self.performances), Arc::clone(&self.scores))
    }

    fn voting_service(&self) -> VotingService {
        VotingService::new(Arc::clone(&self.performances), Arc::clone(&self.votes))
            .with_rounds(Arc::clone(&self.rounds))
    }

    fn round_service(&self) -> RoundService {
        RoundService::new(Arc::clone(&self.rounds), Arc::clone(&self.slots))
    }

    fn contestant_service(&self) -> ContestantService {
        ContestantService::new(Arc::clone(&self.contestants), Arc::clone(&self.performances))
    }
}

/// `--media-dir` when given, otherwise `SHOWCASE_MEDIA_DIR` or the default.
fn open_media(media_dir: Option<&Path>) -> Result<FsMediaStore> {
    match media_dir {
        Some(dir) => FsMediaStore::new(dir)
            .with_context(|| format!("Failed to open media directory {:?}", dir)),
        None => FsMediaStore::from_env().context("Failed to open media directory"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    showcase_core::init_tracing(cli.json, level);

    let stores = if cli.ephemeral {
        info!("Using ephemeral in-memory storage");
        Stores::ephemeral()
    } else {
        Stores::connect(cli.media_dir.as_deref()).await?
    };

    match cli.command {
        Commands::Init => cmd_init(&stores),
        Commands::Submit {
            contestant,
            round,
            file,
            title,
            artist,
            media_type,
            slot,
        } => {
            let draft = PerformanceDraft {
                contestant_id: contestant.into(),
                round_id: round.into(),
                slot_id: slot,
                media_type: media_type.into(),
                song_title: title,
                artist,
            };
            cmd_submit(&stores, draft, &file).await.map(|_| ())
        }
        Commands::Review {
            performance,
            decision,
            notes,
        } => cmd_review(&stores, &performance, decision.into(), notes).await,
        Commands::Score {
            performance,
            judge,
            pitch,
            tone,
            stage_presence,
            overall,
            comments,
        } => {
            let mut criteria = ScoreCriteria::from_parts(pitch, tone, stage_presence);
            if let Some(overall) = overall {
                criteria.overall = overall;
            }
            cmd_score(&stores, &performance, &judge, criteria, comments).await
        }
        Commands::Vote { performance, voter } => cmd_vote(&stores, &performance, &voter).await,
        Commands::Aggregate {
            round,
            dry_run,
            json_output,
        } => {
            let config = EngineConfig::from_env().context("Invalid engine configuration")?;
            cmd_aggregate(&stores, config, &round, dry_run, json_output).await
        }
        Commands::Results {
            round,
            history,
            json_output,
        } => cmd_results(&stores, &round, history, json_output).await,
        Commands::Contestants { round } => cmd_contestants(&stores, &round).await,
        Commands::Round { action } => cmd_round(&stores, action).await,
        Commands::Register {
            user,
            name,
            email,
            songs,
            bio,
        } => {
            let contestant = NewContestant {
                user_id: user,
                name,
                email,
                song_preferences: songs,
                profile: ContestantProfile {
                    bio,
                    ..Default::default()
                },
            };
            cmd_register(&stores, contestant).await
        }
    }
}

/// Schema setup happens on connect; this only reports where things live.
fn cmd_init(stores: &Stores) -> Result<()> {
    println!("Showcase storage ready");
    match &stores.media_root {
        Some(root) => println!("Media directory: {}", root.display()),
        None => println!("Media directory: (in-memory)"),
    }
    Ok(())
}

async fn cmd_submit(stores: &Stores, draft: PerformanceDraft, file: &Path) -> Result<PerformanceId> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read media file {:?}", file))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .context("Media file name is not valid UTF-8")?;

    let performance = stores
        .performance_service()
        .submit(draft, file_name, &bytes)
        .await
        .context("submit failed")?;

    println!("Submitted performance {}", performance.id);
    println!("  media:  {}", performance.media_url);
    println!("  digest: {}", performance.media_digest.short());
    println!("  status: {}", performance.status);
    Ok(performance.id)
}

async fn cmd_review(
    stores: &Stores,
    performance: &str,
    decision: ReviewDecision,
    notes: Option<String>,
) -> Result<()> {
    let performance = stores
        .performance_service()
        .review(&performance.into(), decision, notes)
        .await
        .context("review failed")?;
    println!("Performance {} is now {}", performance.id, performance.status);
    Ok(())
}

async fn cmd_score(
    stores: &Stores,
    performance: &str,
    judge: &str,
    criteria: ScoreCriteria,
    comments: Option<String>,
) -> Result<()> {
    let score = stores
        .scoring_service()
        .submit_score(&judge.into(), &performance.into(), criteria, comments)
        .await
        .context("score failed")?;
    println!(
        "Judge {} scored {}: overall {:.2}",
        score.judge_id, score.performance_id, score.criteria.overall
    );
    Ok(())
}

async fn cmd_vote(stores: &Stores, performance: &str, voter: &str) -> Result<()> {
    let voting = stores.voting_service();
    let performance_id = PerformanceId::from(performance);
    voting
        .submit_vote(&voter.into(), &performance_id)
        .await
        .context("vote failed")?;
    let count = voting.vote_count(&performance_id).await?;
    println!("Vote recorded for {} ({} total)", performance_id, count);
    Ok(())
}

async fn cmd_aggregate(
    stores: &Stores,
    config: EngineConfig,
    round: &str,
    dry_run: bool,
    json_output: bool,
) -> Result<()> {
    let engine = stores.engine(config);
    let round_id = RoundId::from(round);

    if dry_run {
        let entries = engine
            .compute_standings(&round_id)
            .instrument(obs::round_span(round))
            .await
            .context("aggregation failed")?;
        if json_output {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else {
            println!("Standings for {} (not stored)", round_id);
            print_standings(&entries);
        }
        return Ok(());
    }

    let (cancel, token) = CancelHandle::pair();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let outcome = engine
        .aggregate_round_with_cancel(&round_id, token)
        .instrument(obs::round_span(round))
        .await;
    ctrl_c.abort();

    let record = outcome.context("aggregation failed")?;
    print_result(&record, json_output)
}

async fn cmd_results(stores: &Stores, round: &str, history: bool, json_output: bool) -> Result<()> {
    let engine = stores.engine(EngineConfig::default());
    let round_id = RoundId::from(round);

    if history {
        let records = engine.result_history(&round_id).await?;
        if json_output {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else if records.is_empty() {
            println!("No results stored for {}", round_id);
        } else {
            for record in &records {
                print_result(record, false)?;
                println!();
            }
        }
        return Ok(());
    }

    match engine.latest_result(&round_id).await? {
        Some(record) => print_result(&record, json_output),
        None => {
            println!("No results stored for {}", round_id);
            Ok(())
        }
    }
}

async fn cmd_contestants(stores: &Stores, round: &str) -> Result<()> {
    let round_id = RoundId::from(round);
    let contestants = stores
        .performance_service()
        .contestants_in_round(&round_id)
        .await?;
    if contestants.is_empty() {
        println!("No contestants in {}", round_id);
    }
    for contestant in contestants {
        println!("{}", contestant);
    }
    Ok(())
}

async fn cmd_round(stores: &Stores, action: RoundAction) -> Result<()> {
    let rounds = stores.round_service();
    match action {
        RoundAction::Create {
            name,
            description,
            start,
            end,
            max_contestants,
            judges,
            voting,
            voting_start,
            voting_end,
            created_by,
        } => {
            let round = rounds
                .create_round(NewRound {
                    name,
                    description,
                    start_date: start,
                    end_date: end,
                    status: RoundStatus::Upcoming,
                    max_contestants,
                    judge_ids: judges.into_iter().map(Into::into).collect(),
                    voting_enabled: voting,
                    voting_start,
                    voting_end,
                    created_by,
                })
                .await
                .context("round creation failed")?;
            println!("Created round {}", round.id);
            print_round(&round);
        }
        RoundAction::Show { round } => {
            let round = rounds.get_round(&round.into()).await?;
            print_round(&round);
        }
        RoundAction::Update {
            round,
            status,
            voting,
            voting_start,
            voting_end,
        } => {
            let update = RoundUpdate {
                status: status.map(Into::into),
                voting_enabled: voting,
                voting_start,
                voting_end,
                ..Default::default()
            };
            let round = rounds
                .update_round(&round.into(), update)
                .await
                .context("round update failed")?;
            print_round(&round);
        }
        RoundAction::AddSlots {
            round,
            starts,
            minutes,
        } => {
            let length = Duration::minutes(minutes);
            let windows = starts
                .into_iter()
                .map(|start_time| SlotWindow {
                    start_time,
                    end_time: start_time + length,
                })
                .collect();
            let slots = rounds
                .create_performance_slots(&round.into(), windows)
                .await
                .context("slot creation failed")?;
            for slot in slots {
                println!("{}  {}", slot.id, slot.start_time.to_rfc3339());
            }
        }
        RoundAction::Slots { round } => {
            let round_id = RoundId::from(round);
            let slots = rounds.available_slots(&round_id).await?;
            if slots.is_empty() {
                println!("No available slots in {}", round_id);
            }
            for slot in slots {
                println!(
                    "{}  {} - {}",
                    slot.id,
                    slot.start_time.to_rfc3339(),
                    slot.end_time.to_rfc3339()
                );
            }
        }
        RoundAction::Book { slot, contestant } => {
            let slot = rounds
                .book_slot(&slot.into(), &contestant.into())
                .await
                .context("booking failed")?;
            println!("Slot {} booked at {}", slot.id, slot.start_time.to_rfc3339());
        }
    }
    Ok(())
}

async fn cmd_register(stores: &Stores, contestant: NewContestant) -> Result<()> {
    let contestant = stores
        .contestant_service()
        .register(contestant)
        .await
        .context("registration failed")?;
    println!("Registered contestant {} ({})", contestant.id, contestant.name);
    Ok(())
}

fn print_round(round: &RoundRecord) {
    println!("{} [{}]", round.name, round.status);
    println!(
        "  schedule: {} - {}",
        round.start_date.to_rfc3339(),
        round.end_date.to_rfc3339()
    );
    let judges: Vec<&str> = round.judge_ids.iter().map(|j| j.as_str()).collect();
    println!("  judges:   {}", judges.join(", "));
    println!(
        "  voting:   {}",
        if round.is_voting_open(Utc::now()) {
            "open"
        } else {
            "closed"
        }
    );
}

fn print_result(record: &RoundResultRecord, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }
    println!(
        "Round {} v{} (generated {}, id {})",
        record.round_id,
        record.version,
        record.generated_at.to_rfc3339(),
        record.id
    );
    print_standings(&record.results);
    Ok(())
}

fn print_standings(entries: &[RankedEntry]) {
    println!(
        "{:>4}  {:<20} {:<38} {:>8} {:>8} {:>8}",
        "rank", "contestant", "performance", "final", "judges", "votes"
    );
    for entry in entries {
        println!(
            "{:>4}  {:<20} {:<38} {:>8.2} {:>8.2} {:>8}",
            entry.rank,
            entry.contestant_id,
            entry.performance_id,
            entry.final_score,
            entry.judge_score,
            entry.audience_score
        );
    }
}
