//! SurrealDB schema migrations and initialization
//!
//! Sets up every showcase table with the indexes the storage traits rely on.
//! The UNIQUE indexes are what make score, vote and result-version
//! uniqueness hold under concurrent writers.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all showcase tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing showcase SurrealDB schema");

    init_performances_table(db).await?;
    init_scores_table(db).await?;
    init_votes_table(db).await?;
    init_round_results_table(db).await?;
    init_rounds_table(db).await?;
    init_performance_slots_table(db).await?;
    init_contestants_table(db).await?;

    info!("showcase schema initialization complete");
    Ok(())
}

/// Initialize `performances` table
///
/// Schema:
/// ```text
/// TABLE performances {
///   performance_id:  STRING (unique)
///   contestant_id:   STRING (indexed)
///   round_id:        STRING (indexed)
///   slot_id:         STRING?
///   media_url:       STRING
///   media_digest:    STRING
///   media_type:      STRING (audio | video)
///   song_title:      STRING
///   artist:          STRING
///   status:          STRING (pending_review | approved | rejected | scored)
///   submitted_at:    DATETIME
///   notes:           STRING?
/// }
/// ```
async fn init_performances_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing performances table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS performances
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_performance_id ON TABLE performances COLUMNS performance_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_round_id ON TABLE performances COLUMNS round_id;
        DEFINE INDEX IF NOT EXISTS idx_contestant_id ON TABLE performances COLUMNS contestant_id;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ performances table initialized");
    Ok(())
}

/// Initialize `scores` table
///
/// Constraints:
/// - `(judge_id, performance_id)` is unique (one score per judge per performance)
/// - Scores are immutable once written
async fn init_scores_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing scores table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS scores
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_judge_performance ON TABLE scores COLUMNS judge_id, performance_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_performance_id ON TABLE scores COLUMNS performance_id;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ scores table initialized");
    Ok(())
}

/// Initialize `votes` table
///
/// Constraints:
/// - `(voter_id, performance_id)` is unique; the record id is the same
///   composite key, so the insert itself is the uniqueness check
async fn init_votes_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing votes table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS votes
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_voter_performance ON TABLE votes COLUMNS voter_id, performance_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_performance_id ON TABLE votes COLUMNS performance_id;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ votes table initialized");
    Ok(())
}

/// Initialize `round_results` table
///
/// Semantics:
/// - Append-only; every aggregation run writes the next version
/// - `(round_id, version)` is unique, so two concurrent runs cannot both
///   claim the same version
async fn init_round_results_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing round_results table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS round_results
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update NONE
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_round_version ON TABLE round_results COLUMNS round_id, version UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_result_id ON TABLE round_results COLUMNS result_id UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ round_results table initialized");
    Ok(())
}

/// Initialize `rounds` table
///
/// Schema:
/// ```text
/// TABLE rounds {
///   round_id:        STRING (unique)
///   name:            STRING
///   status:          STRING (upcoming | active | completed)
///   judge_ids:       ARRAY<STRING>
///   voting_enabled:  BOOL
///   voting_start:    DATETIME?
///   voting_end:      DATETIME?
///   ...
/// }
/// ```
async fn init_rounds_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing rounds table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS rounds
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_round_id ON TABLE rounds COLUMNS round_id UNIQUE;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ rounds table initialized");
    Ok(())
}

/// Initialize `performance_slots` table
///
/// Constraints:
/// - `slot_id` is unique
/// - Booking flips `available -> booked` in one conditional UPDATE
async fn init_performance_slots_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing performance_slots table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS performance_slots
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_slot_id ON TABLE performance_slots COLUMNS slot_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_round_status ON TABLE performance_slots COLUMNS round_id, status;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ performance_slots table initialized");
    Ok(())
}

/// Initialize `contestants` table
async fn init_contestants_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing contestants table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS contestants
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR select FULL
                FOR update FULL
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_contestant_id ON TABLE contestants COLUMNS contestant_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_user_id ON TABLE contestants COLUMNS user_id;
    "#;

    db.query(sql).await?.check()?;
    info!("✓ contestants table initialized");
    Ok(())
}
