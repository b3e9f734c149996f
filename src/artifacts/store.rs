//! Registry operations (§4.4): `Store`, `GetByArtifactId`, `ListByStrategy`,
//! `Transition`, `AttachValidationReport`.

use crate::artifacts::canonical;
use crate::artifacts::state_machine::{self, TransitionRequest};
use crate::db::Pool;
use crate::domain::{Approval, ApprovalState, Artifact, Promotion, ValidationInfo};
use crate::errors::AppError;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

pub struct ArtifactStore {
    pool: Pool,
}

fn state_str(state: ApprovalState) -> &'static str {
    match state {
        ApprovalState::Draft => "DRAFT",
        ApprovalState::Validated => "VALIDATED",
        ApprovalState::Reviewed => "REVIEWED",
        ApprovalState::Approved => "APPROVED",
        ApprovalState::Active => "ACTIVE",
        ApprovalState::Deprecated => "DEPRECATED",
        ApprovalState::Revoked => "REVOKED",
    }
}

fn state_from_str(s: &str) -> Result<ApprovalState, AppError> {
    match s {
        "DRAFT" => Ok(ApprovalState::Draft),
        "VALIDATED" => Ok(ApprovalState::Validated),
        "REVIEWED" => Ok(ApprovalState::Reviewed),
        "APPROVED" => Ok(ApprovalState::Approved),
        "ACTIVE" => Ok(ApprovalState::Active),
        "DEPRECATED" => Ok(ApprovalState::Deprecated),
        "REVOKED" => Ok(ApprovalState::Revoked),
        other => Err(AppError::Fatal(format!("unknown approval state {other}"))),
    }
}

impl ArtifactStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Stores a newly created artifact (state `DRAFT`) after verifying its
    /// hash. Artifacts are immutable once stored.
    pub async fn store(&self, artifact: &Artifact) -> Result<(), AppError> {
        canonical::verify(artifact)?;

        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        conn.execute(
            "INSERT INTO strategy_artifacts
               (id, artifact_id, schema_version, strategy_name, strategy_version, document, hash, signature, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                artifact.id.to_string(),
                artifact.artifact_id,
                artifact.schema_version,
                artifact.strategy.name,
                artifact.strategy.version,
                serde_json::to_string(artifact).map_err(|e| AppError::Fatal(e.to_string()))?,
                artifact.hash,
                artifact.signature,
                artifact.created_by,
                artifact.created_at.to_rfc3339(),
            ],
        )?;

        let now = Utc::now();
        conn.execute(
            "INSERT INTO artifact_approvals
               (id, artifact_id, state, previous_state, validation_passed, state_changed_by, state_changed_at)
             VALUES (?1, ?2, ?3, NULL, 0, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                artifact.artifact_id,
                state_str(ApprovalState::Draft),
                artifact.created_by,
                now.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub async fn get_by_artifact_id(&self, artifact_id: &str) -> Result<Option<(Artifact, Approval)>, AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;

        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM strategy_artifacts WHERE artifact_id = ?1",
                params![artifact_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(document) = document else {
            return Ok(None);
        };
        let artifact: Artifact =
            serde_json::from_str(&document).map_err(|e| AppError::Fatal(format!("corrupt artifact document: {e}")))?;
        canonical::verify(&artifact)?;

        let approval = self.load_approval(&conn, artifact_id)?;
        Ok(approval.map(|a| (artifact, a)))
    }

    fn load_approval(&self, conn: &rusqlite::Connection, artifact_id: &str) -> Result<Option<Approval>, AppError> {
        conn.query_row(
            "SELECT id, state, previous_state, validation_passed, validation_run_id, reviewer,
                    reviewed_at, review_notes, approved_by, approved_at, state_changed_by, state_changed_at,
                    state_change_reason
             FROM artifact_approvals WHERE artifact_id = ?1",
            params![artifact_id],
            |row| {
                let id: String = row.get(0)?;
                let state: String = row.get(1)?;
                let previous_state: Option<String> = row.get(2)?;
                let validation_run_id: Option<String> = row.get(4)?;
                let reviewed_at: Option<String> = row.get(6)?;
                let approved_at: Option<String> = row.get(9)?;
                let state_changed_at: String = row.get(11)?;
                Ok((
                    id,
                    state,
                    previous_state,
                    row.get::<_, bool>(3)?,
                    validation_run_id,
                    row.get::<_, Option<String>>(5)?,
                    reviewed_at,
                    row.get::<_, Option<String>>(7)?,
                    row.get::<_, Option<String>>(8)?,
                    approved_at,
                    row.get::<_, String>(10)?,
                    state_changed_at,
                    row.get::<_, Option<String>>(12)?,
                ))
            },
        )
        .optional()?
        .map(|(id, state, previous_state, validation_passed, validation_run_id, reviewer, reviewed_at, review_notes, approved_by, approved_at, state_changed_by, state_changed_at, state_change_reason)| {
            Ok(Approval {
                id: Uuid::parse_str(&id).unwrap_or_default(),
                artifact_id: artifact_id.to_string(),
                state: state_from_str(&state)?,
                previous_state: previous_state.map(|s| state_from_str(&s)).transpose()?,
                validation_passed,
                validation_run_id: validation_run_id.and_then(|s| Uuid::parse_str(&s).ok()),
                reviewer,
                reviewed_at: reviewed_at.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
                review_notes,
                approved_by,
                approved_at: approved_at.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
                state_changed_by,
                state_changed_at: chrono::DateTime::parse_from_rfc3339(&state_changed_at)
                    .map(|d| d.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                state_change_reason,
            })
        })
        .transpose()
    }

    pub async fn list_by_strategy(&self, name: &str, version: Option<&str>) -> Result<Vec<Artifact>, AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        let mut stmt = if version.is_some() {
            conn.prepare(
                "SELECT document FROM strategy_artifacts WHERE strategy_name = ?1 AND strategy_version = ?2",
            )?
        } else {
            conn.prepare("SELECT document FROM strategy_artifacts WHERE strategy_name = ?1")?
        };
        let rows: Vec<String> = if let Some(version) = version {
            stmt.query_map(params![name, version], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?
        } else {
            stmt.query_map(params![name], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?
        };
        rows.into_iter()
            .map(|doc| serde_json::from_str(&doc).map_err(|e| AppError::Fatal(e.to_string())))
            .collect()
    }

    async fn another_active_exists(&self, conn: &rusqlite::Connection, artifact_id: &str) -> Result<bool, AppError> {
        let (name, version): (String, String) = conn.query_row(
            "SELECT strategy_name, strategy_version FROM strategy_artifacts WHERE artifact_id = ?1",
            params![artifact_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM strategy_artifacts sa
             JOIN artifact_approvals aa ON aa.artifact_id = sa.artifact_id
             WHERE sa.strategy_name = ?1 AND sa.strategy_version = ?2
               AND aa.state = 'ACTIVE' AND sa.artifact_id != ?3",
            params![name, version, artifact_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub async fn transition(
        &self,
        artifact_id: &str,
        to: ApprovalState,
        actor: &str,
        reason: Option<&str>,
        reviewer: Option<&str>,
        review_notes: Option<&str>,
        approver: Option<&str>,
    ) -> Result<Approval, AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        let current = self
            .load_approval(&conn, artifact_id)?
            .ok_or_else(|| AppError::NotFound(format!("artifact {artifact_id}")))?;

        let another_active_exists = if to == ApprovalState::Active {
            self.another_active_exists(&conn, artifact_id).await?
        } else {
            false
        };

        state_machine::validate(&TransitionRequest {
            from: current.state,
            to,
            reviewer,
            review_notes,
            approver,
            reason,
            validation_passed: current.validation_passed,
            another_active_exists,
        })?;

        let now = Utc::now();
        conn.execute(
            "UPDATE artifact_approvals SET
               state = ?1, previous_state = ?2, reviewer = COALESCE(?3, reviewer),
               review_notes = COALESCE(?4, review_notes), approved_by = COALESCE(?5, approved_by),
               approved_at = CASE WHEN ?5 IS NOT NULL THEN ?6 ELSE approved_at END,
               reviewed_at = CASE WHEN ?3 IS NOT NULL THEN ?6 ELSE reviewed_at END,
               state_changed_by = ?7, state_changed_at = ?6, state_change_reason = ?8
             WHERE artifact_id = ?9",
            params![
                state_str(to),
                state_str(current.state),
                reviewer,
                review_notes,
                approver,
                now.to_rfc3339(),
                actor,
                reason,
                artifact_id,
            ],
        )?;

        conn.execute(
            "INSERT INTO artifact_promotions (id, artifact_id, from_state, to_state, promoted_by, promoted_at, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::new_v4().to_string(),
                artifact_id,
                state_str(current.state),
                state_str(to),
                actor,
                now.to_rfc3339(),
                reason,
            ],
        )?;

        self.load_approval(&conn, artifact_id)?
            .ok_or_else(|| AppError::Fatal("approval vanished after transition".into()))
    }

    pub async fn attach_validation_report(
        &self,
        artifact_id: &str,
        report: &ValidationInfo,
        passed: bool,
    ) -> Result<(), AppError> {
        let conn = self.pool.get().await.map_err(|e| AppError::Fatal(e.to_string()))?;
        conn.execute(
            "INSERT INTO validation_reports (id, artifact_id, backtest_run_id, metrics, determinism_seed, report_uri, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::new_v4().to_string(),
                artifact_id,
                report.backtest_run_id.map(|u| u.to_string()),
                serde_json::to_string(&report.metrics).map_err(|e| AppError::Fatal(e.to_string()))?,
                report.determinism_seed,
                report.report_uri,
                Utc::now().to_rfc3339(),
            ],
        )?;
        conn.execute(
            "UPDATE artifact_approvals SET validation_passed = ?1 WHERE artifact_id = ?2",
            params![passed, artifact_id],
        )?;
        Ok(())
    }

    pub async fn is_usable(&self, artifact_id: &str) -> Result<bool, AppError> {
        let Some((_, approval)) = self.get_by_artifact_id(artifact_id).await? else {
            return Ok(false);
        };
        Ok(state_machine::is_usable(approval.state))
    }

    /// Whether any artifact registered under `strategy_name` is currently
    /// usable (§4.4). Used by execution to gate on a signal's strategy
    /// rather than a specific artifact id.
    pub async fn is_strategy_usable(&self, strategy_name: &str) -> Result<bool, AppError> {
        for artifact in self.list_by_strategy(strategy_name, None).await? {
            if self.is_usable(&artifact.artifact_id).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Also re-exported at module level so `Promotion` stays part of the
/// registry's public surface even though it has no dedicated accessor yet.
pub type PromotionRecord = Promotion;
