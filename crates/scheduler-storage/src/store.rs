use crate::rows::{
    session_type_str, AttemptRow, ProblemBind, ProblemRow, SessionBind, SessionRow,
    SessionStateBind, SessionStateRow, TagMasteryRow,
};
use async_trait::async_trait;
use chrono::Utc;
use scheduler_core::{
    Attempt, Problem, Session, SessionState, SessionType, Store, TagMastery, SESSION_STATE_ID,
};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::BTreeSet;
use uuid::Uuid;

/// `sqlx`-backed implementation of `scheduler_core::ports::Store`, grounded
/// in the same `pool.begin()` / `_in_tx` helper / `ON CONFLICT` upsert shape
/// used throughout `SqliteUserRepository`.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn tags_for<'e, E>(executor: E, problem_id: &str) -> anyhow::Result<BTreeSet<String>>
    where
        E: sqlx::Executor<'e, Database = Sqlite>,
    {
        let rows = sqlx::query_as::<_, (String,)>(
            "SELECT tag FROM problem_tags WHERE problem_id = ?",
        )
        .bind(problem_id)
        .fetch_all(executor)
        .await?;

        Ok(rows.into_iter().map(|(tag,)| tag).collect())
    }

    async fn hydrate_problem(&self, row: ProblemRow) -> anyhow::Result<Problem> {
        let tags = Self::tags_for(&self.pool, &row.problem_id).await?;
        row.into_problem(tags)
    }

    async fn hydrate_problems(&self, rows: Vec<ProblemRow>) -> anyhow::Result<Vec<Problem>> {
        let mut problems = Vec::with_capacity(rows.len());
        for row in rows {
            problems.push(self.hydrate_problem(row).await?);
        }
        Ok(problems)
    }

    /// Replace the tag set for a problem within `tx`. Delete-then-insert is
    /// simpler than diffing and the set is small (a handful of tags).
    async fn put_problem_tags_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        problem_id: &str,
        tags: &BTreeSet<String>,
    ) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM problem_tags WHERE problem_id = ?")
            .bind(problem_id)
            .execute(&mut **tx)
            .await?;

        for tag in tags {
            sqlx::query("INSERT INTO problem_tags (problem_id, tag) VALUES (?, ?)")
                .bind(problem_id)
                .bind(tag)
                .execute(&mut **tx)
                .await?;
        }

        Ok(())
    }

    async fn put_problem_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        problem: &Problem,
    ) -> anyhow::Result<()> {
        let bind = ProblemBind::from(problem);

        sqlx::query(
            "INSERT INTO problems
                (problem_id, leetcode_id, title, slug, difficulty, box_level,
                 review_schedule, last_attempt_date, attempts_total, attempts_successful)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(problem_id) DO UPDATE SET
                leetcode_id = excluded.leetcode_id,
                title = excluded.title,
                slug = excluded.slug,
                difficulty = excluded.difficulty,
                box_level = excluded.box_level,
                review_schedule = excluded.review_schedule,
                last_attempt_date = excluded.last_attempt_date,
                attempts_total = excluded.attempts_total,
                attempts_successful = excluded.attempts_successful",
        )
        .bind(&bind.problem_id)
        .bind(bind.leetcode_id)
        .bind(&bind.title)
        .bind(&bind.slug)
        .bind(&bind.difficulty)
        .bind(bind.box_level)
        .bind(bind.review_schedule)
        .bind(bind.last_attempt_date)
        .bind(bind.attempts_total)
        .bind(bind.attempts_successful)
        .execute(&mut **tx)
        .await?;

        Self::put_problem_tags_in_tx(tx, &bind.problem_id, &problem.tags).await?;

        Ok(())
    }

    async fn insert_attempt_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        attempt: &Attempt,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO attempts
                (attempt_id, problem_id, leetcode_id, session_id, attempt_date,
                 success, time_spent, hints_used, box_level_at_attempt, comments)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(attempt.attempt_id.to_string())
        .bind(attempt.problem_id.to_string())
        .bind(attempt.leetcode_id)
        .bind(attempt.session_id.map(|id| id.to_string()))
        .bind(attempt.attempt_date.timestamp_millis())
        .bind(attempt.success)
        .bind(attempt.time_spent as i64)
        .bind(attempt.hints_used as i64)
        .bind(attempt.box_level_at_attempt as i64)
        .bind(&attempt.comments)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn put_session_in_tx(
        tx: &mut Transaction<'_, Sqlite>,
        session: &Session,
    ) -> anyhow::Result<()> {
        let bind = SessionBind::try_from(session)?;

        sqlx::query(
            "INSERT INTO sessions
                (session_id, session_type, status, origin, created_at, last_activity_time,
                 problems, attempts, current_problem_index, accuracy, duration)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(session_id) DO UPDATE SET
                session_type = excluded.session_type,
                status = excluded.status,
                origin = excluded.origin,
                created_at = excluded.created_at,
                last_activity_time = excluded.last_activity_time,
                problems = excluded.problems,
                attempts = excluded.attempts,
                current_problem_index = excluded.current_problem_index,
                accuracy = excluded.accuracy,
                duration = excluded.duration",
        )
        .bind(&bind.session_id)
        .bind(&bind.session_type)
        .bind(&bind.status)
        .bind(&bind.origin)
        .bind(bind.created_at)
        .bind(bind.last_activity_time)
        .bind(&bind.problems)
        .bind(&bind.attempts)
        .bind(bind.current_problem_index)
        .bind(bind.accuracy)
        .bind(bind.duration)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_problem(&self, problem_id: Uuid) -> anyhow::Result<Option<Problem>> {
        let row = sqlx::query_as::<_, ProblemRow>(
            "SELECT problem_id, leetcode_id, title, slug, difficulty, box_level,
                    review_schedule, last_attempt_date, attempts_total, attempts_successful
             FROM problems WHERE problem_id = ?",
        )
        .bind(problem_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_problem(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_problem_by_leetcode_id(
        &self,
        leetcode_id: i64,
    ) -> anyhow::Result<Option<Problem>> {
        let row = sqlx::query_as::<_, ProblemRow>(
            "SELECT problem_id, leetcode_id, title, slug, difficulty, box_level,
                    review_schedule, last_attempt_date, attempts_total, attempts_successful
             FROM problems WHERE leetcode_id = ?",
        )
        .bind(leetcode_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_problem(row).await?)),
            None => Ok(None),
        }
    }

    async fn scan_problems(&self) -> anyhow::Result<Vec<Problem>> {
        let rows = sqlx::query_as::<_, ProblemRow>(
            "SELECT problem_id, leetcode_id, title, slug, difficulty, box_level,
                    review_schedule, last_attempt_date, attempts_total, attempts_successful
             FROM problems",
        )
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_problems(rows).await
    }

    async fn problems_by_tag(&self, tag: &str) -> anyhow::Result<Vec<Problem>> {
        let rows = sqlx::query_as::<_, ProblemRow>(
            "SELECT p.problem_id, p.leetcode_id, p.title, p.slug, p.difficulty, p.box_level,
                    p.review_schedule, p.last_attempt_date, p.attempts_total, p.attempts_successful
             FROM problems p
             JOIN problem_tags t ON t.problem_id = p.problem_id
             WHERE t.tag = ?",
        )
        .bind(tag)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_problems(rows).await
    }

    async fn put_problem(&self, problem: &Problem) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::put_problem_in_tx(&mut tx, problem).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> anyhow::Result<Option<Attempt>> {
        let row = sqlx::query_as::<_, AttemptRow>(
            "SELECT attempt_id, problem_id, leetcode_id, session_id, attempt_date,
                    success, time_spent, hints_used, box_level_at_attempt, comments
             FROM attempts WHERE attempt_id = ?",
        )
        .bind(attempt_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Attempt::try_from).transpose()
    }

    async fn attempts_by_problem(&self, problem_id: Uuid) -> anyhow::Result<Vec<Attempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            "SELECT attempt_id, problem_id, leetcode_id, session_id, attempt_date,
                    success, time_spent, hints_used, box_level_at_attempt, comments
             FROM attempts WHERE problem_id = ?
             ORDER BY attempt_date ASC",
        )
        .bind(problem_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Attempt::try_from).collect()
    }

    async fn attempts_by_session(&self, session_id: Uuid) -> anyhow::Result<Vec<Attempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            "SELECT attempt_id, problem_id, leetcode_id, session_id, attempt_date,
                    success, time_spent, hints_used, box_level_at_attempt, comments
             FROM attempts WHERE session_id = ?
             ORDER BY attempt_date ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Attempt::try_from).collect()
    }

    async fn scan_attempts(&self) -> anyhow::Result<Vec<Attempt>> {
        let rows = sqlx::query_as::<_, AttemptRow>(
            "SELECT attempt_id, problem_id, leetcode_id, session_id, attempt_date,
                    success, time_spent, hints_used, box_level_at_attempt, comments
             FROM attempts",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Attempt::try_from).collect()
    }

    async fn record_attempt_atomic(
        &self,
        attempt: &Attempt,
        updated_problem: &Problem,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_attempt_in_tx(&mut tx, attempt).await?;
        Self::put_problem_in_tx(&mut tx, updated_problem).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> anyhow::Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT session_id, session_type, status, origin, created_at, last_activity_time,
                    problems, attempts, current_problem_index, accuracy, duration
             FROM sessions WHERE session_id = ?",
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    async fn get_in_progress_session(
        &self,
        session_type: SessionType,
    ) -> anyhow::Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT session_id, session_type, status, origin, created_at, last_activity_time,
                    problems, attempts, current_problem_index, accuracy, duration
             FROM sessions WHERE session_type = ? AND status = 'in_progress'
             ORDER BY last_activity_time DESC LIMIT 1",
        )
        .bind(session_type_str(session_type))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    async fn most_recent_in_progress_session(&self) -> anyhow::Result<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT session_id, session_type, status, origin, created_at, last_activity_time,
                    problems, attempts, current_problem_index, accuracy, duration
             FROM sessions WHERE status = 'in_progress'
             ORDER BY last_activity_time DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    async fn put_session(&self, session: &Session) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::put_session_in_tx(&mut tx, session).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: Uuid) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE session_id = ?")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn seal_and_create_session<'a>(
        &self,
        sealed: Option<&'a Session>,
        created: &'a Session,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        if let Some(sealed) = sealed {
            Self::put_session_in_tx(&mut tx, sealed).await?;
        }
        Self::put_session_in_tx(&mut tx, created).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_tag_mastery(&self, tag: &str) -> anyhow::Result<Option<TagMastery>> {
        let row = sqlx::query_as::<_, TagMasteryRow>(
            "SELECT tag, total_attempts, successful_attempts, success_rate, mastered,
                    decay_score, last_recomputed_at
             FROM tag_mastery WHERE tag = ?",
        )
        .bind(tag)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TagMastery::from))
    }

    async fn scan_tag_mastery(&self) -> anyhow::Result<Vec<TagMastery>> {
        let rows = sqlx::query_as::<_, TagMasteryRow>(
            "SELECT tag, total_attempts, successful_attempts, success_rate, mastered,
                    decay_score, last_recomputed_at
             FROM tag_mastery",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TagMastery::from).collect())
    }

    async fn put_tag_mastery(&self, mastery: &TagMastery) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO tag_mastery
                (tag, total_attempts, successful_attempts, success_rate, mastered,
                 decay_score, last_recomputed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(tag) DO UPDATE SET
                total_attempts = excluded.total_attempts,
                successful_attempts = excluded.successful_attempts,
                success_rate = excluded.success_rate,
                mastered = excluded.mastered,
                decay_score = excluded.decay_score,
                last_recomputed_at = excluded.last_recomputed_at",
        )
        .bind(&mastery.tag)
        .bind(mastery.total_attempts as i64)
        .bind(mastery.successful_attempts as i64)
        .bind(mastery.success_rate)
        .bind(mastery.mastered)
        .bind(mastery.decay_score)
        .bind(mastery.last_recomputed_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_session_state(&self) -> anyhow::Result<Option<SessionState>> {
        let row = sqlx::query_as::<_, SessionStateRow>(
            "SELECT id, num_sessions_completed, current_focus_tags, performance_level,
                    last_performance_accuracy, last_performance_efficiency,
                    previous_performance_accuracy, previous_performance_efficiency,
                    last_progress_date,
                    current_difficulty_cap, session_length, number_of_new_problems,
                    current_allowed_tags
             FROM session_state WHERE id = ?",
        )
        .bind(SESSION_STATE_ID)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SessionState::try_from).transpose()
    }

    async fn put_session_state(&self, state: &SessionState) -> anyhow::Result<()> {
        let bind = SessionStateBind::try_from(state)?;

        sqlx::query(
            "INSERT INTO session_state
                (id, num_sessions_completed, current_focus_tags, performance_level,
                 last_performance_accuracy, last_performance_efficiency,
                 previous_performance_accuracy, previous_performance_efficiency,
                 last_progress_date,
                 current_difficulty_cap, session_length, number_of_new_problems,
                 current_allowed_tags)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                num_sessions_completed = excluded.num_sessions_completed,
                current_focus_tags = excluded.current_focus_tags,
                performance_level = excluded.performance_level,
                last_performance_accuracy = excluded.last_performance_accuracy,
                last_performance_efficiency = excluded.last_performance_efficiency,
                previous_performance_accuracy = excluded.previous_performance_accuracy,
                previous_performance_efficiency = excluded.previous_performance_efficiency,
                last_progress_date = excluded.last_progress_date,
                current_difficulty_cap = excluded.current_difficulty_cap,
                session_length = excluded.session_length,
                number_of_new_problems = excluded.number_of_new_problems,
                current_allowed_tags = excluded.current_allowed_tags",
        )
        .bind(SESSION_STATE_ID)
        .bind(bind.num_sessions_completed)
        .bind(&bind.current_focus_tags)
        .bind(&bind.performance_level)
        .bind(bind.last_performance_accuracy)
        .bind(bind.last_performance_efficiency)
        .bind(bind.previous_performance_accuracy)
        .bind(bind.previous_performance_efficiency)
        .bind(bind.last_progress_date)
        .bind(&bind.current_difficulty_cap)
        .bind(bind.session_length)
        .bind(bind.number_of_new_problems)
        .bind(&bind.current_allowed_tags)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_user_action(&self, action: &str, detail: &str) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO user_actions (recorded_at, action, detail) VALUES (?, ?, ?)",
        )
        .bind(Utc::now().timestamp_millis())
        .bind(action)
        .bind(detail)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
