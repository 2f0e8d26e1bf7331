//! [`SqliteStore`], the SQLite implementation of [`EvaluationStore`].

use std::{
  collections::{HashMap, HashSet},
  path::Path,
};

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use checker_core::{
  evaluation::{Evaluation, EvaluationWithAnswers, EvaluatorType, NewEvaluation},
  pool::{Application, NewApplication, Pool, PoolKey},
  rubric::EvaluationQuestion,
  store::EvaluationStore,
};

use crate::{
  Error, Result,
  encode::{
    RawAnswer, RawApplication, RawEvaluation, RawPool, RawQuestion,
    encode_answer, encode_dt, encode_evaluator_type, encode_status,
  },
  schema::SCHEMA,
};

// ─── Row mappers ─────────────────────────────────────────────────────────────

const POOL_COLUMNS: &str = "id, chain_id, allo_pool_id, created_at";

const APPLICATION_SELECT: &str =
  "SELECT a.id, a.chain_id, a.allo_application_id, a.pool_id, p.profile_id
   FROM applications a
   JOIN profiles p ON p.id = a.profile_id";

const EVALUATION_COLUMNS: &str = "id, application_id, evaluator, evaluator_type, summary,
   evaluator_score, evaluation_status, metadata_cid, created_at";

fn pool_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPool> {
  Ok(RawPool {
    id:           row.get(0)?,
    chain_id:     row.get(1)?,
    allo_pool_id: row.get(2)?,
    created_at:   row.get(3)?,
  })
}

fn application_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawApplication> {
  Ok(RawApplication {
    id:                  row.get(0)?,
    chain_id:            row.get(1)?,
    allo_application_id: row.get(2)?,
    pool_id:             row.get(3)?,
    profile_id:          row.get(4)?,
  })
}

fn question_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawQuestion> {
  Ok(RawQuestion {
    id:             row.get(0)?,
    pool_id:        row.get(1)?,
    question_index: row.get(2)?,
    question:       row.get(3)?,
  })
}

fn evaluation_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEvaluation> {
  Ok(RawEvaluation {
    id:                row.get(0)?,
    application_id:    row.get(1)?,
    evaluator:         row.get(2)?,
    evaluator_type:    row.get(3)?,
    summary:           row.get(4)?,
    evaluator_score:   row.get(5)?,
    evaluation_status: row.get(6)?,
    metadata_cid:      row.get(7)?,
    created_at:        row.get(8)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An evaluation store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── EvaluationStore impl ────────────────────────────────────────────────────

impl EvaluationStore for SqliteStore {
  type Error = Error;

  // ── Pools ─────────────────────────────────────────────────────────────────

  async fn upsert_pool(&self, key: PoolKey) -> Result<Pool> {
    let created_at = encode_dt(Utc::now());

    let raw: RawPool = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO pools (chain_id, allo_pool_id, created_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (chain_id, allo_pool_id) DO NOTHING",
          rusqlite::params![key.chain_id, key.allo_pool_id, created_at],
        )?;
        Ok(conn.query_row(
          &format!(
            "SELECT {POOL_COLUMNS} FROM pools WHERE chain_id = ?1 AND allo_pool_id = ?2"
          ),
          rusqlite::params![key.chain_id, key.allo_pool_id],
          pool_row,
        )?)
      })
      .await?;

    raw.into_pool()
  }

  async fn get_pool(&self, key: PoolKey) -> Result<Option<Pool>> {
    let raw: Option<RawPool> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {POOL_COLUMNS} FROM pools WHERE chain_id = ?1 AND allo_pool_id = ?2"
              ),
              rusqlite::params![key.chain_id, key.allo_pool_id],
              pool_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPool::into_pool).transpose()
  }

  async fn list_pools(&self) -> Result<Vec<Pool>> {
    let raws: Vec<RawPool> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {POOL_COLUMNS} FROM pools ORDER BY id"))?;
        let rows = stmt
          .query_map([], pool_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPool::into_pool).collect()
  }

  // ── Rubric ────────────────────────────────────────────────────────────────

  async fn get_rubric(&self, pool_id: i64) -> Result<Vec<EvaluationQuestion>> {
    let raws: Vec<RawQuestion> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, pool_id, question_index, question
           FROM evaluation_questions
           WHERE pool_id = ?1
           ORDER BY question_index",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![pool_id], question_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawQuestion::into_question).collect()
  }

  async fn reset_rubric(
    &self,
    pool_id:   i64,
    questions: Vec<String>,
  ) -> Result<Vec<EvaluationQuestion>> {
    let outcome: Option<(usize, Vec<RawQuestion>)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM pools WHERE id = ?1",
            rusqlite::params![pool_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }

        // Answers of these evaluations point at the indices being replaced.
        let dropped = tx.execute(
          "DELETE FROM evaluations
           WHERE application_id IN (SELECT id FROM applications WHERE pool_id = ?1)",
          rusqlite::params![pool_id],
        )?;
        tx.execute(
          "DELETE FROM evaluation_questions WHERE pool_id = ?1",
          rusqlite::params![pool_id],
        )?;

        let mut rows = Vec::with_capacity(questions.len());
        for (index, question) in questions.into_iter().enumerate() {
          let index = index as i64;
          tx.execute(
            "INSERT INTO evaluation_questions (pool_id, question_index, question)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![pool_id, index, question],
          )?;
          rows.push(RawQuestion {
            id: tx.last_insert_rowid(),
            pool_id,
            question_index: index,
            question,
          });
        }

        tx.commit()?;
        Ok(Some((dropped, rows)))
      })
      .await?;

    let (dropped, raws) = outcome.ok_or(Error::PoolNotFound(pool_id))?;
    tracing::debug!(
      pool_id,
      questions = raws.len(),
      dropped_evaluations = dropped,
      "rubric reset"
    );
    raws.into_iter().map(RawQuestion::into_question).collect()
  }

  // ── Applications ──────────────────────────────────────────────────────────

  async fn upsert_applications(
    &self,
    pool:         Pool,
    applications: Vec<NewApplication>,
  ) -> Result<Vec<Application>> {
    let raws: Vec<RawApplication> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut seen = HashSet::new();
        let mut created = Vec::new();

        for app in applications {
          if !seen.insert(app.allo_application_id.clone()) {
            continue;
          }

          let exists = tx
            .query_row(
              "SELECT 1 FROM applications
               WHERE allo_application_id = ?1 AND pool_id = ?2 AND chain_id = ?3",
              rusqlite::params![app.allo_application_id, pool.id, pool.chain_id],
              |_| Ok(()),
            )
            .optional()?
            .is_some();
          if exists {
            continue;
          }

          tx.execute(
            "INSERT INTO profiles (profile_id) VALUES (?1)
             ON CONFLICT (profile_id) DO NOTHING",
            rusqlite::params![app.profile_id],
          )?;
          let profile_row: i64 = tx.query_row(
            "SELECT id FROM profiles WHERE profile_id = ?1",
            rusqlite::params![app.profile_id],
            |r| r.get(0),
          )?;

          tx.execute(
            "INSERT INTO applications (chain_id, allo_application_id, pool_id, profile_id)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
              pool.chain_id,
              app.allo_application_id,
              pool.id,
              profile_row
            ],
          )?;

          created.push(RawApplication {
            id:                  tx.last_insert_rowid(),
            chain_id:            pool.chain_id,
            allo_application_id: app.allo_application_id,
            pool_id:             pool.id,
            profile_id:          app.profile_id,
          });
        }

        tx.commit()?;
        Ok(created)
      })
      .await?;

    Ok(raws.into_iter().map(RawApplication::into_application).collect())
  }

  async fn get_application(
    &self,
    key:                 PoolKey,
    allo_application_id: String,
  ) -> Result<Option<Application>> {
    let raw: Option<RawApplication> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "{APPLICATION_SELECT}
                 JOIN pools pl ON pl.id = a.pool_id
                 WHERE pl.chain_id = ?1
                   AND pl.allo_pool_id = ?2
                   AND a.allo_application_id = ?3"
              ),
              rusqlite::params![key.chain_id, key.allo_pool_id, allo_application_id],
              application_row,
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(RawApplication::into_application))
  }

  async fn list_applications(&self, pool_id: i64) -> Result<Vec<Application>> {
    let raws: Vec<RawApplication> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{APPLICATION_SELECT} WHERE a.pool_id = ?1 ORDER BY a.id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![pool_id], application_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawApplication::into_application).collect())
  }

  async fn applications_without_evaluation(
    &self,
    pool_id:        i64,
    evaluator_type: EvaluatorType,
  ) -> Result<Vec<Application>> {
    let type_str = encode_evaluator_type(evaluator_type).to_owned();

    let raws: Vec<RawApplication> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "{APPLICATION_SELECT}
           LEFT JOIN evaluations e
             ON e.application_id = a.id AND e.evaluator_type = ?2
           WHERE a.pool_id = ?1 AND e.id IS NULL
           ORDER BY a.id"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![pool_id, type_str], application_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(raws.into_iter().map(RawApplication::into_application).collect())
  }

  // ── Evaluations ───────────────────────────────────────────────────────────

  async fn replace_evaluation(&self, input: NewEvaluation) -> Result<Evaluation> {
    let created_at = Utc::now();
    let raw = RawEvaluation {
      id:                0,
      application_id:    input.application_id,
      evaluator:         input.evaluator,
      evaluator_type:    encode_evaluator_type(input.evaluator_type).to_owned(),
      summary:           input.summary,
      evaluator_score:   i64::from(input.evaluator_score),
      evaluation_status: encode_status(input.evaluation_status).to_owned(),
      metadata_cid:      input.metadata_cid,
      created_at:        encode_dt(created_at),
    };
    let answers: Vec<(u32, &'static str)> = input
      .answers
      .iter()
      .map(|(index, answer)| (*index, encode_answer(*answer)))
      .collect();

    let written: Result<RawEvaluation> = self
      .conn
      .call(move |conn| {
        let mut raw = raw;
        let tx = conn.transaction()?;

        let pool_id: Option<i64> = tx
          .query_row(
            "SELECT pool_id FROM applications WHERE id = ?1",
            rusqlite::params![raw.application_id],
            |r| r.get(0),
          )
          .optional()?;
        let Some(pool_id) = pool_id else {
          return Ok(Err(Error::ApplicationNotFound(raw.application_id)));
        };

        let question_ids: HashMap<i64, i64> = {
          let mut stmt = tx.prepare(
            "SELECT question_index, id FROM evaluation_questions WHERE pool_id = ?1",
          )?;
          stmt
            .query_map(rusqlite::params![pool_id], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?
        };

        // Resolve every index before writing anything.
        let mut resolved = Vec::with_capacity(answers.len());
        for (index, answer) in answers {
          match question_ids.get(&i64::from(index)) {
            Some(question_id) => resolved.push((*question_id, answer)),
            None => {
              return Ok(Err(Error::StaleQuestionIndex {
                pool_id,
                question_index: index,
              }));
            }
          }
        }

        tx.execute(
          "DELETE FROM evaluations WHERE evaluator = ?1 AND application_id = ?2",
          rusqlite::params![raw.evaluator, raw.application_id],
        )?;

        tx.execute(
          "INSERT INTO evaluations (
             application_id, evaluator, evaluator_type, summary,
             evaluator_score, evaluation_status, metadata_cid, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            raw.application_id,
            raw.evaluator,
            raw.evaluator_type,
            raw.summary,
            raw.evaluator_score,
            raw.evaluation_status,
            raw.metadata_cid,
            raw.created_at,
          ],
        )?;
        raw.id = tx.last_insert_rowid();

        for (question_id, answer) in resolved {
          tx.execute(
            "INSERT INTO evaluation_answers (evaluation_id, evaluation_question_id, answer)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![raw.id, question_id, answer],
          )?;
        }

        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    let evaluation = written?.into_evaluation()?;
    tracing::debug!(
      evaluation_id = evaluation.id,
      application_id = evaluation.application_id,
      evaluator = %evaluation.evaluator,
      "evaluation written"
    );
    Ok(evaluation)
  }

  async fn evaluations_for_application(
    &self,
    application_id: i64,
  ) -> Result<Vec<EvaluationWithAnswers>> {
    let (evaluations, answers): (Vec<RawEvaluation>, Vec<RawAnswer>) = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EVALUATION_COLUMNS} FROM evaluations
           WHERE application_id = ?1
           ORDER BY id"
        ))?;
        let evaluations = stmt
          .query_map(rusqlite::params![application_id], evaluation_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare(
          "SELECT ans.id, ans.evaluation_id, ans.evaluation_question_id,
                  q.question_index, ans.answer
           FROM evaluation_answers ans
           JOIN evaluations e          ON e.id = ans.evaluation_id
           JOIN evaluation_questions q ON q.id = ans.evaluation_question_id
           WHERE e.application_id = ?1
           ORDER BY ans.evaluation_id, q.question_index",
        )?;
        let answers = stmt
          .query_map(rusqlite::params![application_id], |row| {
            Ok(RawAnswer {
              id:                     row.get(0)?,
              evaluation_id:          row.get(1)?,
              evaluation_question_id: row.get(2)?,
              question_index:         row.get(3)?,
              answer:                 row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((evaluations, answers))
      })
      .await?;

    let mut by_evaluation: HashMap<i64, Vec<_>> = HashMap::new();
    for raw in answers {
      let answer = raw.into_answer()?;
      by_evaluation.entry(answer.evaluation_id).or_default().push(answer);
    }

    evaluations
      .into_iter()
      .map(|raw| {
        let evaluation = raw.into_evaluation()?;
        let answers = by_evaluation.remove(&evaluation.id).unwrap_or_default();
        Ok(EvaluationWithAnswers { evaluation, answers })
      })
      .collect()
  }

  async fn clean_evaluations(&self) -> Result<u64> {
    let removed = self
      .conn
      .call(|conn| {
        Ok(conn.execute(
          "DELETE FROM evaluations
           WHERE id NOT IN (SELECT DISTINCT evaluation_id FROM evaluation_answers)",
          [],
        )?)
      })
      .await?;
    Ok(removed as u64)
  }
}
