use anyhow::Result;
use futures_util::TryStreamExt;
use sqlx::{Pool, Postgres, Row, postgres::PgPoolOptions};

use crate::antinuke::{Fingerprint, SignatureRecord};

pub type Db = Pool<Postgres>;

pub async fn connect(url: &str, max: Option<u32>) -> Result<Db> {
    let pool = PgPoolOptions::new()
        .max_connections(max.unwrap_or(10))
        .connect(url)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &Db) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/* ==============================
   Słowniki gildii
   ============================== */

/// Własne słowa gildii, w kolejności dodania.
pub async fn load_terms(db: &Db, scope_id: &str) -> Result<Vec<String>> {
    let mut rows = sqlx::query(
        "SELECT term FROM tss.lexicon_terms WHERE scope_id = $1 ORDER BY created_at, term",
    )
    .bind(scope_id)
    .fetch(db);

    let mut out = Vec::new();
    while let Some(row) = rows.try_next().await? {
        let term: String = row.try_get("term")?;
        out.push(term);
    }
    Ok(out)
}

/// Zwraca `false`, gdy słowo już było (unikalność bez względu na wielkość liter).
pub async fn add_term(db: &Db, scope_id: &str, term: &str, added_by: Option<&str>) -> Result<bool> {
    let res = sqlx::query(
        r#"INSERT INTO tss.lexicon_terms (scope_id, term, added_by, created_at)
           VALUES ($1, $2, $3, now())
           ON CONFLICT DO NOTHING"#,
    )
    .bind(scope_id)
    .bind(term)
    .bind(added_by)
    .execute(db)
    .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn remove_term(db: &Db, scope_id: &str, term: &str) -> Result<bool> {
    let res = sqlx::query("DELETE FROM tss.lexicon_terms WHERE scope_id = $1 AND lower(term) = lower($2)")
        .bind(scope_id)
        .bind(term)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

/* ==============================
   Sygnatury zagrożeń
   ============================== */

pub async fn upsert_signature(db: &Db, sig: &SignatureRecord) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO tss.threat_signatures
               (fingerprint, count, first_seen, last_seen, confidence, confirmations, dismissed)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           ON CONFLICT (fingerprint) DO UPDATE SET
               count = EXCLUDED.count,
               first_seen = LEAST(tss.threat_signatures.first_seen, EXCLUDED.first_seen),
               last_seen = GREATEST(tss.threat_signatures.last_seen, EXCLUDED.last_seen),
               confidence = EXCLUDED.confidence,
               confirmations = EXCLUDED.confirmations,
               dismissed = EXCLUDED.dismissed"#,
    )
    .bind(sig.fingerprint.as_str())
    .bind(sig.count as i64)
    .bind(sig.first_seen)
    .bind(sig.last_seen)
    .bind(sig.confidence)
    .bind(sig.confirmations as i32)
    .bind(sig.dismissed)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn load_signatures(db: &Db) -> Result<Vec<SignatureRecord>> {
    let mut rows = sqlx::query(
        r#"SELECT fingerprint, count, first_seen, last_seen, confidence, confirmations, dismissed
           FROM tss.threat_signatures"#,
    )
    .fetch(db);

    let mut out = Vec::new();
    while let Some(r) = rows.try_next().await? {
        let fingerprint: String = r.try_get("fingerprint")?;
        let count: i64 = r.try_get("count")?;
        let confirmations: i32 = r.try_get("confirmations")?;
        out.push(SignatureRecord {
            fingerprint: Fingerprint::from(fingerprint),
            count: count.max(0) as u64,
            first_seen: r.try_get("first_seen")?,
            last_seen: r.try_get("last_seen")?,
            confidence: r.try_get("confidence")?,
            confirmations: confirmations.max(0) as u32,
            dismissed: r.try_get("dismissed")?,
        });
    }
    Ok(out)
}
