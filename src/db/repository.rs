//! Bulk writes, OR/MAX upsert, transactional presentation replace
//! (spec §4.7, §4.9, §4.10).

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{Group, Inspection, InspectionDetail, InspectionResult, Presentation, Verdict};
use crate::db::pool::ConnectionPool;
use crate::error::PoolError;

fn verdict_to_str(v: Verdict) -> &'static str {
    match v {
        Verdict::NoDefect => "no_defect",
        Verdict::Minor => "minor",
        Verdict::Major => "major",
    }
}

fn verdict_from_str(s: &str) -> Verdict {
    match s {
        "major" => Verdict::Major,
        "minor" => Verdict::Minor,
        _ => Verdict::NoDefect,
    }
}

fn sql_err(e: rusqlite::Error) -> PoolError {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::DatabaseBusy
                || err.code == rusqlite::ErrorCode::DatabaseLocked =>
        {
            PoolError::Transient(e.to_string())
        }
        other => PoolError::NonTransient(other.to_string()),
    }
}

/// First-image bootstrap: creates the parent `Inspection` row and returns
/// its id before any child rows exist (spec §4.7).
pub fn create_inspection(
    pool: &ConnectionPool,
    started_at: chrono::DateTime<chrono::Local>,
    ai_threshold_percent: u8,
    file_directory: &str,
) -> Result<i64, PoolError> {
    pool.with_retry(|conn| {
        conn.execute(
            "INSERT INTO inspections (started_at, ai_threshold_percent, file_directory) VALUES (?1, ?2, ?3)",
            params![started_at.to_rfc3339(), ai_threshold_percent, file_directory],
        )
        .map_err(sql_err)?;
        Ok(conn.last_insert_rowid())
    })
}

pub fn bulk_insert_details(
    pool: &ConnectionPool,
    details: &[InspectionDetail],
) -> Result<(), PoolError> {
    if details.is_empty() {
        return Ok(());
    }
    pool.with_retry(|conn| insert_details_tx(conn, details))
}

fn insert_details_tx(conn: &Connection, details: &[InspectionDetail]) -> Result<(), PoolError> {
    let tx = conn.unchecked_transaction().map_err(sql_err)?;
    {
        let mut stmt = tx
            .prepare_cached(
                "INSERT INTO inspection_details \
                 (inspection_id, class_id, class_label, x, y, w, h, length, confidence, image_path, image_no) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )
            .map_err(sql_err)?;
        for d in details {
            stmt.execute(params![
                d.inspection_id,
                d.class_id,
                d.class_label,
                d.x,
                d.y,
                d.w,
                d.h,
                d.length,
                d.confidence,
                d.image_path,
                d.image_no,
            ])
            .map_err(sql_err)?;
        }
    }
    tx.commit().map_err(sql_err)?;
    Ok(())
}

/// OR-flags / MAX-length upsert (spec §4.7, §8 "Idempotent result
/// aggregation"). Order-independent by construction: each column update
/// reads the current row value and combines with the incoming one.
pub fn upsert_result(pool: &ConnectionPool, delta: &InspectionResult) -> Result<(), PoolError> {
    pool.with_retry(|conn| {
        let tx = conn.unchecked_transaction().map_err(sql_err)?;
        let existing: Option<(bool, bool, bool, bool, bool, bool, i64)> = tx
            .query_row(
                "SELECT discoloration, hole, knot, dead_knot, live_knot, tight_knot, length \
                 FROM inspection_results WHERE inspection_id = ?1",
                params![delta.inspection_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()
            .map_err(sql_err)?;

        let merged = match existing {
            Some((discoloration, hole, knot, dead_knot, live_knot, tight_knot, length)) => InspectionResult {
                inspection_id: delta.inspection_id,
                discoloration: discoloration || delta.discoloration,
                hole: hole || delta.hole,
                knot: knot || delta.knot,
                dead_knot: dead_knot || delta.dead_knot,
                live_knot: live_knot || delta.live_knot,
                tight_knot: tight_knot || delta.tight_knot,
                length: length.max(delta.length),
            },
            None => delta.clone(),
        };

        tx.execute(
            "INSERT INTO inspection_results \
             (inspection_id, discoloration, hole, knot, dead_knot, live_knot, tight_knot, length) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(inspection_id) DO UPDATE SET \
             discoloration=excluded.discoloration, hole=excluded.hole, knot=excluded.knot, \
             dead_knot=excluded.dead_knot, live_knot=excluded.live_knot, \
             tight_knot=excluded.tight_knot, length=excluded.length",
            params![
                merged.inspection_id,
                merged.discoloration,
                merged.hole,
                merged.knot,
                merged.dead_knot,
                merged.live_knot,
                merged.tight_knot,
                merged.length,
            ],
        )
        .map_err(sql_err)?;
        tx.commit().map_err(sql_err)?;
        Ok(())
    })
}

pub fn update_inspection_verdict(
    pool: &ConnectionPool,
    inspection_id: i64,
    any_defect_above_threshold: bool,
    candidate_verdict: Verdict,
) -> Result<(), PoolError> {
    pool.with_retry(|conn| {
        let current: String = conn
            .query_row(
                "SELECT verdict FROM inspections WHERE inspection_id = ?1",
                params![inspection_id],
                |row| row.get(0),
            )
            .map_err(sql_err)?;
        let current_verdict = verdict_from_str(&current);
        // verdict is only ever upgraded, never downgraded (spec §4.8, §8)
        let new_verdict = current_verdict.max(candidate_verdict);
        conn.execute(
            "UPDATE inspections SET any_defect_above_threshold = any_defect_above_threshold OR ?1, verdict = ?2 \
             WHERE inspection_id = ?3",
            params![any_defect_above_threshold, verdict_to_str(new_verdict), inspection_id],
        )
        .map_err(sql_err)?;
        Ok(())
    })
}

pub fn load_details(pool: &ConnectionPool, inspection_id: i64) -> Result<Vec<InspectionDetail>, PoolError> {
    pool.with_retry(|conn| {
        let mut stmt = conn
            .prepare_cached(
                "SELECT inspection_id, class_id, class_label, x, y, w, h, length, confidence, image_path, image_no \
                 FROM inspection_details WHERE inspection_id = ?1",
            )
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![inspection_id], |row| {
                Ok(InspectionDetail {
                    inspection_id: row.get(0)?,
                    class_id: row.get(1)?,
                    class_label: row.get(2)?,
                    x: row.get(3)?,
                    y: row.get(4)?,
                    w: row.get(5)?,
                    h: row.get(6)?,
                    length: row.get(7)?,
                    confidence: row.get(8)?,
                    image_path: row.get(9)?,
                    image_no: row.get(10)?,
                })
            })
            .map_err(sql_err)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(sql_err)?);
        }
        Ok(out)
    })
}

pub fn load_inspection(pool: &ConnectionPool, inspection_id: i64) -> Result<Inspection, PoolError> {
    pool.with_retry(|conn| {
        conn.query_row(
            "SELECT inspection_id, started_at, ai_threshold_percent, file_directory, any_defect_above_threshold, verdict \
             FROM inspections WHERE inspection_id = ?1",
            params![inspection_id],
            |row| {
                let started_at: String = row.get(1)?;
                let verdict: String = row.get(5)?;
                Ok(Inspection {
                    inspection_id: row.get(0)?,
                    started_at: chrono::DateTime::parse_from_rfc3339(&started_at)
                        .unwrap_or_else(|_| chrono::Local::now().into())
                        .with_timezone(&chrono::Local),
                    ai_threshold_percent: row.get(2)?,
                    file_directory: row.get(3)?,
                    any_defect_above_threshold: row.get(4)?,
                    verdict: verdict_from_str(&verdict),
                })
            },
        )
        .map_err(sql_err)
    })
}

/// Replaces all presentation rows for an inspection in one transaction
/// (spec §4.9 step 7): `DELETE WHERE inspection_id=?` then bulk insert.
pub fn replace_presentations(
    pool: &ConnectionPool,
    inspection_id: i64,
    rows: &[Presentation],
) -> Result<(), PoolError> {
    pool.with_retry(|conn| {
        let tx = conn.unchecked_transaction().map_err(sql_err)?;
        tx.execute(
            "DELETE FROM presentations WHERE inspection_id = ?1",
            params![inspection_id],
        )
        .map_err(sql_err)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO presentations (inspection_id, group_name, image_path) VALUES (?1, ?2, ?3)",
                )
                .map_err(sql_err)?;
            for row in rows {
                stmt.execute(params![row.inspection_id, row.group_name.label(), row.image_path])
                    .map_err(sql_err)?;
            }
        }
        tx.commit().map_err(sql_err)?;
        Ok(())
    })
}

pub fn load_presentations(pool: &ConnectionPool, inspection_id: i64) -> Result<Vec<Presentation>, PoolError> {
    pool.with_retry(|conn| {
        let mut stmt = conn
            .prepare_cached("SELECT group_name, image_path FROM presentations WHERE inspection_id = ?1")
            .map_err(sql_err)?;
        let rows = stmt
            .query_map(params![inspection_id], |row| {
                let group_name: String = row.get(0)?;
                let group = match group_name.as_str() {
                    "A" => Group::A,
                    "B" => Group::B,
                    "C" => Group::C,
                    "D" => Group::D,
                    _ => Group::E,
                };
                Ok(Presentation {
                    inspection_id,
                    group_name: group,
                    image_path: row.get(1)?,
                })
            })
            .map_err(sql_err)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r.map_err(sql_err)?);
        }
        Ok(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fresh_pool() -> ConnectionPool {
        let tmp = std::env::temp_dir().join(format!(
            "wood-inspect-repo-{}-{}.db",
            std::process::id(),
            rand::random::<u32>()
        ));
        ConnectionPool::new(&tmp, 5, Duration::from_millis(500)).unwrap()
    }

    #[test]
    fn create_then_load_inspection_roundtrips() {
        let pool = fresh_pool();
        let id = create_inspection(&pool, chrono::Local::now(), 50, "/tmp/x").unwrap();
        let loaded = load_inspection(&pool, id).unwrap();
        assert_eq!(loaded.inspection_id, id);
        assert_eq!(loaded.ai_threshold_percent, 50);
        assert_eq!(loaded.verdict, Verdict::NoDefect);
    }

    #[test]
    fn upsert_result_is_order_independent() {
        let pool = fresh_pool();
        let id = create_inspection(&pool, chrono::Local::now(), 50, "/tmp/x").unwrap();

        let mut r1 = InspectionResult::new(id);
        r1.hole = true;
        r1.length = 3;

        let mut r2 = InspectionResult::new(id);
        r2.dead_knot = true;
        r2.knot = true;
        r2.length = 12;

        upsert_result(&pool, &r2).unwrap();
        upsert_result(&pool, &r1).unwrap();

        let pool2 = pool;
        let final_row = pool2.with_retry(|conn| {
            conn.query_row(
                "SELECT hole, dead_knot, knot, length FROM inspection_results WHERE inspection_id=?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, bool>(0)?,
                        row.get::<_, bool>(1)?,
                        row.get::<_, bool>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .map_err(sql_err)
        }).unwrap();
        assert_eq!(final_row, (true, true, true, 12));
    }

    #[test]
    fn verdict_only_upgrades() {
        let pool = fresh_pool();
        let id = create_inspection(&pool, chrono::Local::now(), 50, "/tmp/x").unwrap();
        update_inspection_verdict(&pool, id, true, Verdict::Major).unwrap();
        update_inspection_verdict(&pool, id, true, Verdict::Minor).unwrap();
        let loaded = load_inspection(&pool, id).unwrap();
        assert_eq!(loaded.verdict, Verdict::Major);
    }

    #[test]
    fn replace_presentations_is_transactional_and_wholesale() {
        let pool = fresh_pool();
        let id = create_inspection(&pool, chrono::Local::now(), 50, "/tmp/x").unwrap();
        let first = vec![Presentation {
            inspection_id: id,
            group_name: Group::A,
            image_path: "a.bmp".into(),
        }];
        replace_presentations(&pool, id, &first).unwrap();
        let second = vec![
            Presentation {
                inspection_id: id,
                group_name: Group::B,
                image_path: "b.bmp".into(),
            },
            Presentation {
                inspection_id: id,
                group_name: Group::C,
                image_path: "c.bmp".into(),
            },
        ];
        replace_presentations(&pool, id, &second).unwrap();
        let loaded = load_presentations(&pool, id).unwrap();
        assert_eq!(loaded.len(), 2);
    }
}
