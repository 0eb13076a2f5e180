use crate::domain::{DomainError, Emotion, FaceAnalysis, NewPhoto, PhotoRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};

use super::SqliteRepository;

const SELECT_COLUMNS: &str = "SELECT id, url, emotion, confidence, upload_time FROM photos";

fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn face_columns(face: Option<FaceAnalysis>) -> (Option<&'static str>, Option<f64>) {
    match face {
        Some(f) => (Some(f.emotion.as_str()), Some(f.confidence as f64)),
        None => (None, None),
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<PhotoRecord> {
    let emotion: Option<String> = row.get(2)?;
    let confidence: Option<f64> = row.get(3)?;
    let upload_time: String = row.get(4)?;

    let face = match (emotion, confidence) {
        (Some(e), Some(c)) => Some(FaceAnalysis {
            emotion: e.parse::<Emotion>().map_err(|msg| conversion_error(2, msg))?,
            confidence: c as f32,
        }),
        (None, None) => None,
        (Some(_), None) => {
            return Err(conversion_error(3, "emotion stored without confidence".to_string()))
        }
        (None, Some(_)) => {
            return Err(conversion_error(2, "confidence stored without emotion".to_string()))
        }
    };

    let upload_time = DateTime::parse_from_rfc3339(&upload_time)
        .map_err(|e| conversion_error(4, e.to_string()))?
        .with_timezone(&Utc);

    Ok(PhotoRecord {
        id: row.get(0)?,
        url: row.get(1)?,
        face,
        upload_time,
    })
}

impl SqliteRepository {
    pub(crate) fn highest_id_impl(&self) -> Result<i64, DomainError> {
        self.with_conn(|conn| {
            let id = conn.query_row("SELECT COALESCE(MAX(id), 0) FROM photos", [], |r| r.get(0))?;
            Ok(id)
        })
    }

    pub(crate) fn insert_impl(&self, photo: &NewPhoto) -> Result<i64, DomainError> {
        let (emotion, confidence) = face_columns(photo.face);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO photos (url, emotion, confidence, upload_time) VALUES (?1, ?2, ?3, ?4)",
                params![photo.url, emotion, confidence, format_time(&photo.upload_time)],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub(crate) fn get_by_id_impl(&self, id: i64) -> Result<PhotoRecord, DomainError> {
        self.with_conn(|conn| {
            let record = conn.query_row(
                &format!("{} WHERE id = ?1", SELECT_COLUMNS),
                params![id],
                row_to_record,
            )?;
            Ok(record)
        })
    }

    pub(crate) fn list_all_impl(&self) -> Result<Vec<PhotoRecord>, DomainError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_COLUMNS))?;
            let rows = stmt.query_map([], row_to_record)?;
            let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    pub(crate) fn update_impl(&self, record: &PhotoRecord) -> Result<(), DomainError> {
        let (emotion, confidence) = face_columns(record.face);
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE photos SET url = ?2, emotion = ?3, confidence = ?4, upload_time = ?5
                 WHERE id = ?1",
                params![
                    record.id,
                    record.url,
                    emotion,
                    confidence,
                    format_time(&record.upload_time)
                ],
            )?;
            if changed == 0 {
                return Err(DomainError::NotFound);
            }
            Ok(())
        })
    }
}
