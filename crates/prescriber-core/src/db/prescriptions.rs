//! Prescription and artifact database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_timestamp, DbError, DbResult};
use crate::models::{Prescription, PrescriptionState, PrescriptionSummary, StructuredRecord};

/// Insert or replace a prescription row.
pub(super) fn upsert(conn: &Connection, prescription: &Prescription) -> DbResult<()> {
    let structured_json = serde_json::to_string(&prescription.structured_data)?;
    let warnings_json = serde_json::to_string(&prescription.warnings)?;

    conn.execute(
        r#"
        INSERT INTO prescriptions (
            id, raw_transcript, clean_transcript, structured_data, warnings,
            state, preview_pdf_ref, final_pdf_ref, created_at, updated_at, approved_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(id) DO UPDATE SET
            structured_data = excluded.structured_data,
            warnings = excluded.warnings,
            state = excluded.state,
            preview_pdf_ref = excluded.preview_pdf_ref,
            final_pdf_ref = excluded.final_pdf_ref,
            updated_at = excluded.updated_at,
            approved_at = excluded.approved_at
        "#,
        params![
            prescription.id,
            prescription.raw_transcript,
            prescription.clean_transcript,
            structured_json,
            warnings_json,
            prescription.state.as_str(),
            prescription.preview_pdf_ref,
            prescription.final_pdf_ref,
            prescription.created_at.to_rfc3339(),
            prescription.updated_at.to_rfc3339(),
            prescription.approved_at.map(|ts| ts.to_rfc3339()),
        ],
    )?;
    Ok(())
}

/// Get a prescription by id.
pub(super) fn get(conn: &Connection, id: &str) -> DbResult<Option<Prescription>> {
    conn.query_row(
        r#"
        SELECT id, raw_transcript, clean_transcript, structured_data, warnings,
               state, preview_pdf_ref, final_pdf_ref, created_at, updated_at, approved_at
        FROM prescriptions
        WHERE id = ?
        "#,
        [id],
        |row| {
            Ok(PrescriptionRow {
                id: row.get(0)?,
                raw_transcript: row.get(1)?,
                clean_transcript: row.get(2)?,
                structured_data: row.get(3)?,
                warnings: row.get(4)?,
                state: row.get(5)?,
                preview_pdf_ref: row.get(6)?,
                final_pdf_ref: row.get(7)?,
                created_at: row.get(8)?,
                updated_at: row.get(9)?,
                approved_at: row.get(10)?,
            })
        },
    )
    .optional()?
    .map(|row| row.try_into())
    .transpose()
}

/// List all prescriptions, newest first.
pub(super) fn list_summaries(conn: &Connection) -> DbResult<Vec<PrescriptionSummary>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, structured_data, state, created_at, approved_at
        FROM prescriptions
        ORDER BY created_at DESC
        "#,
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut summaries = Vec::new();
    for row in rows {
        let (id, structured_json, state, created_at, approved_at) = row?;
        let record: StructuredRecord = serde_json::from_str(&structured_json)?;
        summaries.push(PrescriptionSummary {
            id,
            patient_name: record.patient_name,
            state: parse_state(&state)?,
            created_at: parse_timestamp(&created_at)?,
            approved_at: approved_at.as_deref().map(parse_timestamp).transpose()?,
        });
    }
    Ok(summaries)
}

/// Store artifact bytes under a ref, replacing any previous content.
pub(super) fn put_artifact(
    conn: &Connection,
    artifact_ref: &str,
    prescription_id: &str,
    content: &[u8],
) -> DbResult<()> {
    conn.execute(
        r#"
        INSERT INTO artifacts (artifact_ref, prescription_id, content)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(artifact_ref) DO UPDATE SET
            content = excluded.content,
            updated_at = datetime('now')
        "#,
        params![artifact_ref, prescription_id, content],
    )?;
    Ok(())
}

/// Get artifact bytes by ref.
pub(super) fn get_artifact(conn: &Connection, artifact_ref: &str) -> DbResult<Option<Vec<u8>>> {
    Ok(conn
        .query_row(
            "SELECT content FROM artifacts WHERE artifact_ref = ?",
            [artifact_ref],
            |row| row.get(0),
        )
        .optional()?)
}

fn parse_state(s: &str) -> Result<PrescriptionState, DbError> {
    PrescriptionState::parse(s)
        .ok_or_else(|| DbError::Constraint(format!("Unknown prescription state: {}", s)))
}

/// Intermediate row struct for database mapping.
struct PrescriptionRow {
    id: String,
    raw_transcript: String,
    clean_transcript: String,
    structured_data: String,
    warnings: String,
    state: String,
    preview_pdf_ref: Option<String>,
    final_pdf_ref: Option<String>,
    created_at: String,
    updated_at: String,
    approved_at: Option<String>,
}

impl TryFrom<PrescriptionRow> for Prescription {
    type Error = DbError;

    fn try_from(row: PrescriptionRow) -> Result<Self, Self::Error> {
        let structured_data: StructuredRecord = serde_json::from_str(&row.structured_data)?;
        let warnings = serde_json::from_str(&row.warnings)?;
        let approved_at: Option<DateTime<Utc>> =
            row.approved_at.as_deref().map(parse_timestamp).transpose()?;

        Ok(Prescription {
            id: row.id,
            raw_transcript: row.raw_transcript,
            clean_transcript: row.clean_transcript,
            structured_data,
            warnings,
            state: parse_state(&row.state)?,
            preview_pdf_ref: row.preview_pdf_ref,
            final_pdf_ref: row.final_pdf_ref,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            approved_at,
        })
    }
}
