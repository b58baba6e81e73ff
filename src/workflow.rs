//! Lead conversion: a lead becomes a client with a scheduled viewing.
//!
//! The steps run one after another with no rollback. A failure part way leaves the earlier
//! writes in place.

use bson::{Bson, Document as BsonDocument, doc};
use chrono::{DateTime, Utc};

use crate::document::ID_FIELD;
use crate::engine::Engine;
use crate::errors::DbError;
use crate::query::{CmpOp, Filter, telemetry};
use crate::types::DocumentId;

pub const LEADS: &str = "leads";
pub const CLIENTS: &str = "clients";
pub const VIEWINGS: &str = "viewings";

pub const STATUS_SCHEDULED: &str = "scheduled";
pub const STATUS_CONVERTED: &str = "converted";

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub property_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub client_id: DocumentId,
    pub viewing_id: DocumentId,
    /// False when an existing client with the lead's email was reused.
    pub client_created: bool,
}

/// Converts a lead: upserts the client by email, books the viewing, marks the lead converted.
///
/// # Errors
/// `NoSuchDocument` for an unknown lead, `NoSuchCollection` when one of the three
/// collections is missing.
pub fn convert_lead(engine: &Engine, lead_id: &DocumentId, req: &ConversionRequest) -> Result<Conversion, DbError> {
    let lead = engine
        .get_record(LEADS, lead_id)?
        .ok_or_else(|| DbError::NoSuchDocument(lead_id.to_string()))?;

    let (client_id, client_created) = upsert_client(engine, lead_id, &lead)?;

    let scheduled = Bson::DateTime(bson::DateTime::from_millis(req.scheduled_at.timestamp_millis()));
    let mut viewing = doc! {
        "property": req.property_id.as_str(),
        "client": client_id.to_string(),
        "lead": lead_id.to_string(),
        "status": STATUS_SCHEDULED,
        "scheduledAt": scheduled,
    };
    if let Some(notes) = &req.notes {
        viewing.insert("notes", notes.as_str());
    }
    let viewing_id = engine.insert(VIEWINGS, viewing)?;
    telemetry::log_write("insert", VIEWINGS, &viewing_id.to_string());

    engine.set_fields(LEADS, lead_id, doc! { "status": STATUS_CONVERTED })?;
    telemetry::log_write("update", LEADS, &lead_id.to_string());

    log::info!("converted lead {lead_id} to client {client_id}");
    Ok(Conversion { client_id, viewing_id, client_created })
}

fn contact_fields(lead: &BsonDocument) -> BsonDocument {
    let mut out = BsonDocument::new();
    for key in ["name", "email", "phone"] {
        if let Some(v) = lead.get(key)
            && !matches!(v, Bson::Null)
        {
            out.insert(key, v.clone());
        }
    }
    out
}

fn upsert_client(engine: &Engine, lead_id: &DocumentId, lead: &BsonDocument) -> Result<(DocumentId, bool), DbError> {
    let contact = contact_fields(lead);
    let existing = match lead.get_str("email") {
        Ok(email) if !email.trim().is_empty() => {
            let by_email = Filter::Cmp { path: "email".into(), op: CmpOp::Eq, value: Bson::String(email.to_string()) };
            engine.find_one(CLIENTS, &by_email)?
        }
        _ => None,
    };

    if let Some(rec) = existing {
        let id: DocumentId = rec.get_str(ID_FIELD).map_err(|e| DbError::Storage(e.to_string()))?.parse()?;
        engine.set_fields(CLIENTS, &id, contact)?;
        telemetry::log_write("update", CLIENTS, &id.to_string());
        return Ok((id, false));
    }

    let mut client = contact;
    client.insert("leadId", lead_id.to_string());
    let id = engine.insert(CLIENTS, client)?;
    telemetry::log_write("insert", CLIENTS, &id.to_string());
    Ok((id, true))
}
