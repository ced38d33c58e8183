//! Citation extraction: one citation per retrieved
//! context, carrying enough identity for the frontend to link back to the
//! source record.

use serde::Serialize;
use time::Date;

use crate::ids::{ClientId, SessionId};
use crate::rag::retrieval::{ClientContext, SessionContext};
use crate::vector::{ClientNoteField, SoapField};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Citation {
    Session {
        session_id: SessionId,
        client_id: ClientId,
        client_name: String,
        session_date: Date,
        similarity: f32,
        field_name: &'static str,
    },
    Client {
        client_id: ClientId,
        client_name: String,
        similarity: f32,
        field_name: &'static str,
    },
}

pub fn extract_citations(session_contexts: &[SessionContext], client_contexts: &[ClientContext]) -> Vec<Citation> {
    let mut citations: Vec<Citation> = session_contexts
        .iter()
        .map(|context| Citation::Session {
            session_id: context.session_id,
            client_id: context.client_id,
            client_name: context.client_name.clone(),
            session_date: context.session_date.date(),
            similarity: context.similarity_score,
            field_name: field_name_for(context.matched_field),
        })
        .collect();

    citations.extend(client_contexts.iter().map(|context| Citation::Client {
        client_id: context.client_id,
        client_name: context.client_name.clone(),
        similarity: context.similarity_score,
        field_name: client_field_name_for(context.matched_field),
    }));

    citations
}

fn field_name_for(field: SoapField) -> &'static str {
    field.as_str()
}

fn client_field_name_for(field: ClientNoteField) -> &'static str {
    field.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::SoapField;

    #[test]
    fn one_citation_per_session_context() {
        let session = SessionContext {
            session_id: SessionId::new(),
            client_id: ClientId::new(),
            client_name: "Jane Doe".to_string(),
            session_date: crate::time_util::now(),
            subjective: String::new(),
            objective: String::new(),
            assessment: String::new(),
            plan: String::new(),
            similarity_score: 0.8,
            weighted_score: 0.7,
            matched_field: SoapField::Assessment,
        };
        let citations = extract_citations(&[session], &[]);
        assert_eq!(citations.len(), 1);
        assert!(matches!(citations[0], Citation::Session { field_name: "assessment", .. }));
    }
}
