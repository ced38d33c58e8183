//! Context formatting for the synthesis prompt. Two
//! sections — client profiles, then session notes — each with a
//! language-dependent header. Session blocks are numbered in chronological
//! (ascending date) order so the LLM sees the clinical history unfold
//! forwards in time, even though retrieval itself ranked them by weighted
//! similarity.

use crate::rag::language::Language;
use crate::rag::retrieval::{ClientContext, SessionContext};

fn or_na(field: &str) -> &str {
    if field.trim().is_empty() {
        "N/A"
    } else {
        field
    }
}

fn client_section_header(language: Language) -> &'static str {
    match language {
        Language::English => "=== Relevant Client Profiles ===",
        Language::Hebrew => "=== פרופילי מטופלים רלוונטיים ===",
    }
}

fn session_section_header(language: Language) -> &'static str {
    match language {
        Language::English => "=== Relevant Treatment Session Notes ===",
        Language::Hebrew => "=== רשומות טיפול רלוונטיות ===",
    }
}

fn format_client_block(context: &ClientContext, language: Language) -> String {
    let percent = (context.similarity_score * 100.0).round();
    match language {
        Language::English => format!(
            "Client: {}\nMatched field: {} (similarity: {percent:.0}%)\nMedical history: {}\nNotes: {}\n",
            context.client_name,
            context.matched_field.as_str(),
            context.medical_history.as_deref().map(or_na).unwrap_or("N/A"),
            context.notes.as_deref().map(or_na).unwrap_or("N/A"),
        ),
        Language::Hebrew => format!(
            "מטופל: {}\nשדה תואם: {} (דמיון: {percent:.0}%)\nהיסטוריה רפואית: {}\nהערות: {}\n",
            context.client_name,
            context.matched_field.as_str(),
            context.medical_history.as_deref().map(or_na).unwrap_or("N/A"),
            context.notes.as_deref().map(or_na).unwrap_or("N/A"),
        ),
    }
}

fn format_session_block(index: usize, context: &SessionContext, language: Language) -> String {
    let percent = (context.similarity_score * 100.0).round();
    let date = context.session_date.date();
    match language {
        Language::English => format!(
            "{index}. Client: {} | Date: {date} | Matched field: {} (similarity: {percent:.0}%)\n\
             Subjective: {}\nObjective: {}\nAssessment: {}\nPlan: {}\n",
            context.client_name,
            context.matched_field.as_str(),
            or_na(&context.subjective),
            or_na(&context.objective),
            or_na(&context.assessment),
            or_na(&context.plan),
        ),
        Language::Hebrew => format!(
            "{index}. מטופל: {} | תאריך: {date} | שדה תואם: {} (דמיון: {percent:.0}%)\n\
             סובייקטיבי: {}\nאובייקטיבי: {}\nהערכה: {}\nתוכנית: {}\n",
            context.client_name,
            context.matched_field.as_str(),
            or_na(&context.subjective),
            or_na(&context.objective),
            or_na(&context.assessment),
            or_na(&context.plan),
        ),
    }
}

/// Renders both sections. Sessions are re-sorted by date ascending here;
/// the caller's ordering (by weighted similarity) only matters for which
/// sessions made the cut, not for how they're presented.
pub fn format_context(client_contexts: &[ClientContext], session_contexts: &[SessionContext], language: Language) -> String {
    let mut sections = Vec::new();

    if !client_contexts.is_empty() {
        let mut block = String::new();
        block.push_str(client_section_header(language));
        block.push('\n');
        for context in client_contexts {
            block.push_str(&format_client_block(context, language));
        }
        sections.push(block);
    }

    if !session_contexts.is_empty() {
        let mut ordered: Vec<&SessionContext> = session_contexts.iter().collect();
        ordered.sort_by_key(|c| c.session_date);

        let mut block = String::new();
        block.push_str(session_section_header(language));
        block.push('\n');
        for (i, context) in ordered.iter().enumerate() {
            block.push_str(&format_session_block(i + 1, context, language));
        }
        sections.push(block);
    }

    sections.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{ClientId, SessionId};
    use crate::vector::{ClientNoteField, SoapField};

    fn session(date_offset_days: i64, similarity: f32) -> SessionContext {
        SessionContext {
            session_id: SessionId::new(),
            client_id: ClientId::new(),
            client_name: "Jane Doe".to_string(),
            session_date: crate::time_util::now() - time::Duration::days(date_offset_days),
            subjective: "back pain".to_string(),
            objective: String::new(),
            assessment: "strain".to_string(),
            plan: String::new(),
            similarity_score: similarity,
            weighted_score: similarity,
            matched_field: SoapField::Subjective,
        }
    }

    #[test]
    fn empty_fields_render_as_na() {
        let formatted = format_context(&[], &[session(1, 0.9)], Language::English);
        assert!(formatted.contains("Objective: N/A"));
        assert!(formatted.contains("Subjective: back pain"));
    }

    #[test]
    fn sessions_are_numbered_chronologically_ascending() {
        let older = session(30, 0.5);
        let newer = session(1, 0.9);
        // Pass in weighted-score order (newer first); formatting must still
        // number them oldest-first.
        let formatted = format_context(&[], &[newer, older], Language::English);
        let older_pos = formatted.find("1.").unwrap();
        let newer_pos = formatted.find("2.").unwrap();
        assert!(older_pos < newer_pos);
    }

    #[test]
    fn no_contexts_produce_no_sections() {
        assert_eq!(format_context(&[], &[], Language::English), "");
    }

    #[test]
    fn client_block_uses_language_specific_header() {
        let client = ClientContext {
            client_id: ClientId::new(),
            client_name: "Jane Doe".to_string(),
            medical_history: None,
            notes: None,
            similarity_score: 0.8,
            matched_field: ClientNoteField::MedicalHistory,
        };
        let formatted = format_context(&[client], &[], Language::Hebrew);
        assert!(formatted.starts_with("=== פרופילי מטופלים רלוונטיים ==="));
    }
}
