//! Advisor personas and prompt construction
//!
//! Each panel member plays a distinct table persona. The persona template
//! supplies tone, guidelines, and generation limits; this module folds the
//! current table snapshot into the final prompt pair. Advisors must answer
//! with a single JSON object so the validator can hold them to a schema.

use crate::types::{PersonaTemplate, TableState};

/// System prompt skeleton shared by every persona.
const OPINION_PROMPT: &str = r#"You are a poker advisor on a decision panel.
{tone}

### GUIDELINES
{guidelines}

### INSTRUCTIONS
1. Recommend exactly one action for the hero seat.
2. Allowed actions: fold, check, call, raise.
3. Respond with ONLY a JSON object. No preamble. No markdown.

### OUTPUT FORMAT
{"action": "<fold|check|call|raise>", "confidence": <0.0-1.0>, "rationale": "<one sentence>"}"#;

/// Built-in persona library.
///
/// The default panel ships three table archetypes; deployments override or
/// extend this list in configuration.
pub fn builtin_personas() -> Vec<PersonaTemplate> {
    vec![
        PersonaTemplate {
            id: "solid-reg".to_string(),
            tone: "You are a disciplined, balanced regular who respects position and pot odds."
                .to_string(),
            guidelines: vec![
                "Prefer the highest-equity line, not the flashiest".to_string(),
                "Fold when the price is clearly wrong".to_string(),
            ],
            max_tokens: 96,
            temperature: 0.2,
        },
        PersonaTemplate {
            id: "lag".to_string(),
            tone: "You are a loose-aggressive player who applies maximum pressure.".to_string(),
            guidelines: vec![
                "Look for profitable bluffing opportunities".to_string(),
                "Attack capped ranges and weakness".to_string(),
            ],
            max_tokens: 96,
            temperature: 0.6,
        },
        PersonaTemplate {
            id: "nit".to_string(),
            tone: "You are an extremely tight player who avoids marginal spots.".to_string(),
            guidelines: vec![
                "Only continue with strong holdings".to_string(),
                "Preserve the stack above all".to_string(),
            ],
            max_tokens: 96,
            temperature: 0.1,
        },
    ]
}

/// Render the persona's system prompt.
pub fn build_system_prompt(persona: &PersonaTemplate) -> String {
    let guidelines = persona
        .guidelines
        .iter()
        .map(|g| format!("- {g}"))
        .collect::<Vec<_>>()
        .join("\n");
    OPINION_PROMPT
        .replace("{tone}", &persona.tone)
        .replace("{guidelines}", &guidelines)
}

/// Render the user prompt: table snapshot plus caller-supplied context.
pub fn build_user_prompt(state: &TableState, prompt_context: &str) -> String {
    let legal = state
        .legal_actions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let mut prompt = format!(
        "Street: {street} | Seat: {seat}\n\
         Pot: {pot:.1} | To call: {to_call:.1} | Stack: {stack:.1}\n\
         Legal actions: {legal}",
        street = state.street,
        seat = state.hero_seat,
        pot = state.pot,
        to_call = state.amount_to_call,
        stack = state.hero_stack,
    );
    if !prompt_context.is_empty() {
        prompt.push_str("\n\n### CONTEXT\n");
        prompt.push_str(prompt_context);
    }
    prompt
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionType, Street};

    fn state() -> TableState {
        TableState {
            round_id: "r1".to_string(),
            street: Street::Flop,
            hero_seat: 2,
            pot: 100.0,
            amount_to_call: 25.0,
            hero_stack: 400.0,
            legal_actions: vec![ActionType::Fold, ActionType::Call, ActionType::Raise],
            legal_raise: None,
        }
    }

    #[test]
    fn system_prompt_carries_persona_voice() {
        let personas = builtin_personas();
        let prompt = build_system_prompt(&personas[0]);
        assert!(prompt.contains("disciplined"));
        assert!(prompt.contains("- Fold when the price is clearly wrong"));
        assert!(prompt.contains("OUTPUT FORMAT"));
    }

    #[test]
    fn user_prompt_carries_table_snapshot() {
        let prompt = build_user_prompt(&state(), "villain has been 3-betting wide");
        assert!(prompt.contains("Street: flop"));
        assert!(prompt.contains("To call: 25.0"));
        assert!(prompt.contains("fold, call, raise"));
        assert!(prompt.contains("3-betting wide"));
    }

    #[test]
    fn builtin_persona_ids_are_unique() {
        let personas = builtin_personas();
        let mut ids: Vec<&str> = personas.iter().map(|p| p.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), personas.len());
    }
}
