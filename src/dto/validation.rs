//! Validation helpers shared by the DTOs and the party services.

use std::ops::RangeInclusive;

use validator::ValidationError;

use crate::state::game::StatementDraft;

pub const GROUP_COUNT_RANGE: RangeInclusive<u32> = 0..=20;
pub const ROUND_TIMER_RANGE: RangeInclusive<u32> = 30..=300;
pub const PHASE_TIME_LIMIT_RANGE: RangeInclusive<u32> = 60..=3600;
pub const STATEMENT_TIME_LIMIT_RANGE: RangeInclusive<u32> = 30..=600;

const NICKNAME_MAX_CHARS: usize = 32;
const STATEMENT_MAX_CHARS: usize = 180;
const STATEMENTS_PER_ROUND: usize = 3;
const CUSTOM_CODE_CHARS: RangeInclusive<usize> = 3..=9;

fn error(code: &'static str, message: impl Into<String>) -> ValidationError {
    let message: String = message.into();
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

pub fn validate_group_count(groups: u32) -> Result<(), ValidationError> {
    if GROUP_COUNT_RANGE.contains(&groups) {
        Ok(())
    } else {
        Err(error(
            "groups_range",
            "groups must be an integer between 0 and 20",
        ))
    }
}

pub fn validate_round_timer(seconds: u32) -> Result<(), ValidationError> {
    if ROUND_TIMER_RANGE.contains(&seconds) {
        Ok(())
    } else {
        Err(error(
            "round_timer_range",
            "roundTimerSec must be between 30 and 300",
        ))
    }
}

pub fn validate_phase_time_limit(seconds: u32) -> Result<(), ValidationError> {
    if PHASE_TIME_LIMIT_RANGE.contains(&seconds) {
        Ok(())
    } else {
        Err(error(
            "phase_time_limit_range",
            "phaseTimeLimitSec must be between 60 and 3600",
        ))
    }
}

pub fn validate_statement_time_limit(seconds: u32) -> Result<(), ValidationError> {
    if STATEMENT_TIME_LIMIT_RANGE.contains(&seconds) {
        Ok(())
    } else {
        Err(error(
            "statement_time_limit_range",
            "statementTimeLimitSec must be between 30 and 600",
        ))
    }
}

/// Trim and uppercase a caller-supplied party code.
///
/// ```ignore
/// normalize_custom_code(" abc12 ") // Ok("ABC12")
/// normalize_custom_code("ab")      // Err - too short
/// ```
pub fn normalize_custom_code(code: &str) -> Result<String, ValidationError> {
    let normalized = code.trim().to_uppercase();
    if CUSTOM_CODE_CHARS.contains(&normalized.len())
        && normalized.chars().all(|c| c.is_ascii_alphanumeric())
    {
        Ok(normalized)
    } else {
        Err(error(
            "custom_code_format",
            "Custom code must be 3-9 alphanumeric characters",
        ))
    }
}

/// Trim a nickname and check it holds 1 to 32 characters.
pub fn normalize_nickname(nickname: &str) -> Result<String, ValidationError> {
    let cleaned = nickname.trim();
    let length = cleaned.chars().count();
    if length == 0 || length > NICKNAME_MAX_CHARS {
        return Err(error(
            "nickname_length",
            "nickname required (1-32 chars)",
        ));
    }
    Ok(cleaned.to_string())
}

/// Check a statement submission: exactly three items, exactly one lie and
/// texts of 1 to 180 characters once trimmed. Returns the trimmed drafts.
pub fn validate_statements(
    items: Vec<StatementDraft>,
) -> Result<Vec<StatementDraft>, ValidationError> {
    if items.len() != STATEMENTS_PER_ROUND {
        return Err(error(
            "statement_count",
            "exactly 3 statements required",
        ));
    }

    if items.iter().filter(|item| item.is_lie).count() != 1 {
        return Err(error("lie_count", "exactly 1 lie required"));
    }

    items
        .into_iter()
        .map(|item| {
            let text = item.text.trim();
            let length = text.chars().count();
            if length == 0 || length > STATEMENT_MAX_CHARS {
                return Err(error(
                    "statement_length",
                    "statement text must be 1-180 chars",
                ));
            }
            Ok(StatementDraft {
                text: text.to_string(),
                is_lie: item.is_lie,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(text: &str, is_lie: bool) -> StatementDraft {
        StatementDraft {
            text: text.into(),
            is_lie,
        }
    }

    fn message(err: ValidationError) -> String {
        err.message.map(|m| m.into_owned()).unwrap_or_default()
    }

    #[test]
    fn test_party_ranges() {
        assert!(validate_group_count(0).is_ok());
        assert!(validate_group_count(20).is_ok());
        assert!(validate_group_count(21).is_err());
        assert!(validate_round_timer(29).is_err());
        assert!(validate_round_timer(300).is_ok());
        assert!(validate_phase_time_limit(59).is_err());
        assert!(validate_phase_time_limit(3600).is_ok());
        assert!(validate_statement_time_limit(601).is_err());
        assert_eq!(
            message(validate_round_timer(10).unwrap_err()),
            "roundTimerSec must be between 30 and 300"
        );
    }

    #[test]
    fn test_custom_code_is_normalized() {
        assert_eq!(normalize_custom_code(" abc12 ").unwrap(), "ABC12");
        assert!(normalize_custom_code("ab").is_err());
        assert!(normalize_custom_code("ABCDEFGHIJ").is_err());
        assert!(normalize_custom_code("AB-CD").is_err());
    }

    #[test]
    fn test_nickname_bounds() {
        assert_eq!(normalize_nickname("  Ann ").unwrap(), "Ann");
        assert!(normalize_nickname("   ").is_err());
        assert!(normalize_nickname(&"x".repeat(33)).is_err());
        assert!(normalize_nickname(&"é".repeat(32)).is_ok());
    }

    #[test]
    fn test_statements_require_three_items_and_one_lie() {
        let err = validate_statements(vec![draft("a", true), draft("b", false)]).unwrap_err();
        assert_eq!(message(err), "exactly 3 statements required");

        let err = validate_statements(vec![
            draft("a", true),
            draft("b", true),
            draft("c", false),
        ])
        .unwrap_err();
        assert_eq!(message(err), "exactly 1 lie required");
    }

    #[test]
    fn test_statements_are_trimmed_and_bounded() {
        let cleaned = validate_statements(vec![
            draft("  I ran a marathon ", false),
            draft("I own a boat", true),
            draft("I speak Basque", false),
        ])
        .unwrap();
        assert_eq!(cleaned[0].text, "I ran a marathon");

        let err = validate_statements(vec![
            draft(" ", false),
            draft("b", true),
            draft("c", false),
        ])
        .unwrap_err();
        assert_eq!(message(err), "statement text must be 1-180 chars");

        assert!(
            validate_statements(vec![
                draft(&"x".repeat(181), false),
                draft("b", true),
                draft("c", false),
            ])
            .is_err()
        );
    }
}
