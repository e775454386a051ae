use chrono::Utc;

use crate::models::{ApplicationDraft, MissionDraft};

/// Client-side checks before a mission is created. The server re-validates;
/// these only catch what would be a guaranteed 400.
pub fn validate_mission_draft(draft: &MissionDraft) -> Result<(), Vec<String>> {
    let mut errs = Vec::new();

    if draft.title.trim().is_empty() {
        errs.push("Title is mandatory".to_string());
    }
    if draft.description.trim().is_empty() {
        errs.push("Description is mandatory".to_string());
    }
    if draft.category.trim().is_empty() {
        errs.push("Category is mandatory".to_string());
    }
    if draft.budget_xof <= 0 {
        errs.push("Budget must be a positive XOF amount".to_string());
    }
    if let Some(deadline) = draft.deadline {
        if deadline < Utc::now().date_naive() {
            errs.push("Deadline must not be in the past".to_string());
        }
    }

    if errs.is_empty() {
        Ok(())
    } else {
        Err(errs)
    }
}

pub fn validate_application_draft(draft: &ApplicationDraft) -> Result<(), Vec<String>> {
    let mut errs = Vec::new();

    if draft.proposal.trim().is_empty() {
        errs.push("Proposal text is mandatory".to_string());
    }
    if draft.proposed_price_xof <= 0 {
        errs.push("Proposed price must be a positive XOF amount".to_string());
    }

    if errs.is_empty() {
        Ok(())
    } else {
        Err(errs)
    }
}

/// Withdrawal amount must stay within the seller's balance.
pub fn validate_withdrawal(amount_xof: i64, balance_xof: i64) -> Result<(), Vec<String>> {
    let mut errs = Vec::new();

    if amount_xof <= 0 {
        errs.push("Amount must be a positive XOF amount".to_string());
    } else if amount_xof > balance_xof {
        errs.push(format!(
            "Amount {amount_xof} XOF exceeds available balance {balance_xof} XOF"
        ));
    }

    if errs.is_empty() {
        Ok(())
    } else {
        Err(errs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn draft() -> MissionDraft {
        MissionDraft {
            title: "Traduction FR/EN".to_string(),
            description: "Dix pages".to_string(),
            category: "redaction".to_string(),
            budget_xof: 25_000,
            deadline: None,
        }
    }

    #[test]
    fn valid_draft_passes() {
        assert!(validate_mission_draft(&draft()).is_ok());
    }

    #[test]
    fn empty_title_and_budget_accumulate() {
        let mut d = draft();
        d.title = "  ".to_string();
        d.budget_xof = 0;
        let errs = validate_mission_draft(&d).unwrap_err();
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn past_deadline_is_rejected() {
        let mut d = draft();
        d.deadline = Some((Utc::now() - Duration::days(2)).date_naive());
        assert!(validate_mission_draft(&d).is_err());
    }

    #[test]
    fn withdrawal_within_balance_passes() {
        assert!(validate_withdrawal(10_000, 120_000).is_ok());
        assert!(validate_withdrawal(120_000, 120_000).is_ok());
    }

    #[test]
    fn withdrawal_over_balance_is_rejected() {
        let errs = validate_withdrawal(150_000, 120_000).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].contains("exceeds"));
    }

    #[test]
    fn non_positive_withdrawal_is_rejected() {
        assert!(validate_withdrawal(0, 120_000).is_err());
        assert!(validate_withdrawal(-5, 120_000).is_err());
    }
}
