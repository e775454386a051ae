//! Maps a mission's status and a viewer to the set of actions the UI may
//! offer. No action here mutates anything; each one corresponds to exactly
//! one remote call issued by the shell.

use serde::{Deserialize, Serialize};

use crate::lifecycle::MissionStatus;
use crate::models::{ApplicationId, Mission, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Buyer,
    Seller,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub user_id: UserId,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionAction {
    Apply,
    AcceptApplication(ApplicationId),
    SubmitDelivery,
    ValidateDelivery,
    DownloadDelivery,
}

impl MissionAction {
    /// Button label as the product ships it.
    pub fn label(&self) -> &'static str {
        match self {
            MissionAction::Apply => "Postuler",
            MissionAction::AcceptApplication(_) => "Accepter",
            MissionAction::SubmitDelivery => "Livrer",
            MissionAction::ValidateDelivery => "Valider la livraison",
            MissionAction::DownloadDelivery => "Télécharger la livraison",
        }
    }
}

/// Restricted action set for one viewer on one mission.
pub fn allowed_actions(mission: &Mission, viewer: &Viewer) -> Vec<MissionAction> {
    let is_owner = mission.is_owner(viewer.user_id);
    let mut actions = Vec::new();

    match mission.status {
        MissionStatus::Open => {
            if is_owner {
                for application in &mission.applications {
                    actions.push(MissionAction::AcceptApplication(application.id));
                }
            } else if viewer.role == Role::Seller {
                actions.push(MissionAction::Apply);
            }
        }
        // Funds are with the payment provider; nobody acts until the
        // server confirms the escrow.
        MissionStatus::PendingPayment => {}
        MissionStatus::InProgress => {
            let accepted_seller = mission.accepted_application().map(|a| a.seller_id);
            if !is_owner && accepted_seller == Some(viewer.user_id) {
                actions.push(MissionAction::SubmitDelivery);
            }
        }
        MissionStatus::AwaitingValidation => {
            if is_owner {
                actions.push(MissionAction::ValidateDelivery);
            }
        }
        MissionStatus::Completed => {}
    }

    if is_owner
        && mission.delivery.is_some()
        && matches!(
            mission.status,
            MissionStatus::AwaitingValidation | MissionStatus::Completed
        )
    {
        actions.push(MissionAction::DownloadDelivery);
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Application, Delivery};
    use chrono::Utc;

    const OWNER: Viewer = Viewer {
        user_id: 10,
        role: Role::Buyer,
    };
    const SELLER: Viewer = Viewer {
        user_id: 20,
        role: Role::Seller,
    };
    const OTHER_SELLER: Viewer = Viewer {
        user_id: 30,
        role: Role::Seller,
    };

    fn mission(status: MissionStatus) -> Mission {
        Mission {
            id: 1,
            owner_id: OWNER.user_id,
            title: "Site vitrine".to_string(),
            description: "Cinq pages".to_string(),
            category: "web".to_string(),
            budget_xof: 100_000,
            final_price_xof: None,
            status,
            applications: Vec::new(),
            delivery: None,
            deadline: None,
            created_at: Utc::now(),
        }
    }

    fn application(id: i64, seller_id: i64, accepted: bool) -> Application {
        Application {
            id,
            mission_id: 1,
            seller_id,
            proposal: "Je peux le faire".to_string(),
            proposed_price_xof: 5_000,
            accepted,
        }
    }

    fn delivery(seller_id: i64) -> Delivery {
        Delivery {
            id: 1,
            mission_id: 1,
            seller_id,
            file_name: "maquette.zip".to_string(),
            mime_type: "application/zip".to_string(),
            size_bytes: 1024,
            sha256: "ab".repeat(32),
            note: "Version finale".to_string(),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn open_mission_owner_sees_one_accept_per_application() {
        let mut m = mission(MissionStatus::Open);
        m.applications.push(application(1, SELLER.user_id, false));
        m.applications.push(application(2, OTHER_SELLER.user_id, false));

        let actions = allowed_actions(&m, &OWNER);
        assert_eq!(
            actions,
            vec![
                MissionAction::AcceptApplication(1),
                MissionAction::AcceptApplication(2),
            ]
        );
    }

    #[test]
    fn open_mission_non_owner_seller_sees_postuler_and_no_accept() {
        let mut m = mission(MissionStatus::Open);
        m.applications.push(application(1, OTHER_SELLER.user_id, false));

        let actions = allowed_actions(&m, &SELLER);
        assert_eq!(actions, vec![MissionAction::Apply]);
        assert_eq!(MissionAction::Apply.label(), "Postuler");
        assert!(!actions
            .iter()
            .any(|a| matches!(a, MissionAction::AcceptApplication(_))));
    }

    #[test]
    fn apply_disappears_once_status_leaves_open() {
        for status in [
            MissionStatus::PendingPayment,
            MissionStatus::InProgress,
            MissionStatus::AwaitingValidation,
            MissionStatus::Completed,
        ] {
            let m = mission(status);
            assert!(
                !allowed_actions(&m, &SELLER).contains(&MissionAction::Apply),
                "apply must not be offered in {status}"
            );
        }
    }

    #[test]
    fn accept_is_absent_for_non_owners() {
        let mut m = mission(MissionStatus::Open);
        m.applications.push(application(1, SELLER.user_id, false));

        for viewer in [SELLER, OTHER_SELLER] {
            assert!(!allowed_actions(&m, &viewer)
                .iter()
                .any(|a| matches!(a, MissionAction::AcceptApplication(_))));
        }
    }

    #[test]
    fn validate_offered_iff_awaiting_validation_and_owner() {
        let mut m = mission(MissionStatus::AwaitingValidation);
        m.applications.push(application(1, SELLER.user_id, true));
        m.delivery = Some(delivery(SELLER.user_id));

        assert!(allowed_actions(&m, &OWNER).contains(&MissionAction::ValidateDelivery));
        assert!(!allowed_actions(&m, &SELLER).contains(&MissionAction::ValidateDelivery));

        for status in [
            MissionStatus::Open,
            MissionStatus::PendingPayment,
            MissionStatus::InProgress,
            MissionStatus::Completed,
        ] {
            let mut other = mission(status);
            other.delivery = Some(delivery(SELLER.user_id));
            assert!(
                !allowed_actions(&other, &OWNER).contains(&MissionAction::ValidateDelivery),
                "validate must not be offered in {status}"
            );
        }
    }

    #[test]
    fn accepted_seller_may_deliver_in_progress_others_read_only() {
        let mut m = mission(MissionStatus::InProgress);
        m.applications.push(application(1, SELLER.user_id, true));
        m.applications.push(application(2, OTHER_SELLER.user_id, false));

        assert_eq!(
            allowed_actions(&m, &SELLER),
            vec![MissionAction::SubmitDelivery]
        );
        assert!(allowed_actions(&m, &OTHER_SELLER).is_empty());
        assert!(allowed_actions(&m, &OWNER).is_empty());
    }

    #[test]
    fn owner_downloads_delivery_once_present() {
        let mut m = mission(MissionStatus::Completed);
        m.applications.push(application(1, SELLER.user_id, true));
        m.delivery = Some(delivery(SELLER.user_id));

        assert_eq!(
            allowed_actions(&m, &OWNER),
            vec![MissionAction::DownloadDelivery]
        );
        assert!(allowed_actions(&m, &SELLER).is_empty());
    }
}
