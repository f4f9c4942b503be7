#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::transitions::*;
    use crate::types::*;

    fn ctx_with(justification: Option<&str>, is_owner: bool) -> TransitionCtx {
        TransitionCtx { justification: justification.map(String::from), is_owner }
    }

    #[test]
    fn happy_path_rows_exist() {
        assert!(can_transition(EntityStatus::Posted, EntityStatus::Matched, Role::System));
        assert!(can_transition(EntityStatus::Matched, EntityStatus::Scheduled, Role::Operator));
        assert!(can_transition(EntityStatus::Scheduled, EntityStatus::PickedUp, Role::Driver));
        assert!(can_transition(EntityStatus::PickedUp, EntityStatus::Delivered, Role::Driver));
    }

    #[test]
    fn self_transition_rejected() {
        assert!(!can_transition(EntityStatus::Posted, EntityStatus::Posted, Role::Admin));
    }

    #[test]
    fn admin_admitted_on_every_row() {
        for rule in TRANSITION_TABLE {
            assert!(
                can_transition(rule.from, rule.to, Role::Admin),
                "admin should pass {} -> {}",
                rule.from,
                rule.to
            );
        }
    }

    #[test]
    fn unlisted_role_rejected() {
        assert!(!can_transition(EntityStatus::Matched, EntityStatus::Scheduled, Role::Driver));
        assert!(!can_transition(EntityStatus::Scheduled, EntityStatus::PickedUp, Role::Recipient));
        assert!(!can_transition(EntityStatus::Posted, EntityStatus::Expired, Role::Supplier));
    }

    #[test]
    fn terminal_states_absorb() {
        let terminals = [
            EntityStatus::Delivered,
            EntityStatus::Canceled,
            EntityStatus::Failed,
            EntityStatus::Expired,
            EntityStatus::Closed,
        ];
        for from in terminals {
            assert!(is_terminal(from));
            for rule in TRANSITION_TABLE {
                assert_ne!(rule.from, from, "terminal {} must have no outgoing row", from);
            }
        }
    }

    #[test]
    fn cancel_requires_justification() {
        let err = transition(
            EntityStatus::Posted,
            EntityStatus::Canceled,
            Role::Operator,
            &ctx_with(None, false),
        )
        .unwrap_err();
        assert!(err.to_string().contains("justification"));

        let blank = transition(
            EntityStatus::Posted,
            EntityStatus::Canceled,
            Role::Operator,
            &ctx_with(Some("   "), false),
        );
        assert!(blank.is_err());

        transition(
            EntityStatus::Posted,
            EntityStatus::Canceled,
            Role::Operator,
            &ctx_with(Some("supplier request"), false),
        )
        .unwrap();
    }

    #[test]
    fn owner_may_cancel_only_when_owner() {
        // A supplier that owns the listing may cancel it while posted.
        transition(
            EntityStatus::Posted,
            EntityStatus::Canceled,
            Role::Supplier,
            &ctx_with(Some("no longer available"), true),
        )
        .unwrap();

        // The same role without ownership is rejected.
        assert!(transition(
            EntityStatus::Posted,
            EntityStatus::Canceled,
            Role::Supplier,
            &ctx_with(Some("no longer available"), false),
        )
        .is_err());
    }

    #[test]
    fn in_flight_cancel_is_privileged_only() {
        // Once scheduled, even the owner cannot cancel; operators can.
        assert!(!can_transition(EntityStatus::Scheduled, EntityStatus::Canceled, Role::Supplier));
        transition(
            EntityStatus::Scheduled,
            EntityStatus::Canceled,
            Role::Operator,
            &ctx_with(Some("driver unavailable"), false),
        )
        .unwrap();
    }

    #[test]
    fn recovery_rows_need_justification() {
        assert!(transition(
            EntityStatus::Scheduled,
            EntityStatus::Matched,
            Role::Operator,
            &ctx_with(None, false),
        )
        .is_err());
        transition(
            EntityStatus::PickedUp,
            EntityStatus::Scheduled,
            Role::Admin,
            &ctx_with(Some("scanned at wrong stop"), false),
        )
        .unwrap();
    }

    #[test]
    fn next_actions_reports_justification_flag() {
        let actions = next_actions(EntityStatus::Scheduled, Role::Operator);
        let cancel = actions
            .iter()
            .find(|a| a.to == EntityStatus::Canceled)
            .expect("operator can cancel a scheduled entity");
        assert!(cancel.requires_justification);

        let driver_actions = allowed_transitions(EntityStatus::Scheduled, Role::Driver);
        assert!(driver_actions.contains(&EntityStatus::PickedUp));
        assert!(!driver_actions.contains(&EntityStatus::Matched));
    }

    #[test]
    fn window_overlap_clamps_to_zero() {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let a = TimeWindow::new(base, base + Duration::hours(2));
        let b = TimeWindow::new(base + Duration::hours(1), base + Duration::hours(8));
        assert_eq!(a.overlap(&b), Duration::hours(1));

        let disjoint = TimeWindow::new(base + Duration::hours(5), base + Duration::hours(6));
        assert_eq!(a.overlap(&disjoint), Duration::zero());
    }

    #[test]
    fn category_families() {
        assert_eq!(Category::PerishableFood.family(), CategoryFamily::Food);
        assert_eq!(Category::Water.family(), CategoryFamily::Food);
        assert_eq!(Category::HygieneProducts.family(), CategoryFamily::Medical);
        assert_eq!(Category::Tents.family(), CategoryFamily::Shelter);
        assert_eq!(Category::PetSupplies.family(), CategoryFamily::Supplies);
    }

    #[test]
    fn status_serializes_snake_case() {
        let s = serde_json::to_string(&EntityStatus::PickedUp).unwrap();
        assert_eq!(s, "\"picked_up\"");
    }
}
