//! Property-based tests for delivery status derivation and the lifecycle
//! state machine

use chrono::{Duration, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use orangecat_chat::client::offline::delivery::receipt_status;
use orangecat_chat::client::offline::{DeliveryStatus, DeliveryTracker, Lifecycle};
use orangecat_chat::shared::messaging::{ChatMessage, Conversation};

#[derive(Debug, Clone, Copy)]
enum Op {
    Confirm,
    Fail,
    Retry,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Confirm), Just(Op::Fail), Just(Op::Retry)]
}

proptest! {
    /// Read iff every other active participant read at or after creation
    #[test]
    fn test_read_matches_receipts(
        recipients in prop::collection::vec((prop::option::of(-60i64..60), any::<bool>()), 0..6),
    ) {
        let sender = Uuid::new_v4();
        let others: Vec<Uuid> = recipients.iter().map(|_| Uuid::new_v4()).collect();
        let mut members = vec![sender];
        members.extend(&others);
        let mut conversation = Conversation::new(members);
        let message = ChatMessage::new_optimistic(conversation.id, sender, "hi".into());

        for (user, (offset, active)) in others.iter().zip(&recipients) {
            if let Some(secs) = offset {
                conversation.record_read(*user, message.created_at + Duration::seconds(*secs));
            }
            if let Some(p) = conversation.participants.iter_mut().find(|p| p.user_id == *user) {
                p.is_active = *active;
            }
        }

        let active: Vec<_> = recipients.iter().filter(|(_, active)| *active).collect();
        let expected = if active.is_empty() {
            DeliveryStatus::Sent
        } else if active.iter().all(|(offset, _)| matches!(offset, Some(s) if *s >= 0)) {
            DeliveryStatus::Read
        } else {
            DeliveryStatus::Delivered
        };
        prop_assert_eq!(receipt_status(&message, Some(&conversation)), expected);
    }

    /// Transitions follow pending -> {confirmed, failed}, failed -> {pending, confirmed};
    /// anything else is refused and leaves the tracker unchanged
    #[test]
    fn test_lifecycle_model(ops in prop::collection::vec(op(), 0..30)) {
        let mut tracker = DeliveryTracker::pending();
        let mut retries = 0;

        for op in ops {
            let before = tracker.clone();
            let allowed = match (op, before.lifecycle()) {
                (Op::Confirm, Lifecycle::Pending | Lifecycle::Failed { .. }) => true,
                (Op::Fail, Lifecycle::Pending) => true,
                (Op::Retry, Lifecycle::Failed { .. }) => true,
                _ => false,
            };
            let result = match op {
                Op::Confirm => tracker.confirm(),
                Op::Fail => tracker.fail("boom"),
                Op::Retry => tracker.retry(),
            };
            prop_assert_eq!(result.is_ok(), allowed);
            if allowed {
                if matches!(op, Op::Retry) {
                    retries += 1;
                }
            } else {
                prop_assert_eq!(&tracker, &before);
            }
        }
        prop_assert_eq!(tracker.attempts(), 1 + retries);
    }

    /// A failed message never shows a receipt-derived status
    #[test]
    fn test_failed_wins(offset in -60i64..60) {
        let (me, them) = (Uuid::new_v4(), Uuid::new_v4());
        let mut conversation = Conversation::new_direct(me, them);
        let message = ChatMessage::new_optimistic(conversation.id, me, "x".into());
        conversation.record_read(them, Utc::now() + Duration::seconds(offset));

        let mut tracker = DeliveryTracker::pending();
        tracker.fail("offline").unwrap();
        prop_assert_eq!(tracker.status(&message, Some(&conversation)), DeliveryStatus::Failed);
    }
}
