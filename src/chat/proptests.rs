//! Property-based tests for the conversation model
//!
//! - Serialization preserves turn order, roles and text exactly
//! - The visible view is always the conversation minus the seed prefix

use super::{Conversation, Role, Turn, SEED_TURNS};
use proptest::prelude::*;

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::System), Just(Role::User), Just(Role::Assistant)]
}

fn arb_turn() -> impl Strategy<Value = Turn> {
    (arb_role(), "(?s).{0,200}").prop_map(|(role, content)| Turn { role, content })
}

fn arb_conversation() -> impl Strategy<Value = Conversation> {
    proptest::collection::vec(arb_turn(), 0..20).prop_map(Conversation::from)
}

proptest! {
    #[test]
    fn prop_json_round_trip_preserves_turns(conv in arb_conversation()) {
        let encoded = serde_json::to_string(&conv).unwrap();
        let decoded: Conversation = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(decoded.turns(), conv.turns());
    }

    #[test]
    fn prop_visible_is_suffix_after_seed_turns(conv in arb_conversation()) {
        let visible = conv.visible();
        prop_assert_eq!(visible.len(), conv.len().saturating_sub(SEED_TURNS));
        if conv.len() > SEED_TURNS {
            prop_assert_eq!(visible, &conv.turns()[SEED_TURNS..]);
        }
    }

    #[test]
    fn prop_each_push_grows_visible_by_one(
        transcript in "[a-zA-Z0-9 .]{10,100}",
        extra in proptest::collection::vec(arb_turn(), 0..10),
    ) {
        let mut conv = Conversation::seed(transcript, "TSLA", 2, 2022);
        for turn in &extra {
            conv.push(turn.clone());
        }
        prop_assert_eq!(conv.visible().len(), extra.len());
        prop_assert!(conv.is_usable());
    }
}
