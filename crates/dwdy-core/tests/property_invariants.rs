use std::collections::BTreeMap;

use proptest::prelude::*;

use dwdy_core::{
    ContentDraft, ContentItem, Diary, EntryKey, Feature, FeatureStat, Journal, LayoutKind, Order,
};

#[derive(Debug, Clone)]
enum LinkAction {
    Append,
    MoveBefore { source: u8, target: u8 },
    MoveToLast { source: u8 },
    Delete { target: u8 },
}

fn link_action() -> impl Strategy<Value = LinkAction> {
    prop_oneof![
        3 => Just(LinkAction::Append),
        3 => (0u8..16, 0u8..16).prop_map(|(source, target)| LinkAction::MoveBefore { source, target }),
        1 => (0u8..16).prop_map(|source| LinkAction::MoveToLast { source }),
        1 => (0u8..16).prop_map(|target| LinkAction::Delete { target }),
    ]
}

#[derive(Debug, Clone)]
enum LabelAction {
    Add { entry: u8, value: u8 },
    Delete { entry: u8, index: u8 },
}

fn label_action() -> impl Strategy<Value = LabelAction> {
    prop_oneof![
        (0u8..3, 0u8..4).prop_map(|(entry, value)| LabelAction::Add { entry, value }),
        (0u8..3, 0u8..4).prop_map(|(entry, index)| LabelAction::Delete { entry, index }),
    ]
}

fn notebook() -> (Journal, Diary) {
    let mut journal = Journal::open_in_memory().unwrap();
    let diary = journal
        .create_diary("Props", Some(LayoutKind::Notebook))
        .unwrap();
    (journal, diary)
}

fn ordered_keys(journal: &Journal, diary: &Diary) -> Vec<EntryKey> {
    journal
        .entries(diary, Order::Asc)
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect()
}

fn pick(keys: &[EntryKey], index: u8) -> Option<EntryKey> {
    if keys.is_empty() {
        None
    } else {
        Some(keys[usize::from(index) % keys.len()].clone())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn link_operations_keep_one_head_and_one_tail(actions in prop::collection::vec(link_action(), 1..40)) {
        let (mut journal, mut diary) = notebook();

        for action in actions {
            let keys = ordered_keys(&journal, &diary);
            match action {
                LinkAction::Append => {
                    journal.append_entry(&mut diary, None).unwrap();
                }
                LinkAction::MoveBefore { source, target } => {
                    if let (Some(s), Some(t)) = (pick(&keys, source), pick(&keys, target)) {
                        journal.move_before(&mut diary, &s, &t).unwrap();
                    }
                }
                LinkAction::MoveToLast { source } => {
                    if let Some(s) = pick(&keys, source) {
                        journal.move_to_last(&mut diary, &s).unwrap();
                    }
                }
                LinkAction::Delete { target } => {
                    if let Some(t) = pick(&keys, target) {
                        journal.delete_entry(&mut diary, &t).unwrap();
                    }
                }
            }

            let report = journal.verify_links(&diary).unwrap();
            prop_assert!(report.is_consistent(), "inconsistent links: {:?}", report);

            let forward = ordered_keys(&journal, &diary);
            let mut backward: Vec<EntryKey> = journal
                .entries(&diary, Order::Desc)
                .unwrap()
                .into_iter()
                .map(|e| e.key)
                .collect();
            backward.reverse();
            prop_assert_eq!(&forward, &backward);
            prop_assert_eq!(forward.len() as u64, diary.entry_count);
            prop_assert_eq!(forward.last().cloned(), diary.last_entry_id.clone());
        }
    }

    #[test]
    fn text_add_then_delete_restores_stat(texts in prop::collection::vec("[a-z ]{0,24}", 1..8)) {
        let (mut journal, mut diary) = notebook();
        let key = journal.append_entry(&mut diary, None).unwrap().key;
        let before = diary.fetch_stat(Feature::Text);

        for text in &texts {
            journal.add_content(&mut diary, &key, ContentDraft::text(text.as_str())).unwrap();
        }
        prop_assert_eq!(diary.fetch_stat(Feature::Text).count, texts.len() as i64);

        for _ in &texts {
            journal.delete_content(&mut diary, &key, Feature::Text, 0).unwrap();
        }
        prop_assert_eq!(diary.fetch_stat(Feature::Text), before);
    }

    #[test]
    fn tag_distribution_matches_content(actions in prop::collection::vec(label_action(), 1..40)) {
        let (mut journal, mut diary) = notebook();
        let keys: Vec<EntryKey> = (0..3)
            .map(|_| journal.append_entry(&mut diary, None).unwrap().key)
            .collect();

        for action in actions {
            match action {
                LabelAction::Add { entry, value } => {
                    let key = &keys[usize::from(entry)];
                    journal
                        .add_content(&mut diary, key, ContentDraft::Tag(format!("t{value}")))
                        .unwrap();
                }
                LabelAction::Delete { entry, index } => {
                    let key = &keys[usize::from(entry)];
                    let len = journal.entry(&diary, key).unwrap().items(Feature::Tag).len();
                    let result = journal.delete_content(&mut diary, key, Feature::Tag, usize::from(index));
                    prop_assert_eq!(result.is_ok(), usize::from(index) < len);
                }
            }

            let mut expected: BTreeMap<String, i64> = BTreeMap::new();
            for key in &keys {
                for item in journal.entry(&diary, key).unwrap().items(Feature::Tag) {
                    if let ContentItem::Tag(value) = item {
                        *expected.entry(value.clone()).or_insert(0) += 1;
                    }
                }
            }

            let stat: FeatureStat = diary.fetch_stat(Feature::Tag);
            prop_assert_eq!(&stat.distribution, &expected);
            prop_assert_eq!(stat.count, expected.values().sum::<i64>());
            prop_assert!(stat.distribution.values().all(|n| *n > 0));
        }
    }
}
