//! Anchor insertion is independent of the order sub-artifacts are supplied in.

use proptest::prelude::*;
use scribe::assembly::{insert_sub_artifacts, SubArtifact};

/// Words tagged with their position, so no word occurs inside another.
fn unique_words() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z]{3,8}", 4..16).prop_map(|words| {
        words
            .into_iter()
            .enumerate()
            .map(|(i, w)| format!("{}_{}_", w, i))
            .collect()
    })
}

fn block(description: &str, body: &str) -> String {
    format!("\n\n**Visualization:** {}\n\n```\n{}\n```\n", description, body)
}

proptest! {
    #[test]
    fn insertion_ignores_input_order(
        words in unique_words(),
        picks in proptest::collection::vec(any::<prop::sample::Index>(), 1..5),
        shift in any::<usize>(),
    ) {
        let text = words.join(" ");
        let subs: Vec<SubArtifact> = picks
            .iter()
            .enumerate()
            .map(|(i, pick)| {
                let anchor = words[pick.index(words.len())].clone();
                SubArtifact::new(format!("figure {}", i), anchor, format!("draw({})", i))
            })
            .collect();

        let mut reversed = subs.clone();
        reversed.reverse();
        let mut rotated = subs.clone();
        let len = rotated.len();
        rotated.rotate_left(shift % len);

        let forward = insert_sub_artifacts(&text, &subs);
        prop_assert_eq!(&forward, &insert_sub_artifacts(&text, &reversed));
        prop_assert_eq!(&forward, &insert_sub_artifacts(&text, &rotated));
        for sub in &subs {
            prop_assert_eq!(forward.matches(sub.generated_body.as_str()).count(), 1);
        }
    }

    #[test]
    fn adjacent_anchors_are_each_followed_by_their_block(
        words in unique_words(),
        at in any::<prop::sample::Index>(),
        swap in any::<bool>(),
    ) {
        let first = at.index(words.len() - 1);
        let text = words.join(" ");
        let mut subs = vec![
            SubArtifact::new("left", words[first].clone(), "left_body()"),
            SubArtifact::new("right", words[first + 1].clone(), "right_body()"),
        ];
        if swap {
            subs.reverse();
        }

        let result = insert_sub_artifacts(&text, &subs);

        let left = format!("{}{}", words[first], block("left", "left_body()"));
        let right = format!("{}{}", words[first + 1], block("right", "right_body()"));
        prop_assert!(result.contains(&left));
        prop_assert!(result.contains(&right));
        prop_assert!(result.find(&left).unwrap() < result.find(&right).unwrap());
    }

    #[test]
    fn nested_anchors_keep_both_blocks(
        stem in "[a-z]{3,6}",
        tail in "[a-z]{3,6}",
    ) {
        // The short anchor is a prefix of the long one, so both start at one offset.
        let long = format!("{}{}", stem, tail);
        let text = format!("1 {} 2", long);
        let subs = vec![
            SubArtifact::new("short", stem.clone(), "short_body()"),
            SubArtifact::new("long", long.clone(), "long_body()"),
        ];

        let result = insert_sub_artifacts(&text, &subs);

        let expected = format!(
            "1 {}{}{}{} 2",
            stem,
            block("short", "short_body()"),
            tail,
            block("long", "long_body()")
        );
        prop_assert_eq!(result, expected);
    }
}
