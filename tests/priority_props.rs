//! Property tests for pattern priority

use proptest::prelude::*;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use vmconsole::{first_match, Matcher, Pattern, Session};

fn literal(word: &str) -> Pattern {
    Pattern::new(&regex::escape(word)).unwrap()
}

/// Index of the first word, in declaration order, present in `text`
fn expected_winner(words: &[String], text: &str) -> Option<usize> {
    words.iter().position(|w| text.contains(w.as_str()))
}

proptest! {
    #[test]
    fn prop_lowest_index_wins(
        words in prop::collection::vec("[a-z]{2,6}", 1..6),
        present in prop::collection::vec(any::<bool>(), 6),
        noise in "[A-Z ]{0,12}",
    ) {
        // Present words are written in reverse declaration order, so later
        // patterns always sit earlier in the buffer.
        let text: String = words
            .iter()
            .zip(&present)
            .rev()
            .filter(|(_, present)| **present)
            .map(|(word, _)| format!("{noise}{word} "))
            .collect();

        let patterns: Vec<Pattern> = words.iter().map(|w| literal(w)).collect();
        let found = first_match(&patterns, text.as_bytes());

        prop_assert_eq!(found.as_ref().map(|(i, _)| *i), expected_winner(&words, &text));
        if let Some((index, m)) = found {
            prop_assert_eq!(&text.as_bytes()[m.start..m.end], words[index].as_bytes());
            prop_assert!(patterns[index].find(text.as_bytes()).is_some());
        }
    }

    #[test]
    fn prop_expect_one_of_prefers_first_declared(
        words in prop::collection::vec("[a-z]{3,6}", 2..5),
    ) {
        // The first declared word is written last
        let text: String = words.iter().rev().map(|w| format!("{w}\r\n")).collect();
        let patterns: Vec<Pattern> = words.iter().map(|w| literal(w)).collect();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let winners = runtime.block_on(async {
            let (client, mut console) = tokio::io::duplex(1024);
            let mut session = Session::builder().attach(client);

            console.write_all(text.as_bytes()).await.unwrap();
            drop(console);

            let mut winners = Vec::new();
            while let Ok(result) = session
                .expect_one_of(&patterns, Duration::from_secs(1))
                .await
            {
                winners.push(result.pattern_index);
            }
            winners
        });

        prop_assert!(!winners.is_empty());
        prop_assert!(winners.iter().all(|&index| index == 0), "{:?}", winners);
    }
}
