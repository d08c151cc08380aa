//! Example guide: sentences that expose recognizable attention patterns.
//!
//! Pure content, no computation. The web UI renders it on its own page and
//! the CLI prints it.

use serde::Serialize;

/// One illustrative example.
#[derive(Debug, Clone, Serialize)]
pub struct GuideExample {
    pub title: &'static str,
    /// What the example is meant to reveal.
    pub summary: &'static str,
    /// Sentences to paste into the viewer, one per line.
    pub sentences: &'static [&'static str],
    /// Qualitative expectation for the heatmap.
    pub expectation: &'static str,
    /// Query token whose row is worth inspecting, with the key tokens it
    /// is expected to favour.
    pub focus: Option<(&'static str, &'static [&'static str])>,
}

impl GuideExample {
    /// All sentences joined the way the viewer's text area expects them.
    pub fn text(&self) -> String {
        self.sentences.join("\n")
    }

    /// Viewer URL with the example pre-filled.
    pub fn viewer_link(&self) -> String {
        viewer_link(&self.text())
    }

    /// The row worth inspecting, e.g. `it → ball`.
    pub fn focus_hint(&self) -> Option<String> {
        self.focus
            .map(|(query, keys)| format!("{query} → {}", keys.join(", ")))
    }
}

/// Viewer URL with `text` pre-filled.
pub fn viewer_link(text: &str) -> String {
    format!("/?text={}", urlencoding::encode(text))
}

static EXAMPLES: [GuideExample; 5] = [
    GuideExample {
        title: "Pronoun resolution",
        summary: "Shows whether the model links a pronoun (it, he, she) to the noun it refers to.",
        sentences: &["The robot picked up the ball because it was heavy."],
        expectation: "Look at the row of the token `it`. The column of `ball` should be one of \
                      the brightest cells, showing that the model reads \"it\" as the ball \
                      and not the robot.",
        focus: Some(("it", &["ball"])),
    },
    GuideExample {
        title: "Subject-verb-object",
        summary: "Reveals how the main action (the verb) connects to who performs it and who receives it.",
        sentences: &["The programmer wrote the code."],
        expectation: "In the row of the verb `wrote` expect high scores for both `programmer` \
                      (the subject) and `code` (the object): attention tracing the \
                      grammatical structure.",
        focus: Some(("wrote", &["programmer", "code"])),
    },
    GuideExample {
        title: "Long-distance dependencies",
        summary: "Transformers connect words that sit far apart in a sentence. This example tests that.",
        sentences: &["The dog that chased the cat across the yard finally took a nap."],
        expectation: "Find the row of the final verb phrase, `nap` (or `took`). It should give a \
                      surprisingly high score to the main subject `dog` despite the distance.",
        focus: Some(("took", &["dog"])),
    },
    GuideExample {
        title: "Ambiguity resolution",
        summary: "Context changes the meaning of a word and therefore its attention pattern.",
        sentences: &[
            "The bank of the river is steep.",
            "He deposited money in the bank.",
        ],
        expectation: "Run each sentence separately. In the first, `bank` attends strongly to \
                      `river`; in the second, to `money` and `deposited`. Attention is dynamic \
                      and depends on context.",
        focus: Some(("bank", &["river", "money", "deposited"])),
    },
    GuideExample {
        title: "Punctuation and special tokens",
        summary: "How the model treats tokens that are not words: punctuation and its own control tokens.",
        sentences: &["Apples are sweet."],
        expectation: "The final `.` will probably attend to the last word, `sweet`. You will also \
                      see the special tokens `[CLS]` and `[SEP]`; `[CLS]` often aggregates the \
                      meaning of the whole sentence, so it may spread attention over many tokens.",
        focus: Some((".", &["sweet"])),
    },
];

/// The examples in display order.
pub fn examples() -> &'static [GuideExample] {
    &EXAMPLES
}
