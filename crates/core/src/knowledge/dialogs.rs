//! Ready-made question/answer pairs written by the consultants.
//!
//! File layout: blocks separated by blank lines. A line starting with `Вопрос:`
//! (or `Q:`) opens the question, `Ответ:` (or `A:`) opens the answer; lines without
//! a marker continue the current part.

use crate::text::{stem, tokenize};

/// Share of the query's distinctive stems that must appear in a stored question.
pub const DIALOG_MATCH_THRESHOLD: f64 = 0.5;

const QUESTION_MARKERS: [&str; 3] = ["вопрос:", "клиент:", "q:"];
const ANSWER_MARKERS: [&str; 3] = ["ответ:", "менеджер:", "a:"];

const STOP_WORDS: &[&str] = &[
    "здравствуйте", "добрый", "день", "вечер", "подскажите", "пожалуйста", "скажите",
    "можно", "если", "меня", "мне", "этот", "этого", "какой", "какая", "какие", "спасибо",
    "хочу", "нужно", "надо", "есть", "вашем", "ваши", "ваш",
];

/// Stems shared by most questions in the base. They never make two questions similar on their own.
const GENERIC_STEMS: &[&str] = &[
    "получ", "обуче", "учить", "докум", "прогр", "курсы", "курса", "курсо", "после", "когда",
    "сколь", "через", "нужен", "нужна",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogueExample {
    pub question: String,
    pub answer: String,
}

#[derive(Clone, Debug, Default)]
pub struct DialogueStore {
    examples: Vec<(DialogueExample, Vec<String>)>,
}

fn key_stems(text: &str) -> Vec<String> {
    let mut keys: Vec<String> = tokenize(text)
        .into_iter()
        .filter(|token| token.chars().count() >= 4 && !STOP_WORDS.contains(&token.as_str()))
        .map(|token| stem(&token))
        .filter(|stem| !GENERIC_STEMS.contains(&stem.as_str()))
        .collect();
    keys.sort();
    keys.dedup();
    keys
}

fn strip_marker<'a>(line: &'a str, markers: &[&str]) -> Option<&'a str> {
    let lowered = line.to_lowercase();
    markers.iter().find_map(|marker| {
        if lowered.starts_with(marker) {
            line.get(marker.len()..).map(str::trim)
        } else {
            None
        }
    })
}

impl DialogueStore {
    pub fn parse(raw: &str) -> Self {
        let mut examples = Vec::new();
        let mut question = String::new();
        let mut answer = String::new();
        let mut in_answer = false;

        let mut flush = |question: &mut String, answer: &mut String| {
            if !question.trim().is_empty() && !answer.trim().is_empty() {
                let example = DialogueExample {
                    question: question.trim().to_owned(),
                    answer: answer.trim().to_owned(),
                };
                let stems = key_stems(&example.question);
                examples.push((example, stems));
            }
            question.clear();
            answer.clear();
        };

        for line in raw.lines() {
            if let Some(rest) = strip_marker(line.trim_start(), &QUESTION_MARKERS) {
                flush(&mut question, &mut answer);
                question.push_str(rest);
                in_answer = false;
            } else if let Some(rest) = strip_marker(line.trim_start(), &ANSWER_MARKERS) {
                answer.push_str(rest);
                in_answer = true;
            } else if line.trim().is_empty() {
                if in_answer {
                    answer.push('\n');
                }
            } else if in_answer {
                if !answer.is_empty() && !answer.ends_with('\n') {
                    answer.push('\n');
                }
                answer.push_str(line.trim_end());
            } else {
                question.push(' ');
                question.push_str(line.trim());
            }
        }
        flush(&mut question, &mut answer);

        Self { examples }
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Stored questions sharing enough distinctive stems with `query`, closest first.
    pub fn candidates(&self, query: &str, limit: usize) -> Vec<&DialogueExample> {
        let query_stems = key_stems(query);
        if query_stems.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize, &DialogueExample)> = self
            .examples
            .iter()
            .enumerate()
            .filter_map(|(index, (example, stems))| {
                let common = query_stems.iter().filter(|stem| stems.contains(stem)).count();
                let score = common as f64 / query_stems.len() as f64;
                (common > 0 && score >= DIALOG_MATCH_THRESHOLD).then_some((common, index, example))
            })
            .collect();
        scored.sort_by(|left, right| right.0.cmp(&left.0).then(left.1.cmp(&right.1)));
        scored.into_iter().take(limit).map(|(_, _, example)| example).collect()
    }
}
