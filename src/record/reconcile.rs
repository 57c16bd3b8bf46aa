//! Deterministic second stage of a merge.
//!
//! The model proposes a candidate record; this pass holds it to the previous
//! record: known quantities, units and dimensions survive unless the answer
//! explicitly corrects them, dropped lines come back, and sections the answer
//! did not touch are kept.

use super::{normalize, LogEntry, MaterialLine, OrderRequest, Record};
use regex::Regex;
use std::sync::OnceLock;

fn working_time_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(stunden?|std\.?|h|hours?|arbeitszeit|gearbeitet|worked)\b")
            .expect("valid working time regex")
    })
}

/// Whether `answer` talks about working time.
fn mentions_working_time(answer: &str) -> bool {
    working_time_regex().is_match(answer)
}

/// Lowercased article name with collapsed whitespace, used to match lines.
fn article_key(article: &str) -> String {
    article
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether `longer` is `shorter` followed by more words ("kupferrohr 16 zoll" / "kupferrohr").
fn extends(longer: &str, shorter: &str) -> bool {
    !shorter.is_empty()
        && longer.len() > shorter.len()
        && longer.starts_with(shorter)
        && longer[shorter.len()..].starts_with(' ')
}

/// Units and dimension words; they never identify an article on their own.
const MEASURE_WORDS: &[&str] = &[
    "zoll", "mm", "cm", "m", "meter", "qm", "m²", "m2", "m³", "m3", "kg", "g", "l", "liter",
    "stück", "stk", "dn", "x", "mal",
];

/// Words that turn a mention into a correction or a removal.
const CORRECTION_WORDS: &[&str] = &[
    "nur", "nicht", "weg", "raus", "statt", "stattdessen", "korrektur", "gestrichen", "zurück",
    "only", "not", "instead", "remove", "wrong",
];
const CORRECTION_PREFIXES: &[&str] = &["korrigier", "streich", "falsch", "kein", "entfern", "correct"];

const NUMBER_WORDS: &[&str] = &[
    "ein", "eine", "einen", "einem", "einer", "zwei", "drei", "vier", "fünf", "sechs", "sieben",
    "acht", "neun", "zehn", "elf", "zwölf", "zwanzig", "dreißig", "fünfzig", "hundert", "halb",
    "halbe", "halben", "anderthalb",
];

/// How far (in words) a number may stand from the article to count as its quantity.
const NUMBER_WINDOW: usize = 2;

/// Lowercased words of `text` with surrounding punctuation removed.
fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Stem of the article's head noun: the first word that is neither a number nor a unit.
///
/// The last two characters are cut off so inflected forms still match
/// ("Platte" / "Platten"), keeping at least four.
fn head_stem(article: &str) -> Option<String> {
    let head = words(article).into_iter().find(|w| {
        w.chars().count() >= 3
            && !w.chars().any(|c| c.is_ascii_digit())
            && !MEASURE_WORDS.contains(&w.as_str())
    })?;
    let count = head.chars().count();
    let keep = if count > 4 { (count - 2).max(4) } else { count };
    Some(head.chars().take(keep).collect())
}

/// Position of the first answer word that refers to `article`.
fn refers_to_article(answer_words: &[String], article: &str) -> Option<usize> {
    let stem = head_stem(article)?;
    answer_words.iter().position(|w| w.contains(&stem))
}

fn is_correction_word(word: &str) -> bool {
    CORRECTION_WORDS.contains(&word) || CORRECTION_PREFIXES.iter().any(|p| word.starts_with(p))
}

fn is_number_word(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_digit()) || NUMBER_WORDS.contains(&word)
}

/// Whether `answer` explicitly corrects `article`.
///
/// The answer has to name the article's head noun and either use correction
/// wording or put a number next to it. Mentioning the article alone is not enough.
fn explicitly_corrects(answer: &str, article: &str) -> bool {
    let answer_words = words(answer);
    let Some(pos) = refers_to_article(&answer_words, article) else {
        return false;
    };

    let lo = pos.saturating_sub(NUMBER_WINDOW);
    let hi = (pos + NUMBER_WINDOW).min(answer_words.len() - 1);
    let number_nearby = (lo..=hi)
        .filter(|&idx| idx != pos)
        .any(|idx| is_number_word(&answer_words[idx]));

    number_nearby || answer_words.iter().any(|w| is_correction_word(w))
}

/// Find the candidate line that continues a named `previous` line.
///
/// Exact key matches win over prefix matches; a prefix match in either direction
/// covers a dimension appended to (or dropped from) the article name.
fn find_match(previous: &MaterialLine, candidates: &[MaterialLine], used: &[bool]) -> Option<usize> {
    let key = article_key(&previous.article);
    if key.is_empty() {
        return None;
    }

    let free = |idx: &usize| !used[*idx];

    (0..candidates.len())
        .filter(free)
        .find(|&idx| article_key(&candidates[idx].article) == key)
        .or_else(|| {
            (0..candidates.len()).filter(free).find(|&idx| {
                let other = article_key(&candidates[idx].article);
                extends(&other, &key) || extends(&key, &other)
            })
        })
}

/// Find the candidate line that names a previously unnamed line.
///
/// Same quantity and unit wins; otherwise the free candidate in the same position.
fn find_unnamed_match(
    previous: &MaterialLine,
    position: usize,
    candidates: &[MaterialLine],
    used: &[bool],
) -> Option<usize> {
    let unit = |line: &MaterialLine| line.unit.as_deref().map(str::to_lowercase);

    (0..candidates.len())
        .filter(|&idx| !used[idx])
        .find(|&idx| {
            let candidate = &candidates[idx];
            previous.quantity.is_some()
                && candidate.quantity == previous.quantity
                && unit(candidate) == unit(previous)
        })
        .or_else(|| (position < candidates.len() && !used[position]).then_some(position))
}

fn merge_line(previous: &MaterialLine, candidate: MaterialLine, answer: &str) -> MaterialLine {
    let corrected = explicitly_corrects(answer, &previous.article);

    let prev_key = article_key(&previous.article);
    let cand_key = article_key(&candidate.article);
    let article = if cand_key.is_empty() || extends(&prev_key, &cand_key) {
        previous.article.clone()
    } else {
        candidate.article
    };

    let quantity = match previous.quantity.filter(|q| *q > 0.0) {
        Some(known) => match candidate.quantity.filter(|q| *q > 0.0) {
            Some(new) if corrected => Some(new),
            _ => Some(known),
        },
        None => candidate.quantity,
    };

    let unit = if corrected {
        candidate.unit.or_else(|| previous.unit.clone())
    } else {
        previous.unit.clone().or(candidate.unit)
    };

    MaterialLine {
        article,
        quantity,
        unit,
    }
}

fn reconcile_lines(
    previous: &[MaterialLine],
    candidates: Vec<MaterialLine>,
    answer: &str,
) -> Vec<MaterialLine> {
    let mut used = vec![false; candidates.len()];
    let mut matches: Vec<Option<usize>> = vec![None; previous.len()];

    // Named lines claim their candidates first.
    for (pos, line) in previous.iter().enumerate() {
        if let Some(idx) = find_match(line, &candidates, &used) {
            used[idx] = true;
            matches[pos] = Some(idx);
        }
    }
    for (pos, line) in previous.iter().enumerate() {
        if !article_key(&line.article).is_empty() {
            continue;
        }
        if let Some(idx) = find_unnamed_match(line, pos, &candidates, &used) {
            used[idx] = true;
            matches[pos] = Some(idx);
        }
    }

    let mut slots: Vec<Option<MaterialLine>> = candidates.into_iter().map(Some).collect();
    let mut result = Vec::with_capacity(previous.len() + slots.len());

    for (line, found) in previous.iter().zip(matches) {
        match found.and_then(|idx| slots[idx].take()) {
            Some(candidate) => result.push(merge_line(line, candidate, answer)),
            // Dropped by the model: only an explicit correction may remove it.
            None if explicitly_corrects(answer, &line.article) => {}
            None => result.push(line.clone()),
        }
    }

    result.extend(slots.into_iter().flatten());
    result
}

fn reconcile_entry(previous: &LogEntry, candidate: LogEntry, answer: &str) -> LogEntry {
    let activity = if candidate.activity.is_empty() {
        previous.activity.clone()
    } else {
        candidate.activity
    };

    let hours_worked = match previous.hours_worked.filter(|h| *h > 0.0) {
        Some(known) => match candidate.hours_worked.filter(|h| *h > 0.0) {
            Some(new) if mentions_working_time(answer) => Some(new),
            _ => Some(known),
        },
        None => candidate.hours_worked,
    };

    LogEntry {
        activity,
        hours_worked,
        materials_consumed: reconcile_lines(
            &previous.materials_consumed,
            candidate.materials_consumed,
            answer,
        ),
    }
}

fn reconcile_order(
    previous: Option<&OrderRequest>,
    candidate: Option<OrderRequest>,
    answer: &str,
) -> Option<OrderRequest> {
    match (previous, candidate) {
        (Some(known), None) => Some(known.clone()),
        (Some(known), Some(new)) => Some(OrderRequest {
            has_order: known.has_order || new.has_order,
            deadline: new.deadline.or_else(|| known.deadline.clone()),
            items: reconcile_lines(&known.items, new.items, answer),
        }),
        (None, new) => new,
    }
}

/// Hold `candidate` to `previous` given the user's `answer`.
///
/// Pure: the same inputs always produce the same record. Status and follow-up
/// question are taken from the candidate; callers re-run `finalize` afterwards.
pub fn reconcile(previous: &Record, mut candidate: Record, answer: &str) -> Record {
    let mut previous = previous.clone();
    normalize(&mut previous);
    normalize(&mut candidate);

    Record {
        log_entry: reconcile_entry(&previous.log_entry, candidate.log_entry, answer),
        order_request: reconcile_order(
            previous.order_request.as_ref(),
            candidate.order_request,
            answer,
        ),
        status: candidate.status,
        missing_info: candidate.missing_info,
    }
}
