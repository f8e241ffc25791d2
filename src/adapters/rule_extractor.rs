//! Rule-based slot extractor.
//!
//! The built-in fallback backend: regex and keyword scanning over the
//! locked schema's slots. Produces raw candidates only; the validation
//! gate decides what to trust. Model-backed extractors implement the
//! same port.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::dialogue::SlotCandidate;
use crate::domain::schema::{SlotSchema, SlotSpec};
use crate::domain::validation::SlotType;
use crate::ports::SlotExtractor;

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)\b(
            \d{4}-\d{2}-\d{2}
          | \d{1,2}/\d{1,2}/\d{4}
          | (?:january|february|march|april|may|june|july|august|september|october|november|december
             |jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec)\s+\d{1,2}(?:,?\s+\d{4})?
          | today
          | tomorrow
          | (?:next\s+)?(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)
        )\b",
    )
    .expect("date pattern compiles")
});

static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}:\d{2}\s*(?:am|pm)?|\d{1,2}\s*(?:am|pm)|noon|midnight)\b")
        .expect("time pattern compiles")
});

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b")
        .expect("phone pattern compiles")
});

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*(minutes|minute|mins|min|hours|hour|hrs|hr)\b")
        .expect("duration pattern compiles")
});

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d+(?:,\d{3})*\b").expect("number pattern compiles")
});

static QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)"|'([^']+)'"#).expect("quote pattern compiles"));

static NAMED_TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:called|titled|named)\s+(.+?)(?:[,.;!?]|$)")
        .expect("title pattern compiles")
});

/// Deterministic regex/keyword extractor over a slot schema.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SlotExtractor for RuleBasedExtractor {
    async fn extract(&self, text: &str, schema: &SlotSchema) -> Vec<SlotCandidate> {
        let mut found = Extraction::new(schema);

        // Scans mask what they consume so later passes cannot re-read the
        // same span (a correction's date is not the other date slot, a
        // date's day is not a claim amount).
        let mut masked = text.to_string();
        found.scan_corrections(&mut masked);
        found.scan_dates(&mut masked);
        found.scan_times(&mut masked);
        found.scan_phones(&mut masked);
        found.scan_durations(&mut masked);
        found.scan_numbers(&mut masked);
        found.scan_choices(&masked);
        found.scan_text_slots(text);

        found.into_candidates()
    }
}

/// Working set for one extraction pass.
struct Extraction<'a> {
    schema: &'a SlotSchema,
    candidates: Vec<SlotCandidate>,
}

impl<'a> Extraction<'a> {
    fn new(schema: &'a SlotSchema) -> Self {
        Self {
            schema,
            candidates: Vec::new(),
        }
    }

    fn has(&self, slot: &str) -> bool {
        self.candidates.iter().any(|c| c.slot == slot)
    }

    fn push(&mut self, candidate: SlotCandidate) {
        if !self.has(&candidate.slot) {
            self.candidates.push(candidate);
        }
    }

    fn slots_of<F>(&self, pred: F) -> Vec<&'a SlotSpec>
    where
        F: Fn(&SlotType) -> bool,
    {
        self.schema
            .slots()
            .iter()
            .filter(|s| pred(s.slot_type()))
            .collect()
    }

    /// Phrasing that names a slot directly ("start date is March 9",
    /// "change the urgency to high") yields an explicit candidate, the
    /// only kind allowed to overwrite an already-valid slot.
    fn scan_corrections(&mut self, masked: &mut String) {
        for spec in self.schema.slots() {
            let phrase = spec.name().replace('_', " ");
            let pattern = format!(
                r"(?i)\b{}\b\s*(?:is|to|should be|[:=])\s+(.+?)(?:[,.;!?]|$)",
                regex::escape(&phrase)
            );
            let re = match Regex::new(&pattern) {
                Ok(re) => re,
                Err(_) => continue,
            };
            let Some(caps) = re.captures(masked) else {
                continue;
            };
            let value = refine_correction(spec.slot_type(), caps[1].trim());
            let span = caps.get(0).map(|m| (m.start(), m.end()));
            if !value.is_empty() {
                self.push(SlotCandidate::explicit(spec.name(), value));
                if let Some(span) = span {
                    mask(masked, [span]);
                }
            }
        }
    }

    fn scan_dates(&mut self, masked: &mut String) {
        let date_slots: Vec<&SlotSpec> = self
            .slots_of(|t| matches!(t, SlotType::Date))
            .into_iter()
            .filter(|s| !self.has(s.name()))
            .collect();
        if date_slots.is_empty() {
            return;
        }

        let matches: Vec<(usize, usize, String)> = DATE_RE
            .find_iter(masked)
            .map(|m| (m.start(), m.end(), m.as_str().to_string()))
            .collect();

        let mut assigned: Vec<(String, String)> = Vec::new();
        let mut unassigned: Vec<String> = Vec::new();

        for (start, _end, value) in &matches {
            let cue = cue_before(masked, *start);
            let target = match cue {
                Cue::Start => date_slots
                    .iter()
                    .find(|s| s.name().starts_with("start"))
                    .map(|s| s.name().to_string()),
                Cue::End => date_slots
                    .iter()
                    .find(|s| s.name().starts_with("end"))
                    .map(|s| s.name().to_string()),
                Cue::None => None,
            };
            match target {
                Some(slot) if !assigned.iter().any(|(s, _)| *s == slot) => {
                    assigned.push((slot, value.clone()));
                }
                _ => unassigned.push(value.clone()),
            }
        }

        // Leftover dates fill the remaining date slots in declared order.
        let mut leftovers = unassigned.into_iter();
        for spec in &date_slots {
            if assigned.iter().any(|(s, _)| s == spec.name()) {
                continue;
            }
            if let Some(value) = leftovers.next() {
                assigned.push((spec.name().to_string(), value));
            }
        }

        for (slot, value) in assigned {
            self.push(SlotCandidate::new(slot, value));
        }
        mask(masked, matches.iter().map(|(s, e, _)| (*s, *e)));
    }

    fn scan_times(&mut self, masked: &mut String) {
        let Some(spec) = self
            .slots_of(|t| matches!(t, SlotType::TimeOfDay))
            .first()
            .copied()
        else {
            return;
        };
        if let Some(m) = TIME_RE.find(masked) {
            self.push(SlotCandidate::new(spec.name(), m.as_str().trim()));
            let span = (m.start(), m.end());
            mask(masked, [span]);
        }
    }

    fn scan_phones(&mut self, masked: &mut String) {
        let Some(spec) = self
            .slots_of(|t| matches!(t, SlotType::Phone))
            .first()
            .copied()
        else {
            return;
        };
        if let Some(m) = PHONE_RE.find(masked) {
            self.push(SlotCandidate::new(spec.name(), m.as_str().trim()));
            let span = (m.start(), m.end());
            mask(masked, [span]);
        }
    }

    fn scan_durations(&mut self, masked: &mut String) {
        let Some(spec) = self
            .slots_of(|t| matches!(t, SlotType::Integer { .. }))
            .first()
            .copied()
        else {
            return;
        };
        if let Some(caps) = DURATION_RE.captures(masked) {
            let amount: i64 = match caps[1].parse() {
                Ok(n) => n,
                Err(_) => return,
            };
            let unit = caps[2].to_lowercase();
            let minutes = if unit.starts_with('h') { amount * 60 } else { amount };
            self.push(SlotCandidate::new(spec.name(), minutes.to_string()));
            let m = caps.get(0).expect("whole match");
            let span = (m.start(), m.end());
            mask(masked, [span]);
        }
    }

    fn scan_numbers(&mut self, masked: &mut String) {
        let Some(spec) = self
            .slots_of(|t| matches!(t, SlotType::Integer { .. }))
            .first()
            .copied()
        else {
            return;
        };
        if self.has(spec.name()) {
            return;
        }
        if let Some(m) = NUMBER_RE.find(masked) {
            self.push(SlotCandidate::new(spec.name(), m.as_str()));
            let span = (m.start(), m.end());
            mask(masked, [span]);
        }
    }

    fn scan_choices(&mut self, masked: &str) {
        let lowered = masked.to_lowercase();
        for spec in self.schema.slots() {
            let SlotType::Choice { options } = spec.slot_type() else {
                continue;
            };
            if self.has(spec.name()) {
                continue;
            }
            // The earliest-appearing option wins, deterministically.
            let hit = options
                .iter()
                .filter_map(|o| find_word(&lowered, o).map(|pos| (pos, o)))
                .min_by_key(|(pos, _)| *pos);
            if let Some((_, option)) = hit {
                self.push(SlotCandidate::new(spec.name(), option.clone()));
            }
        }
    }

    fn scan_text_slots(&mut self, text: &str) {
        let text_slots = self.slots_of(|t| matches!(t, SlotType::Text { .. }));
        let Some(first) = text_slots.first() else {
            return;
        };

        if let Some(caps) = QUOTED_RE.captures(text) {
            let value = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().trim().to_string());
            if let Some(value) = value {
                if !value.is_empty() && !self.has(first.name()) {
                    self.push(SlotCandidate::new(first.name(), value));
                    return;
                }
            }
        }

        if let Some(title_spec) = text_slots.iter().find(|s| s.name() == "title") {
            if !self.has(title_spec.name()) {
                if let Some(caps) = NAMED_TITLE_RE.captures(text) {
                    self.push(SlotCandidate::new(
                        title_spec.name(),
                        caps[1].trim().to_string(),
                    ));
                }
            }
        }
    }

    fn into_candidates(mut self) -> Vec<SlotCandidate> {
        // Schema order keeps output deterministic regardless of scan order.
        let order: Vec<&str> = self.schema.slots().iter().map(|s| s.name()).collect();
        self.candidates.sort_by_key(|c| {
            order
                .iter()
                .position(|n| *n == c.slot)
                .unwrap_or(usize::MAX)
        });
        self.candidates
    }
}

/// Narrows a correction's captured tail to the fragment that matches the
/// slot's type, so trailing words ("... to March 20 please") don't poison
/// the candidate. Falls back to the raw capture.
fn refine_correction(slot_type: &SlotType, captured: &str) -> String {
    let narrowed = match slot_type {
        SlotType::Date => DATE_RE.find(captured).map(|m| m.as_str().to_string()),
        SlotType::TimeOfDay => TIME_RE.find(captured).map(|m| m.as_str().to_string()),
        SlotType::Phone => PHONE_RE.find(captured).map(|m| m.as_str().to_string()),
        SlotType::Integer { .. } => DURATION_RE
            .captures(captured)
            .and_then(|caps| {
                let amount: i64 = caps[1].parse().ok()?;
                let unit = caps[2].to_lowercase();
                let minutes = if unit.starts_with('h') { amount * 60 } else { amount };
                Some(minutes.to_string())
            })
            .or_else(|| NUMBER_RE.find(captured).map(|m| m.as_str().to_string())),
        SlotType::Choice { options } => {
            let lowered = captured.to_lowercase();
            options
                .iter()
                .filter_map(|o| find_word(&lowered, o).map(|pos| (pos, o)))
                .min_by_key(|(pos, _)| *pos)
                .map(|(_, option)| option.clone())
        }
        SlotType::Text { .. } => None,
    };
    narrowed.unwrap_or_else(|| captured.to_string())
}

/// Directional hint found just before a date mention.
enum Cue {
    Start,
    End,
    None,
}

fn cue_before(text: &str, position: usize) -> Cue {
    let window_start = position.saturating_sub(16);
    // Stay on a char boundary.
    let mut start = window_start;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    let window = text[start..position].to_lowercase();
    if window.contains("start") || window.contains("from") || window.contains("begin") {
        Cue::Start
    } else if window.contains("end")
        || window.contains("until")
        || window.contains("through")
        || window.contains("thru")
        || window.ends_with("to ")
    {
        Cue::End
    } else {
        Cue::None
    }
}

/// Blanks out consumed byte ranges so later scans skip them.
fn mask(text: &mut String, spans: impl IntoIterator<Item = (usize, usize)>) {
    let mut bytes = text.clone().into_bytes();
    for (start, end) in spans {
        for b in &mut bytes[start..end] {
            if b.is_ascii() {
                *b = b' ';
            }
        }
    }
    if let Ok(rebuilt) = String::from_utf8(bytes) {
        *text = rebuilt;
    }
}

/// Position of `word` in `text` with word boundaries on both sides.
fn find_word(text: &str, word: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = text[from..].find(word) {
        let pos = from + rel;
        let end = pos + word.len();
        let left_ok = pos == 0
            || !text[..pos]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let right_ok = end == text.len()
            || !text[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if left_ok && right_ok {
            return Some(pos);
        }
        from = end;
    }
    None
}
