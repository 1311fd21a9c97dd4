//! Heuristic classification of natural-language edit requests.
//!
//! Weighted English and Chinese term lists per category; the highest total
//! wins. Never fails and never blocks.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use xxhash_rust::xxh3::xxh3_64;

/// What kind of change the user is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditIntent {
    Style,
    Content,
    BugFix,
    Feature,
    Refactor,
    Unknown,
}

impl EditIntent {
    pub const ALL: [EditIntent; 6] = [
        EditIntent::Style,
        EditIntent::Content,
        EditIntent::BugFix,
        EditIntent::Feature,
        EditIntent::Refactor,
        EditIntent::Unknown,
    ];

    /// Minimum residual body size before the compressor collapses a body.
    ///
    /// Unknown is the least aggressive.
    pub fn default_threshold(self) -> usize {
        match self {
            EditIntent::Style => 240,
            EditIntent::Content => 320,
            EditIntent::Feature => 600,
            EditIntent::Refactor => 900,
            EditIntent::BugFix => 1200,
            EditIntent::Unknown => 1600,
        }
    }

    /// How many request-mentioned declarations are kept expanded.
    pub fn retrieval_breadth(self) -> usize {
        match self {
            EditIntent::Style | EditIntent::Content => 2,
            EditIntent::Feature => 4,
            EditIntent::BugFix => 6,
            EditIntent::Refactor | EditIntent::Unknown => 8,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EditIntent::Style => "style",
            EditIntent::Content => "content",
            EditIntent::BugFix => "bugfix",
            EditIntent::Feature => "feature",
            EditIntent::Refactor => "refactor",
            EditIntent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EditIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "style" => Ok(EditIntent::Style),
            "content" => Ok(EditIntent::Content),
            "bugfix" | "fix" | "bug" => Ok(EditIntent::BugFix),
            "feature" => Ok(EditIntent::Feature),
            "refactor" => Ok(EditIntent::Refactor),
            "unknown" => Ok(EditIntent::Unknown),
            other => Err(format!("unknown intent '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub intent: EditIntent,
    /// Winning weight over total weight; 0 when nothing matched
    pub confidence: f64,
}

impl Classification {
    fn unknown() -> Self {
        Self {
            intent: EditIntent::Unknown,
            confidence: 0.0,
        }
    }
}

// Phrases weigh 3, single words 1. Chinese terms are matched as substrings.
const STYLE_TERMS: &[(&str, u32)] = &[
    ("dark mode", 3),
    ("font size", 3),
    ("look like", 3),
    ("background color", 3),
    ("color", 1),
    ("colour", 1),
    ("style", 1),
    ("css", 1),
    ("font", 1),
    ("theme", 1),
    ("layout", 1),
    ("padding", 1),
    ("margin", 1),
    ("spacing", 1),
    ("align", 1),
    ("center", 1),
    ("bigger", 1),
    ("smaller", 1),
    ("rounded", 1),
    ("shadow", 1),
    ("gradient", 1),
    ("animation", 1),
    ("responsive", 1),
    ("颜色", 1),
    ("样式", 1),
    ("字体", 1),
    ("主题", 1),
    ("布局", 1),
    ("背景", 1),
    ("暗色模式", 3),
    ("居中", 1),
];

const CONTENT_TERMS: &[(&str, u32)] = &[
    ("change the text", 3),
    ("change the title", 3),
    ("rename the heading", 3),
    ("text", 1),
    ("title", 1),
    ("heading", 1),
    ("label", 1),
    ("wording", 1),
    ("copy", 1),
    ("translate", 1),
    ("typo", 1),
    ("placeholder", 1),
    ("description", 1),
    ("message", 1),
    ("文字", 1),
    ("文本", 1),
    ("标题", 1),
    ("文案", 1),
    ("翻译", 1),
    ("描述", 1),
    ("修改文字", 3),
];

const BUGFIX_TERMS: &[(&str, u32)] = &[
    ("doesn't work", 3),
    ("does not work", 3),
    ("not working", 3),
    ("is broken", 3),
    ("blank screen", 3),
    ("fix", 1),
    ("bug", 1),
    ("error", 1),
    ("broken", 1),
    ("crash", 1),
    ("wrong", 1),
    ("issue", 1),
    ("fails", 1),
    ("undefined", 1),
    ("exception", 1),
    ("修复", 1),
    ("错误", 1),
    ("报错", 1),
    ("崩溃", 1),
    ("不工作", 3),
    ("无法", 1),
    ("问题", 1),
];

const FEATURE_TERMS: &[(&str, u32)] = &[
    ("add a", 3),
    ("add an", 3),
    ("new page", 3),
    ("ability to", 3),
    ("support for", 3),
    ("add", 1),
    ("new", 1),
    ("feature", 1),
    ("button", 1),
    ("implement", 1),
    ("create", 1),
    ("integrate", 1),
    ("allow", 1),
    ("enable", 1),
    ("search", 1),
    ("filter", 1),
    ("添加", 1),
    ("增加", 1),
    ("新增", 1),
    ("功能", 1),
    ("实现", 1),
    ("按钮", 1),
    ("支持", 1),
];

const REFACTOR_TERMS: &[(&str, u32)] = &[
    ("clean up", 3),
    ("split into", 3),
    ("extract a component", 3),
    ("refactor", 1),
    ("restructure", 1),
    ("reorganize", 1),
    ("simplify", 1),
    ("cleanup", 1),
    ("optimize", 1),
    ("performance", 1),
    ("rename", 1),
    ("extract", 1),
    ("重构", 1),
    ("优化", 1),
    ("简化", 1),
    ("拆分", 1),
    ("整理代码", 3),
];

fn terms(intent: EditIntent) -> &'static [(&'static str, u32)] {
    match intent {
        EditIntent::Style => STYLE_TERMS,
        EditIntent::Content => CONTENT_TERMS,
        EditIntent::BugFix => BUGFIX_TERMS,
        EditIntent::Feature => FEATURE_TERMS,
        EditIntent::Refactor => REFACTOR_TERMS,
        EditIntent::Unknown => &[],
    }
}

/// Lowercase and collapse whitespace.
fn normalize(request: &str) -> String {
    request
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `term` occurs in `text`. ASCII terms must sit on word boundaries;
/// CJK terms are plain substrings.
fn contains_term(text: &str, term: &str) -> bool {
    if !term.is_ascii() {
        return text.contains(term);
    }
    text.match_indices(term).any(|(idx, _)| {
        let before = text[..idx].chars().next_back();
        let after = text[idx + term.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Classify an edit request.
pub fn classify(request: &str) -> Classification {
    let text = normalize(request);
    if text.is_empty() {
        return Classification::unknown();
    }

    let mut total = 0u32;
    let mut best: Option<(EditIntent, u32)> = None;
    let mut tied = false;
    for intent in EditIntent::ALL {
        let weight: u32 = terms(intent)
            .iter()
            .filter(|(term, _)| contains_term(&text, term))
            .map(|(_, w)| w)
            .sum();
        total += weight;
        if weight == 0 {
            continue;
        }
        match best {
            Some((_, w)) if weight < w => {}
            Some((_, w)) if weight == w => tied = true,
            _ => {
                best = Some((intent, weight));
                tied = false;
            }
        }
    }

    match best {
        Some((intent, weight)) if !tied => Classification {
            intent,
            confidence: weight as f64 / total as f64,
        },
        _ => Classification::unknown(),
    }
}

/// Bounded FIFO cache of classifications keyed by the normalized request.
#[derive(Debug)]
pub struct ClassificationCache {
    capacity: usize,
    entries: HashMap<u64, Classification>,
    order: VecDeque<u64>,
}

impl ClassificationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Classify through the cache.
    pub fn classify(&mut self, request: &str) -> Classification {
        let key = xxh3_64(normalize(request).as_bytes());
        if let Some(hit) = self.entries.get(&key) {
            return *hit;
        }

        let result = classify(request);
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, result);
        self.order.push_back(key);
        result
    }
}

impl Default for ClassificationCache {
    fn default() -> Self {
        Self::new(256)
    }
}
