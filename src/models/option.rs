//! Configurable option lists (authors, issues, parts, camps, devices, count issues).

use serde::{Deserialize, Serialize};

/// Option list category. Each category is stored as one record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OptionCategory {
    Authors,
    Issues,
    Parts,
    Camps,
    Devices,
    /// Fault categories used by the count tally, distinct from report issues.
    CountIssues,
}

impl OptionCategory {
    pub const ALL: [OptionCategory; 6] = [
        OptionCategory::Authors,
        OptionCategory::Issues,
        OptionCategory::Parts,
        OptionCategory::Camps,
        OptionCategory::Devices,
        OptionCategory::CountIssues,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionCategory::Authors => "authors",
            OptionCategory::Issues => "issues",
            OptionCategory::Parts => "parts",
            OptionCategory::Camps => "camps",
            OptionCategory::Devices => "devices",
            OptionCategory::CountIssues => "count_issues",
        }
    }

    /// Lists seeded into an empty database.
    pub fn defaults(&self) -> &'static [&'static str] {
        match self {
            OptionCategory::Authors => &["김정비", "이수리", "박엔지"],
            OptionCategory::Issues => &["모터 불량", "배터리 문제", "IOT 오류"],
            OptionCategory::Parts => &[
                "모터",
                "배터리",
                "IOT",
                "컨트롤러",
                "브레이크 와이어",
                "배터리 커버락",
                "모터 케이블",
                "킥스탠드",
                "핸들바",
                "스로틀",
                "기타",
            ],
            OptionCategory::Camps => &["내유캠프", "독산캠프", "장안캠프"],
            OptionCategory::Devices => &["S9", "디어", "W1", "W9", "I9"],
            OptionCategory::CountIssues => &[
                "리어데코 커버",
                "모터",
                "배터리 커버락",
                "브레이크 레버",
                "브레이크 LED",
                "스로틀",
                "컨트롤러",
                "킥스탠드",
                "핸들바",
                "IOT",
                "기타(증상 파악중)",
            ],
        }
    }
}

/// An ordered list of unique option values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptionList {
    pub category: OptionCategory,
    pub items: Vec<String>,
}

impl OptionList {
    pub fn contains(&self, value: &str) -> bool {
        self.items.iter().any(|item| item == value)
    }
}

/// Request body for adding a value to a list.
#[derive(Debug, Clone, Deserialize)]
pub struct AddOptionRequest {
    pub value: String,
}
