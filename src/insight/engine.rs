//! Insight engine: parses a day's log lines, computes time allocation and
//! task tracking, and assembles a Markdown report (optionally closing
//! with LLM-generated work advice).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use regex::Regex;

use crate::classifier::provider::{ChatMessage, LlmProvider};
use crate::dailylog::DailyLog;
use crate::todo::TodoStore;
use crate::vault::frontmatter;
use crate::vault::store::{VaultStore, DIR_INSIGHTS};

const LINE_RE: &str = r"\[(\d{2}:\d{2})\]\s+\((\w[\w-]*)\)\s*(?:\[(\w+)\])?\s*(.*)";

struct ParsedLine {
    #[allow(dead_code)]
    time: String,
    #[allow(dead_code)]
    source: String,
    category: Option<String>,
    text: String,
}

fn parse_lines(body: &str) -> Vec<ParsedLine> {
    let re = Regex::new(LINE_RE).expect("static regex is valid");
    body.lines()
        .filter_map(|line| {
            let caps = re.captures(line)?;
            Some(ParsedLine {
                time: caps.get(1)?.as_str().to_string(),
                source: caps.get(2)?.as_str().to_string(),
                category: caps.get(3).map(|m| m.as_str().to_string()),
                text: caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default(),
            })
        })
        .collect()
}

pub struct TimeAllocation {
    pub percentages: BTreeMap<String, u32>,
    pub representative: BTreeMap<String, Vec<String>>,
}

fn compute_time_allocation(lines: &[ParsedLine]) -> TimeAllocation {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut examples: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for line in lines {
        let category = line.category.clone().unwrap_or_else(|| "uncategorized".to_string());
        *counts.entry(category.clone()).or_insert(0) += 1;
        let bucket = examples.entry(category).or_default();
        if bucket.len() < 3 {
            bucket.push(line.text.clone());
        }
    }

    let total: u32 = counts.values().sum();
    let mut percentages = BTreeMap::new();
    for (category, count) in &counts {
        let pct = if total == 0 {
            0
        } else {
            (*count as f64 / total as f64 * 100.0).round() as u32
        };
        percentages.insert(category.clone(), pct);
    }

    TimeAllocation {
        percentages,
        representative: examples,
    }
}

pub struct InsightEngine {
    vault: Arc<VaultStore>,
    daily_log: Arc<DailyLog>,
    todo_store: Arc<TodoStore>,
    provider: Option<Arc<dyn LlmProvider>>,
}

impl InsightEngine {
    pub fn new(
        vault: Arc<VaultStore>,
        daily_log: Arc<DailyLog>,
        todo_store: Arc<TodoStore>,
        provider: Option<Arc<dyn LlmProvider>>,
    ) -> Self {
        Self {
            vault,
            daily_log,
            todo_store,
            provider,
        }
    }

    /// Runs until `shutdown` flips to `true`, generating the report for
    /// "today" once per calendar day at `daily_time` (local, `HH:MM`).
    pub async fn run_scheduler(
        self: Arc<Self>,
        daily_time: String,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        loop {
            let sleep_for = duration_until_next(&daily_time);
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(sleep_for) => {
                    let today = chrono::Local::now().date_naive();
                    if let Err(e) = self.generate(today).await {
                        tracing::warn!("scheduled insight generation failed: {e}");
                    }
                }
            }
        }
        tracing::info!("insight scheduler stopped");
    }

    /// Generate (and persist) the insight report for `date`. Returns
    /// `None` if there is no daily log for that date.
    pub async fn generate(&self, date: NaiveDate) -> crate::error::Result<Option<String>> {
        let Some(body) = self.daily_log.read_body(date)? else {
            return Ok(None);
        };

        let lines = parse_lines(&body);
        let allocation = compute_time_allocation(&lines);

        let mut report = String::new();
        report.push_str(&format!("# Insight report — {date}\n\n"));

        report.push_str("## Time allocation\n\n");
        for (category, pct) in &allocation.percentages {
            report.push_str(&format!("- {category}: {pct}%\n"));
        }
        report.push('\n');

        report.push_str("## Task tracking\n\n");
        let done_today = self
            .todo_store
            .list(Some(crate::todo::TodoStatus::Done))?
            .into_iter()
            .filter(|t| t.last_activity == Some(date))
            .count();
        let active = self.todo_store.list(Some(crate::todo::TodoStatus::Active))?;
        let stalled = self.todo_store.stalled(3)?;
        report.push_str(&format!("- Done today: {done_today}\n"));
        report.push_str(&format!("- Currently active: {}\n", active.len()));
        report.push_str(&format!("- Stalled: {}\n", stalled.len()));
        report.push('\n');

        report.push_str("## Core topics\n\n");
        for (category, examples) in &allocation.representative {
            report.push_str(&format!("- **{category}**: {}\n", examples.join("; ")));
        }
        report.push('\n');

        if let Some(provider) = &self.provider {
            let prompt = format!(
                "Given this partial activity report, write 2-3 sentences of work advice:\n\n{report}"
            );
            let messages = [
                ChatMessage::system("You are a concise productivity coach."),
                ChatMessage::user(prompt),
            ];
            match provider.complete(&messages).await {
                Ok(advice) => {
                    report.push_str("## Work advice\n\n");
                    report.push_str(advice.trim());
                    report.push('\n');
                }
                Err(e) => {
                    tracing::warn!("insight advice generation failed, omitting section: {e}");
                }
            }
        }

        let mut fields = std::collections::BTreeMap::new();
        fields.insert("type".to_string(), "insight".to_string());
        fields.insert("date".to_string(), date.format("%Y-%m-%d").to_string());
        frontmatter::add_lifecycle(&mut fields, "P2");
        let raw = frontmatter::build(&fields, &report);

        self.vault
            .write(DIR_INSIGHTS, &format!("daily-{date}.md"), &raw)?;

        Ok(Some(report))
    }
}

fn duration_until_next(daily_time: &str) -> std::time::Duration {
    let (hour, minute) = daily_time
        .split_once(':')
        .and_then(|(h, m)| Some((h.parse::<u32>().ok()?, m.parse::<u32>().ok()?)))
        .unwrap_or((20, 0));

    let now = chrono::Local::now();
    let mut target = now
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .unwrap_or_else(|| now.naive_local());
    if target <= now.naive_local() {
        target += chrono::Duration::days(1);
    }

    let seconds = (target - now.naive_local()).num_seconds().max(1);
    std::time::Duration::from_secs(seconds as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_until_next_is_positive_and_bounded() {
        let d = duration_until_next("20:00");
        assert!(d.as_secs() > 0);
        assert!(d.as_secs() <= 24 * 3600);
    }

    #[test]
    fn test_parse_lines_with_category() {
        let body = "[09:30] (terminal) [coding] git status\n[10:00] (note) a plain note\n";
        let lines = parse_lines(body);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].category.as_deref(), Some("coding"));
        assert_eq!(lines[1].category, None);
        assert_eq!(lines[1].text, "a plain note");
    }

    #[test]
    fn test_time_allocation_sums_to_100() {
        let body = "[09:00] (t) [coding] a\n[09:01] (t) [coding] b\n[09:02] (t) [work] c\n";
        let lines = parse_lines(body);
        let allocation = compute_time_allocation(&lines);
        let total: u32 = allocation.percentages.values().sum();
        assert!((99..=101).contains(&total));
    }
}
