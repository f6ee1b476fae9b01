//! Frontmatter codec: parses and serializes the `---`-delimited header
//! that precedes the Markdown body of every vault file.
//!
//! This is deliberately not a YAML parser — the grammar is a restricted
//! `key: value` subset (one line per field, no nesting).

use std::collections::BTreeMap;

/// Canonical key emission order. Unknown keys are appended afterward in
/// lexicographic order.
const CANONICAL_ORDER: &[&str] = &[
    "id",
    "type",
    "priority",
    "status",
    "category",
    "tags",
    "importance",
    "created",
    "expires",
    "last_activity",
    "activity_log",
    "auto_detected",
    "date",
];

/// Parse a file's raw bytes into a fields map and body string.
pub fn parse(raw: &str) -> (BTreeMap<String, String>, String) {
    let mut fields = BTreeMap::new();

    if !raw.starts_with("---\n") {
        return (fields, raw.to_string());
    }

    let rest = &raw[4..];
    let Some(end) = rest.find("\n---\n") else {
        return (fields, raw.to_string());
    };

    let header = &rest[..end];
    let body = &rest[end + 5..];

    for line in header.lines() {
        if let Some((key, value)) = line.split_once(':') {
            fields.insert(key.trim().to_string(), value.trim().to_string());
        }
    }

    (fields, body.to_string())
}

/// Build the raw file contents from a fields map and body.
pub fn build(fields: &BTreeMap<String, String>, body: &str) -> String {
    if fields.is_empty() {
        return body.to_string();
    }

    let mut out = String::from("---\n");
    let mut emitted: Vec<&str> = Vec::new();

    for key in CANONICAL_ORDER {
        if let Some(value) = fields.get(*key) {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
            emitted.push(key);
        }
    }

    let mut remaining: Vec<&String> = fields
        .keys()
        .filter(|k| !emitted.contains(&k.as_str()))
        .collect();
    remaining.sort();
    for key in remaining {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&fields[key]);
        out.push('\n');
    }

    out.push_str("---\n");
    out.push_str(body);
    out
}

/// TTL (in days) applied to `expires` by priority, per the fixed table.
/// `None` means no expiry is set.
fn ttl_days(priority: &str) -> Option<i64> {
    match priority {
        "P0" => None,
        "P1" => Some(30),
        "P2" => Some(14),
        "P3" => Some(7),
        _ => None,
    }
}

pub fn add_classification(
    fields: &mut BTreeMap<String, String>,
    category: &str,
    tags: &[String],
    importance: u8,
) {
    fields.insert("category".to_string(), category.to_string());
    fields.insert("tags".to_string(), tags.join(","));
    fields.insert("importance".to_string(), importance.to_string());
}

pub fn add_lifecycle(fields: &mut BTreeMap<String, String>, priority: &str) {
    let today = chrono::Local::now().date_naive();
    fields.insert("priority".to_string(), priority.to_string());
    fields.insert("created".to_string(), today.format("%Y-%m-%d").to_string());
    if let Some(days) = ttl_days(priority) {
        let expires = today + chrono::Duration::days(days);
        fields.insert(
            "expires".to_string(),
            expires.format("%Y-%m-%d").to_string(),
        );
    }
}

/// One entry in an activity log: a date, a count, and the set of sources
/// that contributed activity on that date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub date: chrono::NaiveDate,
    pub count: u32,
    pub sources: Vec<String>,
}

pub fn parse_activity_log(s: &str) -> Vec<ActivityEntry> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split('|')
        .filter_map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let date = chrono::NaiveDate::parse_from_str(parts.next()?, "%Y-%m-%d").ok()?;
            let count: u32 = parts.next()?.parse().ok()?;
            let sources = parts
                .next()
                .unwrap_or("")
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
            Some(ActivityEntry {
                date,
                count,
                sources,
            })
        })
        .collect()
}

pub fn format_activity_log(entries: &[ActivityEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            format!(
                "{}:{}:{}",
                e.date.format("%Y-%m-%d"),
                e.count,
                e.sources.join(",")
            )
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Insert or update an activity entry for `date`/`source`, preserving
/// date ordering. A duplicate date increments its count and unions in
/// the new source (without duplicating it).
pub fn add_activity_entry(
    fields: &mut BTreeMap<String, String>,
    date: chrono::NaiveDate,
    source: &str,
) {
    let mut entries = parse_activity_log(fields.get("activity_log").map(String::as_str).unwrap_or(""));

    match entries.iter_mut().find(|e| e.date == date) {
        Some(entry) => {
            entry.count += 1;
            if !entry.sources.iter().any(|s| s == source) {
                entry.sources.push(source.to_string());
            }
        }
        None => {
            entries.push(ActivityEntry {
                date,
                count: 1,
                sources: vec![source.to_string()],
            });
            entries.sort_by_key(|e| e.date);
        }
    }

    let last_activity = entries.iter().map(|e| e.date).max().unwrap_or(date);
    fields.insert("activity_log".to_string(), format_activity_log(&entries));
    fields.insert(
        "last_activity".to_string(),
        last_activity.format("%Y-%m-%d").to_string(),
    );
}

pub fn parse_tags(s: &str) -> Vec<String> {
    s.split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_with_frontmatter() {
        let mut fields = BTreeMap::new();
        fields.insert("id".to_string(), "abc12345".to_string());
        fields.insert("priority".to_string(), "P2".to_string());
        let raw = build(&fields, "hello world\n");
        let (parsed_fields, parsed_body) = parse(&raw);
        assert_eq!(parsed_fields, fields);
        assert_eq!(parsed_body, "hello world\n");
    }

    #[test]
    fn test_round_trip_no_frontmatter() {
        let raw = "just a plain body, no header";
        let (fields, body) = parse(raw);
        assert!(fields.is_empty());
        assert_eq!(body, raw);
    }

    #[test]
    fn test_canonical_key_order() {
        let mut fields = BTreeMap::new();
        fields.insert("status".to_string(), "active".to_string());
        fields.insert("id".to_string(), "deadbeef".to_string());
        fields.insert("zzz_custom".to_string(), "x".to_string());
        let raw = build(&fields, "");
        let id_pos = raw.find("id:").unwrap();
        let status_pos = raw.find("status:").unwrap();
        let custom_pos = raw.find("zzz_custom:").unwrap();
        assert!(id_pos < status_pos);
        assert!(status_pos < custom_pos);
    }

    #[test]
    fn test_activity_log_increments_and_unions() {
        let mut fields = BTreeMap::new();
        let d = chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        add_activity_entry(&mut fields, d, "note");
        add_activity_entry(&mut fields, d, "note");
        add_activity_entry(&mut fields, d, "clipboard");

        let entries = parse_activity_log(fields.get("activity_log").unwrap());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].count, 3);
        assert_eq!(entries[0].sources, vec!["note", "clipboard"]);
        assert_eq!(fields.get("last_activity").unwrap(), "2026-03-01");
    }

    #[test]
    fn test_activity_log_date_ordering() {
        let mut fields = BTreeMap::new();
        let d1 = chrono::NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let d2 = chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        add_activity_entry(&mut fields, d1, "note");
        add_activity_entry(&mut fields, d2, "note");
        let entries = parse_activity_log(fields.get("activity_log").unwrap());
        assert_eq!(entries[0].date, d2);
        assert_eq!(entries[1].date, d1);
        assert_eq!(fields.get("last_activity").unwrap(), "2026-03-02");
    }

    #[test]
    fn test_lifecycle_ttl() {
        let mut fields = BTreeMap::new();
        add_lifecycle(&mut fields, "P1");
        assert!(fields.contains_key("expires"));
        let mut fields0 = BTreeMap::new();
        add_lifecycle(&mut fields0, "P0");
        assert!(!fields0.contains_key("expires"));
    }
}
