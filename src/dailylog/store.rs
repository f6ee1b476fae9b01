//! Per-day append-only log file with a per-date lock and a small LRU
//! cache of recently read bodies (invalidated on append).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate};
use parking_lot::Mutex;

use crate::error::Result;
use crate::vault::frontmatter::{self};
use crate::vault::store::{VaultStore, DIR_LOGS};

const CACHE_CAPACITY: usize = 3;

pub struct DailyLog {
    vault: Arc<VaultStore>,
    file_locks: Mutex<HashMap<NaiveDate, Arc<Mutex<()>>>>,
    cache: Mutex<LruCache>,
}

struct LruCache {
    order: VecDeque<NaiveDate>,
    bodies: HashMap<NaiveDate, String>,
}

impl LruCache {
    fn new() -> Self {
        Self {
            order: VecDeque::new(),
            bodies: HashMap::new(),
        }
    }

    fn get(&self, date: &NaiveDate) -> Option<String> {
        self.bodies.get(date).cloned()
    }

    fn put(&mut self, date: NaiveDate, body: String) {
        if !self.bodies.contains_key(&date) {
            self.order.push_back(date);
            if self.order.len() > CACHE_CAPACITY {
                if let Some(evicted) = self.order.pop_front() {
                    self.bodies.remove(&evicted);
                }
            }
        }
        self.bodies.insert(date, body);
    }

    fn invalidate(&mut self, date: &NaiveDate) {
        self.bodies.remove(date);
        self.order.retain(|d| d != date);
    }
}

fn filename_for(date: NaiveDate) -> String {
    format!("{}.md", date.format("%Y-%m-%d"))
}

impl DailyLog {
    pub fn new(vault: Arc<VaultStore>) -> Self {
        Self {
            vault,
            file_locks: Mutex::new(HashMap::new()),
            cache: Mutex::new(LruCache::new()),
        }
    }

    fn lock_for(&self, date: NaiveDate) -> Arc<Mutex<()>> {
        self.file_locks
            .lock()
            .entry(date)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Append one classified line. The date bucket is derived from
    /// `timestamp` in local time.
    pub fn append(
        &self,
        text: &str,
        source: &str,
        timestamp: DateTime<Local>,
        category: Option<&str>,
        tags: &[String],
        importance: u8,
    ) -> Result<()> {
        let date = timestamp.date_naive();
        let lock = self.lock_for(date);
        let _guard = lock.lock();

        let filename = filename_for(date);
        let existing = self.vault.read(DIR_LOGS, &filename)?;

        let raw = match existing {
            Some(raw) => raw,
            None => {
                let mut fields = std::collections::BTreeMap::new();
                fields.insert("priority".to_string(), "P2".to_string());
                fields.insert("date".to_string(), date.format("%Y-%m-%d").to_string());
                if let Some(cat) = category {
                    frontmatter::add_classification(&mut fields, cat, tags, importance);
                }
                frontmatter::build(&fields, "")
            }
        };

        let (fields, body) = frontmatter::parse(&raw);
        let clean_text = text.replace('\n', " ");
        let category_tag = category.map(|c| format!("[{c}] ")).unwrap_or_default();
        let line = format!(
            "[{}] ({}) {}{}\n",
            timestamp.format("%H:%M"),
            source,
            category_tag,
            clean_text
        );

        let new_body = format!("{body}{line}");
        let updated = frontmatter::build(&fields, &new_body);
        self.vault.write(DIR_LOGS, &filename, &updated)?;

        self.cache.lock().invalidate(&date);
        Ok(())
    }

    /// Read the body for a given date, via the cache when possible.
    pub fn read_body(&self, date: NaiveDate) -> Result<Option<String>> {
        if let Some(cached) = self.cache.lock().get(&date) {
            return Ok(Some(cached));
        }

        let filename = filename_for(date);
        let Some(raw) = self.vault.read(DIR_LOGS, &filename)? else {
            return Ok(None);
        };
        let (_, body) = frontmatter::parse(&raw);
        self.cache.lock().put(date, body.clone());
        Ok(Some(body))
    }
}
