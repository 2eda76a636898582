//! Append-only decision log.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// One persisted evaluation: indexed scalar columns plus the full decision
/// tree in `dados`. `id` is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    #[serde(default)]
    pub id: u64,
    pub btc_price: f64,
    pub score_mercado: f64,
    pub score_risco: Option<f64>,
    pub ciclo_atual: String,
    pub setup_4h: String,
    pub decisao_final: String,
    pub alavancagem_atual: Option<f64>,
    pub health_factor: Option<f64>,
    pub ema_distance: f64,
    pub rsi_diario: f64,
    pub dados: Value,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Append a record; returns the id it was stored under.
    async fn save_decision(&self, record: &DecisionRecord) -> Result<u64>;
    async fn get_latest_decision(&self) -> Result<Option<DecisionRecord>>;
}

/// JSON-lines file, one record per line. Appends are serialised by a mutex
/// that also owns the next id and the most recent record, so reads of the
/// latest decision never touch the file.
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

struct StoreState {
    next_id: u64,
    last: Option<DecisionRecord>,
}

impl JsonFileStore {
    pub const FILE_NAME: &'static str = "decisions.jsonl";

    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let path = dir.join(Self::FILE_NAME);
        let mut records = read_records(&path)?;
        let last_id = records.iter().map(|r| r.id).max().unwrap_or(0);
        debug!("Decision store at {} (last id {})", path.display(), last_id);
        Ok(Self {
            path,
            state: Mutex::new(StoreState {
                next_id: last_id + 1,
                last: records.pop(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every parseable line; corrupt lines are skipped with a warning.
fn read_records(path: &Path) -> Result<Vec<DecisionRecord>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    Ok(content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<DecisionRecord>(line) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!("Skipping corrupt decision line: {}", e);
                None
            }
        })
        .collect())
}

#[async_trait]
impl DecisionStore for JsonFileStore {
    async fn save_decision(&self, record: &DecisionRecord) -> Result<u64> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("Decision store lock poisoned"))?;

        let stored = DecisionRecord {
            id: state.next_id,
            ..record.clone()
        };
        let line = serde_json::to_string(&stored).context("Failed to serialise decision")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        writeln!(file, "{}", line).context("Failed to append decision")?;

        state.next_id += 1;
        let id = stored.id;
        state.last = Some(stored);
        Ok(id)
    }

    async fn get_latest_decision(&self) -> Result<Option<DecisionRecord>> {
        let state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("Decision store lock poisoned"))?;
        Ok(state.last.clone())
    }
}

/// In-process store.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<DecisionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DecisionStore for MemoryStore {
    async fn save_decision(&self, record: &DecisionRecord) -> Result<u64> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        let id = records.len() as u64 + 1;
        records.push(DecisionRecord {
            id,
            ..record.clone()
        });
        Ok(id)
    }

    async fn get_latest_decision(&self) -> Result<Option<DecisionRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|_| anyhow::anyhow!("Memory store lock poisoned"))?;
        Ok(records.last().cloned())
    }
}
