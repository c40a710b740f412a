//! Action Ledger
//!
//! Append-only JSONL record of every executed agent action, with optional
//! links to the route taken and the position at execution time. The ledger
//! is the replay source of truth: reading it back in order reproduces the
//! simulation's state.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sim_state::{AgentId, Coordinate, PoiId, RouteId, SimTime, SimulationId};

use crate::error::{EngineError, EngineResult};

/// What an executed action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Travel,
    Visit,
    Converse,
    Post,
    OrganizeEvent,
    ProposeIdea,
}

/// One executed action as persisted to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_id: String,
    pub simulation_id: SimulationId,
    pub agent_id: AgentId,
    pub kind: ActionKind,
    pub timestamp: SimTime,
    /// Route the action rode on, when it involved travel.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub route_id: Option<RouteId>,
    /// Agent position at execution time, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub location: Option<Coordinate>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub place_id: Option<PoiId>,
    pub detail: String,
}

/// Writer for the append-only action ledger.
pub struct ActionLedger {
    writer: Option<BufWriter<File>>,
    action_count: u64,
    next_action_id: u64,
}

impl ActionLedger {
    /// Create a ledger writing to the specified path.
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            action_count: 0,
            next_action_id: 1,
        })
    }

    /// Create a ledger that discards records (for testing).
    pub fn null() -> Self {
        Self {
            writer: None,
            action_count: 0,
            next_action_id: 1,
        }
    }

    /// Generate the next action ID.
    pub fn next_id(&mut self) -> String {
        let id = format!("act_{:08}", self.next_action_id);
        self.next_action_id += 1;
        id
    }

    pub fn action_count(&self) -> u64 {
        self.action_count
    }

    /// Append one record.
    pub fn record(&mut self, action: &ActionRecord) -> EngineResult<()> {
        self.action_count += 1;
        if let Some(ref mut writer) = self.writer {
            let json = serde_json::to_string(action)?;
            writeln!(writer, "{}", json)?;
        }
        Ok(())
    }

    pub fn record_batch(&mut self, actions: &[ActionRecord]) -> EngineResult<()> {
        for action in actions {
            self.record(action)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for ActionLedger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            eprintln!("Warning: failed to flush action ledger: {}", e);
        }
    }
}

/// Reads a ledger file back, strictly: any malformed line or out-of-order
/// timestamp aborts with `ReplayInconsistency`.
pub fn read_ledger(path: impl AsRef<Path>) -> EngineResult<Vec<ActionRecord>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut records: Vec<ActionRecord> = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ActionRecord = serde_json::from_str(&line).map_err(|e| {
            EngineError::ReplayInconsistency(format!(
                "ledger line {}: malformed record: {}",
                line_no + 1,
                e
            ))
        })?;
        if let Some(prev) = records.last() {
            if record.timestamp < prev.timestamp {
                return Err(EngineError::ReplayInconsistency(format!(
                    "ledger line {}: timestamp {} precedes previous record at {}",
                    line_no + 1,
                    record.timestamp,
                    prev.timestamp
                )));
            }
        }
        records.push(record);
    }
    Ok(records)
}
