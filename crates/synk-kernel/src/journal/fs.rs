use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::{Journal, JournalError, JournalSeq, TraceEntry, TraceRecord};

const TRACE_FILE: &str = "synk-trace.jsonl";

/// Filesystem journal: newline-delimited JSON, one trace entry per line.
///
/// The trace is a diagnostic artifact as much as a reloadable log, so the
/// format is chosen to be `tail`-able and `grep`-able. `open` replays the
/// file, verifying that entries are contiguously numbered from zero, and
/// resumes appending after the last good line; a torn tail or a sequence
/// gap is reported as corruption with the offending line number.
#[derive(Debug)]
pub struct FsJournal {
    file: File,
    path: PathBuf,
    next_seq: JournalSeq,
}

impl FsJournal {
    pub fn open(root: impl AsRef<Path>) -> Result<Self, JournalError> {
        fs::create_dir_all(root.as_ref())?;
        let path = root.as_ref().join(TRACE_FILE);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let next_seq = replay(&path, JournalSeq::MAX, |_| {})?;
        Ok(Self {
            file,
            path,
            next_seq,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Journal for FsJournal {
    fn append(&mut self, record: TraceRecord) -> Result<JournalSeq, JournalError> {
        let entry = TraceEntry {
            seq: self.next_seq,
            record,
        };
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');
        self.file.write_all(&line)?;
        self.file.sync_data()?;
        self.next_seq += 1;
        Ok(entry.seq)
    }

    fn load_from(&self, from: JournalSeq) -> Result<Vec<TraceEntry>, JournalError> {
        let mut entries = Vec::new();
        replay(&self.path, from, |entry| entries.push(entry))?;
        Ok(entries)
    }

    fn next_seq(&self) -> JournalSeq {
        self.next_seq
    }
}

/// Walk the trace file line by line, enforcing contiguous sequence numbers
/// and handing entries with `seq >= from` to the visitor. Returns the next
/// sequence number.
fn replay(
    path: &Path,
    from: JournalSeq,
    mut visit: impl FnMut(TraceEntry),
) -> Result<JournalSeq, JournalError> {
    let reader = BufReader::new(File::open(path)?);
    let mut expected: JournalSeq = 0;
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let entry: TraceEntry = serde_json::from_str(&line).map_err(|err| {
            JournalError::Corrupt(format!("line {}: {err}", index + 1))
        })?;
        if entry.seq != expected {
            return Err(JournalError::Corrupt(format!(
                "line {}: expected seq {expected}, found {}",
                index + 1,
                entry.seq
            )));
        }
        expected += 1;
        if entry.seq >= from {
            visit(entry);
        }
    }
    Ok(expected)
}
