use std::sync::{Arc, Mutex};

use super::{Journal, JournalError, JournalSeq, TraceEntry, TraceRecord};

/// In-memory journal. Records are stored bare in append order; an entry's
/// sequence number is its position, so none is stored. Cloning shares the
/// underlying trace, which is how tests keep a handle while the engine owns
/// the boxed journal.
#[derive(Debug, Default, Clone)]
pub struct MemJournal {
    records: Arc<Mutex<Vec<TraceRecord>>>,
}

impl MemJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Records belonging to one propagation chain, in order.
    pub fn chain_records(&self, chain: u64) -> Vec<TraceRecord> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|record| record.chain() == chain)
            .cloned()
            .collect()
    }

    /// The newest `n` records, oldest first.
    pub fn tail(&self, n: usize) -> Vec<TraceRecord> {
        let guard = self.records.lock().unwrap();
        guard[guard.len().saturating_sub(n)..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().unwrap().is_empty()
    }
}

impl Journal for MemJournal {
    fn append(&mut self, record: TraceRecord) -> Result<JournalSeq, JournalError> {
        let mut guard = self.records.lock().unwrap();
        guard.push(record);
        Ok((guard.len() - 1) as JournalSeq)
    }

    fn load_from(&self, from: JournalSeq) -> Result<Vec<TraceEntry>, JournalError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .skip(from as usize)
            .map(|(position, record)| TraceEntry {
                seq: position as JournalSeq,
                record: record.clone(),
            })
            .collect())
    }

    fn next_seq(&self) -> JournalSeq {
        self.records.lock().unwrap().len() as JournalSeq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admitted(chain: u64, event: &str) -> TraceRecord {
        TraceRecord::StimulusAdmitted {
            chain,
            event: event.into(),
            fanout: 0,
        }
    }

    fn drained(chain: u64) -> TraceRecord {
        TraceRecord::ChainDrained {
            chain,
            activations: 0,
        }
    }

    #[test]
    fn sequence_numbers_are_append_positions() {
        let mut journal = MemJournal::new();
        assert_eq!(journal.append(admitted(1, "boot")).unwrap(), 0);
        assert_eq!(journal.append(drained(1)).unwrap(), 1);
        assert_eq!(journal.append(admitted(2, "tick")).unwrap(), 2);
        assert_eq!(journal.next_seq(), 3);

        let tail = journal.load_from(1).unwrap();
        let seqs: Vec<_> = tail.iter().map(|entry| entry.seq).collect();
        assert_eq!(seqs, [1, 2]);
        assert_eq!(tail[1].record, admitted(2, "tick"));
    }

    #[test]
    fn chain_records_isolate_one_chain() {
        let mut journal = MemJournal::new();
        journal.append(admitted(1, "boot")).unwrap();
        journal.append(drained(1)).unwrap();
        journal.append(admitted(2, "tick")).unwrap();
        journal.append(drained(2)).unwrap();

        assert_eq!(
            journal.chain_records(2),
            vec![admitted(2, "tick"), drained(2)]
        );
        assert!(journal.chain_records(9).is_empty());
    }

    #[test]
    fn tail_keeps_order_and_caps_at_length() {
        let mut journal = MemJournal::new();
        for chain in 1..=3 {
            journal.append(drained(chain)).unwrap();
        }
        assert_eq!(journal.tail(2), vec![drained(2), drained(3)]);
        assert_eq!(journal.tail(10).len(), 3);
    }

    #[test]
    fn clones_share_the_trace() {
        let mut journal = MemJournal::new();
        let handle = journal.clone();
        journal.append(drained(1)).unwrap();
        assert_eq!(handle.len(), 1);
        assert!(!handle.is_empty());
    }
}
