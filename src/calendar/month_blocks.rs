//! Month blocks - contiguous index ranges, one per calendar month

use chrono::{Datelike, NaiveDate};

use super::entry::{DateEntry, month_label};

/// Calendar month identity (labels alone repeat across years)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthBlock {
    pub start_index: usize,
    /// Inclusive
    pub end_index: usize,
    pub key: MonthKey,
    pub label: String,
}

impl MonthBlock {
    pub fn len(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start_index && index <= self.end_index
    }
}

/// Scan the sequence left to right, closing a block at every month transition
pub fn compute_month_blocks(entries: &[DateEntry]) -> Vec<MonthBlock> {
    let mut blocks = Vec::new();
    let mut block_start = 0;

    for (i, entry) in entries.iter().enumerate() {
        let key = MonthKey::of(entry.date);
        let closes = match entries.get(i + 1) {
            Some(next) => MonthKey::of(next.date) != key,
            None => true,
        };
        if closes {
            blocks.push(MonthBlock {
                start_index: block_start,
                end_index: i,
                key,
                label: month_label(entry.date),
            });
            block_start = i + 1;
        }
    }

    blocks
}

/// Block containing `index`, if any
pub fn block_containing(blocks: &[MonthBlock], index: usize) -> Option<&MonthBlock> {
    // Blocks are sorted and gap-free
    let pos = blocks.partition_point(|b| b.end_index < index);
    blocks.get(pos).filter(|b| b.contains(index))
}
