//! Per-table occupancy statistics.

use crate::dict::Dict;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableStats {
    pub table: usize,
    pub size: u64,
    pub used: u64,
    /// Buckets holding at least one entry.
    pub buckets: u64,
    pub max_chain_len: u64,
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.table == 0 {
            "main hash table"
        } else {
            "rehashing target"
        };
        if self.used == 0 {
            return writeln!(
                f,
                "Hash table {} stats ({}): No stats available for empty dictionaries",
                self.table, kind
            );
        }
        writeln!(f, "Hash table {} stats ({}):", self.table, kind)?;
        writeln!(f, " table size: {}", self.size)?;
        writeln!(f, " number of elements: {}", self.used)?;
        writeln!(f, " different slots: {}", self.buckets)?;
        writeln!(f, " max chain length: {}", self.max_chain_len)?;
        writeln!(
            f,
            " avg chain length: {:.2}",
            self.used as f64 / self.buckets as f64
        )
    }
}

impl<K, V, S> Dict<K, V, S> {
    /// Stats for the active table, plus the destination while rehashing.
    pub fn stats(&self) -> Vec<TableStats> {
        let tables = if self.is_rehashing() { 2 } else { 1 };
        (0..tables)
            .map(|i| {
                let t = &self.tables[i];
                let mut stats = TableStats {
                    table: i,
                    size: t.size,
                    used: t.used,
                    buckets: 0,
                    max_chain_len: 0,
                };
                for idx in 0..t.size {
                    let len = t.chain_len(&self.entries, idx);
                    if len > 0 {
                        stats.buckets += 1;
                        stats.max_chain_len = stats.max_chain_len.max(len);
                    }
                }
                stats
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::dict::Dict;

    #[test]
    fn empty_dict_has_no_stats_text() {
        let d: Dict<u32, u32> = Dict::new();
        let stats = d.stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].size, 0);
        assert!(stats[0].to_string().contains("No stats available"));
    }

    /// Invariant: chain lengths add up to the table's `used` count.
    #[test]
    fn chain_lengths_cover_all_entries() {
        let mut d: Dict<u32, u32> = Dict::new();
        for i in 0..20 {
            d.store(i, i).unwrap();
        }
        let stats = d.stats();
        assert_eq!(stats.len(), if d.is_rehashing() { 2 } else { 1 });
        let used: u64 = stats.iter().map(|s| s.used).sum();
        assert_eq!(used, 20);
        for s in &stats {
            assert!(s.buckets <= s.used);
            assert!(s.max_chain_len >= 1 || s.used == 0);
            let total: u64 = (0..s.size)
                .map(|i| d.tables[s.table].chain_len(&d.entries, i))
                .sum();
            assert_eq!(total, s.used);
        }
        let text = stats[0].to_string();
        assert!(text.starts_with("Hash table 0 stats (main hash table):"));
    }
}
