//! 置换表
//!
//! 用于缓存已搜索过的局面，避免重复计算。根节点的多个工作线程共享同一张表，
//! 条目用三个原子字写入，校验字为 `hash ^ value ^ meta`，读到撕裂的条目会被当作未命中。

use std::sync::atomic::{AtomicU64, Ordering};

/// 置换表条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    /// 精确值
    Exact,
    /// 下界（Beta 截断）
    LowerBound,
    /// 上界（Alpha 未提升）
    UpperBound,
}

impl EntryType {
    fn to_bits(self) -> u64 {
        match self {
            EntryType::Exact => 0,
            EntryType::LowerBound => 1,
            EntryType::UpperBound => 2,
        }
    }

    fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            1 => EntryType::LowerBound,
            2 => EntryType::UpperBound,
            _ => EntryType::Exact,
        }
    }
}

/// 置换表条目
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TTEntry {
    /// 走子方视角的值
    pub value: f64,
    /// 剩余搜索深度
    pub depth: u8,
    /// 条目类型
    pub entry_type: EntryType,
    /// 最佳走法的格子索引
    pub best_move: Option<u8>,
    /// 年龄（用于替换策略）
    pub age: u8,
}

impl TTEntry {
    /// 打包为元数据字：depth | type << 8 | (move + 1) << 10 | age << 17
    fn pack_meta(&self) -> u64 {
        let best_move = self.best_move.map(|m| m as u64 + 1).unwrap_or(0);
        (self.depth as u64)
            | (self.entry_type.to_bits() << 8)
            | ((best_move & 0x7F) << 10)
            | ((self.age as u64) << 17)
    }

    fn unpack(value_bits: u64, meta: u64) -> Self {
        let best_move = ((meta >> 10) & 0x7F) as u8;
        Self {
            value: f64::from_bits(value_bits),
            depth: (meta & 0xFF) as u8,
            entry_type: EntryType::from_bits(meta >> 8),
            best_move: best_move.checked_sub(1),
            age: ((meta >> 17) & 0xFF) as u8,
        }
    }
}

struct Slot {
    check: AtomicU64,
    value: AtomicU64,
    meta: AtomicU64,
}

impl Slot {
    fn empty() -> Self {
        Self {
            check: AtomicU64::new(0),
            value: AtomicU64::new(0),
            meta: AtomicU64::new(0),
        }
    }
}

/// 置换表
///
/// 固定大小的哈希表，所有操作只需要 `&self`
pub struct TranspositionTable {
    slots: Vec<Slot>,
    /// 当前年龄
    age: AtomicU64,
}

impl TranspositionTable {
    /// 创建指定大小的置换表
    ///
    /// # Arguments
    /// * `size_mb` - 表大小（MB），至少分配一个条目
    pub fn new(size_mb: usize) -> Self {
        let slot_size = std::mem::size_of::<Slot>();
        let size = ((size_mb * 1024 * 1024) / slot_size).max(1);

        Self {
            slots: (0..size).map(|_| Slot::empty()).collect(),
            age: AtomicU64::new(0),
        }
    }

    #[inline]
    fn index(&self, hash: u64) -> usize {
        (hash % self.slots.len() as u64) as usize
    }

    /// 查询条目
    pub fn probe(&self, hash: u64) -> Option<TTEntry> {
        let slot = &self.slots[self.index(hash)];
        let value = slot.value.load(Ordering::Acquire);
        let meta = slot.meta.load(Ordering::Acquire);
        let check = slot.check.load(Ordering::Acquire);

        // meta 为 0 表示空槽（深度 0 的条目从不写入）
        if meta == 0 || check ^ value ^ meta != hash {
            return None;
        }

        Some(TTEntry::unpack(value, meta))
    }

    /// 存储条目
    ///
    /// 替换策略：空槽直接写入；旧条目年龄不同或新条目深度不小于旧条目时替换
    pub fn store(
        &self,
        hash: u64,
        value: f64,
        depth: u8,
        entry_type: EntryType,
        best_move: Option<u8>,
    ) {
        if depth == 0 {
            return;
        }

        let slot = &self.slots[self.index(hash)];
        let age = self.age.load(Ordering::Relaxed) as u8;

        let existing_meta = slot.meta.load(Ordering::Relaxed);
        if existing_meta != 0 {
            let existing = TTEntry::unpack(0, existing_meta);
            if existing.age == age && depth < existing.depth {
                return;
            }
        }

        let entry = TTEntry {
            value,
            depth,
            entry_type,
            best_move,
            age,
        };
        let value_bits = value.to_bits();
        let meta = entry.pack_meta();

        slot.value.store(value_bits, Ordering::Release);
        slot.meta.store(meta, Ordering::Release);
        slot.check.store(hash ^ value_bits ^ meta, Ordering::Release);
    }

    /// 增加年龄（每次新搜索时调用）
    pub fn new_search(&self) {
        self.age.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tt_store_and_probe() {
        let tt = TranspositionTable::new(1); // 1MB

        let hash = 0x1234567890ABCDEF_u64;
        tt.store(hash, 0.375, 5, EntryType::Exact, Some(19));

        let entry = tt.probe(hash).unwrap();
        assert_eq!(entry.value, 0.375);
        assert_eq!(entry.depth, 5);
        assert_eq!(entry.entry_type, EntryType::Exact);
        assert_eq!(entry.best_move, Some(19));
    }

    #[test]
    fn test_tt_miss() {
        let tt = TranspositionTable::new(1);
        assert!(tt.probe(0x1234567890ABCDEF).is_none());
    }

    #[test]
    fn test_tt_replacement() {
        let tt = TranspositionTable::new(1);
        let hash = 0x1234567890ABCDEF_u64;

        // 存储深度 3 的条目
        tt.store(hash, -0.5, 3, EntryType::UpperBound, None);
        // 用深度 5 的条目替换
        tt.store(hash, 0.25, 5, EntryType::LowerBound, Some(0));
        // 同一年龄下更浅的条目不替换
        tt.store(hash, 0.9, 2, EntryType::Exact, None);

        let entry = tt.probe(hash).unwrap();
        assert_eq!(entry.depth, 5);
        assert_eq!(entry.value, 0.25);
        assert_eq!(entry.entry_type, EntryType::LowerBound);
        assert_eq!(entry.best_move, Some(0));
    }

    #[test]
    fn test_new_search_allows_shallow_overwrite() {
        let tt = TranspositionTable::new(1);
        let hash = 42;

        tt.store(hash, 0.1, 6, EntryType::Exact, None);
        tt.new_search();
        tt.store(hash, 0.2, 1, EntryType::Exact, Some(63));

        let entry = tt.probe(hash).unwrap();
        assert_eq!(entry.depth, 1);
        assert_eq!(entry.best_move, Some(63));
    }

    #[test]
    fn test_colliding_key_rejected() {
        let tt = TranspositionTable::new(0); // 单个条目
        tt.store(7, 0.5, 3, EntryType::Exact, None);

        assert!(tt.probe(7).is_some());
        assert!(tt.probe(8).is_none());
    }
}
