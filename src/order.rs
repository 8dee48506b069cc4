extern crate alloc;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::histogram::Histogram;

/// Counts up to this value get a dedicated head cell in the arena; larger
/// counts go through the ordered map.
pub(crate) const BASE_COUNT: u32 = 1024;

/// Count-ordered index over the live histogram colors.
///
/// The arena holds u32 cells of three kinds: the first 1024 are head cells
/// for counts `1..=1024` (cell `c - 1` holds the head node id of count `c`),
/// further head cells are allocated on demand for counts above 1024, and
/// everything else is node triples `(color, prev, next)`. Cell 0 can never
/// name a node, so 0 doubles as the "none" sentinel.
///
/// Each count bucket is a doubly-linked list: `next` walks toward the head,
/// `prev` toward the tail, and the head is the most recently inserted node.
#[derive(Debug)]
pub(crate) struct OrderIndex {
    arena: Vec<u32>,
    /// count → head cell, for counts above `BASE_COUNT`. Keys are removed as
    /// their lists empty, so the maximum key always names a non-empty list.
    large: BTreeMap<u32, u32>,
    /// Descending scan position over the small head cells. Never moves back
    /// up, so a color relocated above it stays out of reach.
    cursor: u32,
}

impl OrderIndex {
    /// Link every live color into its count bucket and record the node cell
    /// in the color's histogram slot.
    pub fn build(hist: &mut Histogram) -> Self {
        let mut arena = Vec::with_capacity((BASE_COUNT as usize) * 1024);
        arena.resize(BASE_COUNT as usize, 0);
        let mut index = Self {
            arena,
            large: BTreeMap::new(),
            cursor: BASE_COUNT,
        };

        for i in 0..hist.colors().len() {
            let color = hist.colors()[i];
            let count = hist.slot(color).count;
            // A prior extraction zeroes the counts it consumes but leaves the
            // sighting list alone; those colors are no longer live.
            if count == 0 {
                continue;
            }
            let node = index.push(color, count);
            hist.slot_mut(color).node = node;
        }
        index
    }

    /// Append a fresh node for `color` at the head of `count`'s list.
    /// Returns the node cell.
    fn push(&mut self, color: u32, count: u32) -> u32 {
        let cell = self.head_cell(count);
        let old_head = self.arena[cell as usize];
        let node = self.arena.len() as u32;
        self.arena.extend_from_slice(&[color, old_head, 0]);
        if old_head != 0 {
            self.arena[old_head as usize + 2] = node;
        }
        self.arena[cell as usize] = node;
        node
    }

    /// Head cell for `count`, allocating a map-backed cell on first use.
    fn head_cell(&mut self, count: u32) -> u32 {
        if count <= BASE_COUNT {
            count - 1
        } else if let Some(&cell) = self.large.get(&count) {
            cell
        } else {
            let cell = self.arena.len() as u32;
            self.arena.push(0);
            self.large.insert(count, cell);
            cell
        }
    }

    fn existing_head_cell(&self, count: u32) -> u32 {
        if count <= BASE_COUNT {
            count - 1
        } else {
            self.large[&count]
        }
    }

    /// Largest count with a non-empty list, or 0 when the index is drained.
    pub fn max_count(&self) -> u32 {
        if let Some((&count, _)) = self.large.last_key_value() {
            return count;
        }
        let mut count = self.cursor;
        while count > 0 {
            if self.arena[count as usize - 1] != 0 {
                return count;
            }
            count -= 1;
        }
        0
    }

    /// Detach and return the head of the highest-count list as
    /// `(color, count)`.
    ///
    /// Map-backed lists are always eligible; the small buckets are scanned
    /// downward with the persistent cursor, which stops once it reaches
    /// `floor`.
    pub fn pop_max(&mut self, floor: u32) -> Option<(u32, u32)> {
        if let Some((&count, &cell)) = self.large.last_key_value() {
            let node = self.arena[cell as usize] as usize;
            let color = self.arena[node];
            let prev = self.arena[node + 1];
            self.arena[cell as usize] = prev;
            if prev == 0 {
                self.large.remove(&count);
            } else {
                self.arena[prev as usize + 2] = 0;
            }
            return Some((color, count));
        }

        while self.cursor > floor {
            let node = self.arena[self.cursor as usize - 1] as usize;
            if node == 0 {
                self.cursor -= 1;
                continue;
            }
            let color = self.arena[node];
            let prev = self.arena[node + 1];
            self.arena[self.cursor as usize - 1] = prev;
            if prev != 0 {
                self.arena[prev as usize + 2] = 0;
            }
            return Some((color, self.cursor));
        }
        None
    }

    /// Unlink `node` from the list holding `count`.
    pub fn remove(&mut self, node: u32, count: u32) {
        let prev = self.arena[node as usize + 1];
        let next = self.arena[node as usize + 2];
        if next != 0 {
            self.arena[next as usize + 1] = prev;
        } else {
            let cell = self.existing_head_cell(count);
            self.arena[cell as usize] = prev;
            if prev == 0 && count > BASE_COUNT {
                self.large.remove(&count);
            }
        }
        if prev != 0 {
            self.arena[prev as usize + 2] = next;
        }
    }

    /// Relink an unlinked `node` (which keeps its color) as the head of
    /// `count`'s list.
    pub fn reinsert(&mut self, node: u32, count: u32) {
        let cell = self.head_cell(count);
        let old_head = self.arena[cell as usize];
        if old_head != 0 {
            self.arena[old_head as usize + 2] = node;
        }
        self.arena[node as usize + 1] = old_head;
        self.arena[node as usize + 2] = 0;
        self.arena[cell as usize] = node;
    }

    /// Colors in `count`'s list, head first. Test-only walk.
    #[cfg(test)]
    pub fn list_colors(&self, count: u32) -> Vec<u32> {
        let cell = if count <= BASE_COUNT {
            count - 1
        } else {
            match self.large.get(&count) {
                Some(&cell) => cell,
                None => return Vec::new(),
            }
        };
        let mut colors = Vec::new();
        let mut node = self.arena[cell as usize];
        while node != 0 {
            colors.push(self.arena[node as usize]);
            node = self.arena[node as usize + 1];
        }
        colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram_of(runs: &[(u32, usize)]) -> Histogram {
        let mut hist = Histogram::new();
        for &(color, count) in runs {
            hist.add_bitmap(&alloc::vec![color; count]);
        }
        hist
    }

    #[test]
    fn build_links_every_live_color() {
        let mut hist = histogram_of(&[(0x111111, 3), (0x222222, 1), (0x333333, 3)]);
        let index = OrderIndex::build(&mut hist);

        // Head is the most recently inserted color of the bucket
        assert_eq!(index.list_colors(3), &[0x333333, 0x111111]);
        assert_eq!(index.list_colors(1), &[0x222222]);
        assert_eq!(index.list_colors(2), &[] as &[u32]);

        // Every slot points at a node holding its own color
        for &color in &[0x111111u32, 0x222222, 0x333333] {
            let node = hist.slot(color).node;
            assert_ne!(node, 0);
            assert_eq!(index.arena[node as usize], color);
        }
    }

    #[test]
    fn pop_max_descends_counts_lifo_within_bucket() {
        let mut hist = histogram_of(&[(0xaaaaaa, 2), (0xbbbbbb, 5), (0xcccccc, 2)]);
        let mut index = OrderIndex::build(&mut hist);

        assert_eq!(index.max_count(), 5);
        assert_eq!(index.pop_max(0), Some((0xbbbbbb, 5)));
        assert_eq!(index.pop_max(0), Some((0xcccccc, 2)));
        assert_eq!(index.pop_max(0), Some((0xaaaaaa, 2)));
        assert_eq!(index.pop_max(0), None);
        assert_eq!(index.max_count(), 0);
    }

    #[test]
    fn pop_max_respects_floor() {
        let mut hist = histogram_of(&[(0xaaaaaa, 4), (0xbbbbbb, 3)]);
        let mut index = OrderIndex::build(&mut hist);

        assert_eq!(index.pop_max(3), Some((0xaaaaaa, 4)));
        // Count 3 sits at the floor and stays unpopped
        assert_eq!(index.pop_max(3), None);
        assert_eq!(index.list_colors(3), &[0xbbbbbb]);
    }

    #[test]
    fn large_counts_go_through_the_map() {
        let mut hist = histogram_of(&[(0xaaaaaa, 1500), (0xbbbbbb, 1500), (0xcccccc, 2)]);
        let mut index = OrderIndex::build(&mut hist);

        assert_eq!(index.max_count(), 1500);
        assert_eq!(index.list_colors(1500), &[0xbbbbbb, 0xaaaaaa]);

        assert_eq!(index.pop_max(0), Some((0xbbbbbb, 1500)));
        // Popping the head leaves a clean single-node list
        assert_eq!(index.list_colors(1500), &[0xaaaaaa]);
        assert_eq!(index.pop_max(0), Some((0xaaaaaa, 1500)));
        // The emptied key is gone so max_count falls through to small buckets
        assert!(index.large.is_empty());
        assert_eq!(index.max_count(), 2);
    }

    #[test]
    fn remove_and_reinsert_relocate_a_node() {
        let mut hist = histogram_of(&[(0xaaaaaa, 4), (0xbbbbbb, 4), (0xcccccc, 4)]);
        let mut index = OrderIndex::build(&mut hist);

        // Remove the middle node (0xbbbbbb sits between the head 0xcccccc
        // and the tail 0xaaaaaa) and drop it to count 2
        let node = hist.slot(0xbbbbbb).node;
        index.remove(node, 4);
        assert_eq!(index.list_colors(4), &[0xcccccc, 0xaaaaaa]);

        index.reinsert(node, 2);
        assert_eq!(index.list_colors(2), &[0xbbbbbb]);

        // Remove the head
        let node = hist.slot(0xcccccc).node;
        index.remove(node, 4);
        assert_eq!(index.list_colors(4), &[0xaaaaaa]);

        // Remove the last node; the bucket empties
        let node = hist.slot(0xaaaaaa).node;
        index.remove(node, 4);
        assert_eq!(index.list_colors(4), &[] as &[u32]);
    }

    #[test]
    fn removing_last_large_node_erases_the_key() {
        let mut hist = histogram_of(&[(0xaaaaaa, 2000), (0xbbbbbb, 1)]);
        let mut index = OrderIndex::build(&mut hist);

        let node = hist.slot(0xaaaaaa).node;
        index.remove(node, 2000);
        assert!(index.large.is_empty());
        assert_eq!(index.max_count(), 1);

        index.reinsert(node, 1);
        assert_eq!(index.list_colors(1), &[0xaaaaaa, 0xbbbbbb]);
    }

    #[test]
    fn buckets_stay_disjoint_under_relocation() {
        let colors = [0x101010u32, 0x202020, 0x303030, 0x404040];
        let mut hist = histogram_of(&[
            (colors[0], 6),
            (colors[1], 6),
            (colors[2], 6),
            (colors[3], 3),
        ]);
        let mut index = OrderIndex::build(&mut hist);

        // Walk each color down one count at a time, checking that it always
        // lives in exactly one bucket.
        for step in 0..3u32 {
            for &color in &colors[..3] {
                let node = hist.slot(color).node;
                index.remove(node, 6 - step);
                index.reinsert(node, 5 - step);
            }
            for count in 1..=6u32 {
                let members = index.list_colors(count);
                for &color in &colors {
                    let occurrences = members.iter().filter(|&&c| c == color).count();
                    assert!(occurrences <= 1, "color {color:06x} duplicated at count {count}");
                }
            }
        }
        assert_eq!(index.list_colors(3).len(), 4);
    }
}
