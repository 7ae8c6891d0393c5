//! Growable bitset keyed by dense integer ids.

/// A set of small integers backed by `u64` words.
///
/// Inserting past the end grows the storage; lookups past the end are `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set able to hold `bits` ids without growing.
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(64)],
        }
    }

    /// Adds `index`. Returns `true` if it was not already present.
    pub fn insert(&mut self, index: usize) -> bool {
        let word = index / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let mask = 1u64 << (index % 64);
        let was_set = self.words[word] & mask != 0;
        self.words[word] |= mask;
        !was_set
    }

    /// Removes `index`. Returns `true` if it was present.
    pub fn remove(&mut self, index: usize) -> bool {
        let word = index / 64;
        let Some(bits) = self.words.get_mut(word) else {
            return false;
        };
        let mask = 1u64 << (index % 64);
        let was_set = *bits & mask != 0;
        *bits &= !mask;
        was_set
    }

    /// Inserts or removes `index` depending on `value`.
    pub fn set(&mut self, index: usize, value: bool) {
        if value {
            self.insert(index);
        } else {
            self.remove(index);
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.words
            .get(index / 64)
            .is_some_and(|bits| bits & (1u64 << (index % 64)) != 0)
    }

    /// Number of ids in the set.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Iterates set ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(word_index, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let bit = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(word_index * 64 + bit)
            })
        })
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = BitSet::new();
        for index in iter {
            set.insert(index);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut set = BitSet::new();
        assert!(set.insert(3));
        assert!(!set.insert(3));
        assert!(set.insert(200));
        assert!(set.contains(3));
        assert!(set.contains(200));
        assert!(!set.contains(4));
        assert!(!set.contains(10_000));
        assert_eq!(set.count(), 2);
    }

    #[test]
    fn test_remove() {
        let mut set = BitSet::with_capacity(128);
        set.insert(64);
        assert!(set.remove(64));
        assert!(!set.remove(64));
        assert!(!set.remove(9999));
        assert!(set.is_empty());
    }

    #[test]
    fn test_iter_ascending_across_words() {
        let set: BitSet = [130, 0, 63, 64, 7].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![0, 7, 63, 64, 130]);
    }

    #[test]
    fn test_set_and_clear() {
        let mut set = BitSet::new();
        set.set(5, true);
        set.set(6, true);
        set.set(5, false);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![6]);
        set.clear();
        assert!(set.is_empty());
    }
}
