//! A `std::vec::Vec`, but 1-indexed instead of 0-indexed.

/// Like a `std::vec::Vec`, but 1-indexed instead of 0-indexed. Index 0 is never valid; class
/// files use it as a "no entry" marker.
#[derive(Debug, Clone, PartialEq)]
pub struct OneIndexedVec<T> {
    vec: Vec<T>,
}

impl<T> Default for OneIndexedVec<T> {
    fn default() -> Self {
        OneIndexedVec::new()
    }
}

impl<T> OneIndexedVec<T> {
    pub fn new() -> Self {
        OneIndexedVec { vec: Vec::new() }
    }

    /// Returns the element at the given index, or `None` if the index is 0 or out of bounds.
    pub fn get(&self, index: usize) -> Option<&T> {
        index.checked_sub(1).and_then(|i| self.vec.get(i))
    }

    /// Appends an element and returns the index it was stored at.
    pub fn push(&mut self, value: T) -> usize {
        self.vec.push(value);
        self.vec.len()
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::OneIndexedVec;

    #[test]
    fn indices_start_at_one() {
        let mut v = OneIndexedVec::new();
        assert_eq!(v.push("a"), 1);
        assert_eq!(v.push("b"), 2);
        assert_eq!(v.get(1), Some(&"a"));
        assert_eq!(v.get(2), Some(&"b"));
        assert_eq!(v.get(0), None);
        assert_eq!(v.get(3), None);
        assert_eq!(v.len(), 2);
    }

    /// Elements need not have a default themselves.
    #[test]
    fn default_is_empty() {
        struct Opaque;
        let v: OneIndexedVec<Opaque> = Default::default();
        assert!(v.is_empty());
        assert!(v.get(1).is_none());
    }
}
