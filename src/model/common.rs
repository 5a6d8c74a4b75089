use std::collections::HashMap;
use std::hash::Hash;

pub type IssueId = i64;
pub type ProjectId = i64;
pub type DesignId = i64;
pub type VersionId = i64;
pub type UserId = i64;

/// Index a collection by a composite key built from each item.
///
/// Later items win when two items produce the same key.
pub fn index_by_key<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> HashMap<K, T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    items.into_iter().map(|item| (key(&item), item)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_by_composite_key() {
        let words = vec!["word", "worm", "work", "waste"];
        let index = index_by_key(words, |w| (w.chars().next(), w.len(), w.chars().last()));

        assert_eq!(index.get(&(Some('w'), 4, Some('m'))), Some(&"worm"));
        assert_eq!(index.get(&(Some('w'), 5, Some('e'))), Some(&"waste"));
        assert_eq!(index.get(&(Some('w'), 3, Some('m'))), None);
        assert_eq!(index.len(), 4);
    }
}
