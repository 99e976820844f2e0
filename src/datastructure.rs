use itertools::Itertools;

/// Items of a document grouped by cluster id. The ids are sorted and deduplicated, which gives
/// every cluster a stable row (or column) index. The grouped items live in a single flat slice
/// and `indices` holds the offsets of every cluster inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Clusters<'a, T> {
    ids: Box<[&'a str]>,
    items: Box<[&'a T]>,
    indices: Box<[usize]>,
}

impl<'a, T> Clusters<'a, T> {
    pub(crate) fn new<F>(items: &'a [T], key: F) -> Self
    where
        F: Fn(&'a T) -> &'a str,
    {
        let mut sorted: Vec<&'a T> = items.iter().collect();
        // Stable: the items of a cluster keep their document order.
        sorted.sort_by(|a, b| key(*a).cmp(key(*b)));
        let mut ids = Vec::new();
        let mut indices = Vec::with_capacity(items.len() + 1);
        let mut offset = 0;
        indices.push(offset);
        for (id, group) in &sorted.iter().copied().chunk_by(|item| key(*item)) {
            offset += group.count();
            ids.push(id);
            indices.push(offset);
        }
        Self {
            ids: ids.into_boxed_slice(),
            items: sorted.into_boxed_slice(),
            indices: indices.into_boxed_slice(),
        }
    }

    /// Number of distinct clusters.
    pub(crate) fn len(&self) -> usize {
        self.ids.len()
    }

    /// Index-to-id lookup table.
    pub(crate) fn ids(&self) -> &[&'a str] {
        &self.ids
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    /// Items of the cluster `id`. Unknown ids have no items.
    pub(crate) fn get(&self, id: &str) -> &[&'a T] {
        match self.position(id) {
            Some(i) => &self.items[self.indices[i]..self.indices[i + 1]],
            None => &[],
        }
    }

    /// Iterates over the clusters in id order.
    pub(crate) fn iter_clusters(&self) -> impl Iterator<Item = (&'a str, &[&'a T])> + '_ {
        self.ids
            .iter()
            .zip(self.indices.windows(2))
            .map(|(id, bounds)| (*id, &self.items[bounds[0]..bounds[1]]))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn build_items() -> Vec<(&'static str, usize)> {
        vec![("b", 0), ("a", 1), ("b", 2), ("c", 3), ("a", 4)]
    }

    #[test]
    fn test_new_clusters() {
        let items = build_items();
        let clusters = Clusters::new(&items, |item| item.0);
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters.ids(), &["a", "b", "c"]);
        assert_eq!(&*clusters.indices, &[0, 2, 4, 5]);
    }

    #[test]
    fn test_iter_clusters_keeps_document_order() {
        let items = build_items();
        let clusters = Clusters::new(&items, |item| item.0);
        let actual: Vec<(&str, Vec<usize>)> = clusters
            .iter_clusters()
            .map(|(id, group)| (id, group.iter().map(|item| item.1).collect()))
            .collect();
        let expected = vec![("a", vec![1, 4]), ("b", vec![0, 2]), ("c", vec![3])];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_get_and_position() {
        let items = build_items();
        let clusters = Clusters::new(&items, |item| item.0);
        assert_eq!(clusters.position("c"), Some(2));
        assert_eq!(clusters.position("z"), None);
        assert_eq!(clusters.get("b").len(), 2);
        assert!(clusters.get("z").is_empty());
    }

    #[test]
    fn test_empty_clusters() {
        let items: Vec<(&str, usize)> = vec![];
        let clusters = Clusters::new(&items, |item| item.0);
        assert_eq!(clusters.len(), 0);
        assert_eq!(clusters.iter_clusters().count(), 0);
        assert!(clusters.get("a").is_empty());
    }
}
