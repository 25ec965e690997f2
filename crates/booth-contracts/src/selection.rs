use indexmap::IndexMap;

/// One wardrobe choice for a single category.
///
/// `value` is the descriptor fed into the prompt; `display_value` is what the
/// user sees (a preset label may differ from its underlying descriptor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySelection {
    pub category_id: String,
    pub label: String,
    pub value: String,
    pub display_value: String,
}

/// Insertion-ordered store of at most one selection per category.
///
/// The store never rejects a category id: the catalog is advisory, so unknown
/// ids are kept verbatim and labelled with the id itself unless a label was
/// seeded in advance.
#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    labels: IndexMap<String, String>,
    selections: IndexMap<String, CategorySelection>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the category-id -> label mapping used by `select_preset`.
    pub fn seed_labels<I, K, V>(&mut self, labels: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (id, label) in labels {
            self.labels.insert(id.into(), label.into());
        }
    }

    pub fn select_preset(&mut self, category_id: &str, display_label: &str, value: &str) {
        let label = self
            .labels
            .get(category_id)
            .cloned()
            .unwrap_or_else(|| category_id.to_string());
        self.selections.insert(
            category_id.to_string(),
            CategorySelection {
                category_id: category_id.to_string(),
                label,
                value: value.to_string(),
                display_value: display_label.to_string(),
            },
        );
    }

    pub fn select_custom(&mut self, category_id: &str, label: &str, value: &str) {
        self.selections.insert(
            category_id.to_string(),
            CategorySelection {
                category_id: category_id.to_string(),
                label: label.to_string(),
                value: value.to_string(),
                display_value: value.to_string(),
            },
        );
    }

    /// Removing an absent category is a no-op; returns whether anything left.
    pub fn remove(&mut self, category_id: &str) -> bool {
        self.selections.shift_remove(category_id).is_some()
    }

    pub fn clear(&mut self) {
        self.selections.clear();
    }

    pub fn get(&self, category_id: &str) -> Option<&CategorySelection> {
        self.selections.get(category_id)
    }

    /// Selections in insertion order.
    pub fn list(&self) -> impl Iterator<Item = &CategorySelection> {
        self.selections.values()
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::SelectionStore;

    #[test]
    fn preset_uses_seeded_category_label() {
        let mut store = SelectionStore::new();
        store.seed_labels([("lower-body", "Lower Body")]);
        store.select_preset("lower-body", "Blue Jeans", "classic blue denim jeans");

        let selection = store.get("lower-body").expect("selection stored");
        assert_eq!(selection.label, "Lower Body");
        assert_eq!(selection.display_value, "Blue Jeans");
        assert_eq!(selection.value, "classic blue denim jeans");
    }

    #[test]
    fn unknown_category_id_is_stored_verbatim() {
        let mut store = SelectionStore::new();
        store.select_preset("cape", "Red Cape", "flowing red superhero cape");

        let selection = store.get("cape").expect("selection stored");
        assert_eq!(selection.label, "cape");
        assert_eq!(selection.value, "flowing red superhero cape");
    }

    #[test]
    fn custom_selection_mirrors_value_as_display() {
        let mut store = SelectionStore::new();
        store.select_custom("footwear", "Footwear", "scuffed hiking boots");

        let selection = store.get("footwear").expect("selection stored");
        assert_eq!(selection.display_value, "scuffed hiking boots");
    }

    #[test]
    fn reselecting_a_category_replaces_never_merges() {
        let mut store = SelectionStore::new();
        store.select_custom("upper-body", "Upper Body", "white tee");
        store.select_preset("upper-body", "Hoodie", "grey pullover hoodie");

        assert_eq!(store.len(), 1);
        let selection = store.get("upper-body").expect("selection stored");
        assert_eq!(selection.value, "grey pullover hoodie");
    }

    #[test]
    fn list_length_tracks_distinct_categories() {
        let mut store = SelectionStore::new();
        store.select_custom("a", "A", "one");
        store.select_custom("b", "B", "two");
        store.select_custom("a", "A", "three");
        store.remove("missing");

        assert_eq!(store.list().count(), 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn list_preserves_insertion_order_across_replacement() {
        let mut store = SelectionStore::new();
        store.select_custom("first", "First", "one");
        store.select_custom("second", "Second", "two");
        store.select_custom("first", "First", "replaced");

        let ids: Vec<&str> = store.list().map(|entry| entry.category_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn remove_and_clear() {
        let mut store = SelectionStore::new();
        store.select_custom("bags", "Bags", "canvas tote");
        assert!(store.remove("bags"));
        assert!(!store.remove("bags"));
        store.select_custom("bags", "Bags", "clutch");
        store.clear();
        assert!(store.is_empty());
    }
}
