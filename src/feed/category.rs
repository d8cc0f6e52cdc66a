use std::collections::HashMap;

/// Placeholder section slug -> category id mapping.
///
/// These ids are illustrative, not taken from the backend. Deployments are
/// expected to supply the real mapping through the `category_ids` config
/// table, which overrides these entries. Used only when an article carries no
/// category ids of its own.
const BUILTIN_CATEGORY_IDS: &[(&str, &[i64])] = &[
    ("gujarat", &[2]),
    ("ahmedabad", &[2, 21]),
    ("surat", &[2, 22]),
    ("vadodara", &[2, 23]),
    ("rajkot", &[2, 24]),
    ("national", &[3]),
    ("india", &[3]),
    ("world", &[4]),
    ("sports", &[5]),
    ("cricket", &[5, 51]),
    ("entertainment", &[6]),
    ("bollywood", &[6, 61]),
    ("business", &[7]),
    ("technology", &[8]),
    ("lifestyle", &[9]),
    ("religion", &[10]),
    ("health", &[11]),
    ("education", &[12]),
    ("crime", &[13]),
    ("politics", &[14]),
    ("astrology", &[15]),
];

/// Static slug -> category id lookup, optionally extended from config.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    entries: HashMap<String, Vec<i64>>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CategoryTable {
    pub fn builtin() -> Self {
        let entries = BUILTIN_CATEGORY_IDS
            .iter()
            .map(|(slug, ids)| (slug.to_string(), ids.to_vec()))
            .collect();
        Self { entries }
    }

    /// Config entries replace built-in ones with the same slug.
    pub fn with_overrides(mut self, overrides: &HashMap<String, Vec<i64>>) -> Self {
        for (slug, ids) in overrides {
            let key = normalize(slug);
            if ids.is_empty() {
                tracing::warn!(slug = %key, "Ignoring empty category id override");
                continue;
            }
            self.entries.insert(key, ids.clone());
        }
        self
    }

    pub fn ids_for(&self, slug: &str) -> Option<&[i64]> {
        self.entries.get(&normalize(slug)).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(slug: &str) -> String {
    slug.trim().trim_matches('/').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let table = CategoryTable::builtin();
        assert_eq!(table.ids_for("gujarat"), Some(&[2][..]));
        assert_eq!(table.ids_for("cricket"), Some(&[5, 51][..]));
        assert_eq!(table.ids_for("unknown-section"), None);
    }

    #[test]
    fn test_lookup_normalizes_slug() {
        let table = CategoryTable::builtin();
        assert_eq!(table.ids_for(" Sports "), Some(&[5][..]));
        assert_eq!(table.ids_for("/world/"), Some(&[4][..]));
    }

    #[test]
    fn test_overrides_replace_and_extend() {
        let overrides = HashMap::from([
            ("Gujarat".to_string(), vec![200]),
            ("kutch".to_string(), vec![2, 25]),
            ("empty".to_string(), vec![]),
        ]);
        let before = CategoryTable::builtin().len();
        let table = CategoryTable::builtin().with_overrides(&overrides);
        assert_eq!(table.ids_for("gujarat"), Some(&[200][..]));
        assert_eq!(table.ids_for("kutch"), Some(&[2, 25][..]));
        assert_eq!(table.ids_for("empty"), None);
        assert_eq!(table.len(), before + 1);
    }
}
