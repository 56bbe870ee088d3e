use crate::error::CatalogError;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpeciesRecord {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    #[serde(default)]
    pub dutch_name: String,
    #[serde(default)]
    pub english_name: String,
    #[serde(default)]
    pub spanish_name: String,
    #[serde(default)]
    pub latin_name: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub order: String,
    #[serde(default)]
    pub conservation_status: Option<String>,
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

fn first_non_empty<'a>(names: [&'a str; 4]) -> &'a str {
    names.into_iter().find(|n| !n.trim().is_empty()).unwrap_or("")
}

impl SpeciesRecord {
    /// Name shown as the card title: Dutch first.
    pub fn title(&self) -> &str {
        first_non_empty([
            &self.dutch_name,
            &self.english_name,
            &self.spanish_name,
            &self.latin_name,
        ])
    }

    /// Name used for placeholders and the detail hero: English first.
    pub fn label_name(&self) -> &str {
        first_non_empty([
            &self.english_name,
            &self.dutch_name,
            &self.spanish_name,
            &self.latin_name,
        ])
    }

    pub fn badge(&self) -> &str {
        if !self.family.is_empty() {
            &self.family
        } else if !self.order.is_empty() {
            &self.order
        } else {
            "—"
        }
    }

    /// Lowercased text the free-text query is matched against.
    fn haystack(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.dutch_name,
            self.english_name,
            self.spanish_name,
            self.latin_name,
            self.family,
            self.order
        )
        .to_lowercase()
    }
}

/// Parse a catalog. Any problem rejects the whole catalog.
pub fn parse_catalog(path: &Path, raw: &str) -> Result<Vec<SpeciesRecord>, CatalogError> {
    let records: Vec<SpeciesRecord> =
        serde_json::from_str(raw).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut ids = HashSet::with_capacity(records.len());
    for record in &records {
        if !ids.insert(record.id.as_str()) {
            return Err(CatalogError::DuplicateId(record.id.clone()));
        }
        if record.title().is_empty() {
            return Err(CatalogError::Nameless(record.id.clone()));
        }
    }
    Ok(records)
}

/// Read and parse the catalog file.
pub async fn load_catalog(path: &Path) -> Result<Vec<SpeciesRecord>, CatalogError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    parse_catalog(path, &raw)
}

/// Date a record was marked as seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeenMarker {
    pub date: NaiveDate,
}

impl SeenMarker {
    pub fn label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Inputs of the filter predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub query: String,
    pub family: Option<String>,
    pub spotted_only: bool,
}

/// Full catalog plus per-record seen markers.
#[derive(Debug, Clone)]
pub struct RecordStore {
    records: Vec<SpeciesRecord>,
    by_id: HashMap<String, usize>,
    seen: HashMap<String, SeenMarker>,
}

impl RecordStore {
    pub fn new(records: Vec<SpeciesRecord>) -> Self {
        let by_id = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
        Self {
            records,
            by_id,
            seen: HashMap::new(),
        }
    }

    pub fn with_seen(mut self, seen: HashMap<String, SeenMarker>) -> Self {
        self.seen = seen;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Record at a catalog index; indices come from `filter`.
    pub fn at(&self, index: usize) -> &SpeciesRecord {
        &self.records[index]
    }

    pub fn by_id(&self, id: &str) -> Option<&SpeciesRecord> {
        self.by_id.get(id).and_then(|&i| self.records.get(i))
    }

    pub fn seen(&self, id: &str) -> Option<SeenMarker> {
        self.seen.get(id).copied()
    }

    /// Flip the seen marker; returns the new state. Unknown ids stay unseen.
    pub fn toggle_seen(&mut self, id: &str, today: NaiveDate) -> Option<SeenMarker> {
        if self.by_id(id).is_none() {
            return None;
        }
        if self.seen.remove(id).is_some() {
            None
        } else {
            let marker = SeenMarker { date: today };
            self.seen.insert(id.to_string(), marker);
            Some(marker)
        }
    }

    /// Distinct non-empty families, sorted.
    pub fn families(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| !r.family.is_empty())
            .map(|r| r.family.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Indices of records passing the filter, in catalog order.
    pub fn filter(&self, state: &FilterState) -> Vec<usize> {
        let query = state.query.trim().to_lowercase();
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                if let Some(family) = &state.family {
                    if &r.family != family {
                        return false;
                    }
                }
                if state.spotted_only && !self.seen.contains_key(&r.id) {
                    return false;
                }
                query.is_empty() || r.haystack().contains(&query)
            })
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
pub(crate) fn test_record(id: &str, english: &str, latin: &str, family: &str) -> SpeciesRecord {
    SpeciesRecord {
        id: id.to_string(),
        dutch_name: String::new(),
        english_name: english.to_string(),
        spanish_name: String::new(),
        latin_name: latin.to_string(),
        family: family.to_string(),
        order: "Passeriformes".to_string(),
        conservation_status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> RecordStore {
        let mut thrush = test_record("1", "Clay-colored Thrush", "Turdus grayi", "Turdidae");
        thrush.dutch_name = "Grijze Lijster".to_string();
        thrush.spanish_name = "Yigüirro".to_string();
        let motmot = SpeciesRecord {
            order: "Coraciiformes".to_string(),
            ..test_record("2", "Lesson's Motmot", "Momotus lessonii", "Momotidae")
        };
        let robin = test_record("3", "Mountain Thrush", "Turdus plebejus", "Turdidae");
        RecordStore::new(vec![thrush, motmot, robin])
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn test_parse_catalog_accepts_numeric_ids() {
        let raw = r#"[
            {"id": 7, "english_name": "Resplendent Quetzal", "latin_name": "Pharomachrus mocinno",
             "family": "Trogonidae", "order": "Trogoniformes", "conservation_status": "NT"},
            {"id": "x8", "dutch_name": "Keelbaardkolibrie"}
        ]"#;
        let records = parse_catalog(Path::new("birds.json"), raw).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "7");
        assert_eq!(records[0].conservation_status.as_deref(), Some("NT"));
        assert_eq!(records[1].title(), "Keelbaardkolibrie");
    }

    #[test]
    fn test_parse_catalog_rejects_malformed_and_duplicates() {
        assert!(matches!(
            parse_catalog(Path::new("b.json"), "{not json"),
            Err(CatalogError::Parse { .. })
        ));
        let dup = r#"[{"id": 1, "latin_name": "A a"}, {"id": "1", "latin_name": "B b"}]"#;
        assert!(matches!(
            parse_catalog(Path::new("b.json"), dup),
            Err(CatalogError::DuplicateId(id)) if id == "1"
        ));
        let nameless = r#"[{"id": 1, "family": "Turdidae"}]"#;
        assert!(matches!(
            parse_catalog(Path::new("b.json"), nameless),
            Err(CatalogError::Nameless(_))
        ));
    }

    #[tokio::test]
    async fn test_load_catalog_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_catalog(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
    }

    #[test]
    fn test_name_priorities() {
        let store = sample();
        let thrush = store.by_id("1").unwrap();
        assert_eq!(thrush.title(), "Grijze Lijster");
        assert_eq!(thrush.label_name(), "Clay-colored Thrush");
        assert_eq!(thrush.badge(), "Turdidae");

        let bare = SpeciesRecord {
            family: String::new(),
            order: String::new(),
            ..test_record("9", "", "Aa bb", "")
        };
        assert_eq!(bare.title(), "Aa bb");
        assert_eq!(bare.badge(), "—");
    }

    #[test]
    fn test_families_sorted_and_distinct() {
        let store = sample();
        assert_eq!(store.families(), vec!["Momotidae", "Turdidae"]);
    }

    #[test]
    fn test_family_filter_preserves_order() {
        let store = sample();
        let state = FilterState {
            family: Some("Turdidae".to_string()),
            ..Default::default()
        };
        assert_eq!(store.filter(&state), vec![0, 2]);
    }

    #[test]
    fn test_query_is_case_insensitive_across_fields() {
        let store = sample();
        let by_query = |q: &str| {
            store.filter(&FilterState {
                query: q.to_string(),
                ..Default::default()
            })
        };
        assert_eq!(by_query("  TURDUS "), vec![0, 2]);
        assert_eq!(by_query("yigüirro"), vec![0]);
        assert_eq!(by_query("lijster"), vec![0]);
        assert_eq!(by_query("coraciiformes"), vec![1]);
        assert_eq!(by_query("momotidae"), vec![1]);
        assert_eq!(by_query(""), vec![0, 1, 2]);
        assert!(by_query("penguin").is_empty());
    }

    #[test]
    fn test_spotted_only_uses_seen_markers() {
        let mut store = sample();
        store.toggle_seen("2", today());
        let state = FilterState {
            spotted_only: true,
            ..Default::default()
        };
        assert_eq!(store.filter(&state), vec![1]);
    }

    #[test]
    fn test_toggle_seen_twice_restores_state() {
        let mut store = sample();
        let marker = store.toggle_seen("1", today());
        assert_eq!(marker.map(|m| m.label()), Some("2026-10-19".to_string()));
        assert_eq!(store.seen("1"), marker);
        assert_eq!(store.toggle_seen("1", today()), None);
        assert_eq!(store.toggle_seen("no-such-bird", today()), None);
        assert_eq!(store.seen("no-such-bird"), None);
        assert_eq!(store.seen("1"), None);
    }

    proptest! {
        #[test]
        fn prop_family_filter_is_exact_subset(
            families in proptest::collection::vec(0u8..4, 0..60),
            pick in 0u8..4,
        ) {
            let records: Vec<_> = families
                .iter()
                .enumerate()
                .map(|(i, f)| test_record(&i.to_string(), "Bird", "Avis", &format!("Fam{}", f)))
                .collect();
            let store = RecordStore::new(records);
            let wanted = format!("Fam{}", pick);
            let got = store.filter(&FilterState { family: Some(wanted.clone()), ..Default::default() });
            let expected: Vec<usize> = families
                .iter()
                .enumerate()
                .filter(|(_, f)| format!("Fam{}", f) == wanted)
                .map(|(i, _)| i)
                .collect();
            prop_assert_eq!(got, expected);
        }

        #[test]
        fn prop_query_matches_regardless_of_case(name in "[a-zA-Z]{3,12}", upper in any::<bool>()) {
            let store = RecordStore::new(vec![test_record("1", &name, "Avis avis", "Fam")]);
            let query = if upper { name.to_uppercase() } else { name.to_lowercase() };
            let got = store.filter(&FilterState { query, ..Default::default() });
            prop_assert_eq!(got, vec![0]);
        }
    }
}
