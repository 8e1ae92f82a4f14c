use crate::core::value::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer, ser::SerializeMap};

/// A named value inside a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: Value,
}

/// An ordered mapping from field name to value.
///
/// Field order is the order in which the backend returned the columns (or
/// in which they were inserted), and is preserved through serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Record {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Builder-style `set`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name == name)
            .or_else(|| {
                self.fields
                    .iter()
                    .position(|f| f.name.eq_ignore_ascii_case(name))
            })
    }

    /// Looks a field up by exact name, falling back to a case-insensitive match.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|idx| &self.fields[idx].value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.position(name).map(|idx| &mut self.fields[idx].value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Replaces an existing field in place or appends a new one.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.value = value,
            None => self.fields.push(Field { name, value }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.position(name).map(|idx| self.fields.remove(idx).value)
    }

    /// Renames a field, keeping its position. A different field already
    /// using the target name is dropped. Returns false if `from` was absent.
    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> bool {
        let Some(mut idx) = self.position(from) else {
            return false;
        };
        let to = to.into();
        if let Some(other) = self.fields.iter().position(|f| f.name == to) {
            if other != idx {
                self.fields.remove(other);
                if other < idx {
                    idx -= 1;
                }
            }
        }
        self.fields[idx].name = to;
        true
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &Value) -> bool,
    {
        self.fields.retain(|f| keep(&f.name, &f.value));
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|f| (f.name.as_str(), &f.value))
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.value.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.set(name, value);
        }
        record
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::iter::Map<std::vec::IntoIter<Field>, fn(Field) -> (String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        let split: fn(Field) -> (String, Value) = |f| (f.name, f.value);
        self.fields.into_iter().map(split)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for field in &self.fields {
            map.serialize_entry(&field.name, &field.value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        Ok(map
            .into_iter()
            .map(|(name, json)| (name, Value::from_json(json)))
            .collect())
    }
}

/// Builds a [`Record`] from `name => value` pairs.
#[macro_export]
macro_rules! record {
    () => { $crate::records::record::Record::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut record = $crate::records::record::Record::new();
        $( record.set($name, $value); )+
        record
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_prefers_exact_name() {
        let row = record! { "ID" => 1, "id" => 2 };
        assert_eq!(row.get("id"), Some(&Value::Int(2)));
        assert_eq!(row.get("Id"), Some(&Value::Int(1)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn set_replaces_in_place() {
        let mut row = record! { "a" => 1, "b" => 2 };
        row.set("a", 10);
        assert_eq!(row.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(row.get("a"), Some(&Value::Int(10)));
    }

    #[test]
    fn rename_keeps_position() {
        let mut row = record! { "a" => 1, "b" => 2, "c" => 3 };
        assert!(row.rename("b", "beta"));
        assert_eq!(row.names().collect::<Vec<_>>(), vec!["a", "beta", "c"]);
        assert!(!row.rename("zzz", "y"));
    }

    #[test]
    fn rename_onto_existing_name_replaces_it() {
        let mut row = record! { "a" => 1, "b" => 2 };
        assert!(row.rename("a", "b"));
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("b"), Some(&Value::Int(1)));
    }

    #[test]
    fn serializes_as_ordered_object() {
        let row = record! { "z" => 1, "a" => "x" };
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"z":1,"a":"x"}"#);

        let back: Record = serde_json::from_str(r#"{"z":1,"a":"x"}"#).unwrap();
        assert_eq!(back, row);
    }
}
