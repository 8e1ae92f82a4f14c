use crate::records::record::Record;
use serde::{Deserialize, Serialize};

/// An ordered group of records moved through the pipeline together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    pub rows: Vec<Record>,
}

impl Batch {
    pub fn new(rows: Vec<Record>) -> Self {
        Batch { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&Record> {
        self.rows.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }
}

impl From<Vec<Record>> for Batch {
    fn from(rows: Vec<Record>) -> Self {
        Batch::new(rows)
    }
}

impl FromIterator<Record> for Batch {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Batch::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Batch {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
