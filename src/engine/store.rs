use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::matcher::Descriptor;
use crate::engine::record::Record;
use crate::engine::{persistence, vault};
use crate::{Error, Result};

/// Mask written over sanitized fields in find results.
const MASK: &str = "********";

/// Optional post-processing applied to find results.
///
/// Sanitization and encryption touch the result copies only; the source
/// store is never modified by a find.
#[derive(Default, Clone)]
pub struct FindOptions {
    sanitize: Option<Vec<String>>,
    encrypt: Option<Vec<String>>,
    password: Option<String>,
    order_by: Option<String>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the listed fields in every result with `"********"`.
    pub fn sanitize<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sanitize = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Encrypts the listed fields in every result under a key derived from
    /// `password`. Reversible with [`vault::decrypt_field`].
    pub fn encrypt<I, S>(mut self, fields: I, password: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encrypt = Some(fields.into_iter().map(Into::into).collect());
        self.password = Some(password.into());
        self
    }

    /// Stably sorts results ascending by the named field.
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(field.into());
        self
    }

    fn key(&self) -> Result<Option<[u8; vault::KEY_LEN]>> {
        match (&self.encrypt, &self.password) {
            (Some(_), Some(password)) => Ok(Some(vault::derive_key(password))),
            (Some(_), None) => Err(Error::Internal(
                "a password is required to encrypt result fields".to_string(),
            )),
            _ => Ok(None),
        }
    }

    /// Applies sanitization and encryption to a single result copy.
    fn decorate(&self, record: &mut Record, key: Option<&[u8; vault::KEY_LEN]>) -> Result<()> {
        if let Some(fields) = &self.sanitize {
            for field in fields {
                if record.contains_field(field) {
                    record.insert(field.clone(), Value::String(MASK.to_string()));
                }
            }
        }
        if let (Some(fields), Some(key)) = (&self.encrypt, key) {
            for field in fields {
                if let Some(value) = record.get(field).cloned() {
                    record.insert(field.clone(), vault::encrypt_field(&value, key)?);
                }
            }
        }
        Ok(())
    }
}

/// An ordered, mutable collection of [`Record`]s.
///
/// This is the parallel of a table in a traditional database: insertion
/// order is preserved and is the basis for "first match" tie-breaking, and
/// two stores are equal when they hold equal records in the same order.
/// All scans are O(n) over the sequence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Store {
    records: Vec<Record>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from an initial sequence of records. Each record
    /// passes through the same identifier-assignment step as
    /// [`add_record`](Store::add_record); duplicate identifiers among the
    /// supplied records are rejected eagerly.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = Record>,
    {
        let mut store = Store::new();
        let mut seen = HashSet::new();
        for mut record in records {
            let id = record.ensure_id();
            if !seen.insert(id.clone()) {
                return Err(Error::DuplicateId(id));
            }
            store.records.push(record);
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Appends a record, generating an identifier if it lacks one, and
    /// returns the record as stored.
    pub fn add_record(&mut self, mut record: Record) -> Record {
        record.ensure_id();
        self.records.push(record.clone());
        record
    }

    /// Returns all records matching `desc`, in insertion order.
    pub fn find(&self, desc: &Descriptor) -> Result<ResultSet> {
        self.find_with(desc, &FindOptions::default())
    }

    /// As [`find`](Store::find), with sanitization, field encryption and
    /// ordering applied to the result copies.
    pub fn find_with(&self, desc: &Descriptor, opts: &FindOptions) -> Result<ResultSet> {
        let key = opts.key()?;
        let mut matches = Vec::new();
        for record in &self.records {
            if desc.matches(record)? {
                let mut copy = record.clone();
                opts.decorate(&mut copy, key.as_ref())?;
                matches.push(copy);
            }
        }
        if let Some(field) = &opts.order_by {
            matches = sort_records(matches, field)?;
        }
        Ok(ResultSet { records: matches })
    }

    /// Returns the first record matching `desc`, or `None`.
    pub fn find_one(&self, desc: &Descriptor) -> Result<Option<Record>> {
        self.find_one_with(desc, &FindOptions::default())
    }

    pub fn find_one_with(&self, desc: &Descriptor, opts: &FindOptions) -> Result<Option<Record>> {
        let key = opts.key()?;
        for record in &self.records {
            if desc.matches(record)? {
                let mut copy = record.clone();
                opts.decorate(&mut copy, key.as_ref())?;
                return Ok(Some(copy));
            }
        }
        Ok(None)
    }

    /// Removes the single record matching `desc` and returns it.
    ///
    /// Zero matches returns `Ok(None)`; more than one match fails with
    /// [`Error::AmbiguousDelete`] and leaves the store unmodified.
    pub fn del_record(&mut self, desc: &Descriptor) -> Result<Option<Record>> {
        let matches = self.matching_indices(desc)?;
        match matches.as_slice() {
            [] => Ok(None),
            [index] => Ok(Some(self.records.remove(*index))),
            _ => Err(Error::AmbiguousDelete(desc.to_string())),
        }
    }

    /// Removes every record matching `desc` and returns them in their
    /// original order.
    pub fn del_records(&mut self, desc: &Descriptor) -> Result<ResultSet> {
        let matches = self.matching_indices(desc)?;
        let mut removed = Vec::with_capacity(matches.len());
        for index in matches.iter().rev() {
            removed.push(self.records.remove(*index));
        }
        removed.reverse();
        Ok(ResultSet { records: removed })
    }

    /// Returns a new store with copies of all records stably ordered
    /// ascending by `field`.
    pub fn sort(&self, field: &str) -> Result<Store> {
        Ok(Store {
            records: sort_records(self.records.clone(), field)?,
        })
    }

    /// Returns a new store holding every record that does *not* match
    /// `desc`; the source store is unmodified.
    pub fn filter(&self, desc: &Descriptor) -> Result<Store> {
        let mut kept = Vec::new();
        for record in &self.records {
            if !desc.matches(record)? {
                kept.push(record.clone());
            }
        }
        Ok(Store { records: kept })
    }

    /// Groups records by the distinct values of `field`. Every record must
    /// carry the field. Each group preserves source order; the order of the
    /// groups themselves follows first appearance.
    pub fn group_by(&self, field: &str) -> Result<Vec<(Value, Store)>> {
        let mut groups: Vec<(Value, Store)> = Vec::new();
        for record in &self.records {
            let key = record
                .get(field)
                .cloned()
                .ok_or_else(|| Error::MissingField(field.to_string()))?;
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, group)) => group.records.push(record.clone()),
                None => groups.push((
                    key,
                    Store {
                        records: vec![record.clone()],
                    },
                )),
            }
        }
        Ok(groups)
    }

    /// Serializes the store to `path`, optionally encrypting the payload
    /// with a password-derived key. See [`load`](crate::load) for the
    /// inverse.
    pub fn persist<P: AsRef<Path>>(&self, path: P, password: Option<&str>) -> Result<()> {
        persistence::persist(self, path, password)
    }

    fn matching_indices(&self, desc: &Descriptor) -> Result<Vec<usize>> {
        let mut matches = Vec::new();
        for (index, record) in self.records.iter().enumerate() {
            if desc.matches(record)? {
                matches.push(index);
            }
        }
        Ok(matches)
    }
}

impl std::ops::Index<usize> for Store {
    type Output = Record;

    fn index(&self, index: usize) -> &Record {
        &self.records[index]
    }
}

impl<'a> IntoIterator for &'a Store {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl IntoIterator for Store {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl From<ResultSet> for Store {
    fn from(results: ResultSet) -> Self {
        Store {
            records: results.records,
        }
    }
}

/// The ordered output of a find operation.
///
/// Holds copies of the matched records, so mutating a result never mutates
/// the source store. Serializes as a plain JSON array.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: Vec<Record>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Returns a new result set stably sorted ascending by `field`.
    pub fn order_by(&self, field: &str) -> Result<ResultSet> {
        Ok(ResultSet {
            records: sort_records(self.records.clone(), field)?,
        })
    }
}

impl std::ops::Index<usize> for ResultSet {
    type Output = Record;

    fn index(&self, index: usize) -> &Record {
        &self.records[index]
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl From<Vec<Record>> for ResultSet {
    fn from(records: Vec<Record>) -> Self {
        ResultSet { records }
    }
}

/// Stable ascending sort by the value of `field`. Every record must carry
/// the field, and all values must be mutually comparable.
fn sort_records(records: Vec<Record>, field: &str) -> Result<Vec<Record>> {
    let mut keyed = Vec::with_capacity(records.len());
    for record in records {
        let key = record
            .get(field)
            .cloned()
            .ok_or_else(|| Error::MissingField(field.to_string()))?;
        keyed.push((key, record));
    }

    let mut fault = None;
    keyed.sort_by(|a, b| match compare_values(field, &a.0, &b.0) {
        Ok(ordering) => ordering,
        Err(e) => {
            fault.get_or_insert(e);
            Ordering::Equal
        }
    });
    if let Some(e) = fault {
        return Err(e);
    }
    Ok(keyed.into_iter().map(|(_, record)| record).collect())
}

/// Orders two field values of the same JSON type. Cross-type comparisons
/// are a defect of the caller's data and surface as a comparison fault.
fn compare_values(field: &str, a: &Value, b: &Value) -> Result<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Ok(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64(), y.as_f64());
            match (x, y) {
                (Some(x), Some(y)) => x.partial_cmp(&y).ok_or(Error::Incomparable {
                    field: field.to_string(),
                }),
                _ => Err(Error::Incomparable {
                    field: field.to_string(),
                }),
            }
        }
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(Error::Incomparable {
            field: field.to_string(),
        }),
    }
}
