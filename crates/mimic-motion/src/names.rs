//! Name-to-index resolution between two skeleton orderings.

use std::collections::HashMap;

use mimic_core::error::{NameKind, UnknownNameError};

/// Positions of an externally ordered name list inside a name table.
///
/// Built once at startup; `indices()[i]` is where the `i`-th requested name
/// lives in the table. Hot paths only ever read `indices`.
///
/// # Example
///
/// ```
/// use mimic_core::error::NameKind;
/// use mimic_motion::names::NameIndexMap;
///
/// let table = vec!["hip".to_string(), "knee".to_string(), "ankle".to_string()];
/// let map = NameIndexMap::build(&["ankle", "hip"], &table, NameKind::Joint, "motion archive").unwrap();
/// assert_eq!(map.indices(), &[2, 0]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameIndexMap {
    names: Vec<String>,
    indices: Vec<usize>,
}

impl NameIndexMap {
    /// Resolve `requested` against `table`.
    ///
    /// Fails on the first name that is absent; names are never skipped.
    pub fn build<S: AsRef<str>>(
        requested: &[S],
        table: &[String],
        kind: NameKind,
        origin: &'static str,
    ) -> Result<Self, UnknownNameError> {
        let lookup: HashMap<&str, usize> = table
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut names = Vec::with_capacity(requested.len());
        let mut indices = Vec::with_capacity(requested.len());
        for name in requested {
            let name = name.as_ref();
            let Some(&index) = lookup.get(name) else {
                return Err(UnknownNameError {
                    kind,
                    name: name.to_string(),
                    origin,
                });
            };
            names.push(name.to_string());
            indices.push(index);
        }
        Ok(Self { names, indices })
    }

    /// Requested names, in request order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Table positions, in request order.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Append `src[indices[i]]` for every mapped entry, in request order.
    pub fn gather_into<T: Copy>(&self, src: &[T], dst: &mut Vec<T>) {
        dst.extend(self.indices.iter().map(|&i| src[i]));
    }
}
