use super::{ArtifactKind, SpectralAxis};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GridOrdering {
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordShapeError {
    #[error("grid has no points")]
    EmptyGrid,
    #[error("grid is not strictly monotonic at point {index} ({previous} then {current})")]
    NonMonotonic {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("grid value at point {index} is not finite")]
    NonFinite { index: usize },
    #[error("column '{name}' has {actual} values, expected {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("column '{name}' appears more than once")]
    DuplicateColumn { name: String },
}

/// Strictly monotonic spectral coordinates shared by the columns of one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    axis: SpectralAxis,
    ordering: GridOrdering,
    values: Vec<f64>,
}

impl Grid {
    pub fn new(axis: SpectralAxis, values: Vec<f64>) -> Result<Self, RecordShapeError> {
        if values.is_empty() {
            return Err(RecordShapeError::EmptyGrid);
        }
        if let Some(index) = values.iter().position(|value| !value.is_finite()) {
            return Err(RecordShapeError::NonFinite { index });
        }

        let ordering = match values.as_slice() {
            [first, second, ..] if second < first => GridOrdering::Decreasing,
            _ => GridOrdering::Increasing,
        };
        for (index, pair) in values.windows(2).enumerate() {
            let ordered = match ordering {
                GridOrdering::Increasing => pair[1] > pair[0],
                GridOrdering::Decreasing => pair[1] < pair[0],
            };
            if !ordered {
                return Err(RecordShapeError::NonMonotonic {
                    index: index + 1,
                    previous: pair[0],
                    current: pair[1],
                });
            }
        }

        Ok(Self {
            axis,
            ordering,
            values,
        })
    }

    pub fn axis(&self) -> SpectralAxis {
        self.axis
    }

    pub fn ordering(&self) -> GridOrdering {
        self.ordering
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Grid values in cm-1, sorted ascending.
    pub fn ascending_wavenumbers(&self) -> Vec<f64> {
        let mut converted = self
            .values
            .iter()
            .map(|value| self.axis.to_wavenumber(*value))
            .collect::<Vec<_>>();
        converted.sort_by(f64::total_cmp);
        converted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Text(String),
    Number(f64),
    Integer(i64),
    Flag(bool),
    Lines(Vec<String>),
}

impl MetaValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            _ => None,
        }
    }
}

/// One decoded artifact. Every column has exactly one value per grid point,
/// or per row when the artifact carries no monotonic grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedRecord {
    kind: ArtifactKind,
    grid: Option<Grid>,
    columns: Vec<(String, Vec<f64>)>,
    metadata: BTreeMap<String, MetaValue>,
}

impl ParsedRecord {
    pub fn new(
        kind: ArtifactKind,
        grid: Option<Grid>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, RecordShapeError> {
        let expected = match (&grid, columns.first()) {
            (Some(grid), _) => Some(grid.len()),
            (None, Some((_, values))) => Some(values.len()),
            (None, None) => None,
        };

        for (index, (name, values)) in columns.iter().enumerate() {
            if columns[..index].iter().any(|(seen, _)| seen == name) {
                return Err(RecordShapeError::DuplicateColumn { name: name.clone() });
            }
            if let Some(expected) = expected
                && values.len() != expected
            {
                return Err(RecordShapeError::LengthMismatch {
                    name: name.clone(),
                    expected,
                    actual: values.len(),
                });
            }
        }

        Ok(Self {
            kind,
            grid,
            columns,
            metadata: BTreeMap::new(),
        })
    }

    /// A record made only of scalar metadata, such as a log summary.
    pub fn metadata_only(kind: ArtifactKind) -> Self {
        Self {
            kind,
            grid: None,
            columns: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: MetaValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn insert_meta(&mut self, key: impl Into<String>, value: MetaValue) {
        self.metadata.insert(key.into(), value);
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, values)| values.as_slice())
    }

    pub fn columns(&self) -> &[(String, Vec<f64>)] {
        &self.columns
    }

    pub fn metadata(&self) -> &BTreeMap<String, MetaValue> {
        &self.metadata
    }

    pub fn meta(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    pub fn row_count(&self) -> usize {
        match (&self.grid, self.columns.first()) {
            (Some(grid), _) => grid.len(),
            (None, Some((_, values))) => values.len(),
            (None, None) => 0,
        }
    }
}
