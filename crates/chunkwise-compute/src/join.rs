//! Inner equi-join by hashing one side and probing with the other.

use std::collections::HashMap;
use std::sync::Arc;

use chunkwise_chunks::Chunk;
use chunkwise_core::error::{Error, Result};
use chunkwise_core::types::{Datum, Row, Scalar};
use chunkwise_expr::JoinLayout;

use crate::output::Output;
use crate::stream::{DatumStream, Stage};

/// Build-side records by normalized key, in arrival order.
#[derive(Debug, Default)]
struct JoinIndex {
    rows: HashMap<Vec<Scalar>, Vec<Row>>,
    len: usize,
}

/// The normalized key of `record`, or `None` when any key field is null.
fn key_of(record: &Datum, keys: &[usize]) -> Result<Option<Vec<Scalar>>> {
    let mut key = Vec::with_capacity(keys.len());
    for &i in keys {
        let v = record
            .field(i)
            .ok_or_else(|| Error::Type(format!("join record {record} has no field {i}")))?;
        if v.is_null() {
            return Ok(None);
        }
        key.push(v.normalized());
    }
    Ok(Some(key))
}

fn build_index(records: DatumStream, keys: &[usize]) -> Result<JoinIndex> {
    let mut index = JoinIndex::default();
    for record in records {
        let record = record?;
        if let Some(key) = key_of(&record, keys)? {
            index.rows.entry(key).or_default().push(record.into_scalars());
            index.len += 1;
        }
    }
    Ok(index)
}

/// Key fields (taken from the left record), left rest, right rest.
fn joined(left: &[Scalar], right: &[Scalar], layout: &JoinLayout) -> Datum {
    let mut out = Vec::with_capacity(left.len() + layout.right_rest.len());
    let pick = |row: &[Scalar], i: usize| row.get(i).cloned().unwrap_or(Scalar::Null);
    out.extend(layout.left_keys.iter().map(|&i| pick(left, i)));
    out.extend(layout.left_rest.iter().map(|&i| pick(left, i)));
    out.extend(layout.right_rest.iter().map(|&i| pick(right, i)));
    Datum::Row(out)
}

#[derive(Debug)]
struct Probe {
    index: JoinIndex,
    layout: JoinLayout,
    build_left: bool,
}

impl Probe {
    fn probe_keys(&self) -> &[usize] {
        if self.build_left {
            &self.layout.right_keys
        } else {
            &self.layout.left_keys
        }
    }

    fn chunk(&self, chunk: Chunk) -> Result<Chunk> {
        let mut out = Vec::new();
        for record in chunk {
            let Some(key) = key_of(&record, self.probe_keys())? else {
                continue;
            };
            let Some(matches) = self.index.rows.get(&key) else {
                continue;
            };
            let probe = record.into_scalars();
            for built in matches {
                out.push(if self.build_left {
                    joined(built, &probe, &self.layout)
                } else {
                    joined(&probe, built, &self.layout)
                });
            }
        }
        Ok(out)
    }
}

/// Materialize the build side and return the probe side together with the
/// stage that joins each of its chunks.
///
/// The right side is built unless the left is a plain stream and the right
/// is chunked; then the left is built so the chunked side keeps streaming.
pub(crate) fn hash_join(left: Output, right: Output, layout: &JoinLayout) -> Result<(Output, Stage)> {
    let build_left = matches!((&left, &right), (Output::Stream(_), Output::Chunks(_)));
    let (build, probe, keys) = if build_left {
        (left, right, &layout.left_keys)
    } else {
        (right, left, &layout.right_keys)
    };

    let index = build_index(build.into_records()?, keys)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        build_side = if build_left { "left" } else { "right" },
        keys = index.rows.len(),
        rows = index.len,
        "join index built"
    );

    let probe_state = Arc::new(Probe {
        index,
        layout: layout.clone(),
        build_left,
    });
    let stage: Stage = Arc::new(move |chunk: Chunk| probe_state.chunk(chunk));
    Ok((probe, stage))
}
