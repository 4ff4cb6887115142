//! Two-phase split-apply-combine.
//!
//! Phase one turns each chunk into a `GroupTable` of per-key accumulators;
//! phase two merges the tables by key and finishes every accumulator. Keys
//! keep the order in which they first appear in the data.

use std::collections::HashMap;

use chunkwise_chunks::Chunk;
use chunkwise_core::error::{Error, Result};
use chunkwise_core::schema::DataType;
use chunkwise_core::types::{Datum, Scalar};
use chunkwise_expr::ReductionKind;

use crate::reduce::Accumulator;
use crate::row::Projector;
use crate::stream::ChunkStream;

/// One aggregated output column.
#[derive(Debug)]
pub(crate) struct GroupValue {
    pub(crate) name: String,
    pub(crate) input: Projector,
    pub(crate) kind: ReductionKind,
    pub(crate) output: Option<DataType>,
}

#[derive(Debug)]
pub(crate) struct GroupSpec {
    pub(crate) key: Projector,
    pub(crate) values: Vec<GroupValue>,
}

impl GroupSpec {
    fn fresh(&self) -> Vec<Accumulator> {
        self.values
            .iter()
            .map(|v| Accumulator::new(v.kind, v.output))
            .collect()
    }
}

#[derive(Debug, Default)]
pub(crate) struct GroupTable {
    index: HashMap<Datum, usize>,
    keys: Vec<Datum>,
    accs: Vec<Vec<Accumulator>>,
}

impl GroupTable {
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    fn slot(&mut self, key: Datum, spec: &GroupSpec) -> &mut Vec<Accumulator> {
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.keys.len();
                self.index.insert(key.clone(), idx);
                self.keys.push(key);
                self.accs.push(spec.fresh());
                idx
            }
        };
        &mut self.accs[idx]
    }

    /// Phase one: fold one chunk.
    pub(crate) fn absorb(&mut self, chunk: Chunk, spec: &GroupSpec) -> Result<()> {
        for record in chunk {
            let key = spec.key.apply(record.clone())?;
            let inputs = spec
                .values
                .iter()
                .map(|v| v.input.apply(record.clone()))
                .collect::<Result<Vec<_>>>()?;
            let slot = self.slot(key, spec);
            for (acc, value) in slot.iter_mut().zip(inputs) {
                acc.update(value)?;
            }
        }
        Ok(())
    }

    /// Phase two: fold a later table into this one.
    pub(crate) fn merge(&mut self, other: GroupTable) -> Result<()> {
        for (key, accs) in other.keys.into_iter().zip(other.accs) {
            match self.index.get(&key) {
                Some(&idx) => {
                    for (mine, theirs) in self.accs[idx].iter_mut().zip(accs) {
                        mine.merge(theirs)?;
                    }
                }
                None => {
                    self.index.insert(key.clone(), self.keys.len());
                    self.keys.push(key);
                    self.accs.push(accs);
                }
            }
        }
        Ok(())
    }

    /// Output records: key fields then one value per aggregate. A group
    /// whose values were all null yields null for min, max and mean.
    pub(crate) fn finish(self, spec: &GroupSpec) -> Result<Vec<Datum>> {
        let mut rows = Vec::with_capacity(self.keys.len());
        for (key, accs) in self.keys.into_iter().zip(self.accs) {
            let mut row = key.into_scalars();
            for (acc, value) in accs.into_iter().zip(&spec.values) {
                match acc.finish(&value.name) {
                    Ok(v) => row.push(v),
                    Err(Error::EmptyReduction(_)) => row.push(Scalar::Null),
                    Err(e) => return Err(e),
                }
            }
            rows.push(Datum::Row(row));
        }
        Ok(rows)
    }
}

/// Group every record of `stream` and reduce each group.
pub(crate) fn group(stream: ChunkStream, spec: &GroupSpec) -> Result<Vec<Datum>> {
    let mut total = GroupTable::default();
    stream.fold_partials(
        |chunk: Chunk| {
            let mut table = GroupTable::default();
            table.absorb(chunk, spec)?;
            Ok(table)
        },
        |partial| total.merge(partial),
    )?;

    #[cfg(feature = "tracing")]
    tracing::debug!(groups = total.len(), aggregates = spec.values.len(), "group-by merged");

    total.finish(spec)
}
