//! Compute over in-memory, frame and external backends.

mod test_data_gen;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use chunkwise::engine::DatumStream;
use chunkwise::expr::{DatePart, ExprKind, MapFn};
use chunkwise::{
    compute, compute_with, lit, sequence, symbol, Backend, Bindings, ChunkIterable, DataType, Datum,
    Error, Expr, Output, RowBatch, Scalar, TableSource,
};
use test_data_gen::*;

#[test]
fn memory_and_frame_backends_agree() {
    let t = accounts();
    let e = t.column("amount").unwrap().mul(2).unwrap();
    let from_memory = compute(&e, accounts_rows()).unwrap().into_vec().unwrap();
    let from_frame = compute(&e, accounts_frame()).unwrap().into_vec().unwrap();
    assert_eq!(from_memory, ints(&[200, 400, -600, 800, 400]));
    assert_eq!(from_frame, from_memory);
}

#[test]
fn map_matches_arithmetic() {
    let t = accounts();
    let id = t.column("id").unwrap();
    let inc = MapFn::infallible("inc", |v: &Scalar| match v.as_i64() {
        Some(x) => Scalar::I64(x + 1),
        None => Scalar::Null,
    });
    let mapped = id.map(inc, DataType::Int64).unwrap();
    let added = id.add(1).unwrap();

    let a = compute(&mapped, accounts_rows()).unwrap().into_vec().unwrap();
    let b = compute(&added, accounts_rows()).unwrap().into_vec().unwrap();
    assert_eq!(a, ints(&[2, 3, 4, 5, 6]));
    assert_eq!(a, b);
}

#[test]
fn projection_keeps_requested_order() {
    let t = accounts();
    let e = t.project(&["amount", "id"]).unwrap();
    let rows = compute(&e, accounts_rows()).unwrap().into_vec().unwrap();
    assert_eq!(rows[2], Datum::Row(vec![Scalar::I64(-300), Scalar::I64(3)]));
    assert_eq!(rows.len(), 5);
}

#[test]
fn scalar_arithmetic_over_reductions() {
    let t = accounts();
    let amount = t.column("amount").unwrap();
    let avg = amount.sum().unwrap().div(&amount.count().unwrap()).unwrap();
    assert!(avg.shape().is_scalar());
    let out = compute(&avg, accounts_rows()).unwrap().into_scalar().unwrap();
    assert_eq!(out, Scalar::F64(120.0));

    let centered = amount.sub(&amount.mean().unwrap()).unwrap();
    let rows = compute(&centered, accounts_rows()).unwrap().into_vec().unwrap();
    assert_eq!(rows[0], Datum::Scalar(Scalar::F64(-20.0)));
}

#[test]
fn date_parts_of_datetimes() {
    let when = sequence("when", DataType::DateTime);
    let stamp = NaiveDate::from_ymd_opt(2014, 10, 1)
        .and_then(|d| d.and_hms_opt(1, 1, 1))
        .unwrap();
    let data = vec![Datum::Scalar(Scalar::DateTime(stamp))];

    let day = when.date_part(DatePart::Day).unwrap();
    assert_eq!(
        compute(&day, data.clone()).unwrap().into_vec().unwrap(),
        ints(&[1])
    );

    let date = when.date_part(DatePart::Date).unwrap();
    assert_eq!(
        compute(&date, data).unwrap().into_vec().unwrap(),
        vec![Datum::Scalar(Scalar::Date(
            NaiveDate::from_ymd_opt(2014, 10, 1).unwrap()
        ))]
    );
}

#[test]
fn empty_reductions() {
    let s = sequence("s", DataType::Int64);
    let empty = Vec::<Datum>::new;
    let run = |e: Expr| compute(&e, empty()).and_then(Output::into_scalar);
    assert_eq!(run(s.count().unwrap()).unwrap(), Scalar::I64(0));
    assert_eq!(run(s.sum().unwrap()).unwrap(), Scalar::I64(0));
    assert!(matches!(run(s.max().unwrap()), Err(Error::EmptyReduction(_))));
    assert!(matches!(run(s.mean().unwrap()), Err(Error::EmptyReduction(_))));
}

#[test]
fn nulls_propagate_and_are_never_selected() {
    let s = sequence("s", DataType::Int64);
    let data = vec![
        Datum::Scalar(Scalar::I64(1)),
        Datum::Scalar(Scalar::Null),
        Datum::Scalar(Scalar::I64(3)),
    ];
    let plus = compute(&s.add(1).unwrap(), data.clone()).unwrap().into_vec().unwrap();
    assert_eq!(plus[1], Datum::Scalar(Scalar::Null));

    let kept = s.filter(&s.gt(0).unwrap()).unwrap();
    assert_eq!(compute(&kept, data.clone()).unwrap().into_vec().unwrap(), ints(&[1, 3]));
    assert_eq!(
        compute(&s.sum().unwrap(), data).unwrap().into_scalar().unwrap(),
        Scalar::I64(4)
    );
}

#[test]
fn unbound_symbols_are_reported() {
    let t = accounts();
    let err = compute_with(&t.count().unwrap(), &Bindings::new()).unwrap_err();
    assert!(matches!(err, Error::UnboundSymbol(ref name) if name == "t"));
}

#[test]
fn schema_errors_surface_at_construction() {
    let t = accounts();
    assert!(matches!(t.column("missing"), Err(Error::SchemaMismatch(_))));
    let name = t.column("name").unwrap();
    assert!(matches!(name.sub(&t.column("id").unwrap()), Err(Error::SchemaMismatch(_))));
    assert!(matches!(name.sum(), Err(Error::SchemaMismatch(_))));

    let other = symbol("u", accounts_schema());
    let mixed = t.column("id").unwrap().add(&other.column("id").unwrap());
    assert!(matches!(mixed, Err(Error::SchemaMismatch(_))));
    assert!(matches!(lit(1).distinct(), Err(Error::SchemaMismatch(_))));
}

/// Answers reductions natively and leaves everything else to the engine.
struct SqlTable {
    pushed: Arc<AtomicUsize>,
    scans: Arc<AtomicUsize>,
}

impl TableSource for SqlTable {
    fn name(&self) -> &str {
        "sql"
    }

    fn scan(&self) -> chunkwise::Result<DatumStream> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(accounts_rows().into_iter().map(Ok)))
    }

    fn compute(&self, expr: &Expr) -> Option<chunkwise::Result<Output>> {
        match expr.kind() {
            ExprKind::Reduction { .. } => {
                self.pushed.fetch_add(1, Ordering::SeqCst);
                Some(Ok(Output::Scalar(Scalar::I64(99))))
            }
            _ => None,
        }
    }
}

#[test]
fn table_sources_take_pushdown_or_fall_back_to_scan() {
    let pushed = Arc::new(AtomicUsize::new(0));
    let scans = Arc::new(AtomicUsize::new(0));
    let backend = Backend::source(SqlTable {
        pushed: Arc::clone(&pushed),
        scans: Arc::clone(&scans),
    });
    let t = accounts();

    let total = t.column("amount").unwrap().sum().unwrap();
    let out = compute(&total, backend.clone()).unwrap().into_scalar().unwrap();
    assert_eq!(out, Scalar::I64(99));
    assert_eq!(pushed.load(Ordering::SeqCst), 1);
    assert_eq!(scans.load(Ordering::SeqCst), 0);

    let ids = t.column("id").unwrap().add(1).unwrap();
    let rows = compute(&ids, backend).unwrap().into_vec().unwrap();
    assert_eq!(rows, ints(&[2, 3, 4, 5, 6]));
    assert_eq!(scans.load(Ordering::SeqCst), 1);
}

fn one_column_frame(values: &[i64]) -> RowBatch {
    let rows = values.iter().map(|v| Datum::Row(vec![Scalar::I64(*v)]));
    RowBatch::from_rows(&["s".to_string()], rows).unwrap()
}

#[test]
fn columns_read_from_one_column_frames_behave_like_memory() {
    let s = sequence("s", DataType::Int64);
    let values = [3, 1, 3, 2];
    let memory = ints(&values);
    let backends: [Backend; 3] = [
        memory.clone().into(),
        one_column_frame(&values).into(),
        ChunkIterable::from_frame(one_column_frame(&values), 3).unwrap().into(),
    ];

    for backend in backends {
        let kind = backend.kind_name();
        let total = compute(&s.sum().unwrap(), backend.clone()).unwrap().into_scalar().unwrap();
        assert_eq!(total, Scalar::I64(9), "{kind}");

        let unique = compute(&s.distinct().unwrap(), backend.clone()).unwrap().into_vec().unwrap();
        assert_eq!(unique, ints(&[3, 1, 2]), "{kind}");

        let first = compute(&s.head(2).unwrap(), backend).unwrap().into_vec().unwrap();
        assert_eq!(first, memory[..2].to_vec(), "{kind}");
    }
}
