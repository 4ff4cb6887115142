//! Compute over chunked backends.

mod test_data_gen;

use chunkwise::expr::MapFn;
use chunkwise::{
    by, compute, compute_with, get_chunk, join, Bindings, ChunkIterable, DataType, Datum, Error,
    Scalar,
};
use test_data_gen::*;

fn scalar_of(e: &chunkwise::Expr, chunksize: usize) -> Scalar {
    compute(e, accounts_chunked(chunksize))
        .expect("compute")
        .into_scalar()
        .expect("scalar result")
}

#[test]
fn reductions_match_for_every_chunksize() {
    let t = accounts();
    let id = t.column("id").unwrap();
    for chunksize in [1, 2, 3, 5, 10] {
        assert_eq!(scalar_of(&id.min().unwrap(), chunksize), Scalar::I64(1));
        assert_eq!(scalar_of(&id.max().unwrap(), chunksize), Scalar::I64(5));
        assert_eq!(scalar_of(&id.sum().unwrap(), chunksize), Scalar::I64(15));
        assert_eq!(scalar_of(&id.mean().unwrap(), chunksize), Scalar::F64(3.0));
        assert_eq!(scalar_of(&t.count().unwrap(), chunksize), Scalar::I64(5));
    }
}

#[test]
fn nunique_of_columns_and_tables() {
    let t = accounts();
    let name = t.column("name").unwrap();
    assert_eq!(scalar_of(&name.nunique().unwrap(), 2), Scalar::I64(4));
    assert_eq!(scalar_of(&t.nunique().unwrap(), 2), Scalar::I64(5));
}

#[test]
fn distinct_names_across_chunks() {
    let t = accounts();
    let e = t.column("name").unwrap().distinct().unwrap();
    for chunksize in [1, 2, 4] {
        let out = compute(&e, accounts_chunked(chunksize))
            .unwrap()
            .into_vec()
            .unwrap();
        assert_eq!(out, strs(&["Alice", "Bob", "Charlie", "Edith"]));
    }
}

#[test]
fn elementwise_arithmetic_keeps_chunks() {
    let t = accounts();
    let e = t.column("id").unwrap().add(1).unwrap();
    let out = compute(&e, accounts_chunked(2)).unwrap();
    assert!(out.is_chunked());
    let chunks = out.into_chunks().unwrap();
    assert_eq!(chunks, vec![ints(&[2, 3]), ints(&[4, 5]), ints(&[6])]);
}

#[test]
fn selection_and_selected_sum() {
    let t = accounts();
    let is_alice = t.column("name").unwrap().eq("Alice").unwrap();
    let alice = t.filter(&is_alice).unwrap();

    let rows = compute(&alice, accounts_chunked(2)).unwrap().into_vec().unwrap();
    assert_eq!(rows, vec![account(1, "Alice", 100), account(3, "Alice", -300)]);

    let total = alice.column("amount").unwrap().sum().unwrap();
    assert_eq!(scalar_of(&total, 2), Scalar::I64(-200));
}

#[test]
fn head_stops_pulling_chunks() {
    let t = accounts();
    for (n, expected_reads) in [(2, 1), (3, 2)] {
        let source = CountingSource::new(accounts_rows());
        let it = ChunkIterable::new(source.clone(), 2).unwrap();
        let out = compute(&t.head(n).unwrap(), it).unwrap().into_vec().unwrap();
        assert_eq!(out, accounts_rows()[..n].to_vec());
        assert_eq!(source.reads(), expected_reads, "head({n})");
    }
}

#[test]
fn join_with_cities() {
    let t = accounts();
    let c = cities();
    let e = join(&t, &c, &["id"]).unwrap();
    assert_eq!(e.shape().names(), vec!["id", "name", "amount", "name_right"]);

    let bindings = Bindings::new()
        .with("t", accounts_chunked(2))
        .with("c", ChunkIterable::from_vec(cities_rows(), 2).unwrap());
    let rows = compute_with(&e, &bindings).unwrap().into_vec().unwrap();
    assert_eq!(
        rows,
        vec![
            Datum::Row(vec![Scalar::I64(1), "Alice".into(), Scalar::I64(100), "NYC".into()]),
            Datum::Row(vec![Scalar::I64(1), "Alice".into(), Scalar::I64(100), "Chicago".into()]),
            Datum::Row(vec![Scalar::I64(5), "Edith".into(), Scalar::I64(200), "Paris".into()]),
        ]
    );
}

#[test]
fn join_builds_the_left_side_when_only_the_right_is_chunked() {
    let t = accounts();
    let c = cities();
    let e = join(&t, &c, &["id"]).unwrap();
    let bindings = Bindings::new()
        .with("t", accounts_rows())
        .with("c", ChunkIterable::from_vec(cities_rows(), 1).unwrap());
    let out = compute_with(&e, &bindings).unwrap();
    assert!(out.is_chunked());
    let rows = out.into_vec().unwrap();
    // Probe order follows the streamed cities.
    assert_eq!(
        rows,
        vec![
            Datum::Row(vec![Scalar::I64(1), "Alice".into(), Scalar::I64(100), "NYC".into()]),
            Datum::Row(vec![Scalar::I64(1), "Alice".into(), Scalar::I64(100), "Chicago".into()]),
            Datum::Row(vec![Scalar::I64(5), "Edith".into(), Scalar::I64(200), "Paris".into()]),
        ]
    );
}

#[test]
fn group_by_name_for_every_chunksize() {
    let t = accounts();
    let e = by(
        &t.column("name").unwrap(),
        [
            ("total", t.column("amount").unwrap().sum().unwrap()),
            ("n", t.count().unwrap()),
        ],
    )
    .unwrap();
    assert_eq!(e.shape().names(), vec!["name", "total", "n"]);

    let expected = vec![
        Datum::Row(vec!["Alice".into(), Scalar::I64(-200), Scalar::I64(2)]),
        Datum::Row(vec!["Bob".into(), Scalar::I64(200), Scalar::I64(1)]),
        Datum::Row(vec!["Charlie".into(), Scalar::I64(400), Scalar::I64(1)]),
        Datum::Row(vec!["Edith".into(), Scalar::I64(200), Scalar::I64(1)]),
    ];
    for chunksize in [1, 2, 5] {
        let rows = compute(&e, accounts_chunked(chunksize))
            .unwrap()
            .into_vec()
            .unwrap();
        assert_eq!(rows, expected, "chunksize {chunksize}");
    }
}

#[test]
fn materialize_as_vec_and_frame() {
    let t = accounts();
    let e = t.project(&["name", "amount"]).unwrap();
    let frame = compute(&e, accounts_chunked(2))
        .unwrap()
        .into_frame_for(&e)
        .unwrap();
    assert_eq!(frame.names(), vec!["name", "amount"]);
    assert_eq!(frame.num_rows(), 5);
    assert_eq!(
        frame.column("amount").unwrap().values,
        vec![
            Scalar::I64(100),
            Scalar::I64(200),
            Scalar::I64(-300),
            Scalar::I64(400),
            Scalar::I64(200)
        ]
    );

    let all = accounts_chunked(3).into_vec().unwrap();
    assert_eq!(all, accounts_rows());
}

#[test]
fn get_chunk_slices_and_runs_past_the_end() {
    let data = [1, 2, 3, 4, 5];
    assert_eq!(get_chunk(&data, 0, 2), vec![1, 2]);
    assert_eq!(get_chunk(&data, 2, 2), vec![5]);
    assert!(get_chunk(&data, 10, 2).is_empty());
}

#[test]
fn zero_chunksize_is_a_config_error() {
    assert!(matches!(
        ChunkIterable::from_vec(accounts_rows(), 0),
        Err(Error::Config(_))
    ));
}

#[test]
fn single_pass_sources_fail_on_reiteration() {
    let t = accounts();
    let total = t.column("id").unwrap().sum().unwrap();
    let it = ChunkIterable::from_stream(accounts_rows(), 2).unwrap();
    assert!(!it.is_restartable());

    let first = compute(&total, it.clone()).unwrap().into_scalar().unwrap();
    assert_eq!(first, Scalar::I64(15));
    assert!(matches!(
        compute(&total, it),
        Err(Error::SourceExhausted(_))
    ));
}

fn city_rows(rows: Vec<Datum>) -> Vec<(String, String)> {
    rows.into_iter()
        .map(|row| match row {
            Datum::Row(fields) => (fields[0].to_string(), fields[1].to_string()),
            other => panic!("expected a row, got {other}"),
        })
        .collect()
}

#[test]
fn selected_accounts_joined_with_cities() {
    let t = accounts();
    let c = cities();
    let alice = t.filter(&t.column("name").unwrap().eq("Alice").unwrap()).unwrap();
    let e = join(&alice, &c, &["id"])
        .unwrap()
        .project(&["name", "name_right"])
        .unwrap();

    let expected = city_rows(vec![
        Datum::Row(vec!["Alice".into(), "NYC".into()]),
        Datum::Row(vec!["Alice".into(), "Chicago".into()]),
    ]);
    for chunksize in [1, 2, 5] {
        let bindings = Bindings::new()
            .with("t", accounts_chunked(chunksize))
            .with("c", ChunkIterable::from_vec(cities_rows(), chunksize).unwrap());
        let mut got = city_rows(compute_with(&e, &bindings).unwrap().into_vec().unwrap());
        got.sort();
        let mut want = expected.clone();
        want.sort();
        assert_eq!(got, want, "chunksize {chunksize}");
    }
}

#[test]
fn projection_over_join_for_every_chunksize() {
    let t = accounts();
    let c = cities();
    let e = join(&t, &c, &["id"])
        .unwrap()
        .project(&["name", "name_right"])
        .unwrap();
    for chunksize in [1, 2, 3] {
        let bindings = Bindings::new()
            .with("t", accounts_chunked(chunksize))
            .with("c", ChunkIterable::from_vec(cities_rows(), chunksize).unwrap());
        let rows = compute_with(&e, &bindings).unwrap().into_vec().unwrap();
        assert_eq!(
            rows,
            vec![
                Datum::Row(vec!["Alice".into(), "NYC".into()]),
                Datum::Row(vec!["Alice".into(), "Chicago".into()]),
                Datum::Row(vec!["Edith".into(), "Paris".into()]),
            ],
            "chunksize {chunksize}"
        );
    }
}

#[test]
fn row_wise_results_do_not_depend_on_chunksize() {
    let t = accounts();
    let double = MapFn::infallible("double", |v: &Scalar| match v.as_i64() {
        Some(x) => Scalar::I64(x * 2),
        None => Scalar::Null,
    });
    let cases = [
        t.project(&["amount", "name"]).unwrap(),
        t.filter(&t.column("amount").unwrap().gt(150).unwrap()).unwrap(),
        t.column("amount").unwrap().map(double, DataType::Int64).unwrap(),
    ];
    for e in &cases {
        let whole = compute(e, accounts_rows()).unwrap().into_vec().unwrap();
        for chunksize in [1, 2, 3, 5] {
            let chunked = compute(e, accounts_chunked(chunksize))
                .unwrap()
                .into_vec()
                .unwrap();
            assert_eq!(chunked, whole, "{e} with chunksize {chunksize}");
        }
    }
}

#[test]
fn folding_a_single_pass_base_is_rejected_before_reading() {
    let t = accounts();
    let amount = t.column("amount").unwrap();
    let centered = amount.sub(&amount.mean().unwrap()).unwrap();
    let it = ChunkIterable::from_stream(accounts_rows(), 2).unwrap();

    assert!(matches!(
        compute(&centered, it.clone()),
        Err(Error::SourceExhausted(msg)) if msg.contains("single-pass")
    ));
    // Nothing was consumed, so a single-pass expression still runs.
    let total = compute(&amount.sum().unwrap(), it).unwrap().into_scalar().unwrap();
    assert_eq!(total, Scalar::I64(600));
}
