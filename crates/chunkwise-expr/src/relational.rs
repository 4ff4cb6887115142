//! Join and split-apply-combine constructors.

use std::collections::HashSet;

use chunkwise_core::error::Result;
use chunkwise_core::schema::{Field, Schema};

use crate::expr::{mismatch, Expr, ExprKind};
use crate::shape::Shape;

/// Resolved field positions of an inner equi-join.
///
/// Output records are laid out as key fields, then the left side's other
/// fields, then the right side's other fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinLayout {
    pub left_on: Vec<String>,
    pub right_on: Vec<String>,
    pub left_keys: Vec<usize>,
    pub right_keys: Vec<usize>,
    pub left_rest: Vec<usize>,
    pub right_rest: Vec<usize>,
}

/// Inner join on fields that share a name on both sides.
pub fn join(left: &Expr, right: &Expr, on: &[&str]) -> Result<Expr> {
    join_on(left, right, on, on)
}

/// Inner join matching `left_on[i]` against `right_on[i]`.
pub fn join_on(left: &Expr, right: &Expr, left_on: &[&str], right_on: &[&str]) -> Result<Expr> {
    let (Shape::Table(ls), Shape::Table(rs)) = (left.shape(), right.shape()) else {
        return Err(mismatch(format!(
            "join needs two tables, got {} and {}",
            left.shape(),
            right.shape()
        )));
    };
    if left_on.is_empty() || left_on.len() != right_on.len() {
        return Err(mismatch(format!(
            "join keys must be non-empty and pair up: {left_on:?} vs {right_on:?}"
        )));
    }

    let mut left_keys = Vec::with_capacity(left_on.len());
    let mut right_keys = Vec::with_capacity(right_on.len());
    for (l, r) in left_on.iter().zip(right_on) {
        let li = ls
            .index_of(l)
            .ok_or_else(|| mismatch(format!("no join key '{l}' in {ls}")))?;
        let ri = rs
            .index_of(r)
            .ok_or_else(|| mismatch(format!("no join key '{r}' in {rs}")))?;
        let (lt, rt) = (ls.fields[li].data_type, rs.fields[ri].data_type);
        if !lt.is_comparable_with(rt) {
            return Err(mismatch(format!(
                "join key '{l}' ({lt}) cannot match '{r}' ({rt})"
            )));
        }
        left_keys.push(li);
        right_keys.push(ri);
    }

    let left_rest: Vec<usize> = (0..ls.len()).filter(|i| !left_keys.contains(i)).collect();
    let right_rest: Vec<usize> = (0..rs.len()).filter(|i| !right_keys.contains(i)).collect();

    let mut fields: Vec<Field> = left_keys.iter().map(|&i| ls.fields[i].clone()).collect();
    fields.extend(left_rest.iter().map(|&i| ls.fields[i].clone()));
    for &i in &right_rest {
        let f = &rs.fields[i];
        if fields.iter().any(|existing| existing.name == f.name) {
            fields.push(f.renamed(format!("{}_right", f.name)));
        } else {
            fields.push(f.clone());
        }
    }

    let layout = JoinLayout {
        left_on: left_on.iter().map(|s| s.to_string()).collect(),
        right_on: right_on.iter().map(|s| s.to_string()).collect(),
        left_keys,
        right_keys,
        left_rest,
        right_rest,
    };
    Ok(Expr::from_parts(
        ExprKind::Join {
            left: Box::new(left.clone()),
            right: Box::new(right.clone()),
            layout,
        },
        Shape::Table(Schema::new(fields)),
    ))
}

/// Group the records of `grouper`'s base by its value and reduce each group.
///
/// `grouper` is a column or projection of some sequence; every entry of
/// `apply` must be a reduction over that same sequence. Output records are
/// the key fields followed by one field per `apply` entry, in order.
pub fn by<I, S>(grouper: &Expr, apply: I) -> Result<Expr>
where
    I: IntoIterator<Item = (S, Expr)>,
    S: Into<String>,
{
    let base = grouper
        .operand_base()
        .ok_or_else(|| mismatch(format!("cannot group by the single value {grouper}")))?;

    let mut fields = grouper.shape().fields();
    let mut seen: HashSet<String> = fields.iter().map(|f| f.name.clone()).collect();
    let mut entries: Vec<(String, Expr)> = Vec::new();

    for (name, e) in apply {
        let name = name.into();
        let ExprKind::Reduction { child, .. } = e.kind() else {
            return Err(mismatch(format!(
                "by() applies reductions, but '{name}' is {e}"
            )));
        };
        match child.operand_base() {
            Some(b) if b.same_as(base) => {}
            _ => {
                return Err(mismatch(format!(
                    "'{name}' reduces {child}, which does not read from {base}"
                )))
            }
        }
        if !seen.insert(name.clone()) {
            return Err(mismatch(format!("duplicate output field '{name}' in by()")));
        }
        if let Some(field) = e.shape().field() {
            fields.push(field.renamed(name.clone()));
        }
        entries.push((name, e));
    }
    if entries.is_empty() {
        return Err(mismatch("by() needs at least one reduction"));
    }

    Ok(Expr::from_parts(
        ExprKind::By {
            grouper: Box::new(grouper.clone()),
            apply: entries,
        },
        Shape::Table(Schema::new(fields)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::symbol;
    use crate::ops::ReductionKind;
    use chunkwise_core::error::Error;
    use chunkwise_core::schema::DataType;

    fn accounts() -> Expr {
        symbol(
            "t",
            Schema::new(vec![
                Field::new("id", DataType::Int64, false),
                Field::new("name", DataType::Utf8, false),
                Field::new("amount", DataType::Int64, false),
            ]),
        )
    }

    fn cities() -> Expr {
        symbol(
            "c",
            Schema::new(vec![
                Field::new("id", DataType::Int64, false),
                Field::new("name", DataType::Utf8, false),
                Field::new("city", DataType::Utf8, false),
            ]),
        )
    }

    #[test]
    fn join_layout_puts_keys_first_and_suffixes_clashes() {
        let j = join(&accounts(), &cities(), &["id"]).unwrap();
        assert_eq!(
            j.shape().names(),
            vec!["id", "name", "amount", "name_right", "city"]
        );
        let ExprKind::Join { layout, .. } = j.kind() else {
            panic!("not a join");
        };
        assert_eq!(layout.left_keys, vec![0]);
        assert_eq!(layout.left_rest, vec![1, 2]);
        assert_eq!(layout.right_rest, vec![1, 2]);
        assert_eq!(j.to_string(), "join(t, c, ['id'], ['id'])");
    }

    #[test]
    fn join_rejects_bad_keys() {
        assert!(matches!(
            join(&accounts(), &cities(), &["missing"]),
            Err(Error::SchemaMismatch(_))
        ));
        assert!(matches!(
            join_on(&accounts(), &cities(), &["id"], &["city"]),
            Err(Error::SchemaMismatch(_))
        ));
        let amount = accounts().column("amount").unwrap();
        assert!(matches!(
            join(&amount, &cities(), &["id"]),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn by_builds_key_then_aggregate_fields() {
        let t = accounts();
        let g = by(
            &t.column("name").unwrap(),
            [
                ("total", t.column("amount").unwrap().sum().unwrap()),
                ("n", t.count().unwrap()),
            ],
        )
        .unwrap();
        assert_eq!(g.shape().names(), vec!["name", "total", "n"]);
        let ExprKind::By { apply, .. } = g.kind() else {
            panic!("expected a by node, got {g}");
        };
        assert!(matches!(
            apply[1].1.kind(),
            ExprKind::Reduction { kind: ReductionKind::Count, .. }
        ));
        assert_eq!(
            g.to_string(),
            "by(t.name, total=t.amount.sum(), n=t.count())"
        );
    }

    #[test]
    fn by_rejects_foreign_or_non_reduction_apply() {
        let t = accounts();
        let c = cities();
        let key = t.column("name").unwrap();
        assert!(matches!(
            by(&key, [("x", c.column("id").unwrap().sum().unwrap())]),
            Err(Error::SchemaMismatch(_))
        ));
        assert!(matches!(
            by(&key, [("x", t.column("amount").unwrap())]),
            Err(Error::SchemaMismatch(_))
        ));
        assert!(matches!(
            by(&key, [("name", t.count().unwrap())]),
            Err(Error::SchemaMismatch(_))
        ));
    }
}
