//! Validation and compilation of criteria, orderings and write payloads
//!
//! Compilation resolves field names to column positions, coerces operands to
//! the declared column type and rejects malformed operator/value pairings.
//! The result is what a [`Store`](crate::store::Store) executes: a
//! [`Predicate`], a [`SortSpec`] and a list of [`Assignment`]s.
//!
//! Compiled predicates can also be evaluated directly against a [`Row`] with
//! SQL semantics: a comparison involving NULL is never true, and a row is
//! kept only when its predicate is true.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::criteria::{Condition, Criteria, CriteriaGroup, Operand, Operator, OrderBy, OrderDirection};
use super::error::{RepositoryError, RepositoryOperation};
use crate::schema::{Column, Row, TableSchema};
use crate::store::Assignment;
use crate::value::{Value, ValueType};

/// A validated condition bound to a column position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledCondition {
    column: usize,
    operator: Operator,
    operand: Operand,
}

impl CompiledCondition {
    /// Column position in the row
    pub fn column(&self) -> usize {
        self.column
    }

    /// Comparison operator
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Operand, already coerced to the column type
    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// Whether the condition is true for `row`
    pub fn holds(&self, row: &Row) -> bool {
        let value = row.get(self.column).unwrap_or(&Value::Null);
        match (self.operator, &self.operand) {
            (Operator::IsNull, _) => value.is_null(),
            (Operator::IsNotNull, _) => !value.is_null(),
            (Operator::In, Operand::Set(set)) => set
                .iter()
                .any(|candidate| value.compare(candidate) == Some(Ordering::Equal)),
            (Operator::NotIn, Operand::Set(set)) => set.iter().all(|candidate| {
                value
                    .compare(candidate)
                    .is_some_and(|ord| ord != Ordering::Equal)
            }),
            (Operator::Like, Operand::Single(Value::Text(pattern))) => value
                .as_text()
                .is_some_and(|text| like_matches(text, pattern)),
            (op, Operand::Single(operand)) => {
                value.compare(operand).is_some_and(|ord| match op {
                    Operator::Eq => ord == Ordering::Equal,
                    Operator::Ne => ord != Ordering::Equal,
                    Operator::Gt => ord == Ordering::Greater,
                    Operator::Gte => ord != Ordering::Less,
                    Operator::Lt => ord == Ordering::Less,
                    Operator::Lte => ord != Ordering::Greater,
                    _ => false,
                })
            }
            _ => false,
        }
    }
}

/// Compiled conditions joined by AND
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conjunction {
    conditions: Vec<CompiledCondition>,
}

impl Conjunction {
    /// The conditions in order
    pub fn conditions(&self) -> &[CompiledCondition] {
        &self.conditions
    }

    /// Whether every condition holds
    pub fn holds(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| c.holds(row))
    }
}

/// A compiled WHERE clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Matches every row
    Always,
    /// Matches rows for which any conjunction holds
    AnyOf(Vec<Conjunction>),
}

impl Predicate {
    /// Compile `criteria` against `schema`
    ///
    /// Every condition is validated, including those in groups that end up
    /// irrelevant because another group is empty.
    pub fn compile(schema: &TableSchema, criteria: &Criteria) -> Result<Self, RepositoryError> {
        let conjunctions = criteria
            .groups()
            .iter()
            .map(|group| compile_group(schema, group))
            .collect::<Result<Vec<_>, _>>()?;

        if criteria.is_unfiltered() {
            Ok(Self::Always)
        } else {
            Ok(Self::AnyOf(conjunctions))
        }
    }

    /// `pk = key`
    pub fn primary_key(schema: &TableSchema, key: i64) -> Self {
        Self::AnyOf(vec![Conjunction {
            conditions: vec![CompiledCondition {
                column: schema.primary_key,
                operator: Operator::Eq,
                operand: Operand::Single(Value::Integer(key)),
            }],
        }])
    }

    /// Whether this predicate keeps `row`
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::Always => true,
            Self::AnyOf(conjunctions) => conjunctions.iter().any(|c| c.holds(row)),
        }
    }

    /// Whether this predicate filters nothing out
    pub fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }
}

fn compile_group(schema: &TableSchema, group: &CriteriaGroup) -> Result<Conjunction, RepositoryError> {
    let conditions = group
        .conditions()
        .iter()
        .map(|condition| compile_condition(schema, condition))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Conjunction { conditions })
}

fn compile_condition(
    schema: &TableSchema,
    condition: &Condition,
) -> Result<CompiledCondition, RepositoryError> {
    let field = condition.field.as_str();
    let index = schema
        .column_index(field)
        .ok_or_else(|| RepositoryError::invalid_predicate(format!("unknown field '{}'", field)))?;
    let column = &schema.columns[index];
    let operator = condition.operator;

    let operand = match (operator, &condition.operand) {
        (Operator::IsNull | Operator::IsNotNull, Operand::None) => Operand::None,
        (Operator::IsNull | Operator::IsNotNull, _) => {
            return Err(RepositoryError::invalid_predicate(format!(
                "{} on '{}' takes no value",
                operator, field
            )));
        }
        (Operator::In | Operator::NotIn, Operand::Set(values)) => {
            if values.is_empty() {
                return Err(RepositoryError::invalid_predicate(format!(
                    "{} on '{}' requires at least one value",
                    operator, field
                )));
            }
            let values = values
                .iter()
                .map(|value| coerce_operand(column, value))
                .collect::<Result<Vec<_>, _>>()?;
            Operand::Set(values)
        }
        (Operator::Like, Operand::Single(value)) => {
            if column.value_type != ValueType::Text {
                return Err(RepositoryError::invalid_predicate(format!(
                    "LIKE on '{}' requires a text column, found {}",
                    field, column.value_type
                )));
            }
            let pattern = coerce_operand(column, value)?;
            if let Value::Text(ref text) = pattern {
                if like_tokens(text).is_none() {
                    return Err(RepositoryError::invalid_predicate(format!(
                        "LIKE pattern for '{}' ends with an escape character",
                        field
                    )));
                }
            }
            Operand::Single(pattern)
        }
        (
            Operator::Eq
            | Operator::Ne
            | Operator::Gt
            | Operator::Gte
            | Operator::Lt
            | Operator::Lte,
            Operand::Single(value),
        ) => Operand::Single(coerce_operand(column, value)?),
        (Operator::In | Operator::NotIn, _) => {
            return Err(RepositoryError::invalid_predicate(format!(
                "{} on '{}' requires a set of values",
                operator, field
            )));
        }
        _ => {
            return Err(RepositoryError::invalid_predicate(format!(
                "{} on '{}' requires a single value",
                operator, field
            )));
        }
    };

    Ok(CompiledCondition {
        column: index,
        operator,
        operand,
    })
}

fn coerce_operand(column: &Column, value: &Value) -> Result<Value, RepositoryError> {
    if value.is_null() {
        return Err(RepositoryError::invalid_predicate(format!(
            "value for '{}' cannot be null; use is_null or is_not_null",
            column.name
        )));
    }
    value.clone().coerce_to(column.value_type).ok_or_else(|| {
        RepositoryError::invalid_predicate(format!(
            "type mismatch on '{}': expected {}, got {}",
            column.name, column.value_type, value
        ))
    })
}

/// One compiled sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    /// Column position
    pub column: usize,
    /// Sort direction
    pub direction: OrderDirection,
}

/// A compiled ORDER BY clause, always ending in a primary-key tiebreak
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// Compile an ordering clause against `schema`
    pub fn compile(schema: &TableSchema, ordering: &[OrderBy]) -> Result<Self, RepositoryError> {
        let mut keys = Vec::with_capacity(ordering.len() + 1);
        for order in ordering {
            let column = schema.column_index(&order.field).ok_or_else(|| {
                RepositoryError::invalid_ordering(format!("unknown sort field '{}'", order.field))
            })?;
            if !schema.columns[column].sortable {
                return Err(RepositoryError::invalid_ordering(format!(
                    "field '{}' is not sortable",
                    order.field
                )));
            }
            keys.push(SortKey {
                column,
                direction: order.direction,
            });
        }
        if !keys.iter().any(|key| key.column == schema.primary_key) {
            keys.push(SortKey {
                column: schema.primary_key,
                direction: OrderDirection::Ascending,
            });
        }
        Ok(Self { keys })
    }

    /// Primary key ascending
    pub fn primary_key(schema: &TableSchema) -> Self {
        Self {
            keys: vec![SortKey {
                column: schema.primary_key,
                direction: OrderDirection::Ascending,
            }],
        }
    }

    /// Sort keys in priority order
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Whether rows in primary-key order are already sorted
    pub fn follows_primary_key(&self, schema: &TableSchema) -> bool {
        self.keys.first().is_some_and(|key| {
            key.column == schema.primary_key && key.direction == OrderDirection::Ascending
        })
    }

    /// Compare two rows; NULL sorts after every value in ascending order
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for key in &self.keys {
            let left = a.get(key.column).unwrap_or(&Value::Null);
            let right = b.get(key.column).unwrap_or(&Value::Null);
            let ord = match (left.is_null(), right.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
            };
            let ord = match key.direction {
                OrderDirection::Ascending => ord,
                OrderDirection::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

/// Resolve `(column name, value)` pairs into assignments
///
/// Fails with `ValidationFailed` on unknown or repeated columns and on values
/// the column cannot hold.
pub fn compile_assignments(
    schema: &TableSchema,
    operation: RepositoryOperation,
    fields: Vec<(&str, Value)>,
) -> Result<Vec<Assignment>, RepositoryError> {
    let mut seen = HashSet::with_capacity(fields.len());
    let mut assignments = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        let column = schema.column_index(name).ok_or_else(|| {
            RepositoryError::validation_failed(operation, format!("unknown field '{}'", name))
        })?;
        if !seen.insert(column) {
            return Err(RepositoryError::validation_failed(
                operation,
                format!("field '{}' supplied more than once", name),
            ));
        }
        let declared = &schema.columns[column];
        let value = value
            .coerce_to(declared.value_type)
            .filter(|v| declared.accepts(v))
            .ok_or_else(|| {
                RepositoryError::validation_failed(
                    operation,
                    format!(
                        "field '{}' expects {}{}",
                        name,
                        declared.value_type,
                        if declared.nullable { "" } else { " (not null)" }
                    ),
                )
            })?;
        assignments.push(Assignment { column, value });
    }
    assignments.sort_by_key(|a| a.column);
    Ok(assignments)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LikeToken {
    AnyRun,
    AnyOne,
    Literal(char),
}

/// Tokenize a LIKE pattern; `None` when it ends with a lone escape
fn like_tokens(pattern: &str) -> Option<Vec<LikeToken>> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::AnyRun,
            '_' => LikeToken::AnyOne,
            '\\' => LikeToken::Literal(chars.next()?),
            other => LikeToken::Literal(other),
        });
    }
    Some(tokens)
}

/// SQL `LIKE` with `%`, `_` and backslash escape
pub(crate) fn like_matches(text: &str, pattern: &str) -> bool {
    let Some(tokens) = like_tokens(pattern) else {
        return false;
    };
    let text: Vec<char> = text.chars().collect();

    let (mut t, mut p) = (0, 0);
    // Position of the last `%` and the text position it is currently absorbing up to
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match tokens.get(p) {
            Some(LikeToken::AnyOne) => {
                t += 1;
                p += 1;
            }
            Some(LikeToken::Literal(c)) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            Some(LikeToken::AnyRun) => {
                backtrack = Some((p, t));
                p += 1;
            }
            _ => match backtrack {
                Some((run, absorbed)) => {
                    backtrack = Some((run, absorbed + 1));
                    p = run + 1;
                    t = absorbed + 1;
                }
                None => return false,
            },
        }
    }
    tokens[p..].iter().all(|token| *token == LikeToken::AnyRun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::criteria::CriteriaGroup;
    use crate::repository::RepositoryErrorKind;
    use crate::schema::Column;

    const COLUMNS: [Column; 4] = [
        Column::new("id", ValueType::Integer),
        Column::new("name", ValueType::Text),
        Column::new("rank", ValueType::Integer).nullable(),
        Column::new("seen_at", ValueType::Timestamp).nullable().unsortable(),
    ];

    const TABLE: TableSchema = TableSchema {
        name: "things",
        columns: &COLUMNS,
        primary_key: 0,
    };

    fn row(id: i64, name: &str, rank: Option<i64>) -> Row {
        Row::new(vec![
            Value::Integer(id),
            Value::from(name),
            Value::from(rank),
            Value::Null,
        ])
    }

    fn compile(group: CriteriaGroup) -> Result<Predicate, RepositoryError> {
        Predicate::compile(&TABLE, &Criteria::matching(group))
    }

    #[test]
    fn test_empty_criteria_is_always() {
        assert_eq!(Predicate::compile(&TABLE, &Criteria::new()).unwrap(), Predicate::Always);
        assert_eq!(compile(CriteriaGroup::new()).unwrap(), Predicate::Always);
    }

    #[test]
    fn test_unknown_field_is_invalid_predicate() {
        let err = compile(CriteriaGroup::new().eq("colour", "red")).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::InvalidPredicate);
        assert!(err.message.contains("colour"));
    }

    #[test]
    fn test_invalid_condition_in_shadowed_group_still_fails() {
        let criteria = Criteria::new()
            .or(CriteriaGroup::new())
            .or(CriteriaGroup::new().eq("rank", "high"));
        let err = Predicate::compile(&TABLE, &criteria).unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::InvalidPredicate);
    }

    #[test]
    fn test_malformed_pairings() {
        let cases = [
            Condition::new("rank", Operator::IsNull, Operand::Single(Value::Integer(1))),
            Condition::new("rank", Operator::Eq, Operand::None),
            Condition::new("rank", Operator::Eq, Operand::Set(vec![Value::Integer(1)])),
            Condition::new("rank", Operator::In, Operand::Single(Value::Integer(1))),
            Condition::in_values("rank", Vec::<i64>::new()),
            Condition::eq("rank", Value::Null),
            Condition::like("rank", "1%"),
            Condition::like("name", "abc\\"),
        ];
        for condition in cases {
            let err = compile(CriteriaGroup::new().and(condition.clone())).unwrap_err();
            assert_eq!(
                err.kind,
                RepositoryErrorKind::InvalidPredicate,
                "{:?} should be rejected",
                condition
            );
        }
    }

    #[test]
    fn test_timestamp_operand_coerced_from_text() {
        let predicate = compile(CriteriaGroup::new().gt("seen_at", "2024-01-01T00:00:00Z")).unwrap();
        let Predicate::AnyOf(conjunctions) = predicate else {
            panic!("expected a filter");
        };
        let operand = conjunctions[0].conditions()[0].operand();
        assert!(matches!(operand, Operand::Single(Value::Timestamp(_))));
    }

    #[test]
    fn test_null_comparisons_are_false() {
        let unranked = row(1, "a", None);
        for group in [
            CriteriaGroup::new().eq("rank", 1_i64),
            CriteriaGroup::new().ne("rank", 1_i64),
            CriteriaGroup::new().lt("rank", 5_i64),
            CriteriaGroup::new().not_in("rank", [1_i64, 2]),
        ] {
            assert!(!compile(group).unwrap().matches(&unranked));
        }
        assert!(compile(CriteriaGroup::new().is_null("rank"))
            .unwrap()
            .matches(&unranked));
    }

    #[test]
    fn test_or_of_ands() {
        let criteria = Criteria::new()
            .or(CriteriaGroup::new().eq("name", "a").gte("rank", 2_i64))
            .or(CriteriaGroup::new().eq("name", "z"));
        let predicate = Predicate::compile(&TABLE, &criteria).unwrap();

        assert!(predicate.matches(&row(1, "a", Some(2))));
        assert!(!predicate.matches(&row(2, "a", Some(1))));
        assert!(predicate.matches(&row(3, "z", None)));
        assert!(!predicate.matches(&row(4, "b", Some(9))));
    }

    #[test]
    fn test_between_and_in() {
        let predicate = compile(
            CriteriaGroup::new()
                .between("rank", 2_i64, 4_i64)
                .in_values("name", ["a", "b"]),
        )
        .unwrap();
        assert!(predicate.matches(&row(1, "a", Some(2))));
        assert!(predicate.matches(&row(2, "b", Some(4))));
        assert!(!predicate.matches(&row(3, "b", Some(5))));
        assert!(!predicate.matches(&row(4, "c", Some(3))));
    }

    #[test]
    fn test_like_matching() {
        assert!(like_matches("t1", "t%"));
        assert!(like_matches("t1", "t_"));
        assert!(!like_matches("t12", "t_"));
        assert!(like_matches("orders_2024", "%\\_2024"));
        assert!(!like_matches("ordersX2024", "%\\_2024"));
        assert!(like_matches("abcabd", "%ab_"));
        assert!(like_matches("", "%"));
        assert!(!like_matches("", "_"));
        assert!(like_matches("100%", "100\\%"));
        assert!(like_matches("a%b%c", "a%c"));
    }

    #[test]
    fn test_sort_spec_appends_primary_key() {
        let spec = SortSpec::compile(&TABLE, &[OrderBy::new("name", OrderDirection::Descending)])
            .unwrap();
        assert_eq!(spec.keys().len(), 2);
        assert_eq!(spec.keys()[1].column, 0);
        assert!(!spec.follows_primary_key(&TABLE));
        assert!(SortSpec::compile(&TABLE, &[]).unwrap().follows_primary_key(&TABLE));
    }

    #[test]
    fn test_sort_spec_rejects_unknown_and_unsortable() {
        let err = SortSpec::compile(&TABLE, &[OrderBy::new("colour", OrderDirection::Ascending)])
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::InvalidOrdering);

        let err = SortSpec::compile(&TABLE, &[OrderBy::new("seen_at", OrderDirection::Ascending)])
            .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::InvalidOrdering);
    }

    #[test]
    fn test_sort_nulls_last_ascending() {
        let spec = SortSpec::compile(&TABLE, &[OrderBy::new("rank", OrderDirection::Ascending)])
            .unwrap();
        let mut rows = vec![row(1, "a", None), row(2, "b", Some(5)), row(3, "c", Some(1))];
        rows.sort_by(|a, b| spec.compare(a, b));
        let ids: Vec<_> = rows.iter().map(|r| r.get(0).cloned()).collect();
        assert_eq!(
            ids,
            vec![
                Some(Value::Integer(3)),
                Some(Value::Integer(2)),
                Some(Value::Integer(1))
            ]
        );
    }

    #[test]
    fn test_compile_assignments() {
        let assignments = compile_assignments(
            &TABLE,
            RepositoryOperation::InsertSelective,
            vec![("rank", Value::Null), ("name", Value::from("x"))],
        )
        .unwrap();
        assert_eq!(assignments[0].column, 1);
        assert_eq!(assignments[1].value, Value::Null);

        let err = compile_assignments(
            &TABLE,
            RepositoryOperation::InsertSelective,
            vec![("name", Value::Null)],
        )
        .unwrap_err();
        assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);

        let err = compile_assignments(
            &TABLE,
            RepositoryOperation::InsertSelective,
            vec![("name", Value::from("x")), ("name", Value::from("y"))],
        )
        .unwrap_err();
        assert!(err.message.contains("more than once"));
    }
}
