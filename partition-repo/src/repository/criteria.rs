//! Criteria, ordering and page-window types for repository queries
//!
//! A [`Criteria`] is an OR of [`CriteriaGroup`]s, each of which is an AND of
//! [`Condition`]s. An empty group matches every row, and so does a criteria
//! with no groups at all. Criteria are plain values: building one never
//! touches a store, and validation happens when a repository compiles it.
//!
//! # Example
//!
//! ```rust
//! use partition_repo::repository::{Criteria, CriteriaGroup, OrderDirection, Pagination};
//!
//! // (table = 't1' AND status IN ('RUNNING', 'PENDING')) OR node_id IS NULL
//! let criteria = Criteria::new()
//!     .or(CriteriaGroup::new()
//!         .eq("table", "t1")
//!         .in_values("status", ["RUNNING", "PENDING"]))
//!     .or(CriteriaGroup::new().is_null("node_id"))
//!     .order_by("status", OrderDirection::Descending);
//!
//! assert_eq!(criteria.groups().len(), 2);
//!
//! // Rows 40..60 of the ordered result
//! let page = Pagination::new(40, 20);
//! assert_eq!(page.limit, 20);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Direction for ordering results
///
/// # Example
///
/// ```rust
/// use partition_repo::repository::OrderDirection;
///
/// assert_eq!(format!("{}", OrderDirection::Ascending), "asc");
/// assert_eq!(OrderDirection::Descending.as_sql(), "DESC");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    /// Sort in ascending order (A-Z, 0-9)
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    /// Sort in descending order (Z-A, 9-0)
    #[serde(alias = "desc")]
    Descending,
}

impl OrderDirection {
    /// SQL keyword for this direction
    #[must_use]
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "asc"),
            Self::Descending => write!(f, "desc"),
        }
    }
}

/// Row-bounds window applied by the store
///
/// `limit` must be positive; repositories reject a zero limit.
///
/// # Example
///
/// ```rust
/// use partition_repo::repository::Pagination;
///
/// let page3 = Pagination::page(3, 20);
/// assert_eq!(page3.offset, 40);
/// assert_eq!(page3.limit, 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Number of results to skip
    pub offset: u64,
    /// Maximum number of results to return
    pub limit: u64,
}

impl Pagination {
    /// Create a window skipping `offset` rows and returning at most `limit`
    #[must_use]
    pub const fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// The first `limit` rows
    #[must_use]
    pub const fn first_page(limit: u64) -> Self {
        Self { offset: 0, limit }
    }

    /// Page `page_number` (1-indexed) of `page_size` rows
    ///
    /// Page 0 is treated as page 1.
    #[must_use]
    pub const fn page(page_number: u64, page_size: u64) -> Self {
        let offset = page_number.saturating_sub(1).saturating_mul(page_size);
        Self {
            offset,
            limit: page_size,
        }
    }

    /// Offset one past the last row of the window, saturating
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset.saturating_add(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
        }
    }
}

/// Condition operators
///
/// # Example
///
/// ```rust
/// use partition_repo::repository::Operator;
///
/// assert_eq!(format!("{}", Operator::Gte), ">=");
/// assert_eq!(format!("{}", Operator::NotIn), "NOT IN");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    /// Equal to (=)
    Eq,
    /// Not equal to (<>)
    Ne,
    /// Greater than (>)
    Gt,
    /// Greater than or equal to (>=)
    Gte,
    /// Less than (<)
    Lt,
    /// Less than or equal to (<=)
    Lte,
    /// Value is in a set (IN)
    In,
    /// Value is not in a set (NOT IN)
    NotIn,
    /// Value is null (IS NULL)
    IsNull,
    /// Value is not null (IS NOT NULL)
    IsNotNull,
    /// Pattern matching (LIKE)
    Like,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "<>"),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
            Self::In => write!(f, "IN"),
            Self::NotIn => write!(f, "NOT IN"),
            Self::IsNull => write!(f, "IS NULL"),
            Self::IsNotNull => write!(f, "IS NOT NULL"),
            Self::Like => write!(f, "LIKE"),
        }
    }
}

/// The right-hand side of a condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// No value (IS NULL / IS NOT NULL)
    None,
    /// A single value
    Single(Value),
    /// A set of values (IN / NOT IN)
    Set(Vec<Value>),
}

/// A single typed predicate on one field
///
/// Constructors pair each operator with the operand shape it needs;
/// [`Condition::new`] accepts any pairing and leaves the check to
/// compilation.
///
/// # Example
///
/// ```rust
/// use partition_repo::repository::{Condition, Operator};
///
/// let by_table = Condition::eq("table", "t1");
/// assert_eq!(by_table.operator, Operator::Eq);
///
/// let unassigned = Condition::is_null("node_id");
/// assert_eq!(unassigned.operator, Operator::IsNull);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// Field (column) name
    pub field: String,
    /// Comparison operator
    pub operator: Operator,
    /// Value(s) compared against
    #[serde(default = "no_operand")]
    pub operand: Operand,
}

fn no_operand() -> Operand {
    Operand::None
}

impl Condition {
    /// Create a condition from its parts
    pub fn new(field: impl Into<String>, operator: Operator, operand: Operand) -> Self {
        Self {
            field: field.into(),
            operator,
            operand,
        }
    }

    fn single(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self::new(field, operator, Operand::Single(value.into()))
    }

    fn set<I, V>(field: impl Into<String>, operator: Operator, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::new(
            field,
            operator,
            Operand::Set(values.into_iter().map(Into::into).collect()),
        )
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(field, Operator::Eq, value)
    }

    /// `field <> value`
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(field, Operator::Ne, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(field, Operator::Gt, value)
    }

    /// `field >= value`
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(field, Operator::Gte, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(field, Operator::Lt, value)
    }

    /// `field <= value`
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::single(field, Operator::Lte, value)
    }

    /// `field IN (values...)`
    pub fn in_values<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::set(field, Operator::In, values)
    }

    /// `field NOT IN (values...)`
    pub fn not_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::set(field, Operator::NotIn, values)
    }

    /// `field IS NULL`
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNull, Operand::None)
    }

    /// `field IS NOT NULL`
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, Operator::IsNotNull, Operand::None)
    }

    /// `field LIKE pattern` (`%` any run, `_` any one character, `\` escapes)
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::single(field, Operator::Like, pattern.into())
    }
}

/// Conditions joined by AND
///
/// Builder methods consume and return the group, so a group is assembled in
/// one expression and never mutated after it is handed to a [`Criteria`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CriteriaGroup {
    conditions: Vec<Condition>,
}

impl CriteriaGroup {
    /// An empty group (matches everything)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a condition
    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Append `field = value`
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::eq(field, value))
    }

    /// Append `field <> value`
    #[must_use]
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::ne(field, value))
    }

    /// Append `field > value`
    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::gt(field, value))
    }

    /// Append `field >= value`
    #[must_use]
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::gte(field, value))
    }

    /// Append `field < value`
    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::lt(field, value))
    }

    /// Append `field <= value`
    #[must_use]
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(Condition::lte(field, value))
    }

    /// Append `low <= field <= high` as two conditions
    #[must_use]
    pub fn between(
        self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        let field = field.into();
        self.and(Condition::gte(field.clone(), low))
            .and(Condition::lte(field, high))
    }

    /// Append `field IN (values...)`
    #[must_use]
    pub fn in_values<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.and(Condition::in_values(field, values))
    }

    /// Append `field NOT IN (values...)`
    #[must_use]
    pub fn not_in<I, V>(self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.and(Condition::not_in(field, values))
    }

    /// Append `field IS NULL`
    #[must_use]
    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.and(Condition::is_null(field))
    }

    /// Append `field IS NOT NULL`
    #[must_use]
    pub fn is_not_null(self, field: impl Into<String>) -> Self {
        self.and(Condition::is_not_null(field))
    }

    /// Append `field LIKE pattern`
    #[must_use]
    pub fn like(self, field: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.and(Condition::like(field, pattern))
    }

    /// The conditions in insertion order
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether the group has no conditions
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl FromIterator<Condition> for CriteriaGroup {
    fn from_iter<T: IntoIterator<Item = Condition>>(iter: T) -> Self {
        Self {
            conditions: iter.into_iter().collect(),
        }
    }
}

/// One sort key of an ordering clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Field (column) name
    pub field: String,
    /// Sort direction
    #[serde(default)]
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Create a sort key
    pub fn new(field: impl Into<String>, direction: OrderDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Groups joined by OR, plus an optional ordering clause
///
/// The primary key is always appended as a final ascending sort key when the
/// criteria is compiled, so scans are repeatable even with no ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criteria {
    #[serde(default)]
    groups: Vec<CriteriaGroup>,
    #[serde(default, rename = "order_by")]
    ordering: Vec<OrderBy>,
}

impl Criteria {
    /// Criteria matching every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria with a single group
    pub fn matching(group: CriteriaGroup) -> Self {
        Self::new().or(group)
    }

    /// Append a group, OR-ed with the existing ones
    #[must_use]
    pub fn or(mut self, group: CriteriaGroup) -> Self {
        self.groups.push(group);
        self
    }

    /// Append a sort key
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: OrderDirection) -> Self {
        self.ordering.push(OrderBy::new(field, direction));
        self
    }

    /// Drop all groups and sort keys
    #[must_use]
    pub fn clear(self) -> Self {
        Self::default()
    }

    /// The groups in insertion order
    pub fn groups(&self) -> &[CriteriaGroup] {
        &self.groups
    }

    /// The explicit sort keys in priority order
    pub fn ordering(&self) -> &[OrderBy] {
        &self.ordering
    }

    /// Whether this criteria filters nothing out
    ///
    /// True with no groups, or when any group is empty (an empty AND is
    /// true, and true OR anything is true).
    pub fn is_unfiltered(&self) -> bool {
        self.groups.is_empty() || self.groups.iter().any(CriteriaGroup::is_empty)
    }
}

impl From<CriteriaGroup> for Criteria {
    fn from(group: CriteriaGroup) -> Self {
        Self::matching(group)
    }
}
