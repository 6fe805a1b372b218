/// Every operator name the language knows.
///
/// The evaluator maps the head of a call form to one of these before asking
/// the active backend for an implementation, so an unregistered name fails
/// with a typed error instead of reaching a missing handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorName {
    // Evaluator built-in
    /// `$quote` - return the operand unevaluated
    Quote,

    // Comparison
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `<`
    LessThan,
    /// `>=`
    GreaterEqual,
    /// `<=`
    LessEqual,
    /// `$like`
    Like,
    /// `$ilike`
    ILike,
    /// `$in`
    In,
    /// `$contains`
    Contains,
    /// `$isnull`
    IsNull,

    // Logical
    /// `$and`
    And,
    /// `$or`
    Or,
    /// `$not`
    Not,

    // Arithmetic
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,

    // Utilities
    /// `_get`
    Get,
    /// `_map`
    Map,
    /// `_unique`
    Unique,
    /// `_size`
    Size,
    /// `_concat`
    ConcatLists,
    /// `_wait` / `$wait`
    Wait,
    /// `_define`
    Define,
    /// `$date`
    Date,

    // Relational
    /// `$from`
    From,
    /// `$as`
    As,
    /// `$join`
    Join,
    /// `$leftJoin`
    LeftJoin,
    /// `$where`
    Where,
    /// `$group`
    Group,
    /// `$having`
    Having,
    /// `$order`
    Order,
    /// `$limit`
    Limit,
    /// `$union`
    Union,
    /// `$select`
    Select,

    // Aggregates
    /// `$count`
    Count,
    /// `$sum`
    Sum,
    /// `$avg`
    Avg,
    /// `$min`
    Min,
    /// `$max`
    Max,

    // Windows
    /// `$over`
    Over,
    /// `$row_number`
    RowNumber,
    /// `$rank`
    Rank,
    /// `$dense_rank`
    DenseRank,
    /// `$lag`
    Lag,
    /// `$lead`
    Lead,

    // Scalar functions
    /// `$extract`
    Extract,
    /// `$concat`
    Concat,
    /// `$filter`
    Filter,
}

impl OperatorName {
    /// Look up an operator by the name used in expressions.
    pub fn from_name(name: &str) -> Option<Self> {
        use OperatorName::*;
        Some(match name {
            "$quote" => Quote,
            "=" => Equal,
            "!=" => NotEqual,
            ">" => GreaterThan,
            "<" => LessThan,
            ">=" => GreaterEqual,
            "<=" => LessEqual,
            "$like" => Like,
            "$ilike" => ILike,
            "$in" => In,
            "$contains" => Contains,
            "$isnull" => IsNull,
            "$and" => And,
            "$or" => Or,
            "$not" => Not,
            "+" => Add,
            "-" => Subtract,
            "*" => Multiply,
            "/" => Divide,
            "_get" => Get,
            "_map" => Map,
            "_unique" => Unique,
            "_size" => Size,
            "_concat" => ConcatLists,
            "_wait" | "$wait" => Wait,
            "_define" => Define,
            "$date" => Date,
            "$from" => From,
            "$as" => As,
            "$join" => Join,
            "$leftJoin" => LeftJoin,
            "$where" => Where,
            "$group" => Group,
            "$having" => Having,
            "$order" => Order,
            "$limit" => Limit,
            "$union" => Union,
            "$select" => Select,
            "$count" => Count,
            "$sum" => Sum,
            "$avg" => Avg,
            "$min" => Min,
            "$max" => Max,
            "$over" => Over,
            "$row_number" => RowNumber,
            "$rank" => Rank,
            "$dense_rank" => DenseRank,
            "$lag" => Lag,
            "$lead" => Lead,
            "$extract" => Extract,
            "$concat" => Concat,
            "$filter" => Filter,
            _ => return None,
        })
    }

    /// The canonical name used in expressions.
    pub fn name(self) -> &'static str {
        use OperatorName::*;
        match self {
            Quote => "$quote",
            Equal => "=",
            NotEqual => "!=",
            GreaterThan => ">",
            LessThan => "<",
            GreaterEqual => ">=",
            LessEqual => "<=",
            Like => "$like",
            ILike => "$ilike",
            In => "$in",
            Contains => "$contains",
            IsNull => "$isnull",
            And => "$and",
            Or => "$or",
            Not => "$not",
            Add => "+",
            Subtract => "-",
            Multiply => "*",
            Divide => "/",
            Get => "_get",
            Map => "_map",
            Unique => "_unique",
            Size => "_size",
            ConcatLists => "_concat",
            Wait => "_wait",
            Define => "_define",
            Date => "$date",
            From => "$from",
            As => "$as",
            Join => "$join",
            LeftJoin => "$leftJoin",
            Where => "$where",
            Group => "$group",
            Having => "$having",
            Order => "$order",
            Limit => "$limit",
            Union => "$union",
            Select => "$select",
            Count => "$count",
            Sum => "$sum",
            Avg => "$avg",
            Min => "$min",
            Max => "$max",
            Over => "$over",
            RowNumber => "$row_number",
            Rank => "$rank",
            DenseRank => "$dense_rank",
            Lag => "$lag",
            Lead => "$lead",
            Extract => "$extract",
            Concat => "$concat",
            Filter => "$filter",
        }
    }

    pub fn is_aggregate(self) -> bool {
        use OperatorName::*;
        matches!(self, Count | Sum | Avg | Min | Max)
    }

    /// Output column name for an unaliased projection of this call
    /// (`$count` -> `count`).
    pub fn column_name(self) -> &'static str {
        let name = self.name();
        name.trim_start_matches(['$', '_'])
    }
}

impl std::fmt::Display for OperatorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
