//! Restricted analysis-program executor.
//!
//! Generated code is parsed into a fixed set of table operations and
//! evaluated against a copy of the dataset. There is no general-purpose
//! interpreter behind this: anything outside the allow-listed operations is
//! a parse error, the operation count is budgeted, and the caller runs the
//! whole evaluation under a wall-clock deadline. This is the capability
//! boundary; the substring screen in `codegen` is only a cheap pre-filter.

use crate::charts::{self, ChartData, ChartKind, ChartSpec};
use crate::error::{InsightError, Result};
use crate::stats;
use polars::prelude::*;
use std::time::Instant;

const MAX_OPS: usize = 16;

/// Aggregate functions usable inside `agg(...)` and as chain terminals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFn {
    Sum,
    Mean,
    Min,
    Max,
    Count,
}

impl AggFn {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(AggFn::Sum),
            "mean" | "avg" => Some(AggFn::Mean),
            "min" => Some(AggFn::Min),
            "max" => Some(AggFn::Max),
            "count" => Some(AggFn::Count),
            _ => None,
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            AggFn::Sum => "sum",
            AggFn::Mean => "mean",
            AggFn::Min => "min",
            AggFn::Max => "max",
            AggFn::Count => "count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq)]
enum Op {
    Select(Vec<String>),
    Filter {
        column: String,
        op: CmpOp,
        value: Literal,
    },
    GroupAgg {
        by: Vec<String>,
        aggs: Vec<(AggFn, Option<String>)>,
    },
    Sort {
        column: String,
        descending: bool,
    },
    Head(usize),
    /// Terminal scalar aggregate; `None` column means whole-table count.
    ScalarAgg(AggFn, Option<String>),
    NUnique(String),
}

#[derive(Debug, Clone)]
struct Plan {
    ops: Vec<Op>,
    chart: Option<ChartKind>,
}

/// Scalar outcome of a terminal aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarResult {
    Int(i64),
    Float(f64),
}

/// Result of evaluating a program.
#[derive(Debug, Clone)]
pub enum ExecValue {
    Table(DataFrame),
    Scalar(ScalarResult),
}

#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub value: ExecValue,
    pub chart: Option<ChartSpec>,
}

/// Parse and evaluate a generated program against a copy of the dataset.
pub fn run(df: &DataFrame, code: &str, max_rows: usize, deadline: Instant) -> Result<ExecOutcome> {
    let plan = parse_program(code)?;
    if plan.ops.len() > MAX_OPS {
        return Err(InsightError::Execution(format!(
            "Program too long ({} operations, max {})",
            plan.ops.len(),
            MAX_OPS
        )));
    }

    let mut current = df.clone();
    let mut scalar: Option<ScalarResult> = None;

    for (idx, op) in plan.ops.iter().enumerate() {
        if Instant::now() > deadline {
            return Err(InsightError::Execution("Analysis timed out".to_string()));
        }
        if scalar.is_some() {
            return Err(InsightError::Execution(
                "No operations allowed after a scalar aggregate".to_string(),
            ));
        }

        match op {
            Op::Select(cols) => {
                let resolved = resolve_columns(&current, cols)?;
                current = current
                    .clone()
                    .lazy()
                    .select(resolved.iter().map(|c| col(c)).collect::<Vec<_>>())
                    .collect()?;
            }
            Op::Filter { column, op, value } => {
                let name = resolve_column(&current, column)?;
                let expr = comparison_expr(&name, *op, value);
                current = current.clone().lazy().filter(expr).collect()?;
            }
            Op::GroupAgg { by, aggs } => {
                let by_cols = resolve_columns(&current, by)?;
                let mut agg_exprs = Vec::new();
                for (agg, column) in aggs {
                    agg_exprs.push(agg_expr(&current, *agg, column.as_deref())?);
                }
                current = current
                    .clone()
                    .lazy()
                    .group_by(by_cols.iter().map(|c| col(c)).collect::<Vec<_>>())
                    .agg(agg_exprs)
                    .collect()?;
            }
            Op::Sort { column, descending } => {
                let name = resolve_column(&current, column)?;
                let indices = current
                    .column(&name)?
                    .arg_sort(SortOptions::default().with_order_descending(*descending));
                current = current.take(&indices)?;
            }
            Op::Head(n) => {
                current = current.head(Some(*n));
            }
            Op::ScalarAgg(agg, column) => {
                if idx != plan.ops.len() - 1 {
                    return Err(InsightError::Execution(
                        "Scalar aggregates must be the final operation".to_string(),
                    ));
                }
                scalar = Some(scalar_agg(&current, *agg, column.as_deref())?);
            }
            Op::NUnique(column) => {
                if idx != plan.ops.len() - 1 {
                    return Err(InsightError::Execution(
                        "Scalar aggregates must be the final operation".to_string(),
                    ));
                }
                let name = resolve_column(&current, column)?;
                scalar = Some(ScalarResult::Int(current.column(&name)?.n_unique()? as i64));
            }
        }
    }

    let value = match scalar {
        Some(s) => ExecValue::Scalar(s),
        None => ExecValue::Table(current.head(Some(max_rows))),
    };
    let chart = plan.chart.and_then(|kind| chart_from_value(kind, &value));

    Ok(ExecOutcome { value, chart })
}

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

/// Resolve a requested column name against the actual schema: exact match,
/// then case-insensitive, then closest fuzzy match above a high threshold.
/// Generated code gets column names slightly wrong often enough that the
/// fuzzy step pays for itself.
fn resolve_column(df: &DataFrame, requested: &str) -> Result<String> {
    let names = df.get_column_names();
    if names.iter().any(|n| *n == requested) {
        return Ok(requested.to_string());
    }

    let lower = requested.to_lowercase();
    if let Some(name) = names.iter().find(|n| n.to_lowercase() == lower) {
        return Ok(name.to_string());
    }

    let mut best: Option<(f64, &str)> = None;
    for name in &names {
        let score = strsim::jaro_winkler(&lower, &name.to_lowercase());
        if score > best.map(|(s, _)| s).unwrap_or(0.0) {
            best = Some((score, *name));
        }
    }
    match best {
        Some((score, name)) if score >= 0.88 => Ok(name.to_string()),
        _ => Err(InsightError::Execution(format!(
            "Unknown column '{}' (available: {})",
            requested,
            names.join(", ")
        ))),
    }
}

fn resolve_columns(df: &DataFrame, requested: &[String]) -> Result<Vec<String>> {
    requested.iter().map(|c| resolve_column(df, c)).collect()
}

// ---------------------------------------------------------------------------
// Expression building
// ---------------------------------------------------------------------------

fn literal_expr(value: &Literal) -> Expr {
    match value {
        Literal::Int(v) => lit(*v),
        Literal::Float(v) => lit(*v),
        Literal::Str(v) => lit(v.clone()),
        Literal::Bool(v) => lit(*v),
    }
}

fn comparison_expr(column: &str, op: CmpOp, value: &Literal) -> Expr {
    let value_expr = literal_expr(value);
    match op {
        CmpOp::Eq => col(column).eq(value_expr),
        CmpOp::Ne => col(column).neq(value_expr),
        CmpOp::Gt => col(column).gt(value_expr),
        CmpOp::Lt => col(column).lt(value_expr),
        CmpOp::Ge => col(column).gt_eq(value_expr),
        CmpOp::Le => col(column).lt_eq(value_expr),
    }
}

fn agg_expr(df: &DataFrame, agg: AggFn, column: Option<&str>) -> Result<Expr> {
    match column {
        None => Ok(len().alias("count")),
        Some(requested) => {
            let name = resolve_column(df, requested)?;
            let alias = format!("{}_{}", name, agg.suffix());
            let base = col(&name);
            Ok(match agg {
                AggFn::Sum => base.sum().alias(&alias),
                AggFn::Mean => base.mean().alias(&alias),
                AggFn::Min => base.min().alias(&alias),
                AggFn::Max => base.max().alias(&alias),
                AggFn::Count => base.count().alias(&alias),
            })
        }
    }
}

fn scalar_agg(df: &DataFrame, agg: AggFn, column: Option<&str>) -> Result<ScalarResult> {
    let column = match column {
        None => return Ok(ScalarResult::Int(df.height() as i64)),
        Some(c) => resolve_column(df, c)?,
    };
    let series = df.column(&column)?;
    if agg == AggFn::Count {
        return Ok(ScalarResult::Int((series.len() - series.null_count()) as i64));
    }

    let values = stats::numeric_values(series)?;
    if values.is_empty() {
        return Err(InsightError::Execution(format!(
            "Column '{}' has no numeric values to aggregate",
            column
        )));
    }
    let result = match agg {
        AggFn::Sum => values.iter().sum::<f64>(),
        AggFn::Mean => stats::mean(&values).unwrap_or(0.0),
        AggFn::Min => stats::min(&values).unwrap_or(0.0),
        AggFn::Max => stats::max(&values).unwrap_or(0.0),
        AggFn::Count => unreachable!(),
    };
    Ok(ScalarResult::Float(result))
}

// ---------------------------------------------------------------------------
// Chart derivation
// ---------------------------------------------------------------------------

/// Derive a chart spec from the final result when the program requested one
/// and the shape supports it. Unsuitable shapes yield no chart, not an
/// error.
fn chart_from_value(kind: ChartKind, value: &ExecValue) -> Option<ChartSpec> {
    let table = match value {
        ExecValue::Table(df) => df,
        ExecValue::Scalar(_) => return None,
    };

    let names: Vec<String> = table.get_column_names().iter().map(|s| s.to_string()).collect();
    let label_col = names
        .iter()
        .find(|n| table.column(n).map(|s| s.dtype() == &DataType::String).unwrap_or(false));
    let numeric_cols: Vec<&String> = names
        .iter()
        .filter(|n| table.column(n).map(stats::is_numeric).unwrap_or(false))
        .collect();

    match kind {
        ChartKind::Histogram => {
            let column = numeric_cols.first()?;
            let values = stats::numeric_values(table.column(column).ok()?).ok()?;
            if values.is_empty() {
                return None;
            }
            Some(ChartSpec {
                kind,
                title: format!("Histogram of {}", column),
                x: column.to_string(),
                y: None,
                data: ChartData::Bins(charts::histogram_bins(&values, 10)),
            })
        }
        ChartKind::Bar | ChartKind::Line => {
            let label = label_col?;
            let value_col = numeric_cols.first()?;
            let labels = table.column(label).ok()?;
            let values = table.column(value_col).ok()?.cast(&DataType::Float64).ok()?;
            let values = values.f64().ok()?;
            let mut points = Vec::new();
            for idx in 0..table.height() {
                let text = stats::any_value_to_display(&labels.get(idx).ok()?);
                if let Some(v) = values.get(idx) {
                    points.push((text, v));
                }
            }
            Some(ChartSpec {
                kind,
                title: format!("{} by {}", value_col, label),
                x: label.clone(),
                y: Some(value_col.to_string()),
                data: ChartData::Labeled(points),
            })
        }
        ChartKind::Scatter => {
            if numeric_cols.len() < 2 {
                return None;
            }
            let (a, b) = (numeric_cols[0], numeric_cols[1]);
            let xa = stats::numeric_values(table.column(a).ok()?).ok()?;
            let xb = stats::numeric_values(table.column(b).ok()?).ok()?;
            Some(ChartSpec {
                kind,
                title: format!("{} vs {}", a, b),
                x: a.to_string(),
                y: Some(b.to_string()),
                data: ChartData::Points(xa.into_iter().zip(xb).collect()),
            })
        }
        ChartKind::BoxPlot => None,
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Number(String),
    Dot,
    LParen,
    RParen,
    Comma,
    Cmp(CmpOp),
    Assign,
}

fn tokenize(line: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '.' => {
                // Disambiguate member access from a leading-dot float.
                if i + 1 < chars.len() && chars[i + 1].is_ascii_digit() {
                    let start = i;
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    tokens.push(Token::Number(chars[start..i].iter().collect()));
                } else {
                    tokens.push(Token::Dot);
                    i += 1;
                }
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != quote {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(InsightError::Execution("Unterminated string literal".to_string()));
                }
                tokens.push(Token::Str(chars[start..j].iter().collect()));
                i = j + 1;
            }
            '=' => {
                if i + 1 < chars.len() && chars[i + 1] == '=' {
                    tokens.push(Token::Cmp(CmpOp::Eq));
                    i += 2;
                } else {
                    tokens.push(Token::Assign);
                    i += 1;
                }
            }
            '!' if i + 1 < chars.len() && chars[i + 1] == '=' => {
                tokens.push(Token::Cmp(CmpOp::Ne));
                i += 2;
            }
            '>' => {
                if i + 1 < chars.len() && chars[i + 1] == '=' {
                    tokens.push(Token::Cmp(CmpOp::Ge));
                    i += 2;
                } else {
                    tokens.push(Token::Cmp(CmpOp::Gt));
                    i += 1;
                }
            }
            '<' => {
                if i + 1 < chars.len() && chars[i + 1] == '=' {
                    tokens.push(Token::Cmp(CmpOp::Le));
                    i += 2;
                } else {
                    tokens.push(Token::Cmp(CmpOp::Lt));
                    i += 1;
                }
            }
            '-' | '0'..='9' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(InsightError::Execution(format!(
                    "Unexpected character '{}' in program",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: &Token, context: &str) -> Result<()> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            other => Err(InsightError::Execution(format!(
                "Expected {:?} {} but found {:?}",
                expected, context, other
            ))),
        }
    }

    fn expect_ident(&mut self, context: &str) -> Result<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(InsightError::Execution(format!(
                "Expected identifier {} but found {:?}",
                context, other
            ))),
        }
    }

    /// Comma-separated quoted column names inside parentheses.
    fn string_args(&mut self) -> Result<Vec<String>> {
        self.expect(&Token::LParen, "before arguments")?;
        let mut args = Vec::new();
        loop {
            match self.next() {
                Some(Token::Str(s)) => args.push(s),
                Some(Token::RParen) if args.is_empty() => return Ok(args),
                other => {
                    return Err(InsightError::Execution(format!(
                        "Expected quoted column name but found {:?}",
                        other
                    )))
                }
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                other => {
                    return Err(InsightError::Execution(format!(
                        "Expected ',' or ')' but found {:?}",
                        other
                    )))
                }
            }
        }
    }

    fn literal(&mut self) -> Result<Literal> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Literal::Str(s)),
            Some(Token::Number(n)) => {
                if n.contains('.') {
                    n.parse::<f64>()
                        .map(Literal::Float)
                        .map_err(|_| InsightError::Execution(format!("Invalid number '{}'", n)))
                } else {
                    n.parse::<i64>()
                        .map(Literal::Int)
                        .map_err(|_| InsightError::Execution(format!("Invalid number '{}'", n)))
                }
            }
            Some(Token::Ident(word)) if word == "true" => Ok(Literal::Bool(true)),
            Some(Token::Ident(word)) if word == "false" => Ok(Literal::Bool(false)),
            other => Err(InsightError::Execution(format!(
                "Expected a literal value but found {:?}",
                other
            ))),
        }
    }

    /// `fn("col")` or `count()` inside agg().
    fn agg_call(&mut self) -> Result<(AggFn, Option<String>)> {
        let name = self.expect_ident("aggregate function")?;
        let agg = AggFn::parse(&name).ok_or_else(|| {
            InsightError::Execution(format!("Unknown aggregate function '{}'", name))
        })?;
        let args = self.string_args()?;
        match (agg, args.len()) {
            (AggFn::Count, 0) => Ok((agg, None)),
            (_, 1) => Ok((agg, Some(args.into_iter().next().unwrap()))),
            (_, n) => Err(InsightError::Execution(format!(
                "Aggregate '{}' takes one column, got {}",
                name, n
            ))),
        }
    }

    fn chain(&mut self) -> Result<Vec<Op>> {
        let root = self.expect_ident("at start of expression")?;
        if root != "df" {
            return Err(InsightError::Execution(format!(
                "Programs must start from `df`, found '{}'",
                root
            )));
        }

        let mut ops = Vec::new();
        while let Some(Token::Dot) = self.peek() {
            self.next();
            let method = self.expect_ident("after '.'")?;
            match method.as_str() {
                "select" => ops.push(Op::Select(self.string_args()?)),
                "filter" => {
                    self.expect(&Token::LParen, "after filter")?;
                    let column = match self.next() {
                        Some(Token::Str(s)) => s,
                        other => {
                            return Err(InsightError::Execution(format!(
                                "filter expects a quoted column name, found {:?}",
                                other
                            )))
                        }
                    };
                    let op = match self.next() {
                        Some(Token::Cmp(op)) => op,
                        other => {
                            return Err(InsightError::Execution(format!(
                                "filter expects a comparison operator, found {:?}",
                                other
                            )))
                        }
                    };
                    let value = self.literal()?;
                    self.expect(&Token::RParen, "after filter condition")?;
                    ops.push(Op::Filter { column, op, value });
                }
                "group_by" | "groupby" => {
                    let by = self.string_args()?;
                    // group_by must be immediately followed by .agg(...)
                    self.expect(&Token::Dot, "after group_by")?;
                    let next = self.expect_ident("after group_by")?;
                    if next != "agg" {
                        return Err(InsightError::Execution(
                            "group_by must be followed by .agg(...)".to_string(),
                        ));
                    }
                    self.expect(&Token::LParen, "after agg")?;
                    let mut aggs = vec![self.agg_call()?];
                    loop {
                        match self.next() {
                            Some(Token::Comma) => aggs.push(self.agg_call()?),
                            Some(Token::RParen) => break,
                            other => {
                                return Err(InsightError::Execution(format!(
                                    "Expected ',' or ')' in agg, found {:?}",
                                    other
                                )))
                            }
                        }
                    }
                    ops.push(Op::GroupAgg { by, aggs });
                }
                "sort" | "sort_by" => {
                    self.expect(&Token::LParen, "after sort")?;
                    let column = match self.next() {
                        Some(Token::Str(s)) => s,
                        other => {
                            return Err(InsightError::Execution(format!(
                                "sort expects a quoted column name, found {:?}",
                                other
                            )))
                        }
                    };
                    let mut descending = false;
                    match self.next() {
                        Some(Token::RParen) => {}
                        Some(Token::Comma) => {
                            let flag = self.expect_ident("after sort order")?;
                            descending = matches!(flag.as_str(), "desc" | "descending");
                            self.expect(&Token::RParen, "after sort order")?;
                        }
                        other => {
                            return Err(InsightError::Execution(format!(
                                "Expected ',' or ')' in sort, found {:?}",
                                other
                            )))
                        }
                    }
                    ops.push(Op::Sort { column, descending });
                }
                "head" | "limit" => {
                    self.expect(&Token::LParen, "after head")?;
                    let n = match self.next() {
                        Some(Token::Number(n)) => n.parse::<usize>().map_err(|_| {
                            InsightError::Execution(format!("head expects a row count, got '{}'", n))
                        })?,
                        other => {
                            return Err(InsightError::Execution(format!(
                                "head expects a row count, found {:?}",
                                other
                            )))
                        }
                    };
                    self.expect(&Token::RParen, "after head count")?;
                    ops.push(Op::Head(n));
                }
                "n_unique" | "nunique" => {
                    let mut args = self.string_args()?;
                    if args.len() != 1 {
                        return Err(InsightError::Execution(
                            "n_unique takes exactly one column".to_string(),
                        ));
                    }
                    ops.push(Op::NUnique(args.remove(0)));
                }
                name => match AggFn::parse(name) {
                    Some(agg) => {
                        let args = self.string_args()?;
                        match (agg, args.len()) {
                            (AggFn::Count, 0) => ops.push(Op::ScalarAgg(agg, None)),
                            (_, 1) => ops.push(Op::ScalarAgg(
                                agg,
                                Some(args.into_iter().next().unwrap()),
                            )),
                            (_, n) => {
                                return Err(InsightError::Execution(format!(
                                    "Aggregate '{}' takes one column, got {}",
                                    name, n
                                )))
                            }
                        }
                    }
                    None => {
                        return Err(InsightError::Execution(format!(
                            "Unknown operation '{}'",
                            name
                        )))
                    }
                },
            }
        }

        if ops.is_empty() {
            return Err(InsightError::Execution(
                "Program applies no operations to `df`".to_string(),
            ));
        }
        Ok(ops)
    }
}

fn parse_program(code: &str) -> Result<Plan> {
    let mut ops: Option<Vec<Op>> = None;
    let mut chart = None;

    for line in code.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let tokens = tokenize(line)?;
        let mut parser = Parser::new(tokens);

        // `result = df...` assignment line.
        if matches!(parser.peek(), Some(Token::Ident(name)) if name == "result") {
            parser.next();
            match parser.peek() {
                Some(Token::Assign) => {
                    parser.next();
                    ops = Some(parser.chain()?);
                    continue;
                }
                Some(Token::Dot) => {
                    // `result.plot(kind)` line.
                    parser.next();
                    let method = parser.expect_ident("after 'result.'")?;
                    if method != "plot" {
                        return Err(InsightError::Execution(format!(
                            "Unknown operation 'result.{}'",
                            method
                        )));
                    }
                    parser.expect(&Token::LParen, "after plot")?;
                    let kind = match parser.next() {
                        Some(Token::Ident(k)) | Some(Token::Str(k)) => k,
                        other => {
                            return Err(InsightError::Execution(format!(
                                "plot expects a chart kind, found {:?}",
                                other
                            )))
                        }
                    };
                    chart = Some(match kind.as_str() {
                        "bar" => ChartKind::Bar,
                        "line" => ChartKind::Line,
                        "histogram" | "hist" => ChartKind::Histogram,
                        "scatter" => ChartKind::Scatter,
                        other => {
                            return Err(InsightError::Execution(format!(
                                "Unknown chart kind '{}'",
                                other
                            )))
                        }
                    });
                    continue;
                }
                other => {
                    return Err(InsightError::Execution(format!(
                        "Expected '=' or '.plot' after 'result', found {:?}",
                        other
                    )))
                }
            }
        }

        return Err(InsightError::Execution(format!(
            "Unrecognized statement: {}",
            line
        )));
    }

    match ops {
        Some(ops) => Ok(Plan { ops, chart }),
        None => Err(InsightError::Execution(
            "Program never assigns to `result`".to_string(),
        )),
    }
}
