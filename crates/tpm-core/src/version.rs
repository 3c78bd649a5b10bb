//! Version numbers and constraint formulas (spec §3, §4.1).
//!
//! A [`VersionNumber`] is an ordered sequence of components, each either a
//! non-negative integer or a single lowercase letter. A [`Formula`] is a
//! small boolean algebra over version predicates that serializes to and
//! from a canonical parenthesized string.

use crate::error::Error;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One component of a [`VersionNumber`]: either an integer or a single
/// lowercase letter. Letters compare greater than integers at the same
/// position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionComponent {
    /// A numeric component, e.g. the `12` in `1.12.0`.
    Integer(u64),
    /// A single-letter component, e.g. the `a` in `1.0a`.
    Letter(char),
}

impl PartialOrd for VersionComponent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionComponent {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Letter(a), Self::Letter(b)) => a.cmp(b),
            (Self::Letter(_), Self::Integer(_)) => Ordering::Greater,
            (Self::Integer(_), Self::Letter(_)) => Ordering::Less,
        }
    }
}

impl fmt::Display for VersionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Letter(c) => write!(f, "{c}"),
        }
    }
}

/// A multi-component version number with mixed integer/letter parts and a
/// total order (spec §3).
///
/// Every component position is significant: `1.0 != 2`, and `1.0 < 1.0.0`
/// (a shorter prefix is less than any of its extensions).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VersionNumber {
    components: SmallVec<[VersionComponent; 6]>,
}

impl VersionNumber {
    /// Parses a version string.
    ///
    /// Splits on `.` and additionally splits any maximal run of letters
    /// into individual single-letter components, so `1.0rc` tokenizes as
    /// `[1, 0, r, c]`. Empty components, a trailing `.`, and non-alphanumeric
    /// characters are errors.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s.is_empty() {
            return Err(Error::Parse {
                context: format!("version string '{s}'"),
                message: "empty version string".into(),
            });
        }
        if s.ends_with('.') {
            return Err(Error::Parse {
                context: format!("version string '{s}'"),
                message: "trailing '.'".into(),
            });
        }

        let mut components = SmallVec::new();
        for dot_part in s.split('.') {
            if dot_part.is_empty() {
                return Err(Error::Parse {
                    context: format!("version string '{s}'"),
                    message: "empty component between '.'s".into(),
                });
            }
            split_letter_runs(dot_part, s, &mut components)?;
        }

        Ok(Self { components })
    }

    /// The parsed components, in order.
    #[must_use]
    pub fn components(&self) -> &[VersionComponent] {
        &self.components
    }
}

fn split_letter_runs(
    part: &str,
    original: &str,
    out: &mut SmallVec<[VersionComponent; 6]>,
) -> Result<(), Error> {
    let mut digits = String::new();
    let mut letters = String::new();

    let flush_digits = |digits: &mut String, out: &mut SmallVec<[VersionComponent; 6]>| {
        if !digits.is_empty() {
            let n: u64 = digits.parse().unwrap_or(u64::MAX);
            out.push(VersionComponent::Integer(n));
            digits.clear();
        }
    };
    let flush_letters = |letters: &mut String, out: &mut SmallVec<[VersionComponent; 6]>| {
        for c in letters.chars() {
            out.push(VersionComponent::Letter(c));
        }
        letters.clear();
    };

    for c in part.chars() {
        if c.is_ascii_digit() {
            flush_letters(&mut letters, out);
            digits.push(c);
        } else if c.is_ascii_lowercase() {
            flush_digits(&mut digits, out);
            letters.push(c);
        } else {
            return Err(Error::Parse {
                context: format!("version string '{original}'"),
                message: format!("non-alphanumeric character '{c}'"),
            });
        }
    }
    flush_digits(&mut digits, out);
    flush_letters(&mut letters, out);

    Ok(())
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prev_was_letter = false;
        for (i, c) in self.components.iter().enumerate() {
            let is_letter = matches!(c, VersionComponent::Letter(_));
            if i > 0 && !(prev_was_letter && is_letter) {
                write!(f, ".")?;
            }
            write!(f, "{c}")?;
            prev_was_letter = is_letter;
        }
        Ok(())
    }
}

impl FromStr for VersionNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialOrd for VersionNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.components.iter().zip(other.components.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.components.len().cmp(&other.components.len())
    }
}

/// Which version field of a package a [`Constraint`] compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintTarget {
    /// The package's source version.
    Source,
    /// The package's binary version.
    Binary,
}

impl ConstraintTarget {
    const fn letter(self) -> char {
        match self {
            Self::Source => 's',
            Self::Binary => 'b',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            's' => Some(Self::Source),
            'b' => Some(Self::Binary),
            _ => None,
        }
    }
}

/// A comparison operator usable in a [`Constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `<`
    Lt,
}

impl ConstraintOp {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            _ => None,
        }
    }

    fn eval(self, lhs: &VersionNumber, rhs: &VersionNumber) -> bool {
        match self {
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
            Self::Ge => lhs >= rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Lt => lhs < rhs,
        }
    }
}

/// A primitive version predicate: `target op version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Constraint {
    /// Which version field this predicate compares.
    pub target: ConstraintTarget,
    /// The comparison operator.
    pub op: ConstraintOp,
    /// The version being compared against.
    pub version: VersionNumber,
}

impl Constraint {
    /// Evaluates this predicate given a package's source and binary
    /// versions.
    #[must_use]
    pub fn satisfies(&self, source_version: &VersionNumber, binary_version: &VersionNumber) -> bool {
        let actual = match self.target {
            ConstraintTarget::Source => source_version,
            ConstraintTarget::Binary => binary_version,
        };
        self.op.eval(actual, &self.version)
    }
}

/// A constraint formula: a primitive predicate or a boolean combination of
/// two sub-formulas (spec §3, §4.1).
///
/// `None` children denote neutral elements — `true` for `And`, `false` for
/// `Or` — so `(&()())` is the formula `true` and `(|()())` is `false`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    /// A single version predicate.
    Primitive(Constraint),
    /// Logical AND of two optional sub-formulas.
    And(Option<Box<Formula>>, Option<Box<Formula>>),
    /// Logical OR of two optional sub-formulas.
    Or(Option<Box<Formula>>, Option<Box<Formula>>),
}

impl Formula {
    /// The formula that is always true: `And(None, None)`.
    #[must_use]
    pub const fn always_true() -> Self {
        Self::And(None, None)
    }

    /// The formula that is always false: `Or(None, None)`.
    #[must_use]
    pub const fn always_false() -> Self {
        Self::Or(None, None)
    }

    /// Evaluates this formula against a package's source and binary
    /// versions, with short-circuit semantics on neutral-element children.
    #[must_use]
    pub fn satisfies(&self, source_version: &VersionNumber, binary_version: &VersionNumber) -> bool {
        match self {
            Self::Primitive(c) => c.satisfies(source_version, binary_version),
            Self::And(l, r) => match (l, r) {
                (None, None) => true,
                (Some(f), None) | (None, Some(f)) => f.satisfies(source_version, binary_version),
                (Some(l), Some(r)) => {
                    l.satisfies(source_version, binary_version)
                        && r.satisfies(source_version, binary_version)
                }
            },
            Self::Or(l, r) => match (l, r) {
                (None, None) => false,
                (Some(f), None) | (None, Some(f)) => f.satisfies(source_version, binary_version),
                (Some(l), Some(r)) => {
                    l.satisfies(source_version, binary_version)
                        || r.satisfies(source_version, binary_version)
                }
            },
        }
    }

    /// Collects every [`Constraint`] leaf reachable through `And`/`Or`
    /// without evaluating the formula — used by `--show-problems`
    /// diagnostics to list which primitive predicates are in play.
    #[must_use]
    pub fn primitives(&self) -> Vec<&Constraint> {
        let mut out = Vec::new();
        self.collect_primitives(&mut out);
        out
    }

    fn collect_primitives<'a>(&'a self, out: &mut Vec<&'a Constraint>) {
        match self {
            Self::Primitive(c) => out.push(c),
            Self::And(l, r) | Self::Or(l, r) => {
                if let Some(l) = l {
                    l.collect_primitives(out);
                }
                if let Some(r) = r {
                    r.collect_primitives(out);
                }
            }
        }
    }

    /// Parses a formula from its canonical string grammar.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let mut chars = s.char_indices().peekable();
        let (formula, rest) = parse_formula(s, &mut chars)?;
        if !rest.is_empty() {
            return Err(Error::Parse {
                context: format!("formula '{s}'"),
                message: format!("trailing characters '{rest}'"),
            });
        }
        Ok(formula)
    }
}

/// Parses one formula starting at the current byte offset and returns the
/// formula plus the remaining unparsed tail.
fn parse_formula<'a>(
    full: &'a str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'a>>,
) -> Result<(Formula, &'a str), Error> {
    let (start, c) = chars.next().ok_or_else(|| Error::Parse {
        context: format!("formula '{full}'"),
        message: "unexpected end of input".into(),
    })?;
    if c != '(' {
        return Err(Error::Parse {
            context: format!("formula '{full}'"),
            message: format!("expected '(' at byte {start}, found '{c}'"),
        });
    }

    match chars.peek().copied() {
        Some((_, ')')) => {
            chars.next();
            Ok((Formula::always_true(), &full[start + 2..]))
        }
        Some((_, '&')) | Some((_, '|')) => {
            let (_, op_char) = chars.next().unwrap();
            let left = parse_optional_child(full, chars)?;
            let right = parse_optional_child(full, chars)?;
            let (close_idx, close_c) = chars.next().ok_or_else(|| Error::Parse {
                context: format!("formula '{full}'"),
                message: "unexpected end of input, expected ')'".into(),
            })?;
            if close_c != ')' {
                return Err(Error::Parse {
                    context: format!("formula '{full}'"),
                    message: format!("expected ')' at byte {close_idx}, found '{close_c}'"),
                });
            }
            let formula = if op_char == '&' {
                Formula::And(left, right)
            } else {
                Formula::Or(left, right)
            };
            Ok((formula, &full[close_idx + 1..]))
        }
        _ => {
            let body_start = start + 1;
            let close_idx = full[body_start..]
                .find(')')
                .map(|i| body_start + i)
                .ok_or_else(|| Error::Parse {
                    context: format!("formula '{full}'"),
                    message: "unterminated primitive".into(),
                })?;
            let body = &full[body_start..close_idx];
            let primitive = parse_primitive_body(full, body)?;
            for _ in 0..=body.chars().count() {
                chars.next();
            }
            Ok((Formula::Primitive(primitive), &full[close_idx + 1..]))
        }
    }
}

/// Parses one child slot: either `()` consumed whole as "absent", or a
/// nested formula.
fn parse_optional_child<'a>(
    full: &'a str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'a>>,
) -> Result<Option<Box<Formula>>, Error> {
    let mut lookahead = chars.clone();
    if let (Some((_, '(')), Some((_, ')'))) = (lookahead.next(), lookahead.next()) {
        chars.next();
        chars.next();
        return Ok(None);
    }
    let (formula, _rest) = parse_formula(full, chars)?;
    Ok(Some(Box::new(formula)))
}

fn parse_primitive_body(full: &str, body: &str) -> Result<Constraint, Error> {
    let op_len = if body.len() >= 2 && matches!(&body[..2], "==" | "!=" | ">=" | "<=") {
        2
    } else if body.starts_with('>') || body.starts_with('<') {
        1
    } else {
        return Err(Error::Parse {
            context: format!("formula '{full}'"),
            message: format!("unrecognized operator in '{body}'"),
        });
    };
    let op = ConstraintOp::from_str(&body[..op_len]).ok_or_else(|| Error::Parse {
        context: format!("formula '{full}'"),
        message: format!("unrecognized operator in '{body}'"),
    })?;

    let rest = &body[op_len..];
    let mut parts = rest.splitn(2, ':');
    let target_str = parts.next().unwrap_or_default();
    let version_str = parts.next().ok_or_else(|| Error::Parse {
        context: format!("formula '{full}'"),
        message: format!("missing ':version' in '{body}'"),
    })?;

    if target_str.len() != 1 {
        return Err(Error::Parse {
            context: format!("formula '{full}'"),
            message: format!("invalid target '{target_str}'"),
        });
    }
    let target = ConstraintTarget::from_letter(target_str.chars().next().unwrap()).ok_or_else(|| {
        Error::Parse {
            context: format!("formula '{full}'"),
            message: format!("invalid target '{target_str}'"),
        }
    })?;
    let version = VersionNumber::parse(version_str)?;

    Ok(Constraint {
        target,
        op,
        version,
    })
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(c) => {
                write!(f, "({}{}:{})", c.op.as_str(), c.target.letter(), c.version)
            }
            Self::And(l, r) => {
                write!(f, "(&")?;
                write_child(f, l)?;
                write_child(f, r)?;
                write!(f, ")")
            }
            Self::Or(l, r) => {
                write!(f, "(|")?;
                write_child(f, l)?;
                write_child(f, r)?;
                write!(f, ")")
            }
        }
    }
}

fn write_child(f: &mut fmt::Formatter<'_>, child: &Option<Box<Formula>>) -> fmt::Result {
    match child {
        Some(formula) => write!(f, "{formula}"),
        None => write!(f, "()"),
    }
}

impl FromStr for Formula {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> VersionNumber {
        VersionNumber::parse(s).unwrap()
    }

    #[test]
    fn parses_simple_integer_version() {
        let ver = v("1.2.3");
        assert_eq!(ver.to_string(), "1.2.3");
    }

    #[test]
    fn splits_letter_runs_from_digits() {
        let ver = v("1.0rc1");
        assert_eq!(
            ver.components(),
            &[
                VersionComponent::Integer(1),
                VersionComponent::Integer(0),
                VersionComponent::Letter('r'),
                VersionComponent::Letter('c'),
                VersionComponent::Integer(1),
            ]
        );
    }

    #[test]
    fn empty_component_is_an_error() {
        assert!(VersionNumber::parse("1..2").is_err());
        assert!(VersionNumber::parse("1.").is_err());
        assert!(VersionNumber::parse("").is_err());
    }

    #[test]
    fn non_alphanumeric_is_an_error() {
        assert!(VersionNumber::parse("1.2-3").is_err());
    }

    #[test]
    fn shorter_prefix_is_less_than_extension() {
        assert!(v("1.0") < v("1.0.0"));
        assert!(v("1") < v("1.0"));
    }

    #[test]
    fn every_position_is_significant() {
        assert_ne!(v("1.0"), v("2"));
        assert!(v("1.0") < v("2"));
    }

    #[test]
    fn letters_compare_greater_than_integers_at_same_position() {
        assert!(v("1.a") > v("1.9"));
    }

    #[test]
    fn total_order_examples() {
        assert!(v("1.0.0") < v("1.0.1"));
        assert!(v("1.9") < v("1.10"));
        assert!(v("2.0") > v("1.99"));
    }

    #[test]
    fn formula_round_trips_through_display() {
        for s in [
            "(&()())",
            "(|()())",
            "(==b:1.0)",
            "(&(==b:1.0)(>=s:2.0))",
            "(|(==b:1.0)())",
        ] {
            let parsed = Formula::parse(s).unwrap();
            assert_eq!(parsed.to_string(), s);
        }
    }

    #[test]
    fn and_with_both_none_is_true() {
        let f = Formula::always_true();
        assert!(f.satisfies(&v("1.0"), &v("1.0")));
    }

    #[test]
    fn or_with_both_none_is_false() {
        let f = Formula::always_false();
        assert!(!f.satisfies(&v("1.0"), &v("1.0")));
    }

    #[test]
    fn and_with_one_child_delegates_to_it() {
        let f = Formula::parse("(&(==b:1.0)())").unwrap();
        assert!(f.satisfies(&v("1.0"), &v("1.0")));
        assert!(!f.satisfies(&v("1.0"), &v("2.0")));
    }

    #[test]
    fn or_with_one_child_delegates_to_it() {
        let f = Formula::parse("(|()(==b:1.0))").unwrap();
        assert!(f.satisfies(&v("1.0"), &v("1.0")));
        assert!(!f.satisfies(&v("1.0"), &v("2.0")));
    }

    #[test]
    fn constraint_satisfies_checks_the_right_target() {
        let ge = Formula::parse("(>=b:1.0)").unwrap();
        assert!(ge.satisfies(&v("0.1"), &v("1.5")));
        assert!(!ge.satisfies(&v("5.0"), &v("0.5")));
    }

    #[test]
    fn primitives_collects_all_leaves() {
        let f = Formula::parse("(&(==b:1.0)(>=s:2.0))").unwrap();
        assert_eq!(f.primitives().len(), 2);
    }

    proptest::proptest! {
        #[test]
        fn formula_parse_display_round_trip(
            a in 0u64..50, b in 0u64..50, op_idx in 0usize..6, target_idx in 0usize..2,
        ) {
            let op = [
                ConstraintOp::Eq, ConstraintOp::Ne, ConstraintOp::Ge,
                ConstraintOp::Le, ConstraintOp::Gt, ConstraintOp::Lt,
            ][op_idx];
            let target = [ConstraintTarget::Source, ConstraintTarget::Binary][target_idx];
            let s = format!("({}{}:{a}.{b})", op.as_str(), target.letter());
            let parsed = Formula::parse(&s).unwrap();
            proptest::prop_assert_eq!(parsed.to_string(), s);
        }
    }
}
