// Copyright 2025 Eric Jingryd (tidynest@proton.me)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! src/core/parser.rs
//!
//! XKB source parser
//!
//! Turns keymap source text into [`XkbFile`] trees. It handles:
//! - Simple sections (`xkb_keycodes`, `xkb_types`, `xkb_compatibility`,
//!   `xkb_symbols`) and composite ones (`xkb_keymap`, `xkb_semantics`,
//!   `xkb_layout`)
//! - Map flags in front of a section keyword (`default partial ...`)
//! - `//`, `#` and `/* */` comments
//! - Merge-mode prefixes and include statements with `+`/`|` chains
//!
//! # Architecture
//! The parser uses nom combinators. Every token parser skips leading
//! whitespace and comments through [`lex`], so the grammar rules read like
//! the grammar itself. Keywords are matched case-insensitively. Geometry
//! bodies are skipped as balanced blocks since geometry is never compiled.
//!
//! Values are kept as unresolved [`Expr`] trees; keysym names, modifier
//! names and action names are looked up later by the section compilers.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while_m_n},
    character::complete::{anychar, char, digit1, hex_digit1, multispace1, not_line_ending, satisfy},
    combinator::{map, map_res, opt, recognize, value},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    IResult, Parser,
};
use thiserror::Error;
use tracing::debug;

use crate::core::ast::{
    BinaryOp, Expr, IncludeStmt, IncludeTerm, Stmt, UnaryOp, VarDef, XkbFile,
};
use crate::core::types::{FileType, KeyName, MapFlags, MergeMode};

/// Parse errors with line number context
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Parse error on line {line}: {message}")]
    InvalidSyntax { line: usize, message: String },

    #[error("Illegal include statement \"{stmt}\" on line {line}")]
    IllegalInclude { line: usize, stmt: String },
}

type PResult<'a, T> = IResult<&'a str, T>;

/// Parse a complete source text
///
/// # Arguments
/// * `text` - Source holding any number of sections
///
/// # Returns
/// The top-level sections in source order, or the first syntax error
///
/// # Example
/// ```ignore
/// let files = parse_source("xkb_keycodes \"min\" { <ESC> = 9; };")?;
/// assert_eq!(files[0].stmts.len(), 1);
/// ```
pub fn parse_source(text: &str) -> Result<Vec<XkbFile>, ParseError> {
    let mut files = Vec::new();
    let mut input = text;
    loop {
        let (rest, ()) = skip(input).map_err(|e| to_parse_error(text, e))?;
        if rest.is_empty() {
            break;
        }
        let (rest, file) = section(rest).map_err(|e| to_parse_error(text, e))?;
        files.push(file);
        input = rest;
    }
    debug!(sections = files.len(), "parsed source");
    Ok(files)
}

fn line_of(text: &str, rest: &str) -> usize {
    let offset = text.len().saturating_sub(rest.len());
    text[..offset].matches('\n').count() + 1
}

fn to_parse_error(text: &str, err: nom::Err<Error<&str>>) -> ParseError {
    let err = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => {
            return ParseError::InvalidSyntax {
                line: text.lines().count().max(1),
                message: "unexpected end of input".to_string(),
            }
        }
    };
    let line = line_of(text, err.input);
    if err.code == ErrorKind::Verify {
        let stmt = string_body(err.input)
            .map(|(_, s)| s)
            .unwrap_or_default();
        return ParseError::IllegalInclude { line, stmt };
    }
    let (rest, ()) = skip(err.input).unwrap_or((err.input, ()));
    let message = if rest.is_empty() {
        "unexpected end of input".to_string()
    } else {
        let snippet: String = rest
            .lines()
            .next()
            .unwrap_or_default()
            .chars()
            .take(24)
            .collect();
        format!("unexpected `{}`", snippet.trim_end())
    };
    ParseError::InvalidSyntax { line, message }
}

// ============================================================================
// Tokens
// ============================================================================

fn comment(input: &str) -> PResult<'_, &str> {
    alt((
        recognize(pair(alt((tag("//"), tag("#"))), not_line_ending)),
        recognize((tag("/*"), take_until("*/"), tag("*/"))),
    ))
    .parse(input)
}

/// Skip whitespace and comments
fn skip(input: &str) -> PResult<'_, ()> {
    value((), many0(alt((multispace1, comment)))).parse(input)
}

/// Run `parser` after skipping whitespace and comments
fn lex<'a, O, P>(parser: P) -> impl Parser<&'a str, Output = O, Error = Error<&'a str>>
where
    P: Parser<&'a str, Output = O, Error = Error<&'a str>>,
{
    preceded(skip, parser)
}

fn punct<'a>(c: char) -> impl Parser<&'a str, Output = char, Error = Error<&'a str>> {
    lex(char(c))
}

fn ident(input: &str) -> PResult<'_, &str> {
    lex(recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    )))
    .parse(input)
}

/// Case-insensitive keyword
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    move |input| {
        let (rest, word) = ident(input)?;
        if word.eq_ignore_ascii_case(kw) {
            Ok((rest, word))
        } else {
            Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)))
        }
    }
}

fn integer(input: &str) -> PResult<'_, i64> {
    lex(alt((
        map_res(preceded(alt((tag("0x"), tag("0X"))), hex_digit1), |h: &str| {
            i64::from_str_radix(h, 16)
        }),
        map_res(digit1, |d: &str| d.parse::<i64>()),
    )))
    .parse(input)
}

fn escape(input: &str) -> PResult<'_, char> {
    alt((
        value('\n', char('n')),
        value('\t', char('t')),
        value('\r', char('r')),
        value('\u{8}', char('b')),
        value('\u{c}', char('f')),
        value('\u{b}', char('v')),
        value('\u{1b}', char('e')),
        map_res(take_while_m_n(1, 3, |c: char| c.is_digit(8)), |o: &str| {
            u8::from_str_radix(o, 8).map(char::from)
        }),
        anychar,
    ))
    .parse(input)
}

/// A string literal without leading whitespace
fn string_body(input: &str) -> PResult<'_, String> {
    let (mut rest, _) = char('"').parse(input)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            None => return Err(nom::Err::Error(Error::new(rest, ErrorKind::Char))),
            Some('"') => return Ok((chars.as_str(), out)),
            Some('\\') => {
                let (next, c) = escape(chars.as_str())?;
                out.push(c);
                rest = next;
            }
            Some(c) => {
                out.push(c);
                rest = chars.as_str();
            }
        }
    }
}

fn string_lit(input: &str) -> PResult<'_, String> {
    lex(string_body).parse(input)
}

fn key_name(input: &str) -> PResult<'_, KeyName> {
    lex(map(
        delimited(
            char('<'),
            take_while(|c: char| c != '>' && !c.is_whitespace()),
            char('>'),
        ),
        KeyName::new,
    ))
    .parse(input)
}

/// Keysym in a list or an interpret match: a name or a numeric code
fn keysym(input: &str) -> PResult<'_, String> {
    alt((
        map(ident, str::to_string),
        map(integer, |n| {
            if (0..10).contains(&n) {
                n.to_string()
            } else {
                format!("0x{:x}", n)
            }
        }),
    ))
    .parse(input)
}

// ============================================================================
// Expressions
// ============================================================================

/// Full expression, `a = b` binding loosest
fn expr(input: &str) -> PResult<'_, Expr> {
    let (input, left) = additive(input)?;
    let (input, assign) = opt(punct('=')).parse(input)?;
    if assign.is_none() {
        return Ok((input, left));
    }
    let (input, right) = expr(input)?;
    Ok((input, Expr::binary(BinaryOp::Assign, left, right)))
}

fn additive(input: &str) -> PResult<'_, Expr> {
    let (mut input, mut left) = multiplicative(input)?;
    loop {
        let (rest, op) = opt(alt((
            value(BinaryOp::Add, punct('+')),
            value(BinaryOp::Subtract, punct('-')),
        )))
        .parse(input)?;
        let Some(op) = op else {
            return Ok((input, left));
        };
        let (rest, right) = multiplicative(rest)?;
        left = Expr::binary(op, left, right);
        input = rest;
    }
}

fn multiplicative(input: &str) -> PResult<'_, Expr> {
    let (mut input, mut left) = unary(input)?;
    loop {
        let (rest, op) = opt(alt((
            value(BinaryOp::Multiply, punct('*')),
            value(BinaryOp::Divide, punct('/')),
        )))
        .parse(input)?;
        let Some(op) = op else {
            return Ok((input, left));
        };
        let (rest, right) = unary(rest)?;
        left = Expr::binary(op, left, right);
        input = rest;
    }
}

fn unary(input: &str) -> PResult<'_, Expr> {
    alt((
        map(preceded(punct('-'), unary), |e| Expr::unary(UnaryOp::Negate, e)),
        map(preceded(punct('+'), unary), |e| Expr::unary(UnaryOp::Plus, e)),
        map(preceded(punct('!'), unary), |e| Expr::unary(UnaryOp::Not, e)),
        map(preceded(punct('~'), unary), |e| Expr::unary(UnaryOp::Invert, e)),
        primary,
    ))
    .parse(input)
}

fn primary(input: &str) -> PResult<'_, Expr> {
    alt((
        delimited(punct('('), expr, punct(')')),
        map(string_lit, Expr::String),
        map(key_name, Expr::KeyName),
        map(integer, Expr::Integer),
        bracket_list,
        reference,
    ))
    .parse(input)
}

fn call_args(input: &str) -> PResult<'_, Vec<Expr>> {
    delimited(
        punct('('),
        terminated(separated_list0(punct(','), expr), opt(punct(','))),
        punct(')'),
    )
    .parse(input)
}

/// `Name(args)`
fn action_call(input: &str) -> PResult<'_, Expr> {
    let (input, name) = ident(input)?;
    let (input, args) = call_args(input)?;
    Ok((
        input,
        Expr::Action {
            name: name.to_string(),
            args,
        },
    ))
}

/// `[ a, A ]` or `[ SetMods(...), NoAction() ]`
fn bracket_list(input: &str) -> PResult<'_, Expr> {
    delimited(
        punct('['),
        alt((
            map(separated_list1(punct(','), action_call), Expr::ActionList),
            map(separated_list0(punct(','), keysym), Expr::KeysymList),
        )),
        punct(']'),
    )
    .parse(input)
}

/// An identifier, an action call or a field reference
fn reference(input: &str) -> PResult<'_, Expr> {
    let (input, name) = ident(input)?;
    if let (rest, Some(args)) = opt(call_args).parse(input)? {
        return Ok((
            rest,
            Expr::Action {
                name: name.to_string(),
                args,
            },
        ));
    }
    lhs_tail(name, input)
}

fn lhs_tail<'a>(name: &'a str, input: &'a str) -> PResult<'a, Expr> {
    let (input, field) = opt(preceded(punct('.'), ident)).parse(input)?;
    let (input, index) = opt(delimited(punct('['), expr, punct(']'))).parse(input)?;
    let (element, field) = match field {
        Some(field) => (Some(name.to_string()), field.to_string()),
        None => (None, name.to_string()),
    };
    let expr = match (element, index) {
        (element, Some(index)) => Expr::ArrayRef {
            element,
            field,
            index: Box::new(index),
        },
        (Some(element), None) => Expr::FieldRef { element, field },
        (None, None) => Expr::Ident(field),
    };
    Ok((input, expr))
}

/// Assignment target: `field`, `element.field`, optionally indexed
fn lhs(input: &str) -> PResult<'_, Expr> {
    let (input, name) = ident(input)?;
    lhs_tail(name, input)
}

// ============================================================================
// Statements
// ============================================================================

fn var_def(name: Expr, value: Expr) -> VarDef {
    VarDef {
        merge: MergeMode::Default,
        name: Some(name),
        value: Some(value),
    }
}

/// `name = value;`, `name;` or `!name;`
fn var_decl(input: &str) -> PResult<'_, VarDef> {
    alt((
        map(terminated(preceded(punct('!'), lhs), punct(';')), |name| {
            var_def(name, Expr::Boolean(false))
        }),
        map(
            terminated((lhs, opt(preceded(punct('='), expr))), punct(';')),
            |(name, value)| var_def(name, value.unwrap_or(Expr::Boolean(true))),
        ),
    ))
    .parse(input)
}

fn var_block(input: &str) -> PResult<'_, Vec<VarDef>> {
    terminated(delimited(punct('{'), many0(var_decl), punct('}')), punct(';')).parse(input)
}

/// One comma-separated entry of a key body
fn symbols_var(input: &str) -> PResult<'_, VarDef> {
    alt((
        map(bracket_list, |list| VarDef {
            merge: MergeMode::Default,
            name: None,
            value: Some(list),
        }),
        map(preceded(punct('!'), lhs), |name| {
            var_def(name, Expr::Boolean(false))
        }),
        map((lhs, opt(preceded(punct('='), expr))), |(name, value)| {
            var_def(name, value.unwrap_or(Expr::Boolean(true)))
        }),
    ))
    .parse(input)
}

fn merge_mode(input: &str) -> PResult<'_, MergeMode> {
    alt((
        value(MergeMode::Default, keyword("include")),
        value(MergeMode::Augment, keyword("augment")),
        value(MergeMode::Override, keyword("override")),
        value(MergeMode::Replace, keyword("replace")),
        value(MergeMode::AltForm, keyword("alternate")),
    ))
    .parse(input)
}

fn keycode_decl(input: &str) -> PResult<'_, Vec<Stmt>> {
    map(
        (key_name, punct('='), integer, punct(';')),
        |(name, _, value, _)| {
            vec![Stmt::Keycode {
                merge: MergeMode::Default,
                name,
                value,
            }]
        },
    )
    .parse(input)
}

fn alias_decl(input: &str) -> PResult<'_, Vec<Stmt>> {
    map(
        (keyword("alias"), key_name, punct('='), key_name, punct(';')),
        |(_, alias, _, real, _)| {
            vec![Stmt::KeyAlias {
                merge: MergeMode::Default,
                alias,
                real,
            }]
        },
    )
    .parse(input)
}

fn vmod_decl(input: &str) -> PResult<'_, Vec<Stmt>> {
    map(
        delimited(
            keyword("virtual_modifiers"),
            separated_list1(punct(','), pair(ident, opt(preceded(punct('='), expr)))),
            punct(';'),
        ),
        |defs| {
            defs.into_iter()
                .map(|(name, value)| Stmt::VMod {
                    merge: MergeMode::Default,
                    name: name.to_string(),
                    value,
                })
                .collect()
        },
    )
    .parse(input)
}

fn interp_decl(input: &str) -> PResult<'_, Vec<Stmt>> {
    map(
        (
            keyword("interpret"),
            keysym,
            opt(preceded(punct('+'), expr)),
            var_block,
        ),
        |(_, sym, predicate, body)| {
            vec![Stmt::Interp {
                merge: MergeMode::Default,
                sym,
                predicate,
                body,
            }]
        },
    )
    .parse(input)
}

fn type_decl(input: &str) -> PResult<'_, Vec<Stmt>> {
    map((keyword("type"), string_lit, var_block), |(_, name, body)| {
        vec![Stmt::KeyType {
            merge: MergeMode::Default,
            name,
            body,
        }]
    })
    .parse(input)
}

fn symbols_decl(input: &str) -> PResult<'_, Vec<Stmt>> {
    map(
        (
            keyword("key"),
            key_name,
            delimited(
                punct('{'),
                terminated(separated_list0(punct(','), symbols_var), opt(punct(','))),
                punct('}'),
            ),
            punct(';'),
        ),
        |(_, key_name, body, _)| {
            vec![Stmt::Symbols {
                merge: MergeMode::Default,
                key_name,
                body,
            }]
        },
    )
    .parse(input)
}

fn modmap_decl(input: &str) -> PResult<'_, Vec<Stmt>> {
    map(
        (
            alt((keyword("modifier_map"), keyword("mod_map"), keyword("modmap"))),
            ident,
            delimited(
                punct('{'),
                terminated(separated_list0(punct(','), expr), opt(punct(','))),
                punct('}'),
            ),
            punct(';'),
        ),
        |(_, modifier, keys, _)| {
            vec![Stmt::ModMap {
                merge: MergeMode::Default,
                modifier: modifier.to_string(),
                keys,
            }]
        },
    )
    .parse(input)
}

fn group_compat_decl(input: &str) -> PResult<'_, Vec<Stmt>> {
    map(
        (keyword("group"), integer, punct('='), expr, punct(';')),
        |(_, group, _, value, _)| {
            vec![Stmt::GroupCompat {
                merge: MergeMode::Default,
                group,
                value,
            }]
        },
    )
    .parse(input)
}

fn indicator_map_decl(input: &str) -> PResult<'_, Vec<Stmt>> {
    map(
        (keyword("indicator"), string_lit, var_block),
        |(_, name, body)| {
            vec![Stmt::IndicatorMap {
                merge: MergeMode::Default,
                name,
                body,
            }]
        },
    )
    .parse(input)
}

fn indicator_name_decl(input: &str) -> PResult<'_, Vec<Stmt>> {
    map(
        (
            opt(keyword("virtual")),
            keyword("indicator"),
            integer,
            punct('='),
            expr,
            punct(';'),
        ),
        |(is_virtual, _, index, _, name, _)| {
            vec![Stmt::IndicatorName {
                merge: MergeMode::Default,
                index,
                name,
                is_virtual: is_virtual.is_some(),
            }]
        },
    )
    .parse(input)
}

fn var_stmt(input: &str) -> PResult<'_, Vec<Stmt>> {
    map(var_decl, |def| vec![Stmt::Var(def)]).parse(input)
}

/// Split an include string such as `pc+us(intl):2|extra` into terms
///
/// The first term takes the statement's merge mode, later ones take the
/// operator in front of them (`|` augment, `+` override). An empty term,
/// as in `""`, `"|us"` or `"us|"`, refers back to the including section.
/// At most one such self reference is allowed.
pub fn parse_include(merge: MergeMode, text: &str) -> Option<IncludeStmt> {
    let mut terms = Vec::new();
    let mut term_merge = merge;
    let mut rest = text;
    let mut have_self = false;
    loop {
        let end = rest.find(['+', '|']).unwrap_or(rest.len());
        let (spec, tail) = rest.split_at(end);
        let (spec, modifier) = match spec.split_once(':') {
            Some((spec, group)) => (spec, Some(group.trim().parse::<u32>().ok()?)),
            None => match group_suffix(spec) {
                Some((spec, group)) => (spec, Some(group)),
                None => (spec, None),
            },
        };
        let (file, map) = match spec.split_once('(') {
            Some((file, map)) => (file, Some(map.strip_suffix(')')?)),
            None => (spec, None),
        };
        if map.is_some_and(|m| m.contains(['(', ')'])) {
            return None;
        }
        let file = (!file.is_empty()).then(|| file.to_string());
        let map = map.map(str::to_string);
        if file.is_none() && map.is_none() {
            if have_self {
                return None;
            }
            have_self = true;
        }
        terms.push(IncludeTerm {
            merge: term_merge,
            file,
            map,
            modifier,
        });

        let mut ops = tail.chars();
        match ops.next() {
            Some('|') => term_merge = MergeMode::Augment,
            Some(_) => term_merge = MergeMode::Override,
            None => break,
        }
        rest = ops.as_str();
    }
    Some(IncludeStmt {
        merge,
        stmt: text.to_string(),
        terms,
    })
}

/// Trailing `(N)` after a map name, as in `us(intl)(2)`
fn group_suffix(spec: &str) -> Option<(&str, u32)> {
    let inner = spec.strip_suffix(')')?;
    let open = inner.rfind('(')?;
    let head = &inner[..open];
    if !head.ends_with(')') {
        return None;
    }
    let group = inner[open + 1..].trim().parse::<u32>().ok()?;
    Some((head, group))
}

/// One statement of a section body, with its optional merge prefix
fn statement(input: &str) -> PResult<'_, Vec<Stmt>> {
    let (input, merge) = opt(merge_mode).parse(input)?;
    if let Some(merge) = merge {
        let (after_ws, ()) = skip(input)?;
        if let Ok((rest, text)) = string_body(after_ws) {
            return match parse_include(merge, &text) {
                Some(include) => Ok((rest, vec![Stmt::Include(include)])),
                None => Err(nom::Err::Failure(Error::new(after_ws, ErrorKind::Verify))),
            };
        }
        if merge == MergeMode::Default {
            return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag)));
        }
    }
    let (rest, mut stmts) = alt((
        keycode_decl,
        alias_decl,
        vmod_decl,
        interp_decl,
        type_decl,
        symbols_decl,
        modmap_decl,
        group_compat_decl,
        indicator_map_decl,
        indicator_name_decl,
        var_stmt,
    ))
    .parse(input)?;
    if let Some(merge) = merge {
        for stmt in &mut stmts {
            stmt.set_merge(merge);
        }
    }
    Ok((rest, stmts))
}

// ============================================================================
// Sections
// ============================================================================

fn map_flag(input: &str) -> PResult<'_, u16> {
    let (rest, word) = ident(input)?;
    MapFlags::NAMES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(word))
        .map(|(_, flag)| (rest, *flag))
        .ok_or(nom::Err::Error(Error::new(input, ErrorKind::Tag)))
}

fn section_keyword(input: &str) -> PResult<'_, FileType> {
    let (rest, word) = ident(input)?;
    let file_type = match word.to_ascii_lowercase().as_str() {
        "xkb_keymap" => FileType::Keymap,
        "xkb_semantics" => FileType::Semantics,
        "xkb_layout" => FileType::Layout,
        "xkb_keycodes" => FileType::Keycodes,
        "xkb_types" => FileType::Types,
        "xkb_compatibility" | "xkb_compatibility_map" | "xkb_compat" | "xkb_compat_map" => {
            FileType::Compat
        }
        "xkb_symbols" => FileType::Symbols,
        "xkb_geometry" => FileType::Geometry,
        _ => return Err(nom::Err::Error(Error::new(input, ErrorKind::Tag))),
    };
    Ok((rest, file_type))
}

/// Skip a `{ ... }` block with nested braces, strings and comments
fn skip_block(input: &str) -> PResult<'_, ()> {
    let (mut rest, _) = punct('{').parse(input)?;
    let mut depth = 1usize;
    loop {
        let (after, ()) = skip(rest)?;
        rest = after;
        if rest.starts_with('"') {
            let (after, _) = string_body(rest)?;
            rest = after;
            continue;
        }
        let mut chars = rest.chars();
        match chars.next() {
            None => return Err(nom::Err::Error(Error::new(rest, ErrorKind::Eof))),
            Some('{') => depth += 1,
            Some('}') => {
                depth -= 1;
                if depth == 0 {
                    return Ok((chars.as_str(), ()));
                }
            }
            Some(_) => {}
        }
        rest = chars.as_str();
    }
}

fn statement_block(input: &str) -> PResult<'_, Vec<Stmt>> {
    map(
        delimited(punct('{'), many0(statement), punct('}')),
        |groups| groups.into_iter().flatten().collect(),
    )
    .parse(input)
}

/// `flags xkb_<kind> "name" { ... };`
fn section(input: &str) -> PResult<'_, XkbFile> {
    let (input, flags) = many0(map_flag).parse(input)?;
    let (input, file_type) = section_keyword(input)?;
    let (input, name) = opt(string_lit).parse(input)?;

    let mut file = XkbFile::new(file_type, name.as_deref().unwrap_or_default());
    for flag in flags {
        file.flags.insert(flag);
    }

    let input = if file_type.is_composite() {
        let (mut input, _) = punct('{').parse(input)?;
        loop {
            if let (rest, Some(_)) = opt(punct('}')).parse(input)? {
                break rest;
            }
            let (rest, inner) = section(input)?;
            file.sections.push(inner);
            input = rest;
        }
    } else if file_type == FileType::Geometry {
        skip_block(input)?.0
    } else {
        let (input, stmts) = statement_block(input)?;
        file.stmts = stmts;
        input
    };
    let (input, _) = opt(punct(';')).parse(input)?;
    Ok((input, file))
}
