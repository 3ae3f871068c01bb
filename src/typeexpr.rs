//! Parser for Go type expressions.
//!
//! Parsing runs in two stages. Winnow combinators first turn the text into a
//! tree of `Raw*` nodes that borrow their spelling from the source; the
//! resolver then interns descriptors bottom-up, so two spellings of the same
//! type (`[]byte` and `[]uint8`, or interfaces listing their methods in
//! different orders) parse to the same [`Type`]. Name lookups and the other
//! semantic checks happen in the second stage and report the span of the
//! offending node.

use std::collections::HashSet;

use derive_more::Display;
use gossamer_runtime::types::{
    ChanDir, Field, Method, array_type, builtins, chan_type, func_type, interface_type,
    is_exported, map_type, ptr_type, slice_type, struct_type,
};
use gossamer_runtime::{Kind, RuntimeConfig, Type};
use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat, separated};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::stream::Offset;
use winnow::token::{one_of, take_while};

use crate::syntax::{any_string_lit, hspace, ident, int_lit, ws};

/// Package path given to unexported field and method names.
const LOCAL_PKG: &str = "main";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Display)]
#[display("{message} at offset {}", span.start)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl std::error::Error for ParseError {}

// ============================================================================
// Raw (unresolved) syntax tree
// ============================================================================

#[derive(Debug)]
struct RawType<'a> {
    /// The source text of this node.
    text: &'a str,
    kind: RawKind<'a>,
}

#[derive(Debug)]
enum RawKind<'a> {
    /// A predeclared name, possibly package-qualified.
    Name(&'a str),
    Slice(Box<RawType<'a>>),
    Array {
        len: &'a str,
        elem: Box<RawType<'a>>,
    },
    Ptr(Box<RawType<'a>>),
    Chan(ChanDir, Box<RawType<'a>>),
    Map(Box<RawType<'a>>, Box<RawType<'a>>),
    Func(RawSignature<'a>),
    Struct(Vec<RawField<'a>>),
    Interface(Vec<RawElem<'a>>),
}

#[derive(Debug)]
struct RawSignature<'a> {
    params: Vec<RawParam<'a>>,
    results: Vec<RawType<'a>>,
}

#[derive(Debug)]
struct RawParam<'a> {
    /// The `...` of a variadic parameter.
    ellipsis: Option<&'a str>,
    ty: RawType<'a>,
}

/// A field declaration. No names means an embedded field.
#[derive(Debug)]
struct RawField<'a> {
    names: Vec<&'a str>,
    ty: RawType<'a>,
    tag: String,
}

#[derive(Debug)]
enum RawElem<'a> {
    Method {
        name: &'a str,
        sig: RawSignature<'a>,
        text: &'a str,
    },
    Embed(RawType<'a>),
}

// ============================================================================
// Winnow parsers
// ============================================================================

fn expected(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(what))
}

fn raw_type<'a>(input: &mut &'a str) -> ModalResult<RawType<'a>> {
    raw_kind
        .with_taken()
        .map(|(kind, text)| RawType { text, kind })
        .parse_next(input)
}

/// A type that must follow what was already parsed.
fn required_type<'a>(input: &mut &'a str) -> ModalResult<RawType<'a>> {
    ws.parse_next(input)?;
    cut_err(raw_type).context(expected("type")).parse_next(input)
}

fn close(token: char, what: &'static str) -> impl FnMut(&mut &str) -> ModalResult<()> {
    move |input: &mut &str| {
        ws.parse_next(input)?;
        cut_err(token).context(expected(what)).void().parse_next(input)
    }
}

fn raw_kind<'a>(input: &mut &'a str) -> ModalResult<RawKind<'a>> {
    if input.starts_with('[') {
        ('[', ws).parse_next(input)?;
        if opt(']').parse_next(input)?.is_some() {
            return Ok(RawKind::Slice(Box::new(required_type(input)?)));
        }
        let len = cut_err(take_while(1.., |c: char| c.is_alphanumeric() || c == '_'))
            .context(expected("array length"))
            .parse_next(input)?;
        close(']', "`]`").parse_next(input)?;
        let elem = Box::new(required_type(input)?);
        return Ok(RawKind::Array { len, elem });
    }
    if input.starts_with('*') {
        '*'.parse_next(input)?;
        return Ok(RawKind::Ptr(Box::new(required_type(input)?)));
    }
    if input.starts_with('(') {
        '('.parse_next(input)?;
        let inner = required_type(input)?;
        close(')', "`)`").parse_next(input)?;
        return Ok(inner.kind);
    }
    if input.starts_with("<-") {
        ("<-", ws).parse_next(input)?;
        cut_err(ident.verify(|word: &str| word == "chan"))
            .context(expected("`chan`"))
            .parse_next(input)?;
        return Ok(RawKind::Chan(ChanDir::Recv, Box::new(required_type(input)?)));
    }

    let name = (ident, opt(('.', ident))).take().parse_next(input)?;
    match name {
        "chan" => {
            ws.parse_next(input)?;
            let dir = match opt("<-").parse_next(input)? {
                Some(_) => ChanDir::Send,
                None => ChanDir::Both,
            };
            Ok(RawKind::Chan(dir, Box::new(required_type(input)?)))
        }
        "map" => {
            ws.parse_next(input)?;
            cut_err('[').context(expected("`[`")).parse_next(input)?;
            let key = Box::new(required_type(input)?);
            close(']', "`]`").parse_next(input)?;
            Ok(RawKind::Map(key, Box::new(required_type(input)?)))
        }
        "func" => {
            ws.parse_next(input)?;
            let sig = cut_err(signature).context(expected("`(`")).parse_next(input)?;
            Ok(RawKind::Func(sig))
        }
        "struct" => Ok(RawKind::Struct(struct_body(input)?)),
        "interface" => Ok(RawKind::Interface(interface_body(input)?)),
        _ => Ok(RawKind::Name(name)),
    }
}

fn param<'a>(input: &mut &'a str) -> ModalResult<RawParam<'a>> {
    let ellipsis = opt("...").parse_next(input)?;
    let ty = match ellipsis {
        Some(_) => required_type(input)?,
        None => raw_type(input)?,
    };
    Ok(RawParam { ellipsis, ty })
}

/// `(T, ...)`, with an optional trailing comma.
fn type_list<'a, T>(
    item: impl FnMut(&mut &'a str) -> ModalResult<T>,
) -> impl FnMut(&mut &'a str) -> ModalResult<Vec<T>> {
    let mut list = delimited(
        ('(', ws),
        separated(0.., delimited(ws, item, ws), ','),
        (ws, opt(','), close(')', "`)`")),
    );
    move |input: &mut &'a str| {
        let items: Vec<T> = list.parse_next(input)?;
        Ok(items)
    }
}

/// `(params) results`, after `func` or a method name. Results stay on the
/// line of the closing parenthesis.
fn signature<'a>(input: &mut &'a str) -> ModalResult<RawSignature<'a>> {
    let params = type_list(param).parse_next(input)?;
    hspace.parse_next(input)?;
    let results = if input.starts_with('(') {
        type_list(raw_type).parse_next(input)?
    } else {
        opt(raw_type).parse_next(input)?.into_iter().collect()
    };
    Ok(RawSignature { params, results })
}

/// Whitespace and `;` between declarations of a struct or interface body.
fn separators(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_whitespace() || c == ';')
        .void()
        .parse_next(input)
}

/// The end of one declaration: `;`, a newline, or the closing brace.
fn declaration_end(input: &mut &str) -> ModalResult<()> {
    hspace.parse_next(input)?;
    if input.starts_with('}') {
        return Ok(());
    }
    cut_err(one_of([';', '\n']))
        .context(expected("`;` or `}`"))
        .void()
        .parse_next(input)
}

/// `{ decl; decl }` with newlines or semicolons between declarations.
fn body<'a, T>(
    input: &mut &'a str,
    mut decl: impl Parser<&'a str, T, ErrMode<ContextError>>,
    what: &'static str,
) -> ModalResult<Vec<T>> {
    ws.parse_next(input)?;
    cut_err('{').context(expected("`{`")).parse_next(input)?;
    let mut decls = Vec::new();
    loop {
        separators(input)?;
        if opt('}').parse_next(input)?.is_some() {
            return Ok(decls);
        }
        decls.push(cut_err(decl.by_ref()).context(expected(what)).parse_next(input)?);
        declaration_end(input)?;
    }
}

fn struct_body<'a>(input: &mut &'a str) -> ModalResult<Vec<RawField<'a>>> {
    body(input, alt((named_field, embedded_field)), "field or `}`")
}

fn named_field<'a>(input: &mut &'a str) -> ModalResult<RawField<'a>> {
    let mut names = vec![ident(input)?];
    let more: Vec<&str> = repeat(0.., preceded((hspace, ',', ws), ident)).parse_next(input)?;
    names.extend(more);
    hspace.parse_next(input)?;
    let ty = raw_type(input)?;
    let tag = field_tag(input)?;
    Ok(RawField { names, ty, tag })
}

fn embedded_field<'a>(input: &mut &'a str) -> ModalResult<RawField<'a>> {
    let ty = raw_type(input)?;
    let tag = field_tag(input)?;
    Ok(RawField {
        names: Vec::new(),
        ty,
        tag,
    })
}

fn field_tag(input: &mut &str) -> ModalResult<String> {
    hspace.parse_next(input)?;
    Ok(opt(any_string_lit)
        .parse_next(input)?
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default())
}

fn interface_body<'a>(input: &mut &'a str) -> ModalResult<Vec<RawElem<'a>>> {
    body(
        input,
        alt((method_elem, raw_type.map(RawElem::Embed))),
        "method or `}`",
    )
}

fn method_elem<'a>(input: &mut &'a str) -> ModalResult<RawElem<'a>> {
    let ((name, _, sig), text) = (ident, hspace, signature).with_taken().parse_next(input)?;
    Ok(RawElem::Method { name, sig, text })
}

// ============================================================================
// Resolution
// ============================================================================

struct Resolver<'a> {
    src: &'a str,
}

impl Resolver<'_> {
    fn error<T>(&self, text: &str, message: impl Into<String>) -> Result<T, ParseError> {
        let start = text.offset_from(&self.src);
        Err(ParseError {
            message: message.into(),
            span: Span::new(start, start + text.len()),
        })
    }

    fn resolve(&self, raw: &RawType<'_>) -> Result<Type, ParseError> {
        Ok(match &raw.kind {
            RawKind::Name(name) => match builtins().lookup(name) {
                Some(ty) => ty,
                None => return self.error(name, format!("undefined type {name}")),
            },
            RawKind::Slice(elem) => slice_type(self.resolve(elem)?),
            RawKind::Array { len, elem } => {
                let len = self.array_len(len)?;
                array_type(self.resolve(elem)?, len)
            }
            RawKind::Ptr(elem) => ptr_type(self.resolve(elem)?),
            RawKind::Chan(dir, elem) => chan_type(self.resolve(elem)?, *dir),
            RawKind::Map(key, elem) => {
                let key_ty = self.resolve(key)?;
                if !key_ty.comparable() {
                    return self.error(key.text, format!("invalid map key type {key_ty}"));
                }
                map_type(key_ty, self.resolve(elem)?)
            }
            RawKind::Func(sig) => self.signature(sig)?,
            RawKind::Struct(fields) => self.struct_type(fields)?,
            RawKind::Interface(elems) => self.interface_type(elems)?,
        })
    }

    /// Array lengths are bounded by the configured maximum index.
    fn array_len(&self, text: &str) -> Result<usize, ParseError> {
        let Ok(len) = int_lit.parse(text) else {
            return self.error(text, format!("invalid array length {text}"));
        };
        let max = RuntimeConfig::current().max_index;
        match usize::try_from(len) {
            Ok(len) if len as u128 <= max as u128 => Ok(len),
            _ => self.error(text, format!("array length {text} exceeds the maximum {max}")),
        }
    }

    fn signature(&self, sig: &RawSignature<'_>) -> Result<Type, ParseError> {
        let last = sig.params.len().saturating_sub(1);
        let mut params = Vec::with_capacity(sig.params.len());
        for (index, param) in sig.params.iter().enumerate() {
            let ty = self.resolve(&param.ty)?;
            params.push(match param.ellipsis {
                Some(dots) if index != last => {
                    return self.error(dots, "can only use ... with final parameter in list");
                }
                Some(_) => slice_type(ty),
                None => ty,
            });
        }
        let results = sig
            .results
            .iter()
            .map(|r| self.resolve(r))
            .collect::<Result<Vec<_>, _>>()?;
        let variadic = sig.params.last().is_some_and(|p| p.ellipsis.is_some());
        Ok(func_type(&params, &results, variadic))
    }

    fn struct_type(&self, raw: &[RawField<'_>]) -> Result<Type, ParseError> {
        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        for decl in raw {
            let typ = self.resolve(&decl.ty)?;
            if decl.names.is_empty() {
                let name = embedded_name(typ);
                if !seen.insert(name.clone()) {
                    return self.error(decl.ty.text, format!("duplicate field {name}"));
                }
                fields.push(Field::embedded(name, typ).with_tag(decl.tag.as_str()));
            }
            for &name in &decl.names {
                if !seen.insert(name.to_string()) {
                    return self.error(name, format!("duplicate field {name}"));
                }
                fields.push(Field::new(name, typ).with_tag(decl.tag.as_str()));
            }
        }
        let pkg = if fields.iter().all(|f| f.exported) {
            ""
        } else {
            LOCAL_PKG
        };
        Ok(struct_type(pkg, fields))
    }

    fn interface_type(&self, elems: &[RawElem<'_>]) -> Result<Type, ParseError> {
        let mut methods: Vec<Method> = Vec::new();
        for elem in elems {
            let (declared, text) = match elem {
                RawElem::Method { name, sig, text } => {
                    let sig = self.signature(sig)?;
                    let method = if is_exported(name) {
                        Method::new(*name, sig)
                    } else {
                        Method::unexported(*name, LOCAL_PKG, sig)
                    };
                    (vec![method], *text)
                }
                RawElem::Embed(embed) => {
                    let embedded = self.resolve(embed)?;
                    if embedded.kind() != Kind::Interface {
                        return self.error(
                            embed.text,
                            format!("cannot embed non-interface type {embedded}"),
                        );
                    }
                    (embedded.methods().to_vec(), embed.text)
                }
            };
            for method in declared {
                match methods.iter().find(|m| m.name == method.name && m.pkg == method.pkg) {
                    Some(existing) if existing.matches(&method) => {}
                    Some(_) => return self.error(text, format!("duplicate method {}", method.name)),
                    None => methods.push(method),
                }
            }
        }
        Ok(interface_type(methods))
    }
}

/// The field name an embedded type contributes: its type name without
/// pointer or package qualifiers.
fn embedded_name(typ: Type) -> String {
    let base = if typ.kind() == Kind::Ptr && typ.elem().is_named() {
        typ.elem()
    } else {
        typ
    };
    let name = base.string();
    name.rsplit('.').next().unwrap_or(name).to_string()
}

// ============================================================================
// Public API
// ============================================================================

/// The token at the start of `rest`, for error messages.
fn next_token(rest: &str) -> &str {
    let mut cursor = rest;
    let word: ModalResult<&str> =
        alt((ident, take_while(1.., |c: char| c.is_ascii_digit()))).parse_next(&mut cursor);
    match word {
        Ok(word) => word,
        Err(_) => rest.chars().next().map_or("", |c| &rest[..c.len_utf8()]),
    }
}

fn syntax_error(src: &str, remaining: &str, wanted: &str) -> ParseError {
    let start = src.len() - remaining.len();
    let token = next_token(remaining);
    let found = if token.is_empty() {
        "end of input".to_string()
    } else {
        format!("`{token}`")
    };
    ParseError {
        message: format!("expected {wanted}, found {found}"),
        span: Span::new(start, start + token.len()),
    }
}

/// The innermost expectation recorded on a failed parse.
fn wanted(err: &ErrMode<ContextError>) -> &'static str {
    let (ErrMode::Backtrack(e) | ErrMode::Cut(e)) = err else {
        return "type";
    };
    e.context()
        .find_map(|c| match c {
            StrContext::Expected(StrContextValue::Description(what)) => Some(*what),
            _ => None,
        })
        .unwrap_or("type")
}

/// Parse a complete type expression.
pub fn parse_type(src: &str) -> Result<Type, ParseError> {
    let mut remaining = src;
    let raw = required_type
        .parse_next(&mut remaining)
        .map_err(|e| syntax_error(src, remaining, wanted(&e)))?;
    ws.parse_next(&mut remaining)
        .map_err(|e| syntax_error(src, remaining, wanted(&e)))?;
    if !remaining.is_empty() {
        return Err(syntax_error(src, remaining, "end of type"));
    }

    let ty = Resolver { src }.resolve(&raw)?;
    tracing::debug!(%src, ty = %ty, id = ty.id(), "parsed type expression");
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_of(src: &str) -> String {
        parse_type(src).unwrap().string().to_string()
    }

    #[test]
    fn test_spellings_of_one_type_intern_together() {
        assert_eq!(parse_type("[]byte").unwrap(), parse_type("[]uint8").unwrap());
        assert_eq!(
            parse_type("interface{ B(); A() }").unwrap(),
            parse_type("interface {\n\tA()\n\tB()\n}").unwrap()
        );
        assert_eq!(parse_type("any").unwrap(), builtins().empty_interface);
        assert_eq!(parse_type("[0x10]int").unwrap(), parse_type("[16]int").unwrap());
    }

    #[test]
    fn test_type_strings() {
        assert_eq!(string_of("[4]*int"), "[4]*int");
        assert_eq!(string_of("map[string][]rune"), "map[string][]int32");
        assert_eq!(string_of("chan<- <-chan int"), "chan<- <-chan int");
        assert_eq!(string_of("chan (<-chan int)"), "chan (<-chan int)");
        assert_eq!(string_of("func(int, ...string) (bool, error)"), "func(int, ...string) (bool, error)");
        assert_eq!(string_of("func() func() int"), "func() func() int");
        assert_eq!(string_of("struct{ X, Y int; error }"), "struct { X int; Y int; error }");
        assert_eq!(string_of("struct{ Name string `json:\"name\"` }"), "struct { Name string \"json:\\\"name\\\"\" }");
        assert_eq!(string_of("interface{ M(int) string }"), "interface { M(int) string }");
    }

    #[test]
    fn test_newlines_separate_declarations() {
        let ty = parse_type("struct {\n\tA int \"a\"\n\tB func() error\n\n\terror\n}").unwrap();
        let fields: Vec<_> = ty.fields().iter().map(|f| (f.name.as_str(), f.tag.as_str())).collect();
        assert_eq!(fields, vec![("A", "a"), ("B", ""), ("error", "")]);
        assert_eq!(ty.fields()[1].typ.string(), "func() error");

        let ty = parse_type("interface {\n\tRead(\n\t\t[]byte,\n\t) (int, error)\n\tClose() error\n}").unwrap();
        assert_eq!(ty.methods().len(), 2);
    }

    #[test]
    fn test_embedded_interfaces_merge_methods() {
        let ty = parse_type("interface{ error; Code() int }").unwrap();
        let names: Vec<_> = ty.methods().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Code", "Error"]);
    }

    #[test]
    fn test_unexported_names_belong_to_main() {
        let ty = parse_type("interface{ len() int }").unwrap();
        assert_eq!(ty.string(), "interface { main.len() int }");
    }

    #[test]
    fn test_semantic_errors_point_at_the_node() {
        let err = parse_type("map[[]int]bool").unwrap_err();
        assert_eq!(err.message, "invalid map key type []int");
        assert_eq!(err.span, Span::new(4, 9));

        let err = parse_type("[]Foo").unwrap_err();
        assert_eq!(err.to_string(), "undefined type Foo at offset 2");

        let err = parse_type("struct{ A int; A string }").unwrap_err();
        assert_eq!(err.message, "duplicate field A");
        assert_eq!(err.span, Span::new(15, 16));

        let err = parse_type("func(...int, string)").unwrap_err();
        assert_eq!(err.message, "can only use ... with final parameter in list");
        assert_eq!(err.span.start, 5);

        let err = parse_type("interface{ int }").unwrap_err();
        assert_eq!(err.message, "cannot embed non-interface type int");
    }

    #[test]
    fn test_array_lengths_are_bounded() {
        let err = parse_type("[2147483648]byte").unwrap_err();
        assert_eq!(err.message, "array length 2147483648 exceeds the maximum 2147483647");
        assert_eq!(err.span, Span::new(1, 11));

        let err = parse_type("[99999999999999999999999]byte").unwrap_err();
        assert!(err.message.starts_with("array length 99999999999999999999999 exceeds"));

        let err = parse_type("[n]int").unwrap_err();
        assert_eq!(err.message, "invalid array length n");
    }

    #[test]
    fn test_syntax_errors() {
        let err = parse_type("[3]int extra").unwrap_err();
        assert_eq!(err.message, "expected end of type, found `extra`");
        assert_eq!(err.span, Span::new(7, 12));

        let err = parse_type("[3").unwrap_err();
        assert_eq!(err.message, "expected `]`, found end of input");

        let err = parse_type("map[string").unwrap_err();
        assert_eq!(err.message, "expected `]`, found end of input");

        let err = parse_type("").unwrap_err();
        assert_eq!(err.message, "expected type, found end of input");

        let err = parse_type("<-int").unwrap_err();
        assert_eq!(err.message, "expected `chan`, found `int`");
    }
}
