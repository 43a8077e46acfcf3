//! Read-only and schema checks for generated Cypher.
//!
//! The checker works on a token stream rather than raw text, so keywords
//! inside string literals, comments or backtick-quoted names never trip it.
//! It is deliberately conservative: anything that could mutate the graph,
//! call an unknown procedure, or reference a label, relationship type or
//! property missing from the [`GraphSchema`] is rejected.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::GraphSchema;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("query is empty")]
    Empty,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("unterminated backtick identifier")]
    UnterminatedIdentifier,
    #[error("unbalanced '{0}'")]
    Unbalanced(char),
    #[error("only a single statement is allowed")]
    MultipleStatements,
    #[error("query must start with a read clause, found '{0}'")]
    NotAReadQuery(String),
    #[error("query has no RETURN clause")]
    MissingReturn,
    #[error("write clause '{0}' is not allowed")]
    WriteClause(String),
    #[error("procedure '{0}' is not allowed")]
    DisallowedProcedure(String),
    #[error("unknown node label '{0}'")]
    UnknownLabel(String),
    #[error("unknown relationship type '{0}'")]
    UnknownRelationship(String),
    #[error("unknown property '{0}'")]
    UnknownProperty(String),
}

/// A Cypher statement that passed [`check`]. Graph stores only accept this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnlyQuery(String);

impl ReadOnlyQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ReadOnlyQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const READ_CLAUSE_STARTS: &[&str] = &["MATCH", "OPTIONAL", "WITH", "UNWIND", "CALL", "RETURN"];

const WRITE_KEYWORDS: &[&str] = &[
    "CREATE", "INSERT", "MERGE", "DELETE", "DETACH", "NODETACH", "SET", "REMOVE", "DROP",
    "FOREACH", "LOAD", "GRANT", "DENY", "REVOKE", "ALTER", "RENAME", "TERMINATE",
];

/// Words after which `(` opens a pattern rather than a function call.
const PATTERN_PRECEDERS: &[&str] = &[
    "MATCH", "WHERE", "AND", "OR", "XOR", "NOT", "EXISTS", "WITH", "RETURN",
];

const READ_PROCEDURES: &[&str] = &[
    "db.labels",
    "db.relationshiptypes",
    "db.propertykeys",
    "db.schema.visualization",
    "db.schema.nodetypeproperties",
    "db.schema.reltypeproperties",
    "db.index.vector.querynodes",
    "db.index.fulltext.querynodes",
    "db.index.fulltext.queryrelationships",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Str,
    Number,
    Param,
    Punct(char),
}

impl Token {
    fn text(&self) -> String {
        match self {
            Token::Word(word) => word.clone(),
            Token::Quoted(name) => format!("`{name}`"),
            Token::Str => "<string>".to_string(),
            Token::Number => "<number>".to_string(),
            Token::Param => "<parameter>".to_string(),
            Token::Punct(c) => c.to_string(),
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(word) if word.eq_ignore_ascii_case(keyword))
    }
}

/// Strips markdown fences, a leading `Cypher:` label and trailing semicolons
/// that models tend to wrap around a query.
pub fn sanitize(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        text = match rest.split_once('\n') {
            Some((lang, body)) if !lang.trim().contains(' ') => body,
            _ => rest,
        };
        text = text.trim();
    }

    if text.get(..7).is_some_and(|prefix| prefix.eq_ignore_ascii_case("cypher:")) {
        text = text[7..].trim();
    }

    text.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .trim()
        .to_string()
}

/// Validates `raw` and returns the sanitized query when it is read-only and
/// only uses names declared in `schema`.
pub fn check(raw: &str, schema: &GraphSchema) -> Result<ReadOnlyQuery, GuardViolation> {
    let query = sanitize(raw);
    if query.is_empty() {
        return Err(GuardViolation::Empty);
    }

    let tokens = tokenize(&query)?;
    if tokens.iter().any(|t| *t == Token::Punct(';')) {
        return Err(GuardViolation::MultipleStatements);
    }
    check_balanced(&tokens)?;
    check_read_only(&tokens)?;

    let mut scanner = SchemaScanner::new(&tokens, schema);
    scanner.scan(false)?;
    scanner.scan(true)?;

    Ok(ReadOnlyQuery(query))
}

fn tokenize(src: &str) -> Result<Vec<Token>, GuardViolation> {
    let chars: Vec<char> = src.chars().collect();
    let len = chars.len();
    let is_ident = |c: char| c.is_alphanumeric() || c == '_';
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < len {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            loop {
                if i + 1 >= len {
                    return Err(GuardViolation::UnterminatedComment);
                }
                if chars[i] == '*' && chars[i + 1] == '/' {
                    i += 2;
                    break;
                }
                i += 1;
            }
        } else if c == '\'' || c == '"' {
            i += 1;
            let mut closed = false;
            while i < len {
                if chars[i] == '\\' {
                    i += 2;
                } else if chars[i] == c {
                    i += 1;
                    closed = true;
                    break;
                } else {
                    i += 1;
                }
            }
            if !closed {
                return Err(GuardViolation::UnterminatedString);
            }
            tokens.push(Token::Str);
        } else if c == '`' {
            i += 1;
            let mut name = String::new();
            let mut closed = false;
            while i < len {
                if chars[i] == '`' {
                    if chars.get(i + 1) == Some(&'`') {
                        name.push('`');
                        i += 2;
                        continue;
                    }
                    i += 1;
                    closed = true;
                    break;
                }
                name.push(chars[i]);
                i += 1;
            }
            if !closed {
                return Err(GuardViolation::UnterminatedIdentifier);
            }
            tokens.push(Token::Quoted(name));
        } else if c == '$' {
            i += 1;
            while i < len && is_ident(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Param);
        } else if c.is_ascii_digit() {
            while i < len && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i + 1 < len && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                i += 1;
                while i < len && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < len && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < len && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < len && chars[j].is_ascii_digit() {
                    i = j;
                    while i < len && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Number);
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < len && is_ident(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Word(chars[start..i].iter().collect()));
        } else {
            tokens.push(Token::Punct(c));
            i += 1;
        }
    }

    Ok(tokens)
}

fn check_balanced(tokens: &[Token]) -> Result<(), GuardViolation> {
    let mut stack = Vec::new();
    for token in tokens {
        match token {
            Token::Punct(open @ ('(' | '[' | '{')) => stack.push(*open),
            Token::Punct(close @ (')' | ']' | '}')) => {
                let expected = match close {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return Err(GuardViolation::Unbalanced(*close));
                }
            }
            _ => {}
        }
    }
    match stack.pop() {
        Some(open) => Err(GuardViolation::Unbalanced(open)),
        None => Ok(()),
    }
}

/// A word used as a clause keyword rather than as a label, property, map key
/// or variable.
fn in_keyword_position(tokens: &[Token], i: usize) -> bool {
    let after_name_marker = i > 0 && matches!(tokens[i - 1], Token::Punct('.' | ':'));
    let before_colon = matches!(tokens.get(i + 1), Some(Token::Punct(':')));
    !after_name_marker && !before_colon
}

fn check_read_only(tokens: &[Token]) -> Result<(), GuardViolation> {
    match tokens.first() {
        Some(Token::Word(word))
            if READ_CLAUSE_STARTS
                .iter()
                .any(|start| word.eq_ignore_ascii_case(start)) => {}
        Some(other) => return Err(GuardViolation::NotAReadQuery(other.text())),
        None => return Err(GuardViolation::Empty),
    }

    let mut has_return = false;
    for (i, token) in tokens.iter().enumerate() {
        let Token::Word(word) = token else { continue };
        if !in_keyword_position(tokens, i) {
            continue;
        }
        let upper = word.to_ascii_uppercase();

        if WRITE_KEYWORDS.contains(&upper.as_str()) {
            return Err(GuardViolation::WriteClause(upper));
        }
        if (upper == "START" || upper == "STOP")
            && tokens.get(i + 1).is_some_and(|t| t.is_keyword("DATABASE"))
        {
            return Err(GuardViolation::WriteClause(upper));
        }
        if upper == "RETURN" {
            has_return = true;
        }
        if upper == "CALL" {
            check_call(tokens, i)?;
        }
    }

    if has_return {
        Ok(())
    } else {
        Err(GuardViolation::MissingReturn)
    }
}

fn check_call(tokens: &[Token], call_index: usize) -> Result<(), GuardViolation> {
    match tokens.get(call_index + 1) {
        // subquery, optionally with an importing scope clause
        Some(Token::Punct('{' | '(')) => Ok(()),
        Some(Token::Word(first)) => {
            let mut name = first.clone();
            let mut j = call_index + 2;
            while let (Some(Token::Punct('.')), Some(Token::Word(part))) =
                (tokens.get(j), tokens.get(j + 1))
            {
                name.push('.');
                name.push_str(part);
                j += 2;
            }
            if READ_PROCEDURES.contains(&name.to_ascii_lowercase().as_str()) {
                Ok(())
            } else {
                Err(GuardViolation::DisallowedProcedure(name))
            }
        }
        Some(other) => Err(GuardViolation::DisallowedProcedure(other.text())),
        None => Err(GuardViolation::DisallowedProcedure(String::new())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameKind {
    Label,
    Relationship,
}

#[derive(Debug, Default)]
struct Binding {
    relationship: bool,
    names: Vec<String>,
}

#[derive(Debug)]
struct Frame {
    open: char,
    pattern: bool,
    var: Option<String>,
    names: Vec<String>,
}

struct SchemaScanner<'a> {
    tokens: &'a [Token],
    schema: &'a GraphSchema,
    bindings: HashMap<String, Binding>,
}

impl<'a> SchemaScanner<'a> {
    fn new(tokens: &'a [Token], schema: &'a GraphSchema) -> Self {
        Self {
            tokens,
            schema,
            bindings: HashMap::new(),
        }
    }

    fn name_at(&self, i: usize) -> Option<&'a str> {
        match self.tokens.get(i) {
            Some(Token::Word(name)) | Some(Token::Quoted(name)) => Some(name.as_str()),
            _ => None,
        }
    }

    fn punct_at(&self, i: usize) -> Option<char> {
        match self.tokens.get(i) {
            Some(Token::Punct(c)) => Some(*c),
            _ => None,
        }
    }

    /// First pass (`enforce == false`) records which variables are bound to
    /// which labels or relationship types; the second pass validates names.
    fn scan(&mut self, enforce: bool) -> Result<(), GuardViolation> {
        let tokens = self.tokens;
        let mut stack: Vec<Frame> = Vec::new();
        let mut alternation: Option<NameKind> = None;

        for i in 0..tokens.len() {
            match &tokens[i] {
                Token::Punct(open @ ('(' | '[' | '{')) => {
                    let pattern = match open {
                        '(' => self.opens_pattern(i),
                        '[' => i > 0 && self.punct_at(i - 1) == Some('-'),
                        _ => false,
                    };
                    let var = if pattern
                        && matches!(
                            self.punct_at(i + 2),
                            Some(':' | ')' | ']' | '{' | '*')
                        ) {
                        self.name_at(i + 1).map(str::to_string)
                    } else {
                        None
                    };
                    stack.push(Frame {
                        open: *open,
                        pattern,
                        var,
                        names: Vec::new(),
                    });
                    alternation = None;
                }
                Token::Punct(')' | ']' | '}') => {
                    if let Some(frame) = stack.pop() {
                        if !enforce {
                            self.bind(frame);
                        }
                    }
                    alternation = None;
                }
                Token::Punct(':') => {
                    alternation = self.on_colon(i, &mut stack, enforce)?;
                }
                Token::Punct('|' | '&') => {
                    if let (Some(kind), Some(name)) = (alternation, self.name_at(i + 1)) {
                        if enforce {
                            self.require_name(kind, name)?;
                        }
                        if let Some(frame) = stack.last_mut() {
                            frame.names.push(name.to_string());
                        }
                    }
                }
                Token::Punct('.') => {
                    if enforce {
                        self.check_dotted_property(i, &stack)?;
                    }
                    alternation = None;
                }
                Token::Word(_) | Token::Quoted(_) => {}
                _ => alternation = None,
            }
        }
        Ok(())
    }

    fn on_colon(
        &self,
        i: usize,
        stack: &mut [Frame],
        enforce: bool,
    ) -> Result<Option<NameKind>, GuardViolation> {
        let depth = stack.len();
        if let Some(frame) = stack.last() {
            if frame.open == '{' {
                // map key; pattern property maps must use schema properties
                let parent = depth.checked_sub(2).map(|idx| &stack[idx]);
                let key_position = i >= 2 && matches!(self.punct_at(i - 2), Some('{' | ','));
                if let (true, Some(parent), Some(key)) =
                    (enforce && key_position, parent, i.checked_sub(1).and_then(|k| self.name_at(k)))
                {
                    if parent.pattern {
                        let known = if parent.open == '[' {
                            self.schema.rel_has_property(&parent.names, key)
                        } else {
                            self.schema.node_has_property(&parent.names, key)
                        };
                        if !known {
                            return Err(GuardViolation::UnknownProperty(key.to_string()));
                        }
                    }
                }
                return Ok(None);
            }
        }

        let Some(name) = self.name_at(i + 1) else {
            return Ok(None);
        };
        let kind = match stack.last() {
            Some(frame) if frame.open == '[' && frame.pattern => NameKind::Relationship,
            _ => NameKind::Label,
        };
        if enforce {
            self.require_name(kind, name)?;
        }
        match stack.last_mut() {
            Some(frame) if frame.open == '[' && !frame.pattern => Ok(None),
            Some(frame) => {
                frame.names.push(name.to_string());
                Ok(Some(kind))
            }
            None => Ok(Some(kind)),
        }
    }

    fn opens_pattern(&self, paren: usize) -> bool {
        match paren.checked_sub(1).map(|p| &self.tokens[p]) {
            Some(Token::Word(word)) => PATTERN_PRECEDERS
                .iter()
                .any(|keyword| word.eq_ignore_ascii_case(keyword)),
            Some(Token::Quoted(_)) => false,
            _ => true,
        }
    }

    fn require_name(&self, kind: NameKind, name: &str) -> Result<(), GuardViolation> {
        match kind {
            NameKind::Label if !self.schema.has_label(name) => {
                Err(GuardViolation::UnknownLabel(name.to_string()))
            }
            NameKind::Relationship if !self.schema.has_relationship(name) => {
                Err(GuardViolation::UnknownRelationship(name.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn check_dotted_property(&self, i: usize, stack: &[Frame]) -> Result<(), GuardViolation> {
        let Some(property) = self.name_at(i + 1) else {
            return Ok(());
        };
        // namespaced function such as `date.truncate(`
        if self.punct_at(i + 2) == Some('(') {
            return Ok(());
        }

        let known = match i.checked_sub(1).map(|p| &self.tokens[p]) {
            Some(Token::Word(var)) => match self.bindings.get(var) {
                Some(binding) if binding.relationship => {
                    self.schema.rel_has_property(&binding.names, property)
                }
                Some(binding) => self.schema.node_has_property(&binding.names, property),
                None => true,
            },
            // map projection `n {.prop}`
            Some(Token::Punct('{' | ','))
                if stack.last().is_some_and(|frame| frame.open == '{') =>
            {
                self.schema.has_property(property)
            }
            _ => true,
        };

        if known {
            Ok(())
        } else {
            Err(GuardViolation::UnknownProperty(property.to_string()))
        }
    }

    fn bind(&mut self, frame: Frame) {
        let Some(var) = frame.var else { return };
        let binding = self.bindings.entry(var).or_insert_with(|| Binding {
            relationship: frame.open == '[',
            names: Vec::new(),
        });
        for name in frame.names {
            if !binding.names.contains(&name) {
                binding.names.push(name);
            }
        }
    }
}
