//! Package dependency analysis
//!
//! Reassembles a package's static SQL from the catalog, scans each
//! statement for the objects it touches and, where the catalog can say,
//! confirms whether each relation is a table or a view.
//!
//! The scan is lexical. It walks the token stream from `sql::lexer`, so
//! string literals, comments and delimited identifiers never produce false
//! references, but dynamic SQL assembled at run time is invisible to it.

use crate::catalog::names;
use crate::db::{Provider, SqlParam};
use crate::error::Result;
use crate::metadata::{
    DependencyKind, DependencyRef, MetadataProvider, ObjectIdentifier, PackageDependencies,
    PackageStatement,
};
use crate::sql::{Token, tokenize};
use std::collections::{BTreeMap, BTreeSet};

/// Schemas whose objects are never reported as dependencies
const SYSTEM_SCHEMAS: &[&str] = &[
    "SYSIBM",
    "SYSCAT",
    "SYSIBMADM",
    "SYSPROC",
    "SYSSTAT",
    "SYSTOOLS",
    "SYSFUN",
    "PG_CATALOG",
    "INFORMATION_SCHEMA",
];

/// Functions whose argument lists contain a bare FROM or IN
const KEYWORD_ARGUMENT_FUNCTIONS: &[&str] =
    &["EXTRACT", "TRIM", "SUBSTRING", "POSITION", "OVERLAY"];

/// Words that follow FROM/JOIN but do not start a relation name
const NON_RELATION_WORDS: &[&str] = &[
    "TABLE", "LATERAL", "FINAL", "NEW", "OLD", "UNNEST", "XMLTABLE", "SELECT", "VALUES",
];

/// Words that end a relation reference instead of naming an alias
const CLAUSE_WORDS: &[&str] = &[
    "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "NATURAL", "ON",
    "USING", "GROUP", "ORDER", "HAVING", "UNION", "EXCEPT", "INTERSECT", "MINUS", "FETCH",
    "LIMIT", "OFFSET", "FOR", "WITH", "SET", "VALUES", "SELECT", "WHEN", "THEN", "WINDOW",
    "RETURNING", "OPTIMIZE", "QUERYNO", "INTO", "AS",
];

/// Words before UPDATE that make it a clause rather than a statement
const UPDATE_CLAUSE_PREFIXES: &[&str] = &["FOR", "ON", "AFTER", "BEFORE", "OR", "OF"];

/// What syntax a reference came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReferenceKind {
    /// Table or view; the catalog decides which
    Relation,
    /// `CALL name`
    Procedure,
    /// `schema.name(`
    Function,
}

/// An object named by one statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedReference {
    pub object: ObjectIdentifier,
    pub kind: ReferenceKind,
}

/// Finds what a package's static SQL depends on
#[derive(Clone)]
pub struct DependencyAnalyzer {
    metadata: MetadataProvider,
}

impl DependencyAnalyzer {
    pub fn new(metadata: MetadataProvider) -> Self {
        Self { metadata }
    }

    /// Reassembled statements of a package, in statement order.
    ///
    /// Long statements are stored as several parts; the parts of one
    /// (statement, section) pair are joined in sequence order without
    /// trimming, since a part may end in the middle of a word.
    pub async fn fetch_statements(
        &self,
        schema: &str,
        package: &str,
    ) -> Result<Vec<PackageStatement>> {
        let results = self
            .metadata
            .execute_metadata_query(
                names::PACKAGE_GET_STATEMENTS,
                &[
                    ("PKGSCHEMA", SqlParam::from(schema)),
                    ("PKGNAME", SqlParam::from(package)),
                ],
            )
            .await?;

        let mut parts: Vec<(i64, i64, i64, String)> = results
            .iter()
            .map(|row| {
                let text = match row.get("TEXT") {
                    Some(value) if !value.is_null() => value.display_string(usize::MAX),
                    _ => String::new(),
                };
                (
                    row.int("STMTNO").unwrap_or_default(),
                    row.int("SECTNO").unwrap_or_default(),
                    row.int("SEQNO").unwrap_or_default(),
                    text,
                )
            })
            .collect();
        parts.sort_by_key(|(stmt, sect, seq, _)| (*stmt, *sect, *seq));

        let mut statements: Vec<PackageStatement> = Vec::new();
        for (stmt_no, section_no, _, text) in parts {
            match statements.last_mut() {
                Some(last) if last.stmt_no == stmt_no && last.section_no == section_no => {
                    last.text.push_str(&text);
                }
                _ => statements.push(PackageStatement {
                    stmt_no,
                    section_no,
                    text,
                }),
            }
        }
        for statement in &mut statements {
            statement.text = statement.text.trim().to_string();
        }

        tracing::debug!(
            package = %format!("{}.{}", schema, package),
            statements = statements.len(),
            "package statements reassembled"
        );
        Ok(statements)
    }

    /// Dependencies of a package, resolved against its default schema
    pub async fn analyze_dependencies(
        &self,
        schema: &str,
        package: &str,
    ) -> Result<PackageDependencies> {
        let default_schema = self.default_schema(schema, package).await?;
        let statements = self.fetch_statements(schema, package).await?;
        Ok(self.analyze_statements(&statements, &default_schema).await)
    }

    /// QUALIFIER from the package metadata, else the package schema
    async fn default_schema(&self, schema: &str, package: &str) -> Result<String> {
        if !self.metadata.supports(names::GET_PACKAGE_METADATA) {
            return Ok(schema.to_string());
        }
        let meta = self
            .metadata
            .execute_metadata_query(
                names::GET_PACKAGE_METADATA,
                &[
                    ("PKGSCHEMA", SqlParam::from(schema)),
                    ("PKGNAME", SqlParam::from(package)),
                ],
            )
            .await?;
        Ok(meta
            .first()
            .and_then(|r| r.text("QUALIFIER"))
            .unwrap_or_else(|| schema.to_string()))
    }

    /// Scan already-fetched statements and classify what they reference
    pub async fn analyze_statements(
        &self,
        statements: &[PackageStatement],
        default_schema: &str,
    ) -> PackageDependencies {
        let provider = self.metadata.provider();
        let mut usage: BTreeMap<(ObjectIdentifier, ReferenceKind), BTreeSet<i64>> =
            BTreeMap::new();

        for statement in statements {
            for reference in extract_references(&statement.text, default_schema, provider) {
                usage
                    .entry((reference.object, reference.kind))
                    .or_default()
                    .insert(statement.stmt_no);
            }
        }

        let mut deps = PackageDependencies::default();
        for ((object, reference), stmts) in usage {
            let (kind, verified) = match reference {
                ReferenceKind::Relation => self.classify_relation(&object).await,
                ReferenceKind::Procedure => {
                    self.classify_routine(&object, DependencyKind::Procedure).await
                }
                ReferenceKind::Function => {
                    self.classify_routine(&object, DependencyKind::Function).await
                }
            };

            let set = match kind {
                DependencyKind::Table => &mut deps.tables_used,
                DependencyKind::View => &mut deps.views_used,
                DependencyKind::Procedure => &mut deps.procedures_called,
                DependencyKind::Function => &mut deps.functions_called,
            };
            set.insert(object.clone());
            deps.details.push(DependencyRef {
                object,
                kind,
                usage_count: stmts.len(),
                statements: stmts.into_iter().collect(),
                verified,
            });
        }

        tracing::info!(
            tables = deps.tables_used.len(),
            views = deps.views_used.len(),
            procedures = deps.procedures_called.len(),
            functions = deps.functions_called.len(),
            "package dependencies analyzed"
        );
        deps
    }

    /// Table or view. Anything the catalog cannot confirm is kept as a table.
    async fn classify_relation(&self, object: &ObjectIdentifier) -> (DependencyKind, bool) {
        if !self.metadata.supports(names::GET_RELATION_TYPE) {
            return (DependencyKind::Table, false);
        }
        let lookup = self
            .metadata
            .execute_scalar(
                names::GET_RELATION_TYPE,
                &[
                    ("TABSCHEMA", SqlParam::from(&object.schema)),
                    ("TABNAME", SqlParam::from(&object.name)),
                ],
            )
            .await;
        match lookup {
            Ok(Some(value)) if !value.is_null() => {
                let code = value.display_string(usize::MAX);
                if code.trim().eq_ignore_ascii_case("V") {
                    (DependencyKind::View, true)
                } else {
                    (DependencyKind::Table, true)
                }
            }
            Ok(_) => (DependencyKind::Table, false),
            Err(e) => {
                tracing::warn!(object = %object, error = %e, "relation type lookup failed");
                (DependencyKind::Table, false)
            }
        }
    }

    /// Procedure or function; the syntax decides when the catalog cannot
    async fn classify_routine(
        &self,
        object: &ObjectIdentifier,
        syntactic: DependencyKind,
    ) -> (DependencyKind, bool) {
        if !self.metadata.supports(names::GET_ROUTINE_TYPE) {
            return (syntactic, false);
        }
        let lookup = self
            .metadata
            .execute_scalar(
                names::GET_ROUTINE_TYPE,
                &[
                    ("ROUTINESCHEMA", SqlParam::from(&object.schema)),
                    ("ROUTINENAME", SqlParam::from(&object.name)),
                ],
            )
            .await;
        match lookup {
            Ok(Some(value)) if !value.is_null() => {
                match value.display_string(usize::MAX).trim().to_ascii_uppercase().as_str() {
                    "P" => (DependencyKind::Procedure, true),
                    "F" => (DependencyKind::Function, true),
                    _ => (syntactic, false),
                }
            }
            Ok(_) => (syntactic, false),
            Err(e) => {
                tracing::warn!(object = %object, error = %e, "routine type lookup failed");
                (syntactic, false)
            }
        }
    }
}

/// Objects a single SQL statement names.
///
/// Best effort and never fails. Unqualified names take `default_schema`;
/// unquoted names are folded the way `provider` stores them. References
/// to common table expressions and to system schemas are dropped, and
/// each object is reported once per statement.
pub fn extract_references(
    sql: &str,
    default_schema: &str,
    provider: Provider,
) -> Vec<ExtractedReference> {
    let tokens = tokenize(sql);
    let ctes = cte_names(&tokens, provider);
    let mut scan = Scan {
        tokens: &tokens,
        default_schema,
        provider,
        ctes: &ctes,
        found: Vec::new(),
    };

    // true when the enclosing parenthesis belongs to EXTRACT, TRIM and the like
    let mut parens: Vec<bool> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        match token {
            Token::Symbol('(') => {
                let keyword_args = i > 0
                    && KEYWORD_ARGUMENT_FUNCTIONS
                        .iter()
                        .any(|f| tokens[i - 1].is_keyword(f));
                parens.push(keyword_args);
                i += 1;
            }
            Token::Symbol(')') => {
                parens.pop();
                i += 1;
            }
            Token::Word(w) => {
                let word = w.to_ascii_uppercase();
                let in_keyword_args = parens.last().copied().unwrap_or(false);
                i = match word.as_str() {
                    "FROM" | "JOIN" | "USING" if !in_keyword_args => scan.relation_list(i + 1),
                    "INTO" if scan.follows_any(i, &["INSERT", "MERGE"]) => {
                        scan.single_relation(i + 1)
                    }
                    "UPDATE" if !scan.is_update_clause(i) => scan.single_relation(i + 1),
                    "CALL" => scan.procedure(i + 1),
                    _ => scan.maybe_function(i),
                };
            }
            Token::QuotedIdent(_) => i = scan.maybe_function(i),
            _ => i += 1,
        }
    }

    scan.found
}

struct Scan<'a> {
    tokens: &'a [Token],
    default_schema: &'a str,
    provider: Provider,
    ctes: &'a BTreeSet<String>,
    found: Vec<ExtractedReference>,
}

impl Scan<'_> {
    /// Dotted name starting at `start`; parts keep their quoted flag
    fn read_name(&self, start: usize) -> Option<(Vec<(String, bool)>, usize)> {
        let mut parts = Vec::new();
        let mut i = start;
        loop {
            let (text, quoted) = self.tokens.get(i)?.identifier()?;
            parts.push((text.to_string(), quoted));
            i += 1;
            if self.tokens.get(i).is_some_and(|t| t.is_symbol('.')) {
                i += 1;
            } else {
                return Some((parts, i));
            }
        }
    }

    fn fold(&self, part: &(String, bool)) -> String {
        if part.1 {
            part.0.clone()
        } else {
            self.provider.fold_identifier(&part.0)
        }
    }

    /// Last two parts of a dotted name, defaulting the schema
    fn identifier(&self, parts: &[(String, bool)]) -> Option<ObjectIdentifier> {
        match parts {
            [] => None,
            [name] => Some(ObjectIdentifier::new(self.default_schema, self.fold(name))),
            [.., schema, name] => Some(ObjectIdentifier::new(self.fold(schema), self.fold(name))),
        }
    }

    fn record(&mut self, parts: &[(String, bool)], kind: ReferenceKind) {
        if kind == ReferenceKind::Relation
            && parts.len() == 1
            && self.ctes.contains(&self.fold(&parts[0]))
        {
            return;
        }
        let Some(object) = self.identifier(parts) else {
            return;
        };
        if SYSTEM_SCHEMAS
            .iter()
            .any(|s| s.eq_ignore_ascii_case(&object.schema))
        {
            return;
        }
        let reference = ExtractedReference { object, kind };
        if !self.found.contains(&reference) {
            self.found.push(reference);
        }
    }

    /// Whether the token before `i` is one of `keywords`
    fn follows_any(&self, i: usize, keywords: &[&str]) -> bool {
        i > 0 && keywords.iter().any(|k| self.tokens[i - 1].is_keyword(k))
    }

    fn is_update_clause(&self, i: usize) -> bool {
        let after_prefix = self.follows_any(i, UPDATE_CLAUSE_PREFIXES);
        let before_set = self.tokens.get(i + 1).is_some_and(|t| t.is_keyword("SET"));
        after_prefix || before_set
    }

    fn starts_relation(&self, i: usize) -> bool {
        match self.tokens.get(i) {
            Some(Token::Word(w)) => !NON_RELATION_WORDS.iter().any(|k| w.eq_ignore_ascii_case(k)),
            Some(Token::QuotedIdent(_)) => true,
            _ => false,
        }
    }

    /// One relation name plus its optional alias; returns the next index
    fn single_relation(&mut self, start: usize) -> usize {
        if !self.starts_relation(start) {
            return start;
        }
        let Some((parts, mut i)) = self.read_name(start) else {
            return start;
        };
        if self.tokens.get(i).is_some_and(|t| t.is_symbol('(')) {
            // table function or INSERT column list
            if parts.len() >= 2 && !self.follows_any(start, &["INTO"]) {
                self.record(&parts, ReferenceKind::Function);
            } else {
                self.record(&parts, ReferenceKind::Relation);
            }
            return i;
        }
        self.record(&parts, ReferenceKind::Relation);

        if self.tokens.get(i).is_some_and(|t| t.is_keyword("AS")) {
            i += 1;
        }
        match self.tokens.get(i) {
            Some(Token::Word(w)) if !CLAUSE_WORDS.iter().any(|k| w.eq_ignore_ascii_case(k)) => i + 1,
            Some(Token::QuotedIdent(_)) => i + 1,
            _ => i,
        }
    }

    /// Comma-separated relations after FROM, JOIN or USING
    fn relation_list(&mut self, start: usize) -> usize {
        let mut i = start;
        loop {
            let next = self.single_relation(i);
            if next == i {
                return i;
            }
            i = next;
            if self.tokens.get(i).is_some_and(|t| t.is_symbol(',')) && self.starts_relation(i + 1) {
                i += 1;
            } else {
                return i;
            }
        }
    }

    fn procedure(&mut self, start: usize) -> usize {
        match self.read_name(start) {
            Some((parts, next)) => {
                self.record(&parts, ReferenceKind::Procedure);
                next
            }
            None => start,
        }
    }

    /// `schema.name(` anywhere else is a function call
    fn maybe_function(&mut self, start: usize) -> usize {
        match self.read_name(start) {
            Some((parts, next)) => {
                if parts.len() >= 2 && self.tokens.get(next).is_some_and(|t| t.is_symbol('(')) {
                    self.record(&parts, ReferenceKind::Function);
                }
                next
            }
            None => start + 1,
        }
    }
}

/// Names introduced by WITH: `name AS (` or `name (cols) AS (`,
/// directly after WITH, RECURSIVE or a comma
fn cte_names(tokens: &[Token], provider: Provider) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    if !tokens.iter().any(|t| t.is_keyword("WITH")) {
        return names;
    }
    for i in 1..tokens.len() {
        let prev = &tokens[i - 1];
        if !(prev.is_keyword("WITH") || prev.is_keyword("RECURSIVE") || prev.is_symbol(',')) {
            continue;
        }
        let Some((text, quoted)) = tokens[i].identifier() else {
            continue;
        };
        let mut j = i + 1;
        if tokens.get(j).is_some_and(|t| t.is_symbol('(')) {
            while j < tokens.len() && !tokens[j].is_symbol(')') {
                j += 1;
            }
            j += 1;
        }
        let defines = tokens.get(j).is_some_and(|t| t.is_keyword("AS"))
            && tokens.get(j + 1).is_some_and(|t| t.is_symbol('('));
        if defines {
            names.insert(if quoted {
                text.to_string()
            } else {
                provider.fold_identifier(text)
            });
        }
    }
    names
}
