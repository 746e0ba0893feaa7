//! Canonical type registry.
//!
//! Each dialect owns a [`TypeRegistry`] mapping source-type spellings
//! (`i64`, `Option<String>`, `chrono::NaiveDateTime`, ...) to one canonical
//! DDL spelling. Several spellings map to the same stored type, so the
//! registry is also what decides that an existing column already matches a
//! declared field.
//!
//! ```text
//! i64, isize            ─┐
//! Option<i64>           ─┼─►  BIGINT
//! Option<isize>         ─┘
//! ```

use serde::{Deserialize, Serialize};

/// One canonical DDL type plus the source spellings accepted as matching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeEquivalence {
    /// Canonical DDL spelling, including its default size arguments.
    pub ddl_type: String,
    /// Accepted non-nullable spellings. The first one is canonical.
    pub types: Vec<String>,
    /// Accepted nullable spellings. The first one is canonical.
    pub nullable_types: Vec<String>,
}

impl TypeEquivalence {
    /// Creates an entry whose nullable spellings are `Option<T>` of each
    /// non-nullable spelling.
    #[must_use]
    pub fn new(ddl_type: &str, types: &[&str]) -> Self {
        let types: Vec<String> = types.iter().map(|t| compact(t)).collect();
        let nullable_types = types.iter().map(|t| format!("Option<{t}>")).collect();
        Self {
            ddl_type: normalize_ddl(ddl_type),
            types,
            nullable_types,
        }
    }

    /// Replaces the nullable spellings.
    #[must_use]
    pub fn with_nullable_types(mut self, types: &[&str]) -> Self {
        self.nullable_types = types.iter().map(|t| compact(t)).collect();
        self
    }

    fn spellings(&self, nullable: bool) -> &[String] {
        if nullable {
            &self.nullable_types
        } else {
            &self.types
        }
    }

    fn accepts(&self, spelling: &str, nullable: bool) -> bool {
        self.spellings(nullable)
            .iter()
            .chain(self.spellings(!nullable))
            .any(|t| t == spelling)
    }
}

/// How a dialect spells array types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArraySyntax {
    /// Text before the element type, e.g. `ARRAY<`.
    pub prefix: &'static str,
    /// Text after the element type, e.g. `>`.
    pub suffix: &'static str,
}

impl ArraySyntax {
    fn wrap(self, element: &str) -> String {
        format!("{}{element}{}", self.prefix, self.suffix)
    }

    fn strip(self, ddl: &str) -> Option<&str> {
        ddl.strip_prefix(self.prefix)?.strip_suffix(self.suffix)
    }
}

/// Outcome of resolving a source type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A registry entry matched.
    Canonical(String),
    /// No entry matched; the uppercased type name is used as-is.
    Override(String),
}

impl Resolution {
    /// The DDL spelling.
    #[must_use]
    pub fn ddl(&self) -> &str {
        match self {
            Self::Canonical(ddl) | Self::Override(ddl) => ddl,
        }
    }

    /// Whether a registry entry matched.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        matches!(self, Self::Canonical(_))
    }
}

/// Per-dialect table of type equivalences.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    builtins: Vec<TypeEquivalence>,
    custom: Vec<TypeEquivalence>,
    array: Option<ArraySyntax>,
}

impl TypeRegistry {
    /// Creates a registry over the given built-in entries.
    #[must_use]
    pub fn new(builtins: Vec<TypeEquivalence>) -> Self {
        Self {
            builtins,
            custom: Vec::new(),
            array: None,
        }
    }

    /// Enables array resolution with the given syntax.
    #[must_use]
    pub fn with_array_syntax(mut self, prefix: &'static str, suffix: &'static str) -> Self {
        self.array = Some(ArraySyntax { prefix, suffix });
        self
    }

    /// Registers caller-supplied entries. They are consulted after the
    /// built-ins.
    pub fn register(&mut self, entries: impl IntoIterator<Item = TypeEquivalence>) {
        self.custom.extend(entries);
    }

    fn entries(&self) -> impl Iterator<Item = &TypeEquivalence> {
        self.builtins.iter().chain(&self.custom)
    }

    fn lookup(&self, spelling: &str, nullable: bool) -> Option<&TypeEquivalence> {
        self.entries()
            .find(|e| e.spellings(nullable).iter().any(|t| t == spelling))
            .or_else(|| {
                self.entries()
                    .find(|e| e.spellings(!nullable).iter().any(|t| t == spelling))
            })
    }

    /// Returns the element type when `ddl` is an array in this dialect.
    #[must_use]
    pub fn array_element<'a>(&self, ddl: &'a str) -> Option<&'a str> {
        self.array?.strip(ddl)
    }

    /// Resolves a source type to its DDL spelling.
    ///
    /// Unknown plain type names echo back uppercased as an override.
    /// Returns `None` for generic spellings that cannot be echoed, such as
    /// a `Vec<T>` when the dialect has no arrays.
    #[must_use]
    pub fn resolve(&self, ty: &str, nullable: bool) -> Option<Resolution> {
        let spelling = compact(ty);
        if let Some(entry) = self.lookup(&spelling, nullable) {
            return Some(Resolution::Canonical(entry.ddl_type.clone()));
        }

        let (inner, _) = strip_option(&spelling);
        if let Some(element) = generic_argument(inner, "Vec") {
            let syntax = self.array?;
            let (element, element_nullable) = strip_option(element);
            return Some(match self.resolve(element, element_nullable)? {
                Resolution::Canonical(ddl) => Resolution::Canonical(syntax.wrap(&ddl)),
                Resolution::Override(ddl) => Resolution::Override(syntax.wrap(&ddl)),
            });
        }

        if inner.is_empty() || inner.contains(|c: char| matches!(c, '<' | '>' | '[' | '(' | '&'))
        {
            return None;
        }
        let name = inner.rsplit("::").next().unwrap_or(inner);
        Some(Resolution::Override(name.to_uppercase()))
    }

    /// Whether `source` is an accepted spelling for the stored type `ddl`.
    ///
    /// Size arguments are ignored: `String` is equivalent to both
    /// `VARCHAR(255)` and `VARCHAR(40)`.
    #[must_use]
    pub fn equivalent(&self, source: &str, ddl: &str, nullable: bool) -> bool {
        let spelling = compact(source);
        let ddl = normalize_ddl(ddl);

        if let Some(element_ddl) = self.array_element(&ddl) {
            let (inner, _) = strip_option(&spelling);
            return match generic_argument(inner, "Vec") {
                Some(element) => {
                    let (element, element_nullable) = strip_option(element);
                    self.equivalent(element, element_ddl, element_nullable)
                }
                None => false,
            };
        }

        let base = base_type(&ddl);
        self.entries()
            .filter(|e| e.ddl_type == ddl || base_type(&e.ddl_type) == base)
            .any(|e| e.accepts(&spelling, nullable))
    }

    /// The canonical source spelling for a stored DDL type, used to
    /// reconstruct a field from a catalog column.
    #[must_use]
    pub fn canonical_source(&self, ddl: &str, nullable: bool) -> Option<String> {
        let ddl = normalize_ddl(ddl);

        if let Some(element_ddl) = self.array_element(&ddl) {
            let element = self.canonical_source(element_ddl, false)?;
            let vec = format!("Vec<{element}>");
            return Some(if nullable { format!("Option<{vec}>") } else { vec });
        }

        let base = base_type(&ddl);
        let entry = self
            .entries()
            .find(|e| e.ddl_type == ddl)
            .or_else(|| self.entries().find(|e| base_type(&e.ddl_type) == base))?;
        entry.spellings(nullable).first().cloned()
    }
}

/// Removes all whitespace from a source type spelling.
pub(crate) fn compact(ty: &str) -> String {
    ty.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Splits `Option<T>` into `T` and `true`; anything else is returned as is.
pub(crate) fn strip_option(spelling: &str) -> (&str, bool) {
    match generic_argument(spelling, "Option") {
        Some(inner) => (inner, true),
        None => (spelling, false),
    }
}

/// Returns `T` for `Name<T>` (also `path::Name<T>`).
fn generic_argument<'a>(spelling: &'a str, name: &str) -> Option<&'a str> {
    let open = spelling.find('<')?;
    let head = &spelling[..open];
    if head != name && !head.ends_with(&format!("::{name}")) {
        return None;
    }
    spelling[open + 1..].strip_suffix('>')
}

/// Uppercases a DDL type outside of quoted text and collapses whitespace.
///
/// `decimal (10, 2)` becomes `DECIMAL(10,2)`, `bigint  unsigned` becomes
/// `BIGINT UNSIGNED`.
#[must_use]
pub fn normalize_ddl(ddl: &str) -> String {
    let mut out = String::with_capacity(ddl.len());
    let mut in_quote = false;
    let mut pending_space = false;

    for ch in ddl.trim().chars() {
        if in_quote {
            out.push(ch);
            if ch == '\'' {
                in_quote = false;
            }
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            let after_open = out.ends_with(|c: char| matches!(c, '(' | ',' | '<'));
            if !out.is_empty() && !after_open && !matches!(ch, '(' | ')' | ',' | '<' | '>') {
                out.push(' ');
            }
            pending_space = false;
        }
        if ch == '\'' {
            in_quote = true;
        }
        out.extend(ch.to_uppercase());
    }
    out
}

/// The type with its first argument list removed: `BIGINT(20) UNSIGNED`
/// becomes `BIGINT UNSIGNED`, `VARCHAR(255)` becomes `VARCHAR`.
#[must_use]
pub fn base_type(ddl: &str) -> String {
    let ddl = normalize_ddl(ddl);
    if ddl.contains('<') {
        return ddl;
    }
    match (ddl.find('('), ddl.find(')')) {
        (Some(open), Some(close)) if open < close => {
            let joined = format!("{} {}", &ddl[..open], &ddl[close + 1..]);
            normalize_ddl(&joined)
        }
        _ => ddl,
    }
}
