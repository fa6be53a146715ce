//! The declaration store.
//!
//! [`Declarations`] accumulates the named top-level constructs (imports,
//! types, constants, variables and functions) contributed by cells. It is a
//! plain value: the build pipeline clones it, merges a cell into the clone and
//! swaps the clone in only after the merged program compiled.

mod render;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cursor::Cursor;

pub use render::{DeclSpan, RenderedBlock};

/// Name of the program entry point. Never stored across cells.
pub const ENTRY_POINT: &str = "main";

/// Kind of a top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Import,
    Type,
    Const,
    Var,
    Func,
}

impl DeclKind {
    /// All kinds, in render order.
    pub const ALL: [DeclKind; 5] = [
        DeclKind::Import,
        DeclKind::Type,
        DeclKind::Const,
        DeclKind::Var,
        DeclKind::Func,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeclKind::Import => "import",
            DeclKind::Type => "type",
            DeclKind::Const => "const",
            DeclKind::Var => "var",
            DeclKind::Func => "func",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "import" => Some(DeclKind::Import),
            "type" => Some(DeclKind::Type),
            "const" => Some(DeclKind::Const),
            "var" => Some(DeclKind::Var),
            "func" => Some(DeclKind::Func),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeclKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declaration key qualified by its kind, displayed as `kind:key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeclKey {
    pub kind: DeclKind,
    pub key: String,
}

impl DeclKey {
    pub fn new(kind: DeclKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    /// Parse a `kind:key` string, as accepted by the `%remove` directive.
    pub fn parse(s: &str) -> Option<Self> {
        let (kind, key) = s.split_once(':')?;
        let kind = DeclKind::from_keyword(kind)?;
        if key.is_empty() {
            return None;
        }
        Some(Self::new(kind, key))
    }
}

impl std::fmt::Display for DeclKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

/// One imported package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub key: String,
    /// Package path, without quotes.
    pub path: String,
    /// Local name, including the special `_` and `.` names.
    pub alias: Option<String>,
    /// Cursor relative to the import spec text (`alias "path"`).
    pub cursor: Option<Cursor>,
}

impl Import {
    pub fn new(path: impl Into<String>, alias: Option<String>) -> Self {
        let path = path.into();
        let key = match alias.as_deref() {
            None => path.clone(),
            Some(a @ ("_" | ".")) => format!("{a} {path}"),
            Some(a) => a.to_string(),
        };
        Self {
            key,
            path,
            alias,
            cursor: None,
        }
    }

    /// The import spec as it appears inside an `import ( ... )` block.
    pub fn spec(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{alias} \"{}\"", self.path),
            None => format!("\"{}\"", self.path),
        }
    }
}

/// A type, constant, variable or function declaration, kept as source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decl {
    pub key: String,
    pub name: String,
    /// Full source text of the declaration.
    pub definition: String,
    /// Cursor relative to `definition`.
    pub cursor: Option<Cursor>,
    /// First line of the declaration in the file it was parsed from.
    pub origin_line: Option<usize>,
}

impl Decl {
    pub fn new(key: impl Into<String>, name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            definition: definition.into(),
            cursor: None,
            origin_line: None,
        }
    }

    /// A stub entry point, used when a cell does not define one.
    pub fn stub_entry_point() -> Self {
        Self::new(ENTRY_POINT, ENTRY_POINT, "func main() { flag.Parse() }")
    }

    /// Number of lines the definition occupies once rendered.
    pub fn line_count(&self) -> usize {
        self.definition.trim_end_matches('\n').lines().count().max(1)
    }
}

/// All declarations accumulated by a session, by kind and key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declarations {
    pub imports: FxHashMap<String, Import>,
    pub types: FxHashMap<String, Decl>,
    pub constants: FxHashMap<String, Decl>,
    pub variables: FxHashMap<String, Decl>,
    pub functions: FxHashMap<String, Decl>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of declarations of all kinds.
    pub fn len(&self) -> usize {
        self.imports.len()
            + self.types.len()
            + self.constants.len()
            + self.variables.len()
            + self.functions.len()
    }

    pub fn add_import(&mut self, import: Import) {
        self.imports.insert(import.key.clone(), import);
    }

    /// Insert a non-import declaration, replacing any previous one with the same key.
    pub fn add(&mut self, kind: DeclKind, decl: Decl) {
        if let Some(table) = self.table_mut(kind) {
            table.insert(decl.key.clone(), decl);
        }
    }

    pub fn get(&self, kind: DeclKind, key: &str) -> Option<&Decl> {
        self.table(kind).and_then(|t| t.get(key))
    }

    /// Remove a declaration. Returns whether it was present.
    pub fn remove(&mut self, key: &DeclKey) -> bool {
        match key.kind {
            DeclKind::Import => self.imports.remove(&key.key).is_some(),
            kind => self
                .table_mut(kind)
                .is_some_and(|t| t.remove(&key.key).is_some()),
        }
    }

    /// Remove and return the entry point, if this set has one.
    pub fn take_entry_point(&mut self) -> Option<Decl> {
        self.functions.remove(ENTRY_POINT)
    }

    /// Merge `other` into `self`; entries of `other` win on equal keys.
    pub fn merge_from(&mut self, other: &Declarations) {
        for (key, import) in &other.imports {
            self.imports.insert(key.clone(), import.clone());
        }
        for kind in [DeclKind::Type, DeclKind::Const, DeclKind::Var, DeclKind::Func] {
            let (Some(src), Some(dst)) = (other.table(kind), self.table_mut(kind)) else {
                continue;
            };
            for (key, decl) in src {
                dst.insert(key.clone(), decl.clone());
            }
        }
    }

    /// Drop every cursor, so that at most one declaration carries one after a merge.
    pub fn clear_cursors(&mut self) {
        for import in self.imports.values_mut() {
            import.cursor = None;
        }
        for kind in [DeclKind::Type, DeclKind::Const, DeclKind::Var, DeclKind::Func] {
            if let Some(table) = self.table_mut(kind) {
                table.values_mut().for_each(|d| d.cursor = None);
            }
        }
    }

    /// Key of the declaration that carries a cursor, if any.
    pub fn cursor_owner(&self) -> Option<DeclKey> {
        if let Some(import) = self.imports.values().find(|i| i.cursor.is_some()) {
            return Some(DeclKey::new(DeclKind::Import, import.key.clone()));
        }
        [DeclKind::Type, DeclKind::Const, DeclKind::Var, DeclKind::Func]
            .into_iter()
            .find_map(|kind| {
                self.table(kind)?
                    .values()
                    .find(|d| d.cursor.is_some())
                    .map(|d| DeclKey::new(kind, d.key.clone()))
            })
    }

    /// All keys, sorted by kind (render order) and then by key.
    pub fn keys(&self) -> Vec<DeclKey> {
        let mut keys: Vec<DeclKey> = self
            .imports
            .keys()
            .map(|k| DeclKey::new(DeclKind::Import, k.clone()))
            .collect();
        for kind in [DeclKind::Type, DeclKind::Const, DeclKind::Var, DeclKind::Func] {
            if let Some(table) = self.table(kind) {
                keys.extend(table.keys().map(|k| DeclKey::new(kind, k.clone())));
            }
        }
        keys.sort();
        keys
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn table(&self, kind: DeclKind) -> Option<&FxHashMap<String, Decl>> {
        match kind {
            DeclKind::Import => None,
            DeclKind::Type => Some(&self.types),
            DeclKind::Const => Some(&self.constants),
            DeclKind::Var => Some(&self.variables),
            DeclKind::Func => Some(&self.functions),
        }
    }

    fn table_mut(&mut self, kind: DeclKind) -> Option<&mut FxHashMap<String, Decl>> {
        match kind {
            DeclKind::Import => None,
            DeclKind::Type => Some(&mut self.types),
            DeclKind::Const => Some(&mut self.constants),
            DeclKind::Var => Some(&mut self.variables),
            DeclKind::Func => Some(&mut self.functions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(name: &str, body: &str) -> Decl {
        Decl::new(name, name, format!("func {name}() {{ {body} }}"))
    }

    #[test]
    fn test_merge_overwrites_by_key() {
        let mut committed = Declarations::new();
        committed.add(DeclKind::Func, func("f", "return"));
        committed.add(DeclKind::Var, Decl::new("x", "x", "var x = 1"));

        let mut cell = Declarations::new();
        cell.add(DeclKind::Func, func("f", "println(1)"));

        committed.merge_from(&cell);
        assert_eq!(
            committed.get(DeclKind::Func, "f").unwrap().definition,
            "func f() { println(1) }"
        );
        assert!(committed.get(DeclKind::Var, "x").is_some());
        assert_eq!(committed.len(), 2);
    }

    #[test]
    fn test_same_name_different_kind_do_not_collide() {
        let mut decls = Declarations::new();
        decls.add(DeclKind::Type, Decl::new("T", "T", "type T int"));
        decls.add(DeclKind::Func, func("T", ""));
        assert_eq!(decls.len(), 2);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut committed = Declarations::new();
        committed.add(DeclKind::Func, func("f", ""));
        let mut tentative = committed.clone();
        tentative.add(DeclKind::Func, func("g", ""));
        assert_eq!(committed.len(), 1);
        assert_eq!(tentative.len(), 2);
    }

    #[test]
    fn test_take_entry_point() {
        let mut decls = Declarations::new();
        decls.add(DeclKind::Func, func("main", "run()"));
        decls.add(DeclKind::Func, func("run", ""));
        let main = decls.take_entry_point().unwrap();
        assert_eq!(main.name, "main");
        assert!(decls.get(DeclKind::Func, "main").is_none());
        assert!(decls.take_entry_point().is_none());
    }

    #[test]
    fn test_import_keys() {
        assert_eq!(Import::new("fmt", None).key, "fmt");
        assert_eq!(Import::new("math/rand", Some("mr".into())).key, "mr");
        assert_eq!(Import::new("embed", Some("_".into())).key, "_ embed");
        assert_eq!(Import::new("math/rand", Some("mr".into())).spec(), "mr \"math/rand\"");
    }

    #[test]
    fn test_keys_sorted_and_removable() {
        let mut decls = Declarations::new();
        decls.add(DeclKind::Func, func("b", ""));
        decls.add(DeclKind::Func, func("a", ""));
        decls.add_import(Import::new("fmt", None));
        let keys: Vec<String> = decls.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["import:fmt", "func:a", "func:b"]);

        assert!(decls.remove(&DeclKey::parse("func:a").unwrap()));
        assert!(!decls.remove(&DeclKey::parse("func:a").unwrap()));
        assert!(decls.remove(&DeclKey::parse("import:fmt").unwrap()));
        assert_eq!(decls.len(), 1);
    }

    #[test]
    fn test_decl_key_parse_rejects_garbage() {
        assert!(DeclKey::parse("f").is_none());
        assert!(DeclKey::parse("method:f").is_none());
        assert!(DeclKey::parse("func:").is_none());
    }

    #[test]
    fn test_cursor_owner_and_clear() {
        let mut decls = Declarations::new();
        let mut f = func("f", "");
        f.cursor = Some(Cursor::new(0, 5));
        decls.add(DeclKind::Func, f);
        assert_eq!(decls.cursor_owner(), Some(DeclKey::new(DeclKind::Func, "f")));
        decls.clear_cursors();
        assert_eq!(decls.cursor_owner(), None);
    }
}
