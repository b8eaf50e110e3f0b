//! Two-scope symbol table.
use std::{collections::BTreeMap, fmt};

use smol_str::SmolStr;

use crate::error::{JackError, JackResult};

use super::vm::Segment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: SmolStr,
    /// Declared type, either a primitive or a class name.
    pub ty: SmolStr,
    pub kind: SymbolKind,
    /// Zero-based position among symbols of the same kind.
    pub index: u16,
}

/// Storage kind of a declared variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Static,
    Field,
    Argument,
    Local,
}

impl SymbolKind {
    /// Virtual memory segment where variables of this kind live.
    #[rustfmt::skip]
    pub fn segment(&self) -> Segment {
        match self {
            Self::Static   => Segment::Static,
            Self::Field    => Segment::This,
            Self::Argument => Segment::Argument,
            Self::Local    => Segment::Local,
        }
    }

    /// Whether the kind lives as long as the class.
    #[inline]
    pub fn is_class_scope(&self) -> bool {
        matches!(self, Self::Static | Self::Field)
    }
}

impl fmt::Display for SymbolKind {
    #[rustfmt::skip]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Static   => write!(f, "static"),
            Self::Field    => write!(f, "field"),
            Self::Argument => write!(f, "argument"),
            Self::Local    => write!(f, "local"),
        }
    }
}

/// Symbol table with a class scope and a subroutine scope.
///
/// Statics and fields are defined in the class scope, which lives for
/// the whole compilation unit. Arguments and locals are defined in the
/// subroutine scope, which is emptied at the start of every subroutine.
///
/// Lookups search the subroutine scope first, so an argument or local
/// shadows a field or static of the same name.
#[derive(Debug, Default)]
pub struct SymbolTable {
    class: BTreeMap<SmolStr, Symbol>,
    subroutine: BTreeMap<SmolStr, Symbol>,
}

impl SymbolTable {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new subroutine scope, forgetting previous arguments and locals.
    pub fn start_subroutine(&mut self) {
        self.subroutine.clear();
    }

    /// Define a new symbol, returning the index assigned to it.
    ///
    /// # Errors
    ///
    /// Returns [`JackError::DuplicateDefinition`] when the name already
    /// exists in the scope the kind belongs to.
    pub fn define(&mut self, name: impl Into<SmolStr>, ty: impl Into<SmolStr>, kind: SymbolKind) -> JackResult<u16> {
        let name = name.into();
        let index = self.var_count(kind);

        let scope = if kind.is_class_scope() {
            &mut self.class
        } else {
            &mut self.subroutine
        };

        if scope.contains_key(&name) {
            return Err(JackError::DuplicateDefinition { name, location: None });
        }

        scope.insert(
            name.clone(),
            Symbol {
                name,
                ty: ty.into(),
                kind,
                index,
            },
        );

        Ok(index)
    }

    /// Lookup a symbol according to the scope rules.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.subroutine.get(name).or_else(|| self.class.get(name))
    }

    /// Storage kind of the named symbol, `None` if it isn't defined.
    #[inline]
    pub fn kind_of(&self, name: &str) -> Option<SymbolKind> {
        self.lookup(name).map(|symbol| symbol.kind)
    }

    pub fn type_of(&self, name: &str) -> JackResult<&str> {
        self.resolve(name).map(|symbol| symbol.ty.as_str())
    }

    pub fn index_of(&self, name: &str) -> JackResult<u16> {
        self.resolve(name).map(|symbol| symbol.index)
    }

    /// Number of symbols of the given kind currently defined.
    pub fn var_count(&self, kind: SymbolKind) -> u16 {
        let scope = if kind.is_class_scope() {
            &self.class
        } else {
            &self.subroutine
        };
        scope.values().filter(|symbol| symbol.kind == kind).count() as u16
    }

    fn resolve(&self, name: &str) -> JackResult<&Symbol> {
        self.lookup(name).ok_or_else(|| JackError::UndefinedSymbol {
            name: SmolStr::from(name),
            location: None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_indices_per_kind() {
        let mut table = SymbolTable::new();

        assert_eq!(table.define("x", "int", SymbolKind::Field).unwrap(), 0);
        assert_eq!(table.define("count", "int", SymbolKind::Static).unwrap(), 0);
        assert_eq!(table.define("y", "int", SymbolKind::Field).unwrap(), 1);
        assert_eq!(table.define("a", "Array", SymbolKind::Argument).unwrap(), 0);
        assert_eq!(table.define("i", "int", SymbolKind::Local).unwrap(), 0);
        assert_eq!(table.define("b", "boolean", SymbolKind::Argument).unwrap(), 1);
        assert_eq!(table.define("j", "int", SymbolKind::Local).unwrap(), 1);

        assert_eq!(table.var_count(SymbolKind::Field), 2);
        assert_eq!(table.var_count(SymbolKind::Static), 1);
        assert_eq!(table.var_count(SymbolKind::Argument), 2);
        assert_eq!(table.var_count(SymbolKind::Local), 2);

        assert_eq!(table.index_of("y").unwrap(), 1);
        assert_eq!(table.type_of("a").unwrap(), "Array");
        assert_eq!(table.kind_of("b"), Some(SymbolKind::Argument));
        assert_eq!(table.kind_of("nope"), None);
    }

    #[test]
    fn test_duplicate_definition() {
        let mut table = SymbolTable::new();
        table.define("x", "int", SymbolKind::Field).unwrap();

        assert!(matches!(
            table.define("x", "char", SymbolKind::Static),
            Err(JackError::DuplicateDefinition { .. })
        ));

        table.define("a", "int", SymbolKind::Argument).unwrap();
        assert!(matches!(
            table.define("a", "int", SymbolKind::Local),
            Err(JackError::DuplicateDefinition { .. })
        ));

        // failed definitions don't consume an index
        assert_eq!(table.define("b", "int", SymbolKind::Local).unwrap(), 0);
    }

    #[test]
    fn test_subroutine_shadows_class() {
        let mut table = SymbolTable::new();
        table.define("x", "int", SymbolKind::Field).unwrap();
        table.define("x", "boolean", SymbolKind::Local).unwrap();

        assert_eq!(table.kind_of("x"), Some(SymbolKind::Local));
        assert_eq!(table.type_of("x").unwrap(), "boolean");

        table.start_subroutine();
        assert_eq!(table.kind_of("x"), Some(SymbolKind::Field));
    }

    #[test]
    fn test_start_subroutine_keeps_class_scope() {
        let mut table = SymbolTable::new();
        table.define("s", "int", SymbolKind::Static).unwrap();
        table.define("f", "int", SymbolKind::Field).unwrap();
        table.define("a", "int", SymbolKind::Argument).unwrap();
        table.define("l", "int", SymbolKind::Local).unwrap();

        table.start_subroutine();

        assert_eq!(table.var_count(SymbolKind::Argument), 0);
        assert_eq!(table.var_count(SymbolKind::Local), 0);
        assert_eq!(table.var_count(SymbolKind::Static), 1);
        assert_eq!(table.var_count(SymbolKind::Field), 1);
        assert!(table.lookup("a").is_none());

        // indices restart in the new scope
        assert_eq!(table.define("b", "int", SymbolKind::Argument).unwrap(), 0);
    }

    #[test]
    fn test_undefined_symbol() {
        let table = SymbolTable::new();
        assert!(matches!(
            table.type_of("ghost"),
            Err(JackError::UndefinedSymbol { ref name, location: None }) if name == "ghost"
        ));
        assert!(table.index_of("ghost").is_err());
    }

    #[test]
    fn test_segments() {
        assert_eq!(SymbolKind::Static.segment(), Segment::Static);
        assert_eq!(SymbolKind::Field.segment(), Segment::This);
        assert_eq!(SymbolKind::Argument.segment(), Segment::Argument);
        assert_eq!(SymbolKind::Local.segment(), Segment::Local);
    }
}
