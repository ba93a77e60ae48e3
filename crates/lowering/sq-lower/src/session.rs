//! Per-compilation state
//!
//! A [`Session`] owns everything one compilation unit produces: interned
//! names, the type registry, the lowered module and the scope stack. It is
//! threaded by `&mut` through statement and expression lowering; nothing is
//! shared between sessions.

use crate::context::{BindingKind, Context};
use sq_intern::{Interner, Symbol};
use sq_ir::{FuncId, FuncParam, IrModule, TypeId, TypeRegistry};
use sq_span::{FileId, FileSpan, Span};

/// Knobs for a new [`Session`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// File attached to every reported position
    pub file: FileId,
    /// Bind the builtin functions in the module scope
    pub prelude: bool,
    /// Compilation-wide flags set before lowering starts
    pub flags: Vec<String>,
    /// Bytes per pointer on the target
    pub pointer_width: u32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            file: FileId::default(),
            prelude: true,
            flags: Vec::new(),
            pointer_width: 8,
        }
    }
}

/// State of one compilation unit
#[derive(Debug)]
pub struct Session {
    /// Interned names
    pub interner: Interner,
    /// All types
    pub types: TypeRegistry,
    /// Lowered output
    pub module: IrModule,
    /// Scope stack
    pub ctx: Context,
    /// File positions are reported against
    pub file: FileId,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Session with default options
    pub fn new() -> Self {
        Self::with_options(SessionOptions::default())
    }

    /// Session configured by `options`
    pub fn with_options(options: SessionOptions) -> Self {
        let mut interner = Interner::new();
        let types = TypeRegistry::with_pointer_width(&mut interner, options.pointer_width);
        let module = IrModule::new();
        let mut ctx = Context::new(module.main());
        for flag in &options.flags {
            ctx.set_flag(flag, true);
        }
        let mut session = Self {
            interner,
            types,
            module,
            ctx,
            file: options.file,
        };
        if options.prelude {
            session.install_prelude();
        }
        session
    }

    /// Attach the session's file to `span`
    pub fn span(&self, span: Span) -> FileSpan {
        FileSpan::new(self.file, span)
    }

    /// Intern `name`
    pub fn intern(&mut self, name: &str) -> Symbol {
        self.interner.intern(name)
    }

    /// Text of `sym`
    pub fn resolve(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    /// Fresh generic placeholder named `name`
    pub fn fresh_generic(&mut self, name: &str) -> TypeId {
        let name = self.interner.intern(name);
        self.types.new_generic(name)
    }

    /// Human-readable type name
    pub fn display_type(&self, ty: TypeId) -> String {
        self.types.display(ty, &self.interner)
    }

    /// Render the lowered module
    pub fn render(&self) -> String {
        sq_ir::pretty::render_module(&self.module, &self.types, &self.interner)
    }

    /// Function type of `func`; an unannotated return counts as `void`
    pub fn func_type(&mut self, func: FuncId) -> TypeId {
        let decl = self.module.func(func);
        let params = decl.params.iter().map(|param| param.ty).collect();
        let ret = decl.ret.unwrap_or_else(|| self.types.void());
        self.types.func(params, ret)
    }

    /// Type of `func` bound to a receiver: the receiver parameter is dropped
    pub fn method_type(&mut self, func: FuncId) -> TypeId {
        let decl = self.module.func(func);
        let params = decl.params.iter().skip(1).map(|param| param.ty).collect();
        let ret = decl.ret.unwrap_or_else(|| self.types.void());
        self.types.func(params, ret)
    }

    fn install_prelude(&mut self) {
        let int = self.types.int();
        let range_ret = self.types.generator(int);
        self.builtin("range", &[("stop", None)], range_ret);
        let int_ret = self.types.int();
        self.builtin("len", &[("value", Some("'value"))], int_ret);
    }

    /// Declare builtin `name`; parameters with a generic name get a fresh
    /// placeholder, the others are `int`
    fn builtin(&mut self, name: &str, params: &[(&str, Option<&str>)], ret: TypeId) -> FuncId {
        let sym = self.interner.intern(name);
        let func = self.module.new_function(sym);
        let mut generics = Vec::new();
        let mut decls = Vec::new();
        for (param, generic) in params {
            let ty = match generic {
                Some(generic) => {
                    let ty = self.fresh_generic(generic);
                    generics.push(ty);
                    ty
                }
                None => self.types.int(),
            };
            let param = self.interner.intern(param);
            let var = self.module.new_var(Some(param), ty, Some(func));
            decls.push(FuncParam {
                name: param,
                ty,
                default: None,
                var,
            });
        }
        let names = decls.iter().map(|param| param.name).collect();
        let decl = self.module.func_mut(func);
        decl.params = decls;
        decl.generics = generics;
        decl.ret = Some(ret);
        decl.builtin = true;
        self.ctx
            .add_with_params(sym, BindingKind::Function(func), names);
        func
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_binds_builtins() {
        let mut session = Session::new();
        let range = session.intern("range");
        let binding = session.ctx.find(range).cloned().unwrap();
        let BindingKind::Function(func) = binding.kind else {
            panic!("range is not a function");
        };
        assert!(session.module.func(func).builtin);
        let ty = session.func_type(func);
        assert_eq!(session.display_type(ty), "function[int, gen[int]]");
    }

    #[test]
    fn test_options_without_prelude() {
        let mut session = Session::with_options(SessionOptions {
            prelude: false,
            flags: vec!["debug".to_owned()],
            ..SessionOptions::default()
        });
        let range = session.intern("range");
        assert!(session.ctx.find(range).is_none());
        assert!(session.ctx.flag("debug"));
    }

    #[test]
    fn test_span_carries_file() {
        let session = Session::with_options(SessionOptions {
            file: FileId(3),
            ..SessionOptions::default()
        });
        let span = session.span(Span::new(0, 1).at(2, 5));
        assert_eq!(span.to_string(), "#3:2:5");
    }
}
