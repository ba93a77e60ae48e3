//! Statement lowering
//!
//! [`StmtLowering`] walks the statement tree depth-first, emitting IR into
//! the block of the innermost scope. Every construct that owns a suite
//! pushes exactly one scope for it and pops it again on the way out, also
//! when lowering the suite fails.

use crate::context::BindingKind;
use crate::error::LowerError;
use crate::expr::{BasicExprLowering, ExprLowering, Lowered};
use crate::session::Session;
use indexmap::IndexSet;
use rustc_hash::FxHashSet;
use sq_intern::Symbol;
use sq_ir::{BlockId, Field, FuncId, FuncParam, IfNode, StmtKind, TypeId, TypeKind, VarId};
use sq_span::FileSpan;
use sq_syntax::{CatchClause, ClassDef, Expr, ExprKind, FunctionDef, IfBranch, Stmt};

/// Attribute that switches on atomic allocation for the whole compilation
const ATOMIC: &str = "atomic";

/// Lower `root` into `session` with the in-tree expression lowerer
///
/// # Errors
///
/// Returns the first error encountered; the module is left partially
/// lowered.
pub fn lower_program(session: &mut Session, root: &Stmt) -> Result<(), LowerError> {
    StmtLowering::new(session, BasicExprLowering).lower(root)
}

/// Statement lowering visitor
pub struct StmtLowering<'s, E = BasicExprLowering> {
    session: &'s mut Session,
    exprs: E,
}

impl<'s, E: ExprLowering> StmtLowering<'s, E> {
    /// Visitor emitting into `session`, delegating expressions to `exprs`
    pub fn new(session: &'s mut Session, exprs: E) -> Self {
        Self { session, exprs }
    }

    /// Session being lowered into
    pub fn session(&mut self) -> &mut Session {
        &mut *self.session
    }

    /// Lower one statement
    ///
    /// # Errors
    ///
    /// See [`LowerError`]; the first error aborts lowering.
    pub fn lower(&mut self, stmt: &Stmt) -> Result<(), LowerError> {
        tracing::trace!(kind = stmt.kind.name(), "lowering statement");
        let span = self.session.span(stmt.span);
        match &stmt.kind {
            sq_syntax::StmtKind::Suite(stmts) => {
                for stmt in stmts {
                    self.lower(stmt)?;
                }
            }
            sq_syntax::StmtKind::Pass => self.emit(StmtKind::Pass, span),
            sq_syntax::StmtKind::Break => self.emit(StmtKind::Break, span),
            sq_syntax::StmtKind::Continue => self.emit(StmtKind::Continue, span),
            sq_syntax::StmtKind::Expr(expr) => {
                let (value, _) = self.expr(expr, span)?;
                self.emit(StmtKind::Expr(value), span);
            }
            sq_syntax::StmtKind::Assign { lhs, rhs, ty } => self.assign(lhs, rhs, ty.as_ref(), span)?,
            sq_syntax::StmtKind::Del(expr) => self.delete(expr, span)?,
            sq_syntax::StmtKind::Print(expr) => {
                let (value, _) = self.expr(expr, span)?;
                self.emit(StmtKind::Print(value), span);
            }
            sq_syntax::StmtKind::Assert(expr) => {
                let (value, _) = self.expr(expr, span)?;
                self.emit(StmtKind::Assert(value), span);
            }
            sq_syntax::StmtKind::Throw(expr) => {
                let (value, _) = self.expr(expr, span)?;
                self.emit(StmtKind::Throw(value), span);
            }
            sq_syntax::StmtKind::Return(expr) => {
                let base = self
                    .session
                    .ctx
                    .base()
                    .ok_or(LowerError::ReturnOutsideFunction { span })?;
                let value = self.optional_expr(expr.as_ref(), span)?;
                self.session.module.func_mut(base).saw_return();
                self.emit(StmtKind::Return(value), span);
            }
            sq_syntax::StmtKind::Yield(expr) => {
                let base = self
                    .session
                    .ctx
                    .base()
                    .ok_or(LowerError::YieldOutsideFunction { span })?;
                let value = self.optional_expr(expr.as_ref(), span)?;
                self.session.module.func_mut(base).saw_yield();
                self.emit(StmtKind::Yield(value), span);
            }
            sq_syntax::StmtKind::Prefetch(expr) => self.prefetch(expr, span)?,
            sq_syntax::StmtKind::TypeAlias { name, expr } => {
                let ty = self.ty(expr, span)?;
                let name = self.session.intern(name);
                self.session.ctx.add(name, BindingKind::Type(ty));
            }
            sq_syntax::StmtKind::While { cond, suite } => {
                let (cond, _) = self.expr(cond, span)?;
                let parent = self.session.ctx.block();
                let node = self.session.module.new_while(parent, cond);
                self.in_block(node.body, |this| this.lower(suite))?;
                self.emit(StmtKind::While(node), span);
            }
            sq_syntax::StmtKind::For { var, iter, suite } => self.for_loop(var, iter, suite, span)?,
            sq_syntax::StmtKind::If(branches) => self.if_chain(branches, span)?,
            sq_syntax::StmtKind::Try {
                suite,
                catches,
                finally,
            } => self.try_catch(suite, catches, finally.as_deref(), span)?,
            sq_syntax::StmtKind::Global(name) => self.global(name, span)?,
            sq_syntax::StmtKind::Function(def) => {
                self.function(def, span)?;
            }
            sq_syntax::StmtKind::Class(def) => self.class(def, span)?,
            sq_syntax::StmtKind::Extend { what, suite } => self.extend(what, suite, span)?,
            sq_syntax::StmtKind::Match { .. }
            | sq_syntax::StmtKind::Import { .. }
            | sq_syntax::StmtKind::ExternImport { .. } => {
                return Err(LowerError::NotImplemented {
                    construct: stmt.kind.name(),
                    span,
                });
            }
        }
        Ok(())
    }

    fn emit(&mut self, kind: StmtKind, span: FileSpan) {
        let block = self.session.ctx.block();
        self.session.module.push(block, kind, span);
    }

    fn expr(&mut self, expr: &Expr, span: FileSpan) -> Result<Lowered, LowerError> {
        self.exprs
            .lower_expr(self.session, expr)
            .map_err(|error| error.with_span(span))
    }

    fn optional_expr(&mut self, expr: Option<&Expr>, span: FileSpan) -> Result<Option<sq_ir::ValueId>, LowerError> {
        expr.map(|expr| self.expr(expr, span).map(|(value, _)| value))
            .transpose()
    }

    fn ty(&mut self, expr: &Expr, span: FileSpan) -> Result<TypeId, LowerError> {
        self.exprs
            .lower_type(self.session, expr)
            .map_err(|error| error.with_span(span))
    }

    /// Run `body` inside a scope emitting into `block`
    fn in_block<T>(
        &mut self,
        block: BlockId,
        body: impl FnOnce(&mut Self) -> Result<T, LowerError>,
    ) -> Result<T, LowerError> {
        self.session.ctx.add_block(block);
        let result = body(self);
        self.session.ctx.pop_block();
        result
    }

    /// Run `body` inside a type body scope with `ty` as the enclosing type
    fn in_type_body<T>(
        &mut self,
        block: BlockId,
        ty: TypeId,
        body: impl FnOnce(&mut Self) -> Result<T, LowerError>,
    ) -> Result<T, LowerError> {
        self.in_block(block, |this| {
            this.session.ctx.set_enclosing_type(Some(ty));
            body(this)
        })
    }

    /// Bind `name` to `var` in the current scope
    ///
    /// Variables bound at module level are global.
    fn bind_var(&mut self, name: Symbol, var: VarId) {
        let ctx = &mut self.session.ctx;
        let global = ctx.is_toplevel();
        let base = ctx.base();
        ctx.add(name, BindingKind::Variable { var, global, base });
        if global {
            self.session.module.set_global(var);
        }
    }

    fn assign(&mut self, lhs: &Expr, rhs: &Expr, ty: Option<&Expr>, span: FileSpan) -> Result<(), LowerError> {
        match &lhs.kind {
            ExprKind::Id(name) => {
                let sym = self.session.intern(name);
                let existing = self.session.ctx.lookup(sym).and_then(|binding| binding.var());
                if let Some(var) = existing {
                    let (value, _) = self.expr(rhs, span)?;
                    self.emit(StmtKind::Assign { var, value }, span);
                    return Ok(());
                }
                let (value, inferred) = self.expr(rhs, span)?;
                let ty = match ty {
                    Some(ty) => self.ty(ty, span)?,
                    None => inferred,
                };
                let base = self.session.ctx.base();
                let var = self.session.module.new_var(Some(sym), ty, base);
                self.bind_var(sym, var);
                self.emit(
                    StmtKind::VarDecl {
                        var,
                        init: Some(value),
                    },
                    span,
                );
                Ok(())
            }
            ExprKind::Dot { expr, member } => {
                let (recv, recv_ty) = self.expr(expr, span)?;
                let (value, _) = self.expr(rhs, span)?;
                let name = self.session.intern(member);
                let index = if self.session.types.is_generic(recv_ty) {
                    None
                } else {
                    let (index, _) = self.session.types.field(recv_ty, name).ok_or_else(|| LowerError::Type {
                        message: format!(
                            "'{}' object has no attribute '{member}'",
                            self.session.display_type(recv_ty)
                        ),
                        span,
                    })?;
                    Some(index)
                };
                self.emit(
                    StmtKind::AssignMember {
                        recv,
                        name,
                        index,
                        value,
                    },
                    span,
                );
                Ok(())
            }
            _ => Err(LowerError::InvalidAssignment { span }),
        }
    }

    fn delete(&mut self, expr: &Expr, span: FileSpan) -> Result<(), LowerError> {
        let ExprKind::Id(name) = &expr.kind else {
            return Err(LowerError::InvalidDeletion { span });
        };
        let sym = self.session.intern(name);
        let var = self
            .session
            .ctx
            .lookup(sym)
            .and_then(|binding| binding.var())
            .ok_or(LowerError::InvalidDeletion { span })?;
        self.session.ctx.remove(sym);
        self.emit(StmtKind::Del(var), span);
        Ok(())
    }

    fn prefetch(&mut self, expr: &Expr, span: FileSpan) -> Result<(), LowerError> {
        let ExprKind::Index { expr: target, index } = &expr.kind else {
            return Err(LowerError::PrefetchShape { span });
        };
        let base = self
            .session
            .ctx
            .base()
            .ok_or(LowerError::PrefetchOutsideFunction { span })?;
        let (target, _) = self.expr(target, span)?;
        let (index, _) = self.expr(index, span)?;
        self.session.module.func_mut(base).saw_prefetch();
        self.emit(StmtKind::Prefetch { target, index }, span);
        Ok(())
    }

    fn for_loop(&mut self, var: &Expr, iter: &Expr, suite: &Stmt, span: FileSpan) -> Result<(), LowerError> {
        let (iter, iter_ty) = self.expr(iter, span)?;
        let ExprKind::Id(name) = &var.kind else {
            return Err(LowerError::InvalidForTarget { span });
        };
        let elem = match self.session.types.iter_elem(iter_ty) {
            Some(elem) => elem,
            None if self.session.types.is_generic(iter_ty) => self.session.fresh_generic(name),
            None => {
                return Err(LowerError::Type {
                    message: format!("'{}' object is not iterable", self.session.display_type(iter_ty)),
                    span,
                });
            }
        };
        let sym = self.session.intern(name);
        let parent = self.session.ctx.block();
        let node = self.session.module.new_for(parent, iter, elem);
        self.session.module.name_var(node.var, sym);
        self.in_block(node.body, |this| {
            this.bind_var(sym, node.var);
            this.lower(suite)
        })?;
        self.emit(StmtKind::For(node), span);
        Ok(())
    }

    fn if_chain(&mut self, branches: &[IfBranch], span: FileSpan) -> Result<(), LowerError> {
        let parent = self.session.ctx.block();
        let mut node = IfNode::default();
        for branch in branches {
            let cond = self.optional_expr(branch.cond.as_ref(), span)?;
            let body = self.session.module.add_cond(&mut node, parent, cond);
            self.in_block(body, |this| this.lower(&branch.suite))?;
        }
        self.emit(StmtKind::If(node), span);
        Ok(())
    }

    fn try_catch(
        &mut self,
        suite: &Stmt,
        catches: &[CatchClause],
        finally: Option<&Stmt>,
        span: FileSpan,
    ) -> Result<(), LowerError> {
        let parent = self.session.ctx.block();
        let mut node = self.session.module.new_try(parent);
        self.in_block(node.body, |this| this.lower(suite))?;
        for catch in catches {
            let filter = catch.exc.as_ref().map(|exc| self.ty(exc, span)).transpose()?;
            let var_ty = match filter {
                Some(ty) => ty,
                None => self.session.fresh_generic(&catch.var),
            };
            let (body, var) = self.session.module.add_catch(&mut node, parent, filter, var_ty);
            let name = self.session.intern(&catch.var);
            self.session.module.name_var(var, name);
            self.in_block(body, |this| {
                this.bind_var(name, var);
                this.lower(&catch.suite)
            })?;
        }
        if let Some(finally) = finally {
            let block = self.session.module.finally_block(&mut node, parent);
            self.in_block(block, |this| this.lower(finally))?;
        }
        self.emit(StmtKind::Try(node), span);
        Ok(())
    }

    /// `global name`
    ///
    /// Re-binds a module-level variable in the current scope. Only the
    /// immediate base is compared: if the binding already belongs to the
    /// current base this is a no-op.
    fn global(&mut self, name: &str, span: FileSpan) -> Result<(), LowerError> {
        let sym = self.session.intern(name);
        let ctx = &mut self.session.ctx;
        match ctx.find(sym).map(|binding| binding.kind) {
            Some(BindingKind::Variable {
                var,
                global: true,
                base: owner,
            }) => {
                let base = ctx.base();
                if owner != base {
                    ctx.add(
                        sym,
                        BindingKind::Variable {
                            var,
                            global: true,
                            base,
                        },
                    );
                }
                Ok(())
            }
            _ => Err(LowerError::UnboundIdentifier {
                name: name.to_owned(),
                span,
            }),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, def, span), fields(name = %def.name))]
    fn function(&mut self, def: &FunctionDef, span: FileSpan) -> Result<FuncId, LowerError> {
        let name = self.session.intern(&def.name);
        let func = self.session.module.new_function(name);
        let enclosing_type = self.session.ctx.enclosing_type();
        if let Some(ty) = enclosing_type {
            self.session.types.add_method(ty, name, func);
            self.session.module.func_mut(func).method_of = Some(ty);
        } else {
            if !self.session.ctx.is_toplevel() {
                self.session.module.func_mut(func).enclosing = self.session.ctx.base();
            }
            let params = def.params.iter().map(|param| self.session.intern(&param.name)).collect();
            self.session
                .ctx
                .add_with_params(name, BindingKind::Function(func), params);
        }

        let body = self.session.module.func(func).body;
        self.session.ctx.add_function_block(body, func);
        let result = self.function_body(def, func, enclosing_type, span);
        self.session.ctx.pop_block();
        result?;

        self.emit(StmtKind::FuncDecl(func), span);
        Ok(func)
    }

    fn function_body(
        &mut self,
        def: &FunctionDef,
        func: FuncId,
        enclosing_type: Option<TypeId>,
        span: FileSpan,
    ) -> Result<(), LowerError> {
        // Untyped leading `self` of a method is the receiver
        let receiver = enclosing_type.filter(|_| {
            def.params
                .first()
                .is_some_and(|param| param.name == "self" && param.ty.is_none())
        });

        let mut seen = FxHashSet::default();
        let mut has_default = false;
        let mut generic_names: IndexSet<String> = def.generics.iter().cloned().collect();
        for (position, param) in def.params.iter().enumerate() {
            if !seen.insert(param.name.as_str()) {
                return Err(LowerError::DuplicateArgument {
                    name: param.name.clone(),
                    span,
                });
            }
            if param.default.is_some() {
                has_default = true;
            } else if has_default {
                return Err(LowerError::MissingDefault {
                    name: param.name.clone(),
                    span,
                });
            }
            if param.ty.is_none() && !(position == 0 && receiver.is_some()) {
                generic_names.insert(implicit_generic(&param.name));
            }
        }

        let mut generics = Vec::with_capacity(generic_names.len());
        for generic in &generic_names {
            let ty = self.session.fresh_generic(generic);
            let sym = self.session.intern(generic);
            self.session.ctx.add(sym, BindingKind::Generic(ty));
            generics.push(ty);
        }
        self.session.module.func_mut(func).generics = generics;

        let mut params = Vec::with_capacity(def.params.len());
        for (position, param) in def.params.iter().enumerate() {
            let ty = match (&param.ty, receiver) {
                (Some(ty), _) => self.ty(ty, span)?,
                (None, Some(receiver)) if position == 0 => receiver,
                (None, _) => self.ty(&Expr::id(&implicit_generic(&param.name)), span)?,
            };
            let default = self.optional_expr(param.default.as_ref(), span)?;
            let name = self.session.intern(&param.name);
            let var = self.session.module.new_var(Some(name), ty, Some(func));
            params.push(FuncParam {
                name,
                ty,
                default,
                var,
            });
        }
        let ret = def.ret.as_ref().map(|ret| self.ty(ret, span)).transpose()?;
        let mut attributes = Vec::with_capacity(def.attributes.len());
        for attribute in &def.attributes {
            if attribute == ATOMIC {
                self.session.ctx.set_flag(ATOMIC, true);
            }
            attributes.push(self.session.intern(attribute));
        }

        let bound: Vec<(Symbol, VarId)> = params.iter().map(|param| (param.name, param.var)).collect();
        let decl = self.session.module.func_mut(func);
        decl.params = params;
        decl.ret = ret;
        decl.attributes = attributes;
        for (name, var) in bound {
            self.bind_var(name, var);
        }
        self.lower(&def.suite)
    }

    #[tracing::instrument(level = "debug", skip(self, def, span), fields(name = %def.name))]
    fn class(&mut self, def: &ClassDef, span: FileSpan) -> Result<(), LowerError> {
        let name = self.session.intern(&def.name);
        let ty = if def.is_type {
            self.session.types.new_record(Some(name))
        } else {
            self.session.types.new_class(name)
        };
        self.session.ctx.add(name, BindingKind::Type(ty));

        let parent = self.session.ctx.block();
        let body = self.session.module.new_block(parent);
        self.in_type_body(body, ty, |this| {
            if def.is_type {
                this.value_type(def, ty, span)?;
            } else {
                this.reference_type(def, ty, span)?;
            }
            this.lower(&def.suite)
        })?;
        self.emit(StmtKind::ClassDecl { ty, body }, span);
        Ok(())
    }

    fn value_type(&mut self, def: &ClassDef, ty: TypeId, span: FileSpan) -> Result<(), LowerError> {
        if !def.generics.is_empty() {
            return Err(LowerError::ValueType {
                message: "types cannot be generic".to_owned(),
                span,
            });
        }
        if def.members.is_empty() {
            return Err(LowerError::ValueType {
                message: "types need at least one member".to_owned(),
                span,
            });
        }
        let fields = self.members(def, span)?;
        self.session
            .types
            .set_fields(ty, fields)
            .map_err(|error| LowerError::from_type(error, span))
    }

    fn reference_type(&mut self, def: &ClassDef, ty: TypeId, span: FileSpan) -> Result<(), LowerError> {
        let names: IndexSet<&str> = def.generics.iter().map(String::as_str).collect();
        let mut generics = Vec::with_capacity(names.len());
        for generic in names {
            let placeholder = self.session.fresh_generic(generic);
            let sym = self.session.intern(generic);
            self.session.ctx.add(sym, BindingKind::Generic(placeholder));
            generics.push(placeholder);
        }
        self.session
            .types
            .set_generics(ty, generics)
            .map_err(|error| LowerError::from_type(error, span))?;

        let fields = self.members(def, span)?;
        let contents = self.session.types.new_record(None);
        let types = &mut self.session.types;
        types
            .set_fields(contents, fields)
            .and_then(|()| types.set_contents(ty, contents))
            .map_err(|error| LowerError::from_type(error, span))
    }

    /// Field table of a class or value type, in declaration order
    fn members(&mut self, def: &ClassDef, span: FileSpan) -> Result<Vec<Field>, LowerError> {
        def.members
            .iter()
            .map(|member| {
                let Some(ty) = &member.ty else {
                    return Err(LowerError::ValueType {
                        message: format!("type information needed for '{}'", member.name),
                        span,
                    });
                };
                Ok(Field {
                    name: self.session.intern(&member.name),
                    ty: self.ty(ty, span)?,
                })
            })
            .collect()
    }

    fn extend(&mut self, what: &Expr, suite: &Stmt, span: FileSpan) -> Result<(), LowerError> {
        let (target, names) = match &what.kind {
            ExprKind::Id(_) => (what, Vec::new()),
            ExprKind::Index { expr, index } => {
                let items: Vec<&Expr> = match &index.kind {
                    ExprKind::Tuple(items) => items.iter().collect(),
                    _ => vec![index.as_ref()],
                };
                let names = items
                    .into_iter()
                    .map(|item| match &item.kind {
                        ExprKind::Id(name) => Ok(name.as_str()),
                        _ => Err(LowerError::InvalidGeneric { span }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                (expr.as_ref(), names)
            }
            _ => {
                return Err(LowerError::NotAType {
                    name: "expression".to_owned(),
                    span,
                });
            }
        };
        let ty = self.ty(target, span)?;
        if !matches!(self.session.types.kind(ty), TypeKind::Class(_) | TypeKind::Record(_)) {
            return Err(LowerError::NotAType {
                name: self.session.display_type(ty),
                span,
            });
        }
        let slots = self.session.types.generics(ty).to_vec();
        if slots.len() != names.len() {
            return Err(LowerError::GenericArity {
                expected: slots.len(),
                found: names.len(),
                span,
            });
        }

        let parent = self.session.ctx.block();
        let body = self.session.module.new_block(parent);
        self.in_type_body(body, ty, |this| {
            for (name, slot) in names.iter().zip(slots) {
                let sym = this.session.intern(name);
                this.session.ctx.add(sym, BindingKind::Generic(slot));
            }
            this.lower(suite)
        })?;
        self.emit(StmtKind::Extend { ty, body }, span);
        Ok(())
    }
}

/// Name of the placeholder standing in for the type of untyped parameter `param`
fn implicit_generic(param: &str) -> String {
    format!("'{param}")
}
