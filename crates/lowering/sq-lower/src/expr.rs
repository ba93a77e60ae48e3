//! Expression lowering
//!
//! Statement lowering consumes expressions only through [`ExprLowering`]:
//! lower a value expression to an IR value and its type, or a type
//! expression to a type. [`BasicExprLowering`] is the in-tree
//! implementation.

use crate::context::BindingKind;
use crate::error::LowerError;
use crate::session::Session;
use sq_ir::{Field, TypeError, TypeId, TypeKind, ValueId, ValueKind};
use sq_span::FileSpan;
use sq_syntax::{Expr, ExprKind};

/// Lowered value and its type
pub type Lowered = (ValueId, TypeId);

/// Expression-lowering contract
pub trait ExprLowering {
    /// Lower a value expression
    ///
    /// # Errors
    ///
    /// Fails on unbound names and on operations the operand types do not
    /// support.
    fn lower_expr(&mut self, session: &mut Session, expr: &Expr) -> Result<Lowered, LowerError>;

    /// Lower a type expression
    ///
    /// # Errors
    ///
    /// Fails if `expr` does not denote a type or instantiates a generic
    /// type with the wrong number of arguments.
    fn lower_type(&mut self, session: &mut Session, expr: &Expr) -> Result<TypeId, LowerError>;
}

/// Builtin type names resolved when no binding shadows them
const SCALARS: [&str; 6] = ["int", "float", "bool", "byte", "str", "void"];
/// Builtin one-argument type constructors
const CONSTRUCTORS: [&str; 3] = ["array", "ptr", "gen"];

/// In-tree expression lowerer
///
/// Handles literals, names, attribute access, indexing and binary
/// operators through operator tables, calls and constructions, tuples, and
/// type expressions including generic instantiation. Operations on values
/// of generic type are deferred and typed with a fresh placeholder.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicExprLowering;

impl ExprLowering for BasicExprLowering {
    fn lower_expr(&mut self, session: &mut Session, expr: &Expr) -> Result<Lowered, LowerError> {
        let span = session.span(expr.span);
        match &expr.kind {
            ExprKind::Bool(value) => {
                let ty = session.types.bool();
                Ok((session.module.new_value(ValueKind::Bool(*value), ty), ty))
            }
            ExprKind::Int(value) => {
                let ty = session.types.int();
                Ok((session.module.new_value(ValueKind::Int(*value), ty), ty))
            }
            ExprKind::Float(value) => {
                let ty = session.types.float();
                Ok((session.module.new_value(ValueKind::Float(*value), ty), ty))
            }
            ExprKind::Str(value) => {
                let ty = session.types.str();
                let value = session.module.new_value(ValueKind::Str(value.clone()), ty);
                Ok((value, ty))
            }
            ExprKind::Id(name) => self.name(session, name, span),
            ExprKind::Tuple(items) => self.tuple(session, items),
            ExprKind::Dot { expr, member } => {
                let recv = self.lower_expr(session, expr)?;
                self.member(session, recv, member, span)
            }
            ExprKind::Index { expr, index } => {
                let recv = self.lower_expr(session, expr)?;
                let index = self.lower_expr(session, index)?;
                self.operator(session, recv, "__getitem__", &[index], span)
            }
            ExprKind::Call { callee, args } => self.call(session, callee, args, span),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.lower_expr(session, lhs)?;
                let rhs = self.lower_expr(session, rhs)?;
                self.operator(session, lhs, op.magic(), &[rhs], span)
            }
        }
    }

    fn lower_type(&mut self, session: &mut Session, expr: &Expr) -> Result<TypeId, LowerError> {
        let span = session.span(expr.span);
        match &expr.kind {
            ExprKind::Id(name) => {
                let sym = session.intern(name);
                match session.ctx.lookup(sym).map(|binding| binding.kind) {
                    Some(BindingKind::Type(ty) | BindingKind::Generic(ty)) => Ok(ty),
                    Some(_) => Err(LowerError::NotAType {
                        name: name.clone(),
                        span,
                    }),
                    None => scalar(session, name).ok_or_else(|| LowerError::UnboundIdentifier {
                        name: name.clone(),
                        span,
                    }),
                }
            }
            ExprKind::Index { expr: base, index } => {
                let args = match &index.kind {
                    ExprKind::Tuple(items) => items
                        .iter()
                        .map(|item| self.lower_type(session, item))
                        .collect::<Result<Vec<_>, _>>()?,
                    _ => vec![self.lower_type(session, index)?],
                };
                if let ExprKind::Id(name) = &base.kind {
                    let sym = session.intern(name);
                    if session.ctx.lookup(sym).is_none() && CONSTRUCTORS.contains(&name.as_str()) {
                        return construct(session, name, &args, span);
                    }
                }
                let base = self.lower_type(session, base)?;
                session
                    .types
                    .instantiate(base, &args)
                    .map_err(|error| match error {
                        TypeError::NotAClass => LowerError::NotAType {
                            name: session.display_type(base),
                            span,
                        },
                        other => LowerError::from_type(other, span),
                    })
            }
            _ => Err(LowerError::NotAType {
                name: "expression".to_owned(),
                span,
            }),
        }
    }
}

impl BasicExprLowering {
    fn name(&mut self, session: &mut Session, name: &str, span: FileSpan) -> Result<Lowered, LowerError> {
        let sym = session.intern(name);
        let Some(kind) = session.ctx.lookup(sym).map(|binding| binding.kind) else {
            return Err(LowerError::UnboundIdentifier {
                name: name.to_owned(),
                span,
            });
        };
        match kind {
            BindingKind::Variable { var, .. } => {
                let ty = session.module.var(var).ty;
                Ok((session.module.new_value(ValueKind::Var(var), ty), ty))
            }
            BindingKind::Function(func) => {
                let ty = session.func_type(func);
                Ok((session.module.new_value(ValueKind::Func(func), ty), ty))
            }
            BindingKind::Type(_) | BindingKind::Generic(_) => Err(LowerError::Type {
                message: format!("'{name}' is a type, not a value"),
                span,
            }),
        }
    }

    fn tuple(&mut self, session: &mut Session, items: &[Expr]) -> Result<Lowered, LowerError> {
        let mut values = Vec::with_capacity(items.len());
        let mut fields = Vec::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            let (value, ty) = self.lower_expr(session, item)?;
            values.push(value);
            fields.push(Field {
                name: session.intern(&position.to_string()),
                ty,
            });
        }
        let ty = session.types.new_record(None);
        session
            .types
            .set_fields(ty, fields)
            .map_err(|error| LowerError::from_type(error, FileSpan::default()))?;
        Ok((session.module.new_value(ValueKind::Tuple(values), ty), ty))
    }

    fn member(
        &mut self,
        session: &mut Session,
        (recv, recv_ty): Lowered,
        member: &str,
        span: FileSpan,
    ) -> Result<Lowered, LowerError> {
        let name = session.intern(member);
        if session.types.is_generic(recv_ty) {
            let ty = session.fresh_generic(member);
            let value = session.module.new_value(
                ValueKind::Member {
                    recv,
                    name,
                    index: None,
                },
                ty,
            );
            return Ok((value, ty));
        }
        if let Some((index, ty)) = session.types.field(recv_ty, name) {
            let value = session.module.new_value(
                ValueKind::Member {
                    recv,
                    name,
                    index: Some(index),
                },
                ty,
            );
            return Ok((value, ty));
        }
        let owner = session.types.template(recv_ty);
        if let Some(func) = session.types.method(owner, name) {
            let ty = session.method_type(func);
            return Ok((session.module.new_value(ValueKind::Method { recv, func }, ty), ty));
        }
        Err(LowerError::Type {
            message: format!(
                "'{}' object has no attribute '{member}'",
                session.display_type(recv_ty)
            ),
            span,
        })
    }

    /// Dispatch operator `op` through the receiver's operator table
    fn operator(
        &mut self,
        session: &mut Session,
        (recv, recv_ty): Lowered,
        op: &str,
        args: &[Lowered],
        span: FileSpan,
    ) -> Result<Lowered, LowerError> {
        let values: Vec<ValueId> = args.iter().map(|(value, _)| *value).collect();
        if session.types.is_generic(recv_ty) {
            let ty = session.fresh_generic(op);
            let kind = ValueKind::Deferred {
                recv,
                op: op.to_owned(),
                args: values,
            };
            return Ok((session.module.new_value(kind, ty), ty));
        }
        let arg_types: Vec<TypeId> = args.iter().map(|(_, ty)| *ty).collect();
        let Some(entry) = session.types.find_magic(recv_ty, op, &arg_types) else {
            let shown: Vec<String> = arg_types.iter().map(|ty| session.display_type(*ty)).collect();
            return Err(LowerError::Type {
                message: format!(
                    "'{}' has no operator {op}({})",
                    session.display_type(recv_ty),
                    shown.join(", ")
                ),
                span,
            });
        };
        let kind = ValueKind::Magic {
            recv,
            op: entry.name,
            args: values,
        };
        Ok((session.module.new_value(kind, entry.ret), entry.ret))
    }

    fn call(
        &mut self,
        session: &mut Session,
        callee: &Expr,
        args: &[Expr],
        span: FileSpan,
    ) -> Result<Lowered, LowerError> {
        if names_type(session, callee) {
            let ty = self.lower_type(session, callee)?;
            let args = self.lower_all(session, args)?;
            return construct_value(session, ty, &args, span);
        }
        // `recv.op(args)` names an operator directly
        if let ExprKind::Dot { expr, member } = &callee.kind {
            let recv = self.lower_expr(session, expr)?;
            let lowered = self.lower_all(session, args)?;
            let arg_types: Vec<TypeId> = lowered.iter().map(|(_, ty)| *ty).collect();
            let name = session.intern(member);
            let owner = session.types.template(recv.1);
            let is_operator = !session.types.is_generic(recv.1)
                && session.types.field(recv.1, name).is_none()
                && session.types.method(owner, name).is_none()
                && session.types.find_magic(recv.1, member, &arg_types).is_some();
            if is_operator {
                return self.operator(session, recv, member, &lowered, span);
            }
            let callee = self.member(session, recv, member, span)?;
            return apply(session, callee, &lowered, span);
        }
        let callee = self.lower_expr(session, callee)?;
        let args = self.lower_all(session, args)?;
        apply(session, callee, &args, span)
    }

    fn lower_all(&mut self, session: &mut Session, exprs: &[Expr]) -> Result<Vec<Lowered>, LowerError> {
        exprs
            .iter()
            .map(|expr| self.lower_expr(session, expr))
            .collect()
    }
}

/// Builtin scalar named `name`
fn scalar(session: &Session, name: &str) -> Option<TypeId> {
    let types = &session.types;
    match name {
        "int" => Some(types.int()),
        "float" => Some(types.float()),
        "bool" => Some(types.bool()),
        "byte" => Some(types.byte()),
        "str" => Some(types.str()),
        "void" => Some(types.void()),
        _ => None,
    }
}

/// `array[T]`, `ptr[T]` or `gen[T]`
fn construct(session: &mut Session, name: &str, args: &[TypeId], span: FileSpan) -> Result<TypeId, LowerError> {
    let [base] = args else {
        return Err(LowerError::GenericArity {
            expected: 1,
            found: args.len(),
            span,
        });
    };
    Ok(match name {
        "array" => session.types.array(*base),
        "ptr" => session.types.ptr(*base),
        _ => session.types.generator(*base),
    })
}

/// Whether `expr` is syntactically a type (a bound type name, a builtin
/// scalar, or an instantiation of one)
fn names_type(session: &mut Session, expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Id(name) => {
            let sym = session.intern(name);
            match session.ctx.lookup(sym).map(|binding| binding.kind) {
                Some(BindingKind::Type(_) | BindingKind::Generic(_)) => true,
                Some(_) => false,
                None => SCALARS.contains(&name.as_str()) || CONSTRUCTORS.contains(&name.as_str()),
            }
        }
        ExprKind::Index { expr, .. } => names_type(session, expr),
        _ => false,
    }
}

/// Construct a value of `ty` through its `__init__` operator
fn construct_value(
    session: &mut Session,
    ty: TypeId,
    args: &[Lowered],
    span: FileSpan,
) -> Result<Lowered, LowerError> {
    let values = args.iter().map(|(value, _)| *value).collect();
    let arg_types: Vec<TypeId> = args.iter().map(|(_, ty)| *ty).collect();
    if !session.types.is_generic(ty) && session.types.find_magic(ty, "__init__", &arg_types).is_none() {
        return Err(LowerError::Type {
            message: format!("cannot construct '{}' from these arguments", session.display_type(ty)),
            span,
        });
    }
    let value = session.module.new_value(ValueKind::Construct { ty, args: values }, ty);
    Ok((value, ty))
}

/// Declared defaults of the parameters a call through `callee` supplies
///
/// Empty when the callee is not a known function.
fn declared_defaults(session: &Session, callee: ValueId) -> Vec<Option<ValueId>> {
    let (func, skip) = match session.module.value(callee).kind {
        ValueKind::Func(func) => (func, 0),
        ValueKind::Method { func, .. } => (func, 1),
        _ => return Vec::new(),
    };
    session
        .module
        .func(func)
        .params
        .iter()
        .skip(skip)
        .map(|param| param.default)
        .collect()
}

/// Call a function-typed value
///
/// Trailing parameters with a declared default may be omitted; their
/// defaults are passed in their place.
fn apply(session: &mut Session, (callee, callee_ty): Lowered, args: &[Lowered], span: FileSpan) -> Result<Lowered, LowerError> {
    let mut values: Vec<ValueId> = args.iter().map(|(value, _)| *value).collect();
    let ret = match session.types.kind(callee_ty) {
        TypeKind::Func { params, ret } => {
            let (total, ret) = (params.len(), *ret);
            let defaults = declared_defaults(session, callee);
            let required = if defaults.len() == total {
                defaults.iter().filter(|default| default.is_none()).count()
            } else {
                total
            };
            if args.len() < required || args.len() > total {
                let expected = if required == total {
                    total.to_string()
                } else {
                    format!("{required} to {total}")
                };
                return Err(LowerError::Type {
                    message: format!("expected {expected} argument(s), found {}", args.len()),
                    span,
                });
            }
            values.extend(defaults.iter().skip(args.len()).flatten());
            ret
        }
        TypeKind::Generic(_) => session.fresh_generic("call"),
        _ => {
            return Err(LowerError::Type {
                message: format!("'{}' is not callable", session.display_type(callee_ty)),
                span,
            });
        }
    };
    let value = session.module.new_value(ValueKind::Call { callee, args: values }, ret);
    Ok((value, ret))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(session: &mut Session, expr: &Expr) -> Result<Lowered, LowerError> {
        BasicExprLowering.lower_expr(session, expr)
    }

    #[test]
    fn test_binary_dispatches_through_operator_table() {
        let mut session = Session::new();
        let expr = Expr::binary(sq_syntax::BinOp::Add, Expr::int(1), Expr::int(2));
        let (value, ty) = lower(&mut session, &expr).unwrap();
        assert_eq!(ty, session.types.int());
        assert!(matches!(
            session.module.value(value).kind,
            ValueKind::Magic { op: "__add__", .. }
        ));
    }

    #[test]
    fn test_mismatched_operands_are_rejected() {
        let mut session = Session::new();
        let expr = Expr::binary(sq_syntax::BinOp::Add, Expr::int(1), Expr::str("a"));
        let error = lower(&mut session, &expr).unwrap_err();
        assert_eq!(error.to_string(), "'int' has no operator __add__(str)");
    }

    #[test]
    fn test_type_expressions() {
        let mut session = Session::new();
        let mut exprs = BasicExprLowering;
        let arr = Expr::index(Expr::id("array"), Expr::id("float"));
        let ty = exprs.lower_type(&mut session, &arr).unwrap();
        assert_eq!(session.display_type(ty), "array[float]");
        let error = exprs.lower_type(&mut session, &Expr::id("range")).unwrap_err();
        assert!(matches!(error, LowerError::NotAType { .. }));
        let error = exprs.lower_type(&mut session, &Expr::id("Missing")).unwrap_err();
        assert!(matches!(error, LowerError::UnboundIdentifier { .. }));
    }

    #[test]
    fn test_array_construction_and_copy() {
        let mut session = Session::new();
        let make = Expr::call(Expr::index(Expr::id("array"), Expr::id("int")), vec![Expr::int(4)]);
        let (_, ty) = lower(&mut session, &make).unwrap();
        assert_eq!(session.display_type(ty), "array[int]");
        let copy = Expr::call(Expr::dot(make, "__copy__"), Vec::new());
        let (value, copied) = lower(&mut session, &copy).unwrap();
        assert_eq!(copied, ty);
        assert!(matches!(
            session.module.value(value).kind,
            ValueKind::Magic { op: "__copy__", .. }
        ));
    }

    #[test]
    fn test_call_of_builtin() {
        let mut session = Session::new();
        let call = Expr::call(Expr::id("range"), vec![Expr::int(3)]);
        let (_, ty) = lower(&mut session, &call).unwrap();
        assert_eq!(session.display_type(ty), "gen[int]");
        let bad = Expr::call(Expr::id("range"), Vec::new());
        assert!(lower(&mut session, &bad).is_err());
    }
}
