//! Text rendering of lowered modules
//!
//! The format is indentation based and meant for tests and debugging; it
//! is not parsed back.

use crate::module::{BlockId, IrModule, StmtKind, ValueId, ValueKind, VarId};
use crate::types::TypeRegistry;
use crate::FuncId;
use sq_intern::Interner;

/// Render the whole module, starting from its top-level block
pub fn render_module(module: &IrModule, types: &TypeRegistry, interner: &Interner) -> String {
    render_block(module, types, interner, module.main())
}

/// Render one block and everything nested in it
pub fn render_block(
    module: &IrModule,
    types: &TypeRegistry,
    interner: &Interner,
    block: BlockId,
) -> String {
    let mut printer = Printer {
        module,
        types,
        interner,
        out: String::new(),
        indent: 0,
    };
    printer.block(block);
    printer.out
}

struct Printer<'a> {
    module: &'a IrModule,
    types: &'a TypeRegistry,
    interner: &'a Interner,
    out: String,
    indent: usize,
}

impl Printer<'_> {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, header: &str, block: BlockId) {
        self.line(header);
        self.indent += 1;
        if self.module.block(block).stmts.is_empty() {
            self.line("pass");
        } else {
            self.block(block);
        }
        self.indent -= 1;
    }

    fn block(&mut self, block: BlockId) {
        let module = self.module;
        for id in &module.block(block).stmts {
            self.stmt(&module.stmt(*id).kind);
        }
    }

    fn stmt(&mut self, kind: &StmtKind) {
        match kind {
            StmtKind::Pass => self.line("pass"),
            StmtKind::Break => self.line("break"),
            StmtKind::Continue => self.line("continue"),
            StmtKind::Expr(value) => self.line(&self.value(*value)),
            StmtKind::VarDecl { var, init } => {
                let ty = self.types.display(self.module.var(*var).ty, self.interner);
                let text = match init {
                    Some(init) => format!("var {}: {ty} = {}", self.var(*var), self.value(*init)),
                    None => format!("var {}: {ty}", self.var(*var)),
                };
                self.line(&text);
            }
            StmtKind::Assign { var, value } => {
                self.line(&format!("{} = {}", self.var(*var), self.value(*value)));
            }
            StmtKind::AssignMember {
                recv, name, value, ..
            } => {
                self.line(&format!(
                    "{}.{} = {}",
                    self.value(*recv),
                    self.interner.resolve(*name),
                    self.value(*value)
                ));
            }
            StmtKind::Del(var) => self.line(&format!("del {}", self.var(*var))),
            StmtKind::Print(value) => self.line(&format!("print {}", self.value(*value))),
            StmtKind::Assert(value) => self.line(&format!("assert {}", self.value(*value))),
            StmtKind::Throw(value) => self.line(&format!("raise {}", self.value(*value))),
            StmtKind::Return(value) => self.line(&self.keyword("return", *value)),
            StmtKind::Yield(value) => self.line(&self.keyword("yield", *value)),
            StmtKind::Prefetch { target, index } => {
                self.line(&format!(
                    "prefetch {}[{}]",
                    self.value(*target),
                    self.value(*index)
                ));
            }
            StmtKind::While(node) => {
                let header = format!("while {}:", self.value(node.cond));
                self.nested(&header, node.body);
            }
            StmtKind::For(node) => {
                let header = format!(
                    "for {}: {} in {}:",
                    self.var(node.var),
                    self.types.display(self.module.var(node.var).ty, self.interner),
                    self.value(node.iter)
                );
                self.nested(&header, node.body);
            }
            StmtKind::If(node) => {
                for (position, arm) in node.arms.iter().enumerate() {
                    let header = match (position, arm.cond) {
                        (_, None) => "else:".to_owned(),
                        (0, Some(cond)) => format!("if {}:", self.value(cond)),
                        (_, Some(cond)) => format!("elif {}:", self.value(cond)),
                    };
                    self.nested(&header, arm.body);
                }
            }
            StmtKind::Try(node) => {
                self.nested("try:", node.body);
                for arm in &node.catches {
                    let header = match arm.ty {
                        Some(ty) => format!(
                            "except {} as {}:",
                            self.types.display(ty, self.interner),
                            self.var(arm.var)
                        ),
                        None => format!("except as {}:", self.var(arm.var)),
                    };
                    self.nested(&header, arm.body);
                }
                if let Some(finally) = node.finally {
                    self.nested("finally:", finally);
                }
            }
            StmtKind::FuncDecl(func) => self.func(*func),
            StmtKind::ClassDecl { ty, body } => {
                let header = format!("class {}:", self.types.display(*ty, self.interner));
                self.nested(&header, *body);
            }
            StmtKind::Extend { ty, body } => {
                let header = format!("extend {}:", self.types.display(*ty, self.interner));
                self.nested(&header, *body);
            }
        }
    }

    fn func(&mut self, id: FuncId) {
        let module = self.module;
        let func = module.func(id);
        let params: Vec<String> = func
            .params
            .iter()
            .map(|param| {
                let head = format!(
                    "{}: {}",
                    self.interner.resolve(param.name),
                    self.types.display(param.ty, self.interner)
                );
                match param.default {
                    Some(default) => format!("{head} = {}", self.value(default)),
                    None => head,
                }
            })
            .collect();
        let mut header = format!(
            "def {}({})",
            self.interner.resolve(func.name),
            params.join(", ")
        );
        if let Some(ret) = func.ret {
            header.push_str(&format!(" -> {}", self.types.display(ret, self.interner)));
        }
        header.push(':');
        self.nested(&header, func.body);
    }

    fn keyword(&self, keyword: &str, value: Option<ValueId>) -> String {
        match value {
            Some(value) => format!("{keyword} {}", self.value(value)),
            None => keyword.to_owned(),
        }
    }

    fn var(&self, var: VarId) -> String {
        match self.module.var(var).name {
            Some(name) => self.interner.resolve(name).to_owned(),
            None => format!("%{}", u32::from(var.into_raw())),
        }
    }

    fn list(&self, values: &[ValueId]) -> String {
        values
            .iter()
            .map(|value| self.value(*value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn value(&self, id: ValueId) -> String {
        match &self.module.value(id).kind {
            ValueKind::Bool(value) => String::from(if *value { "True" } else { "False" }),
            ValueKind::Int(value) => value.to_string(),
            ValueKind::Float(value) => format!("{value:?}"),
            ValueKind::Str(value) => format!("{value:?}"),
            ValueKind::Var(var) => self.var(*var),
            ValueKind::Func(func) => self.interner.resolve(self.module.func(*func).name).to_owned(),
            ValueKind::Member { recv, name, .. } => {
                format!("{}.{}", self.value(*recv), self.interner.resolve(*name))
            }
            ValueKind::Magic { recv, op, args } => {
                format!("{}.{op}({})", self.value(*recv), self.list(args))
            }
            ValueKind::Deferred { recv, op, args } => {
                format!("{}.{op}?({})", self.value(*recv), self.list(args))
            }
            ValueKind::Call { callee, args } => {
                format!("{}({})", self.value(*callee), self.list(args))
            }
            ValueKind::Method { recv, func } => format!(
                "{}.{}",
                self.value(*recv),
                self.interner.resolve(self.module.func(*func).name)
            ),
            ValueKind::Construct { ty, args } => format!(
                "{}({})",
                self.types.display(*ty, self.interner),
                self.list(args)
            ),
            ValueKind::Tuple(items) => format!("({})", self.list(items)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{IfNode, StmtKind};
    use expect_test::expect;
    use sq_span::FileSpan;

    #[test]
    fn test_render_nested_blocks() {
        let mut interner = Interner::new();
        let types = TypeRegistry::new(&mut interner);
        let mut module = IrModule::new();
        let main = module.main();
        let span = FileSpan::default();

        let x = module.new_var(Some(interner.intern("x")), types.int(), None);
        let three = module.new_value(ValueKind::Int(3), types.int());
        module.push(main, StmtKind::VarDecl { var: x, init: Some(three) }, span);

        let read = module.new_value(ValueKind::Var(x), types.int());
        let mut node = IfNode::default();
        let then = module.add_cond(&mut node, main, Some(read));
        let shown = module.new_value(ValueKind::Var(x), types.int());
        module.push(then, StmtKind::Print(shown), span);
        module.add_cond(&mut node, main, None);
        module.push(main, StmtKind::If(node), span);

        let rendered = render_module(&module, &types, &interner);
        expect![[r#"
            var x: int = 3
            if x:
              print x
            else:
              pass
        "#]]
        .assert_eq(&rendered);
    }
}
