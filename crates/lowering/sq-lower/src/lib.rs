//! Statement lowering
//!
//! Translates a parsed statement tree into the IR of `sq-ir`, resolving
//! names through a scoped [`Context`], declaring and specializing types in
//! the session's type registry, and delegating expressions to an
//! [`ExprLowering`] implementation.
//!
//! ```
//! use sq_lower::{lower_program, Session};
//! use sq_syntax::{Expr, Stmt};
//!
//! let mut session = Session::new();
//! let program = Stmt::suite(vec![Stmt::assign(Expr::id("x"), Expr::int(1))]);
//! lower_program(&mut session, &program).unwrap();
//! assert_eq!(session.render(), "var x: int = 1\n");
//! ```

pub mod context;
pub mod error;
pub mod expr;
pub mod lower;
pub mod session;

pub use context::{Binding, BindingKind, Context};
pub use error::{ErrorKind, LowerError};
pub use expr::{BasicExprLowering, ExprLowering, Lowered};
pub use lower::{lower_program, StmtLowering};
pub use session::{Session, SessionOptions};
