//! Deferred parser construction
//!
//!     Grammar text is parsed before any rule name is known to be valid,
//!     but building a combinator ("an alternation of these compiled
//!     sub-parsers") needs the rule scope to exist. A [Quote] bridges the
//!     gap: it describes what to construct — a build function plus
//!     arguments that may themselves be pending quotes — and is resolved
//!     exactly once, against the live compile context, when the compiler
//!     walks a rule body.
//!
//!     Resolution is depth-first and left-to-right: nested quotes resolve
//!     first, then the build function runs over the resolved parsers. A
//!     build function that needs the scope or the terminal registry is
//!     marked `with_context` and receives the compile context as its
//!     leading argument; everything else stays a pure function of its
//!     arguments.

use std::rc::Rc;

use crate::lang::combinators::Parser;
use crate::lang::compiler::CompileCtx;
use crate::lang::error::LangError;

type PlainFn = Rc<dyn Fn(Vec<Parser>) -> Result<Parser, LangError>>;
type ContextFn = Rc<dyn Fn(&mut CompileCtx, Vec<Parser>) -> Result<Parser, LangError>>;

enum QuoteFn {
    Plain(PlainFn),
    WithContext(ContextFn),
}

/// A pending application: build function plus arguments, resolved against
/// the rule scope at compile time.
pub struct Quote {
    fun: QuoteFn,
    args: Vec<QuoteArg>,
}

pub enum QuoteArg {
    Pending(Quote),
    Ready(Parser),
}

impl Quote {
    pub fn new(
        f: impl Fn(Vec<Parser>) -> Result<Parser, LangError> + 'static,
        args: Vec<QuoteArg>,
    ) -> Quote {
        Quote { fun: QuoteFn::Plain(Rc::new(f)), args }
    }

    pub fn with_context(
        f: impl Fn(&mut CompileCtx, Vec<Parser>) -> Result<Parser, LangError> + 'static,
        args: Vec<QuoteArg>,
    ) -> Quote {
        Quote { fun: QuoteFn::WithContext(Rc::new(f)), args }
    }

    /// Resolve nested quotes depth-first, then invoke the build function.
    pub fn resolve(&self, ctx: &mut CompileCtx) -> Result<Parser, LangError> {
        let mut resolved = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            resolved.push(match arg {
                QuoteArg::Pending(quote) => quote.resolve(ctx)?,
                QuoteArg::Ready(parser) => parser.clone(),
            });
        }
        match &self.fun {
            QuoteFn::Plain(f) => f(resolved),
            QuoteFn::WithContext(f) => f(ctx, resolved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::compiler::CompileCtx;

    #[test]
    fn test_nested_resolution_is_depth_first() {
        let mut ctx = CompileCtx::new();
        let inner = Quote::new(|_| Ok(Parser::nil()), vec![]);
        let outer = Quote::new(
            |parsers| {
                assert_eq!(parsers.len(), 2);
                Ok(Parser::alt(parsers))
            },
            vec![QuoteArg::Pending(inner), QuoteArg::Ready(Parser::nil())],
        );
        let parser = outer.resolve(&mut ctx).expect("resolution succeeds");
        assert!(parser.parse(&[]).is_ok());
    }

    #[test]
    fn test_with_context_sees_the_scope() {
        let mut ctx = CompileCtx::new();
        let quote = Quote::with_context(
            |ctx, _| Ok(ctx.scope.lookup("value")),
            vec![],
        );
        let parser = quote.resolve(&mut ctx).expect("resolution succeeds");
        // `value` is a base-scope terminal; empty input is a plain mismatch
        assert!(parser.parse(&[]).is_err());
    }
}
