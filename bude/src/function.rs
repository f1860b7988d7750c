//! A compiled function: its signature plus the word-oriented code that
//! implements it (spec §4.3).

use crate::externs::Signature;
use crate::ir::Block;

/// Placeholder for the token-oriented block a parser would fill in before
/// lowering. Never populated or persisted by anything in this crate —
/// parsing and the pre-lowering token IR are out of scope — but the field is
/// kept so `Function`'s shape matches the reference layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenBlockPlaceholder;

/// One function in a module: its signature and its word-oriented code.
#[derive(Debug, Default)]
pub struct Function {
    /// Parameter and return type indices.
    pub signature: Signature,
    /// Intentionally inert; see [`TokenBlockPlaceholder`].
    pub t_code: TokenBlockPlaceholder,
    /// The word-oriented code the checker and emitter operate on.
    pub w_code: Block,
}

impl Function {
    /// A function with the given signature and empty code.
    pub fn new(signature: Signature) -> Self {
        Function { signature, t_code: TokenBlockPlaceholder, w_code: Block::new() }
    }
}
