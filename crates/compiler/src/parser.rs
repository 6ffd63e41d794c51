//! Recursive-descent parser: token stream → AST.
//!
//! The grammar is Elixir-flavoured. Everything structured parses into
//! `call(target, meta, args)` nodes: operators carry their spelling as the
//! target symbol, `do … end` blocks become a trailing keyword-list
//! argument, `->` clause sequences become lists of `->` calls, and a bare
//! identifier that is not a call parses as a variable reference
//! (`call(name, meta, :Var)`).
//!
//! Precedence, loosest to tightest:
//! `|` cons, `=`, `&` capture, `==`/`!=`, `|>`, `++`, `+`/`-`, `*`/`/`,
//! unary `+`/`-`, then calls/dot access, then atoms.

use lix_core::ast::{Meta, Node};
use lix_core::symbol::Symbol;

use crate::error::ParseError;
use crate::lexer::{Token, TokenKind, tokenize};

/// Parse a full source document into a single AST node. Multiple
/// expressions joined by newlines or `;` become a `__block__` call.
pub fn parse(source: &str) -> Result<Node, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        lines: source.lines().map(str::to_owned).collect(),
    };
    parser.skip_joiners();
    let node = parser.parse_exprs_block(Stops::EOF)?;
    parser.expect_eof()?;
    Ok(node)
}

fn binop(op: &str, lhs: Node, rhs: Node, meta: Meta) -> Node {
    Node::call(Node::symbol_name(op), meta, Node::list(vec![lhs, rhs]))
}

/// Where a block-level parse is allowed to stop.
#[derive(Clone, Copy, PartialEq)]
struct Stops {
    eof: bool,
    rparen: bool,
    end_word: bool,
    else_word: bool,
}

impl Stops {
    const EOF: Stops = Stops { eof: true, rparen: false, end_word: false, else_word: false };
    const RPAREN: Stops = Stops { eof: false, rparen: true, end_word: false, else_word: false };
    const END: Stops = Stops { eof: false, rparen: false, end_word: true, else_word: false };
    const END_OR_ELSE: Stops = Stops { eof: false, rparen: false, end_word: true, else_word: true };
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    lines: Vec<String>,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error_at(&self, tok: &Token, message: impl Into<String>) -> ParseError {
        let line_text = self
            .lines
            .get(tok.line.saturating_sub(1) as usize)
            .cloned()
            .unwrap_or_default();
        ParseError::new(message, tok.line, tok.column, line_text)
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        self.error_at(&self.peek().clone(), message)
    }

    fn meta_here(&self) -> Meta {
        let tok = self.peek();
        Meta::at(tok.line as i32, tok.column as i32)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Word(w) if w == word)
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek_kind(), TokenKind::Op(o) if *o == op)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek_kind(), TokenKind::Newline) {
            self.advance();
        }
    }

    /// Skip expression joiners (newlines and semicolons). Returns whether
    /// any were consumed.
    fn skip_joiners(&mut self) -> bool {
        let mut any = false;
        while matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Semicolon) {
            self.advance();
            any = true;
        }
        any
    }

    fn at_stop(&self, stops: Stops) -> bool {
        match self.peek_kind() {
            TokenKind::Eof => true,
            TokenKind::RParen => stops.rparen,
            TokenKind::Word(w) if w == "end" => stops.end_word,
            TokenKind::Word(w) if w == "else" => stops.else_word,
            _ => false,
        }
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        self.skip_joiners();
        if matches!(self.peek_kind(), TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.error_here("expected end-of-file"))
        }
    }

    // ----- blocks and clause sequences --------------------------------

    /// A sequence of expressions joined by `;`/newline, stopping at
    /// `stops`. One expression stays bare; several become `__block__`.
    fn parse_exprs_block(&mut self, stops: Stops) -> Result<Node, ParseError> {
        self.skip_joiners();
        let meta = self.meta_here();
        let mut exprs = Vec::new();
        loop {
            if self.at_stop(stops) {
                break;
            }
            exprs.push(self.parse_single_expr()?);
            let joined = self.skip_joiners();
            if self.at_stop(stops) {
                break;
            }
            if !joined {
                return Err(self.error_here("expected end of expression"));
            }
        }
        match exprs.len() {
            0 => Err(self.error_here("expected one or more expressions")),
            1 => Ok(exprs.into_iter().next().expect("one expression")),
            _ => Ok(Node::call(
                Node::symbol_name("__block__"),
                meta,
                Node::list(exprs),
            )),
        }
    }

    /// The body of a `do` block or parenthesised group: either a sequence
    /// of `pattern -> body` clauses (yielding a list node) or a plain
    /// expression block.
    fn parse_block_or_clauses(&mut self, stops: Stops) -> Result<Node, ParseError> {
        self.skip_joiners();
        if self.at_clause_head() {
            let clauses = self.parse_clause_seq(stops)?;
            Ok(Node::list(clauses))
        } else {
            self.parse_exprs_block(stops)
        }
    }

    /// Lookahead: does a clause head (`args… ->`) start here? Fully
    /// backtracks.
    fn at_clause_head(&mut self) -> bool {
        let saved = self.pos;
        let result = self.try_consume_clause_head().is_ok();
        self.pos = saved;
        result
    }

    fn try_consume_clause_head(&mut self) -> Result<Vec<Node>, ParseError> {
        if self.eat_op("->") {
            return Ok(Vec::new());
        }
        let mut args = vec![self.parse_single_expr()?];
        while matches!(self.peek_kind(), TokenKind::Comma) {
            self.advance();
            self.skip_newlines();
            args.push(self.parse_single_expr()?);
        }
        if self.eat_op("->") {
            Ok(args)
        } else {
            Err(self.error_here("expected '->'"))
        }
    }

    fn parse_clause_seq(&mut self, stops: Stops) -> Result<Vec<Node>, ParseError> {
        let mut clauses = Vec::new();
        loop {
            clauses.push(self.parse_clause(stops)?);
            self.skip_joiners();
            if self.at_stop(stops) || !self.at_clause_head() {
                return Ok(clauses);
            }
        }
    }

    /// One `patterns -> body` clause. The body runs until the stop token
    /// or the head of the next clause.
    fn parse_clause(&mut self, stops: Stops) -> Result<Node, ParseError> {
        let meta = self.meta_here();
        let args = self.try_consume_clause_head()?;
        self.skip_joiners();
        let body_meta = self.meta_here();
        let mut exprs = Vec::new();
        loop {
            exprs.push(self.parse_single_expr()?);
            let joined = self.skip_joiners();
            if self.at_stop(stops) {
                break;
            }
            if joined && self.at_clause_head() {
                break;
            }
            if !joined {
                return Err(self.error_here("expected end of expression"));
            }
        }
        let body = if exprs.len() == 1 {
            exprs.into_iter().next().expect("one expression")
        } else {
            Node::call(
                Node::symbol_name("__block__"),
                body_meta,
                Node::list(exprs),
            )
        };
        Ok(Node::call(
            Node::symbol_name("->"),
            meta,
            Node::list(vec![Node::list(args), body]),
        ))
    }

    // ----- the precedence ladder --------------------------------------

    fn parse_single_expr(&mut self) -> Result<Node, ParseError> {
        self.parse_bar()
    }

    /// `|` — the cons operator, right associative, loosest of all.
    fn parse_bar(&mut self) -> Result<Node, ParseError> {
        let lhs = self.parse_assign()?;
        if self.is_op("|") {
            let meta = self.meta_here();
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_bar()?;
            return Ok(binop("|", lhs, rhs, meta));
        }
        Ok(lhs)
    }

    /// `=` — match, right associative.
    fn parse_assign(&mut self) -> Result<Node, ParseError> {
        let lhs = self.parse_capture()?;
        if self.is_op("=") {
            let meta = self.meta_here();
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_assign()?;
            return Ok(binop("=", lhs, rhs, meta));
        }
        Ok(lhs)
    }

    /// `&expr` — function capture. The `&N` placeholder form is an atom
    /// and is handled in `parse_atom`.
    fn parse_capture(&mut self) -> Result<Node, ParseError> {
        if self.is_op("&") && !self.capture_placeholder_follows() {
            let meta = self.meta_here();
            self.advance();
            let operand = self.parse_compare()?;
            return Ok(Node::call(
                Node::symbol_name("&"),
                meta,
                Node::list(vec![operand]),
            ));
        }
        self.parse_compare()
    }

    fn capture_placeholder_follows(&self) -> bool {
        let next = self.peek_at(1);
        next.glued && matches!(next.kind, TokenKind::Int(_))
    }

    fn parse_compare(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_pipe()?;
        loop {
            let op = if self.is_op("==") {
                "=="
            } else if self.is_op("!=") {
                "!="
            } else {
                return Ok(lhs);
            };
            let meta = self.meta_here();
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_pipe()?;
            lhs = binop(op, lhs, rhs, meta);
        }
    }

    fn parse_pipe(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_concat()?;
        while self.is_op("|>") {
            let meta = self.meta_here();
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_concat()?;
            lhs = binop("|>", lhs, rhs, meta);
        }
        Ok(lhs)
    }

    /// `++` — right associative.
    fn parse_concat(&mut self) -> Result<Node, ParseError> {
        let lhs = self.parse_sum()?;
        if self.is_op("++") {
            let meta = self.meta_here();
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_concat()?;
            return Ok(binop("++", lhs, rhs, meta));
        }
        Ok(lhs)
    }

    fn parse_sum(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_product()?;
        loop {
            let op = if self.is_op("+") {
                "+"
            } else if self.is_op("-") {
                "-"
            } else {
                return Ok(lhs);
            };
            let meta = self.meta_here();
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_product()?;
            lhs = binop(op, lhs, rhs, meta);
        }
    }

    fn parse_product(&mut self) -> Result<Node, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = if self.is_op("*") {
                "*"
            } else if self.is_op("/") {
                "/"
            } else {
                return Ok(lhs);
            };
            let meta = self.meta_here();
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_unary()?;
            lhs = binop(op, lhs, rhs, meta);
        }
    }

    /// Unary `-`/`+` bind only when glued to their operand: `-x`, not `- x`.
    fn parse_unary(&mut self) -> Result<Node, ParseError> {
        for op in ["-", "+"] {
            if self.is_op(op) && self.peek_at(1).glued {
                let meta = self.meta_here();
                self.advance();
                let operand = self.parse_unary()?;
                return Ok(Node::call(
                    Node::symbol_name(op),
                    meta,
                    Node::list(vec![operand]),
                ));
            }
        }
        self.parse_base()
    }

    // ----- calls, dot access, atoms -----------------------------------

    fn parse_base(&mut self) -> Result<Node, ParseError> {
        let mut node = self.parse_atom()?;
        loop {
            if self.is_op(".") {
                let meta = self.meta_here();
                self.advance();
                node = self.parse_dot_tail(node, meta)?;
            } else if matches!(self.peek_kind(), TokenKind::LParen) && self.peek().glued {
                let meta = self.meta_here();
                let args = self.parse_paren_args()?;
                node = Node::call(node, meta, args);
            } else {
                return Ok(node);
            }
        }
    }

    /// After a `.`: a closure call `f.(args)`, or member/remote access
    /// `x.name`, optionally followed by call arguments.
    fn parse_dot_tail(&mut self, lhs: Node, meta: Meta) -> Result<Node, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::LParen => {
                let callable = Node::call(
                    Node::symbol_name("."),
                    meta.clone(),
                    Node::list(vec![lhs]),
                );
                let args = self.parse_paren_args()?;
                Ok(Node::call(callable, meta, args))
            }
            TokenKind::Word(name) => {
                let name_tok = self.advance();
                let access = Node::call(
                    Node::symbol_name("."),
                    meta.clone(),
                    Node::list(vec![lhs, Node::symbol_name(&name)]),
                );
                if matches!(self.peek_kind(), TokenKind::LParen) && self.peek().glued {
                    let args = self.parse_paren_args()?;
                    Ok(Node::call(access, meta, args))
                } else if self.no_paren_args_follow(name_tok.line) {
                    let args = self.parse_no_paren_args()?;
                    Ok(Node::call(access, meta, Node::list(args)))
                } else {
                    Ok(access)
                }
            }
            _ => Err(self.error_here("expected identifier following dot '.'")),
        }
    }

    fn parse_atom(&mut self) -> Result<Node, ParseError> {
        let tok = self.peek().clone();
        match &tok.kind {
            TokenKind::Int(i) => {
                self.advance();
                Ok(Node::integer(*i))
            }
            TokenKind::Real(r) => {
                self.advance();
                Ok(Node::real(*r))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Node::string(s.clone()))
            }
            TokenKind::SymbolLit(s) => {
                self.advance();
                Ok(Node::symbol_name(s))
            }
            TokenKind::ModName(m) => {
                self.advance();
                Ok(Node::symbol_name(m))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_block_or_clauses(Stops::RPAREN)?;
                self.skip_newlines();
                if !matches!(self.peek_kind(), TokenKind::RParen) {
                    return Err(self.error_here("expected closing parenthesis"));
                }
                self.advance();
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_list_literal(),
            TokenKind::LBrace => self.parse_tuple_literal(),
            TokenKind::MapBrace => self.parse_map_literal(),
            TokenKind::Word(w) => match w.as_str() {
                "fn" => self.parse_anon_fn(),
                "do" | "end" | "else" => Err(self.error_at(&tok, format!("unexpected '{w}'"))),
                "nil" | "true" | "false" => {
                    self.advance();
                    Ok(Node::symbol_name(w))
                }
                _ => self.parse_word(),
            },
            TokenKind::KeywordIdent(_) => {
                // A bare keyword list, e.g. the tail of `def name, do: body`.
                let kwlist = self.parse_keyword_list()?;
                Ok(kwlist)
            }
            TokenKind::Op("&") if self.capture_placeholder_follows() => {
                let meta = self.meta_here();
                self.advance();
                let TokenKind::Int(n) = *self.peek_kind() else {
                    return Err(self.error_here("expected capture placeholder"));
                };
                self.advance();
                Ok(Node::call(
                    Node::symbol_name("&"),
                    meta,
                    Node::list(vec![Node::integer(n)]),
                ))
            }
            _ => Err(self.error_at(&tok, "expected expression")),
        }
    }

    /// A lower-case word: local call (paren, no-paren or do-block) or a
    /// variable reference.
    fn parse_word(&mut self) -> Result<Node, ParseError> {
        let tok = self.advance();
        let TokenKind::Word(name) = &tok.kind else {
            return Err(self.error_at(&tok, "expected identifier"));
        };
        let meta = Meta::at(tok.line as i32, tok.column as i32);
        let target = Node::symbol(Symbol::intern(name));
        if matches!(self.peek_kind(), TokenKind::LParen) && self.peek().glued {
            let args = self.parse_paren_args()?;
            return Ok(Node::call(target, meta, args));
        }
        if self.no_paren_args_follow(tok.line) {
            let args = self.parse_no_paren_args()?;
            return Ok(Node::call(target, meta, Node::list(args)));
        }
        if self.is_word("do") && self.peek().line == tok.line {
            let kwlist = self.parse_do_sections()?;
            return Ok(Node::call(target, meta, Node::list(vec![kwlist])));
        }
        // Just a variable reference.
        Ok(Node::call(target, meta, Node::symbol_name("Var")))
    }

    /// Would the next token start a no-paren argument on the same line?
    fn no_paren_args_follow(&self, call_line: u32) -> bool {
        let tok = self.peek();
        if tok.line != call_line {
            return false;
        }
        match &tok.kind {
            TokenKind::Word(w) => !matches!(w.as_str(), "do" | "end" | "else"),
            TokenKind::ModName(_)
            | TokenKind::SymbolLit(_)
            | TokenKind::KeywordIdent(_)
            | TokenKind::Int(_)
            | TokenKind::Real(_)
            | TokenKind::Str(_)
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::MapBrace => true,
            TokenKind::Op(op) => *op == "&",
            _ => false,
        }
    }

    /// `fn clauses… end`.
    fn parse_anon_fn(&mut self) -> Result<Node, ParseError> {
        let tok = self.advance();
        let meta = Meta::at(tok.line as i32, tok.column as i32);
        self.skip_joiners();
        if !self.at_clause_head() {
            return Err(self.error_here("expected anonymous function clauses"));
        }
        let clauses = self.parse_clause_seq(Stops::END)?;
        if !self.is_word("end") {
            return Err(self.error_here("expected 'end'"));
        }
        self.advance();
        Ok(Node::call(
            Node::symbol_name("fn"),
            meta,
            Node::list(clauses),
        ))
    }

    /// `(args…)`, with optional keyword arguments and trailing do-block.
    fn parse_paren_args(&mut self) -> Result<Node, ParseError> {
        let open = self.advance();
        debug_assert!(matches!(open.kind, TokenKind::LParen));
        self.skip_newlines();
        let mut args = Vec::new();
        let mut saw_keywords = false;
        if !matches!(self.peek_kind(), TokenKind::RParen) {
            loop {
                if matches!(self.peek_kind(), TokenKind::KeywordIdent(_)) {
                    args.push(self.parse_keyword_list()?);
                    saw_keywords = true;
                    self.skip_newlines();
                    break;
                }
                args.push(self.parse_single_expr()?);
                self.skip_newlines();
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    self.skip_newlines();
                    // Allow a trailing comma before ')'.
                    if matches!(self.peek_kind(), TokenKind::RParen) {
                        break;
                    }
                } else {
                    break;
                }
            }
        }
        if !matches!(self.peek_kind(), TokenKind::RParen) {
            return Err(self.error_here(
                "expected positional argument, keyword argument, or closing ')'",
            ));
        }
        let close = self.advance();
        if self.is_word("do") && self.peek().line == close.line {
            let kwlist = self.parse_do_sections()?;
            self.append_keywords(&mut args, saw_keywords, kwlist);
        }
        Ok(Node::list(args))
    }

    /// Unparenthesised call arguments: at least one, comma separated, with
    /// optional keyword tail and trailing do-block.
    fn parse_no_paren_args(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut args = Vec::new();
        let mut saw_keywords = false;
        loop {
            if matches!(self.peek_kind(), TokenKind::KeywordIdent(_)) {
                args.push(self.parse_keyword_list()?);
                saw_keywords = true;
                break;
            }
            args.push(self.parse_single_expr()?);
            if matches!(self.peek_kind(), TokenKind::Comma) {
                self.advance();
                self.skip_newlines();
            } else {
                break;
            }
        }
        if self.is_word("do") {
            let kwlist = self.parse_do_sections()?;
            self.append_keywords(&mut args, saw_keywords, kwlist);
        }
        Ok(args)
    }

    /// Attach do-block keywords: merged into an existing trailing keyword
    /// list, or appended as a new one.
    fn append_keywords(&mut self, args: &mut Vec<Node>, saw_keywords: bool, kwlist: Node) {
        let _ = self;
        if saw_keywords {
            if let (Some(last), Some(new_kws)) = (args.pop(), kwlist.as_list()) {
                let mut merged = last.as_list().map(<[Node]>::to_vec).unwrap_or_default();
                merged.extend(new_kws.iter().cloned());
                args.push(Node::list(merged));
                return;
            }
        }
        args.push(kwlist);
    }

    /// `name: value, name: value …` — a keyword list node.
    fn parse_keyword_list(&mut self) -> Result<Node, ParseError> {
        let mut pairs = Vec::new();
        loop {
            let tok = self.advance();
            let TokenKind::KeywordIdent(name) = &tok.kind else {
                return Err(self.error_at(&tok, "expected keyword argument"));
            };
            self.skip_newlines();
            let value = self.parse_single_expr()?;
            pairs.push(Node::tuple(vec![Node::symbol_name(name), value]));
            if matches!(self.peek_kind(), TokenKind::Comma)
                && matches!(self.peek_at(1).kind, TokenKind::KeywordIdent(_))
            {
                self.advance();
                self.skip_newlines();
            } else {
                return Ok(Node::list(pairs));
            }
        }
    }

    /// `do … [else …] end` — returns the keyword list node.
    fn parse_do_sections(&mut self) -> Result<Node, ParseError> {
        let do_tok = self.advance();
        debug_assert!(matches!(&do_tok.kind, TokenKind::Word(w) if w == "do"));
        let mut pairs = Vec::new();
        let body = self.parse_block_or_clauses(Stops::END_OR_ELSE)?;
        pairs.push(Node::tuple(vec![Node::symbol_name("do"), body]));
        self.skip_joiners();
        if self.is_word("else") {
            self.advance();
            let alt = self.parse_block_or_clauses(Stops::END)?;
            pairs.push(Node::tuple(vec![Node::symbol_name("else"), alt]));
            self.skip_joiners();
        }
        if !self.is_word("end") {
            return Err(self.error_here("expected 'end'"));
        }
        self.advance();
        Ok(Node::list(pairs))
    }

    fn parse_list_literal(&mut self) -> Result<Node, ParseError> {
        self.advance();
        self.skip_newlines();
        let mut elems = Vec::new();
        if !matches!(self.peek_kind(), TokenKind::RBracket) {
            loop {
                if let TokenKind::KeywordIdent(name) = self.peek_kind().clone() {
                    self.advance();
                    self.skip_newlines();
                    let value = self.parse_single_expr()?;
                    elems.push(Node::tuple(vec![Node::symbol_name(&name), value]));
                } else {
                    elems.push(self.parse_single_expr()?);
                }
                self.skip_newlines();
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    self.skip_newlines();
                } else {
                    break;
                }
            }
        }
        if !matches!(self.peek_kind(), TokenKind::RBracket) {
            return Err(self.error_here("expected closing ']'"));
        }
        self.advance();
        Ok(Node::list(elems))
    }

    fn parse_tuple_literal(&mut self) -> Result<Node, ParseError> {
        self.advance();
        self.skip_newlines();
        let mut elems = Vec::new();
        if !matches!(self.peek_kind(), TokenKind::RBrace) {
            loop {
                elems.push(self.parse_single_expr()?);
                self.skip_newlines();
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    self.skip_newlines();
                } else {
                    break;
                }
            }
        }
        if !matches!(self.peek_kind(), TokenKind::RBrace) {
            return Err(self.error_here("expected closing '}'"));
        }
        self.advance();
        Ok(Node::tuple(elems))
    }

    /// `%{k => v, …}` parses as a `%{}` call whose arguments are 2-tuples.
    fn parse_map_literal(&mut self) -> Result<Node, ParseError> {
        let tok = self.advance();
        let meta = Meta::at(tok.line as i32, tok.column as i32);
        self.skip_newlines();
        let mut entries = Vec::new();
        if !matches!(self.peek_kind(), TokenKind::RBrace) {
            loop {
                let key = self.parse_single_expr()?;
                self.skip_newlines();
                if !self.eat_op("=>") {
                    return Err(self.error_here("expected '=>' in map literal"));
                }
                self.skip_newlines();
                let value = self.parse_single_expr()?;
                entries.push(Node::tuple(vec![key, value]));
                self.skip_newlines();
                if matches!(self.peek_kind(), TokenKind::Comma) {
                    self.advance();
                    self.skip_newlines();
                } else {
                    break;
                }
            }
        }
        if !matches!(self.peek_kind(), TokenKind::RBrace) {
            return Err(self.error_here("expected closing '}'"));
        }
        self.advance();
        Ok(Node::call(
            Node::symbol_name("%{}"),
            meta,
            Node::list(entries),
        ))
    }
}
