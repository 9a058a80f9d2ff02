//! Textual reader for [`Module`]s.
//!
//! The accepted form is exactly what [`Module::print`](crate::Module) emits:
//!
//! ```text
//! module {
//! global @g;
//! decl @printf(str, ...) -> i32;
//! fn @main() -> i32 file "simple.c" line 3 {
//! bb0:
//!     %a = alloca.i32;
//!     store [i32 1, %a] !4:7;
//!     %0 = load.i32 [%a] !5:11;
//!     %r = call.i32 [@printf, str "%d", %0] !6:3;
//!     ret [i32 0] !7:1;
//! }
//! }
//! ```
//!
//! Whitespace outside string literals is insignificant. Value names may be
//! used before their definition (loop phis); symbols (`@name`) may refer to
//! items defined later in the module. Both are resolved in a second pass once
//! the whole module has been read.

use smallvec::SmallVec;
use smol_str::SmolStr;

use ahash::AHashMap;
use typed_index_collections::TiVec;

use crate::{
    Block, BlockData, Const, Function, GlobalData, Inst, InstData, Module, Op, Operand, Signature,
    SrcLoc, Terminator, Ty,
};

struct IrParser {
    src: String,
    pos: usize,
}

impl IrParser {
    fn new(src: &str) -> Result<IrParser, String> {
        if !src.is_ascii() {
            return Err("can only parse ascii modules".to_owned());
        }
        // Strip whitespace, but keep string literals intact.
        let mut stripped = String::with_capacity(src.len());
        let mut chars = src.chars();
        let mut in_string = false;
        while let Some(c) = chars.next() {
            match c {
                '"' => {
                    in_string = !in_string;
                    stripped.push(c);
                }
                '\\' if in_string => {
                    stripped.push(c);
                    if let Some(next) = chars.next() {
                        stripped.push(next);
                    }
                }
                c if c.is_ascii_whitespace() && !in_string => (),
                c => stripped.push(c),
            }
        }
        Ok(IrParser { src: stripped, pos: 0 })
    }

    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn at(&self, expect: &str) -> bool {
        self.rest().starts_with(expect)
    }

    fn eat(&mut self, expect: &str) -> bool {
        if self.at(expect) {
            self.pos += expect.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expect: &str) -> Result<(), String> {
        if self.eat(expect) {
            Ok(())
        } else {
            Err(format!("expected {} here\n{}", expect, self.rest()))
        }
    }

    fn eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn ident(&mut self) -> Result<SmolStr, String> {
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$')))
            .unwrap_or_else(|| self.rest().len());
        if len == 0 {
            return Err(format!("expected an identifier here\n{}", self.rest()));
        }
        let res = SmolStr::new(&self.rest()[..len]);
        self.pos += len;
        Ok(res)
    }

    /// An identifier that stops before `.ty` suffixes (opcode position).
    fn opcode_ident(&mut self) -> Result<SmolStr, String> {
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or_else(|| self.rest().len());
        if len == 0 {
            return Err(format!("expected an opcode here\n{}", self.rest()));
        }
        let res = SmolStr::new(&self.rest()[..len]);
        self.pos += len;
        Ok(res)
    }

    fn int<T: std::str::FromStr>(&mut self) -> Result<T, String>
    where
        T::Err: std::fmt::Display,
    {
        let mut len = 0;
        let bytes = self.rest().as_bytes();
        if matches!(bytes.first(), Some(b'-')) {
            len += 1;
        }
        while matches!(bytes.get(len), Some(c) if c.is_ascii_digit()) {
            len += 1;
        }
        let src = &self.rest()[..len];
        let res = src.parse().map_err(|err| format!("bad integer {:?}: {}", src, err))?;
        self.pos += len;
        Ok(res)
    }

    fn float(&mut self) -> Result<f64, String> {
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')))
            .unwrap_or_else(|| self.rest().len());
        let src = &self.rest()[..len];
        let res = src.parse().map_err(|err| format!("bad float {:?}: {}", src, err))?;
        self.pos += len;
        Ok(res)
    }

    fn string(&mut self) -> Result<SmolStr, String> {
        self.expect("\"")?;
        let start = self.pos;
        loop {
            match self.rest().chars().next() {
                None => return Err("unexpected EOF in string literal".to_owned()),
                Some('"') => break,
                Some('\\') => self.pos += 2,
                Some(c) => self.pos += c.len_utf8(),
            }
        }
        let raw = self.src[start..self.pos].to_owned();
        self.pos += 1;
        let res = raw
            .replace("\\n", "\n")
            .replace("\\t", "\t")
            .replace("\\\"", "\"")
            .replace("\\\\", "\\");
        Ok(SmolStr::new(res))
    }

    fn ty(&mut self) -> Result<Ty, String> {
        // Longest match first: `i16`/`i32`/`i64` before `i1`.
        const TYS: &[(&str, Ty)] = &[
            ("void", Ty::Void),
            ("i16", Ty::I16),
            ("i32", Ty::I32),
            ("i64", Ty::I64),
            ("i1", Ty::I1),
            ("i8", Ty::I8),
            ("f32", Ty::F32),
            ("f64", Ty::F64),
            ("ptr", Ty::Ptr),
            ("str", Ty::Str),
        ];
        for (name, ty) in TYS {
            if self.eat(name) {
                return Ok(*ty);
            }
        }
        Err(format!("expected a type here\n{}", self.rest()))
    }

    fn block_ref(&mut self) -> Result<Block, String> {
        self.expect("bb")?;
        Ok(Block::from(self.int::<u32>()? as usize))
    }

    fn loc(&mut self) -> Result<Option<SrcLoc>, String> {
        if !self.eat("!") {
            return Ok(None);
        }
        let line = self.int()?;
        self.expect(":")?;
        let col = self.int()?;
        Ok(Some(SrcLoc { line, col }))
    }

    fn operand(&mut self) -> Result<RawOperand, String> {
        if self.eat("%") {
            return Ok(RawOperand::Value(self.ident()?));
        }
        if self.eat("@") {
            return Ok(RawOperand::Symbol(self.ident()?));
        }
        if self.eat("arg") {
            return Ok(RawOperand::Arg(self.int()?));
        }
        if self.eat("null") {
            return Ok(RawOperand::Const(Const::Null));
        }
        if self.eat("undef") {
            return Ok(RawOperand::Const(Const::Undef));
        }
        if self.at("str\"") {
            self.pos += 3;
            let val = self.string()?;
            return Ok(RawOperand::Const(Const::Str(val)));
        }
        let ty = self.ty()?;
        let constant = match ty {
            Ty::F32 | Ty::F64 => Const::Float(self.float()?, ty),
            _ => Const::Int(self.int()?, ty),
        };
        Ok(RawOperand::Const(constant))
    }

    fn operand_list(&mut self) -> Result<Vec<RawOperand>, String> {
        self.expect("[")?;
        let mut res = Vec::new();
        while !self.eat("]") {
            res.push(self.operand()?);
            if !self.at("]") {
                self.expect(",")?;
            }
        }
        Ok(res)
    }
}

enum RawOperand {
    Value(SmolStr),
    Symbol(SmolStr),
    Arg(u32),
    Const(Const),
}

struct RawInst {
    result: Option<SmolStr>,
    op: RawOp,
    ty: Ty,
    args: Vec<RawOperand>,
    loc: Option<SrcLoc>,
}

enum RawOp {
    Plain(Op),
    Phi(Vec<Block>),
}

enum RawTerm {
    Br(Block),
    CondBr(RawOperand, Block, Block),
    Ret(Option<RawOperand>),
    Unreachable,
}

struct RawBlock {
    insts: Vec<RawInst>,
    term: RawTerm,
    term_loc: Option<SrcLoc>,
}

struct RawFunction {
    func: Function,
    blocks: Vec<RawBlock>,
}

impl IrParser {
    fn signature(&mut self) -> Result<Signature, String> {
        self.expect("(")?;
        let mut params = Vec::new();
        let mut variadic = false;
        while !self.eat(")") {
            if self.eat("...") {
                variadic = true;
                self.expect(")")?;
                break;
            }
            params.push(self.ty()?);
            if !self.at(")") {
                self.expect(",")?;
            }
        }
        self.expect("->")?;
        let ret = self.ty()?;
        Ok(Signature { params, ret, variadic })
    }

    fn inst(&mut self) -> Result<RawInst, String> {
        let result = if self.eat("%") {
            let name = self.ident()?;
            self.expect("=")?;
            Some(name)
        } else {
            None
        };

        let opcode = self.opcode_ident()?;
        let ty = if self.eat(".") { self.ty()? } else { Ty::Void };

        let (op, args) = match &*opcode {
            "phi" => {
                self.expect("[")?;
                let mut blocks = Vec::new();
                let mut args = Vec::new();
                while !self.eat("]") {
                    self.expect("(")?;
                    blocks.push(self.block_ref()?);
                    self.expect(",")?;
                    args.push(self.operand()?);
                    self.expect(")")?;
                    if !self.at("]") {
                        self.expect(",")?;
                    }
                }
                (RawOp::Phi(blocks), args)
            }
            _ => {
                let op = match &*opcode {
                    "call" => Op::Call,
                    "load" => Op::Load,
                    "store" => Op::Store,
                    "alloca" => Op::Alloca,
                    "noop" => Op::Noop,
                    _ => Op::Other(opcode),
                };
                let args = if self.at("[") { self.operand_list()? } else { Vec::new() };
                (RawOp::Plain(op), args)
            }
        };

        let loc = self.loc()?;
        self.expect(";")?;
        Ok(RawInst { result, op, ty, args, loc })
    }

    fn terminator(&mut self) -> Result<(RawTerm, Option<SrcLoc>), String> {
        if self.eat("br") {
            if self.at("bb") {
                let dest = self.block_ref()?;
                let loc = self.loc()?;
                self.expect(";")?;
                return Ok((RawTerm::Br(dest), loc));
            }
            let cond = self.operand()?;
            self.expect(",")?;
            let then_dest = self.block_ref()?;
            self.expect(",")?;
            let else_dest = self.block_ref()?;
            let loc = self.loc()?;
            self.expect(";")?;
            return Ok((RawTerm::CondBr(cond, then_dest, else_dest), loc));
        }
        if self.eat("ret") {
            let value = if self.at(";") || self.at("!") {
                None
            } else if self.eat("[") {
                let value = self.operand()?;
                self.expect("]")?;
                Some(value)
            } else {
                Some(self.operand()?)
            };
            let loc = self.loc()?;
            self.expect(";")?;
            return Ok((RawTerm::Ret(value), loc));
        }
        if self.eat("unreachable") {
            let loc = self.loc()?;
            self.expect(";")?;
            return Ok((RawTerm::Unreachable, loc));
        }
        Err(format!("unknown terminator\n{}", self.rest()))
    }

    fn function(&mut self) -> Result<RawFunction, String> {
        self.expect("@")?;
        let name = self.ident()?;
        let sig = self.signature()?;

        let mut func = Function::new_declaration(name, sig, false);
        if self.eat("file") {
            func.file = Some(self.string()?);
            self.expect("line")?;
            func.line = self.int()?;
        }

        self.expect("{")?;
        let mut blocks = Vec::new();
        while !self.eat("}") {
            let block = self.block_ref()?;
            if usize::from(block) != blocks.len() {
                return Err(format!("blocks must be numbered in order, got {:?}", block));
            }
            self.expect(":")?;

            let mut insts = Vec::new();
            loop {
                if self.at("br") || self.at("ret") || self.at("unreachable") {
                    let (term, term_loc) = self.terminator()?;
                    blocks.push(RawBlock { insts, term, term_loc });
                    break;
                }
                if self.eof() {
                    return Err("unexpected EOF in function body".to_owned());
                }
                insts.push(self.inst()?);
            }
        }
        Ok(RawFunction { func, blocks })
    }
}

fn resolve_operand(
    raw: RawOperand,
    values: &AHashMap<SmolStr, Inst>,
    module: &Module,
) -> Result<Operand, String> {
    match raw {
        RawOperand::Value(name) => values
            .get(&name)
            .map(|&inst| Operand::Value(inst))
            .ok_or_else(|| format!("undefined value %{}", name)),
        RawOperand::Symbol(name) => {
            if let Some(func) = module.func_by_name(&name) {
                Ok(Operand::Func(func))
            } else if let Some(global) = module.global_by_name(&name) {
                Ok(Operand::Global(global))
            } else {
                Err(format!("unknown symbol @{}", name))
            }
        }
        RawOperand::Arg(idx) => Ok(Operand::Arg(idx)),
        RawOperand::Const(constant) => Ok(Operand::Const(constant)),
    }
}

impl Module {
    pub fn parse(src: &str) -> Result<Module, String> {
        let mut p = IrParser::new(src)?;
        p.expect("module")?;
        p.expect("{")?;

        let mut module = Module::default();
        let mut raw_funcs = Vec::new();

        while !p.eat("}") {
            if p.eat("global") {
                p.expect("@")?;
                let name = p.ident()?;
                p.expect(";")?;
                module.add_global(GlobalData { name });
            } else if p.eat("decl") {
                p.expect("@")?;
                let name = p.ident()?;
                let sig = p.signature()?;
                let noreturn = p.eat("noreturn");
                p.expect(";")?;
                module.add_func(Function::new_declaration(name, sig, noreturn));
            } else if p.eat("fn") {
                let raw = p.function()?;
                let id = module.add_func(raw.func);
                raw_funcs.push((id, raw.blocks));
            } else if p.eof() {
                return Err("unexpected EOF, expected }".to_owned());
            } else {
                return Err(format!("expected global, decl or fn here\n{}", p.rest()));
            }
        }

        // Second pass: lay out instruction arenas and resolve names.
        for (id, raw_blocks) in raw_funcs {
            let mut values: AHashMap<SmolStr, Inst> = AHashMap::new();
            let mut next = Inst::from(0usize);
            for raw in &raw_blocks {
                for inst in &raw.insts {
                    if let Some(name) = &inst.result {
                        if values.insert(name.clone(), next).is_some() {
                            return Err(format!("value %{} defined twice", name));
                        }
                    }
                    next = Inst::from(usize::from(next) + 1);
                }
            }

            let mut insts: TiVec<Inst, InstData> = TiVec::new();
            let mut blocks: TiVec<Block, BlockData> = TiVec::new();
            for raw in raw_blocks {
                let mut block_insts = Vec::with_capacity(raw.insts.len());
                for inst in raw.insts {
                    let RawInst { result, op, ty, args, loc } = inst;
                    let op = match op {
                        RawOp::Plain(op) => op,
                        RawOp::Phi(sources) => Op::Phi(sources.into_boxed_slice()),
                    };
                    let args = args
                        .into_iter()
                        .map(|raw| resolve_operand(raw, &values, &module))
                        .collect::<Result<SmallVec<_>, _>>()?;
                    let key = insts.next_key();
                    insts.push(InstData { op, ty, result, args, loc });
                    block_insts.push(key);
                }
                let terminator = match raw.term {
                    RawTerm::Br(dest) => Terminator::Br { dest },
                    RawTerm::CondBr(cond, then_dest, else_dest) => Terminator::CondBr {
                        cond: resolve_operand(cond, &values, &module)?,
                        then_dest,
                        else_dest,
                    },
                    RawTerm::Ret(value) => Terminator::Ret {
                        value: value
                            .map(|raw| resolve_operand(raw, &values, &module))
                            .transpose()?,
                    },
                    RawTerm::Unreachable => Terminator::Unreachable,
                };
                blocks.push(BlockData {
                    insts: block_insts,
                    terminator: Some(terminator),
                    term_loc: raw.term_loc,
                });
            }

            let func = &mut module.funcs[id];
            func.insts = insts;
            func.blocks = blocks;
        }

        Ok(module)
    }
}
