//! Textual writer for [`Module`]s; the output parses back with
//! [`Module::parse`].

use std::fmt::{self, Write};

use crate::{Const, Function, InstData, Module, Op, Operand, Terminator};

macro_rules! w {
    ($dst:expr, $($arg:tt)*) => {
        { let _ = write!($dst, $($arg)*); }
    };
}

macro_rules! wln {
    ($dst:expr) => {
        { let _ = writeln!($dst); }
    };
    ($dst:expr, $($arg:tt)*) => {
        { let _ = writeln!($dst, $($arg)*); }
    };
}

impl Module {
    pub fn print(&self) -> String {
        let mut printer = Printer { module: self, buf: String::new(), needs_indent: false };
        printer.print();
        printer.buf
    }
}

/// Renders `op` the way the printer does, for diagnostics and annotations.
pub fn operand_string(module: &Module, func: &Function, op: &Operand) -> String {
    let mut printer = Printer { module, buf: String::new(), needs_indent: false };
    printer.operand(func, op);
    printer.buf
}

/// Renders one instruction (without trailing newline or indent).
pub fn inst_string(module: &Module, func: &Function, data: &InstData) -> String {
    let mut printer = Printer { module, buf: String::new(), needs_indent: false };
    printer.inst(func, data);
    printer.buf.trim_end().to_owned()
}

/// Renders one block terminator (without trailing newline or indent).
pub fn term_string(module: &Module, func: &Function, data: &crate::BlockData) -> String {
    let mut printer = Printer { module, buf: String::new(), needs_indent: false };
    printer.terminator(func, data);
    printer.buf.trim_end().to_owned()
}

struct Printer<'a> {
    module: &'a Module,
    buf: String,
    needs_indent: bool,
}

impl<'a> Printer<'a> {
    fn print(&mut self) {
        wln!(self, "module {{");
        for global in &self.module.globals {
            wln!(self, "global @{};", global.name);
        }
        for func in &self.module.funcs {
            if func.is_declaration() {
                w!(self, "decl @{}", func.name);
                self.signature(func);
                if func.noreturn {
                    w!(self, " noreturn");
                }
                wln!(self, ";");
            }
        }
        for (_, func) in self.module.defined_funcs() {
            self.function(func);
        }
        w!(self, "}}");
    }

    fn signature(&mut self, func: &Function) {
        w!(self, "(");
        let mut sep = "";
        for param in &func.sig.params {
            w!(self, "{}{}", sep, param);
            sep = ", ";
        }
        if func.sig.variadic {
            w!(self, "{}...", sep);
        }
        w!(self, ") -> {}", func.sig.ret);
    }

    fn function(&mut self, func: &Function) {
        w!(self, "fn @{}", func.name);
        self.signature(func);
        if let Some(file) = &func.file {
            w!(self, " file \"{}\" line {}", file, func.line);
        }
        wln!(self, " {{");
        for (block, data) in func.blocks.iter_enumerated() {
            wln!(self, "{:?}:", block);
            for &inst in &data.insts {
                self.needs_indent = true;
                self.inst(func, &func.insts[inst]);
            }
            self.needs_indent = true;
            self.terminator(func, data);
        }
        wln!(self, "}}");
    }

    fn inst(&mut self, func: &Function, data: &InstData) {
        if let Some(result) = &data.result {
            w!(self, "%{} = ", result);
        }
        match &data.op {
            Op::Call => w!(self, "call"),
            Op::Load => w!(self, "load"),
            Op::Store => w!(self, "store"),
            Op::Alloca => w!(self, "alloca"),
            Op::Phi(_) => w!(self, "phi"),
            Op::Noop => w!(self, "noop"),
            Op::Other(name) => w!(self, "{}", name),
        }
        if data.ty != crate::Ty::Void {
            w!(self, ".{}", data.ty);
        }
        if let Op::Phi(blocks) = &data.op {
            w!(self, " [");
            let mut sep = "";
            for (block, arg) in blocks.iter().zip(&data.args) {
                w!(self, "{}({:?}, ", sep, block);
                self.operand(func, arg);
                w!(self, ")");
                sep = ", ";
            }
            w!(self, "]");
        } else if !data.args.is_empty() {
            w!(self, " [");
            let mut sep = "";
            for arg in &data.args {
                w!(self, "{}", sep);
                self.operand(func, arg);
                sep = ", ";
            }
            w!(self, "]");
        }
        if let Some(loc) = data.loc {
            w!(self, " {:?}", loc);
        }
        wln!(self, ";");
    }

    fn terminator(&mut self, func: &Function, data: &crate::BlockData) {
        match data.terminator() {
            Terminator::Br { dest } => w!(self, "br {:?}", dest),
            Terminator::CondBr { cond, then_dest, else_dest } => {
                w!(self, "br ");
                self.operand(func, cond);
                w!(self, ", {:?}, {:?}", then_dest, else_dest);
            }
            Terminator::Ret { value: None } => w!(self, "ret"),
            Terminator::Ret { value: Some(value) } => {
                w!(self, "ret [");
                self.operand(func, value);
                w!(self, "]");
            }
            Terminator::Unreachable => w!(self, "unreachable"),
        }
        if let Some(loc) = data.term_loc {
            w!(self, " {:?}", loc);
        }
        wln!(self, ";");
    }

    fn operand(&mut self, func: &Function, op: &Operand) {
        match op {
            Operand::Value(inst) => match &func.insts[*inst].result {
                Some(name) => w!(self, "%{}", name),
                None => w!(self, "undef"),
            },
            Operand::Arg(idx) => w!(self, "arg{}", idx),
            Operand::Func(id) => w!(self, "@{}", self.module.funcs[*id].name),
            Operand::Global(id) => w!(self, "@{}", self.module.globals[*id].name),
            Operand::Const(constant) => self.constant(constant),
        }
    }

    fn constant(&mut self, constant: &Const) {
        match constant {
            Const::Int(val, ty) => w!(self, "{} {}", ty, val),
            Const::Float(val, ty) => {
                if val.fract() == 0.0 && val.is_finite() {
                    w!(self, "{} {:.1}", ty, val)
                } else {
                    w!(self, "{} {}", ty, val)
                }
            }
            Const::Str(val) => {
                let escaped = val
                    .replace('\\', "\\\\")
                    .replace('"', "\\\"")
                    .replace('\n', "\\n")
                    .replace('\t', "\\t");
                w!(self, "str \"{}\"", escaped)
            }
            Const::Null => w!(self, "null"),
            Const::Undef => w!(self, "undef"),
        }
    }
}

impl<'a> Write for Printer<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for line in s.split_inclusive('\n') {
            if self.needs_indent && line != "\n" {
                self.buf.push_str("    ");
            }
            self.needs_indent = false;
            self.buf.push_str(line);
        }
        Ok(())
    }
}
