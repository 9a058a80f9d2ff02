//! Source-line recovery: from a sliced module back to source lines.
//!
//! Debug locations of the retained instructions give `(file, line)` pairs;
//! the *brace closure* then expands every retained line with the opening and
//! closing brace lines of each enclosing block, to a fixpoint, so the
//! resulting listing is parseable source. All state lives in a
//! [`SourceRecoveryContext`] that is threaded through the calls.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufRead, BufReader, Write};

use ahash::AHashMap;
use camino::{Utf8Path, Utf8PathBuf};
use ir::{Module, Op};
use smol_str::SmolStr;

mod lexer;


pub use lexer::{scan, Nesting};

#[derive(Default)]
pub struct SourceRecoveryContext {
    /// Where relative source paths are resolved; defaults to the working
    /// directory.
    source_root: Option<Utf8PathBuf>,
    /// Retained lines per file.
    line_dict: AHashMap<SmolStr, BTreeSet<u32>>,
    /// Nesting structures of the files that have been scanned.
    nestings: AHashMap<SmolStr, Nesting>,
}

impl SourceRecoveryContext {
    pub fn new() -> SourceRecoveryContext {
        SourceRecoveryContext::default()
    }

    pub fn with_source_root(root: Utf8PathBuf) -> SourceRecoveryContext {
        SourceRecoveryContext { source_root: Some(root), ..SourceRecoveryContext::default() }
    }

    /// Harvests `(file, line)` pairs from every located instruction of the
    /// module (`noop` placeholders and locations without a line are
    /// dropped). A procedure that contributed any line also contributes its
    /// subprogram declaration line.
    pub fn collect_lines(&mut self, module: &Module) {
        for (_, func) in module.defined_funcs() {
            let file = match &func.file {
                Some(file) => file.clone(),
                None => continue,
            };
            let mut any = false;
            for block in &func.blocks {
                for &inst in &block.insts {
                    let data = &func.insts[inst];
                    if matches!(data.op, Op::Noop) {
                        continue;
                    }
                    if let Some(loc) = data.loc {
                        if loc.line > 0 {
                            self.add_line(&file, loc.line);
                            any = true;
                        }
                    }
                }
                if let Some(loc) = block.term_loc {
                    if loc.line > 0 {
                        self.add_line(&file, loc.line);
                        any = true;
                    }
                }
            }
            if any && func.line > 0 {
                self.add_line(&file, func.line);
            }
        }
    }

    pub fn add_line(&mut self, file: &str, line: u32) {
        self.line_dict.entry(SmolStr::new(file)).or_default().insert(line);
    }

    /// Files that contributed lines, in sorted order.
    pub fn files(&self) -> Vec<&SmolStr> {
        let mut res: Vec<&SmolStr> = self.line_dict.keys().collect();
        res.sort_unstable();
        res
    }

    pub fn lines(&self, file: &str) -> Option<&BTreeSet<u32>> {
        self.line_dict.get(file)
    }

    fn resolve_path(&self, file: &str) -> Utf8PathBuf {
        match &self.source_root {
            Some(root) if Utf8Path::new(file).is_relative() => root.join(file),
            _ => Utf8PathBuf::from(file),
        }
    }

    /// Scans every contributing file and expands the retained lines with
    /// their enclosing braces. Files that cannot be read are reported and
    /// skipped.
    pub fn close_braces(&mut self) {
        let files: Vec<SmolStr> = self.line_dict.keys().cloned().collect();
        for file in files {
            let path = self.resolve_path(&file);
            match fs::read_to_string(&path) {
                Ok(src) => self.close_braces_in(&file, &src),
                Err(err) => {
                    log::warn!("failed opening given source file {}: {}", path, err);
                }
            }
        }
    }

    /// The brace closure for one file with known contents.
    pub fn close_braces_in(&mut self, file: &str, src: &str) {
        let nesting = self.nestings.entry(SmolStr::new(file)).or_insert_with(|| lexer::scan(src));
        let lines = match self.line_dict.get_mut(file) {
            Some(lines) => lines,
            None => return,
        };

        // Not efficient, but easy; monotone and bounded by the line count.
        loop {
            let old_size = lines.len();
            let mut new_lines = BTreeSet::new();
            for &line in lines.iter() {
                new_lines.insert(line);
                if let Some(&idx) = nesting.innermost.get(&line) {
                    let (open, close) = nesting.matching[idx];
                    new_lines.insert(open);
                    if close > 0 {
                        new_lines.insert(close);
                    }
                }
            }
            *lines = new_lines;
            if lines.len() == old_size {
                break;
            }
        }
    }

    /// Prints the retained lines of every file, in file order.
    pub fn render_source(&self, out: &mut dyn Write) -> io::Result<()> {
        for file in self.files() {
            let lines = &self.line_dict[file];
            let path = self.resolve_path(file);
            let reader = match fs::File::open(&path) {
                Ok(reader) => BufReader::new(reader),
                Err(err) => {
                    log::warn!("failed opening given source file {}: {}", path, err);
                    continue;
                }
            };
            for (idx, line) in reader.lines().enumerate() {
                let line = line?;
                if lines.contains(&(idx as u32 + 1)) {
                    writeln!(out, "{}", line)?;
                }
            }
        }
        Ok(())
    }

    /// One line per file: `file,line,line,...`.
    pub fn render_manifest(&self, out: &mut dyn Write) -> io::Result<()> {
        for file in self.files() {
            write!(out, "{}", file)?;
            for line in &self.line_dict[file] {
                write!(out, ",{}", line)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }
}
