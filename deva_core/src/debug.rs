//! Disassembler: render a [`Code`] artifact as readable text, the way a
//! `--disasm` CLI flag or a debugger's instruction view would.

use std::fmt::Write as _;

use crate::module::Code;
use crate::opcode::decode_at;

pub fn dump_code(code: &Code) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "constants ({}):", code.constants.len());
    for (i, c) in code.constants.iter().enumerate() {
        let _ = writeln!(s, "  [{i}] {c:?}");
    }
    let _ = writeln!(s, "functions ({}):", code.functions.len());
    for f in &code.functions {
        let _ = writeln!(
            s,
            "  {} ({}:{}) args={} locals={} offset={}",
            f.name, f.source_file, f.first_line, f.arg_count, f.num_locals, f.code_offset.0
        );
    }
    let _ = writeln!(s, "code:");
    s.push_str(&dump_instructions(code));
    s
}

pub fn dump_instructions(code: &Code) -> String {
    let mut s = String::new();
    let mut ip = 0usize;
    while ip < code.instructions.len() {
        match decode_at(&code.instructions, ip) {
            Ok((instr, next)) => {
                let line = code
                    .lines
                    .find_line(crate::ids::Addr(ip as u32))
                    .map(|l| l.0);
                let _ = match line {
                    Some(l) => writeln!(s, "  {ip:6}  L{l:<4} {instr:?}"),
                    None => writeln!(s, "  {ip:6}       {instr:?}"),
                };
                ip = next;
            }
            Err(e) => {
                let _ = writeln!(s, "  {ip:6}  <decode error: {e}>");
                break;
            }
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CodeBuilder;
    use crate::opcode::Instr;

    #[test]
    fn dumps_a_trivial_function() {
        let mut b = CodeBuilder::new();
        let k = b.add_number(1.0);
        let mut main = b.new_function("@main", 0, None);
        main.emit(Instr::Push(k));
        main.emit(Instr::Return);
        b.push_function(main);
        let code = b.build();

        let dump = dump_code(&code);
        assert!(dump.contains("@main"));
        assert!(dump.contains("Push(ConstId(0))"));
        assert!(dump.contains("Return"));
    }
}
