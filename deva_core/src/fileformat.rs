//! Reader/writer for the compiled bytecode file format. All
//! multibyte values are little-endian. Section layout:
//!
//! 1. 16-byte file header: `"deva\0"`, `"2.0.0\0"`, 5 bytes of padding.
//! 2. `.const` section: 8-byte header, `u32` count, then tagged constants.
//! 3. `.func` section: 8-byte header, `u32` count, then function records.
//! 4. `.linemap` section: 8-byte header, `u32` count, then `(line, addr)` pairs.
//! 5. Code: the raw instruction stream, running to end of file.

use std::io::{self, Read, Write};

use crate::error::{DevaError, DevaResult};
use crate::ids::{Addr, ConstId, FunctionId};
use crate::linemap::{Line, LineMap};
use crate::module::{Code, Constant, FunctionDef};

const MAGIC: &[u8; 5] = b"deva\0";
const VERSION: &[u8; 6] = b"2.0.0\0";
const HEADER_PAD: usize = 5;

const CONST_HDR: &[u8; 6] = b".const";
const CONST_HDR_PAD: usize = 2;

const FUNC_HDR: &[u8; 5] = b".func";
const FUNC_HDR_PAD: usize = 3;

const LINEMAP_HDR: &[u8; 8] = b".linemap";

fn write_cstr<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    w.write_all(s.as_bytes())?;
    w.write_all(&[0])
}

fn read_cstr<R: Read>(r: &mut R) -> DevaResult<String> {
    let mut buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        r.read_exact(&mut byte)
            .map_err(|e| DevaError::ice(format!("truncated string in .dvc file: {e}")))?;
        if byte[0] == 0 {
            break;
        }
        buf.push(byte[0]);
    }
    String::from_utf8(buf).map_err(|e| DevaError::ice(format!("invalid UTF-8 in .dvc file: {e}")))
}

fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn read_u32<R: Read>(r: &mut R) -> DevaResult<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)
        .map_err(|e| DevaError::ice(format!("truncated u32 in .dvc file: {e}")))?;
    Ok(u32::from_le_bytes(buf))
}

pub fn write_code<W: Write>(code: &Code, w: &mut W) -> io::Result<()> {
    w.write_all(MAGIC)?;
    w.write_all(VERSION)?;
    w.write_all(&[0u8; HEADER_PAD])?;

    w.write_all(CONST_HDR)?;
    w.write_all(&[0u8; CONST_HDR_PAD])?;
    write_u32(w, code.constants.len() as u32)?;
    for c in &code.constants {
        match c {
            Constant::Number(n) => {
                w.write_all(&[0])?;
                w.write_all(&n.to_le_bytes())?;
            }
            Constant::Str(s) => {
                w.write_all(&[1])?;
                write_cstr(w, s)?;
            }
        }
    }

    w.write_all(FUNC_HDR)?;
    w.write_all(&[0u8; FUNC_HDR_PAD])?;
    write_u32(w, code.functions.len() as u32)?;
    for f in &code.functions {
        write_cstr(w, &f.name)?;
        write_cstr(w, &f.source_file)?;
        write_u32(w, f.first_line)?;
        write_cstr(w, f.class_name.as_deref().unwrap_or(""))?;
        write_u32(w, f.arg_count)?;
        write_u32(w, f.default_args.len() as u32)?;
        for d in &f.default_args {
            write_u32(w, d.0)?;
        }
        write_u32(w, f.num_locals)?;
        write_u32(w, f.local_names.len() as u32)?;
        for n in &f.local_names {
            write_cstr(w, n.as_deref().unwrap_or(""))?;
        }
        write_u32(w, f.names.len() as u32)?;
        for n in &f.names {
            write_cstr(w, n)?;
        }
        write_u32(w, f.code_offset.0)?;
    }

    w.write_all(LINEMAP_HDR)?;
    write_u32(w, code.lines.len() as u32)?;
    for (line, addr) in code.lines.entries() {
        write_u32(w, line.0)?;
        write_u32(w, addr.0)?;
    }

    w.write_all(&code.instructions)?;
    Ok(())
}

pub fn read_code<R: Read>(r: &mut R) -> DevaResult<Code> {
    let mut header = [0u8; 16];
    r.read_exact(&mut header)
        .map_err(|e| DevaError::ice(format!("truncated .dvc header: {e}")))?;
    if &header[0..5] != MAGIC {
        return Err(DevaError::ice("not a deva bytecode file (bad magic)"));
    }
    if &header[5..11] != VERSION {
        return Err(DevaError::ice("unsupported deva bytecode version"));
    }

    let mut const_hdr = [0u8; 8];
    r.read_exact(&mut const_hdr)
        .map_err(|e| DevaError::ice(format!("truncated .const header: {e}")))?;
    if &const_hdr[0..6] != CONST_HDR {
        return Err(DevaError::ice("missing .const section"));
    }
    let n_const = read_u32(r)?;
    let mut constants = Vec::with_capacity(n_const as usize);
    for _ in 0..n_const {
        let mut tag = [0u8; 1];
        r.read_exact(&mut tag)
            .map_err(|e| DevaError::ice(format!("truncated constant tag: {e}")))?;
        constants.push(match tag[0] {
            0 => {
                let mut buf = [0u8; 8];
                r.read_exact(&mut buf)
                    .map_err(|e| DevaError::ice(format!("truncated number constant: {e}")))?;
                Constant::Number(f64::from_le_bytes(buf))
            }
            1 => Constant::Str(read_cstr(r)?),
            other => return Err(DevaError::ice(format!("invalid constant tag {other}"))),
        });
    }

    let mut func_hdr = [0u8; 8];
    r.read_exact(&mut func_hdr)
        .map_err(|e| DevaError::ice(format!("truncated .func header: {e}")))?;
    if &func_hdr[0..5] != FUNC_HDR {
        return Err(DevaError::ice("missing .func section"));
    }
    let n_func = read_u32(r)?;
    let mut functions = Vec::with_capacity(n_func as usize);
    for idx in 0..n_func {
        let name = read_cstr(r)?;
        let source_file = read_cstr(r)?;
        let first_line = read_u32(r)?;
        let class_name = read_cstr(r)?;
        let arg_count = read_u32(r)?;
        let n_defaults = read_u32(r)?;
        let mut default_args = Vec::with_capacity(n_defaults as usize);
        for _ in 0..n_defaults {
            default_args.push(ConstId(read_u32(r)?));
        }
        let num_locals = read_u32(r)?;
        let n_local_names = read_u32(r)?;
        let mut local_names = Vec::with_capacity(n_local_names as usize);
        for _ in 0..n_local_names {
            let n = read_cstr(r)?;
            local_names.push(if n.is_empty() { None } else { Some(n) });
        }
        let n_names = read_u32(r)?;
        let mut names = Vec::with_capacity(n_names as usize);
        for _ in 0..n_names {
            names.push(read_cstr(r)?);
        }
        let code_offset = Addr(read_u32(r)?);
        functions.push(FunctionDef {
            id: FunctionId(idx),
            name,
            source_file,
            first_line,
            class_name: if class_name.is_empty() {
                None
            } else {
                Some(class_name)
            },
            arg_count,
            default_args,
            num_locals,
            local_names,
            names,
            code_offset,
        });
    }

    let mut linemap_hdr = [0u8; 8];
    r.read_exact(&mut linemap_hdr)
        .map_err(|e| DevaError::ice(format!("truncated .linemap header: {e}")))?;
    if &linemap_hdr[..] != LINEMAP_HDR {
        return Err(DevaError::ice("missing .linemap section"));
    }
    let n_lines = read_u32(r)?;
    let mut lines = LineMap::new();
    for _ in 0..n_lines {
        let line = read_u32(r)?;
        let addr = read_u32(r)?;
        lines.add(Line(line), Addr(addr));
    }

    let mut instructions = Vec::new();
    r.read_to_end(&mut instructions)
        .map_err(|e| DevaError::ice(format!("failed reading code section: {e}")))?;

    let entry = functions
        .iter()
        .find(|f| f.name == "@main")
        .map(|f| f.id)
        .unwrap_or(FunctionId(0));

    Ok(Code {
        constants,
        functions,
        lines,
        instructions,
        entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::CodeBuilder;
    use crate::opcode::Instr;

    #[test]
    fn round_trips_through_bytes() {
        let mut b = CodeBuilder::new();
        let k = b.add_constant(Constant::Number(42.0));
        let mut main = b.new_function("@main", 0, None);
        main.emit(Instr::Push(k));
        main.emit(Instr::Return);
        b.push_function(main);

        let code = b.build();

        let mut bytes = Vec::new();
        write_code(&code, &mut bytes).unwrap();
        let read_back = read_code(&mut &bytes[..]).unwrap();

        assert_eq!(read_back.constants, code.constants);
        assert_eq!(read_back.instructions, code.instructions);
        assert_eq!(read_back.functions.len(), code.functions.len());
        assert_eq!(read_back.functions[0].name, "@main");

        let mut bytes_again = Vec::new();
        write_code(&read_back, &mut bytes_again).unwrap();
        assert_eq!(bytes, bytes_again);
    }
}
