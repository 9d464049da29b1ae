//! Bidirectional line <-> instruction-address mapping, used for error
//! reporting and breakpoints. Mirrors the compiler's `.linemap` file
//! section (see [`crate::fileformat`]).

use std::collections::BTreeMap;

use crate::ids::Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Line(pub u32);

#[derive(Debug, Clone, Default)]
pub struct LineMap {
    line_to_addr: BTreeMap<u32, u32>,
    addr_to_line: BTreeMap<u32, u32>,
}

impl LineMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that instruction `addr` is the first instruction on `line`.
    /// If `line` already maps to a *later* address, that mapping is kept
    /// (first-instruction-on-the-line wins); a smaller address replaces it.
    pub fn add(&mut self, line: Line, addr: Addr) {
        match self.line_to_addr.get(&line.0) {
            Some(&existing) if existing <= addr.0 => {}
            _ => {
                self.line_to_addr.insert(line.0, addr.0);
                self.addr_to_line.insert(addr.0, line.0);
            }
        }
    }

    pub fn find_address(&self, line: Line) -> Option<Addr> {
        self.line_to_addr.get(&line.0).copied().map(Addr)
    }

    /// Find the line containing `addr`: the greatest recorded line whose
    /// first-instruction address is <= `addr`.
    pub fn find_line(&self, addr: Addr) -> Option<Line> {
        self.addr_to_line
            .range(..=addr.0)
            .next_back()
            .map(|(_, &line)| Line(line))
    }

    pub fn entries(&self) -> impl Iterator<Item = (Line, Addr)> + '_ {
        self.line_to_addr.iter().map(|(&l, &a)| (Line(l), Addr(a)))
    }

    pub fn len(&self) -> usize {
        self.line_to_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line_to_addr.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_instruction_on_line_wins() {
        let mut lm = LineMap::new();
        lm.add(Line(1), Addr(10));
        lm.add(Line(1), Addr(4));
        assert_eq!(lm.find_address(Line(1)), Some(Addr(4)));
    }

    #[test]
    fn find_line_looks_between_known_addresses() {
        let mut lm = LineMap::new();
        lm.add(Line(1), Addr(0));
        lm.add(Line(2), Addr(10));
        assert_eq!(lm.find_line(Addr(0)), Some(Line(1)));
        assert_eq!(lm.find_line(Addr(5)), Some(Line(1)));
        assert_eq!(lm.find_line(Addr(10)), Some(Line(2)));
        assert_eq!(lm.find_line(Addr(20)), Some(Line(2)));
    }
}
