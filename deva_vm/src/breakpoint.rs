//! Breakpoints are plain data the executor consults before each
//! instruction; setting, clearing, and deciding when to stop is a
//! caller's concern, not the executor's.

use deva_core::Addr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub is_valid: bool,
    pub is_active: bool,
    pub module_name: String,
    pub line: Option<u32>,
    pub location: Addr,
}

impl Breakpoint {
    pub fn new(module_name: impl Into<String>, line: u32, location: Addr) -> Self {
        Breakpoint {
            is_valid: true,
            is_active: false,
            module_name: module_name.into(),
            line: Some(line),
            location,
        }
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn matches(&self, module_name: &str, location: Addr) -> bool {
        self.is_valid && self.is_active && self.module_name == module_name && self.location == location
    }
}

impl Default for Breakpoint {
    fn default() -> Self {
        Breakpoint {
            is_valid: false,
            is_active: false,
            module_name: String::new(),
            line: None,
            location: Addr::ENTRY,
        }
    }
}
